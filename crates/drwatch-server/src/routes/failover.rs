use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drwatch_core::types::TriggerMethod;
use drwatch_core::DrError;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub const MSG_INITIATED: &str = "Failover process initiated successfully.";
pub const MSG_NOT_CONFIGURED: &str = "Failover process is not configured correctly on the server.";
pub const MSG_DISPATCH_FAILED: &str = "An error occurred while trying to initiate the failover.";
pub const MSG_IN_PROGRESS: &str = "A failover is already in progress.";

#[derive(Debug, Default, Deserialize)]
struct InitiateBody {
    #[serde(default)]
    trigger_method: Option<String>,
}

fn parse_trigger(body: &[u8]) -> Result<TriggerMethod, DrError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TriggerMethod::default());
    }
    let parsed: InitiateBody = serde_json::from_slice(body)
        .map_err(|e| DrError::InvalidTriggerMethod(format!("bad request body: {e}")))?;
    match parsed.trigger_method {
        Some(m) => m.parse::<TriggerMethod>(),
        None => Ok(TriggerMethod::default()),
    }
}

fn message(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

/// POST /api/initiate-failover: start a failover execution and return
/// without waiting for it.
///
/// The body is optional: `{"trigger_method": "manual_dashboard" | "automatic"}`.
pub async fn initiate_failover(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let trigger = match parse_trigger(&body) {
        Ok(trigger) => trigger,
        Err(e) => {
            return Ok(message(
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "message": e.to_string() }),
            ))
        }
    };
    let gateway = app.gateway.clone();
    let result = tokio::task::spawn_blocking(move || gateway.initiate_failover(trigger))
        .await
        .map_err(AppError::join)?;

    Ok(match result {
        Ok(handle) => message(
            StatusCode::OK,
            serde_json::json!({
                "message": MSG_INITIATED,
                "executionArn": handle.execution_arn,
            }),
        ),
        Err(DrError::MissingConfig(_)) => message(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "message": MSG_NOT_CONFIGURED }),
        ),
        Err(DrError::ExecutionInProgress(id)) => message(
            StatusCode::CONFLICT,
            serde_json::json!({ "message": MSG_IN_PROGRESS, "executionId": id }),
        ),
        Err(_) => message(
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "message": MSG_DISPATCH_FAILED }),
        ),
    })
}
