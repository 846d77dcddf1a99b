use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use drwatch_core::DrError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn join(e: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {e}"))
    }

    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<DrError>() {
            Some(DrError::ExecutionNotFound(_)) => StatusCode::NOT_FOUND,
            Some(DrError::InvalidExecutionId(_) | DrError::InvalidTriggerMethod(_)) => {
                StatusCode::BAD_REQUEST
            }
            Some(DrError::ExecutionInProgress(_)) => StatusCode::CONFLICT,
            Some(DrError::InvalidTransition { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(DrError::Remote(_) | DrError::Timeout { .. }) => StatusCode::BAD_GATEWAY,
            Some(
                DrError::MissingConfig(_)
                | DrError::InvalidConfig(_)
                | DrError::Store(_)
                | DrError::Io(_)
                | DrError::Yaml(_)
                | DrError::Json(_),
            )
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
