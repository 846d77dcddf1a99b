use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use drwatch_core::orchestrator::{ExecutionContext, ExecutionResult};
use drwatch_core::types::{FailoverState, TriggerMethod};
use drwatch_core::DrError;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ExecutionSummary {
    pub execution_id: Uuid,
    pub execution_arn: String,
    pub trigger_method: TriggerMethod,
    pub current_state: FailoverState,
    pub poll_attempts: u32,
    pub result: Option<ExecutionResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ExecutionContext> for ExecutionSummary {
    fn from(ctx: ExecutionContext) -> Self {
        Self {
            execution_id: ctx.execution_id,
            execution_arn: ctx.execution_arn,
            trigger_method: ctx.trigger_method,
            current_state: ctx.current_state,
            poll_attempts: ctx.poll_attempts,
            result: ctx.result,
            created_at: ctx.created_at,
            updated_at: ctx.updated_at,
        }
    }
}

/// GET /api/executions: every execution, newest first.
pub async fn list_executions(
    State(app): State<AppState>,
) -> Result<Json<Vec<ExecutionSummary>>, AppError> {
    let db = app.db.clone();
    let all = tokio::task::spawn_blocking(move || db.list_all())
        .await
        .map_err(AppError::join)??;
    Ok(Json(all.into_iter().map(ExecutionSummary::from).collect()))
}

/// GET /api/executions/{id}: full context including transition history.
pub async fn get_execution(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionContext>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| DrError::InvalidExecutionId(id.clone()))?;
    let db = app.db.clone();
    let ctx = tokio::task::spawn_blocking(move || db.get(id))
        .await
        .map_err(AppError::join)??;
    Ok(Json(ctx))
}
