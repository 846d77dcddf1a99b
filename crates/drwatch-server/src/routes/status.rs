use axum::extract::State;
use axum::Json;
use chrono::Utc;
use drwatch_core::status::StatusSnapshot;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/status: fresh primary/DR health snapshot.
///
/// Remote failures are reported inside the snapshot, so this only errors if
/// the blocking task itself dies.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<StatusSnapshot>, AppError> {
    let aggregator = app.aggregator.clone();
    let snapshot = tokio::task::spawn_blocking(move || aggregator.snapshot(Utc::now()))
        .await
        .map_err(AppError::join)?;
    Ok(Json(snapshot))
}
