pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::health::root))
        // Status
        .route("/api/status", get(routes::status::get_status))
        // Failover
        .route(
            "/api/initiate-failover",
            post(routes::failover::initiate_failover),
        )
        // Executions
        .route(
            "/api/executions",
            get(routes::executions::list_executions),
        )
        .route(
            "/api/executions/{id}",
            get(routes::executions::get_execution),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve on a pre-bound listener and run the failover scheduler alongside.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port
/// first (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let scheduler = app_state.spawn_scheduler();
    let app = build_router(app_state);

    tracing::info!("drwatch server listening on http://localhost:{actual_port}");

    let served = axum::serve(listener, app).await;
    if let Some(handle) = scheduler {
        handle.abort();
    }
    served?;
    Ok(())
}

/// Bind `0.0.0.0:{port}` and serve.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(app_state, listener).await
}
