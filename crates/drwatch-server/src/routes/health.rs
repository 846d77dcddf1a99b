/// GET /: liveness probe.
pub async fn root() -> &'static str {
    "Hello, the backend is running!"
}
