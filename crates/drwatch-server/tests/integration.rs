use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration as CDur, Utc};
use drwatch_core::config::{Config, DnsConfig};
use drwatch_core::orchestrator::ExecutionDb;
use drwatch_core::remote::memory::RemoteOp;
use drwatch_core::remote::{InMemoryRemoteOps, RemoteError, ReplicationLookup, ReplicationRule};
use drwatch_server::{build_router, AppState};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    _dir: TempDir,
    ops: Arc<InMemoryRemoteOps>,
    state: AppState,
}

impl Harness {
    fn app(&self) -> axum::Router {
        build_router(self.state.clone())
    }
}

fn full_config() -> Config {
    let mut cfg = Config::default();
    cfg.primary_bucket_name = Some("primary-backups".into());
    cfg.execution_target = Some("arn:aws:states:us-west-2:1:stateMachine:failover".into());
    cfg.source_replica_arn = Some("arn:aws:rds:us-east-1:1:db:primary".into());
    cfg.dns = DnsConfig {
        hosted_zone_id: Some("Z123".into()),
        record_name: Some("app.example.com".into()),
        target_dns_name: Some("dr-alb.us-west-2.elb.amazonaws.com".into()),
        target_zone_id: Some("ZALB".into()),
    };
    cfg
}

fn harness(cfg: Config) -> Harness {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(ExecutionDb::open(&dir.path().join("executions.redb")).unwrap());
    let ops = Arc::new(InMemoryRemoteOps::healthy(&cfg, Utc::now()));
    let state = AppState::new(cfg, ops.clone(), db);
    Harness {
        _dir: dir,
        ops,
        state,
    }
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a raw body via `oneshot` and return (status, parsed JSON body).
async fn post(app: axum::Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[tokio::test]
async fn root_reports_backend_running() {
    let h = harness(full_config());
    let req = axum::http::Request::builder()
        .uri("/")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = h.app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"Hello, the backend is running!");
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_healthy_topology_is_operational() {
    let h = harness(full_config());
    let (status, json) = get(h.app(), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["overallStatus"], "OPERATIONAL");
    assert_eq!(json["primarySite"]["region"], "us-east-1");
    assert_eq!(json["primarySite"]["bucketName"], "primary-backups");
    assert_eq!(json["primarySite"]["replicationStatus"]["status"], "OPERATIONAL");
    assert_eq!(json["drSite"]["region"], "us-west-2");
    assert_eq!(json["backupDetails"]["last_backup_file"], "backups/latest.sql.gz");
    assert_eq!(json["backupDetails"]["freshness_status"], "OPERATIONAL");
    assert!(json["lastChecked"].is_string());
}

#[tokio::test]
async fn status_without_bucket_is_error_with_config_errors() {
    let mut cfg = full_config();
    cfg.primary_bucket_name = None;
    let h = harness(cfg);
    let (status, json) = get(h.app(), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["overallStatus"], "ERROR");
    assert_eq!(json["primarySite"]["bucketName"], "Not Configured");
    assert_eq!(json["primarySite"]["replicationStatus"]["status"], "CONFIG_ERROR");
    assert_eq!(json["backupDetails"]["freshness_status"], "CONFIG_ERROR");
    assert_eq!(json["backupDetails"]["last_backup_file"], "N/A");
    assert!(h.ops.calls().is_empty());
}

#[tokio::test]
async fn status_missing_replication_is_degraded() {
    let h = harness(full_config());
    h.ops
        .set_replication("primary-backups", ReplicationLookup::NotConfigured);
    let (_, json) = get(h.app(), "/api/status").await;
    assert_eq!(json["primarySite"]["replicationStatus"]["status"], "DEGRADED");
    assert_eq!(json["overallStatus"], "DEGRADED");
}

#[tokio::test]
async fn status_remote_failure_is_reported_not_raised() {
    let h = harness(full_config());
    h.ops.fail(
        RemoteOp::ListLatestObject,
        RemoteError::service("AccessDenied"),
    );
    let (status, json) = get(h.app(), "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["overallStatus"], "ERROR");
    assert_eq!(json["backupDetails"]["last_backup_file"], "Error");
    assert_eq!(json["backupDetails"]["freshness_status"], "ERROR");
}

#[tokio::test]
async fn status_disabled_rule_is_error() {
    let h = harness(full_config());
    h.ops.set_replication(
        "primary-backups",
        ReplicationLookup::Configured(ReplicationRule {
            id: "to-dr".into(),
            enabled: false,
        }),
    );
    let (_, json) = get(h.app(), "/api/status").await;
    assert_eq!(json["primarySite"]["replicationStatus"]["status"], "ERROR");
    assert_eq!(
        json["primarySite"]["replicationStatus"]["details"],
        "Replication rule 'to-dr' is Disabled."
    );
    assert_eq!(json["overallStatus"], "ERROR");
}

// ---------------------------------------------------------------------------
// Failover trigger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initiate_failover_returns_execution_arn() {
    let h = harness(full_config());
    let (status, json) = post(h.app(), "/api/initiate-failover", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Failover process initiated successfully.");
    let arn = json["executionArn"].as_str().unwrap();
    assert!(arn.starts_with("arn:aws:states:us-west-2:1:stateMachine:failover:"));
    assert_eq!(h.state.db.active_count().unwrap(), 1);
}

#[tokio::test]
async fn initiate_failover_without_target_is_500_and_stores_nothing() {
    let mut cfg = full_config();
    cfg.execution_target = None;
    let h = harness(cfg);
    let (status, json) = post(h.app(), "/api/initiate-failover", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json["message"],
        "Failover process is not configured correctly on the server."
    );
    assert!(h.state.db.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn initiate_failover_twice_starts_two_executions() {
    let h = harness(full_config());
    let (_, a) = post(h.app(), "/api/initiate-failover", "").await;
    let (_, b) = post(h.app(), "/api/initiate-failover", "").await;
    assert_ne!(a["executionArn"], b["executionArn"]);
    assert_eq!(h.state.db.list_all().unwrap().len(), 2);
}

#[tokio::test]
async fn initiate_failover_single_flight_conflicts() {
    let mut cfg = full_config();
    cfg.single_flight = true;
    let h = harness(cfg);
    let (first, _) = post(h.app(), "/api/initiate-failover", "").await;
    assert_eq!(first, StatusCode::OK);
    let (second, json) = post(h.app(), "/api/initiate-failover", "").await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn initiate_failover_records_trigger_method() {
    let h = harness(full_config());
    let (status, _) = post(
        h.app(),
        "/api/initiate-failover",
        r#"{"trigger_method":"automatic"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = get(h.app(), "/api/executions").await;
    assert_eq!(list[0]["trigger_method"], "automatic");
    assert_eq!(list[0]["current_state"], "INIT");
}

#[tokio::test]
async fn initiate_failover_bad_trigger_method_is_400() {
    let h = harness(full_config());
    let (status, json) = post(
        h.app(),
        "/api/initiate-failover",
        r#"{"trigger_method":"cron"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("cron"));
    assert!(json.get("error").is_none());
    assert_eq!(h.state.db.active_count().unwrap(), 0);
}

#[tokio::test]
async fn initiate_failover_malformed_body_uses_message_key() {
    let h = harness(full_config());
    let (status, json) = post(h.app(), "/api/initiate-failover", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("bad request body"));
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_execution_unknown_is_404() {
    let h = harness(full_config());
    let (status, json) = get(
        h.app(),
        "/api/executions/00000000-0000-4000-8000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn get_execution_malformed_id_is_400() {
    let h = harness(full_config());
    let (status, _) = get(h.app(), "/api/executions/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_executions_empty() {
    let h = harness(full_config());
    let (status, json) = get(h.app(), "/api/executions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unconfigured_bucket_still_allows_full_failover() {
    let mut cfg = full_config();
    cfg.primary_bucket_name = None;
    let h = harness(cfg);

    let (_, status) = get(h.app(), "/api/status").await;
    assert_eq!(status["overallStatus"], "ERROR");

    let (code, _) = post(h.app(), "/api/initiate-failover", "").await;
    assert_eq!(code, StatusCode::OK);
    let (_, list) = get(h.app(), "/api/executions").await;
    let id = list[0]["execution_id"].as_str().unwrap().to_string();

    // The healthy topology reports "modifying" first, then "available".
    let now = Utc::now();
    let first = h.state.scheduler.tick(now).unwrap();
    assert_eq!(first.waiting, 1);
    let later = h.state.scheduler.tick(now + CDur::seconds(30)).unwrap();
    assert_eq!(later.finished, 1);

    let (code, ctx) = get(h.app(), &format!("/api/executions/{id}")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(ctx["current_state"], "DNS_UPDATED");
    assert_eq!(ctx["result"]["outcome"], "succeeded");
    assert_eq!(ctx["result"]["change_id"], "/change/C0001");
    assert_eq!(ctx["poll_attempts"], 1);

    let changes = h.ops.dns_changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].record_name, "app.example.com");
    assert_eq!(changes[0].target_zone_id, "ZALB");
}

#[tokio::test]
async fn failover_with_missing_dns_settings_fails_with_config_error() {
    let mut cfg = full_config();
    cfg.dns.target_zone_id = None;
    let h = harness(cfg);
    post(h.app(), "/api/initiate-failover", "").await;

    let now = Utc::now();
    h.state.scheduler.tick(now).unwrap();
    h.state.scheduler.tick(now + CDur::seconds(30)).unwrap();

    let (_, list) = get(h.app(), "/api/executions").await;
    assert_eq!(list[0]["current_state"], "FAILED");
    assert_eq!(list[0]["result"]["cause"]["kind"], "CONFIG_ERROR");
    assert!(h.ops.dns_changes().is_empty());
}
