//! [`RemoteOps`] over a JSON control-plane gateway.
//!
//! The gateway fronts the storage, database and DNS APIs of both regions.
//! Every request names its region in the `x-drwatch-region` header: storage
//! calls go to the primary region, database calls to the DR region and DNS
//! calls (a global service) to the primary region.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    DnsAliasChange, LatestObject, RemoteError, RemoteOps, RemoteResult, ReplicationLookup,
    ReplicationRule,
};
use crate::config::{Config, ENV_CONTROL_PLANE_URL};
use crate::error::{DrError, Result};

pub const REGION_HEADER: &str = "x-drwatch-region";

const REPLICATION_NOT_FOUND: &str = "ReplicationConfigurationNotFoundError";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplicationBody {
    #[serde(default)]
    rules: Vec<RuleBody>,
}

#[derive(Debug, Deserialize)]
struct RuleBody {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ObjectListBody {
    #[serde(default)]
    contents: Vec<ObjectBody>,
}

#[derive(Debug, Deserialize)]
struct ObjectBody {
    key: String,
    last_modified: String,
}

#[derive(Debug, Deserialize)]
struct InstanceBody {
    status: String,
}

#[derive(Debug, Deserialize)]
struct PromoteBody {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct ChangeBody {
    change_info: ChangeInfo,
}

#[derive(Debug, Deserialize)]
struct ChangeInfo {
    id: String,
}

// ---------------------------------------------------------------------------
// HttpRemoteOps
// ---------------------------------------------------------------------------

pub struct HttpRemoteOps {
    base_url: Url,
    primary_region: String,
    dr_region: String,
    client: Client,
}

impl HttpRemoteOps {
    pub fn new(
        base_url: impl Into<String>,
        primary_region: impl Into<String>,
        dr_region: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DrError::Remote(RemoteError::transport(e.to_string())))?;
        let raw: String = base_url.into();
        let base_url = Url::parse(&raw)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| {
                DrError::InvalidConfig(format!("{ENV_CONTROL_PLANE_URL} '{raw}' is not a base URL"))
            })?;
        Ok(Self {
            base_url,
            primary_region: primary_region.into(),
            dr_region: dr_region.into(),
            client,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let url = cfg
            .control_plane_url
            .as_deref()
            .ok_or_else(|| DrError::MissingConfig(format!("{ENV_CONTROL_PLANE_URL} not set")))?;
        Self::new(url, &cfg.primary_region, &cfg.dr_region)
    }

    /// `base_url` extended by `segments`, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send the request. 2xx bodies decode as `T` and a 404 yields `Ok(Err(_))`
    /// carrying the gateway's error body; any other status is a [`RemoteError`].
    fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        region: &str,
    ) -> RemoteResult<std::result::Result<T, ErrorBody>> {
        let resp = req
            .header(REGION_HEADER, region)
            .send()
            .map_err(|e| RemoteError::transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| RemoteError::transport(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str::<T>(&text)
                .map(Ok)
                .map_err(|e| RemoteError::malformed(format!("unexpected response body: {e}")));
        }

        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Ok(Err(body));
        }
        Err(RemoteError::service(describe_failure(status, &body)))
    }
}

fn describe_failure(status: StatusCode, body: &ErrorBody) -> String {
    match (&body.code, &body.message) {
        (Some(code), Some(msg)) => format!("{code}: {msg}"),
        (Some(code), None) => code.clone(),
        (None, Some(msg)) => msg.clone(),
        (None, None) => format!("control plane returned {status}"),
    }
}

impl RemoteOps for HttpRemoteOps {
    fn get_replication_config(&self, bucket: &str) -> RemoteResult<ReplicationLookup> {
        let req = self
            .client
            .get(self.url(&["storage", "buckets", bucket, "replication"]));
        match self.send::<ReplicationBody>(req, &self.primary_region)? {
            Ok(body) => {
                let rule = body
                    .rules
                    .into_iter()
                    .next()
                    .ok_or_else(|| RemoteError::malformed("Could not parse replication rules."))?;
                Ok(ReplicationLookup::Configured(ReplicationRule {
                    enabled: rule.status == "Enabled",
                    id: rule.id,
                }))
            }
            Err(body) if body.code.as_deref() == Some(REPLICATION_NOT_FOUND) => {
                Ok(ReplicationLookup::NotConfigured)
            }
            Err(body) => Err(RemoteError::not_found(describe_failure(
                StatusCode::NOT_FOUND,
                &body,
            ))),
        }
    }

    fn list_latest_object(&self, bucket: &str) -> RemoteResult<LatestObject> {
        let req = self
            .client
            .get(self.url(&["storage", "buckets", bucket, "objects"]));
        let body = match self.send::<ObjectListBody>(req, &self.primary_region)? {
            Ok(body) => body,
            Err(body) => {
                return Err(RemoteError::not_found(describe_failure(
                    StatusCode::NOT_FOUND,
                    &body,
                )))
            }
        };

        let mut latest: Option<(String, DateTime<FixedOffset>)> = None;
        for obj in body.contents {
            let ts = DateTime::parse_from_rfc3339(&obj.last_modified).map_err(|e| {
                RemoteError::malformed(format!(
                    "object '{}' has invalid last_modified '{}': {e}",
                    obj.key, obj.last_modified
                ))
            })?;
            if latest.as_ref().map(|(_, cur)| ts > *cur).unwrap_or(true) {
                latest = Some((obj.key, ts));
            }
        }

        Ok(match latest {
            Some((key, last_modified)) => LatestObject::Found { key, last_modified },
            None => LatestObject::Empty,
        })
    }

    fn describe_db_instance(&self, identifier: &str) -> RemoteResult<String> {
        let req = self
            .client
            .get(self.url(&["db", "instances", identifier]));
        match self.send::<InstanceBody>(req, &self.dr_region)? {
            Ok(body) => Ok(body.status),
            Err(_) => Err(RemoteError::not_found(format!(
                "DB instance '{identifier}' not found"
            ))),
        }
    }

    fn upsert_dns_alias_record(&self, change: &DnsAliasChange) -> RemoteResult<String> {
        let payload = serde_json::json!({
            "comment": "Automated DR Failover",
            "changes": [{
                "action": "UPSERT",
                "resource_record_set": {
                    "name": change.record_name,
                    "type": "A",
                    "alias_target": {
                        "hosted_zone_id": change.target_zone_id,
                        "dns_name": change.target_dns_name,
                        "evaluate_target_health": false,
                    },
                },
            }],
        });
        let req = self
            .client
            .post(self.url(&["dns", "zones", change.zone_id.as_str(), "changes"]))
            .json(&payload);
        match self.send::<ChangeBody>(req, &self.primary_region)? {
            Ok(body) => Ok(body.change_info.id),
            Err(body) => Err(RemoteError::not_found(describe_failure(
                StatusCode::NOT_FOUND,
                &body,
            ))),
        }
    }

    fn promote_read_replica(&self, source_replica: &str, target: &str) -> RemoteResult<String> {
        let req = self
            .client
            .post(self.url(&["db", "instances", target, "promote"]))
            .json(&serde_json::json!({ "source_replica": source_replica }));
        match self.send::<PromoteBody>(req, &self.dr_region)? {
            Ok(body) => Ok(body.identifier),
            Err(body) => Err(RemoteError::not_found(describe_failure(
                StatusCode::NOT_FOUND,
                &body,
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteErrorKind;
    use mockito::Matcher;

    fn ops(server: &mockito::ServerGuard) -> HttpRemoteOps {
        HttpRemoteOps::new(server.url(), "us-east-1", "us-west-2").unwrap()
    }

    #[test]
    fn enabled_replication_rule_is_parsed() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("GET", "/storage/buckets/primary/replication")
            .match_header(REGION_HEADER, "us-east-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rules":[{"id":"to-dr","status":"Enabled"}]}"#)
            .create();

        let lookup = ops(&server).get_replication_config("primary").unwrap();
        m.assert();
        assert_eq!(
            lookup,
            ReplicationLookup::Configured(ReplicationRule {
                id: "to-dr".into(),
                enabled: true
            })
        );
    }

    #[test]
    fn replication_not_found_code_means_not_configured() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/storage/buckets/primary/replication")
            .with_status(404)
            .with_body(r#"{"code":"ReplicationConfigurationNotFoundError"}"#)
            .create();

        let lookup = ops(&server).get_replication_config("primary").unwrap();
        assert_eq!(lookup, ReplicationLookup::NotConfigured);
    }

    #[test]
    fn missing_bucket_is_an_error_not_unconfigured() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/storage/buckets/gone/replication")
            .with_status(404)
            .with_body(r#"{"code":"NoSuchBucket","message":"The bucket does not exist"}"#)
            .create();

        let err = ops(&server).get_replication_config("gone").unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::NotFound);
        assert!(err.message.contains("NoSuchBucket"), "{err}");
    }

    #[test]
    fn empty_rule_list_is_malformed() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/storage/buckets/primary/replication")
            .with_status(200)
            .with_body(r#"{"rules":[]}"#)
            .create();

        let err = ops(&server).get_replication_config("primary").unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::Malformed);
    }

    #[test]
    fn server_error_is_classified_as_service() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/storage/buckets/primary/replication")
            .with_status(403)
            .with_body(r#"{"code":"AccessDenied","message":"not allowed"}"#)
            .create();

        let err = ops(&server).get_replication_config("primary").unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::Service);
        assert_eq!(err.message, "AccessDenied: not allowed");
    }

    #[test]
    fn latest_object_picks_newest_timestamp() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/storage/buckets/primary/objects")
            .with_status(200)
            .with_body(
                r#"{"contents":[
                    {"key":"a.bak","last_modified":"2026-10-01T00:00:00Z"},
                    {"key":"c.bak","last_modified":"2026-10-03T12:00:00+02:00"},
                    {"key":"b.bak","last_modified":"2026-10-02T00:00:00Z"}
                ]}"#,
            )
            .create();

        match ops(&server).list_latest_object("primary").unwrap() {
            LatestObject::Found { key, last_modified } => {
                assert_eq!(key, "c.bak");
                assert_eq!(last_modified.offset().local_minus_utc(), 2 * 3600);
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn no_contents_means_empty() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/storage/buckets/primary/objects")
            .with_status(200)
            .with_body("{}")
            .create();

        assert_eq!(
            ops(&server).list_latest_object("primary").unwrap(),
            LatestObject::Empty
        );
    }

    #[test]
    fn describe_uses_dr_region_and_maps_404() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/db/instances/dr-db")
            .match_header(REGION_HEADER, "us-west-2")
            .with_status(200)
            .with_body(r#"{"status":"backing-up"}"#)
            .create();
        server
            .mock("GET", "/db/instances/missing")
            .with_status(404)
            .with_body(r#"{"code":"DBInstanceNotFound"}"#)
            .create();

        let ops = ops(&server);
        assert_eq!(ops.describe_db_instance("dr-db").unwrap(), "backing-up");
        assert!(ops.describe_db_instance("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn dns_upsert_sends_alias_batch() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/dns/zones/Z123/changes")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "changes": [{
                    "action": "UPSERT",
                    "resource_record_set": {
                        "name": "app.example.com",
                        "type": "A",
                        "alias_target": {
                            "hosted_zone_id": "ZALB",
                            "dns_name": "dr-alb.example.com",
                            "evaluate_target_health": false
                        }
                    }
                }]
            })))
            .with_status(200)
            .with_body(r#"{"change_info":{"id":"/change/C42"}}"#)
            .create();

        let change = DnsAliasChange {
            zone_id: "Z123".into(),
            record_name: "app.example.com".into(),
            target_dns_name: "dr-alb.example.com".into(),
            target_zone_id: "ZALB".into(),
        };
        let id = ops(&server).upsert_dns_alias_record(&change).unwrap();
        m.assert();
        assert_eq!(id, "/change/C42");
    }

    #[test]
    fn unreachable_gateway_is_transport_error() {
        let ops = HttpRemoteOps::new("http://127.0.0.1:1", "us-east-1", "us-west-2").unwrap();
        let err = ops.describe_db_instance("dr-db").unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::Transport);
    }

    #[test]
    fn from_config_requires_url() {
        let cfg = Config::default();
        assert!(matches!(
            HttpRemoteOps::from_config(&cfg),
            Err(DrError::MissingConfig(_))
        ));
    }

    #[test]
    fn identifiers_are_percent_encoded_into_one_segment() {
        let ops = HttpRemoteOps::new("http://gw.internal/api/", "us-east-1", "us-west-2").unwrap();
        assert_eq!(
            ops.url(&["db", "instances", "dr/db?x#y"]).as_str(),
            "http://gw.internal/api/db/instances/dr%2Fdb%3Fx%23y"
        );
        assert_eq!(
            ops.url(&["storage", "buckets", "my bucket", "objects"]).as_str(),
            "http://gw.internal/api/storage/buckets/my%20bucket/objects"
        );
    }

    #[test]
    fn non_base_url_is_rejected() {
        assert!(matches!(
            HttpRemoteOps::new("mailto:ops@example.com", "us-east-1", "us-west-2"),
            Err(DrError::InvalidConfig(_))
        ));
    }
}
