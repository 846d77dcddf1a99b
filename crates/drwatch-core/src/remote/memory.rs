//! In-process [`RemoteOps`] with scripted control-plane state.
//!
//! Backs `--simulate` mode and the test suites. Database statuses are a
//! queue: each describe call pops the front until one value is left, which
//! then repeats. Only the most recent [`CALL_LOG_LIMIT`] calls are kept.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset, Utc};

use super::{
    DnsAliasChange, LatestObject, RemoteError, RemoteOps, RemoteResult, ReplicationLookup,
    ReplicationRule, DB_AVAILABLE,
};
use crate::config::Config;
use crate::orchestrator::ExecutionContext;
use crate::types::FailoverState;

pub const CALL_LOG_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    GetReplicationConfig,
    ListLatestObject,
    DescribeDbInstance,
    UpsertDnsAliasRecord,
    PromoteReadReplica,
}

#[derive(Debug, Clone)]
struct Bucket {
    replication: ReplicationLookup,
    objects: Vec<(String, DateTime<FixedOffset>)>,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: HashMap<String, Bucket>,
    db_statuses: HashMap<String, VecDeque<String>>,
    failures: HashMap<RemoteOp, RemoteError>,
    dns_changes: Vec<DnsAliasChange>,
    promotions: Vec<(String, String)>,
    calls: VecDeque<RemoteOp>,
}

#[derive(Debug, Default)]
pub struct InMemoryRemoteOps {
    inner: Mutex<Inner>,
}

impl InMemoryRemoteOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// A healthy topology for `cfg`: replicated bucket with a fresh backup and
    /// a DR database that becomes available on the second poll.
    pub fn healthy(cfg: &Config, now: DateTime<Utc>) -> Self {
        let ops = Self::new();
        if let Some(bucket) = cfg.bucket_name() {
            ops.set_replication(
                bucket,
                ReplicationLookup::Configured(ReplicationRule {
                    id: "primary-to-dr".to_string(),
                    enabled: true,
                }),
            );
            ops.put_object(bucket, "backups/latest.sql.gz", now.fixed_offset());
        }
        if let Some(db) = cfg.dr_db_instance_name.as_deref() {
            ops.script_db_statuses(db, ["modifying", DB_AVAILABLE]);
        }
        ops
    }

    /// Carry a simulated topology over from an earlier process: a database
    /// that a live execution has already polled reports available.
    pub fn resume(&self, executions: &[ExecutionContext]) {
        let polled = executions
            .iter()
            .filter(|c| c.current_state == FailoverState::Polling && c.poll_attempts >= 1)
            .filter_map(|c| c.db_identifier.as_deref());
        for db in polled {
            self.script_db_statuses(db, [DB_AVAILABLE]);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_replication(&self, bucket: &str, replication: ReplicationLookup) {
        let mut inner = self.lock();
        let entry = inner.buckets.entry(bucket.to_string()).or_insert(Bucket {
            replication: ReplicationLookup::NotConfigured,
            objects: Vec::new(),
        });
        entry.replication = replication;
    }

    /// Register `bucket` with no objects and no replication.
    pub fn add_bucket(&self, bucket: &str) {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_insert(Bucket {
                replication: ReplicationLookup::NotConfigured,
                objects: Vec::new(),
            });
    }

    pub fn put_object(&self, bucket: &str, key: &str, last_modified: DateTime<FixedOffset>) {
        let mut inner = self.lock();
        let entry = inner.buckets.entry(bucket.to_string()).or_insert(Bucket {
            replication: ReplicationLookup::NotConfigured,
            objects: Vec::new(),
        });
        entry.objects.push((key.to_string(), last_modified));
    }

    pub fn script_db_statuses<I, S>(&self, identifier: &str, statuses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().db_statuses.insert(
            identifier.to_string(),
            statuses.into_iter().map(Into::into).collect(),
        );
    }

    /// Make every call to `op` fail with `err` until [`Self::clear_failure`].
    pub fn fail(&self, op: RemoteOp, err: RemoteError) {
        self.lock().failures.insert(op, err);
    }

    pub fn clear_failure(&self, op: RemoteOp) {
        self.lock().failures.remove(&op);
    }

    pub fn dns_changes(&self) -> Vec<DnsAliasChange> {
        self.lock().dns_changes.clone()
    }

    pub fn promotions(&self) -> Vec<(String, String)> {
        self.lock().promotions.clone()
    }

    pub fn calls(&self) -> Vec<RemoteOp> {
        self.lock().calls.iter().copied().collect()
    }

    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.lock().calls.iter().filter(|&&c| c == op).count()
    }

    /// Log the call and return the scripted failure for `op`, if any.
    fn enter(inner: &mut Inner, op: RemoteOp) -> RemoteResult<()> {
        if inner.calls.len() == CALL_LOG_LIMIT {
            inner.calls.pop_front();
        }
        inner.calls.push_back(op);
        match inner.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn no_such_bucket(bucket: &str) -> RemoteError {
    RemoteError::not_found(format!("NoSuchBucket: bucket '{bucket}' does not exist"))
}

impl RemoteOps for InMemoryRemoteOps {
    fn get_replication_config(&self, bucket: &str) -> RemoteResult<ReplicationLookup> {
        let mut inner = self.lock();
        Self::enter(&mut inner, RemoteOp::GetReplicationConfig)?;
        inner
            .buckets
            .get(bucket)
            .map(|b| b.replication.clone())
            .ok_or_else(|| no_such_bucket(bucket))
    }

    fn list_latest_object(&self, bucket: &str) -> RemoteResult<LatestObject> {
        let mut inner = self.lock();
        Self::enter(&mut inner, RemoteOp::ListLatestObject)?;
        let b = inner.buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(b.objects
            .iter()
            .max_by_key(|(_, ts)| *ts)
            .map(|(key, ts)| LatestObject::Found {
                key: key.clone(),
                last_modified: *ts,
            })
            .unwrap_or(LatestObject::Empty))
    }

    fn describe_db_instance(&self, identifier: &str) -> RemoteResult<String> {
        let mut inner = self.lock();
        Self::enter(&mut inner, RemoteOp::DescribeDbInstance)?;
        let queue = inner
            .db_statuses
            .get_mut(identifier)
            .ok_or_else(|| RemoteError::not_found(format!("DB instance '{identifier}' not found")))?;
        let status = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        status.ok_or_else(|| RemoteError::malformed(format!("no status for '{identifier}'")))
    }

    fn upsert_dns_alias_record(&self, change: &DnsAliasChange) -> RemoteResult<String> {
        let mut inner = self.lock();
        Self::enter(&mut inner, RemoteOp::UpsertDnsAliasRecord)?;
        inner.dns_changes.push(change.clone());
        Ok(format!("/change/C{:04}", inner.dns_changes.len()))
    }

    fn promote_read_replica(&self, source_replica: &str, target: &str) -> RemoteResult<String> {
        let mut inner = self.lock();
        Self::enter(&mut inner, RemoteOp::PromoteReadReplica)?;
        inner
            .promotions
            .push((source_replica.to_string(), target.to_string()));
        inner
            .db_statuses
            .entry(target.to_string())
            .or_insert_with(|| VecDeque::from(vec!["modifying".to_string()]));
        Ok(target.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_status_queue_repeats_last_value() {
        let ops = InMemoryRemoteOps::new();
        ops.script_db_statuses("db", ["creating", "available"]);
        assert_eq!(ops.describe_db_instance("db").unwrap(), "creating");
        assert_eq!(ops.describe_db_instance("db").unwrap(), "available");
        assert_eq!(ops.describe_db_instance("db").unwrap(), "available");
    }

    #[test]
    fn unknown_bucket_is_not_found() {
        let ops = InMemoryRemoteOps::new();
        assert!(ops.get_replication_config("nope").unwrap_err().is_not_found());
        assert!(ops.list_latest_object("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn scripted_failure_applies_until_cleared() {
        let ops = InMemoryRemoteOps::new();
        ops.add_bucket("b");
        ops.fail(RemoteOp::ListLatestObject, RemoteError::service("throttled"));
        assert_eq!(ops.list_latest_object("b").unwrap_err().message, "throttled");
        ops.clear_failure(RemoteOp::ListLatestObject);
        assert_eq!(ops.list_latest_object("b").unwrap(), LatestObject::Empty);
        assert_eq!(ops.call_count(RemoteOp::ListLatestObject), 2);
    }

    #[test]
    fn promotion_is_idempotent() {
        let ops = InMemoryRemoteOps::new();
        ops.script_db_statuses("dr-db", [DB_AVAILABLE]);
        assert_eq!(ops.promote_read_replica("arn:replica", "dr-db").unwrap(), "dr-db");
        assert_eq!(ops.promote_read_replica("arn:replica", "dr-db").unwrap(), "dr-db");
        // An existing status script is left alone.
        assert_eq!(ops.describe_db_instance("dr-db").unwrap(), DB_AVAILABLE);
        assert_eq!(ops.promotions().len(), 2);
    }

    #[test]
    fn healthy_topology_is_fully_populated() {
        let mut cfg = Config::default();
        cfg.primary_bucket_name = Some("primary".into());
        let ops = InMemoryRemoteOps::healthy(&cfg, Utc::now());
        assert!(matches!(
            ops.get_replication_config("primary").unwrap(),
            ReplicationLookup::Configured(ReplicationRule { enabled: true, .. })
        ));
        assert!(matches!(
            ops.list_latest_object("primary").unwrap(),
            LatestObject::Found { .. }
        ));
        assert_eq!(ops.describe_db_instance("dr-replica-db").unwrap(), "modifying");
    }

    #[test]
    fn call_log_keeps_only_recent_calls() {
        let ops = InMemoryRemoteOps::new();
        ops.add_bucket("b");
        for _ in 0..CALL_LOG_LIMIT {
            ops.list_latest_object("b").unwrap();
        }
        ops.get_replication_config("b").unwrap();
        let calls = ops.calls();
        assert_eq!(calls.len(), CALL_LOG_LIMIT);
        assert_eq!(calls.last(), Some(&RemoteOp::GetReplicationConfig));
        assert_eq!(ops.call_count(RemoteOp::ListLatestObject), CALL_LOG_LIMIT - 1);
    }

    #[test]
    fn resume_makes_polled_databases_available() {
        let mut cfg = Config::default();
        cfg.dr_db_instance_name = Some("dr-db".into());
        let ops = InMemoryRemoteOps::healthy(&cfg, Utc::now());

        let now = Utc::now();
        let fresh = ExecutionContext::new("arn:sm", crate::types::TriggerMethod::Automatic, now);
        let mut polled = fresh.clone();
        polled.current_state = FailoverState::Polling;
        polled.db_identifier = Some("dr-db".into());
        polled.poll_attempts = 1;

        ops.resume(&[fresh]);
        ops.resume(&[polled]);
        assert_eq!(ops.describe_db_instance("dr-db").unwrap(), DB_AVAILABLE);
    }
}
