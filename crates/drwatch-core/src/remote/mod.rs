//! Remote operations against the storage, database and DNS control planes.
//!
//! Each method is a single remote call with no internal retry. "Not
//! configured" and "empty" are ordinary outcomes, distinct from
//! [`RemoteError`]; callers decide how each maps to a status or a retry.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod http;
pub mod memory;

pub use http::HttpRemoteOps;
pub use memory::InMemoryRemoteOps;

/// Status string the database control plane reports once an instance serves.
pub const DB_AVAILABLE: &str = "available";

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationRule {
    pub id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationLookup {
    Configured(ReplicationRule),
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatestObject {
    Found {
        key: String,
        last_modified: DateTime<FixedOffset>,
    },
    Empty,
}

/// An UPSERT of an A-alias record pointing at a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsAliasChange {
    pub zone_id: String,
    pub record_name: String,
    pub target_dns_name: String,
    pub target_zone_id: String,
}

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The addressed resource does not exist (yet).
    NotFound,
    /// The control plane answered with a failure.
    Service,
    /// The control plane could not be reached.
    Transport,
    /// The response could not be interpreted.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Service, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Transport, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Malformed, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RemoteError {}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

// ---------------------------------------------------------------------------
// RemoteOps
// ---------------------------------------------------------------------------

/// Adapter over the cloud control planes, injected into every component.
pub trait RemoteOps: Send + Sync {
    fn get_replication_config(&self, bucket: &str) -> RemoteResult<ReplicationLookup>;

    /// The most recently modified object in `bucket`.
    fn list_latest_object(&self, bucket: &str) -> RemoteResult<LatestObject>;

    /// Current status string of a database instance, e.g. `"available"`.
    fn describe_db_instance(&self, identifier: &str) -> RemoteResult<String>;

    /// Returns the change identifier assigned by the DNS control plane.
    fn upsert_dns_alias_record(&self, change: &DnsAliasChange) -> RemoteResult<String>;

    /// Promote `source_replica` into a standalone instance named `target`.
    ///
    /// Must be safe to call again for an instance already promoted; returns
    /// the identifier of the instance to poll.
    fn promote_read_replica(&self, source_replica: &str, target: &str) -> RemoteResult<String>;
}
