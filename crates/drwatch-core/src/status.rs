//! Read-path health of the primary site.
//!
//! Nothing here returns an error: every failure becomes a [`StatusLevel`]
//! with a human-readable detail so partial information can still be shown.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::{Config, ENV_PRIMARY_BUCKET_NAME};
use crate::remote::{LatestObject, RemoteOps, ReplicationLookup};
use crate::types::StatusLevel;

const NOT_APPLICABLE: &str = "N/A";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: StatusLevel,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDetails {
    pub last_backup_file: String,
    pub last_backup_time: String,
    pub freshness_status: StatusLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimarySite {
    pub region: String,
    pub bucket_name: String,
    pub replication_status: ComponentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrSite {
    pub region: String,
}

/// The `/api/status` document. Recomputed per request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub overall_status: StatusLevel,
    pub last_checked: DateTime<Utc>,
    pub primary_site: PrimarySite,
    pub dr_site: DrSite,
    pub backup_details: BackupDetails,
}

// ---------------------------------------------------------------------------
// Component computations
// ---------------------------------------------------------------------------

pub fn compute_replication_status(ops: &dyn RemoteOps, bucket: Option<&str>) -> ComponentStatus {
    let Some(bucket) = bucket.filter(|b| !b.trim().is_empty()) else {
        return ComponentStatus {
            status: StatusLevel::ConfigError,
            details: format!("{ENV_PRIMARY_BUCKET_NAME} not set."),
        };
    };

    match ops.get_replication_config(bucket) {
        Ok(ReplicationLookup::Configured(rule)) => {
            let (status, word) = if rule.enabled {
                (StatusLevel::Operational, "Enabled")
            } else {
                (StatusLevel::Error, "Disabled")
            };
            ComponentStatus {
                status,
                details: format!("Replication rule '{}' is {word}.", rule.id),
            }
        }
        Ok(ReplicationLookup::NotConfigured) => {
            warn!(bucket, "no replication configuration found");
            ComponentStatus {
                status: StatusLevel::Degraded,
                details: "No replication configured.".to_string(),
            }
        }
        Err(e) => {
            error!(bucket, error = %e, "error getting replication status");
            ComponentStatus {
                status: StatusLevel::Error,
                details: e.message,
            }
        }
    }
}

/// Freshness band of a backup of the given age.
pub fn classify_backup_age(age: Duration) -> StatusLevel {
    if age <= Duration::days(1) {
        StatusLevel::Operational
    } else if age <= Duration::days(3) {
        StatusLevel::Degraded
    } else {
        StatusLevel::Error
    }
}

pub fn compute_backup_freshness(
    ops: &dyn RemoteOps,
    bucket: Option<&str>,
    now: DateTime<Utc>,
) -> BackupDetails {
    let Some(bucket) = bucket.filter(|b| !b.trim().is_empty()) else {
        return BackupDetails {
            last_backup_file: NOT_APPLICABLE.to_string(),
            last_backup_time: NOT_APPLICABLE.to_string(),
            freshness_status: StatusLevel::ConfigError,
        };
    };

    match ops.list_latest_object(bucket) {
        Ok(LatestObject::Found { key, last_modified }) => {
            let now_local = now.with_timezone(last_modified.offset());
            BackupDetails {
                last_backup_file: key,
                last_backup_time: last_modified.format(TIME_FORMAT).to_string(),
                freshness_status: classify_backup_age(now_local - last_modified),
            }
        }
        Ok(LatestObject::Empty) => BackupDetails {
            last_backup_file: "None found".to_string(),
            last_backup_time: NOT_APPLICABLE.to_string(),
            freshness_status: StatusLevel::Degraded,
        },
        Err(e) => {
            error!(bucket, error = %e, "error listing objects");
            BackupDetails {
                last_backup_file: "Error".to_string(),
                last_backup_time: "Error".to_string(),
                freshness_status: StatusLevel::Error,
            }
        }
    }
}

/// Fold sub-statuses: any ERROR/CONFIG_ERROR wins, then DEGRADED, else OPERATIONAL.
pub fn compute_overall_status(statuses: &[StatusLevel]) -> StatusLevel {
    if statuses.iter().any(|s| s.is_failing()) {
        StatusLevel::Error
    } else if statuses.contains(&StatusLevel::Degraded) {
        StatusLevel::Degraded
    } else {
        StatusLevel::Operational
    }
}

// ---------------------------------------------------------------------------
// StatusAggregator
// ---------------------------------------------------------------------------

pub struct StatusAggregator {
    ops: Arc<dyn RemoteOps>,
    primary_region: String,
    dr_region: String,
    bucket: Option<String>,
}

impl StatusAggregator {
    pub fn new(ops: Arc<dyn RemoteOps>, cfg: &Config) -> Self {
        Self {
            ops,
            primary_region: cfg.primary_region.clone(),
            dr_region: cfg.dr_region.clone(),
            bucket: cfg.bucket_name().map(str::to_string),
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> StatusSnapshot {
        let bucket = self.bucket.as_deref();
        let replication = compute_replication_status(self.ops.as_ref(), bucket);
        let backup = compute_backup_freshness(self.ops.as_ref(), bucket, now);
        let overall = compute_overall_status(&[replication.status, backup.freshness_status]);

        StatusSnapshot {
            overall_status: overall,
            last_checked: now,
            primary_site: PrimarySite {
                region: self.primary_region.clone(),
                bucket_name: bucket.unwrap_or("Not Configured").to_string(),
                replication_status: replication,
            },
            dr_site: DrSite {
                region: self.dr_region.clone(),
            },
            backup_details: backup,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
