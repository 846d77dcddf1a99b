use crate::error::{DrError, Result};
use crate::remote::DnsAliasChange;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

pub const ENV_PRIMARY_REGION: &str = "PRIMARY_REGION";
pub const ENV_DR_REGION: &str = "DR_REGION";
pub const ENV_PRIMARY_BUCKET_NAME: &str = "PRIMARY_BUCKET_NAME";
pub const ENV_EXECUTION_TARGET: &str = "STATE_MACHINE_ARN";
pub const ENV_DR_DB_INSTANCE_NAME: &str = "DR_RDS_INSTANCE_NAME";
pub const ENV_SOURCE_REPLICA_ARN: &str = "SOURCE_REPLICA_ARN";
pub const ENV_HOSTED_ZONE_ID: &str = "ROUTE53_HOSTED_ZONE_ID";
pub const ENV_DNS_RECORD_NAME: &str = "DNS_RECORD_NAME";
pub const ENV_DR_ALB_DNS_NAME: &str = "DR_ALB_DNS_NAME";
pub const ENV_DR_ALB_ZONE_ID: &str = "DR_ALB_ZONE_ID";
pub const ENV_CONTROL_PLANE_URL: &str = "DRWATCH_CONTROL_PLANE_URL";
pub const ENV_POLL_INTERVAL_SECS: &str = "DRWATCH_POLL_INTERVAL_SECS";
pub const ENV_MAX_POLL_ATTEMPTS: &str = "DRWATCH_MAX_POLL_ATTEMPTS";
pub const ENV_PROVISION_STRATEGY: &str = "DRWATCH_PROVISION_STRATEGY";
pub const ENV_SINGLE_FLIGHT: &str = "DRWATCH_SINGLE_FLIGHT";
pub const ENV_TICK_MILLIS: &str = "DRWATCH_TICK_MILLIS";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DnsConfig
// ---------------------------------------------------------------------------

/// Target of the DNS cutover: the record to repoint and the DR load balancer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub hosted_zone_id: Option<String>,
    #[serde(default)]
    pub record_name: Option<String>,
    #[serde(default)]
    pub target_dns_name: Option<String>,
    #[serde(default)]
    pub target_zone_id: Option<String>,
}

impl DnsConfig {
    /// Environment names of the settings that are unset.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.hosted_zone_id) {
            missing.push(ENV_HOSTED_ZONE_ID);
        }
        if is_blank(&self.record_name) {
            missing.push(ENV_DNS_RECORD_NAME);
        }
        if is_blank(&self.target_dns_name) {
            missing.push(ENV_DR_ALB_DNS_NAME);
        }
        if is_blank(&self.target_zone_id) {
            missing.push(ENV_DR_ALB_ZONE_ID);
        }
        missing
    }

    /// Build the alias change, or fail naming every missing setting.
    pub fn alias_change(&self) -> Result<DnsAliasChange> {
        match (
            &self.hosted_zone_id,
            &self.record_name,
            &self.target_dns_name,
            &self.target_zone_id,
        ) {
            (Some(zone), Some(name), Some(target), Some(target_zone))
                if self.missing_fields().is_empty() =>
            {
                Ok(DnsAliasChange {
                    zone_id: zone.clone(),
                    record_name: name.clone(),
                    target_dns_name: target.clone(),
                    target_zone_id: target_zone.clone(),
                })
            }
            _ => Err(DrError::MissingConfig(format!(
                "DNS settings not set: {}",
                self.missing_fields().join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PollConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    40
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

fn default_tick_millis() -> u64 {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

// ---------------------------------------------------------------------------
// ProvisionStrategy
// ---------------------------------------------------------------------------

/// How the DR database is brought up when a failover starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStrategy {
    /// Record the configured instance name without touching the control plane.
    #[default]
    Simulated,
    /// Ask the control plane to promote the source replica.
    Promote,
}

impl std::str::FromStr for ProvisionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "simulated" => Ok(ProvisionStrategy::Simulated),
            "promote" => Ok(ProvisionStrategy::Promote),
            other => Err(format!(
                "unknown provision strategy '{other}' (expected simulated or promote)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_primary_region")]
    pub primary_region: String,
    #[serde(default = "default_dr_region")]
    pub dr_region: String,
    #[serde(default)]
    pub primary_bucket_name: Option<String>,
    /// Identifier of the failover workflow that triggers are dispatched to.
    #[serde(default)]
    pub execution_target: Option<String>,
    #[serde(default = "default_dr_db_instance_name")]
    pub dr_db_instance_name: Option<String>,
    #[serde(default)]
    pub source_replica_arn: Option<String>,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub control_plane_url: Option<String>,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub provision_strategy: ProvisionStrategy,
    #[serde(default)]
    pub single_flight: bool,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Environment values that could not be parsed; reported by `validate`.
    #[serde(skip)]
    env_errors: Vec<String>,
}

fn default_primary_region() -> String {
    "us-east-1".to_string()
}

fn default_dr_region() -> String {
    "us-west-2".to_string()
}

fn default_dr_db_instance_name() -> Option<String> {
    Some("dr-replica-db".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_region: default_primary_region(),
            dr_region: default_dr_region(),
            primary_bucket_name: None,
            execution_target: None,
            dr_db_instance_name: default_dr_db_instance_name(),
            source_replica_arn: None,
            dns: DnsConfig::default(),
            control_plane_url: None,
            poll: PollConfig::default(),
            provision_strategy: ProvisionStrategy::default(),
            single_flight: false,
            scheduler: SchedulerConfig::default(),
            env_errors: Vec::new(),
        }
    }
}

impl Config {
    /// Load a YAML config file (if given) and overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let data = std::fs::read_to_string(p)?;
                serde_yaml::from_str::<Config>(&data)?
            }
            None => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Write this config as YAML, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Overlay values from `lookup`. Empty strings unset optional settings.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_PRIMARY_REGION).filter(|v| !v.trim().is_empty()) {
            self.primary_region = v;
        }
        if let Some(v) = lookup(ENV_DR_REGION).filter(|v| !v.trim().is_empty()) {
            self.dr_region = v;
        }

        let optional: [(&str, &mut Option<String>); 9] = [
            (ENV_PRIMARY_BUCKET_NAME, &mut self.primary_bucket_name),
            (ENV_EXECUTION_TARGET, &mut self.execution_target),
            (ENV_DR_DB_INSTANCE_NAME, &mut self.dr_db_instance_name),
            (ENV_SOURCE_REPLICA_ARN, &mut self.source_replica_arn),
            (ENV_HOSTED_ZONE_ID, &mut self.dns.hosted_zone_id),
            (ENV_DNS_RECORD_NAME, &mut self.dns.record_name),
            (ENV_DR_ALB_DNS_NAME, &mut self.dns.target_dns_name),
            (ENV_DR_ALB_ZONE_ID, &mut self.dns.target_zone_id),
            (ENV_CONTROL_PLANE_URL, &mut self.control_plane_url),
        ];
        for (key, slot) in optional {
            if let Some(v) = lookup(key) {
                *slot = non_empty(v);
            }
        }

        if let Some(v) = lookup(ENV_POLL_INTERVAL_SECS) {
            match v.trim().parse() {
                Ok(n) => self.poll.interval_secs = n,
                Err(_) => self.env_errors.push(format!("{ENV_POLL_INTERVAL_SECS}='{v}'")),
            }
        }
        if let Some(v) = lookup(ENV_MAX_POLL_ATTEMPTS) {
            match v.trim().parse() {
                Ok(n) => self.poll.max_attempts = n,
                Err(_) => self.env_errors.push(format!("{ENV_MAX_POLL_ATTEMPTS}='{v}'")),
            }
        }
        if let Some(v) = lookup(ENV_TICK_MILLIS) {
            match v.trim().parse() {
                Ok(n) => self.scheduler.tick_millis = n,
                Err(_) => self.env_errors.push(format!("{ENV_TICK_MILLIS}='{v}'")),
            }
        }
        if let Some(v) = lookup(ENV_PROVISION_STRATEGY) {
            match v.trim().parse() {
                Ok(s) => self.provision_strategy = s,
                Err(e) => self.env_errors.push(e),
            }
        }
        if let Some(v) = lookup(ENV_SINGLE_FLIGHT) {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.single_flight = true,
                "0" | "false" | "no" | "off" | "" => self.single_flight = false,
                _ => self.env_errors.push(format!("{ENV_SINGLE_FLIGHT}='{v}'")),
            }
        }
    }

    pub fn bucket_name(&self) -> Option<&str> {
        self.primary_bucket_name
            .as_deref()
            .filter(|b| !b.trim().is_empty())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for raw in &self.env_errors {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("could not parse environment value {raw}"),
            });
        }

        if self.bucket_name().is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "{ENV_PRIMARY_BUCKET_NAME} not set: status will report CONFIG_ERROR"
                ),
            });
        }

        if is_blank(&self.execution_target) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("{ENV_EXECUTION_TARGET} not set: failover cannot be triggered"),
            });
        }

        if is_blank(&self.dr_db_instance_name) || is_blank(&self.source_replica_arn) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "{ENV_DR_DB_INSTANCE_NAME} and {ENV_SOURCE_REPLICA_ARN} are required \
                     to provision the DR database"
                ),
            });
        }

        let missing = self.dns.missing_fields();
        if !missing.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("DNS cutover settings not set: {}", missing.join(", ")),
            });
        }

        if self.poll.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "poll.max_attempts is 0: every failover would time out".to_string(),
            });
        }

        if self.poll.interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "poll.interval_secs is 0: the DR database will be polled without pause"
                    .to_string(),
            });
        }

        if self.control_plane_url.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "{ENV_CONTROL_PLANE_URL} not set: only simulated mode is available"
                ),
            });
        }

        warnings
    }
}

fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() {
        None
    } else {
        Some(v)
    }
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
