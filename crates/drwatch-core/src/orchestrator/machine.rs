//! The failover state machine.
//!
//! ```text
//! INIT ─► PROVISIONING ─► POLLING ─► AVAILABLE ─► DNS_UPDATING ─► DNS_UPDATED
//!   │           │          ↺ │           │             │
//!   └───────────┴────────────┴───────────┴─────────────┴──────► FAILED
//! ```
//!
//! [`Orchestrator::advance`] performs exactly one transition. It never sleeps:
//! a POLLING step that sees the database still coming up returns
//! [`StepOutcome::Wait`] and expects to be invoked again later.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::context::{ExecutionContext, FailureCause};
use crate::config::{
    Config, DnsConfig, PollConfig, ProvisionStrategy, ENV_DR_DB_INSTANCE_NAME,
    ENV_SOURCE_REPLICA_ARN,
};
use crate::error::{DrError, Result};
use crate::remote::{RemoteOps, DB_AVAILABLE};
use crate::types::FailoverState;

/// What the caller should do after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Invoke again right away.
    Continue,
    /// Invoke again after the given delay.
    Wait(Duration),
    /// The execution reached DNS_UPDATED or FAILED.
    Finished,
}

/// Settings the workflow reads; a slice of [`Config`].
#[derive(Debug, Clone, Default)]
pub struct FailoverSettings {
    pub dr_db_instance_name: Option<String>,
    pub source_replica_arn: Option<String>,
    pub dns: DnsConfig,
    pub poll: PollConfig,
    pub provision_strategy: ProvisionStrategy,
}

impl From<&Config> for FailoverSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            dr_db_instance_name: cfg.dr_db_instance_name.clone(),
            source_replica_arn: cfg.source_replica_arn.clone(),
            dns: cfg.dns.clone(),
            poll: cfg.poll.clone(),
            provision_strategy: cfg.provision_strategy,
        }
    }
}

/// Result of a single step before it is applied to the context.
enum Step {
    To(FailoverState),
    Stay(Duration),
    Done { change_id: String },
}

type StepResult = std::result::Result<Step, FailureCause>;

pub struct Orchestrator {
    ops: Arc<dyn RemoteOps>,
    settings: FailoverSettings,
}

impl Orchestrator {
    pub fn new(ops: Arc<dyn RemoteOps>, settings: FailoverSettings) -> Self {
        Self { ops, settings }
    }

    /// Execute one transition of `ctx`.
    ///
    /// Workflow failures are recorded in `ctx` as FAILED; `Err` is reserved
    /// for invoking a finished execution.
    pub fn advance(&self, ctx: &mut ExecutionContext, now: DateTime<Utc>) -> Result<StepOutcome> {
        let from = ctx.current_state;
        let step = match from {
            FailoverState::Init => self.provision(ctx),
            FailoverState::Provisioning => Ok(Step::To(FailoverState::Polling)),
            FailoverState::Polling => self.poll(ctx),
            FailoverState::Available => self.prepare_dns(),
            FailoverState::DnsUpdating => self.update_dns(),
            FailoverState::DnsUpdated | FailoverState::Failed => {
                return Err(DrError::InvalidTransition {
                    from: from.to_string(),
                    to: from.to_string(),
                    reason: "execution already finished".to_string(),
                })
            }
        };

        let id = ctx.execution_id;
        let outcome = match step {
            Ok(Step::To(to)) => {
                ctx.transition(to, now)?;
                info!(execution = %id, %from, %to, "state transition");
                StepOutcome::Continue
            }
            Ok(Step::Stay(wait)) => {
                ctx.updated_at = now;
                info!(
                    execution = %id,
                    attempts = ctx.poll_attempts,
                    wait_secs = wait.as_secs(),
                    "DR database not yet available"
                );
                StepOutcome::Wait(wait)
            }
            Ok(Step::Done { change_id }) => {
                ctx.succeed(change_id.clone(), now)?;
                info!(execution = %id, %change_id, "failover complete: DNS updated");
                StepOutcome::Finished
            }
            Err(cause) => {
                error!(execution = %id, state = %from, %cause, "failover failed");
                ctx.fail(cause, now)?;
                StepOutcome::Finished
            }
        };

        ctx.next_step_at = match outcome {
            StepOutcome::Wait(wait) => chrono::Duration::from_std(wait)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            _ => now,
        };
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn provision(&self, ctx: &mut ExecutionContext) -> StepResult {
        let instance = required(&self.settings.dr_db_instance_name, ENV_DR_DB_INSTANCE_NAME)?;
        let source = required(&self.settings.source_replica_arn, ENV_SOURCE_REPLICA_ARN)?;

        let db_identifier = match self.settings.provision_strategy {
            ProvisionStrategy::Simulated => {
                info!(%source, %instance, "simulating DR database promotion");
                instance.to_string()
            }
            ProvisionStrategy::Promote => {
                info!(%source, %instance, "promoting read replica");
                self.ops
                    .promote_read_replica(source, instance)
                    .map_err(|e| FailureCause::remote(&e))?
            }
        };

        ctx.db_identifier = Some(db_identifier);
        Ok(Step::To(FailoverState::Provisioning))
    }

    fn poll(&self, ctx: &mut ExecutionContext) -> StepResult {
        let db = ctx
            .db_identifier
            .clone()
            .ok_or_else(|| FailureCause::config("no DR database identifier was recorded"))?;

        let status = match self.ops.describe_db_instance(&db) {
            Ok(status) if status == DB_AVAILABLE => return Ok(Step::To(FailoverState::Available)),
            Ok(status) => status,
            Err(e) if e.is_not_found() => {
                warn!(%db, "DR database not visible yet");
                "not-found".to_string()
            }
            Err(e) => return Err(FailureCause::remote(&e)),
        };

        ctx.poll_attempts += 1;
        if ctx.poll_attempts >= self.settings.poll.max_attempts {
            return Err(FailureCause::from(DrError::Timeout {
                resource: format!("{db} (last status: {status})"),
                attempts: ctx.poll_attempts,
            }));
        }
        Ok(Step::Stay(self.settings.poll.interval()))
    }

    fn prepare_dns(&self) -> StepResult {
        self.settings.dns.alias_change().map_err(FailureCause::from)?;
        Ok(Step::To(FailoverState::DnsUpdating))
    }

    fn update_dns(&self) -> StepResult {
        let change = self.settings.dns.alias_change().map_err(FailureCause::from)?;
        info!(
            record = %change.record_name,
            target = %change.target_dns_name,
            "updating DNS record"
        );
        let change_id = self
            .ops
            .upsert_dns_alias_record(&change)
            .map_err(|e| FailureCause::remote(&e))?;
        Ok(Step::Done { change_id })
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> std::result::Result<&'a str, FailureCause> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| FailureCause::config(format!("{name} not set")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
