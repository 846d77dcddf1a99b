//! `ExecutionContext`: the single record threaded through every step of a
//! failover execution.
//!
//! | field           | written by            | read by                 |
//! |-----------------|-----------------------|-------------------------|
//! | `execution_id`  | trigger               | everyone                |
//! | `current_state` | orchestrator          | scheduler, API          |
//! | `db_identifier` | INIT (provisioning)   | POLLING                 |
//! | `poll_attempts` | POLLING               | POLLING (timeout check) |
//! | `result`        | terminal transition   | API                     |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{DrError, Result};
use crate::remote::RemoteError;
use crate::types::{FailoverState, TriggerMethod};

// ---------------------------------------------------------------------------
// FailureCause
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    ConfigError,
    RemoteError,
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::ConfigError => "CONFIG_ERROR",
            FailureKind::RemoteError => "REMOTE_ERROR",
            FailureKind::Timeout => "TIMEOUT",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureCause {
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ConfigError,
            message: message.into(),
        }
    }

    pub fn remote(err: &RemoteError) -> Self {
        Self {
            kind: FailureKind::RemoteError,
            message: err.message.clone(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<DrError> for FailureCause {
    fn from(err: DrError) -> Self {
        match err {
            DrError::MissingConfig(msg) => FailureCause::config(msg),
            DrError::Remote(e) => FailureCause::remote(&e),
            DrError::Timeout { resource, attempts } => FailureCause::timeout(format!(
                "'{resource}' not available after {attempts} polls"
            )),
            other => FailureCause {
                kind: FailureKind::RemoteError,
                message: other.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionResult {
    Succeeded { change_id: String },
    Failed { cause: FailureCause },
}

// ---------------------------------------------------------------------------
// StateTransition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: FailoverState,
    pub to: FailoverState,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_id: Uuid,
    pub execution_arn: String,
    pub trigger_method: TriggerMethod,
    pub current_state: FailoverState,
    #[serde(default)]
    pub db_identifier: Option<String>,
    #[serde(default)]
    pub poll_attempts: u32,
    #[serde(default)]
    pub result: Option<ExecutionResult>,
    #[serde(default)]
    pub history: Vec<StateTransition>,
    pub next_step_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// A fresh execution in `INIT`, due immediately.
    pub fn new(target: &str, trigger_method: TriggerMethod, now: DateTime<Utc>) -> Self {
        let execution_id = Uuid::new_v4();
        Self {
            execution_id,
            execution_arn: format!("{target}:{execution_id}"),
            trigger_method,
            current_state: FailoverState::Init,
            db_identifier: None,
            poll_attempts: 0,
            result: None,
            history: Vec::new(),
            next_step_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current_state.is_terminal()
    }

    /// Move along one edge of the workflow graph.
    ///
    /// Entering a terminal state goes through [`Self::succeed`] or
    /// [`Self::fail`] so the result is recorded with it.
    pub fn transition(&mut self, to: FailoverState, now: DateTime<Utc>) -> Result<()> {
        if to.is_terminal() {
            return Err(self.invalid(to, "terminal states carry a result"));
        }
        self.enter(to, now)
    }

    pub fn succeed(&mut self, change_id: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        self.enter(FailoverState::DnsUpdated, now)?;
        self.result = Some(ExecutionResult::Succeeded {
            change_id: change_id.into(),
        });
        Ok(())
    }

    pub fn fail(&mut self, cause: FailureCause, now: DateTime<Utc>) -> Result<()> {
        self.enter(FailoverState::Failed, now)?;
        self.result = Some(ExecutionResult::Failed { cause });
        Ok(())
    }

    fn enter(&mut self, to: FailoverState, now: DateTime<Utc>) -> Result<()> {
        let from = self.current_state;
        if !from.can_transition_to(to) {
            return Err(self.invalid(to, "not an edge of the failover workflow"));
        }
        if from != to {
            self.history.push(StateTransition { from, to, at: now });
        }
        self.current_state = to;
        self.updated_at = now;
        Ok(())
    }

    fn invalid(&self, to: FailoverState, reason: &str) -> DrError {
        DrError::InvalidTransition {
            from: self.current_state.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        }
    }
}
