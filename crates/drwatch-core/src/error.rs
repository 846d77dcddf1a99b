use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum DrError {
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("timed out after {attempts} polls of '{resource}'")]
    Timeout { resource: String, attempts: u32 },

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("invalid trigger method '{0}': expected manual_dashboard or automatic")]
    InvalidTriggerMethod(String),

    #[error("invalid execution id '{0}'")]
    InvalidExecutionId(String),

    #[error("failover already in progress: {0}")]
    ExecutionInProgress(String),

    #[error("execution store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DrError>;
