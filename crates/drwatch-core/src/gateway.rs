//! Failover trigger entry point.
//!
//! [`TriggerGateway`] checks that a workflow target is configured and hands
//! the request to a [`Dispatcher`], which starts the execution and returns
//! without waiting for it.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{Config, ENV_EXECUTION_TARGET};
use crate::error::{DrError, Result};
use crate::orchestrator::{ExecutionContext, ExecutionDb};
use crate::types::TriggerMethod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHandle {
    pub execution_id: Uuid,
    pub execution_arn: String,
}

/// Starts a workflow execution. Must not block on its progress.
pub trait Dispatcher: Send + Sync {
    fn start_execution(&self, target: &str, trigger: TriggerMethod) -> Result<ExecutionHandle>;
}

/// Dispatches into the local [`ExecutionDb`]; the scheduler picks the new
/// execution up on its next tick.
pub struct LocalDispatcher {
    db: Arc<ExecutionDb>,
    single_flight: bool,
}

impl LocalDispatcher {
    pub fn new(db: Arc<ExecutionDb>, single_flight: bool) -> Self {
        Self { db, single_flight }
    }
}

impl Dispatcher for LocalDispatcher {
    fn start_execution(&self, target: &str, trigger: TriggerMethod) -> Result<ExecutionHandle> {
        let ctx = ExecutionContext::new(target, trigger, Utc::now());
        if self.single_flight {
            self.db.insert_exclusive(&ctx)?;
        } else {
            self.db.insert(&ctx)?;
        }
        Ok(ExecutionHandle {
            execution_id: ctx.execution_id,
            execution_arn: ctx.execution_arn,
        })
    }
}

pub struct TriggerGateway {
    target: Option<String>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl TriggerGateway {
    pub fn new(target: Option<String>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { target, dispatcher }
    }

    /// Gateway for `cfg.execution_target` backed by a [`LocalDispatcher`].
    pub fn from_config(cfg: &Config, db: Arc<ExecutionDb>) -> Self {
        Self::new(
            cfg.execution_target.clone(),
            Arc::new(LocalDispatcher::new(db, cfg.single_flight)),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.target().is_some()
    }

    fn target(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Start a new failover execution.
    ///
    /// Each call starts a fresh execution unless the dispatcher refuses.
    pub fn initiate_failover(&self, trigger: TriggerMethod) -> Result<ExecutionHandle> {
        warn!(%trigger, "REAL FAILOVER TRIGGERED");
        let Some(target) = self.target() else {
            error!("{ENV_EXECUTION_TARGET} is not configured; refusing to start failover");
            return Err(DrError::MissingConfig(format!("{ENV_EXECUTION_TARGET} not set")));
        };

        match self.dispatcher.start_execution(target, trigger) {
            Ok(handle) => {
                info!(execution = %handle.execution_arn, "failover execution started");
                Ok(handle)
            }
            Err(e) => {
                error!(error = %e, "failed to start failover execution");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailoverState;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, TriggerMethod)>>,
    }

    impl Dispatcher for Recording {
        fn start_execution(&self, target: &str, trigger: TriggerMethod) -> Result<ExecutionHandle> {
            self.calls.lock().unwrap().push((target.to_string(), trigger));
            Ok(ExecutionHandle {
                execution_id: Uuid::nil(),
                execution_arn: format!("{target}:exec"),
            })
        }
    }

    struct Broken;

    impl Dispatcher for Broken {
        fn start_execution(&self, _: &str, _: TriggerMethod) -> Result<ExecutionHandle> {
            Err(DrError::Store("disk full".into()))
        }
    }

    fn open_db() -> (TempDir, Arc<ExecutionDb>) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(ExecutionDb::open(&dir.path().join("executions.redb")).unwrap());
        (dir, db)
    }

    #[test]
    fn unset_target_is_missing_config_and_dispatches_nothing() {
        let rec = Arc::new(Recording::default());
        for target in [None, Some(String::new()), Some("  ".to_string())] {
            let gw = TriggerGateway::new(target, rec.clone());
            assert!(!gw.is_configured());
            assert!(matches!(
                gw.initiate_failover(TriggerMethod::ManualDashboard),
                Err(DrError::MissingConfig(_))
            ));
        }
        assert!(rec.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn dispatches_to_target_with_trigger_method() {
        let rec = Arc::new(Recording::default());
        let gw = TriggerGateway::new(Some("arn:sm:failover".into()), rec.clone());
        let handle = gw.initiate_failover(TriggerMethod::Automatic).unwrap();
        assert_eq!(handle.execution_arn, "arn:sm:failover:exec");
        assert_eq!(
            *rec.calls.lock().unwrap(),
            vec![("arn:sm:failover".to_string(), TriggerMethod::Automatic)]
        );
    }

    #[test]
    fn dispatch_error_is_returned() {
        let gw = TriggerGateway::new(Some("arn:sm".into()), Arc::new(Broken));
        assert!(matches!(
            gw.initiate_failover(TriggerMethod::ManualDashboard),
            Err(DrError::Store(_))
        ));
    }

    #[test]
    fn local_dispatch_stores_fresh_init_executions() {
        let (_dir, db) = open_db();
        let gw = TriggerGateway::new(
            Some("arn:sm".into()),
            Arc::new(LocalDispatcher::new(db.clone(), false)),
        );
        let a = gw.initiate_failover(TriggerMethod::ManualDashboard).unwrap();
        let b = gw.initiate_failover(TriggerMethod::ManualDashboard).unwrap();
        assert_ne!(a.execution_id, b.execution_id);
        assert!(a.execution_arn.starts_with("arn:sm:"));

        let stored = db.get(a.execution_id).unwrap();
        assert_eq!(stored.current_state, FailoverState::Init);
        assert_eq!(stored.trigger_method, TriggerMethod::ManualDashboard);
        assert_eq!(db.active_count().unwrap(), 2);
    }

    #[test]
    fn single_flight_refuses_second_trigger() {
        let (_dir, db) = open_db();
        let mut cfg = Config::default();
        cfg.execution_target = Some("arn:sm".into());
        cfg.single_flight = true;
        let gw = TriggerGateway::from_config(&cfg, db.clone());

        gw.initiate_failover(TriggerMethod::ManualDashboard).unwrap();
        assert!(matches!(
            gw.initiate_failover(TriggerMethod::Automatic),
            Err(DrError::ExecutionInProgress(_))
        ));
        assert_eq!(db.list_all().unwrap().len(), 1);
    }
}
