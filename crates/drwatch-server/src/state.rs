use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drwatch_core::config::Config;
use drwatch_core::gateway::TriggerGateway;
use drwatch_core::orchestrator::{ExecutionDb, FailoverSettings, Orchestrator, Scheduler};
use drwatch_core::remote::RemoteOps;
use drwatch_core::status::StatusAggregator;
use tracing::{error, info};

/// Shortest pause between ticks, so an execution that keeps failing to
/// advance cannot spin the loop.
const MIN_IDLE: Duration = Duration::from_millis(20);

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub aggregator: Arc<StatusAggregator>,
    pub gateway: Arc<TriggerGateway>,
    pub scheduler: Arc<Scheduler>,
    pub db: Arc<ExecutionDb>,
}

impl AppState {
    /// Wire every component to the same adapter and execution store.
    pub fn new(config: Config, ops: Arc<dyn RemoteOps>, db: Arc<ExecutionDb>) -> Self {
        let aggregator = StatusAggregator::new(ops.clone(), &config);
        let gateway = TriggerGateway::from_config(&config, db.clone());
        let orchestrator = Orchestrator::new(ops, FailoverSettings::from(&config));
        let scheduler = Scheduler::new(db.clone(), orchestrator);
        Self {
            config: Arc::new(config),
            aggregator: Arc::new(aggregator),
            gateway: Arc::new(gateway),
            scheduler: Arc::new(scheduler),
            db,
        }
    }

    /// Drive live executions in the background.
    ///
    /// After each tick the task sleeps until the next live execution is due,
    /// and never longer than `scheduler.tick_millis` so new triggers are
    /// picked up promptly. Returns `None` outside a Tokio runtime.
    pub fn spawn_scheduler(&self) -> Option<tokio::task::JoinHandle<()>> {
        tokio::runtime::Handle::try_current().ok()?;
        let scheduler = self.scheduler.clone();
        let period = self.config.scheduler.tick();
        info!(tick_ms = period.as_millis() as u64, "starting failover scheduler");
        Some(tokio::spawn(async move {
            loop {
                let s = scheduler.clone();
                let delay = match tokio::task::spawn_blocking(move || {
                    if let Err(e) = s.tick(Utc::now()) {
                        error!(error = %e, "scheduler tick failed");
                    }
                    next_delay(s.db(), period, Utc::now())
                })
                .await
                {
                    Ok(delay) => delay,
                    Err(e) => {
                        error!(error = %e, "scheduler tick panicked");
                        period
                    }
                };
                tokio::time::sleep(delay).await;
            }
        }))
    }
}

/// Time until the earliest live execution is due, bounded by `period`.
fn next_delay(db: &ExecutionDb, period: Duration, now: DateTime<Utc>) -> Duration {
    let until_due = match db.next_due() {
        Ok(Some(at)) => (at - now).to_std().unwrap_or(Duration::ZERO),
        Ok(None) => period,
        Err(e) => {
            error!(error = %e, "failed to read next due execution");
            period
        }
    };
    until_due.min(period).max(MIN_IDLE.min(period))
}
