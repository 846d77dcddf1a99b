//! Tick loop over the execution store.
//!
//! Each [`Scheduler::tick`] loads every execution due by `now` and advances
//! it until it either finishes or asks to wait. The context is saved after
//! every step, so a crash loses at most the step in flight.
//! [`drive_to_completion`] follows the same rule for a single execution
//! driven in the foreground.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::context::ExecutionContext;
use super::db::ExecutionDb;
use super::machine::{Orchestrator, StepOutcome};
use crate::error::Result;

/// Counts from one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Executions that were due and got at least one step.
    pub advanced: usize,
    /// Executions that reached a terminal state during this tick.
    pub finished: usize,
    /// Executions rescheduled for a later tick.
    pub waiting: usize,
    /// Executions whose processing hit a store or transition error.
    pub errors: usize,
}

pub struct Scheduler {
    db: Arc<ExecutionDb>,
    orchestrator: Orchestrator,
}

impl Scheduler {
    pub fn new(db: Arc<ExecutionDb>, orchestrator: Orchestrator) -> Self {
        Self { db, orchestrator }
    }

    pub fn db(&self) -> &Arc<ExecutionDb> {
        &self.db
    }

    /// Advance every execution due by `now`.
    ///
    /// Only reading the due set can fail the tick as a whole; an error on one
    /// execution is logged and counted, and the rest still run.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let due = self.db.range_due(now)?;
        let mut report = TickReport::default();
        for mut ctx in due {
            report.advanced += 1;
            match self.drive(&mut ctx, now) {
                Ok(StepOutcome::Finished) => report.finished += 1,
                Ok(_) => report.waiting += 1,
                Err(e) => {
                    error!(execution = %ctx.execution_id, error = %e, "failed to advance execution");
                    report.errors += 1;
                }
            }
        }
        if report.advanced > 0 {
            debug!(?report, "scheduler tick");
        }
        Ok(report)
    }

    fn drive(&self, ctx: &mut ExecutionContext, now: DateTime<Utc>) -> Result<StepOutcome> {
        loop {
            let outcome = self.orchestrator.advance(ctx, now)?;
            self.db.save(ctx)?;
            if outcome != StepOutcome::Continue {
                return Ok(outcome);
            }
        }
    }
}

/// Drive execution `id` until it finishes, saving after every step.
///
/// The store is reopened through `open` for each step and closed again
/// before `wait` is called, so other processes can read and tick it while
/// this one sleeps. Each step starts from the stored context; if someone
/// else finished the execution in the meantime, it is returned as found.
pub fn drive_to_completion<O, W>(
    orchestrator: &Orchestrator,
    id: Uuid,
    mut open: O,
    mut wait: W,
) -> Result<ExecutionContext>
where
    O: FnMut() -> Result<ExecutionDb>,
    W: FnMut(Duration),
{
    loop {
        let (ctx, outcome) = {
            let db = open()?;
            let mut ctx = db.get(id)?;
            if ctx.is_terminal() {
                return Ok(ctx);
            }
            let outcome = orchestrator.advance(&mut ctx, Utc::now())?;
            db.save(&ctx)?;
            (ctx, outcome)
        };
        match outcome {
            StepOutcome::Continue => {}
            StepOutcome::Wait(d) => {
                info!(execution = %id, wait_secs = d.as_secs(), "waiting for DR database");
                wait(d);
            }
            StepOutcome::Finished => return Ok(ctx),
        }
    }
}
