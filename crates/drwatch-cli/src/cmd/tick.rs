use chrono::Utc;
use drwatch_core::orchestrator::{FailoverSettings, Orchestrator, Scheduler};

use crate::output::print_json;
use crate::setup::Setup;

/// Run a single scheduler pass over due executions.
pub fn run(setup: &Setup, json: bool) -> anyhow::Result<()> {
    let config = setup.load_config()?;
    let db = setup.open_db()?;
    let ops = setup.remote_ops_for(&config, &db)?;
    let orchestrator = Orchestrator::new(ops, FailoverSettings::from(&config));
    let scheduler = Scheduler::new(db.clone(), orchestrator);
    let report = scheduler.tick(Utc::now())?;

    if json {
        print_json(&serde_json::json!({
            "advanced": report.advanced,
            "finished": report.finished,
            "waiting": report.waiting,
            "errors": report.errors,
            "active": db.active_count()?,
        }))?;
    } else {
        println!(
            "advanced {}  finished {}  waiting {}  errors {}",
            report.advanced, report.finished, report.waiting, report.errors
        );
    }
    if report.errors > 0 {
        anyhow::bail!("{} execution(s) could not be advanced", report.errors);
    }
    Ok(())
}
