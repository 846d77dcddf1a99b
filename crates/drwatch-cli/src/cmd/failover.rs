use drwatch_core::gateway::TriggerGateway;
use drwatch_core::orchestrator::{
    drive_to_completion, ExecutionResult, FailoverSettings, Orchestrator,
};
use drwatch_core::types::{FailoverState, TriggerMethod};

use crate::output::print_json;
use crate::setup::Setup;

pub fn run(setup: &Setup, automatic: bool, wait: bool, json: bool) -> anyhow::Result<()> {
    let config = setup.load_config()?;
    let db = setup.open_db()?;
    let trigger = if automatic {
        TriggerMethod::Automatic
    } else {
        TriggerMethod::ManualDashboard
    };

    let handle = TriggerGateway::from_config(&config, db).initiate_failover(trigger)?;

    if !wait {
        if json {
            print_json(&serde_json::json!({
                "message": "Failover process initiated successfully.",
                "executionArn": handle.execution_arn,
                "executionId": handle.execution_id,
            }))?;
        } else {
            println!("Failover process initiated successfully.");
            println!("execution: {}", handle.execution_arn);
        }
        return Ok(());
    }

    // Drive the new execution here, one persisted step at a time.
    let orchestrator = Orchestrator::new(setup.remote_ops(&config)?, FailoverSettings::from(&config));
    if !json {
        println!("execution: {}", handle.execution_arn);
    }
    let ctx = drive_to_completion(
        &orchestrator,
        handle.execution_id,
        || setup.open_db_waiting(),
        std::thread::sleep,
    )?;

    if json {
        print_json(&ctx)?;
    } else {
        for t in &ctx.history {
            println!("  {}  {} → {}", t.at.format("%H:%M:%S"), t.from, t.to);
        }
        println!("final state: {}", ctx.current_state);
    }

    match (&ctx.current_state, &ctx.result) {
        (FailoverState::DnsUpdated, _) => Ok(()),
        (_, Some(ExecutionResult::Failed { cause })) => anyhow::bail!("failover failed: {cause}"),
        (state, _) => anyhow::bail!("failover stopped in {state}"),
    }
}
