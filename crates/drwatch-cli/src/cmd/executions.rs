use clap::Subcommand;
use drwatch_core::orchestrator::ExecutionResult;
use drwatch_core::DrError;
use uuid::Uuid;

use crate::output::{print_json, print_table};
use crate::setup::Setup;

#[derive(Subcommand)]
pub enum ExecutionsSubcommand {
    /// List executions, newest first
    List,
    /// Show one execution with its transition history
    Show {
        /// Execution id (UUID)
        id: String,
    },
}

pub fn run(setup: &Setup, subcmd: ExecutionsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ExecutionsSubcommand::List => list(setup, json),
        ExecutionsSubcommand::Show { id } => show(setup, &id, json),
    }
}

fn outcome(result: &Option<ExecutionResult>) -> String {
    match result {
        None => "-".to_string(),
        Some(ExecutionResult::Succeeded { change_id }) => format!("succeeded ({change_id})"),
        Some(ExecutionResult::Failed { cause }) => format!("failed ({})", cause.kind),
    }
}

fn list(setup: &Setup, json: bool) -> anyhow::Result<()> {
    let all = setup.open_db()?.list_all()?;
    if json {
        return print_json(&all);
    }
    if all.is_empty() {
        println!("No executions.");
        return Ok(());
    }
    let rows = all
        .iter()
        .map(|c| {
            vec![
                c.execution_id.to_string(),
                c.current_state.to_string(),
                c.trigger_method.to_string(),
                c.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                outcome(&c.result),
            ]
        })
        .collect();
    print_table(&["ID", "STATE", "TRIGGER", "CREATED", "RESULT"], rows);
    Ok(())
}

fn show(setup: &Setup, id: &str, json: bool) -> anyhow::Result<()> {
    let uuid = Uuid::parse_str(id).map_err(|_| DrError::InvalidExecutionId(id.to_string()))?;
    let ctx = setup.open_db()?.get(uuid)?;
    if json {
        return print_json(&ctx);
    }
    println!("id:        {}", ctx.execution_id);
    println!("arn:       {}", ctx.execution_arn);
    println!("trigger:   {}", ctx.trigger_method);
    println!("state:     {}", ctx.current_state);
    if let Some(db) = &ctx.db_identifier {
        println!("database:  {db} ({} polls)", ctx.poll_attempts);
    }
    println!("result:    {}", outcome(&ctx.result));
    if let Some(ExecutionResult::Failed { cause }) = &ctx.result {
        println!("cause:     {}", cause.message);
    }
    for t in &ctx.history {
        println!("  {}  {} → {}", t.at.to_rfc3339(), t.from, t.to);
    }
    Ok(())
}
