mod cmd;
mod output;
mod setup;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, executions::ExecutionsSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "drwatch",
    about = "Primary/DR health monitor and cross-region failover orchestrator",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML config file; environment variables override its values
    #[arg(long, global = true, env = "DRWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the execution store (default: ./.drwatch)
    #[arg(long, global = true, env = "DRWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Use a scripted, healthy in-memory control plane
    #[arg(long, global = true)]
    simulate: bool,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the failover scheduler
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "5000")]
        port: u16,
    },

    /// Show replication and backup health
    Status,

    /// Trigger a failover to the DR region
    Failover {
        /// Record the trigger as automatic instead of manual
        #[arg(long)]
        automatic: bool,
        /// Drive the execution to completion in this process
        #[arg(long)]
        wait: bool,
    },

    /// Inspect failover executions
    Executions {
        #[command(subcommand)]
        subcommand: ExecutionsSubcommand,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Advance every due execution by one scheduler pass
    Tick,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let setup = setup::Setup::new(cli.config, cli.data_dir.as_deref(), cli.simulate);

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(&setup, port),
        Commands::Status => cmd::status::run(&setup, cli.json),
        Commands::Failover { automatic, wait } => {
            cmd::failover::run(&setup, automatic, wait, cli.json)
        }
        Commands::Executions { subcommand } => cmd::executions::run(&setup, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&setup, subcommand, cli.json),
        Commands::Tick => cmd::tick::run(&setup, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
