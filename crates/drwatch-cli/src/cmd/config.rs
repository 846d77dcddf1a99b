use std::path::{Path, PathBuf};

use clap::Subcommand;
use drwatch_core::config::{Config, WarnLevel};

use crate::output::print_json;
use crate::setup::Setup;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config (file plus environment)
    Show,
    /// Validate the config for common mistakes
    Validate,
    /// Write the effective config to a YAML file
    Init {
        /// Destination (default: the --config path, else ./drwatch.yaml)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(setup: &Setup, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(setup, json),
        ConfigSubcommand::Validate => validate(setup, json),
        ConfigSubcommand::Init { path, force } => init(setup, path, force, json),
    }
}

fn init(setup: &Setup, path: Option<PathBuf>, force: bool, json: bool) -> anyhow::Result<()> {
    let dest = path
        .or_else(|| setup.config_path.clone())
        .unwrap_or_else(|| PathBuf::from("drwatch.yaml"));
    if dest.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", dest.display());
    }

    // A missing --config file is the one being created.
    let config = match setup.config_path.as_deref() {
        Some(p) if p.exists() => setup.load_config()?,
        _ => Config::load(None::<&Path>)?,
    };
    config.save(&dest)?;

    if json {
        print_json(&serde_json::json!({ "written": dest }))
    } else {
        println!("wrote {}", dest.display());
        Ok(())
    }
}

fn show(setup: &Setup, json: bool) -> anyhow::Result<()> {
    let config = setup.load_config()?;
    if json {
        print_json(&config)
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
        Ok(())
    }
}

fn validate(setup: &Setup, json: bool) -> anyhow::Result<()> {
    let config = setup.load_config()?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
