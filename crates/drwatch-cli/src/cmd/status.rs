use chrono::Utc;
use drwatch_core::status::StatusAggregator;

use crate::output::{print_json, print_table};
use crate::setup::Setup;

pub fn run(setup: &Setup, json: bool) -> anyhow::Result<()> {
    let config = setup.load_config()?;
    let ops = setup.remote_ops(&config)?;
    let snapshot = StatusAggregator::new(ops, &config).snapshot(Utc::now());

    if json {
        return print_json(&snapshot);
    }

    println!("Overall: {}", snapshot.overall_status);
    println!(
        "Primary: {} (bucket {})   DR: {}",
        snapshot.primary_site.region, snapshot.primary_site.bucket_name, snapshot.dr_site.region
    );
    println!();
    let backup = &snapshot.backup_details;
    print_table(
        &["COMPONENT", "STATUS", "DETAILS"],
        vec![
            vec![
                "replication".to_string(),
                snapshot.primary_site.replication_status.status.to_string(),
                snapshot.primary_site.replication_status.details.clone(),
            ],
            vec![
                "backup".to_string(),
                backup.freshness_status.to_string(),
                format!("{} @ {}", backup.last_backup_file, backup.last_backup_time),
            ],
        ],
    );
    Ok(())
}
