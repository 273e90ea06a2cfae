//! `osmi repair`: data-quality fixes against the loaded collection.

use anyhow::Result;

use osm_ingest_core::repair::{run_repairs, RepairReport, RepairRule};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_repair(config: &Config, dry_run: bool, json: bool) -> Result<RepairReport> {
    let options = config.repair.options()?;
    let store = SqliteStore::open(config).await?;
    let result = run_repairs(&store, &options, dry_run).await;
    store.close().await;
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    let verb = if dry_run { "would change" } else { "changed" };
    for change in &report.changes {
        println!(
            "  {} {}: {:?} -> {:?}",
            change.osm_id.as_deref().unwrap_or("?"),
            change.field,
            change.before,
            change.after
        );
    }
    println!(
        "Repair {}: {} postcodes, {} amenity typos, {} amenity separators{}",
        verb,
        report.count(RepairRule::RegionalPostcode),
        report.count(RepairRule::AmenityTypo),
        report.count(RepairRule::AmenitySeparator),
        if report.skipped > 0 {
            format!(" ({} skipped, changed concurrently)", report.skipped)
        } else {
            String::new()
        }
    );
    Ok(report)
}
