//! Analytics report over the loaded collection.
//!
//! Runs [`run_analytics`] against the SQLite store and prints either a
//! human-readable summary or the full report as JSON (`--json`).

use anyhow::Result;
use serde_json::Value;

use osm_ingest_core::analytics::{run_analytics, AnalyticsReport, KeyCount};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_report(config: &Config, json: bool) -> Result<AnalyticsReport> {
    let store = SqliteStore::open(config).await?;
    let result = run_analytics(&store, &config.analytics.options()).await;
    store.close().await;
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    Ok(report)
}

/// Group keys are JSON values; strings print bare, missing keys as `(none)`.
fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Null => "(none)".to_string(),
        other => other.to_string(),
    }
}

fn push_rows(out: &mut String, title: &str, rows: &[KeyCount]) {
    out.push_str(&format!("\n{}\n", title));
    if rows.is_empty() {
        out.push_str("  (none)\n");
    }
    for row in rows {
        out.push_str(&format!("  {:<24} {}\n", key_label(&row.key), row.count));
    }
}

pub fn render_text(report: &AnalyticsReport) -> String {
    let mut out = String::new();
    out.push_str("OSM collection report\n");
    out.push_str("=====================\n\n");
    out.push_str(&format!("  Documents:   {}\n", report.total_documents));
    out.push_str(&format!("  Nodes:       {}\n", report.total_nodes));
    out.push_str(&format!("  Ways:        {}\n", report.total_ways));
    out.push_str(&format!("  Contributors: {}\n", report.distinct_contributors));
    out.push_str(&format!("  Amenity types: {}\n", report.distinct_amenities));
    out.push_str(&format!("  Amenity-tagged documents: {}\n", report.total_amenities));

    push_rows(&mut out, "Top contributors", &report.top_contributors);

    out.push_str("\nTop contributors by share\n");
    for row in &report.top_contributor_shares {
        out.push_str(&format!(
            "  {:<24} {:.2}%\n",
            key_label(&row.key),
            row.percent * 100.0
        ));
    }

    push_rows(&mut out, "Highest postcodes", &report.highest_postcodes);
    push_rows(&mut out, "Top amenities", &report.top_amenities);
    push_rows(&mut out, "Amenities seen once", &report.single_use_amenities);
    for focus in &report.focus_postcodes {
        push_rows(
            &mut out,
            &format!("Postcodes with most '{}'", focus.amenity),
            &focus.postcodes,
        );
    }
    out
}
