//! `osmi run`: the full sequence over one export.
//!
//! audit, convert, load (replacing the collection), report, repair. Each
//! stage is the same function its own subcommand calls, so the output is
//! the concatenation of the individual commands.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::progress::ProgressMode;
use crate::{audit, convert, load, repair_cmd, report};

pub async fn run_all(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    info!(stage = "audit", "starting");
    audit::run_audit(config, input, false)?;
    println!();

    info!(stage = "convert", "starting");
    let (output, _) = convert::run_convert(config, input, output, false, false, progress)?;

    info!(stage = "load", "starting");
    load::run_load(config, &output, true, progress).await?;
    println!();

    info!(stage = "report", "starting");
    report::run_report(config, false).await?;
    println!();

    info!(stage = "repair", "starting");
    repair_cmd::run_repair(config, dry_run, false).await?;
    Ok(())
}
