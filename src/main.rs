//! # osm-ingest CLI (`osmi`)
//!
//! The `osmi` binary runs each stage of the OpenStreetMap ingest on its
//! own, or all of them in sequence with `osmi run`.
//!
//! ## Usage
//!
//! ```bash
//! osmi --config ./config/osmi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `osmi init` | Create the SQLite database and schema |
//! | `osmi audit <osm>` | Element counts, unexpected street suffixes, normalization preview |
//! | `osmi convert <osm>` | Write one JSON document per node/way |
//! | `osmi load <json>` | Insert converted documents into the store |
//! | `osmi report` | Analytics over the loaded collection |
//! | `osmi repair` | Fix postcodes and amenity values in place |
//! | `osmi get <osm-id>` | Print stored documents with this OSM id |
//! | `osmi run <osm>` | audit, convert, load, report, repair |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `osm_ingest=info`).

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use osm_ingest::config::{self, Config};
use osm_ingest::progress::ProgressMode;
use osm_ingest::{audit, convert, get, load, migrate, repair_cmd, report, run};

/// osm-ingest: audit, normalize, and load OpenStreetMap exports.
///
/// Commands that touch the store read `--config`. `audit` and `convert`
/// fall back to built-in defaults when the file does not exist.
#[derive(Parser)]
#[command(
    name = "osmi",
    about = "Audit, normalize, and load OpenStreetMap XML exports into a document store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/osmi.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it twice is safe.
    Init,

    /// Audit an OSM export before converting it.
    ///
    /// Counts every element name and lists street names whose suffix is
    /// not in the configured vocabulary, with the normalized form.
    Audit {
        /// OSM XML file.
        input: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Convert an OSM export to JSON documents.
    Convert {
        /// OSM XML file.
        input: PathBuf,

        /// Output path. Defaults to `<input>.json`.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Indent each document instead of one document per line.
        #[arg(long)]
        pretty: bool,

        /// Log and skip elements that cannot be shaped instead of aborting.
        #[arg(long)]
        skip_malformed: bool,
    },

    /// Insert converted documents into the store.
    Load {
        /// JSON document file, as written by `convert`.
        input: PathBuf,

        /// Remove every stored document first.
        #[arg(long)]
        replace: bool,
    },

    /// Print analytics over the loaded collection.
    Report {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Fix regional postcodes and amenity values in place.
    Repair {
        /// Show the changes without writing them.
        #[arg(long)]
        dry_run: bool,

        /// Print the change list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print stored documents with the given OSM id.
    Get {
        /// OSM element id.
        id: String,
    },

    /// Run audit, convert, load (replacing), report and repair in order.
    Run {
        /// OSM XML file.
        input: PathBuf,

        /// Output path for the converted documents. Defaults to `<input>.json`.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Report repairs without writing them.
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("osm_ingest=info,osm_ingest_core=info")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// A missing config file means built-in defaults; an unreadable or
/// invalid one is still an error.
fn load_config_or_minimal(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    // Commands that work without a config file
    match &cli.command {
        Commands::Audit { input, json } => {
            let cfg = load_config_or_minimal(&cli.config)?;
            audit::run_audit(&cfg, input, *json)?;
            return Ok(());
        }
        Commands::Convert {
            input,
            output,
            pretty,
            skip_malformed,
        } => {
            let cfg = load_config_or_minimal(&cli.config)?;
            convert::run_convert(
                &cfg,
                input,
                output.clone(),
                *pretty,
                *skip_malformed,
                progress,
            )?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load { input, replace } => {
            load::run_load(&cfg, &input, replace, progress).await?;
        }
        Commands::Report { json } => {
            report::run_report(&cfg, json).await?;
        }
        Commands::Repair { dry_run, json } => {
            repair_cmd::run_repair(&cfg, dry_run, json).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Run {
            input,
            output,
            dry_run,
        } => {
            run::run_all(&cfg, &input, output, dry_run, progress).await?;
        }
        Commands::Audit { .. } | Commands::Convert { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
