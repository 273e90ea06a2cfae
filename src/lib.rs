//! # osm-ingest
//!
//! Audit, normalize, and load OpenStreetMap XML exports into a document
//! store, then report on and repair the loaded data.
//!
//! The pure parts (tag classification, street normalization, element
//! shaping, the store abstraction, analytics and repairs) live in
//! `osm-ingest-core`. This crate adds the XML reader, the file-level
//! passes, the SQLite store, and the `osmi` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │ OSM XML  │──▶│  convert  │──▶│ JSON lines │──▶│   load   │
//! └────┬─────┘   └───────────┘   └────────────┘   └────┬─────┘
//!      │                                               ▼
//!      ▼                                         ┌──────────┐
//! ┌──────────┐                                   │  SQLite  │
//! │  audit   │                                   └────┬─────┘
//! └──────────┘                               ┌───────┴───────┐
//!                                            ▼               ▼
//!                                       ┌────────┐      ┌────────┐
//!                                       │ report │      │ repair │
//!                                       └────────┘      └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! osmi init
//! osmi audit sydney.osm
//! osmi convert sydney.osm            # writes sydney.osm.json
//! osmi load sydney.osm.json --replace
//! osmi report
//! osmi repair --dry-run
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`osm_xml`] | Streaming OSM XML reader |
//! | [`audit`] | Element counts and street suffix audit |
//! | [`convert`] | XML to JSON documents |
//! | [`load`] | JSON documents into the store |
//! | [`report`] | Analytics report |
//! | [`repair_cmd`] | Data-quality fixes |
//! | [`get`] | Documents by OSM id |
//! | [`run`] | The whole sequence in one command |
//! | [`sqlite_store`] | SQLite document store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`progress`] | Progress reporting on stderr |

pub mod audit;
pub mod config;
pub mod convert;
pub mod db;
pub mod get;
pub mod load;
pub mod migrate;
pub mod osm_xml;
pub mod progress;
pub mod repair_cmd;
pub mod report;
pub mod run;
pub mod sqlite_store;
