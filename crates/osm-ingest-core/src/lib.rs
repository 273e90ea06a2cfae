//! # osm-ingest core
//!
//! Shared, I/O-free logic for osm-ingest: the OpenStreetMap element model,
//! tag classification, street-name auditing and normalization, element
//! shaping, the document store abstraction, and the analytics and repair
//! passes that run against any store.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. XML reading and
//! the SQLite backend live in the `osm-ingest` application crate.

pub mod analytics;
pub mod classify;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod repair;
pub mod shape;
pub mod store;
pub mod street;
