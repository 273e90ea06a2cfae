//! Document retrieval by OSM id.
//!
//! OSM ids are only unique per element type and the loader does not
//! deduplicate, so a lookup may return several documents.

use anyhow::{bail, Result};
use serde_json::Value;

use osm_ingest_core::query::Filter;
use osm_ingest_core::store::DocumentStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// All documents whose `id` field equals `osm_id`, in load order.
pub async fn get_documents<S: DocumentStore + ?Sized>(
    store: &S,
    osm_id: &str,
) -> Result<Vec<Value>> {
    Ok(store
        .find(&Filter::eq("id", osm_id))
        .await?
        .into_iter()
        .map(|doc| doc.body)
        .collect())
}

pub async fn run_get(config: &Config, osm_id: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let result = get_documents(&store, osm_id).await;
    store.close().await;
    let docs = result?;

    if docs.is_empty() {
        bail!("document not found: {}", osm_id);
    }
    for doc in &docs {
        println!("{}", serde_json::to_string_pretty(doc)?);
    }
    Ok(())
}
