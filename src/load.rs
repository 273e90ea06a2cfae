//! Loading converted documents into the store.
//!
//! The input is read as a stream of JSON values, so both the compact
//! (one per line) and the pretty output of `osmi convert` are accepted.
//! Each document is inserted with its own `insert_one` call. A failed
//! insert stops the load; documents inserted before it stay in the store.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use osm_ingest_core::store::DocumentStore;

use crate::config::Config;
use crate::progress::{ProgressEvent, ProgressMode, ProgressReporter};
use crate::sqlite_store::SqliteStore;

const PROGRESS_EVERY: u64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Documents removed by `--replace` before loading.
    pub cleared: u64,
    pub inserted: u64,
}

/// Insert every JSON value read from `input` into `store`.
pub async fn load_documents<S: DocumentStore + ?Sized, R: Read>(
    store: &S,
    input: R,
    replace: bool,
    progress: &dyn ProgressReporter,
) -> Result<LoadSummary> {
    let mut summary = LoadSummary::default();
    if replace {
        summary.cleared = store.clear().await?;
        info!(cleared = summary.cleared, "cleared collection");
    }

    for doc in serde_json::Deserializer::from_reader(input).into_iter::<Value>() {
        let doc = doc.with_context(|| {
            format!("Failed to read document #{}", summary.inserted + 1)
        })?;
        store.insert_one(&doc).await.with_context(|| {
            format!(
                "Insert failed after {} documents were loaded",
                summary.inserted
            )
        })?;
        summary.inserted += 1;
        if summary.inserted % PROGRESS_EVERY == 0 {
            progress.report(ProgressEvent::Loading {
                inserted: summary.inserted,
            });
        }
    }

    Ok(summary)
}

/// Run the load command against the configured SQLite store.
pub async fn run_load(
    config: &Config,
    path: &Path,
    replace: bool,
    progress: ProgressMode,
) -> Result<LoadSummary> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open document file: {}", path.display()))?;

    let store = SqliteStore::open(config).await?;
    let reporter = progress.reporter();
    let result = load_documents(&store, BufReader::new(file), replace, reporter.as_ref()).await;
    store.close().await;
    let summary = result?;

    if summary.cleared > 0 {
        println!("Removed {} existing documents.", summary.cleared);
    }
    println!(
        "Loaded {} documents from {}",
        summary.inserted,
        path.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use osm_ingest_core::query::Filter;
    use osm_ingest_core::store::memory::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_loads_compact_lines_in_order() {
        let input = "{\"id\":\"1\",\"type\":\"node\"}\n{\"id\":\"2\",\"type\":\"way\"}\n";
        let store = InMemoryStore::new();
        let summary = load_documents(&store, input.as_bytes(), false, &NoProgress)
            .await
            .unwrap();
        assert_eq!(summary.inserted, 2);

        let docs = store.find(&Filter::All).await.unwrap();
        assert_eq!(docs[0].body, json!({"id": "1", "type": "node"}));
        assert_eq!(docs[1].body["type"], "way");
    }

    #[tokio::test]
    async fn test_loads_pretty_output() {
        let input = "{\n  \"id\": \"1\"\n}\n{\n  \"id\": \"2\"\n}\n";
        let store = InMemoryStore::new();
        let summary = load_documents(&store, input.as_bytes(), false, &NoProgress)
            .await
            .unwrap();
        assert_eq!(summary.inserted, 2);
    }

    #[tokio::test]
    async fn test_rerun_without_replace_duplicates() {
        let input = "{\"id\":\"1\"}\n";
        let store = InMemoryStore::new();
        load_documents(&store, input.as_bytes(), false, &NoProgress)
            .await
            .unwrap();
        load_documents(&store, input.as_bytes(), false, &NoProgress)
            .await
            .unwrap();
        assert_eq!(store.count(&Filter::eq("id", "1")).await.unwrap(), 2);

        let summary = load_documents(&store, input.as_bytes(), true, &NoProgress)
            .await
            .unwrap();
        assert_eq!(summary.cleared, 2);
        assert_eq!(store.count(&Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bad_document_stops_load() {
        let input = "{\"id\":\"1\"}\n{\"id\": oops}\n{\"id\":\"3\"}\n";
        let store = InMemoryStore::new();
        let err = load_documents(&store, input.as_bytes(), false, &NoProgress)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("document #2"));
        assert_eq!(store.count(&Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let store = InMemoryStore::new();
        let summary = load_documents(&store, "".as_bytes(), false, &NoProgress)
            .await
            .unwrap();
        assert_eq!(summary, LoadSummary::default());
    }
}
