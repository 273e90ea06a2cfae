//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is the only way the loader, analytics and
//! repair passes touch storage. It models a single collection of JSON
//! documents, each with a store-assigned [`DocId`] that is never written
//! into the document body.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::pipeline::{run_stages, Pipeline};
use crate::query::{lookup, set_path, values_equal, Filter};

/// Store-assigned document identity.
pub type DocId = i64;

/// A document together with its store identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocId,
    pub body: Value,
}

/// Abstract document collection.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_one`](DocumentStore::insert_one) | Insert a document, returning its identity |
/// | [`find`](DocumentStore::find) | All documents matching a filter, in insertion order |
/// | [`get`](DocumentStore::get) | One document by identity |
/// | [`replace_one`](DocumentStore::replace_one) | Overwrite a document by identity |
/// | [`clear`](DocumentStore::clear) | Remove every document |
/// | [`count`](DocumentStore::count) | Number of matching documents |
/// | [`distinct`](DocumentStore::distinct) | Distinct values of a field |
/// | [`aggregate`](DocumentStore::aggregate) | Run a [`Pipeline`] |
/// | [`update_field_if`](DocumentStore::update_field_if) | Conditional single-field update |
///
/// The last four have default implementations built on `find`, `get` and
/// `replace_one`; backends override them when they can do better.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_one(&self, doc: &Value) -> Result<DocId>;

    async fn find(&self, filter: &Filter) -> Result<Vec<StoredDocument>>;

    async fn get(&self, id: DocId) -> Result<Option<StoredDocument>>;

    /// Overwrite the whole body. Returns `false` if `id` does not exist.
    async fn replace_one(&self, id: DocId, doc: &Value) -> Result<bool>;

    /// Remove every document, returning how many were removed.
    async fn clear(&self) -> Result<u64>;

    async fn count(&self, filter: &Filter) -> Result<u64> {
        Ok(self.find(filter).await?.len() as u64)
    }

    /// Distinct values of `path` across documents that have it, in first-seen
    /// order.
    async fn distinct(&self, path: &str) -> Result<Vec<Value>> {
        let docs = self.find(&Filter::exists(path)).await?;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for doc in &docs {
            if let Some(v) = lookup(&doc.body, path) {
                if seen.insert(v.to_string()) {
                    out.push(v.clone());
                }
            }
        }
        Ok(out)
    }

    /// Run a pipeline. A leading match stage is pushed down into `find`.
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Value>> {
        let (filter, rest) = pipeline.split_leading_match();
        let docs = self.find(filter.unwrap_or(&Filter::All)).await?;
        Ok(run_stages(rest, docs.into_iter().map(|d| d.body).collect()))
    }

    /// Set `path` to `new` only if it currently equals `expected`.
    ///
    /// Returns whether the document was changed. The default is
    /// [`replace_field_if`], which is not atomic against other writers.
    async fn update_field_if(
        &self,
        id: DocId,
        path: &str,
        expected: &Value,
        new: Value,
    ) -> Result<bool> {
        replace_field_if(self, id, path, expected, new).await
    }
}

/// Read-modify-replace conditional update over [`DocumentStore::get`] and
/// [`DocumentStore::replace_one`].
pub async fn replace_field_if<S: DocumentStore + ?Sized>(
    store: &S,
    id: DocId,
    path: &str,
    expected: &Value,
    new: Value,
) -> Result<bool> {
    let Some(mut doc) = store.get(id).await? else {
        return Ok(false);
    };
    match lookup(&doc.body, path) {
        Some(current) if values_equal(current, expected) => {}
        _ => return Ok(false),
    }
    if !set_path(&mut doc.body, path, new) {
        return Ok(false);
    }
    store.replace_one(id, &doc.body).await
}
