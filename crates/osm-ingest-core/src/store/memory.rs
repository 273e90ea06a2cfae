//! In-memory [`DocumentStore`] implementation for testing and dry runs.
//!
//! Documents live in a `BTreeMap` keyed by identity behind a
//! `std::sync::RwLock`, so `find` returns them in insertion order.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::query::Filter;

use super::{DocId, DocumentStore, StoredDocument};

#[derive(Default)]
struct Collection {
    next_id: DocId,
    docs: BTreeMap<DocId, Value>,
}

/// In-memory document collection.
pub struct InMemoryStore {
    inner: RwLock<Collection>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collection {
                next_id: 1,
                docs: BTreeMap::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_one(&self, doc: &Value) -> Result<DocId> {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.docs.insert(id, doc.clone());
        Ok(id)
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<StoredDocument>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .docs
            .iter()
            .filter(|(_, body)| filter.matches(body))
            .map(|(id, body)| StoredDocument {
                id: *id,
                body: body.clone(),
            })
            .collect())
    }

    async fn get(&self, id: DocId) -> Result<Option<StoredDocument>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.docs.get(&id).map(|body| StoredDocument {
            id,
            body: body.clone(),
        }))
    }

    async fn replace_one(&self, id: DocId, doc: &Value) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        match inner.docs.get_mut(&id) {
            Some(slot) => {
                *slot = doc.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let removed = inner.docs.len() as u64;
        inner.docs.clear();
        Ok(removed)
    }
}
