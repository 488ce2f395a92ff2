//! In-memory document store

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{merge_patch, Document, DocumentStore};
use crate::error::Result;

/// Process-local store; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &str, doc: Document) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize> {
        let n = docs.len();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        Ok(n)
    }

    fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        Ok(self.collections.read().get(collection).cloned().unwrap_or_default())
    }

    fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Document>> {
        let mut collections = self.collections.write();
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
        else {
            return Ok(None);
        };
        merge_patch(&mut doc.body, patch);
        Ok(Some(doc.clone()))
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }

    fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.collections.read().get(collection).map_or(0, Vec::len))
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }
}
