//! Document storage
//!
//! A minimal document-store abstraction over named collections of JSON
//! objects. The service uses three collections: `grades` (imported training
//! rows), `users` and `predictions`.

mod file;
mod memory;
mod repository;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use repository::{NewUser, PredictionRecord, Repository, UserRecord};

pub const GRADES: &str = "grades";
pub const USERS: &str = "users";
pub const PREDICTIONS: &str = "predictions";

/// A stored JSON object with its identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Document {
    /// New document with a generated id; any `_id` key in `body` is dropped.
    pub fn new(mut body: Map<String, Value>) -> Self {
        body.remove("_id");
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            body,
        }
    }

    pub fn with_id(id: impl Into<String>, mut body: Map<String, Value>) -> Self {
        body.remove("_id");
        Self { id: id.into(), body }
    }

    /// Convert into a typed record via its JSON form
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }

    /// Build a document from a typed record that serializes an `_id` field
    pub fn encode<T: Serialize>(record: &T) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::to_value(record)?)?)
    }
}

/// Storage backend trait
///
/// Every operation is independent; no multi-document consistency is
/// offered. Backends report outages as `GradeError::StoreUnavailable`.
pub trait DocumentStore: Send + Sync {
    fn insert(&self, collection: &str, doc: Document) -> Result<()>;

    /// Insert many documents, returning how many were written
    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize> {
        let n = docs.len();
        for doc in docs {
            self.insert(collection, doc)?;
        }
        Ok(n)
    }

    /// All documents in insertion order
    fn find_all(&self, collection: &str) -> Result<Vec<Document>>;

    fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self.find_all(collection)?.into_iter().find(|d| d.id == id))
    }

    /// Merge `patch` into the document's body; `None` if it does not exist
    fn update(&self, collection: &str, id: &str, patch: Map<String, Value>)
        -> Result<Option<Document>>;

    /// Remove a document, returning whether it existed
    fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.find_all(collection)?.len())
    }

    /// Check the backend is reachable
    fn ping(&self) -> Result<()>;
}

/// Shallow merge used by the backends' `update`
pub(crate) fn merge_patch(body: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        if key != "_id" {
            body.insert(key, value);
        }
    }
}
