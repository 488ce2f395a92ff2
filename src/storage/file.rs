//! JSON file document store

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use super::{merge_patch, Document, DocumentStore};
use crate::error::{GradeError, Result};

/// One pretty-printed JSON array per collection under a base directory.
///
/// Writes go through a temp file and rename, and are serialized by a
/// process-wide lock.
#[derive(Debug)]
pub struct JsonFileStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|e| unavailable(&base_dir, e))?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn collection_file(&self, collection: &str) -> PathBuf {
        let name: String = collection
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{}.json", name))
    }

    fn read(&self, collection: &str) -> Result<Vec<Document>> {
        let path = self.collection_file(collection);
        match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                GradeError::StoreUnavailable(format!("corrupt collection {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    fn write(&self, collection: &str, docs: &[Document]) -> Result<()> {
        let path = self.collection_file(collection);
        let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4().simple()));
        let json = serde_json::to_string_pretty(docs)?;
        fs::write(&tmp, json).map_err(|e| unavailable(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            fs::remove_file(&tmp).ok();
            unavailable(&path, e)
        })?;
        debug!(collection, documents = docs.len(), "Wrote collection");
        Ok(())
    }

    /// Read-modify-write under the write lock
    fn modify<T>(&self, collection: &str, f: impl FnOnce(&mut Vec<Document>) -> T) -> Result<T> {
        let _guard = self.write_lock.lock();
        let mut docs = self.read(collection)?;
        let out = f(&mut docs);
        self.write(collection, &docs)?;
        Ok(out)
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> GradeError {
    GradeError::StoreUnavailable(format!("{}: {}", path.display(), err))
}

impl DocumentStore for JsonFileStore {
    fn insert(&self, collection: &str, doc: Document) -> Result<()> {
        self.modify(collection, |docs| docs.push(doc))
    }

    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize> {
        let n = docs.len();
        self.modify(collection, |existing| existing.extend(docs))?;
        Ok(n)
    }

    fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        self.read(collection)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Document>> {
        let _guard = self.write_lock.lock();
        let mut docs = self.read(collection)?;
        let Some(doc) = docs.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        merge_patch(&mut doc.body, patch);
        let updated = doc.clone();
        self.write(collection, &docs)?;
        Ok(Some(updated))
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut docs = self.read(collection)?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Ok(false);
        }
        self.write(collection, &docs)?;
        Ok(true)
    }

    fn ping(&self) -> Result<()> {
        if self.base_dir.is_dir() {
            Ok(())
        } else {
            Err(GradeError::StoreUnavailable(format!(
                "{} is not a directory",
                self.base_dir.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> JsonFileStore {
        let dir = std::env::temp_dir().join(format!("gp-store-{}", uuid::Uuid::new_v4()));
        JsonFileStore::new(dir).unwrap()
    }

    #[test]
    fn test_persists_across_instances() {
        let store = temp_store();
        let doc = Document::new(json!({ "lunch": "standard" }).as_object().cloned().unwrap());
        let id = doc.id.clone();
        store.insert("grades", doc).unwrap();

        let reopened = JsonFileStore::new(store.base_dir().to_path_buf()).unwrap();
        let found = reopened.find_by_id("grades", &id).unwrap().unwrap();
        assert_eq!(found.body["lunch"], json!("standard"));
        assert!(store.collection_file("grades").exists());

        fs::remove_dir_all(store.base_dir()).ok();
    }

    #[test]
    fn test_update_and_delete() {
        let store = temp_store();
        let doc = Document::new(json!({ "name": "Kai" }).as_object().cloned().unwrap());
        let id = doc.id.clone();
        store.insert("users", doc).unwrap();

        let patch = json!({ "name": "Kai L" }).as_object().cloned().unwrap();
        assert!(store.update("users", &id, patch).unwrap().is_some());
        assert!(store.delete("users", &id).unwrap());
        assert_eq!(store.count("users").unwrap(), 0);

        fs::remove_dir_all(store.base_dir()).ok();
    }

    #[test]
    fn test_missing_directory_is_unavailable() {
        let store = temp_store();
        fs::remove_dir_all(store.base_dir()).unwrap();
        assert!(matches!(store.ping(), Err(GradeError::StoreUnavailable(_))));
        let err = store.insert("users", Document::new(Map::new())).unwrap_err();
        assert!(matches!(err, GradeError::StoreUnavailable(_)));
    }
}
