//! File-based backend: one JSON file per collection.
//!
//! Each collection is a single `{dir}/{collection}.json` object mapping
//! document key to document. Every operation reads the collection file
//! from disk, so several processes (or several stores) sharing one
//! directory see each other's writes. Mutations re-read, modify and
//! rewrite the file under this store's lock; the files stay
//! human-inspectable.

use async_trait::async_trait;
use pickroute_core::error::StoreError;
use pickroute_core::store::{Collection, DocumentStore};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type CollectionMap = BTreeMap<String, Value>;

/// A directory-backed document store.
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (or prepare) a store rooted at `dir`.
    ///
    /// Missing collection files read as empty and are created on first
    /// write.
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Storage(format!("Failed to create store directory {}: {e}", dir.display()))
        })?;

        let existing = Collection::ALL
            .into_iter()
            .filter(|c| Self::collection_path(&dir, *c).exists())
            .count();
        debug!(dir = %dir.display(), collections = existing, "File store opened");

        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn collection_path(dir: &Path, collection: Collection) -> PathBuf {
        dir.join(format!("{}.json", collection.as_str()))
    }

    /// Current on-disk contents of one collection.
    fn load(&self, collection: Collection) -> CollectionMap {
        let path = Self::collection_path(&self.dir, collection);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return CollectionMap::new(), // Not written yet
        };

        match serde_json::from_str::<CollectionMap>(&content) {
            Ok(docs) => docs,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted collection file");
                CollectionMap::new()
            }
        }
    }

    /// Rewrite one collection file.
    fn flush(&self, collection: Collection, docs: &CollectionMap) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(docs)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize {collection}: {e}")))?;

        // Write-then-rename so readers never see a half-written file
        let path = Self::collection_path(&self.dir, collection);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| StoreError::Storage(format!("Failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| StoreError::Storage(format!("Failed to replace {}: {e}", path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load(collection).remove(key))
    }

    async fn put(
        &self,
        collection: Collection,
        key: &str,
        document: Value,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut docs = self.load(collection);
        docs.insert(key.to_string(), document);
        self.flush(collection, &docs)
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut docs = self.load(collection);
        if docs.remove(key).is_none() {
            return Ok(false);
        }
        self.flush(collection, &docs)?;
        Ok(true)
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load(collection).into_values().collect())
    }
}
