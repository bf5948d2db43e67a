//! In-memory backend: useful for testing and ephemeral runs.

use async_trait::async_trait;
use pickroute_core::error::StoreError;
use pickroute_core::store::{Collection, DocumentStore};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory backend that keeps each collection in a sorted map.
/// Useful for testing and runs where persistence isn't needed.
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<Collection, BTreeMap<String, Value>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total documents across all collections.
    pub async fn len(&self) -> usize {
        self.collections.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn put(
        &self,
        collection: Collection,
        key: &str,
        document: Value,
    ) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(key.to_string(), document);
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(&collection)
            .is_some_and(|docs| docs.remove(key).is_some()))
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }
}
