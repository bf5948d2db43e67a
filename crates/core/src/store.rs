//! Document store trait: the persistence boundary.
//!
//! The service treats storage as a set of named collections of JSON
//! documents keyed by string. Backends only implement the raw
//! [`DocumentStore`] operations; [`DocumentStoreExt`] layers the typed
//! accessors used by the engine on top, so every backend gets them for free.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::catalog::{PickingAreaSnapshot, RawSnapshot};
use crate::error::StoreError;
use crate::token::TokenRecord;
use crate::venue::VenueSettings;

/// Key of the single process-wide token document.
pub const TOKEN_KEY: &str = "current";

/// The collections the service reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Venue settings (rules, schedule, endpoints): written by the admin surface
    VenueSettings,
    /// Cached picking-area topology per venue
    PickingAreas,
    /// Latest raw item-config payload per venue
    ItemConfigs,
    /// Latest raw unassigned-items payload per venue
    UnassignedItems,
    /// Item ids whose storage location matched no picking area, per venue
    UnallocatedItems,
    /// The outbound OAuth token record
    Token,
    /// Action/audit log: written by collaborators only
    History,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::VenueSettings,
        Collection::PickingAreas,
        Collection::ItemConfigs,
        Collection::UnassignedItems,
        Collection::UnallocatedItems,
        Collection::Token,
        Collection::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::VenueSettings => "venue_settings",
            Collection::PickingAreas => "picking_areas",
            Collection::ItemConfigs => "item_configs",
            Collection::UnassignedItems => "unassigned_items",
            Collection::UnallocatedItems => "unallocated_items",
            Collection::Token => "token",
            Collection::History => "history",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The core DocumentStore trait.
///
/// Implementations: in-memory (for testing), JSON files, SQLite.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "sqlite").
    fn name(&self) -> &str;

    /// Fetch one document.
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or fully replace one document.
    async fn put(&self, collection: Collection, key: &str, document: Value)
    -> Result<(), StoreError>;

    /// Delete one document. Returns whether it existed.
    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError>;

    /// All documents in a collection, ordered by key.
    async fn list(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;
}

/// Per-venue unallocated list as stored.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
struct UnallocatedDocument {
    venue_id: String,
    items: Vec<String>,
    last_updated: chrono::DateTime<Utc>,
}

fn decode<T: DeserializeOwned>(
    collection: Collection,
    key: &str,
    document: Value,
) -> Result<T, StoreError> {
    serde_json::from_value(document).map_err(|e| StoreError::Malformed {
        collection: collection.as_str().into(),
        key: key.into(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(collection: Collection, key: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Malformed {
        collection: collection.as_str().into(),
        key: key.into(),
        reason: e.to_string(),
    })
}

/// Typed accessors over any [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn venue(&self, venue_id: &str) -> Result<Option<VenueSettings>, StoreError> {
        match self.get(Collection::VenueSettings, venue_id).await? {
            Some(doc) => decode(Collection::VenueSettings, venue_id, doc).map(Some),
            None => Ok(None),
        }
    }

    /// Every venue, skipping (and logging) documents that fail to parse.
    async fn venues(&self) -> Result<Vec<VenueSettings>, StoreError> {
        let docs = self.list(Collection::VenueSettings).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<VenueSettings>(doc) {
                Ok(venue) => Some(venue),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed venue settings document");
                    None
                }
            })
            .collect())
    }

    async fn save_venue(&self, venue: &VenueSettings) -> Result<(), StoreError> {
        let doc = encode(Collection::VenueSettings, &venue.venue_id, venue)?;
        self.put(Collection::VenueSettings, &venue.venue_id, doc).await
    }

    async fn picking_area_snapshot(
        &self,
        venue_id: &str,
    ) -> Result<Option<PickingAreaSnapshot>, StoreError> {
        match self.get(Collection::PickingAreas, venue_id).await? {
            Some(doc) => decode(Collection::PickingAreas, venue_id, doc).map(Some),
            None => Ok(None),
        }
    }

    async fn save_picking_area_snapshot(
        &self,
        snapshot: &PickingAreaSnapshot,
    ) -> Result<(), StoreError> {
        let doc = encode(Collection::PickingAreas, &snapshot.venue_id, snapshot)?;
        self.put(Collection::PickingAreas, &snapshot.venue_id, doc).await
    }

    /// Latest raw payload in `collection` (item configs or unassigned items).
    async fn raw_snapshot(
        &self,
        collection: Collection,
        venue_id: &str,
    ) -> Result<Option<RawSnapshot>, StoreError> {
        match self.get(collection, venue_id).await? {
            Some(doc) => decode(collection, venue_id, doc).map(Some),
            None => Ok(None),
        }
    }

    async fn save_raw_snapshot(
        &self,
        collection: Collection,
        snapshot: &RawSnapshot,
    ) -> Result<(), StoreError> {
        let doc = encode(collection, &snapshot.venue_id, snapshot)?;
        self.put(collection, &snapshot.venue_id, doc).await
    }

    async fn unallocated_items(&self, venue_id: &str) -> Result<Vec<String>, StoreError> {
        match self.get(Collection::UnallocatedItems, venue_id).await? {
            Some(doc) => decode::<UnallocatedDocument>(Collection::UnallocatedItems, venue_id, doc)
                .map(|d| d.items),
            None => Ok(vec![]),
        }
    }

    /// Replace the venue's unallocated list.
    async fn set_unallocated_items(
        &self,
        venue_id: &str,
        items: &[String],
    ) -> Result<(), StoreError> {
        let document = UnallocatedDocument {
            venue_id: venue_id.to_string(),
            items: items.to_vec(),
            last_updated: Utc::now(),
        };
        let doc = encode(Collection::UnallocatedItems, venue_id, &document)?;
        self.put(Collection::UnallocatedItems, venue_id, doc).await
    }

    async fn token_record(&self) -> Result<Option<TokenRecord>, StoreError> {
        match self.get(Collection::Token, TOKEN_KEY).await? {
            Some(doc) => decode(Collection::Token, TOKEN_KEY, doc).map(Some),
            None => Ok(None),
        }
    }

    /// Overwrite the token record in full.
    async fn save_token_record(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let doc = encode(Collection::Token, TOKEN_KEY, record)?;
        self.put(Collection::Token, TOKEN_KEY, doc).await
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
