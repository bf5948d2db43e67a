//! Remote catalog model (picking areas, item configs, unassigned items)
//! and the [`CatalogApi`] trait every catalog client implements.
//!
//! The remote API is loosely shaped JSON. Payloads are kept as
//! `serde_json::Value` where they are persisted verbatim, and parsed into
//! the typed structs here only for the fields a sync actually needs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RemoteError;
use crate::venue::VenueSettings;

/// How long a cached picking-area snapshot may be used.
pub const PICKING_AREA_TTL_DAYS: i64 = 3;

/// Server-side fields dropped from picking areas before caching.
const PICKING_AREA_VOLATILE_FIELDS: [&str; 2] = ["order", "itemsCount"];

/// A physical or logical zone items are routed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickingArea {
    pub id: String,
    pub name: String,

    /// Any other fields the remote returns, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PickingArea {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }

    /// Parse a `{"data": [...]}` picking-area response, stripping the
    /// ordering/count fields that are not needed locally.
    pub fn list_from_payload(payload: Value) -> Result<Vec<PickingArea>, String> {
        let Value::Array(entries) = take_data(payload) else {
            return Err("expected a list of picking areas".into());
        };

        entries
            .into_iter()
            .map(|mut entry| {
                if let Some(obj) = entry.as_object_mut() {
                    for field in PICKING_AREA_VOLATILE_FIELDS {
                        obj.remove(field);
                    }
                }
                serde_json::from_value::<PickingArea>(entry).map_err(|e| e.to_string())
            })
            .collect()
    }
}

/// Cached picking-area topology for one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickingAreaSnapshot {
    pub venue_id: String,
    pub picking_areas: Vec<PickingArea>,
    pub last_updated: DateTime<Utc>,
}

impl PickingAreaSnapshot {
    pub fn ttl() -> Duration {
        Duration::days(PICKING_AREA_TTL_DAYS)
    }

    /// A snapshot is usable while it is at most [`PICKING_AREA_TTL_DAYS`] old.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_updated) <= Self::ttl()
    }

    /// When the directory will next refetch this venue's areas.
    pub fn next_refresh_at(&self) -> DateTime<Utc> {
        self.last_updated + Self::ttl()
    }
}

/// Item configuration: where an item is physically stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    #[serde(rename = "itemId")]
    pub item_id: String,

    /// Raw storage location; may hold several candidates, e.g. `"A-1-2 (top)/B-3"`
    #[serde(default, rename = "storageLocation")]
    pub storage_location: Option<String>,
}

impl ItemConfig {
    /// Parse an item-config response. Entries without an `itemId` are skipped.
    pub fn list_from_payload(payload: &Value) -> Vec<ItemConfig> {
        parse_entries(payload, "item config")
    }

    /// The storage location, or `""` when the remote sent none.
    pub fn location(&self) -> &str {
        self.storage_location.as_deref().unwrap_or("")
    }
}

/// An item not yet attached to any picking area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnassignedItem {
    pub id: String,

    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl UnassignedItem {
    /// Parse an unassigned-items response (`{"data": [...]}`).
    pub fn list_from_payload(payload: &Value) -> Vec<UnassignedItem> {
        parse_entries(payload, "unassigned item")
    }
}

/// The outcome of resolving one item: attach `item_id` to `picking_area_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub item_id: String,
    pub picking_area_id: String,
    pub picking_area_name: String,
    pub storage_location: String,
}

/// A raw remote payload persisted as the venue's latest snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub venue_id: String,
    pub payload: Value,
    pub last_updated: DateTime<Utc>,
}

impl RawSnapshot {
    /// Number of entries in the payload (list length, or length of `data`).
    pub fn entry_count(&self) -> usize {
        match &self.payload {
            Value::Array(entries) => entries.len(),
            Value::Object(obj) => obj
                .get("data")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            _ => 0,
        }
    }
}

/// Whether a remote payload carries nothing worth processing.
pub fn payload_is_empty(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Array(entries) => entries.is_empty(),
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(entries)) => entries.is_empty(),
            Some(Value::Null) => true,
            Some(_) => false,
            None => obj.is_empty(),
        },
        _ => false,
    }
}

fn take_data(payload: Value) -> Value {
    match payload {
        Value::Object(mut obj) if obj.contains_key("data") => {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn parse_entries<T: for<'de> Deserialize<'de>>(payload: &Value, kind: &str) -> Vec<T> {
    let entries = match payload {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(entries)) => entries.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(kind, error = %e, "Skipping malformed catalog entry");
                None
            }
        })
        .collect()
}

/// The remote catalog, scoped per venue.
///
/// Implementations: the HTTP client in `pickroute-remote`, scripted mocks
/// in tests.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Client name for logs (e.g. "http").
    fn name(&self) -> &str;

    /// `GET {base}{unassignedItemsPath}`: raw payload.
    async fn fetch_unassigned_items(&self, venue: &VenueSettings) -> Result<Value, RemoteError>;

    /// `GET {base}{itemConfigPath}?menuId={menuId}`: raw payload.
    async fn fetch_item_configs(&self, venue: &VenueSettings) -> Result<Value, RemoteError>;

    /// `GET {allItemsInfoEndpoint}`: raw payload.
    async fn fetch_all_items(&self, venue: &VenueSettings) -> Result<Value, RemoteError>;

    /// `GET {base}/v1/venues/{venueId}/picking-areas`, volatile fields stripped.
    async fn fetch_picking_areas(&self, venue: &VenueSettings)
    -> Result<Vec<PickingArea>, RemoteError>;

    /// `POST {base}/v1/venues/{venueId}/picking-areas/{areaId}/items`.
    async fn attach_items(
        &self,
        venue: &VenueSettings,
        picking_area_id: &str,
        item_ids: &[String],
    ) -> Result<(), RemoteError>;
}
