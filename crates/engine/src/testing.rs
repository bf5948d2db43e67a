//! Scripted catalog and venue fixtures shared by the engine tests.

use async_trait::async_trait;
use pickroute_core::catalog::{CatalogApi, PickingArea};
use pickroute_core::error::RemoteError;
use pickroute_core::venue::{Endpoints, VenueSettings};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A catalog whose responses are fixed up front and returned verbatim,
/// empty ones included. `None` payloads fail with a 500 status; every
/// call is counted.
#[derive(Default)]
pub(crate) struct MockCatalog {
    pub areas: Vec<PickingArea>,
    pub item_configs: Option<Value>,
    pub unassigned: Option<Value>,
    pub all_items: Option<Value>,
    /// Item ids whose write-back fails
    pub failing_items: HashSet<String>,

    pub area_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub attached: Mutex<Vec<(String, String)>>,
}

impl MockCatalog {
    pub fn area_calls(&self) -> usize {
        self.area_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// `(picking_area_id, item_id)` pairs attached so far.
    pub fn attached(&self) -> Vec<(String, String)> {
        self.attached.lock().unwrap().clone()
    }

    fn respond(&self, endpoint: &str, payload: &Option<Value>) -> Result<Value, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match payload {
            Some(p) => Ok(p.clone()),
            None => Err(RemoteError::Status {
                endpoint: endpoint.into(),
                status_code: 500,
                message: "scripted failure".into(),
            }),
        }
    }
}

#[async_trait]
impl CatalogApi for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_unassigned_items(&self, _venue: &VenueSettings) -> Result<Value, RemoteError> {
        self.respond("unassigned-items", &self.unassigned)
    }

    async fn fetch_item_configs(&self, _venue: &VenueSettings) -> Result<Value, RemoteError> {
        self.respond("item-configs", &self.item_configs)
    }

    async fn fetch_all_items(&self, _venue: &VenueSettings) -> Result<Value, RemoteError> {
        self.respond("all-items", &self.all_items)
    }

    async fn fetch_picking_areas(
        &self,
        _venue: &VenueSettings,
    ) -> Result<Vec<PickingArea>, RemoteError> {
        self.area_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.areas.clone())
    }

    async fn attach_items(
        &self,
        _venue: &VenueSettings,
        picking_area_id: &str,
        item_ids: &[String],
    ) -> Result<(), RemoteError> {
        for item_id in item_ids {
            if self.failing_items.contains(item_id) {
                return Err(RemoteError::Status {
                    endpoint: "attach-items".into(),
                    status_code: 502,
                    message: "bad gateway".into(),
                });
            }
        }
        let mut attached = self.attached.lock().unwrap();
        for item_id in item_ids {
            attached.push((picking_area_id.to_string(), item_id.clone()));
        }
        Ok(())
    }
}

pub(crate) fn venue(venue_id: &str) -> VenueSettings {
    VenueSettings {
        venue_id: venue_id.into(),
        venue_name: None,
        endpoints: Endpoints {
            base_url: "https://api.example.com".into(),
            unassigned_items_endpoint: "/v1/items/unassigned".into(),
            item_config_endpoint: "/v1/item-configs".into(),
            menu_id: "menu-1".into(),
            all_items_information_endpoint: "https://api.example.com/v1/items".into(),
            venue_id: "remote-1".into(),
        },
        bin_mappings: vec![],
        location_transformations: vec![],
        overflow_locations: vec![],
        schedule: Default::default(),
        venue_message: None,
    }
}
