//! Picking-area directory: per-venue topology with a three-day cache.

use chrono::{DateTime, Utc};
use pickroute_core::catalog::{CatalogApi, PickingArea, PickingAreaSnapshot};
use pickroute_core::error::Result;
use pickroute_core::store::{DocumentStore, DocumentStoreExt};
use pickroute_core::venue::VenueSettings;
use std::sync::Arc;
use tracing::{debug, info};

pub struct PickingAreaDirectory {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<dyn CatalogApi>,
}

impl PickingAreaDirectory {
    pub fn new(store: Arc<dyn DocumentStore>, catalog: Arc<dyn CatalogApi>) -> Self {
        Self { store, catalog }
    }

    /// The venue's picking areas, from cache while the snapshot is fresh.
    pub async fn get(&self, venue: &VenueSettings) -> Result<Vec<PickingArea>> {
        self.get_at(venue, Utc::now()).await
    }

    /// [`get`](Self::get) evaluated at `now`.
    pub async fn get_at(
        &self,
        venue: &VenueSettings,
        now: DateTime<Utc>,
    ) -> Result<Vec<PickingArea>> {
        let venue_id = venue.venue_id.as_str();

        if let Some(snapshot) = self.store.picking_area_snapshot(venue_id).await? {
            if snapshot.is_fresh(now) {
                debug!(venue_id, areas = snapshot.picking_areas.len(), "Using cached picking areas");
                return Ok(snapshot.picking_areas);
            }
            debug!(venue_id, last_updated = %snapshot.last_updated, "Picking-area cache expired");
        }

        let picking_areas = self.catalog.fetch_picking_areas(venue).await?;
        if picking_areas.is_empty() {
            // An empty topology is never cached so the next run asks again
            return Ok(picking_areas);
        }

        let snapshot = PickingAreaSnapshot {
            venue_id: venue_id.to_string(),
            picking_areas,
            last_updated: now,
        };
        self.store.save_picking_area_snapshot(&snapshot).await?;
        info!(venue_id, areas = snapshot.picking_areas.len(), "Picking areas refreshed");

        Ok(snapshot.picking_areas)
    }

    /// When the cached snapshot for `venue_id` stops being used, if any.
    pub async fn next_refresh_at(&self, venue_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .picking_area_snapshot(venue_id)
            .await?
            .map(|s| s.next_refresh_at()))
    }
}
