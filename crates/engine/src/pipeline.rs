//! Assignment pipeline: one sync run for one venue.
//!
//! Steps, strictly in order:
//!
//! 1. Picking areas from the directory (abort when none)
//! 2. Fetch item configs and unassigned items (abort on failure, nothing written)
//! 3. Persist both raw payloads
//! 4. Reset the unallocated list, classify every unassigned item, persist
//!    the new unallocated list
//! 5. Fetch the full catalog and write the export file (abort on failure
//!    or an empty catalog)
//! 6. Write back each assignment; failures are counted, never retried
//!
//! A failure stops the run without rolling back earlier writes.

use chrono::{DateTime, Utc};
use pickroute_core::catalog::{
    Assignment, CatalogApi, ItemConfig, PickingArea, RawSnapshot, UnassignedItem,
    payload_is_empty,
};
use pickroute_core::error::{Error, RemoteError, Result};
use pickroute_core::store::{Collection, DocumentStore, DocumentStoreExt};
use pickroute_core::venue::VenueSettings;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::directory::PickingAreaDirectory;
use crate::resolver::LocationRules;

/// Why an unassigned item was not assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// No item config exists for the item
    MissingConfig,
    /// The item config has no storage location
    NoStorageLocation,
    /// The storage location matched no picking area
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableItem {
    pub item_id: String,
    pub reason: UnavailableReason,
}

/// The outcome of classifying one batch of unassigned items.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    pub assigned: Vec<Assignment>,
    /// Every item that was not assigned, with the reason
    pub unavailable: Vec<UnavailableItem>,
    /// Items with a storage location that resolved to no picking area
    pub unallocated: Vec<String>,
}

impl Classification {
    /// Classify unassigned items against item configs and compiled rules.
    ///
    /// `areas` must be the snapshot `rules` was compiled from.
    pub fn build(
        rules: &LocationRules,
        areas: &[PickingArea],
        item_configs: &[ItemConfig],
        unassigned: &[UnassignedItem],
    ) -> Self {
        // Later configs for the same item overwrite earlier ones
        let configs: HashMap<&str, &ItemConfig> = item_configs
            .iter()
            .map(|c| (c.item_id.as_str(), c))
            .collect();
        let area_names: HashMap<&str, &str> = areas
            .iter()
            .map(|a| (a.id.as_str(), a.name.as_str()))
            .collect();

        let mut out = Classification::default();
        for item in unassigned {
            let Some(config) = configs.get(item.id.as_str()) else {
                out.unavailable(&item.id, UnavailableReason::MissingConfig);
                continue;
            };

            let location = config.location();
            if location.trim().is_empty() {
                out.unavailable(&item.id, UnavailableReason::NoStorageLocation);
                continue;
            }

            match rules.resolve(location) {
                Some(area_id) => {
                    let name = area_names.get(area_id.as_str()).copied().unwrap_or("Unknown");
                    out.assigned.push(Assignment {
                        item_id: item.id.clone(),
                        picking_area_id: area_id.clone(),
                        picking_area_name: name.to_string(),
                        storage_location: location.to_string(),
                    });
                }
                None => {
                    debug!(item_id = %item.id, location, "Item not assigned: no matching picking area");
                    out.unallocated.push(item.id.clone());
                    out.unavailable(&item.id, UnavailableReason::Unresolved);
                }
            }
        }
        out
    }

    fn unavailable(&mut self, item_id: &str, reason: UnavailableReason) {
        self.unavailable.push(UnavailableItem {
            item_id: item_id.to_string(),
            reason,
        });
    }
}

/// Everything one run did.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub venue_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub assigned: Vec<Assignment>,
    pub unavailable: Vec<UnavailableItem>,
    pub unallocated: Vec<String>,
    pub attached: usize,
    pub attach_failures: usize,
    pub dry_run: bool,
}

/// Report totals, as returned by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub assigned: usize,
    pub unavailable: usize,
    pub unallocated: usize,
    pub attached: usize,
    pub attach_failures: usize,
}

impl SyncReport {
    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            assigned: self.assigned.len(),
            unavailable: self.unavailable.len(),
            unallocated: self.unallocated.len(),
            attached: self.attached,
            attach_failures: self.attach_failures,
        }
    }
}

/// Venue summary built from the persisted snapshots of the last run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueOverview {
    pub venue: String,
    pub overview_message: Value,
    pub total_items: usize,
    pub unassigned_items: usize,
    pub unallocated_items: Vec<String>,
    pub last_synced: DateTime<Utc>,
    pub picking_areas_refresh_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory receiving `{venue_id}.json` catalog exports
    pub export_dir: PathBuf,
    /// Log write-backs instead of sending them
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("exports"),
            dry_run: false,
        }
    }
}

pub struct AssignmentPipeline {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<dyn CatalogApi>,
    directory: PickingAreaDirectory,
    options: PipelineOptions,
    venue_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AssignmentPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<dyn CatalogApi>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            directory: PickingAreaDirectory::new(store.clone(), catalog.clone()),
            store,
            catalog,
            options,
            venue_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn directory(&self) -> &PickingAreaDirectory {
        &self.directory
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run one sync for `venue_id`. Runs for the same venue wait for each
    /// other; different venues run concurrently.
    pub async fn sync(&self, venue_id: &str) -> Result<SyncReport> {
        let lock = self.venue_lock(venue_id).await;
        let _guard = lock.lock().await;

        let started_at = Utc::now();
        let venue = self
            .store
            .venue(venue_id)
            .await?
            .ok_or_else(|| Error::TenantNotFound(venue_id.to_string()))?;

        info!(venue_id, catalog = self.catalog.name(), "Sync started");

        let areas = self.directory.get(&venue).await?;
        if areas.is_empty() {
            return Err(Error::NoPickingAreas(venue_id.to_string()));
        }
        let rules = LocationRules::compile(&venue, &areas);

        let item_configs =
            require_payload("item-configs", self.catalog.fetch_item_configs(&venue).await?)?;
        let unassigned =
            require_payload("unassigned-items", self.catalog.fetch_unassigned_items(&venue).await?)?;

        let now = Utc::now();
        for (collection, payload) in [
            (Collection::ItemConfigs, &item_configs),
            (Collection::UnassignedItems, &unassigned),
        ] {
            let snapshot = RawSnapshot {
                venue_id: venue_id.to_string(),
                payload: payload.clone(),
                last_updated: now,
            };
            self.store.save_raw_snapshot(collection, &snapshot).await?;
        }

        self.store.set_unallocated_items(venue_id, &[]).await?;
        let classification = Classification::build(
            &rules,
            &areas,
            &ItemConfig::list_from_payload(&item_configs),
            &UnassignedItem::list_from_payload(&unassigned),
        );
        self.store
            .set_unallocated_items(venue_id, &classification.unallocated)
            .await?;

        info!(
            venue_id,
            assigned = classification.assigned.len(),
            unavailable = classification.unavailable.len(),
            unallocated = classification.unallocated.len(),
            "Items classified"
        );

        let all_items =
            require_payload("all-items", self.catalog.fetch_all_items(&venue).await?)?;
        let export_path = self.export(venue_id, &all_items).await?;
        debug!(venue_id, path = %export_path.display(), "Catalog exported");

        let (attached, attach_failures) = self.write_back(&venue, &classification.assigned).await;

        let report = SyncReport {
            venue_id: venue_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            assigned: classification.assigned,
            unavailable: classification.unavailable,
            unallocated: classification.unallocated,
            attached,
            attach_failures,
            dry_run: self.options.dry_run,
        };

        info!(
            venue_id,
            attached,
            attach_failures,
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Sync finished"
        );
        Ok(report)
    }

    /// Summary of the venue from the last persisted snapshots.
    pub async fn overview(&self, venue_id: &str) -> Result<VenueOverview> {
        let venue = self
            .store
            .venue(venue_id)
            .await?
            .ok_or_else(|| Error::TenantNotFound(venue_id.to_string()))?;

        let item_configs = self.snapshot(Collection::ItemConfigs, venue_id).await?;
        let unassigned = self.snapshot(Collection::UnassignedItems, venue_id).await?;

        Ok(VenueOverview {
            venue: venue.venue_id,
            overview_message: venue.venue_message.unwrap_or(Value::String(String::new())),
            total_items: item_configs.entry_count(),
            unassigned_items: unassigned.entry_count(),
            unallocated_items: self.store.unallocated_items(venue_id).await?,
            last_synced: unassigned.last_updated,
            picking_areas_refresh_at: self.directory.next_refresh_at(venue_id).await?,
        })
    }

    async fn snapshot(&self, collection: Collection, venue_id: &str) -> Result<RawSnapshot> {
        self.store
            .raw_snapshot(collection, venue_id)
            .await?
            .ok_or_else(|| Error::NoSnapshot {
                collection: collection.to_string(),
                venue_id: venue_id.to_string(),
            })
    }

    async fn venue_lock(&self, venue_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.venue_locks.lock().await;
        locks
            .entry(venue_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn export_path(&self, venue_id: &str) -> Result<PathBuf> {
        if venue_id.is_empty() || venue_id.contains(['/', '\\']) || venue_id == ".." {
            return Err(Error::Export {
                path: venue_id.to_string(),
                reason: "venue id is not a valid file name".into(),
            });
        }
        Ok(self.options.export_dir.join(format!("{venue_id}.json")))
    }

    async fn export(&self, venue_id: &str, all_items: &Value) -> Result<PathBuf> {
        let path = self.export_path(venue_id)?;
        let export_err = |path: &Path, e: std::io::Error| Error::Export {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.options.export_dir)
            .await
            .map_err(|e| export_err(&self.options.export_dir, e))?;

        let content = serde_json::to_vec(all_items)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| export_err(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| export_err(&path, e))?;
        Ok(path)
    }

    /// Attach each assignment individually. Returns (attached, failed).
    async fn write_back(&self, venue: &VenueSettings, assignments: &[Assignment]) -> (usize, usize) {
        let venue_id = venue.venue_id.as_str();
        info!(venue_id, total = assignments.len(), dry_run = self.options.dry_run, "Writing back assignments");

        if self.options.dry_run {
            for a in assignments {
                info!(venue_id, item_id = %a.item_id, picking_area_id = %a.picking_area_id, "Dry run: would attach item");
            }
            return (0, 0);
        }

        let mut attached = 0;
        let mut failed = 0;
        for a in assignments {
            match self
                .catalog
                .attach_items(venue, &a.picking_area_id, std::slice::from_ref(&a.item_id))
                .await
            {
                Ok(()) => attached += 1,
                Err(e) => {
                    warn!(venue_id, item_id = %a.item_id, picking_area_id = %a.picking_area_id, error = %e, "Failed to attach item");
                    failed += 1;
                }
            }
        }
        (attached, failed)
    }
}

fn require_payload(endpoint: &str, payload: Value) -> Result<Value> {
    if payload_is_empty(&payload) {
        return Err(RemoteError::EmptyPayload {
            endpoint: endpoint.into(),
        }
        .into());
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCatalog, venue};
    use pickroute_core::venue::{BinMapping, OverflowLocation};
    use pickroute_store::InMemoryStore;
    use serde_json::json;
    use std::collections::HashSet;

    fn cafe1() -> VenueSettings {
        let mut v = venue("cafe1");
        v.overflow_locations = vec![OverflowLocation::Label("OVF".into())];
        v.bin_mappings = vec![BinMapping {
            id: None,
            bin_location: "D1".into(),
            picking_area: "DOCK".into(),
        }];
        v.venue_message = Some(json!("Stocktake on Friday"));
        v
    }

    fn fixture_catalog() -> MockCatalog {
        MockCatalog {
            areas: vec![
                PickingArea::new("pa_9", "DOCK"),
                PickingArea::new("pa_2", "Bar-1"),
            ],
            item_configs: Some(json!([
                {"itemId": "i1", "storageLocation": "OVF/D1"},
                {"itemId": "i2", "storageLocation": "bar-1-4 (top)"},
                {"itemId": "i3", "storageLocation": "Z-9"},
                {"itemId": "i4", "storageLocation": ""},
                {"itemId": "i5", "price": 3}
            ])),
            unassigned: Some(json!({"data": [
                {"id": "i1", "name": "Cola"},
                {"id": "i2"},
                {"id": "i3"},
                {"id": "i4"},
                {"id": "i5"},
                {"id": "i6"}
            ]})),
            all_items: Some(json!({"data": [{"id": "i1"}, {"id": "i2"}]})),
            ..Default::default()
        }
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        catalog: Arc<MockCatalog>,
        pipeline: AssignmentPipeline,
        export_dir: tempfile::TempDir,
    }

    async fn harness(catalog: MockCatalog, dry_run: bool) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        store.save_venue(&cafe1()).await.unwrap();
        let catalog = Arc::new(catalog);
        let export_dir = tempfile::tempdir().unwrap();
        let pipeline = AssignmentPipeline::new(
            store.clone(),
            catalog.clone(),
            PipelineOptions {
                export_dir: export_dir.path().to_path_buf(),
                dry_run,
            },
        );
        Harness {
            store,
            catalog,
            pipeline,
            export_dir,
        }
    }

    fn reasons(report: &SyncReport) -> HashMap<String, UnavailableReason> {
        report
            .unavailable
            .iter()
            .map(|u| (u.item_id.clone(), u.reason))
            .collect()
    }

    #[tokio::test]
    async fn classifies_persists_exports_and_attaches() {
        let h = harness(fixture_catalog(), false).await;
        let report = h.pipeline.sync("cafe1").await.unwrap();

        let assigned: Vec<(&str, &str)> = report
            .assigned
            .iter()
            .map(|a| (a.item_id.as_str(), a.picking_area_id.as_str()))
            .collect();
        assert_eq!(assigned, vec![("i1", "pa_9"), ("i2", "pa_2")]);
        assert_eq!(report.assigned[1].picking_area_name, "Bar-1");
        assert_eq!(report.assigned[1].storage_location, "bar-1-4 (top)");

        let reasons = reasons(&report);
        assert_eq!(reasons["i3"], UnavailableReason::Unresolved);
        assert_eq!(reasons["i4"], UnavailableReason::NoStorageLocation);
        assert_eq!(reasons["i5"], UnavailableReason::NoStorageLocation);
        assert_eq!(reasons["i6"], UnavailableReason::MissingConfig);
        assert_eq!(report.unallocated, vec!["i3".to_string()]);

        assert_eq!(
            h.store.unallocated_items("cafe1").await.unwrap(),
            vec!["i3".to_string()]
        );
        assert!(
            h.store
                .raw_snapshot(Collection::ItemConfigs, "cafe1")
                .await
                .unwrap()
                .is_some()
        );

        let export = std::fs::read_to_string(h.export_dir.path().join("cafe1.json")).unwrap();
        let export: Value = serde_json::from_str(&export).unwrap();
        assert_eq!(export["data"][0]["id"], "i1");

        assert_eq!(report.attached, 2);
        assert_eq!(report.attach_failures, 0);
        assert_eq!(
            h.catalog.attached(),
            vec![
                ("pa_9".to_string(), "i1".to_string()),
                ("pa_2".to_string(), "i2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn rerun_is_idempotent_and_does_not_accumulate() {
        let h = harness(fixture_catalog(), true).await;

        let first = h.pipeline.sync("cafe1").await.unwrap();
        let after_first = h.store.unallocated_items("cafe1").await.unwrap();
        let second = h.pipeline.sync("cafe1").await.unwrap();
        let after_second = h.store.unallocated_items("cafe1").await.unwrap();

        let set = |v: &[Assignment]| v.iter().cloned().collect::<HashSet<_>>();
        assert_eq!(set(&first.assigned), set(&second.assigned));
        assert_eq!(
            first.unavailable.iter().collect::<HashSet<_>>(),
            second.unavailable.iter().collect::<HashSet<_>>()
        );
        assert_eq!(first.unallocated, second.unallocated);
        assert_eq!(after_first.len(), after_second.len());
        assert_eq!(after_second, vec!["i3".to_string()]);

        // Picking areas come from cache on the second run
        assert_eq!(h.catalog.area_calls(), 1);
    }

    #[tokio::test]
    async fn dry_run_never_posts() {
        let h = harness(fixture_catalog(), true).await;
        let report = h.pipeline.sync("cafe1").await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.assigned.len(), 2);
        assert_eq!(report.attached, 0);
        assert!(h.catalog.attached().is_empty());
    }

    #[tokio::test]
    async fn unknown_venue_fails_fast() {
        let h = harness(fixture_catalog(), false).await;
        let err = h.pipeline.sync("nope").await.unwrap_err();
        assert!(matches!(err, Error::TenantNotFound(ref v) if v == "nope"));
        assert_eq!(h.catalog.area_calls(), 0);
    }

    #[tokio::test]
    async fn no_picking_areas_aborts() {
        let h = harness(
            MockCatalog {
                areas: vec![],
                ..fixture_catalog()
            },
            false,
        )
        .await;
        let err = h.pipeline.sync("cafe1").await.unwrap_err();
        assert!(matches!(err, Error::NoPickingAreas(_)));
        assert_eq!(h.catalog.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_writes_nothing() {
        let h = harness(
            MockCatalog {
                unassigned: None,
                ..fixture_catalog()
            },
            false,
        )
        .await;
        h.store
            .set_unallocated_items("cafe1", &["old".to_string()])
            .await
            .unwrap();

        let err = h.pipeline.sync("cafe1").await.unwrap_err();
        assert!(matches!(err, Error::RemoteFetch(RemoteError::Status { .. })));
        assert!(
            h.store
                .raw_snapshot(Collection::ItemConfigs, "cafe1")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            h.store.unallocated_items("cafe1").await.unwrap(),
            vec!["old".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_item_configs_abort() {
        let h = harness(
            MockCatalog {
                item_configs: Some(json!([])),
                ..fixture_catalog()
            },
            false,
        )
        .await;
        let err = h.pipeline.sync("cafe1").await.unwrap_err();
        assert!(matches!(err, Error::RemoteFetch(RemoteError::EmptyPayload { .. })));
    }

    #[tokio::test]
    async fn full_catalog_failure_aborts_before_write_back() {
        let h = harness(
            MockCatalog {
                all_items: None,
                ..fixture_catalog()
            },
            false,
        )
        .await;
        let err = h.pipeline.sync("cafe1").await.unwrap_err();
        assert!(matches!(err, Error::RemoteFetch(_)));
        assert!(h.catalog.attached().is_empty());
        // Earlier steps are not rolled back
        assert_eq!(
            h.store.unallocated_items("cafe1").await.unwrap(),
            vec!["i3".to_string()]
        );
        assert!(!h.export_dir.path().join("cafe1.json").exists());
    }

    #[tokio::test]
    async fn empty_full_catalog_aborts_without_export_or_write_back() {
        let h = harness(
            MockCatalog {
                all_items: Some(json!({"data": []})),
                ..fixture_catalog()
            },
            false,
        )
        .await;
        let err = h.pipeline.sync("cafe1").await.unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteFetch(RemoteError::EmptyPayload { ref endpoint }) if endpoint == "all-items"
        ));
        assert!(h.catalog.attached().is_empty());
        assert!(!h.export_dir.path().join("cafe1.json").exists());
    }

    #[tokio::test]
    async fn write_back_failures_are_counted_not_fatal() {
        let h = harness(
            MockCatalog {
                failing_items: HashSet::from(["i1".to_string()]),
                ..fixture_catalog()
            },
            false,
        )
        .await;
        let report = h.pipeline.sync("cafe1").await.unwrap();
        assert_eq!(report.attached, 1);
        assert_eq!(report.attach_failures, 1);
        assert_eq!(report.counts().attach_failures, 1);
        assert_eq!(
            h.catalog.attached(),
            vec![("pa_2".to_string(), "i2".to_string())]
        );
    }

    #[tokio::test]
    async fn overview_reports_snapshot_counts() {
        let h = harness(fixture_catalog(), true).await;

        let err = h.pipeline.overview("cafe1").await.unwrap_err();
        assert!(matches!(err, Error::NoSnapshot { .. }));

        h.pipeline.sync("cafe1").await.unwrap();
        let overview = h.pipeline.overview("cafe1").await.unwrap();
        assert_eq!(overview.venue, "cafe1");
        assert_eq!(overview.overview_message, json!("Stocktake on Friday"));
        assert_eq!(overview.total_items, 5);
        assert_eq!(overview.unassigned_items, 6);
        assert_eq!(overview.unallocated_items, vec!["i3".to_string()]);
        assert!(overview.picking_areas_refresh_at.is_some());

        let body = serde_json::to_value(&overview).unwrap();
        assert_eq!(body["totalItems"], 5);
        assert_eq!(body["overviewMessage"], "Stocktake on Friday");
    }

    #[tokio::test]
    async fn same_venue_runs_are_serialized() {
        let h = harness(fixture_catalog(), true).await;

        let (a, b) = tokio::join!(h.pipeline.sync("cafe1"), h.pipeline.sync("cafe1"));
        let (a, b) = (a.unwrap(), b.unwrap());
        // One run finishes before the other starts
        assert!(a.finished_at <= b.started_at || b.finished_at <= a.started_at);
    }

    #[tokio::test]
    async fn export_rejects_path_like_venue_ids() {
        let h = harness(fixture_catalog(), true).await;
        assert!(h.pipeline.export_path("../etc").is_err());
        assert!(h.pipeline.export_path("cafe1").is_ok());
    }
}
