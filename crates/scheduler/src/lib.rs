//! Per-venue sync scheduler.
//!
//! Each venue's `schedule` settings translate to one cron trigger:
//!
//! | `scheduleType` | trigger |
//! |----------------|---------|
//! | `every_hour` (default) | `0 * * * *` |
//! | `custom_time` | `M H * * d1,d2,...` (`*` when no days are selected) |
//! | anything else | no job |
//!
//! Jobs live in a [`JobRegistry`] keyed by `{venue_id}_schedule`; applying a
//! venue removes its old job before adding the new one. A background loop
//! evaluates triggers in a fixed local UTC offset and emits one
//! [`TriggeredSync`] per due job per minute; [`spawn_dispatcher`] runs the
//! assignment pipeline for each in its own task.

pub mod cron;
pub mod registry;

pub use cron::CronExpr;
pub use registry::{JobRegistry, ScheduledJob};

use chrono::{DateTime, FixedOffset, Utc};
use pickroute_core::error::StoreError;
use pickroute_core::store::{DocumentStore, DocumentStoreExt};
use pickroute_core::venue::{Schedule, ScheduleType, VenueSettings};
use pickroute_engine::AssignmentPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

/// Trigger used for `every_hour` schedules.
pub const EVERY_HOUR: &str = "0 * * * *";

const DAY_MAPPING: [(&str, &str); 7] = [
    ("sunday", "sun"),
    ("monday", "mon"),
    ("tuesday", "tue"),
    ("wednesday", "wed"),
    ("thursday", "thu"),
    ("friday", "fri"),
    ("saturday", "sat"),
];

/// Translate a venue schedule into a cron trigger.
///
/// `Ok(None)` means the venue is not scheduled. An unparsable `customTime`
/// is an error.
pub fn trigger_for(schedule: &Schedule) -> Result<Option<String>, String> {
    match &schedule.schedule_type {
        ScheduleType::EveryHour => Ok(Some(EVERY_HOUR.to_string())),
        ScheduleType::CustomTime => {
            let (hour, minute) = parse_custom_time(&schedule.custom_time)?;
            let days: Vec<&str> = schedule
                .selected_days
                .iter()
                .filter_map(|day| {
                    let day = day.trim().to_lowercase();
                    let mapped = DAY_MAPPING
                        .iter()
                        .find(|(name, _)| *name == day)
                        .map(|(_, abbr)| *abbr);
                    if mapped.is_none() {
                        debug!(day = %day, "Dropping unrecognized weekday");
                    }
                    mapped
                })
                .collect();
            let days = if days.is_empty() {
                "*".to_string()
            } else {
                days.join(",")
            };
            Ok(Some(format!("{minute} {hour} * * {days}")))
        }
        ScheduleType::None | ScheduleType::Other(_) => Ok(None),
    }
}

fn parse_custom_time(value: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("Invalid customTime '{value}', expected HH:MM");
    let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.trim().parse().map_err(|_| invalid())?;
    let minute: u32 = minute.trim().parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// A due job, ready for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredSync {
    pub venue_id: String,
    pub job_id: String,
    pub fired_at: DateTime<Utc>,
}

pub struct Scheduler {
    registry: Arc<RwLock<JobRegistry>>,
    offset: FixedOffset,
    tick: Duration,
}

impl Scheduler {
    /// `utc_offset_minutes` is the local offset triggers are evaluated in;
    /// `tick` is how often the loop checks for due jobs.
    pub fn new(utc_offset_minutes: i32, tick: Duration) -> Result<Self, String> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
            .ok_or_else(|| format!("Invalid UTC offset: {utc_offset_minutes} minutes"))?;
        Ok(Self {
            registry: Arc::new(RwLock::new(JobRegistry::new())),
            offset,
            tick,
        })
    }

    /// Replace the venue's job with one built from its current schedule.
    /// Returns the active trigger, if any.
    pub async fn apply_venue(&self, venue: &VenueSettings) -> Option<String> {
        let job_id = venue.job_id();
        let mut registry = self.registry.write().await;

        let previous = registry.remove(&job_id);
        if previous.is_some() {
            debug!(venue_id = %venue.venue_id, job_id = %job_id, "Removed previous job");
        }

        let trigger = match trigger_for(&venue.schedule) {
            Ok(Some(trigger)) => trigger,
            Ok(None) => {
                info!(venue_id = %venue.venue_id, schedule_type = %venue.schedule.schedule_type, "Venue not scheduled");
                return None;
            }
            Err(e) => {
                warn!(venue_id = %venue.venue_id, error = %e, "Invalid schedule, venue not scheduled");
                return None;
            }
        };

        match ScheduledJob::new(&venue.venue_id, job_id, trigger.clone()) {
            Ok(mut job) => {
                // Next fire is computed from now: an unchanged trigger keeps
                // its history, a new one cannot fire in the current minute
                job.last_run = match previous {
                    Some(previous) if previous.trigger == trigger => previous.last_run,
                    _ => Some(Utc::now()),
                };
                registry.upsert(job);
                info!(venue_id = %venue.venue_id, trigger = %trigger, "Schedule updated");
                Some(trigger)
            }
            Err(e) => {
                warn!(venue_id = %venue.venue_id, trigger = %trigger, error = %e, "Invalid trigger, venue not scheduled");
                None
            }
        }
    }

    /// Apply every venue and drop jobs for venues that no longer exist.
    /// Returns the number of active jobs.
    pub async fn sync_tenants(&self, venues: &[VenueSettings]) -> usize {
        for venue in venues {
            self.apply_venue(venue).await;
        }

        let venue_ids: Vec<&str> = venues.iter().map(|v| v.venue_id.as_str()).collect();
        let mut registry = self.registry.write().await;
        for job_id in registry.retain_venues(&venue_ids) {
            info!(job_id = %job_id, "Removed job for deleted venue");
        }
        registry.len()
    }

    /// Re-read all venues from the store and re-apply their schedules.
    pub async fn reload(&self, store: &dyn DocumentStore) -> Result<usize, StoreError> {
        let venues = store.venues().await?;
        Ok(self.sync_tenants(&venues).await)
    }

    pub async fn jobs(&self) -> Vec<ScheduledJob> {
        self.registry.read().await.list()
    }

    pub async fn job(&self, job_id: &str) -> Option<ScheduledJob> {
        self.registry.read().await.get(job_id).cloned()
    }

    /// Jobs due at `now`, each marked as run so it cannot fire again in
    /// the same minute.
    pub async fn due_jobs(&self, now: DateTime<Utc>) -> Vec<TriggeredSync> {
        collect_due(&self.registry, self.offset, now).await
    }

    /// Start the background loop.
    ///
    /// Returns a channel receiver that emits triggered syncs (feed it to
    /// [`spawn_dispatcher`]) and a join handle.
    pub fn start(&self) -> (mpsc::Receiver<TriggeredSync>, tokio::task::JoinHandle<()>) {
        let registry = self.registry.clone();
        let offset = self.offset;
        let tick = self.tick;
        let (tx, rx) = mpsc::channel::<TriggeredSync>(64);

        let handle = tokio::spawn(async move {
            info!(tick_secs = tick.as_secs(), offset = %offset, "Scheduler started");
            let mut interval = tokio::time::interval(tick);

            loop {
                interval.tick().await;
                for triggered in collect_due(&registry, offset, Utc::now()).await {
                    if tx.send(triggered).await.is_err() {
                        debug!("Triggered sync receiver dropped, stopping scheduler loop");
                        return;
                    }
                }
            }
        });

        (rx, handle)
    }
}

async fn collect_due(
    registry: &RwLock<JobRegistry>,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Vec<TriggeredSync> {
    let local = now.with_timezone(&offset);
    let mut registry = registry.write().await;

    let due: Vec<String> = registry
        .list()
        .into_iter()
        .filter(|job| job.expr.matches(&local) && !job.fired_in_minute_of(now))
        .map(|job| job.job_id)
        .collect();

    due.into_iter()
        .filter_map(|job_id| {
            let job = registry.get_mut(&job_id)?;
            job.last_run = Some(now);
            info!(venue_id = %job.venue_id, job_id = %job.job_id, "Scheduled sync triggered");
            Some(TriggeredSync {
                venue_id: job.venue_id.clone(),
                job_id,
                fired_at: now,
            })
        })
        .collect()
}

/// Run the pipeline once per triggered sync, each in its own task so a
/// slow venue never delays another.
pub fn spawn_dispatcher(
    mut rx: mpsc::Receiver<TriggeredSync>,
    pipeline: Arc<AssignmentPipeline>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(triggered) = rx.recv().await {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let venue_id = triggered.venue_id;
                match pipeline.sync(&venue_id).await {
                    Ok(report) => {
                        let counts = report.counts();
                        info!(
                            venue_id = %venue_id,
                            assigned = counts.assigned,
                            unavailable = counts.unavailable,
                            unallocated = counts.unallocated,
                            "Scheduled sync complete"
                        );
                    }
                    Err(e) => error!(venue_id = %venue_id, error = %e, "Scheduled sync failed"),
                }
            });
        }
        debug!("Dispatcher channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Timelike};
    use pickroute_core::catalog::{CatalogApi, PickingArea};
    use pickroute_core::error::RemoteError;
    use pickroute_core::venue::Endpoints;
    use pickroute_engine::PipelineOptions;
    use pickroute_store::InMemoryStore;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn venue(venue_id: &str, schedule: Schedule) -> VenueSettings {
        VenueSettings {
            venue_id: venue_id.into(),
            venue_name: None,
            endpoints: Endpoints {
                base_url: "https://api.example.com".into(),
                unassigned_items_endpoint: "/u".into(),
                item_config_endpoint: "/c".into(),
                menu_id: "m".into(),
                all_items_information_endpoint: "https://api.example.com/all".into(),
                venue_id: "r1".into(),
            },
            bin_mappings: vec![],
            location_transformations: vec![],
            overflow_locations: vec![],
            schedule,
            venue_message: None,
        }
    }

    fn custom(time: &str, days: &[&str]) -> Schedule {
        Schedule {
            schedule_type: ScheduleType::CustomTime,
            custom_time: time.into(),
            selected_days: days.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
            .and_utc()
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(0, Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn trigger_translation() {
        assert_eq!(
            trigger_for(&Schedule::default()).unwrap().as_deref(),
            Some("0 * * * *")
        );
        assert_eq!(
            trigger_for(&custom("07:05", &["Monday", "friday", "Funday"]))
                .unwrap()
                .as_deref(),
            Some("5 7 * * mon,fri")
        );
        assert_eq!(
            trigger_for(&custom("23:59", &[])).unwrap().as_deref(),
            Some("59 23 * * *")
        );

        let none = Schedule {
            schedule_type: ScheduleType::None,
            ..Schedule::default()
        };
        assert_eq!(trigger_for(&none).unwrap(), None);

        let other = Schedule {
            schedule_type: ScheduleType::Other("weekly".into()),
            ..Schedule::default()
        };
        assert_eq!(trigger_for(&other).unwrap(), None);
    }

    #[test]
    fn invalid_custom_time_is_an_error() {
        assert!(trigger_for(&custom("7pm", &[])).is_err());
        assert!(trigger_for(&custom("24:00", &[])).is_err());
        assert!(trigger_for(&custom("12:60", &[])).is_err());
    }

    #[tokio::test]
    async fn applying_same_schedule_twice_keeps_one_job() {
        let scheduler = scheduler();
        let cafe = venue("cafe1", custom("09:30", &["monday"]));

        scheduler.apply_venue(&cafe).await;
        scheduler.apply_venue(&cafe).await;

        let jobs = scheduler.jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "cafe1_schedule");
        assert_eq!(jobs[0].trigger, "30 9 * * mon");
    }

    #[tokio::test]
    async fn switching_to_none_or_invalid_removes_job() {
        let scheduler = scheduler();
        scheduler.apply_venue(&venue("cafe1", Schedule::default())).await;
        assert!(scheduler.job("cafe1_schedule").await.is_some());

        let off = Schedule {
            schedule_type: ScheduleType::None,
            ..Schedule::default()
        };
        assert_eq!(scheduler.apply_venue(&venue("cafe1", off)).await, None);
        assert!(scheduler.job("cafe1_schedule").await.is_none());

        scheduler.apply_venue(&venue("cafe1", Schedule::default())).await;
        assert_eq!(
            scheduler.apply_venue(&venue("cafe1", custom("noon", &[]))).await,
            None
        );
        assert!(scheduler.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn sync_tenants_prunes_removed_venues() {
        let scheduler = scheduler();
        let all = vec![
            venue("a", Schedule::default()),
            venue("b", Schedule::default()),
        ];
        assert_eq!(scheduler.sync_tenants(&all).await, 2);
        assert_eq!(scheduler.sync_tenants(&all[..1]).await, 1);
        assert!(scheduler.job("b_schedule").await.is_none());
    }

    #[tokio::test]
    async fn reload_reads_venues_from_store() {
        let store = InMemoryStore::new();
        store.save_venue(&venue("a", Schedule::default())).await.unwrap();
        store
            .save_venue(&venue("b", custom("06:00", &["sunday"])))
            .await
            .unwrap();

        let scheduler = scheduler();
        assert_eq!(scheduler.reload(&store).await.unwrap(), 2);
        assert_eq!(
            scheduler.job("b_schedule").await.unwrap().trigger,
            "0 6 * * sun"
        );
    }

    #[tokio::test]
    async fn due_jobs_fire_once_per_minute() {
        let scheduler = scheduler();
        scheduler.apply_venue(&venue("cafe1", Schedule::default())).await;

        let top = utc(2026, 3, 2, 10, 0);
        let fired = scheduler.due_jobs(top).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].venue_id, "cafe1");

        assert!(scheduler.due_jobs(top.with_second(30).unwrap()).await.is_empty());
        assert!(scheduler.due_jobs(utc(2026, 3, 2, 10, 1)).await.is_empty());
        assert_eq!(scheduler.due_jobs(utc(2026, 3, 2, 11, 0)).await.len(), 1);
    }

    #[tokio::test]
    async fn identical_reload_does_not_refire_in_same_minute() {
        let scheduler = scheduler();
        let cafe = venue("cafe1", Schedule::default());
        scheduler.apply_venue(&cafe).await;

        let top = utc(2026, 3, 2, 10, 0);
        assert_eq!(scheduler.due_jobs(top.with_second(5).unwrap()).await.len(), 1);

        assert_eq!(scheduler.sync_tenants(std::slice::from_ref(&cafe)).await, 1);
        assert!(scheduler.due_jobs(top.with_second(25).unwrap()).await.is_empty());
        assert_eq!(scheduler.due_jobs(utc(2026, 3, 2, 11, 0)).await.len(), 1);
    }

    #[tokio::test]
    async fn new_job_does_not_fire_in_minute_it_was_installed() {
        let scheduler = scheduler();
        let installed = Utc::now();
        let at_install = format!("{:02}:{:02}", installed.hour(), installed.minute());
        scheduler
            .apply_venue(&venue("cafe1", custom(&at_install, &[])))
            .await;

        assert!(scheduler.due_jobs(Utc::now()).await.is_empty());
    }

    #[tokio::test]
    async fn triggers_evaluate_in_local_offset() {
        // UTC+2: 09:30 local is 07:30 UTC. 2026-03-02 is a Monday.
        let scheduler = Scheduler::new(120, Duration::from_secs(60)).unwrap();
        scheduler
            .apply_venue(&venue("cafe1", custom("09:30", &["monday"])))
            .await;

        assert!(scheduler.due_jobs(utc(2026, 3, 2, 9, 30)).await.is_empty());
        assert_eq!(scheduler.due_jobs(utc(2026, 3, 2, 7, 30)).await.len(), 1);
    }

    #[test]
    fn invalid_offset_rejected() {
        assert!(Scheduler::new(24 * 60, Duration::from_secs(60)).is_err());
    }

    /// Counts picking-area fetches and reports no areas, so each sync
    /// stops right after the directory step.
    #[derive(Default)]
    struct CountingCatalog {
        area_calls: AtomicUsize,
    }

    #[async_trait]
    impl CatalogApi for CountingCatalog {
        fn name(&self) -> &str {
            "counting"
        }
        async fn fetch_unassigned_items(&self, _: &VenueSettings) -> Result<Value, RemoteError> {
            Ok(Value::Null)
        }
        async fn fetch_item_configs(&self, _: &VenueSettings) -> Result<Value, RemoteError> {
            Ok(Value::Null)
        }
        async fn fetch_all_items(&self, _: &VenueSettings) -> Result<Value, RemoteError> {
            Ok(Value::Null)
        }
        async fn fetch_picking_areas(
            &self,
            _: &VenueSettings,
        ) -> Result<Vec<PickingArea>, RemoteError> {
            self.area_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
        async fn attach_items(
            &self,
            _: &VenueSettings,
            _: &str,
            _: &[String],
        ) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatcher_runs_pipeline_per_trigger() {
        let store = Arc::new(InMemoryStore::new());
        store.save_venue(&venue("cafe1", Schedule::default())).await.unwrap();
        let catalog = Arc::new(CountingCatalog::default());
        let pipeline = Arc::new(AssignmentPipeline::new(
            store,
            catalog.clone(),
            PipelineOptions::default(),
        ));

        let (tx, rx) = mpsc::channel(4);
        let dispatcher = spawn_dispatcher(rx, pipeline);
        for _ in 0..2 {
            tx.send(TriggeredSync {
                venue_id: "cafe1".into(),
                job_id: "cafe1_schedule".into(),
                fired_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        drop(tx);
        dispatcher.await.unwrap();

        for _ in 0..100 {
            if catalog.area_calls.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(catalog.area_calls.load(Ordering::SeqCst), 2);
    }
}
