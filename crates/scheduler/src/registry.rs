//! Job registry: one scheduled sync per venue, keyed by job id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::cron::CronExpr;

/// A venue's scheduled sync.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    pub venue_id: String,
    /// `{venue_id}_schedule`
    pub job_id: String,
    /// 5-field cron expression, evaluated in the scheduler's local offset
    pub trigger: String,
    #[serde(skip)]
    pub(crate) expr: CronExpr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

impl ScheduledJob {
    pub fn new(
        venue_id: impl Into<String>,
        job_id: impl Into<String>,
        trigger: impl Into<String>,
    ) -> Result<Self, String> {
        let trigger = trigger.into();
        let expr = CronExpr::parse(&trigger)?;
        Ok(Self {
            venue_id: venue_id.into(),
            job_id: job_id.into(),
            trigger,
            expr,
            last_run: None,
        })
    }

    /// Whether this job already fired during the minute containing `now`.
    pub fn fired_in_minute_of(&self, now: DateTime<Utc>) -> bool {
        self.last_run
            .is_some_and(|last| last.timestamp().div_euclid(60) == now.timestamp().div_euclid(60))
    }
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, ScheduledJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any job with the same id, then add. Returns the replaced job.
    pub fn upsert(&mut self, job: ScheduledJob) -> Option<ScheduledJob> {
        let previous = self.jobs.remove(&job.job_id);
        self.jobs.insert(job.job_id.clone(), job);
        previous
    }

    pub fn remove(&mut self, job_id: &str) -> Option<ScheduledJob> {
        self.jobs.remove(job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<&ScheduledJob> {
        self.jobs.get(job_id)
    }

    pub(crate) fn get_mut(&mut self, job_id: &str) -> Option<&mut ScheduledJob> {
        self.jobs.get_mut(job_id)
    }

    /// All jobs, ordered by job id.
    pub fn list(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        jobs
    }

    /// Drop jobs whose venue is not in `venue_ids`. Returns the removed job ids.
    pub fn retain_venues(&mut self, venue_ids: &[&str]) -> Vec<String> {
        let stale: Vec<String> = self
            .jobs
            .values()
            .filter(|job| !venue_ids.contains(&job.venue_id.as_str()))
            .map(|job| job.job_id.clone())
            .collect();
        for job_id in &stale {
            self.jobs.remove(job_id);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
