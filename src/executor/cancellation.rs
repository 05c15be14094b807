//! The cancellation registry (§4.8): two short-lived id sets backing
//! `cancel_by_request_id`/`cancel_by_page_id`, plus the live job-id sets a
//! task registers into before it issues its warehouse call.

use std::collections::HashSet;
use std::time::Duration;

use dashmap::DashMap;
use moka::sync::Cache;

use crate::warehouse::{JobId, Warehouse};

const CANCELLED_ID_TTL: Duration = Duration::from_secs(60);
const CANCELLED_ID_CAPACITY: u64 = 100;

pub struct CancellationRegistry {
    cancelled_request_ids: Cache<String, ()>,
    cancelled_page_ids: Cache<String, ()>,
    jobs_by_request_id: DashMap<String, HashSet<JobId>>,
    jobs_by_page_id: DashMap<String, HashSet<JobId>>,
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationRegistry {
    pub fn new() -> Self {
        let build_cache = || Cache::builder().max_capacity(CANCELLED_ID_CAPACITY).time_to_live(CANCELLED_ID_TTL).build();
        Self {
            cancelled_request_ids: build_cache(),
            cancelled_page_ids: build_cache(),
            jobs_by_request_id: DashMap::new(),
            jobs_by_page_id: DashMap::new(),
        }
    }

    pub fn cancel_by_request_id(&self, request_id: &str) {
        self.cancelled_request_ids.insert(request_id.to_string(), ());
    }

    pub fn cancel_by_page_id(&self, page_id: &str) {
        self.cancelled_page_ids.insert(page_id.to_string(), ());
    }

    pub fn is_cancelled(&self, request_id: &str, page_id: &str) -> bool {
        self.cancelled_request_ids.contains_key(request_id) || self.cancelled_page_ids.contains_key(page_id)
    }

    /// Registers a live job id under both id sets. Callers must have already
    /// checked `is_cancelled` for this task before issuing the job.
    pub fn register_job(&self, job_id: &JobId, request_id: &str, page_id: &str) {
        self.jobs_by_request_id.entry(request_id.to_string()).or_default().insert(job_id.clone());
        self.jobs_by_page_id.entry(page_id.to_string()).or_default().insert(job_id.clone());
    }

    /// Removes a finished job id from both sets, pruning a set once empty so
    /// a job id lives in exactly one `(request_id, page_id)` pair at a time.
    pub fn complete_job(&self, job_id: &JobId, request_id: &str, page_id: &str) {
        remove_and_prune(&self.jobs_by_request_id, request_id, job_id);
        remove_and_prune(&self.jobs_by_page_id, page_id, job_id);
    }

    /// One sweeper pass: for every currently cancelled request_id and
    /// page_id, asks the warehouse to cancel every job id still recorded
    /// live under it, then drops the id from the cancelled set regardless of
    /// outcome.
    pub async fn sweep(&self, warehouse: &dyn Warehouse) {
        Self::sweep_one(&self.cancelled_request_ids, &self.jobs_by_request_id, warehouse).await;
        Self::sweep_one(&self.cancelled_page_ids, &self.jobs_by_page_id, warehouse).await;
    }

    async fn sweep_one(cancelled: &Cache<String, ()>, jobs_by_id: &DashMap<String, HashSet<JobId>>, warehouse: &dyn Warehouse) {
        let ids: Vec<String> = cancelled.iter().map(|(id, _)| (*id).clone()).collect();
        for id in ids {
            if let Some(job_ids) = jobs_by_id.get(&id) {
                for job_id in job_ids.value().clone() {
                    warehouse.cancel_job(&job_id).await;
                }
            }
            cancelled.invalidate(&id);
        }
    }
}

fn remove_and_prune(map: &DashMap<String, HashSet<JobId>>, key: &str, job_id: &JobId) {
    if let Some(mut entry) = map.get_mut(key) {
        entry.remove(job_id);
        if entry.is_empty() {
            drop(entry);
            map.remove(key);
        }
    }
}
