//! The warehouse driver contract (§6): an opaque boundary the executor
//! drives to run compiled SQL and to hook job lifecycle for cancellation.
//!
//! There is no `async-trait` anywhere in this crate's dependency stack, so
//! object-safe async methods are hand-boxed here rather than macro-derived.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::semantic::TabularDataResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identifies a submitted warehouse job for cancellation purposes.
pub type JobId = String;

/// A query admitted to the warehouse: its job id (known synchronously, so
/// the executor can register it for cancellation before awaiting it) and
/// the future resolving to its tabular result.
pub struct SubmittedJob {
    pub job_id: JobId,
    pub future: BoxFuture<'static, Result<TabularDataResult>>,
}

/// A warehouse driver: executes compiled SQL, supports cancelling an
/// in-flight job by id, and exposes lifecycle hooks the cancellable
/// executor (§4.8) calls around a job's run for its own bookkeeping.
pub trait Warehouse: Send + Sync {
    /// Starts `sql` running and returns its job id immediately, with a
    /// future that resolves once the job completes. Implementations fail
    /// the future with [`crate::EngineError::TooManyRows`] if the result
    /// exceeds the configured row cap.
    fn submit_query(&self, sql: String) -> Result<SubmittedJob>;

    /// Best-effort cancellation of a job by id. Cancelling an unknown job id
    /// is tolerated silently.
    fn cancel_job(&self, job_id: &JobId) -> BoxFuture<'_, ()>;

    /// Called by the executor immediately after a job is admitted, before
    /// its future is awaited.
    fn on_query_start(&self, _job_id: &JobId, _request_id: &str, _page_id: &str) {}

    /// Called by the executor once a job's future has resolved, regardless
    /// of outcome.
    fn on_query_end(&self, _job_id: &JobId, _request_id: &str, _page_id: &str) {}
}
