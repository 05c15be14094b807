//! The bounded worker pool (§4.8): admission control over a fixed-size
//! semaphore, one task per submitted query, wired into the cancellation
//! registry around each job's lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::compiler::CompiledQuery;
use crate::error::{EngineError, Result};
use crate::logging;
use crate::semantic::TabularDataResult;
use crate::warehouse::Warehouse;

use super::cancellation::CancellationRegistry;

const SWEEPER_INTERVAL: Duration = Duration::from_secs(5);

pub struct Executor {
    semaphore: Arc<Semaphore>,
    pub cancellation: CancellationRegistry,
    /// `chartengine<SERVICE_SUFFIX>`, fixed at construction so every span
    /// this executor opens can be grouped by deployment downstream.
    service: String,
}

impl Executor {
    pub fn new(pool_size: usize) -> Self {
        Self::with_service_suffix(pool_size, "")
    }

    pub fn with_service_suffix(pool_size: usize, service_suffix: &str) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(pool_size)),
            cancellation: CancellationRegistry::new(),
            service: logging::service_name(service_suffix),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Submits one compiled query (§4.8 scheduling/suspension/cancellation):
    /// takes a non-blocking permit, aborts immediately if either id is
    /// already cancelled, registers the job id for the sweeper, awaits the
    /// warehouse call, then always deregisters the job id and releases the
    /// permit.
    #[instrument(skip(self, warehouse, sql), fields(service = %self.service, request_id = %request_id, page_id = %page_id))]
    pub async fn submit(&self, warehouse: &dyn Warehouse, sql: String, request_id: &str, page_id: &str) -> Result<TabularDataResult> {
        let _permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| EngineError::TooManyRequests)?;

        if self.cancellation.is_cancelled(request_id, page_id) {
            return Err(EngineError::CancelledQuery(request_id.to_string()));
        }

        let submitted = warehouse.submit_query(sql)?;
        let job_id = submitted.job_id;
        self.cancellation.register_job(&job_id, request_id, page_id);
        warehouse.on_query_start(&job_id, request_id, page_id);

        let result = submitted.future.await;

        warehouse.on_query_end(&job_id, request_id, page_id);
        self.cancellation.complete_job(&job_id, request_id, page_id);

        result
    }

    /// Submits every compiled query concurrently and gathers the results
    /// into a map keyed by metric symbol. No ordering guarantee between
    /// metrics of the same chart request (§4.8, §5).
    pub async fn submit_all(
        self: &Arc<Self>,
        warehouse: Arc<dyn Warehouse>,
        queries: HashMap<String, CompiledQuery>,
    ) -> Result<HashMap<String, TabularDataResult>> {
        let mut handles = Vec::with_capacity(queries.len());
        for (symbol, compiled) in queries {
            let executor = Arc::clone(self);
            let warehouse = Arc::clone(&warehouse);
            handles.push(tokio::spawn(async move {
                let result = executor
                    .submit(warehouse.as_ref(), compiled.sql, &compiled.request_id, &compiled.page_id)
                    .await;
                (symbol, result)
            }));
        }

        let mut gathered = HashMap::with_capacity(handles.len());
        for handle in handles {
            let (symbol, result) = handle.await.map_err(|e| EngineError::Warehouse(format!("executor task panicked: {e}")))?;
            gathered.insert(symbol, result?);
        }
        Ok(gathered)
    }
}

/// Spawns the background sweeper (§4.8): wakes every 5 seconds and walks
/// both cancelled-id sets, asking the warehouse to cancel each live job it
/// finds. Runs until the returned handle is aborted or dropped with the
/// runtime.
pub fn spawn_sweeper(executor: Arc<Executor>, warehouse: Arc<dyn Warehouse>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEPER_INTERVAL);
        loop {
            ticker.tick().await;
            executor.cancellation.sweep(warehouse.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::test_support::FakeWarehouse;

    #[tokio::test]
    async fn admission_fails_once_the_pool_is_saturated() {
        let executor = Executor::new(1);
        let warehouse = FakeWarehouse::new();
        let permit = executor.semaphore.clone().try_acquire_owned().unwrap();
        let err = executor.submit(&warehouse, "SELECT 1".to_string(), "r1", "p1").await.unwrap_err();
        assert!(matches!(err, EngineError::TooManyRequests));
        drop(permit);
    }

    #[tokio::test]
    async fn submit_fails_fast_when_the_request_id_was_already_cancelled() {
        let executor = Executor::new(4);
        let warehouse = FakeWarehouse::new();
        executor.cancellation.cancel_by_request_id("r1");
        let err = executor.submit(&warehouse, "SELECT 1".to_string(), "r1", "p1").await.unwrap_err();
        assert!(matches!(err, EngineError::CancelledQuery(_)));
        assert_eq!(warehouse.started.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scenario_f_cancellation_abort_before_dispatch() {
        let executor = Arc::new(Executor::new(4));
        let warehouse = Arc::new(FakeWarehouse::new());
        let warehouse_dyn: Arc<dyn Warehouse> = warehouse.clone();
        executor.cancellation.cancel_by_request_id("r");

        let mut queries = HashMap::new();
        queries.insert(
            "a".to_string(),
            CompiledQuery { symbol: "ds.t.a".to_string(), app_id: "app1".to_string(), page_id: "p1".to_string(), request_id: "r".to_string(), sql: "SELECT a".to_string() },
        );
        queries.insert(
            "b".to_string(),
            CompiledQuery { symbol: "ds.t.b".to_string(), app_id: "app1".to_string(), page_id: "p1".to_string(), request_id: "r".to_string(), sql: "SELECT b".to_string() },
        );

        let err = executor.submit_all(warehouse_dyn, queries).await.unwrap_err();
        assert!(matches!(err, EngineError::CancelledQuery(_)));
        assert_eq!(warehouse.started.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_all_gathers_every_symbol_keyed_by_metric() {
        let executor = Arc::new(Executor::new(4));
        let warehouse: Arc<dyn Warehouse> = Arc::new(
            FakeWarehouse::new()
                .with_response("SELECT a", Ok(TabularDataResult::new(vec![], vec![])))
                .with_response("SELECT b", Ok(TabularDataResult::new(vec![], vec![]))),
        );
        let mut queries = HashMap::new();
        queries.insert(
            "a".to_string(),
            CompiledQuery {
                symbol: "ds.t.a".to_string(),
                app_id: "app1".to_string(),
                page_id: "p1".to_string(),
                request_id: "r1".to_string(),
                sql: "SELECT a".to_string(),
            },
        );
        queries.insert(
            "b".to_string(),
            CompiledQuery {
                symbol: "ds.t.b".to_string(),
                app_id: "app1".to_string(),
                page_id: "p1".to_string(),
                request_id: "r1".to_string(),
                sql: "SELECT b".to_string(),
            },
        );
        let results = executor.submit_all(warehouse, queries).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.contains_key("a") && results.contains_key("b"));
    }
}
