//! End-to-end chart-request orchestration (§6): the one operation a caller
//! outside this crate needs — resolve the x-axis strategy, fetch and
//! evaluate through the pipeline, and surface the cancellation endpoints.
//! Deliberately stops short of an HTTP surface: request parsing, response
//! serialization, and authn/z stay out of this crate.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::catalog::Kpi;
use crate::domain::ChartQuery;
use crate::error::Result;
use crate::executor::Executor;
use crate::pipeline::{self, ChartResult};
use crate::semantic::TabularDataResult;
use crate::warehouse::Warehouse;
use crate::xaxis::get_x_axis_specifics;

/// The dense chart object a caller asked for: the evaluated series plus its
/// totals, and the same trio for the compare overlay when one was requested.
pub struct ChartResponse {
    pub result: TabularDataResult,
    pub total: Option<TabularDataResult>,
    pub single_total: Option<TabularDataResult>,
    pub compare_result: Option<TabularDataResult>,
    pub compare_total: Option<TabularDataResult>,
    pub compare_single_total: Option<TabularDataResult>,
    pub unit: Option<crate::catalog::Unit>,
}

impl ChartResponse {
    fn from_parts(kpi: &Kpi, primary: ChartResult, compare: Option<ChartResult>) -> Self {
        Self {
            result: primary.result,
            total: primary.total,
            single_total: primary.single_total,
            compare_result: compare.as_ref().map(|c| c.result.clone()),
            compare_total: compare.as_ref().and_then(|c| c.total.clone()),
            compare_single_total: compare.as_ref().and_then(|c| c.single_total.clone()),
            unit: kpi.unit.clone(),
        }
    }
}

/// Ties the x-axis strategy, the cancellable executor, and the chart
/// pipeline together behind one entry point.
pub struct ChartService {
    executor: Arc<Executor>,
    warehouse: Arc<dyn Warehouse>,
}

impl ChartService {
    pub fn new(executor: Arc<Executor>, warehouse: Arc<dyn Warehouse>) -> Self {
        Self { executor, warehouse }
    }

    /// Runs one chart request end to end: primary fetch, optional sort-by
    /// and compare fetches, the pipeline's limit/trim/overload/compare-overlay
    /// policy, and the semantic layer evaluation (§4.6, §4.7).
    #[instrument(
        name = "chart_request",
        skip(self, query),
        fields(service = %self.executor.service(), request_id = %query.request_id, app_id = %query.app_id, page_id = %query.page_id)
    )]
    pub async fn submit_chart(&self, query: &ChartQuery) -> Result<ChartResponse> {
        let specifics = get_x_axis_specifics(&query.x_axis_column)?;

        let compared = specifics
            .get_warehouse_compared_results(query, &self.executor, &self.warehouse)
            .await?;

        let primary = pipeline::build_from_result(
            query,
            specifics.as_ref(),
            &compared.results,
            compared.sort_by_results.as_ref(),
        )?;

        let compare = pipeline::build_from_compare_result(
            query,
            specifics.as_ref(),
            compared.compare_results.as_ref(),
            &primary.result,
        )?;

        info!(request_id = %query.request_id, "chart request finished");

        Ok(ChartResponse::from_parts(&query.kpi, primary, compare))
    }

    /// Cancels every in-flight (and soon-to-arrive, within the sweeper's
    /// window) task tagged with this request id (§4.8).
    pub fn cancel_by_request_id(&self, request_id: &str) {
        self.executor.cancellation.cancel_by_request_id(request_id);
    }

    /// Cancels every in-flight (and soon-to-arrive) task tagged with this
    /// page id — used when a user navigates away before every chart on a
    /// page has finished loading (§4.8).
    pub fn cancel_by_page_id(&self, page_id: &str) {
        self.executor.cancellation.cancel_by_page_id(page_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cardinality, DataSource, Rollup, WarehouseMetric};
    use crate::constants::DATE_PARTITION_COLUMN_NAME;
    use crate::warehouse::test_support::FakeWarehouse;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn ds() -> Arc<DataSource> {
        Arc::new(DataSource::daily("ds", "DS", "", "main", "t", vec![], Cardinality::One, None))
    }

    fn kpi() -> Kpi {
        let mut metrics = HashMap::new();
        metrics.insert(
            "y".to_string(),
            WarehouseMetric { select_expression: "SUM(1)".to_string(), where_expression: None, data_source_table: "t".to_string() },
        );
        let mut x_axis = HashMap::new();
        x_axis.insert("date_".to_string(), Rollup { rollup_x_axis: "sum".to_string(), rollup_y_axis: "sum".to_string() });
        Kpi::new("dau", "y", metrics, x_axis)
    }

    fn query() -> ChartQuery {
        let iv = crate::time::DatetimeInterval::new(
            Utc.with_ymd_and_hms(2022, 1, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 1, 12, 0, 0, 0).unwrap(),
        );
        ChartQuery {
            app_id: "app1".to_string(),
            page_id: "page1".to_string(),
            request_id: "req1".to_string(),
            datasource: ds(),
            kpi: kpi(),
            time_grain: None,
            date_interval: iv,
            clamped_date_interval: iv,
            compare_interval: None,
            clamped_compare_interval: None,
            x_axis_column: DATE_PARTITION_COLUMN_NAME.to_string(),
            column_filters: vec![],
            column_group_bys: vec![],
            sort_by_datasource: None,
            sort_by_kpi: None,
            group_by_limit: None,
        }
    }

    #[tokio::test]
    async fn submit_chart_runs_the_full_pipeline_against_a_fake_warehouse() {
        let executor = Arc::new(Executor::new(4));
        let warehouse: Arc<dyn Warehouse> = Arc::new(FakeWarehouse::new());
        let service = ChartService::new(executor, warehouse);
        let response = service.submit_chart(&query()).await.unwrap();
        assert!(response.total.is_some());
        assert!(response.single_total.is_some());
        assert!(response.compare_result.is_none());
    }

    #[test]
    fn cancellation_delegates_to_the_executor_registry() {
        let executor = Arc::new(Executor::new(4));
        let warehouse: Arc<dyn Warehouse> = Arc::new(FakeWarehouse::new());
        let service = ChartService::new(Arc::clone(&executor), warehouse);
        service.cancel_by_request_id("req1");
        assert!(executor.cancellation.is_cancelled("req1", "anything"));
        service.cancel_by_page_id("page9");
        assert!(executor.cancellation.is_cancelled("anything", "page9"));
    }
}
