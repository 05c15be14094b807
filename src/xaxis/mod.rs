//! X-axis strategies (§4.6): the date-axis and cohort-day-axis behaviors
//! that differ in how the primary/compare/sort-by fetches are shaped, how
//! an identity backbone is built, and how totals collapse.

pub mod cohort_day;
pub mod date;

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::Kpi;
use crate::constants::{COHORT_DAY_COLUMN_NAME, DATE_PARTITION_COLUMN_NAME};
use crate::domain::{ChartQuery, WarehouseChartQuery};
use crate::error::{EngineError, Result};
use crate::executor::Executor;
use crate::semantic::{Cell, RollupDataResult, RollupDataResults, TabularDataResult};
use crate::time::{DatetimeInterval, TimeGrain};
use crate::warehouse::{BoxFuture, Warehouse};

/// The three fetches a chart request may issue, gathered into per-symbol
/// result maps.
pub struct WarehouseComparedResults {
    pub results: HashMap<String, TabularDataResult>,
    pub compare_results: Option<HashMap<String, TabularDataResult>>,
    pub sort_by_results: Option<HashMap<String, TabularDataResult>>,
}

pub trait XAxisSpecifics: Send + Sync {
    fn get_warehouse_compared_results<'a>(
        &'a self,
        query: &'a ChartQuery,
        executor: &'a Arc<Executor>,
        warehouse: &'a Arc<dyn Warehouse>,
    ) -> BoxFuture<'a, Result<WarehouseComparedResults>>;

    fn get_identity_result(
        &self,
        interval: &DatetimeInterval,
        grain: Option<TimeGrain>,
        group_by_columns: Vec<String>,
        group_by_values: Vec<Vec<Cell>>,
    ) -> RollupDataResult;

    fn get_compare_identity_date_interval(&self, query: &ChartQuery) -> Option<DatetimeInterval>;

    fn get_semantic_layer_result(
        &self,
        query: &ChartQuery,
        kpi: &Kpi,
        identity: &RollupDataResult,
        rollups: &RollupDataResults,
    ) -> Result<TabularDataResult>;

    fn get_total(&self, query: &ChartQuery, identity: &RollupDataResult, rollups: &RollupDataResults) -> Result<Option<TabularDataResult>>;

    fn get_single_total(
        &self,
        query: &ChartQuery,
        identity: &RollupDataResult,
        rollups: &RollupDataResults,
    ) -> Result<Option<TabularDataResult>>;
}

pub fn get_x_axis_specifics(x_axis_column_id: &str) -> Result<Box<dyn XAxisSpecifics>> {
    match x_axis_column_id {
        DATE_PARTITION_COLUMN_NAME => Ok(Box::new(date::DateSpecifics)),
        COHORT_DAY_COLUMN_NAME => Ok(Box::new(cohort_day::CohortDaySpecifics)),
        other => Err(EngineError::UnsupportedXAxis(other.to_string())),
    }
}

/// Compiles and submits one primitive request, gathering its per-metric
/// results into a map keyed by symbol.
pub(crate) async fn fetch(
    query: &WarehouseChartQuery,
    executor: &Arc<Executor>,
    warehouse: &Arc<dyn Warehouse>,
) -> Result<HashMap<String, TabularDataResult>> {
    let compiled = crate::compiler::build(query)?;
    executor.submit_all(Arc::clone(warehouse), compiled).await
}
