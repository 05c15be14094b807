//! The cohort-day x-axis (§4.6): every fetch is rewritten to scope the
//! underlying event rows to users who registered inside the requested
//! window, widening the date filter so a user's later cohort days are still
//! visible. No totals are produced in this mode.

use std::sync::Arc;

use chrono::Duration;

use crate::catalog::Kpi;
use crate::constants::REGISTRATION_DATE_COLUMN_NAME;
use crate::domain::{ChartQuery, ColumnFilter, WarehouseChartQuery};
use crate::error::Result;
use crate::executor::Executor;
use crate::semantic::{evaluate_formula, Cell, FormulaValue, RollupDataResult, RollupDataResults, TabularDataResult};
use crate::time::{DatetimeInterval, TimeGrain};
use crate::warehouse::{BoxFuture, Warehouse};

use super::{fetch, WarehouseComparedResults, XAxisSpecifics};

pub struct CohortDaySpecifics;

/// Scopes `query` to users who registered inside its (single) requested
/// interval, and widens that interval forward by its own day count so a
/// user registered on the last requested day still has room to show
/// cohort days beyond it.
fn preprocess(mut query: WarehouseChartQuery) -> WarehouseChartQuery {
    let interval = query.date_intervals[0];
    let days = interval.days();
    query.column_filters.push(ColumnFilter {
        datasource: query.datasource.clone(),
        column_name: REGISTRATION_DATE_COLUMN_NAME.to_string(),
        operator: "between".to_string(),
        values: vec![interval.date_from.date_naive().to_string(), interval.date_to.date_naive().to_string()],
    });
    query.date_intervals[0] = DatetimeInterval::new(interval.date_from, interval.date_to + Duration::days(days));
    query
}

impl XAxisSpecifics for CohortDaySpecifics {
    fn get_warehouse_compared_results<'a>(
        &'a self,
        query: &'a ChartQuery,
        executor: &'a Arc<Executor>,
        warehouse: &'a Arc<dyn Warehouse>,
    ) -> BoxFuture<'a, Result<WarehouseComparedResults>> {
        Box::pin(async move {
            let results = fetch(&preprocess(query.to_warehouse_query()), executor, warehouse).await?;

            let sort_by_results = match query.to_sort_by_warehouse_query() {
                Some(sort_by_query) => Some(fetch(&sort_by_query, executor, warehouse).await?),
                None => None,
            };

            let compare_results = match query.to_compare_warehouse_query() {
                Some(compare_query) => Some(fetch(&preprocess(compare_query), executor, warehouse).await?),
                None => None,
            };

            Ok(WarehouseComparedResults { results, compare_results, sort_by_results })
        })
    }

    /// `interval` arrives already widened by [`preprocess`]'s doubling, so
    /// halving its day count recovers the requested cohort-day depth.
    fn get_identity_result(
        &self,
        interval: &DatetimeInterval,
        _grain: Option<TimeGrain>,
        group_by_columns: Vec<String>,
        group_by_values: Vec<Vec<Cell>>,
    ) -> RollupDataResult {
        let days = interval.days() / 2;
        let table = TabularDataResult::from_cohort_days(days, group_by_columns, group_by_values);
        RollupDataResult {
            table,
            x_axis_reducer: crate::semantic::Reducer::Sum,
            group_by_reducer: crate::semantic::Reducer::Sum,
        }
    }

    fn get_compare_identity_date_interval(&self, query: &ChartQuery) -> Option<DatetimeInterval> {
        query.clamped_compare_interval
    }

    fn get_semantic_layer_result(
        &self,
        _query: &ChartQuery,
        kpi: &Kpi,
        identity: &RollupDataResult,
        rollups: &RollupDataResults,
    ) -> Result<TabularDataResult> {
        let identity_table = identity.rollup(|c| c.clone(), |g| g.clone());
        let rollup_tables = rollups.rollup(|c| c.clone(), |g| g.clone());
        let values = rollup_tables.into_iter().map(|(k, v)| (k, FormulaValue::Table(v))).collect();
        let result = evaluate_formula(&kpi.formula, &identity_table, &values)?;
        Ok(result.map_x_axis(|cell| match cell {
            Cell::Number(n) => Cell::Number(n.trunc()),
            other => other.clone(),
        }))
    }

    fn get_total(&self, _query: &ChartQuery, _identity: &RollupDataResult, _rollups: &RollupDataResults) -> Result<Option<TabularDataResult>> {
        Ok(None)
    }

    fn get_single_total(
        &self,
        _query: &ChartQuery,
        _identity: &RollupDataResult,
        _rollups: &RollupDataResults,
    ) -> Result<Option<TabularDataResult>> {
        Ok(None)
    }
}
