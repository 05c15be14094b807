//! The date-partition x-axis (§4.6): fetches are shaped straight from
//! `ChartQuery`, a compare period's points are shifted so they line up with
//! the primary period before being filtered back to the requested window,
//! and totals collapse the x-axis (and, for a single total, the group-by
//! columns too) down to one bucket.

use std::sync::Arc;

use chrono::Duration;

use crate::catalog::Kpi;
use crate::domain::ChartQuery;
use crate::error::Result;
use crate::executor::Executor;
use crate::semantic::{evaluate_formula, Cell, FormulaValue, RollupDataResult, RollupDataResults, TabularDataResult};
use crate::time::{DatetimeInterval, TimeGrain};
use crate::warehouse::{BoxFuture, Warehouse};

use super::{fetch, WarehouseComparedResults, XAxisSpecifics};

pub struct DateSpecifics;

fn shift(cell: &Cell, days: i64) -> Cell {
    match cell {
        Cell::DateTime(dt) => Cell::DateTime(*dt + Duration::days(days)),
        other => other.clone(),
    }
}

fn within(cell: &Cell, interval: &DatetimeInterval) -> bool {
    match cell {
        Cell::DateTime(dt) => interval.contains_date(dt.date_naive()),
        _ => true,
    }
}

impl XAxisSpecifics for DateSpecifics {
    fn get_warehouse_compared_results<'a>(
        &'a self,
        query: &'a ChartQuery,
        executor: &'a Arc<Executor>,
        warehouse: &'a Arc<dyn Warehouse>,
    ) -> BoxFuture<'a, Result<WarehouseComparedResults>> {
        Box::pin(async move {
            let results = fetch(&query.to_warehouse_query(), executor, warehouse).await?;

            let sort_by_results = match query.to_sort_by_warehouse_query() {
                Some(sort_by_query) => Some(fetch(&sort_by_query, executor, warehouse).await?),
                None => None,
            };

            let compare_results = match query.to_compare_warehouse_query() {
                Some(compare_query) => {
                    let raw = fetch(&compare_query, executor, warehouse).await?;
                    let offset = query.compare_align_offset().unwrap_or(0);
                    let aligned = raw
                        .into_iter()
                        .map(|(symbol, table)| {
                            let aligned = table
                                .map_x_axis(|cell| shift(cell, offset))
                                .filter(|cell| within(cell, &query.date_interval));
                            (symbol, aligned)
                        })
                        .collect();
                    Some(aligned)
                }
                None => None,
            };

            Ok(WarehouseComparedResults { results, compare_results, sort_by_results })
        })
    }

    fn get_identity_result(
        &self,
        interval: &DatetimeInterval,
        grain: Option<TimeGrain>,
        group_by_columns: Vec<String>,
        group_by_values: Vec<Vec<Cell>>,
    ) -> RollupDataResult {
        let table = TabularDataResult::from_date_interval(interval, grain.unwrap_or(TimeGrain::Day), group_by_columns, group_by_values);
        RollupDataResult {
            table,
            x_axis_reducer: crate::semantic::Reducer::Sum,
            group_by_reducer: crate::semantic::Reducer::Sum,
        }
    }

    /// Starts no earlier than the (unclamped) requested primary interval and
    /// ends at the compare interval shifted forward by the same alignment
    /// offset used for the compare fetch itself.
    fn get_compare_identity_date_interval(&self, query: &ChartQuery) -> Option<DatetimeInterval> {
        let compare = query.clamped_compare_interval?;
        let offset = query.compare_align_offset()?;
        let shifted_from = compare.date_from + Duration::days(offset);
        let shifted_to = compare.date_to + Duration::days(offset);
        let from = query.date_interval.date_from.max(shifted_from);
        Some(DatetimeInterval::new(from, shifted_to))
    }

    fn get_semantic_layer_result(
        &self,
        query: &ChartQuery,
        kpi: &Kpi,
        identity: &RollupDataResult,
        rollups: &RollupDataResults,
    ) -> Result<TabularDataResult> {
        let grain = query.time_grain.unwrap_or(query.datasource.time_grain);
        let truncate = move |cell: &Cell| match cell {
            Cell::DateTime(dt) => Cell::DateTime(grain.truncate_datetime(*dt)),
            other => other.clone(),
        };
        let identity_table = identity.rollup(truncate, |g| g.clone());
        let rollup_tables = rollups.rollup(truncate, |g| g.clone());
        let values = rollup_tables.into_iter().map(|(k, v)| (k, FormulaValue::Table(v))).collect();
        let mut result = evaluate_formula(&kpi.formula, &identity_table, &values)?;

        if grain >= TimeGrain::Day {
            result = result.map_x_axis(|cell| match cell {
                Cell::DateTime(dt) => Cell::DateTime(TimeGrain::Day.truncate_datetime(*dt)),
                other => other.clone(),
            });
        }

        Ok(result)
    }

    fn get_total(&self, query: &ChartQuery, identity: &RollupDataResult, rollups: &RollupDataResults) -> Result<Option<TabularDataResult>> {
        let identity_table = identity.rollup(|_| Cell::Number(0.0), |g| g.clone());
        let rollup_tables = rollups.rollup(|_| Cell::Number(0.0), |g| g.clone());
        let values = rollup_tables.into_iter().map(|(k, v)| (k, FormulaValue::Table(v))).collect();
        Ok(Some(evaluate_formula(&query.kpi.formula, &identity_table, &values)?))
    }

    fn get_single_total(
        &self,
        query: &ChartQuery,
        identity: &RollupDataResult,
        rollups: &RollupDataResults,
    ) -> Result<Option<TabularDataResult>> {
        let identity_table = identity.rollup(|_| Cell::Number(0.0), |_| Cell::Null);
        let rollup_tables = rollups.rollup(|_| Cell::Number(0.0), |_| Cell::Null);
        let values = rollup_tables.into_iter().map(|(k, v)| (k, FormulaValue::Table(v))).collect();
        Ok(Some(evaluate_formula(&query.kpi.formula, &identity_table, &values)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cardinality, DataSource};
    use chrono::Utc;
    use std::collections::HashMap;

    fn ds() -> Arc<DataSource> {
        Arc::new(DataSource::daily("ds", "DS", "", "main", "t", vec![], Cardinality::One, None))
    }

    fn kpi() -> Kpi {
        Kpi::new("dau", "logins", HashMap::new(), HashMap::new())
    }

    fn query() -> ChartQuery {
        let interval = DatetimeInterval::new(Utc::now(), Utc::now());
        ChartQuery {
            app_id: "app1".to_string(),
            page_id: "page1".to_string(),
            request_id: "req1".to_string(),
            datasource: ds(),
            kpi: kpi(),
            time_grain: None,
            date_interval: interval,
            clamped_date_interval: interval,
            compare_interval: None,
            clamped_compare_interval: None,
            x_axis_column: "date_".to_string(),
            column_filters: vec![],
            column_group_bys: vec![],
            sort_by_datasource: None,
            sort_by_kpi: None,
            group_by_limit: None,
        }
    }

    #[test]
    fn get_total_collapses_x_axis_but_keeps_group_by_columns() {
        let specifics = DateSpecifics;
        let q = query();
        let identity = specifics.get_identity_result(&q.clamped_date_interval, None, vec!["country".to_string()], vec![vec![Cell::Text("US".to_string())]]);
        let mut rollups = RollupDataResults::new();
        rollups.add("logins", identity.clone());
        let total = specifics.get_total(&q, &identity, &rollups).unwrap().unwrap();
        assert_eq!(total.group_by_columns().to_vec(), vec!["country".to_string()]);
    }

    #[test]
    fn scenario_b_compare_with_right_clamp_aligns_and_keeps_all_five_points() {
        use crate::semantic::Row;

        let mut q = query();
        q.date_interval = DatetimeInterval::new(
            Utc.with_ymd_and_hms(2022, 12, 30, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 3, 0, 0, 0).unwrap(),
        );
        q.clamped_date_interval = DatetimeInterval::new(
            Utc.with_ymd_and_hms(2022, 12, 30, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        );
        q.compare_interval = Some(DatetimeInterval::new(
            Utc.with_ymd_and_hms(2022, 12, 27, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 12, 31, 0, 0, 0).unwrap(),
        ));
        q.clamped_compare_interval = Some(DatetimeInterval::new(
            Utc.with_ymd_and_hms(2022, 12, 27, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 12, 29, 0, 0, 0).unwrap(),
        ));

        let offset = q.compare_align_offset().unwrap();
        assert_eq!(offset, 3);

        let rows: Vec<Row> = (0..5)
            .map(|i| Row {
                x_axis: Cell::DateTime(Utc.with_ymd_and_hms(2022, 12, 27, 0, 0, 0).unwrap() + Duration::days(i)),
                group_by: vec![],
                value: i as f64,
            })
            .collect();
        let raw = TabularDataResult::new(vec![], rows);
        let aligned = raw.map_x_axis(|cell| shift(cell, offset)).filter(|cell| within(cell, &q.date_interval));

        assert_eq!(aligned.rows.len(), 5);
        assert_eq!(aligned.rows[0].x_axis, Cell::DateTime(Utc.with_ymd_and_hms(2022, 12, 30, 0, 0, 0).unwrap()));
        assert_eq!(aligned.rows[4].x_axis, Cell::DateTime(Utc.with_ymd_and_hms(2023, 1, 3, 0, 0, 0).unwrap()));
    }

    #[test]
    fn get_single_total_collapses_both_axes() {
        let specifics = DateSpecifics;
        let q = query();
        let identity = specifics.get_identity_result(&q.clamped_date_interval, None, vec!["country".to_string()], vec![vec![Cell::Text("US".to_string())]]);
        let mut rollups = RollupDataResults::new();
        rollups.add("logins", identity.clone());
        let total = specifics.get_single_total(&q, &identity, &rollups).unwrap().unwrap();
        assert_eq!(total.rows.len(), 1);
    }
}
