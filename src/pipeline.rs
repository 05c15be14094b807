//! The chart pipeline (§4.7): turns per-metric warehouse fragments into a
//! dense evaluated series plus totals, applying the group-by limit policy,
//! zero trimming, empty-fragment substitution, overload protection, and the
//! compare overlay on top of an [`crate::xaxis::XAxisSpecifics`] strategy.

use std::collections::{HashMap, HashSet};

use crate::catalog::Kpi;
use crate::constants::{BIGQUERY_MAX_DISTINCT_GROUP_BY_VALUES, BIGQUERY_MAX_ROWS};
use crate::domain::ChartQuery;
use crate::error::{EngineError, Result};
use crate::semantic::tabular::group_key;
use crate::semantic::{Cell, Reducer, RollupDataResult, RollupDataResults, TabularDataResult};
use crate::xaxis::XAxisSpecifics;

/// The evaluated series plus its per-group and overall totals, for either
/// the primary branch or a compare overlay.
pub struct ChartResult {
    pub result: TabularDataResult,
    pub total: Option<TabularDataResult>,
    pub single_total: Option<TabularDataResult>,
}

fn fragments_group_by_columns(fragments: &HashMap<String, TabularDataResult>) -> Vec<String> {
    fragments.values().next().map(|t| t.group_by_columns().to_vec()).unwrap_or_default()
}

fn fragments_group_by_values(fragments: &HashMap<String, TabularDataResult>) -> Vec<Vec<Cell>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for table in fragments.values() {
        for tuple in table.group_by_values() {
            if seen.insert(group_key(&tuple)) {
                out.push(tuple);
            }
        }
    }
    out
}

fn total_row_count(fragments: &HashMap<String, TabularDataResult>) -> usize {
    fragments.values().map(|t| t.rows.len()).sum()
}

/// §4.7 "Overload protection": fails before the semantic layer ever runs if
/// the fragments carry both too many distinct group-by tuples and too many
/// rows.
fn check_overload(fragments: &HashMap<String, TabularDataResult>) -> Result<()> {
    let distinct = fragments_group_by_values(fragments).len();
    let rows = total_row_count(fragments);
    if distinct > BIGQUERY_MAX_DISTINCT_GROUP_BY_VALUES && rows > BIGQUERY_MAX_ROWS / 2 {
        return Err(EngineError::TooManyGroupByValues {
            distinct,
            max: BIGQUERY_MAX_DISTINCT_GROUP_BY_VALUES,
        });
    }
    Ok(())
}

/// Builds one [`RollupDataResult`] per metric symbol, substituting the
/// identity table for any fragment that came back empty (§4.7 "Empty
/// fragment substitution").
fn get_rollup_results(
    query: &ChartQuery,
    kpi: &Kpi,
    identity: &RollupDataResult,
    fragments: &HashMap<String, TabularDataResult>,
) -> Result<RollupDataResults> {
    let rollup_config = kpi
        .x_axis
        .get(&query.x_axis_column)
        .ok_or_else(|| EngineError::UnsupportedXAxis(query.x_axis_column.clone()))?;
    let mut results = RollupDataResults::new();
    for (symbol, fragment) in fragments {
        let table = if fragment.is_empty() { identity.table.clone() } else { fragment.clone() };
        results.add(symbol.clone(), RollupDataResult::new(table, rollup_config)?);
    }
    Ok(results)
}

fn collapse_x_axis_totals(result: &TabularDataResult) -> TabularDataResult {
    result.map_x_axis(|_| Cell::Number(0.0)).group_by_x_axis(Reducer::Sum)
}

/// §4.7 "Limit policy": with no `group_by_limit`, every surviving tuple
/// passes through unchanged. Otherwise an intermediate pass (sort-by
/// fragments if present, else the primary ones) picks the top-N tuples by
/// total value, and a final pass recomputes against the primary fragments
/// filtered down to those tuples, preserving their ranked order.
fn limit_group_by_values(
    query: &ChartQuery,
    specifics: &dyn XAxisSpecifics,
    fragments: &HashMap<String, TabularDataResult>,
    sort_by_fragments: Option<&HashMap<String, TabularDataResult>>,
) -> Result<(TabularDataResult, RollupDataResults, RollupDataResult)> {
    let group_by_columns = fragments_group_by_columns(fragments);
    let group_by_values = fragments_group_by_values(fragments);

    if query.group_by_limit.unwrap_or(0) == 0 {
        let identity = specifics.get_identity_result(&query.clamped_date_interval, query.time_grain, group_by_columns, group_by_values);
        let rollups = get_rollup_results(query, &query.kpi, &identity, fragments)?;
        let result = specifics.get_semantic_layer_result(query, &query.kpi, &identity, &rollups)?;
        return Ok((result, rollups, identity));
    }

    let (sort_kpi, sort_fragments) = match (sort_by_fragments, query.effective_sort_by_kpi()) {
        (Some(f), Some(k)) => (k, f),
        _ => (&query.kpi, fragments),
    };

    let sort_identity = specifics.get_identity_result(
        &query.clamped_date_interval,
        query.time_grain,
        fragments_group_by_columns(sort_fragments),
        fragments_group_by_values(sort_fragments),
    );
    let sort_rollups = get_rollup_results(query, sort_kpi, &sort_identity, sort_fragments)?;
    let sort_result = specifics.get_semantic_layer_result(query, sort_kpi, &sort_identity, &sort_rollups)?;

    let limit = query.group_by_limit.unwrap_or(0);
    let surviving = collapse_x_axis_totals(&sort_result).get_top_n_values(limit).group_by_values();

    let final_identity = specifics.get_identity_result(&query.clamped_date_interval, query.time_grain, group_by_columns, group_by_values);
    let final_rollups = get_rollup_results(query, &query.kpi, &final_identity, fragments)?;
    let final_result = specifics.get_semantic_layer_result(query, &query.kpi, &final_identity, &final_rollups)?;

    let final_rollups = final_rollups.filter_by_group_by_values(&surviving);
    let final_result = final_result.filter_by_group_by_values(&surviving);
    let final_identity = final_identity.filter_by_group_by_values(&surviving);

    Ok((final_result, final_rollups, final_identity))
}

/// Builds the primary branch's result (§4.7, minus the compare overlay).
pub fn build_from_result(
    query: &ChartQuery,
    specifics: &dyn XAxisSpecifics,
    fragments: &HashMap<String, TabularDataResult>,
    sort_by_fragments: Option<&HashMap<String, TabularDataResult>>,
) -> Result<ChartResult> {
    check_overload(fragments)?;
    if let Some(sort_by) = sort_by_fragments {
        check_overload(sort_by)?;
    }

    let (result, rollups, identity) = limit_group_by_values(query, specifics, fragments, sort_by_fragments)?;

    let result = result.trim_zeros();
    let rollups = rollups.trim_zeros();
    let identity = identity.trim_zeros();

    let total = specifics.get_total(query, &identity, &rollups)?;
    let single_total = specifics.get_single_total(query, &identity, &rollups)?;

    Ok(ChartResult { result, total, single_total })
}

/// Builds the compare branch's result, filtered down to the primary
/// branch's surviving group-by tuples (§4.7 "Compare overlay"). Returns
/// `None` when there is no compare fetch, or when filtering leaves nothing
/// to show against a grouped primary result.
pub fn build_from_compare_result(
    query: &ChartQuery,
    specifics: &dyn XAxisSpecifics,
    compare_fragments: Option<&HashMap<String, TabularDataResult>>,
    primary_result: &TabularDataResult,
) -> Result<Option<ChartResult>> {
    let Some(compare_fragments) = compare_fragments else {
        return Ok(None);
    };
    check_overload(compare_fragments)?;

    let surviving = primary_result.group_by_values();
    let filtered: HashMap<String, TabularDataResult> = compare_fragments
        .iter()
        .map(|(symbol, table)| (symbol.clone(), table.filter_by_group_by_values(&surviving)))
        .collect();

    if !primary_result.group_by_columns().is_empty() && fragments_group_by_values(&filtered).is_empty() {
        return Ok(None);
    }

    let Some(compare_identity_interval) = specifics.get_compare_identity_date_interval(query) else {
        return Ok(None);
    };

    let identity = specifics.get_identity_result(
        &compare_identity_interval,
        query.time_grain,
        fragments_group_by_columns(&filtered),
        fragments_group_by_values(&filtered),
    );
    let rollups = get_rollup_results(query, &query.kpi, &identity, &filtered)?;
    let result = specifics.get_semantic_layer_result(query, &query.kpi, &identity, &rollups)?;

    let result = result.trim_zeros();
    let rollups = rollups.trim_zeros();
    let identity = identity.trim_zeros();

    let total = specifics.get_total(query, &identity, &rollups)?;
    let single_total = specifics.get_single_total(query, &identity, &rollups)?;

    Ok(Some(ChartResult { result, total, single_total }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cardinality, DataSource, Rollup, WarehouseMetric};
    use crate::semantic::Row;
    use crate::xaxis::date::DateSpecifics;
    use chrono::{TimeZone, Utc};

    fn ds() -> std::sync::Arc<DataSource> {
        std::sync::Arc::new(DataSource::daily("ds", "DS", "", "main", "t", vec![], Cardinality::One, None))
    }

    fn interval() -> crate::time::DatetimeInterval {
        crate::time::DatetimeInterval::new(
            Utc.with_ymd_and_hms(2022, 1, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 1, 14, 0, 0, 0).unwrap(),
        )
    }

    fn kpi() -> Kpi {
        let mut metrics = HashMap::new();
        metrics.insert(
            "y".to_string(),
            WarehouseMetric { select_expression: "SUM({x})".to_string(), where_expression: None, data_source_table: "t".to_string() },
        );
        let mut x_axis = HashMap::new();
        x_axis.insert(
            "date_".to_string(),
            Rollup { rollup_x_axis: "sum".to_string(), rollup_y_axis: "sum".to_string() },
        );
        Kpi::new("dau", "y", metrics, x_axis)
    }

    fn query() -> ChartQuery {
        let iv = interval();
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
            x_axis_column: "date_".to_string(),
            column_filters: vec![],
            column_group_bys: vec![],
            sort_by_datasource: None,
            sort_by_kpi: None,
            group_by_limit: None,
        }
    }

    fn day(offset: i64) -> Cell {
        Cell::DateTime(Utc.with_ymd_and_hms(2022, 1, 10, 0, 0, 0).unwrap() + chrono::Duration::days(offset))
    }

    #[test]
    fn scenario_a_simple_daily_kpi_with_zero_trim() {
        let q = query();
        let mut fragments = HashMap::new();
        fragments.insert(
            "y".to_string(),
            TabularDataResult::new(
                vec![],
                vec![
                    Row { x_axis: day(0), group_by: vec![], value: 0.0 },
                    Row { x_axis: day(1), group_by: vec![], value: 1.0 },
                    Row { x_axis: day(2), group_by: vec![], value: 2.0 },
                    Row { x_axis: day(3), group_by: vec![], value: 3.0 },
                    Row { x_axis: day(4), group_by: vec![], value: 4.0 },
                ],
            ),
        );
        let chart = build_from_result(&q, &DateSpecifics, &fragments, None).unwrap();
        let values: Vec<f64> = chart.result.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(chart.total.unwrap().rows.iter().map(|r| r.value).sum::<f64>(), 10.0);
        assert_eq!(chart.single_total.unwrap().rows[0].value, 10.0);
    }

    #[test]
    fn scenario_c_group_by_limit_via_sort_by_kpi() {
        fn tuple(name: &str) -> Vec<Cell> {
            vec![Cell::Text(name.to_string())]
        }

        let mut q = query();
        q.group_by_limit = Some(2);
        q.sort_by_datasource = Some(q.datasource.clone());
        let mut sort_metrics = HashMap::new();
        sort_metrics.insert(
            "y".to_string(),
            WarehouseMetric { select_expression: "SUM({x})".to_string(), where_expression: None, data_source_table: "t".to_string() },
        );
        let mut sort_x_axis = HashMap::new();
        sort_x_axis.insert("date_".to_string(), Rollup { rollup_x_axis: "sum".to_string(), rollup_y_axis: "sum".to_string() });
        q.sort_by_kpi = Some(Kpi::new("sort_kpi", "y", sort_metrics, sort_x_axis));

        let mut primary = HashMap::new();
        primary.insert(
            "y".to_string(),
            TabularDataResult::new(
                vec!["g".to_string()],
                vec![
                    Row { x_axis: day(0), group_by: tuple("a"), value: 0.0 },
                    Row { x_axis: day(0), group_by: tuple("b"), value: 1.0 },
                    Row { x_axis: day(0), group_by: tuple("c"), value: 2.0 },
                    Row { x_axis: day(1), group_by: tuple("a"), value: 3.0 },
                    Row { x_axis: day(1), group_by: tuple("b"), value: 4.0 },
                    Row { x_axis: day(1), group_by: tuple("c"), value: 5.0 },
                ],
            ),
        );

        let mut sort_fragments = HashMap::new();
        sort_fragments.insert(
            "y".to_string(),
            TabularDataResult::new(
                vec!["g".to_string()],
                vec![
                    Row { x_axis: day(0), group_by: tuple("d"), value: 0.0 },
                    Row { x_axis: day(0), group_by: tuple("b"), value: 1.0 },
                    Row { x_axis: day(0), group_by: tuple("c"), value: 2.0 },
                    Row { x_axis: day(1), group_by: tuple("d"), value: 3.0 },
                    Row { x_axis: day(1), group_by: tuple("b"), value: 4.0 },
                    Row { x_axis: day(1), group_by: tuple("c"), value: 5.0 },
                ],
            ),
        );

        // sort-by totals: d=3, b=5, c=7 — top two are c then b, d drops out.
        let chart = build_from_result(&q, &DateSpecifics, &primary, Some(&sort_fragments)).unwrap();
        let values: Vec<(String, f64)> = chart
            .result
            .rows
            .iter()
            .map(|r| match &r.group_by[0] {
                Cell::Text(s) => (s.clone(), r.value),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            values,
            vec![("c".to_string(), 2.0), ("b".to_string(), 1.0), ("c".to_string(), 5.0), ("b".to_string(), 4.0)]
        );
    }

    #[test]
    fn overload_protection_trips_before_the_semantic_layer_runs() {
        let mut rows = Vec::new();
        for i in 0..600 {
            rows.push(Row { x_axis: day(0), group_by: vec![Cell::Number(i as f64)], value: 1.0 });
        }
        for _ in 0..100_001 {
            rows.push(Row { x_axis: day(0), group_by: vec![Cell::Number(0.0)], value: 1.0 });
        }
        let mut fragments = HashMap::new();
        fragments.insert("y".to_string(), TabularDataResult::new(vec!["g".to_string()], rows));
        let q = query();
        let err = build_from_result(&q, &DateSpecifics, &fragments, None).unwrap_err();
        assert!(matches!(err, EngineError::TooManyGroupByValues { .. }));
    }

    #[test]
    fn scenario_d_too_many_group_by_trip() {
        let mut rows = Vec::new();
        for i in 0..501 {
            rows.push(Row { x_axis: day(0), group_by: vec![Cell::Number(i as f64)], value: 1.0 });
        }
        for _ in 0..100_499 {
            rows.push(Row { x_axis: day(0), group_by: vec![Cell::Number(0.0)], value: 1.0 });
        }
        assert_eq!(rows.len(), 101_000);
        let mut fragments = HashMap::new();
        fragments.insert("y".to_string(), TabularDataResult::new(vec!["g".to_string()], rows));
        let q = query();
        let err = build_from_result(&q, &DateSpecifics, &fragments, None).unwrap_err();
        assert!(matches!(err, EngineError::TooManyGroupByValues { distinct: 501, .. }));
    }

    #[test]
    fn compare_overlay_returns_none_without_a_compare_fetch() {
        let q = query();
        let primary = TabularDataResult::new(vec![], vec![]);
        assert!(build_from_compare_result(&q, &DateSpecifics, None, &primary).unwrap().is_none());
    }
}
