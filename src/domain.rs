//! Resolved chart-query domain types (§3): the request shape passed to the
//! SQL compiler (`WarehouseChartQuery`) and its richer chart-level
//! counterpart (`ChartQuery`) carrying KPI, compare interval and sort-by.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{DataSource, Kpi, WarehouseMetric};
use crate::time::{DatetimeInterval, TimeGrain};

/// A column filter, scoped to the datasource its column lives on — which
/// may or may not be the query's primary datasource (§4.4 filter builder).
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    pub datasource: Arc<DataSource>,
    pub column_name: String,
    pub operator: String,
    pub values: Vec<String>,
}

/// A group-by column reference, scoped to its owning datasource the same
/// way a `ColumnFilter` is (§4.4 group-by builder).
#[derive(Debug, Clone)]
pub struct ColumnGroupBy {
    pub datasource: Arc<DataSource>,
    pub column_name: String,
}

/// The primitive request form passed to the SQL compiler.
#[derive(Debug, Clone)]
pub struct WarehouseChartQuery {
    pub app_id: String,
    pub page_id: String,
    pub request_id: String,
    pub datasource: Arc<DataSource>,
    pub metrics: HashMap<String, WarehouseMetric>,
    pub date_intervals: Vec<DatetimeInterval>,
    pub time_grain: TimeGrain,
    pub column_filters: Vec<ColumnFilter>,
    pub column_group_bys: Vec<ColumnGroupBy>,
    pub x_axis_column: String,
}

/// The resolved chart request (§3).
#[derive(Debug, Clone)]
pub struct ChartQuery {
    pub app_id: String,
    pub page_id: String,
    pub request_id: String,
    pub datasource: Arc<DataSource>,
    pub kpi: Kpi,
    pub time_grain: Option<TimeGrain>,
    pub date_interval: DatetimeInterval,
    pub clamped_date_interval: DatetimeInterval,
    pub compare_interval: Option<DatetimeInterval>,
    pub clamped_compare_interval: Option<DatetimeInterval>,
    pub x_axis_column: String,
    pub column_filters: Vec<ColumnFilter>,
    pub column_group_bys: Vec<ColumnGroupBy>,
    pub sort_by_datasource: Option<Arc<DataSource>>,
    pub sort_by_kpi: Option<Kpi>,
    pub group_by_limit: Option<usize>,
}

impl ChartQuery {
    /// A sort-by KPI is honored only when its datasource equals the
    /// primary datasource; otherwise it is ignored (§3 invariant).
    pub fn effective_sort_by_kpi(&self) -> Option<&Kpi> {
        match (&self.sort_by_datasource, &self.sort_by_kpi) {
            (Some(ds), Some(kpi)) if *ds == self.datasource => Some(kpi),
            _ => None,
        }
    }

    /// The number of days the compare period's x-axis must be shifted
    /// forward so its points line up with the primary period (§4.6 date
    /// strategy). Accounts for both the end-alignment between the clamped
    /// primary and compare intervals and any right-clamp the datasource's
    /// availability window applied to either one.
    pub fn compare_align_offset(&self) -> Option<i64> {
        let clamped_compare = self.clamped_compare_interval?;
        let compare = self.compare_interval?;
        let offset = (self.clamped_date_interval.date_to - clamped_compare.date_to).num_days();
        let date_clamped_right = (self.date_interval.date_to - self.clamped_date_interval.date_to).num_days();
        let compare_clamped_right = (compare.date_to - clamped_compare.date_to).num_days();
        Some(offset + date_clamped_right - compare_clamped_right)
    }

    /// The primitive request for the primary fetch (§4.4 compiler input).
    pub fn to_warehouse_query(&self) -> WarehouseChartQuery {
        WarehouseChartQuery {
            app_id: self.app_id.clone(),
            page_id: self.page_id.clone(),
            request_id: self.request_id.clone(),
            datasource: self.datasource.clone(),
            metrics: self.kpi.metrics.clone(),
            date_intervals: vec![self.clamped_date_interval],
            time_grain: self.time_grain.unwrap_or(self.datasource.time_grain),
            column_filters: self.column_filters.clone(),
            column_group_bys: self.column_group_bys.clone(),
            x_axis_column: self.x_axis_column.clone(),
        }
    }

    /// The primitive request for the compare-period fetch, if a compare
    /// interval was requested.
    pub fn to_compare_warehouse_query(&self) -> Option<WarehouseChartQuery> {
        let compare_interval = self.clamped_compare_interval?;
        let mut query = self.to_warehouse_query();
        query.date_intervals = vec![compare_interval];
        Some(query)
    }

    /// The primitive request for the sort-by fetch, if a sort-by KPI is
    /// present and honored (§3 invariant via [`Self::effective_sort_by_kpi`]).
    pub fn to_sort_by_warehouse_query(&self) -> Option<WarehouseChartQuery> {
        let sort_by_kpi = self.effective_sort_by_kpi()?;
        let mut query = self.to_warehouse_query();
        query.metrics = sort_by_kpi.metrics.clone();
        Some(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Cardinality;

    fn ds(id: &str) -> Arc<DataSource> {
        Arc::new(DataSource::daily(id, id, "", "main", "t", vec![], Cardinality::One, None))
    }

    fn kpi(id: &str) -> Kpi {
        Kpi::new(id, "x", HashMap::new(), HashMap::new())
    }

    #[test]
    fn sort_by_kpi_is_ignored_when_its_datasource_differs_from_the_primary() {
        let mut q = base_query();
        q.sort_by_datasource = Some(ds("other"));
        q.sort_by_kpi = Some(kpi("sort_kpi"));
        assert!(q.effective_sort_by_kpi().is_none());
    }

    #[test]
    fn sort_by_kpi_is_honored_when_its_datasource_matches_the_primary() {
        let mut q = base_query();
        q.sort_by_datasource = Some(q.datasource.clone());
        q.sort_by_kpi = Some(kpi("sort_kpi"));
        assert!(q.effective_sort_by_kpi().is_some());
    }

    fn base_query() -> ChartQuery {
        let interval = DatetimeInterval::new(chrono::Utc::now(), chrono::Utc::now());
        ChartQuery {
            app_id: "app1".to_string(),
            page_id: "page1".to_string(),
            request_id: "req1".to_string(),
            datasource: ds("primary"),
            kpi: kpi("dau"),
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
}
