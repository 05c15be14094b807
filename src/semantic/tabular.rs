//! The tabular algebra (§4.1): every metric, rollup, and formula result is a
//! sparse set of `(x_axis, group_by..., value)` rows keyed by a merge key,
//! combined the way a join over that key would combine them.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::time::{DatetimeInterval, TimeGrain};

/// A single cell of an x-axis or group-by value.
///
/// `Number` backs cohort-day axes and numeric group-by columns; `DateTime`
/// backs the date-partition axis; `Text` backs everything else; `Null`
/// stands in for a group-by value BigQuery returned as `NULL`.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
    DateTime(DateTime<Utc>),
}

impl Cell {
    fn rank(&self) -> u8 {
        match self {
            Cell::Null => 0,
            Cell::Number(_) => 1,
            Cell::DateTime(_) => 2,
            Cell::Text(_) => 3,
        }
    }

    pub(crate) fn key(&self) -> String {
        match self {
            Cell::Null => "n:".to_string(),
            Cell::Text(s) => format!("t:{s}"),
            Cell::Number(n) => format!("f:{:x}", n.to_bits()),
            Cell::DateTime(dt) => format!("d:{}", dt.to_rfc3339()),
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::DateTime(a), Cell::DateTime(b)) => a.cmp(b),
            (Cell::Null, Cell::Null) => std::cmp::Ordering::Equal,
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub x_axis: Cell,
    pub group_by: Vec<Cell>,
    pub value: f64,
}

/// The result of one metric/rollup/formula evaluation: a sparse table over
/// an x-axis and zero or more group-by columns.
#[derive(Debug, Clone)]
pub struct TabularDataResult {
    pub group_by_columns: Vec<String>,
    pub rows: Vec<Row>,
}

fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

fn merge_key(x_axis: &Cell, group_by: &[Cell]) -> String {
    let mut key = x_axis.key();
    for cell in group_by {
        key.push('\u{1}');
        key.push_str(&cell.key());
    }
    key
}

pub(crate) fn group_key(group_by: &[Cell]) -> String {
    let mut key = String::new();
    for cell in group_by {
        key.push('\u{1}');
        key.push_str(&cell.key());
    }
    key
}

impl TabularDataResult {
    pub fn new(group_by_columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { group_by_columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn group_by_columns(&self) -> &[String] {
        &self.group_by_columns
    }

    fn map_value(&self, f: impl Fn(f64) -> f64) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                x_axis: row.x_axis.clone(),
                group_by: row.group_by.clone(),
                value: f(row.value),
            })
            .collect();
        Self::new(self.group_by_columns.clone(), rows)
    }

    /// Every row's value set to `scalar`, regardless of its current value.
    pub fn broadcast(&self, scalar: f64) -> Self {
        self.map_value(|_| scalar)
    }

    pub fn add_scalar(&self, scalar: f64) -> Self {
        self.map_value(|v| v + scalar)
    }

    pub fn subtract_scalar(&self, scalar: f64) -> Self {
        self.map_value(|v| v - scalar)
    }

    pub fn scalar_minus(&self, scalar: f64) -> Self {
        self.map_value(|v| scalar - v)
    }

    pub fn multiply_scalar(&self, scalar: f64) -> Self {
        self.map_value(|v| v * scalar)
    }

    pub fn divide_scalar(&self, scalar: f64) -> Self {
        self.map_value(|v| safe_div(v, scalar))
    }

    pub fn scalar_divide(&self, scalar: f64) -> Self {
        self.map_value(|v| safe_div(scalar, v))
    }

    fn index_by_merge_key(&self) -> HashMap<String, &Row> {
        self.rows.iter().map(|row| (merge_key(&row.x_axis, &row.group_by), row)).collect()
    }

    /// Inner-joins `self` and `other` on `(x_axis, group_by...)`, combining
    /// matched values with `combiner`. Short-circuits to a clone of whichever
    /// side is empty, so an arithmetic chain doesn't collapse the first time
    /// it touches a metric with no rows.
    fn combine_values(&self, other: &Self, combiner: impl Fn(f64, f64) -> f64) -> Self {
        if self.rows.is_empty() {
            return self.clone();
        }
        if other.rows.is_empty() {
            return other.clone();
        }
        let index = other.index_by_merge_key();
        let rows = self
            .rows
            .iter()
            .filter_map(|row| {
                let key = merge_key(&row.x_axis, &row.group_by);
                index.get(&key).map(|other_row| Row {
                    x_axis: row.x_axis.clone(),
                    group_by: row.group_by.clone(),
                    value: combiner(row.value, other_row.value),
                })
            })
            .collect();
        Self::new(self.group_by_columns.clone(), rows)
    }

    pub fn add_table(&self, other: &Self) -> Self {
        self.combine_values(other, |a, b| a + b)
    }

    pub fn subtract_table(&self, other: &Self) -> Self {
        self.combine_values(other, |a, b| a - b)
    }

    pub fn multiply_table(&self, other: &Self) -> Self {
        self.combine_values(other, |a, b| a * b)
    }

    pub fn divide_table(&self, other: &Self) -> Self {
        self.combine_values(other, safe_div)
    }

    /// Left-outer-joins `other` onto `self`, keeping `self`'s value wherever
    /// `other` has no matching row. Used to fill an identity table with
    /// fragment-query data one metric at a time.
    pub fn merge_values(&self, other: &Self) -> Self {
        let index = other.index_by_merge_key();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let key = merge_key(&row.x_axis, &row.group_by);
                let value = index.get(&key).map(|o| o.value).unwrap_or(row.value);
                Row {
                    x_axis: row.x_axis.clone(),
                    group_by: row.group_by.clone(),
                    value,
                }
            })
            .collect();
        Self::new(self.group_by_columns.clone(), rows)
    }

    pub fn map_x_axis(&self, f: impl Fn(&Cell) -> Cell) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                x_axis: f(&row.x_axis),
                group_by: row.group_by.clone(),
                value: row.value,
            })
            .collect();
        Self::new(self.group_by_columns.clone(), rows)
    }

    pub fn map_group_by_columns(&self, f: impl Fn(&Cell) -> Cell) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                x_axis: row.x_axis.clone(),
                group_by: row.group_by.iter().map(&f).collect(),
                value: row.value,
            })
            .collect();
        Self::new(self.group_by_columns.clone(), rows)
    }

    fn reduce_by_merge_key(&self, reducer: super::rollup::Reducer) -> Self {
        let mut order = Vec::new();
        let mut buckets: HashMap<String, (Cell, Vec<Cell>, Vec<f64>)> = HashMap::new();
        for row in &self.rows {
            let key = merge_key(&row.x_axis, &row.group_by);
            let entry = buckets.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                (row.x_axis.clone(), row.group_by.clone(), Vec::new())
            });
            entry.2.push(row.value);
        }
        let rows = order
            .into_iter()
            .map(|key| {
                let (x_axis, group_by, values) = buckets.remove(&key).expect("key was just inserted");
                Row {
                    x_axis,
                    group_by,
                    value: reducer.apply(&values),
                }
            })
            .collect();
        Self::new(self.group_by_columns.clone(), rows)
    }

    pub fn group_by_x_axis(&self, reducer: super::rollup::Reducer) -> Self {
        self.reduce_by_merge_key(reducer)
    }

    /// A no-op when there are no group-by columns, mirroring how the source
    /// calls this unconditionally even though it only changes anything when
    /// there's something to partition by.
    pub fn group_by_group_by_values(&self, reducer: super::rollup::Reducer) -> Self {
        if self.group_by_columns.is_empty() {
            return self.clone();
        }
        self.reduce_by_merge_key(reducer)
    }

    pub fn filter(&self, pred: impl Fn(&Cell) -> bool) -> Self {
        let rows = self.rows.iter().filter(|row| pred(&row.x_axis)).cloned().collect();
        Self::new(self.group_by_columns.clone(), rows)
    }

    /// Keeps only rows whose group-by tuple appears in `keys`, sorted by
    /// x-axis ascending and then by each tuple's position in `keys`.
    pub fn filter_by_group_by_values(&self, keys: &[Vec<Cell>]) -> Self {
        if self.rows.is_empty() || keys.is_empty() {
            return self.clone();
        }
        let positions: HashMap<String, usize> = keys.iter().enumerate().map(|(i, k)| (group_key(k), i)).collect();
        let mut rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|row| positions.contains_key(&group_key(&row.group_by)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.x_axis
                .cmp(&b.x_axis)
                .then_with(|| positions[&group_key(&a.group_by)].cmp(&positions[&group_key(&b.group_by)]))
        });
        Self::new(self.group_by_columns.clone(), rows)
    }

    /// Drops the leading and trailing all-zero rows of each group-by
    /// partition (sorted by x-axis), keeping interior zeros and the original
    /// row order. Drops a partition entirely if every value in it is zero.
    pub fn trim_zeros(&self) -> Self {
        if self.rows.is_empty() {
            return self.clone();
        }
        let mut partitions: HashMap<String, Vec<usize>> = HashMap::new();
        let mut order = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let key = group_key(&row.group_by);
            partitions
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key.clone());
                    Vec::new()
                })
                .push(i);
        }
        let mut keep = vec![false; self.rows.len()];
        for key in &order {
            let mut idxs = partitions[key].clone();
            idxs.sort_by(|&a, &b| self.rows[a].x_axis.cmp(&self.rows[b].x_axis));
            let first_nonzero = idxs.iter().position(|&i| self.rows[i].value != 0.0);
            let last_nonzero = idxs.iter().rposition(|&i| self.rows[i].value != 0.0);
            if let (Some(first), Some(last)) = (first_nonzero, last_nonzero) {
                for &i in &idxs[first..=last] {
                    keep[i] = true;
                }
            }
        }
        let rows = self
            .rows
            .iter()
            .zip(keep)
            .filter_map(|(row, keep)| keep.then(|| row.clone()))
            .collect();
        Self::new(self.group_by_columns.clone(), rows)
    }

    pub fn get_top_n_values(&self, n: usize) -> Self {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| b.value.total_cmp(&a.value));
        rows.truncate(n);
        Self::new(self.group_by_columns.clone(), rows)
    }

    /// Distinct group-by tuples present in the data, in first-seen order.
    pub fn group_by_values(&self) -> Vec<Vec<Cell>> {
        if self.group_by_columns.is_empty() {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in &self.rows {
            if seen.insert(group_key(&row.group_by)) {
                out.push(row.group_by.clone());
            }
        }
        out
    }

    fn from_x_axis_values(x_axis_values: Vec<Cell>, group_by_columns: Vec<String>, group_by_values: Vec<Vec<Cell>>) -> Self {
        let sorted_values = sort_group_by_values(group_by_values);
        let mut rows = Vec::with_capacity(x_axis_values.len() * sorted_values.len().max(1));
        for x in &x_axis_values {
            if sorted_values.is_empty() {
                rows.push(Row {
                    x_axis: x.clone(),
                    group_by: Vec::new(),
                    value: 0.0,
                });
            } else {
                for group_by in &sorted_values {
                    rows.push(Row {
                        x_axis: x.clone(),
                        group_by: group_by.clone(),
                        value: 0.0,
                    });
                }
            }
        }
        Self::new(group_by_columns, rows)
    }

    /// A zero-filled identity table over every cohort day `0..days`.
    pub fn from_cohort_days(days: i64, group_by_columns: Vec<String>, group_by_values: Vec<Vec<Cell>>) -> Self {
        let x_axis_values = (0..days).map(|d| Cell::Number(d as f64)).collect();
        Self::from_x_axis_values(x_axis_values, group_by_columns, group_by_values)
    }

    /// A zero-filled identity table over every grain-aligned date in `interval`.
    pub fn from_date_interval(
        interval: &DatetimeInterval,
        grain: TimeGrain,
        group_by_columns: Vec<String>,
        group_by_values: Vec<Vec<Cell>>,
    ) -> Self {
        let x_axis_values = interval.generate_all_dates(grain).into_iter().map(Cell::DateTime).collect();
        Self::from_x_axis_values(x_axis_values, group_by_columns, group_by_values)
    }
}

/// Tuples with no null entries sort first (lexicographically); tuples
/// containing a null sort after.
fn sort_group_by_values(mut values: Vec<Vec<Cell>>) -> Vec<Vec<Cell>> {
    values.sort_by(|a, b| {
        let a_has_null = a.iter().any(|c| matches!(c, Cell::Null));
        let b_has_null = b.iter().any(|c| matches!(c, Cell::Null));
        a_has_null.cmp(&b_has_null).then_with(|| a.cmp(b))
    });
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::rollup::Reducer;
    use chrono::TimeZone;

    fn row(x: i64, value: f64) -> Row {
        Row {
            x_axis: Cell::Number(x as f64),
            group_by: vec![],
            value,
        }
    }

    #[test]
    fn division_by_zero_is_zero_not_an_error() {
        let t = TabularDataResult::new(vec![], vec![row(0, 10.0)]);
        let divided = t.divide_scalar(0.0);
        assert_eq!(divided.rows[0].value, 0.0);
    }

    #[test]
    fn combine_values_short_circuits_on_an_empty_side() {
        let left = TabularDataResult::new(vec![], vec![row(0, 10.0)]);
        let empty = TabularDataResult::new(vec![], vec![]);
        assert!(left.add_table(&empty).rows.is_empty());
        assert_eq!(empty.add_table(&left).rows.len(), 1);
    }

    #[test]
    fn merge_values_is_a_left_unit_covering_every_x_axis_and_group_by_cell_once() {
        let identity = TabularDataResult::from_date_interval(
            &DatetimeInterval::new(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(), Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap()),
            TimeGrain::Day,
            vec!["country".to_string()],
            vec![vec![Cell::Text("US".to_string())], vec![Cell::Text("FR".to_string())]],
        );
        assert_eq!(identity.rows.len(), 6);

        let fragment = TabularDataResult::new(
            vec!["country".to_string()],
            vec![
                Row { x_axis: Cell::DateTime(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()), group_by: vec![Cell::Text("US".to_string())], value: 7.0 },
                Row { x_axis: Cell::DateTime(Utc.with_ymd_and_hms(2022, 1, 2, 0, 0, 0).unwrap()), group_by: vec![Cell::Text("FR".to_string())], value: 9.0 },
            ],
        );

        let merged = identity.merge_values(&fragment);
        assert_eq!(merged.rows.len(), identity.rows.len());
        for row in &merged.rows {
            let expected = fragment
                .rows
                .iter()
                .find(|f| f.x_axis == row.x_axis && f.group_by == row.group_by)
                .map(|f| f.value)
                .unwrap_or(0.0);
            assert_eq!(row.value, expected);
        }
    }

    #[test]
    fn trim_zeros_is_idempotent() {
        let rows = vec![row(0, 0.0), row(1, 5.0), row(2, 0.0), row(3, 2.0), row(4, 0.0)];
        let t = TabularDataResult::new(vec![], rows);
        let once = t.trim_zeros();
        let twice = once.trim_zeros();
        assert_eq!(once.rows.len(), twice.rows.len());
        let once_values: Vec<f64> = once.rows.iter().map(|r| r.value).collect();
        let twice_values: Vec<f64> = twice.rows.iter().map(|r| r.value).collect();
        assert_eq!(once_values, twice_values);
    }

    #[test]
    fn merge_values_prefers_other_but_keeps_self_when_unmatched() {
        let identity = TabularDataResult::new(vec![], vec![row(0, 0.0), row(1, 0.0)]);
        let fragment = TabularDataResult::new(vec![], vec![row(0, 5.0)]);
        let merged = identity.merge_values(&fragment);
        assert_eq!(merged.rows[0].value, 5.0);
        assert_eq!(merged.rows[1].value, 0.0);
    }

    #[test]
    fn group_by_x_axis_sums_duplicate_keys() {
        let t = TabularDataResult::new(vec![], vec![row(0, 3.0), row(0, 4.0), row(1, 1.0)]);
        let grouped = t.group_by_x_axis(Reducer::Sum);
        assert_eq!(grouped.rows.len(), 2);
        assert_eq!(grouped.rows[0].value, 7.0);
    }

    #[test]
    fn group_by_group_by_values_is_noop_without_group_by_columns() {
        let t = TabularDataResult::new(vec![], vec![row(0, 3.0), row(0, 4.0)]);
        let grouped = t.group_by_group_by_values(Reducer::Sum);
        assert_eq!(grouped.rows.len(), 2);
    }

    #[test]
    fn trim_zeros_drops_leading_and_trailing_zero_runs_but_keeps_interior_zeros() {
        let rows = vec![row(0, 0.0), row(1, 5.0), row(2, 0.0), row(3, 2.0), row(4, 0.0)];
        let t = TabularDataResult::new(vec![], rows);
        let trimmed = t.trim_zeros();
        let values: Vec<f64> = trimmed.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![5.0, 0.0, 2.0]);
    }

    #[test]
    fn trim_zeros_drops_an_all_zero_partition_entirely() {
        let t = TabularDataResult::new(vec![], vec![row(0, 0.0), row(1, 0.0)]);
        assert!(t.trim_zeros().rows.is_empty());
    }

    #[test]
    fn get_top_n_values_sorts_descending_and_truncates() {
        let t = TabularDataResult::new(vec![], vec![row(0, 1.0), row(1, 9.0), row(2, 4.0)]);
        let top = t.get_top_n_values(2);
        assert_eq!(top.rows.iter().map(|r| r.value).collect::<Vec<_>>(), vec![9.0, 4.0]);
    }

    #[test]
    fn from_cohort_days_zero_fills_every_day() {
        let t = TabularDataResult::from_cohort_days(3, vec![], vec![]);
        assert_eq!(t.rows.len(), 3);
        assert!(t.rows.iter().all(|r| r.value == 0.0));
    }

    #[test]
    fn group_by_values_sorts_non_null_tuples_before_null_tuples() {
        let t = TabularDataResult::from_cohort_days(
            1,
            vec!["country".to_string()],
            vec![vec![Cell::Null], vec![Cell::Text("US".to_string())]],
        );
        let values = t.group_by_values();
        assert_eq!(values[0], vec![Cell::Text("US".to_string())]);
        assert_eq!(values[1], vec![Cell::Null]);
    }
}
