//! Turns a [`crate::catalog::Rollup`]'s reducer names into the actual
//! reduction applied when collapsing a metric's per-row results down to the
//! chart's x-axis and group-by shape.

use std::collections::{HashMap, HashSet};

use crate::catalog::Rollup;
use crate::error::{EngineError, Result};

use super::tabular::{group_key, Cell, TabularDataResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Avg,
    Count,
}

impl Reducer {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "sum" => Ok(Reducer::Sum),
            "avg" => Ok(Reducer::Avg),
            "count" => Ok(Reducer::Count),
            other => Err(EngineError::UnsupportedOperator(format!("unknown rollup function: {other}"))),
        }
    }

    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Reducer::Sum => values.iter().sum(),
            Reducer::Avg => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            Reducer::Count => values.len() as f64,
        }
    }
}

/// A tabular result paired with the x-axis and group-by reducers it should
/// be collapsed with.
#[derive(Debug, Clone)]
pub struct RollupDataResult {
    pub table: TabularDataResult,
    pub x_axis_reducer: Reducer,
    pub group_by_reducer: Reducer,
}

impl RollupDataResult {
    pub fn new(table: TabularDataResult, rollup: &Rollup) -> Result<Self> {
        Ok(Self {
            table,
            x_axis_reducer: Reducer::parse(&rollup.rollup_x_axis)?,
            group_by_reducer: Reducer::parse(&rollup.rollup_y_axis)?,
        })
    }

    /// Collapses raw per-row data down to the chart's axes: first folds
    /// duplicate group-by values down to the group-by columns that remain
    /// after `group_by_columns_mapper`, then folds duplicate x-axis buckets
    /// down to the bucket `x_axis_mapper` assigns.
    pub fn rollup(&self, x_axis_mapper: impl Fn(&Cell) -> Cell, group_by_columns_mapper: impl Fn(&Cell) -> Cell) -> TabularDataResult {
        self.table
            .map_group_by_columns(group_by_columns_mapper)
            .group_by_group_by_values(self.group_by_reducer)
            .map_x_axis(x_axis_mapper)
            .group_by_x_axis(self.x_axis_reducer)
    }

    pub fn filter(&self, pred: impl Fn(&Cell) -> bool) -> Self {
        Self {
            table: self.table.filter(pred),
            x_axis_reducer: self.x_axis_reducer,
            group_by_reducer: self.group_by_reducer,
        }
    }

    pub fn filter_by_group_by_values(&self, keys: &[Vec<Cell>]) -> Self {
        Self {
            table: self.table.filter_by_group_by_values(keys),
            x_axis_reducer: self.x_axis_reducer,
            group_by_reducer: self.group_by_reducer,
        }
    }

    pub fn trim_zeros(&self) -> Self {
        Self {
            table: self.table.trim_zeros(),
            x_axis_reducer: self.x_axis_reducer,
            group_by_reducer: self.group_by_reducer,
        }
    }
}

/// A keyed collection of [`RollupDataResult`]s, one per KPI/metric symbol,
/// operated on together the way a chart assembles its full result set.
#[derive(Debug, Clone, Default)]
pub struct RollupDataResults {
    pub results: HashMap<String, RollupDataResult>,
}

impl RollupDataResults {
    pub fn new() -> Self {
        Self { results: HashMap::new() }
    }

    pub fn add(&mut self, symbol: impl Into<String>, result: RollupDataResult) {
        self.results.insert(symbol.into(), result);
    }

    pub fn trim_zeros(&self) -> Self {
        Self {
            results: self.results.iter().map(|(k, v)| (k.clone(), v.trim_zeros())).collect(),
        }
    }

    /// The union of group-by tuples across every symbol's table.
    pub fn group_by_values(&self) -> Vec<Vec<Cell>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for result in self.results.values() {
            for tuple in result.table.group_by_values() {
                if seen.insert(group_key(&tuple)) {
                    out.push(tuple);
                }
            }
        }
        out
    }

    pub fn rollup(
        &self,
        x_axis_mapper: impl Fn(&Cell) -> Cell + Copy,
        group_by_columns_mapper: impl Fn(&Cell) -> Cell + Copy,
    ) -> HashMap<String, TabularDataResult> {
        self.results
            .iter()
            .map(|(symbol, result)| (symbol.clone(), result.rollup(x_axis_mapper, group_by_columns_mapper)))
            .collect()
    }

    pub fn filter(&self, pred: impl Fn(&Cell) -> bool + Copy) -> Self {
        Self {
            results: self.results.iter().map(|(k, v)| (k.clone(), v.filter(pred))).collect(),
        }
    }

    pub fn filter_by_group_by_values(&self, keys: &[Vec<Cell>]) -> Self {
        Self {
            results: self
                .results
                .iter()
                .map(|(k, v)| (k.clone(), v.filter_by_group_by_values(keys)))
                .collect(),
        }
    }
}
