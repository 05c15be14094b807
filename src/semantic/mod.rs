//! The semantic layer (§4.1, §4.4-adjacent rollups, §4.5): a small tabular
//! algebra over per-metric query results, the rollup reducers that collapse
//! raw rows down to a chart's axes, and the KPI formula interpreter that
//! combines metrics into a derived result.

pub mod formula;
pub mod rollup;
pub mod tabular;

pub use formula::{evaluate as evaluate_formula, FormulaValue};
pub use rollup::{Reducer, RollupDataResult, RollupDataResults};
pub use tabular::{Cell, Row, TabularDataResult};
