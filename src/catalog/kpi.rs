use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollup {
    pub rollup_x_axis: String,
    pub rollup_y_axis: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub symbol: String,
    pub is_prefix: bool,
}

impl Unit {
    pub fn dollar() -> Self {
        Self {
            symbol: "$".to_string(),
            is_prefix: true,
        }
    }

    pub fn percent() -> Self {
        Self {
            symbol: "%".to_string(),
            is_prefix: false,
        }
    }

    pub fn minute() -> Self {
        Self {
            symbol: "min".to_string(),
            is_prefix: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseMetric {
    pub select_expression: String,
    pub where_expression: Option<String>,
    pub data_source_table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpi {
    pub id: String,
    pub formula: String,
    pub metrics: HashMap<String, WarehouseMetric>,
    pub x_axis: HashMap<String, Rollup>,
    pub label: String,
    pub category: String,
    pub recommended: bool,
    pub description: String,
    pub unit: Option<Unit>,
}

impl Kpi {
    pub fn new(
        id: impl Into<String>,
        formula: impl Into<String>,
        metrics: HashMap<String, WarehouseMetric>,
        x_axis: HashMap<String, Rollup>,
    ) -> Self {
        let id = id.into();
        let label = super::column::Column::new(&id, super::column::DataType::Number).label;
        Self {
            id,
            formula: formula.into(),
            metrics,
            x_axis,
            label,
            category: "Game Specific".to_string(),
            recommended: false,
            description: String::new(),
            unit: None,
        }
    }

    pub fn is_daily_kpi(&self) -> bool {
        self.x_axis.contains_key(constants::DATE_PARTITION_COLUMN_NAME)
    }

    pub fn is_cohort_kpi(&self) -> bool {
        self.x_axis.contains_key(constants::COHORT_DAY_COLUMN_NAME)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KpiReference {
    pub datasource_id: String,
    pub kpi_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kpi_with_axes(axes: &[&str]) -> Kpi {
        let x_axis = axes
            .iter()
            .map(|a| {
                (
                    a.to_string(),
                    Rollup {
                        rollup_x_axis: "sum".to_string(),
                        rollup_y_axis: "sum".to_string(),
                    },
                )
            })
            .collect();
        Kpi::new("dau", "x", HashMap::new(), x_axis)
    }

    #[test]
    fn is_daily_kpi_checks_date_partition_axis() {
        assert!(kpi_with_axes(&[constants::DATE_PARTITION_COLUMN_NAME]).is_daily_kpi());
        assert!(!kpi_with_axes(&[constants::COHORT_DAY_COLUMN_NAME]).is_daily_kpi());
    }

    #[test]
    fn is_cohort_kpi_checks_cohort_axis() {
        assert!(kpi_with_axes(&[constants::COHORT_DAY_COLUMN_NAME]).is_cohort_kpi());
    }
}
