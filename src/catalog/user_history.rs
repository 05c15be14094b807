use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::column::Column;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationColumn {
    pub column_definition: Column,
    pub registration_table_column: String,
}

impl RegistrationColumn {
    pub fn from_column(column_definition: Column, registration_table_column: Option<String>) -> Self {
        let registration_table_column =
            registration_table_column.unwrap_or_else(|| column_definition.id.clone());
        Self {
            column_definition,
            registration_table_column,
        }
    }

    pub fn name(&self) -> &str {
        &self.column_definition.id
    }

    pub fn registration_table_dataset_name(&self, app_id: &str) -> String {
        format!("{app_id}_main")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTableColumn {
    pub dataset_name: String,
    pub table_name: String,
    pub table_filter_formula: Option<String>,
    pub table_aggregation_formula: String,
    pub user_history_formula: String,
    pub materialized_from: Option<NaiveDate>,
    pub column_definition: Column,
}

impl ExternalTableColumn {
    pub fn new(
        dataset_name: impl Into<String>,
        table_name: impl Into<String>,
        table_filter_formula: Option<String>,
        table_aggregation_formula: impl Into<String>,
        user_history_formula: Option<String>,
        materialized_from: Option<NaiveDate>,
        column_definition: Column,
    ) -> Self {
        let name = column_definition.id.clone();
        Self {
            dataset_name: dataset_name.into(),
            table_name: table_name.into(),
            table_filter_formula,
            table_aggregation_formula: table_aggregation_formula.into(),
            // Defaults to the bare column reference when unset, per the
            // column source's read-path projection wrapping.
            user_history_formula: user_history_formula.unwrap_or_else(|| format!("{{{name}}}")),
            materialized_from,
            column_definition,
        }
    }

    pub fn name(&self) -> &str {
        &self.column_definition.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalColumn {
    pub source_column: String,
    pub time_window: String,
    pub formula: String,
    pub column_definition: Column,
}

impl TotalColumn {
    pub fn name(&self) -> &str {
        &self.column_definition.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedColumn {
    pub formula: String,
    pub column_definition: Column,
}

impl ComputedColumn {
    pub fn name(&self) -> &str {
        &self.column_definition.id
    }
}

/// Four ordered, disjoint namespaces of per-user-history columns. `merge`
/// is right-biased: entries from `other` win on key collision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserHistoryDefinition {
    pub registration_columns: HashMap<String, RegistrationColumn>,
    pub external_table_columns: HashMap<String, ExternalTableColumn>,
    pub total_columns: HashMap<String, TotalColumn>,
    pub computed_columns: HashMap<String, ComputedColumn>,
}

impl UserHistoryDefinition {
    pub fn get_columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        columns.extend(self.registration_columns.values().map(|c| c.column_definition.clone()));
        columns.extend(self.external_table_columns.values().map(|c| c.column_definition.clone()));
        columns.extend(self.total_columns.values().map(|c| c.column_definition.clone()));
        columns.extend(self.computed_columns.values().map(|c| c.column_definition.clone()));
        columns
    }

    pub fn merge(&self, other: &UserHistoryDefinition) -> UserHistoryDefinition {
        let mut registration_columns = self.registration_columns.clone();
        registration_columns.extend(other.registration_columns.clone());

        let mut external_table_columns = self.external_table_columns.clone();
        external_table_columns.extend(other.external_table_columns.clone());

        let mut total_columns = self.total_columns.clone();
        total_columns.extend(other.total_columns.clone());

        let mut computed_columns = self.computed_columns.clone();
        computed_columns.extend(other.computed_columns.clone());

        UserHistoryDefinition {
            registration_columns,
            external_table_columns,
            total_columns,
            computed_columns,
        }
    }
}
