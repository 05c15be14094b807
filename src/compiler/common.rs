//! Small helpers shared across the per-concern compiler builders.

use crate::sql::Table;

/// Builds the dataset-qualified table the original's `common.build_table`
/// helper produces: the app's per-schema dataset joined to a table name.
pub fn build_table(app_id: &str, schema: &str, table_name: &str) -> Table {
    Table::new(format!("{app_id}_{schema}"), table_name)
}
