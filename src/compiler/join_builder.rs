//! Ensures a deterministic per-user enrichment join exists between the
//! query's primary (many-rows-per-user) datasource and a one-row-per-user
//! datasource, so a cross-datasource filter or group-by can resolve columns
//! against it (§4.4 item 5).

use crate::catalog::{Cardinality, DataSource};
use crate::column_source;
use crate::constants::{DATE_PARTITION_COLUMN_NAME, UNIQUE_ID_COLUMN_NAME};
use crate::error::{EngineError, Result};
use crate::sql::{BooleanExpression, Join, SelectStatement, SqlToken, Statement, Table};

use super::common::build_table;

/// Builds (or reuses) the INNER JOIN against `join_datasource`'s per-user
/// enrichment table and returns that table so a column source can be built
/// over it.
pub fn prepare_many_rows_per_user_to_one_row_per_user(
    app_id: &str,
    primary_datasource: &DataSource,
    join_datasource: &DataSource,
    select_statement: &mut SelectStatement,
) -> Result<Table> {
    if primary_datasource.rows_per_user != Cardinality::Many {
        return Err(EngineError::IllegalJoin(format!(
            "{} does not have many rows per user",
            primary_datasource.id
        )));
    }
    if join_datasource.rows_per_user != Cardinality::One {
        return Err(EngineError::IllegalJoin(format!(
            "{} does not have one row per user",
            join_datasource.id
        )));
    }

    let join_table = build_table(app_id, &join_datasource.schema, join_datasource.user_enrich_table_name());
    let base_table_sql = column_source::base_table_sql(select_statement)?;
    let join_table_sql = join_table.to_sql();

    let join = Join::inner(Box::new(join_table.clone()))
        .on(BooleanExpression::as_(format!(
            "{} = {}",
            column_source::column_ref(&base_table_sql, DATE_PARTITION_COLUMN_NAME).to_sql(),
            column_source::column_ref(&join_table_sql, DATE_PARTITION_COLUMN_NAME).to_sql(),
        )))
        .and(BooleanExpression::as_(format!(
            "{} = {}",
            column_source::column_ref(&base_table_sql, UNIQUE_ID_COLUMN_NAME).to_sql(),
            column_source::column_ref(&join_table_sql, UNIQUE_ID_COLUMN_NAME).to_sql(),
        )));
    select_statement.push_join_if_new(join)?;

    Ok(join_table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::catalog::column::DataType;

    fn many_ds() -> DataSource {
        DataSource::event("events", "Events", "", "raw", "events", vec![], None, None)
    }

    fn one_ds() -> DataSource {
        DataSource::daily(
            "profile",
            "Profile",
            "",
            "main",
            "profile",
            vec![Column::new("country", DataType::String)],
            Cardinality::One,
            None,
        )
    }

    #[test]
    fn rejects_a_many_to_many_join() {
        let mut select_statement = SelectStatement::new().from_(Box::new(Table::new("app1_raw", "events")));
        let result = prepare_many_rows_per_user_to_one_row_per_user("app1", &many_ds(), &many_ds(), &mut select_statement);
        assert!(result.is_err());
    }

    #[test]
    fn repeated_calls_do_not_duplicate_the_join() {
        let mut select_statement = SelectStatement::new().from_(Box::new(Table::new("app1_raw", "events")));
        prepare_many_rows_per_user_to_one_row_per_user("app1", &many_ds(), &one_ds(), &mut select_statement).unwrap();
        prepare_many_rows_per_user_to_one_row_per_user("app1", &many_ds(), &one_ds(), &mut select_statement).unwrap();
        assert_eq!(select_statement.to_sql().unwrap().matches("INNER JOIN").count(), 1);
    }
}
