//! Renders a group-by column reference with its positional alias,
//! dispatching between the primary datasource and a cross-datasource join
//! the same way the filter builder does (§4.4 item 4).

use crate::catalog::DataSource;
use crate::domain::ColumnGroupBy;
use crate::error::Result;
use crate::sql::{AliasedExpression, QueryBuilder, SelectStatement};
use crate::time::DatetimeInterval;

use super::column_source_builder::{self, ColumnSourceHandle};
use super::join_builder;

pub fn build<'a>(
    app_id: &str,
    index: usize,
    group_by: &ColumnGroupBy,
    primary_column_source: &ColumnSourceHandle<'a>,
    primary_datasource: &'a DataSource,
    date_intervals: &[DatetimeInterval],
    sql_builder: &mut QueryBuilder,
    select_statement: &mut SelectStatement,
) -> Result<AliasedExpression> {
    let alias = format!("group_by_{}", index + 1);

    let expr = if group_by.datasource.as_ref() == primary_datasource {
        primary_column_source.get_and_load_column(&group_by.column_name, date_intervals, sql_builder, select_statement)?
    } else {
        let join_table = join_builder::prepare_many_rows_per_user_to_one_row_per_user(
            app_id,
            primary_datasource,
            &group_by.datasource,
            select_statement,
        )?;
        let foreign_source = column_source_builder::build_over_table(app_id, join_table, &group_by.datasource);
        foreign_source.get_and_load_column(&group_by.column_name, date_intervals, sql_builder, select_statement)?
    };

    Ok(expr.expression.as_alias(alias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::DataType;
    use crate::catalog::{Cardinality, Column};
    use crate::column_source::{TableColumnSource, TableRef};
    use crate::sql::Table;
    use std::sync::Arc;

    #[test]
    fn alias_is_one_indexed() {
        let primary = DataSource::event("events", "Events", "", "raw", "events", vec![], None, None);
        let source = ColumnSourceHandle::Plain(TableColumnSource::new(TableRef::Table(Table::new(
            "app1_raw", "events",
        ))));
        let group_by = ColumnGroupBy {
            datasource: Arc::new(primary.clone()),
            column_name: "country".to_string(),
        };
        let mut sql_builder = QueryBuilder::new();
        let mut select_statement = SelectStatement::new().from_(Box::new(Table::new("app1_raw", "events")));
        let expr = build(
            "app1", 1, &group_by, &source, &primary, &[], &mut sql_builder, &mut select_statement,
        )
        .unwrap();
        assert_eq!(expr.to_definition_sql().unwrap(), "`app1_raw.events`.`country` AS group_by_2");
    }

    #[test]
    fn cross_datasource_group_by_ensures_a_join() {
        let primary = DataSource::event("events", "Events", "", "raw", "events", vec![], None, None);
        let foreign = Arc::new(DataSource::daily(
            "profile",
            "Profile",
            "",
            "main",
            "profile",
            vec![Column::new("country", DataType::String)],
            Cardinality::One,
            None,
        ));
        let source = ColumnSourceHandle::Plain(TableColumnSource::new(TableRef::Table(Table::new(
            "app1_raw", "events",
        ))));
        let group_by = ColumnGroupBy {
            datasource: foreign,
            column_name: "country".to_string(),
        };
        let mut sql_builder = QueryBuilder::new();
        let mut select_statement = SelectStatement::new().from_(Box::new(Table::new("app1_raw", "events")));
        let expr = build(
            "app1", 0, &group_by, &source, &primary, &[], &mut sql_builder, &mut select_statement,
        )
        .unwrap();
        assert_eq!(expr.to_definition_sql().unwrap(), "`app1_main.profile`.`country` AS group_by_1");
    }
}
