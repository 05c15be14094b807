//! Renders a column filter as a `BooleanExpression`, dispatching between a
//! filter local to the primary datasource and a cross-datasource filter
//! that first ensures an enrichment join (§4.4 item 3).

use crate::catalog::{DataSource, DataType};
use crate::domain::ColumnFilter;
use crate::error::Result;
use crate::sql::{BooleanExpression, QueryBuilder, SelectStatement};
use crate::time::DatetimeInterval;

use super::column_source_builder::{self, ColumnSourceHandle};
use super::join_builder;

pub fn build_from_filter<'a>(
    app_id: &str,
    filter: &ColumnFilter,
    primary_column_source: &ColumnSourceHandle<'a>,
    primary_datasource: &'a DataSource,
    date_intervals: &[DatetimeInterval],
    sql_builder: &mut QueryBuilder,
    select_statement: &mut SelectStatement,
) -> Result<BooleanExpression> {
    let data_type = filter
        .datasource
        .columns_by_id
        .get(&filter.column_name)
        .map(|c| c.data_type.clone())
        .unwrap_or(DataType::String);

    let expr = if filter.datasource.as_ref() == primary_datasource {
        primary_column_source.get_and_load_column(&filter.column_name, date_intervals, sql_builder, select_statement)?
    } else {
        let join_table = join_builder::prepare_many_rows_per_user_to_one_row_per_user(
            app_id,
            primary_datasource,
            &filter.datasource,
            select_statement,
        )?;
        let foreign_source = column_source_builder::build_over_table(app_id, join_table, &filter.datasource);
        foreign_source.get_and_load_column(&filter.column_name, date_intervals, sql_builder, select_statement)?
    };

    BooleanExpression::from_filter(&expr.expression, &filter.operator, &filter.values, &data_type)
}
