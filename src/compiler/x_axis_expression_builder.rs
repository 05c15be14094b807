//! Builds the aliased x-axis projection expression (§4.4 item 6): a plain
//! column reference when the requested axis isn't the date partition
//! column, otherwise a time-grain truncation of the event timestamp for a
//! many-rows-per-user datasource, or a bare timestamp cast for a
//! one-row-per-user datasource.

use crate::catalog::{Cardinality, DataSource};
use crate::column_source;
use crate::constants::{DATE_PARTITION_COLUMN_NAME, EVENT_TIMESTAMP_COLUMN_NAME, X_AXIS_COLUMN_ALIAS};
use crate::error::Result;
use crate::sql::{AliasedExpression, Expression, QueryBuilder, SelectStatement, SqlToken};
use crate::time::{DatetimeInterval, TimeGrain};

use super::column_source_builder::ColumnSourceHandle;

pub fn build(
    x_axis_column: &str,
    datasource: &DataSource,
    column_source: &ColumnSourceHandle,
    date_intervals: &[DatetimeInterval],
    sql_builder: &mut QueryBuilder,
    select_statement: &mut SelectStatement,
) -> Result<AliasedExpression> {
    if x_axis_column != DATE_PARTITION_COLUMN_NAME {
        let expr = column_source.get_and_load_column(x_axis_column, date_intervals, sql_builder, select_statement)?;
        return Ok(expr.expression.as_alias(X_AXIS_COLUMN_ALIAS));
    }

    let base_table_sql = column_source::base_table_sql(select_statement)?;

    if datasource.rows_per_user == Cardinality::Many {
        let tstamp_sql = column_source::column_ref(&base_table_sql, EVENT_TIMESTAMP_COLUMN_NAME).to_sql();
        let sql = date_trunc_from_time_grain(datasource.time_grain, &tstamp_sql);
        return Ok(Expression::new(sql).as_alias(X_AXIS_COLUMN_ALIAS));
    }

    let date_sql = column_source::column_ref(&base_table_sql, DATE_PARTITION_COLUMN_NAME).to_sql();
    Ok(Expression::new(format!("TIMESTAMP({date_sql})")).as_alias(X_AXIS_COLUMN_ALIAS))
}

fn date_trunc_from_time_grain(grain: TimeGrain, tstamp_sql: &str) -> String {
    match grain {
        TimeGrain::Min15 => format!(
            "TIMESTAMP_ADD(TIMESTAMP_TRUNC({tstamp_sql}, HOUR), INTERVAL CAST(EXTRACT(MINUTE FROM {tstamp_sql}) / 15 AS INT64) * 15 MINUTE)"
        ),
        TimeGrain::Hour => format!("DATE_TRUNC({tstamp_sql}, HOUR)"),
        _ => format!("DATE_TRUNC({tstamp_sql}, DAY)"),
    }
}
