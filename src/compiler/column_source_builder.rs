//! Builds the column source backing a datasource's base table, dispatching
//! on datasource kind (§4.4 item 1, the base-table builder). An event
//! datasource gets a `base` CTE unioning its archival and live-load
//! fragments; every other datasource resolves to a concrete table.

use crate::catalog::{DataSource, DataSourceKind, DataType};
use crate::column_source::{self, ColumnSourceMode, TableColumnSource, TableRef, UserHistoryColumnSource};
use crate::constants::{DATE_PARTITION_COLUMN_NAME, EVENT_SANDBOX_COLUMN_NAME};
use crate::error::Result;
use crate::sql::{BooleanExpression, Cte, QueryBuilder, SelectStatement, SqlToken, Table, UnionStatement};
use crate::time::DatetimeInterval;

use super::common::build_table;

/// The name the event base-table CTE is always registered under. Safe as a
/// bare literal (not underscore-prefixed, not hashed) because every metric
/// compiles against a fresh `QueryBuilder` (§4.4 item 2).
const BASE_CTE_NAME: &str = "base";

/// Either of the two concrete column sources a compiled query can be built
/// against, kept as a tagged enum rather than a trait object so a `TableRef`
/// can always be read back out for `FROM`/`JOIN` construction.
pub enum ColumnSourceHandle<'a> {
    Plain(TableColumnSource),
    UserHistory(UserHistoryColumnSource<'a>),
}

impl<'a> ColumnSourceHandle<'a> {
    pub fn table_ref(&self) -> TableRef {
        match self {
            ColumnSourceHandle::Plain(source) => source.table.clone(),
            ColumnSourceHandle::UserHistory(source) => TableRef::Table(source.table.clone()),
        }
    }

    pub fn get_and_load_column(
        &self,
        column_name: &str,
        date_intervals: &[DatetimeInterval],
        sql_builder: &mut QueryBuilder,
        select_statement: &mut SelectStatement,
    ) -> Result<crate::sql::AliasedExpression> {
        match self {
            ColumnSourceHandle::Plain(source) => Ok(source.get_and_load_column(column_name)),
            ColumnSourceHandle::UserHistory(source) => {
                source.get_and_load_column(column_name, date_intervals, sql_builder, select_statement)
            }
        }
    }
}

/// Builds the base column source for `datasource` over `table_name`,
/// registering the `base` union CTE for an event datasource as a side
/// effect.
pub fn build<'a>(
    app_id: &str,
    table_name: &str,
    datasource: &'a DataSource,
    sql_builder: &mut QueryBuilder,
) -> Result<ColumnSourceHandle<'a>> {
    match &datasource.kind {
        DataSourceKind::Event {
            realtime_schema,
            raw_data_availability,
        } => {
            if !sql_builder.has_cte(BASE_CTE_NAME) {
                let cte = build_events_table(
                    app_id,
                    &datasource.schema,
                    realtime_schema,
                    table_name,
                    raw_data_availability.as_ref(),
                )?;
                sql_builder.with_cte(cte);
            }
            Ok(ColumnSourceHandle::Plain(TableColumnSource::new(TableRef::Cte(
                BASE_CTE_NAME.to_string(),
            ))))
        }
        DataSourceKind::UserHistory { definition } => {
            let table = build_table(app_id, &datasource.schema, table_name);
            Ok(ColumnSourceHandle::UserHistory(UserHistoryColumnSource::new(
                app_id,
                table,
                definition,
                ColumnSourceMode::Query,
            )))
        }
        DataSourceKind::Daily => {
            let table = build_table(app_id, &datasource.schema, table_name);
            Ok(ColumnSourceHandle::Plain(TableColumnSource::new(TableRef::Table(table))))
        }
    }
}

/// Builds a column source directly against an already-resolved table —
/// used by the join builder's callers, which only ever join in a
/// `Cardinality::One` enrichment table (never an event datasource, so no
/// `base`-CTE branch applies there).
pub fn build_over_table<'a>(app_id: &str, table: Table, datasource: &'a DataSource) -> ColumnSourceHandle<'a> {
    match &datasource.kind {
        DataSourceKind::UserHistory { definition } => {
            ColumnSourceHandle::UserHistory(UserHistoryColumnSource::new(
                app_id,
                table,
                definition,
                ColumnSourceMode::Query,
            ))
        }
        _ => ColumnSourceHandle::Plain(TableColumnSource::new(TableRef::Table(table))),
    }
}

fn build_events_table(
    app_id: &str,
    schema: &str,
    realtime_schema: &str,
    table_name: &str,
    raw_data_availability: Option<&DatetimeInterval>,
) -> Result<Cte> {
    let raw_table = build_table(app_id, schema, table_name);
    let raw_table_sql = raw_table.to_sql();
    let raw_date_col = column_source::column_ref(&raw_table_sql, DATE_PARTITION_COLUMN_NAME);
    let raw_filter = match raw_data_availability {
        Some(interval) => BooleanExpression::from_date(&raw_date_col, interval)?,
        None => BooleanExpression::as_("FALSE"),
    };
    let raw_select = SelectStatement::new()
        .from_(Box::new(raw_table))
        .select_star()
        .where_(raw_filter);

    let live_table = build_table(app_id, realtime_schema, table_name);
    let live_table_sql = live_table.to_sql();
    let live_date_col = column_source::column_ref(&live_table_sql, DATE_PARTITION_COLUMN_NAME);
    let after_raw_filter = match raw_data_availability {
        Some(interval) => BooleanExpression::from_filter(
            &live_date_col,
            ">",
            &[interval.date_to.date_naive().to_string()],
            &DataType::Date,
        )?,
        None => BooleanExpression::as_("TRUE"),
    };
    let sandbox_col = column_source::column_ref(&live_table_sql, EVENT_SANDBOX_COLUMN_NAME);
    let live_filter = after_raw_filter.and(BooleanExpression::as_(format!("{} IS NOT TRUE", sandbox_col.to_sql())));
    let live_select = SelectStatement::new()
        .from_(Box::new(live_table))
        .select_star()
        .where_(live_filter);

    let union = UnionStatement::new(vec![raw_select, live_select], true);
    Ok(Cte::from_union(BASE_CTE_NAME, union))
}
