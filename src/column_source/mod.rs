//! Resolves a catalog column name into a SQL expression against a
//! particular table, registering any helper CTEs the column needs along
//! the way (§4.3). Plain datasources use [`TableColumnSource`]; the
//! user-history datasource dispatches across its four namespaces via
//! [`UserHistoryColumnSource`], which differs between the read path
//! (`ColumnSourceMode::Query`) and the single-day write path
//! (`ColumnSourceMode::Insert`) used when materializing a new user-history
//! row.

pub mod external_table;
pub mod registration;

use crate::catalog::UserHistoryDefinition;
use crate::error::{EngineError, Result};
use crate::sql::{AliasedExpression, Expression, HoleValue, QueryBuilder, SelectStatement, SqlToken, Table, TableLike, TemplateDict};
use crate::time::DatetimeInterval;

/// A FROM-able table identity that can be addressed either as a concrete
/// catalog table or as an already-registered CTE by name. Kept as a tagged
/// variant rather than a `Box<dyn TableLike>` so it stays cheaply
/// cloneable — callers need both a column reference *and*, later, an
/// owned value to hand to `.from_()`/`Join::inner`.
#[derive(Debug, Clone)]
pub enum TableRef {
    Table(Table),
    Cte(String),
}

impl TableRef {
    pub fn column(&self, column_name: &str) -> AliasedExpression {
        match self {
            TableRef::Table(t) => t.column(column_name),
            TableRef::Cte(name) => CteHandle(name.clone()).column(column_name),
        }
    }

    pub fn into_boxed(self) -> Box<dyn TableLike> {
        match self {
            TableRef::Table(t) => Box::new(t),
            TableRef::Cte(name) => Box::new(CteHandle(name)),
        }
    }
}

/// The trivial column source backing any non-user-history datasource:
/// every column is just a reference against the underlying table.
pub struct TableColumnSource {
    pub table: TableRef,
}

impl TableColumnSource {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn get_and_load_column(&self, column_name: &str) -> AliasedExpression {
        self.table.column(column_name)
    }
}

/// Read vs write path through a user-history column source. The insert
/// path only ever resolves columns against a single degenerate (one-day)
/// date interval, and routes registration columns through a write-time
/// lookup rather than the table's already-materialized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSourceMode {
    Query,
    Insert,
}

pub struct UserHistoryColumnSource<'a> {
    app_id: String,
    pub table: Table,
    definition: &'a UserHistoryDefinition,
    mode: ColumnSourceMode,
}

impl<'a> UserHistoryColumnSource<'a> {
    pub fn new(
        app_id: impl Into<String>,
        table: Table,
        definition: &'a UserHistoryDefinition,
        mode: ColumnSourceMode,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            table,
            definition,
            mode,
        }
    }

    pub fn get_and_load_column(
        &self,
        column_name: &str,
        date_intervals: &[DatetimeInterval],
        sql_builder: &mut QueryBuilder,
        select_statement: &mut SelectStatement,
    ) -> Result<AliasedExpression> {
        if self.mode == ColumnSourceMode::Insert
            && (date_intervals.len() != 1 || date_intervals[0].date_from != date_intervals[0].date_to)
        {
            return Err(EngineError::Catalog(
                "insert column source expects exactly one degenerate date interval".to_string(),
            ));
        }

        if let Some(registration_column) = self.definition.registration_columns.get(column_name) {
            return match self.mode {
                ColumnSourceMode::Query => Ok(self.table.column(registration_column.name())),
                ColumnSourceMode::Insert => registration::get_column_for_insert_query(
                    &self.app_id,
                    registration_column,
                    sql_builder,
                    select_statement,
                ),
            };
        }

        if let Some(total_column) = self.definition.total_columns.get(column_name) {
            // Neither the read nor the write path ever builds the
            // aggregation-window SQL this column's fields describe — both
            // just pass the already-materialized value through. Preserved
            // as-is rather than invented.
            return Ok(self.table.column(total_column.name()));
        }

        if let Some(external_table_column) = self.definition.external_table_columns.get(column_name) {
            let allow_materialized = matches!(self.mode, ColumnSourceMode::Query);
            return external_table::get_column(
                external_table_column,
                date_intervals,
                sql_builder,
                select_statement,
                allow_materialized,
            );
        }

        if let Some(computed_column) = self.definition.computed_columns.get(column_name) {
            let mut dict = TemplateDict::default();
            for hole in crate::sql::hole_names(&computed_column.formula) {
                let resolved =
                    self.get_and_load_column(&hole, date_intervals, sql_builder, select_statement)?;
                dict.insert(hole, HoleValue::Literal(resolved.expression.to_sql_checked()?));
            }
            return Ok(AliasedExpression::new(
                Expression::with_template(computed_column.formula.clone(), dict),
                None,
            ));
        }

        Err(EngineError::UnknownColumn(column_name.to_string()))
    }
}

/// A lightweight handle for addressing an already-registered CTE from a
/// `JOIN ... ON` clause or a column reference without re-building its
/// inner `SELECT`.
pub(crate) struct CteHandle(pub String);

impl SqlToken for CteHandle {
    fn to_sql(&self) -> String {
        format!("`{}`", self.0)
    }
}

impl TableLike for CteHandle {}

/// Builds `{table_sql}.{quoted.dotted.column}`, the same dotted-quoting
/// `TableLike::column` applies, against an already-rendered table
/// reference string rather than a live `TableLike` object — needed where
/// the base table must be read out of a `SelectStatement` before it can be
/// mutably borrowed again for joins.
pub(crate) fn column_ref(table_sql: &str, column_name: &str) -> Expression {
    let quoted = column_name
        .split('.')
        .map(|part| format!("`{part}`"))
        .collect::<Vec<_>>()
        .join(".");
    Expression::new(format!("{table_sql}.{quoted}"))
}

pub(crate) fn base_table_sql(select_statement: &SelectStatement) -> Result<String> {
    select_statement
        .get_table()
        .map(|t| t.to_sql())
        .ok_or_else(|| EngineError::Catalog("select statement has no base table".to_string()))
}
