//! Renders a metric's SELECT expression and optional WHERE expression by
//! resolving only the hole names the metric's templates actually reference
//! (§4.4 item 2).

use crate::catalog::WarehouseMetric;
use crate::constants::DATA_COLUMN_ALIAS;
use crate::error::Result;
use crate::sql::{hole_names, AliasedExpression, BooleanExpression, Expression, QueryBuilder, SelectStatement, TemplateDict};
use crate::time::DatetimeInterval;

use super::column_source_builder::ColumnSourceHandle;

pub fn build_select_expression(
    metric: &WarehouseMetric,
    column_source: &ColumnSourceHandle,
    date_intervals: &[DatetimeInterval],
    sql_builder: &mut QueryBuilder,
    select_statement: &mut SelectStatement,
) -> Result<AliasedExpression> {
    let dict = resolve_holes(
        &metric.select_expression,
        column_source,
        date_intervals,
        sql_builder,
        select_statement,
    )?;
    Ok(Expression::with_template(metric.select_expression.clone(), dict).as_alias(DATA_COLUMN_ALIAS))
}

pub fn build_boolean_expression(
    metric: &WarehouseMetric,
    column_source: &ColumnSourceHandle,
    date_intervals: &[DatetimeInterval],
    sql_builder: &mut QueryBuilder,
    select_statement: &mut SelectStatement,
) -> Result<Option<BooleanExpression>> {
    let Some(where_expression) = &metric.where_expression else {
        return Ok(None);
    };
    let dict = resolve_holes(where_expression, column_source, date_intervals, sql_builder, select_statement)?;
    let rendered = Expression::with_template(where_expression.clone(), dict).to_sql_checked()?;
    Ok(Some(BooleanExpression::as_(rendered)))
}

fn resolve_holes(
    template: &str,
    column_source: &ColumnSourceHandle,
    date_intervals: &[DatetimeInterval],
    sql_builder: &mut QueryBuilder,
    select_statement: &mut SelectStatement,
) -> Result<TemplateDict> {
    let mut dict = TemplateDict::default();
    for hole in hole_names(template) {
        let resolved = column_source.get_and_load_column(&hole, date_intervals, sql_builder, select_statement)?;
        let rendered = resolved.expression.to_sql_checked()?;
        dict.insert(hole, rendered);
    }
    Ok(dict)
}
