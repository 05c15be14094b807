//! The SQL compiler (§4.4): turns a [`crate::domain::WarehouseChartQuery`]
//! into one rendered SQL statement per metric symbol, via a pipeline of
//! independent builders that cooperate through a shared `QueryBuilder` and
//! `SelectStatement`.

pub mod column_source_builder;
pub mod common;
pub mod filter_builder;
pub mod group_by_builder;
pub mod join_builder;
pub mod metric_builder;
pub mod x_axis_expression_builder;

use std::collections::HashMap;

use crate::constants::DATE_PARTITION_COLUMN_NAME;
use crate::domain::WarehouseChartQuery;
use crate::error::Result;
use crate::sql::{AliasedExpression, BooleanExpression, QueryBuilder, SelectItem, SelectStatement, Statement};

/// One compiled metric: the rendered SQL text plus the request-scoped
/// identifiers a warehouse driver call needs to attribute and cancel it.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub symbol: String,
    pub app_id: String,
    pub page_id: String,
    pub request_id: String,
    pub sql: String,
}

/// Compiles every metric in `query` into its own SQL statement, keyed by
/// metric symbol (§4.4 item 2, the main builder).
pub fn build(query: &WarehouseChartQuery) -> Result<HashMap<String, CompiledQuery>> {
    let mut compiled = HashMap::new();

    for (symbol, metric) in &query.metrics {
        let mut sql_builder = QueryBuilder::new();

        let column_source = column_source_builder::build(
            &query.app_id,
            &metric.data_source_table,
            query.datasource.as_ref(),
            &mut sql_builder,
        )?;

        let mut select_statement = SelectStatement::new().from_(column_source.table_ref().into_boxed());

        if let Some(date_filter) = date_range_filter(&query.date_intervals, &select_statement)? {
            select_statement = select_statement.where_(date_filter.parenthesized()?);
        }

        let value_expr = metric_builder::build_select_expression(
            metric,
            &column_source,
            &query.date_intervals,
            &mut sql_builder,
            &mut select_statement,
        )?;

        if let Some(metric_where) = metric_builder::build_boolean_expression(
            metric,
            &column_source,
            &query.date_intervals,
            &mut sql_builder,
            &mut select_statement,
        )? {
            select_statement = select_statement.and_where(metric_where);
        }

        for filter in &query.column_filters {
            let rendered = filter_builder::build_from_filter(
                &query.app_id,
                filter,
                &column_source,
                query.datasource.as_ref(),
                &query.date_intervals,
                &mut sql_builder,
                &mut select_statement,
            )?;
            select_statement = select_statement.and_where(rendered);
        }

        let mut group_by_exprs = Vec::with_capacity(query.column_group_bys.len());
        for (index, group_by) in query.column_group_bys.iter().enumerate() {
            let expr = group_by_builder::build(
                &query.app_id,
                index,
                group_by,
                &column_source,
                query.datasource.as_ref(),
                &query.date_intervals,
                &mut sql_builder,
                &mut select_statement,
            )?;
            group_by_exprs.push(expr);
        }

        let x_axis_expr = x_axis_expression_builder::build(
            &query.x_axis_column,
            query.datasource.as_ref(),
            &column_source,
            &query.date_intervals,
            &mut sql_builder,
            &mut select_statement,
        )?;

        select_statement = select_statement
            .select(projection(&x_axis_expr, &group_by_exprs, &value_expr))
            .group_by(projection_without_value(&x_axis_expr, &group_by_exprs))
            .order_by(vec![Box::new(x_axis_expr.clone())]);

        sql_builder.select(Box::new(select_statement));

        let symbol_name = format!("{}.{}.{symbol}", query.datasource.id, metric.data_source_table);
        compiled.insert(
            symbol.clone(),
            CompiledQuery {
                symbol: symbol_name,
                app_id: query.app_id.clone(),
                page_id: query.page_id.clone(),
                request_id: query.request_id.clone(),
                sql: sql_builder.to_sql()?,
            },
        );
    }

    Ok(compiled)
}

fn date_range_filter(
    date_intervals: &[crate::time::DatetimeInterval],
    select_statement: &SelectStatement,
) -> Result<Option<BooleanExpression>> {
    let base_table_sql = crate::column_source::base_table_sql(select_statement)?;
    let per_interval = date_intervals
        .iter()
        .map(|interval| {
            let date_col = crate::column_source::column_ref(&base_table_sql, DATE_PARTITION_COLUMN_NAME);
            BooleanExpression::from_date(&date_col, interval)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(BooleanExpression::all_or(per_interval))
}

fn projection(
    x_axis: &AliasedExpression,
    group_bys: &[AliasedExpression],
    value: &AliasedExpression,
) -> Vec<Box<dyn SelectItem>> {
    let mut items: Vec<Box<dyn SelectItem>> = vec![Box::new(x_axis.clone())];
    items.extend(group_bys.iter().cloned().map(|g| Box::new(g) as Box<dyn SelectItem>));
    items.push(Box::new(value.clone()));
    items
}

fn projection_without_value(x_axis: &AliasedExpression, group_bys: &[AliasedExpression]) -> Vec<Box<dyn SelectItem>> {
    let mut items: Vec<Box<dyn SelectItem>> = vec![Box::new(x_axis.clone())];
    items.extend(group_bys.iter().cloned().map(|g| Box::new(g) as Box<dyn SelectItem>));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cardinality, Column, DataSource, WarehouseMetric};
    use crate::domain::{ColumnFilter, ColumnGroupBy};
    use std::sync::Arc;

    fn daily_query() -> WarehouseChartQuery {
        let ds = Arc::new(DataSource::daily(
            "profile",
            "Profile",
            "",
            "main",
            "profile",
            vec![
                Column::new("country", crate::catalog::DataType::String),
                Column::new("logins", crate::catalog::DataType::Number),
            ],
            Cardinality::One,
            None,
        ));
        let mut metrics = HashMap::new();
        metrics.insert(
            "y".to_string(),
            WarehouseMetric {
                select_expression: "SUM({logins})".to_string(),
                where_expression: None,
                data_source_table: "profile".to_string(),
            },
        );
        WarehouseChartQuery {
            app_id: "app1".to_string(),
            page_id: "page1".to_string(),
            request_id: "req1".to_string(),
            datasource: ds,
            metrics,
            date_intervals: vec![crate::time::DatetimeInterval::new(
                chrono::Utc::now(),
                chrono::Utc::now(),
            )],
            time_grain: crate::time::TimeGrain::Day,
            column_filters: vec![],
            column_group_bys: vec![ColumnGroupBy {
                datasource: daily_datasource(),
                column_name: "country".to_string(),
            }],
            x_axis_column: "date_".to_string(),
        }
    }

    fn daily_datasource() -> Arc<DataSource> {
        Arc::new(DataSource::daily(
            "profile",
            "Profile",
            "",
            "main",
            "profile",
            vec![Column::new("country", crate::catalog::DataType::String)],
            Cardinality::One,
            None,
        ))
    }

    #[test]
    fn compiles_one_sql_statement_per_metric_symbol() {
        let query = daily_query();
        let compiled = build(&query).unwrap();
        assert_eq!(compiled.len(), 1);
        let result = &compiled["y"];
        assert!(result.sql.contains("SUM(`app1_main.profile`.`logins`) AS value"));
        assert!(result.sql.contains("GROUP BY x_axis, group_by_1"));
        assert!(result.sql.contains("ORDER BY x_axis"));
        assert_eq!(result.symbol, "profile.profile.y");
    }

    #[test]
    fn filter_not_matching_primary_datasource_still_compiles_via_join() {
        let mut query = daily_query();
        query.column_filters.push(ColumnFilter {
            datasource: query.datasource.clone(),
            column_name: "country".to_string(),
            operator: "=".to_string(),
            values: vec!["US".to_string()],
        });
        let compiled = build(&query).unwrap();
        assert!(compiled["y"].sql.contains("`country` = 'US'"));
    }
}
