//! CTE fusion for external-table columns (§4.2, §4.3). All external-table
//! columns that share a dataset, table and filter formula fuse into a
//! single aggregating CTE, keyed by a name that hashes the filter so two
//! different filters over the same table never collide.

use std::rc::Rc;

use md5::{Digest, Md5};

use crate::catalog::ExternalTableColumn;
use crate::constants::{DATE_PARTITION_COLUMN_NAME, UNIQUE_ID_COLUMN_NAME};
use crate::error::Result;
use crate::sql::{
    AliasedExpression, BooleanExpression, Cte, Expression, HoleValue, Join, QueryBuilder,
    SelectStatement, Statement, SqlToken, Table, TemplateDict,
};
use crate::time::DatetimeInterval;

use super::{base_table_sql, column_ref, CteHandle};

pub fn get_column(
    external_table_column: &ExternalTableColumn,
    date_intervals: &[DatetimeInterval],
    sql_builder: &mut QueryBuilder,
    select_statement: &mut SelectStatement,
    allow_materialized: bool,
) -> Result<AliasedExpression> {
    let base_table_sql = base_table_sql(select_statement)?;
    let name = cte_name(external_table_column);

    let cte_present = if sql_builder.has_cte(&name) {
        if let Some(existing) = sql_builder.cte_mut(&name) {
            existing
                .select_mut()
                .expect("external-table CTEs are always select-bodied")
                .push_select_item(Box::new(formula_column(external_table_column)));
        }
        true
    } else if allow_materialized && is_materialized_for_whole_period(external_table_column, date_intervals) {
        false
    } else {
        let cte = build_cte(external_table_column)?;
        register_and_join_cte(cte, select_statement, sql_builder, &base_table_sql)?;
        true
    };

    build_final_column(
        external_table_column,
        &base_table_sql,
        date_intervals,
        allow_materialized,
        cte_present,
        &name,
    )
}

fn cte_name(external_table_column: &ExternalTableColumn) -> String {
    let mut name = format!(
        "_external_{}_{}",
        external_table_column.dataset_name, external_table_column.table_name
    );
    if let Some(filter) = &external_table_column.table_filter_formula {
        let digest = format!("{:x}", Md5::digest(filter.as_bytes()));
        name.push('_');
        name.push_str(&digest[..10]);
    }
    name
}

fn is_materialized_for_whole_period(
    external_table_column: &ExternalTableColumn,
    date_intervals: &[DatetimeInterval],
) -> bool {
    match external_table_column.materialized_from {
        Some(from) => date_intervals.iter().all(|i| i.date_from.date_naive() >= from),
        None => false,
    }
}

fn is_not_materialized_for_whole_period(
    external_table_column: &ExternalTableColumn,
    date_intervals: &[DatetimeInterval],
) -> bool {
    match external_table_column.materialized_from {
        None => true,
        Some(from) => date_intervals.iter().all(|i| i.date_to.date_naive() < from),
    }
}

fn formula_column(external_table_column: &ExternalTableColumn) -> AliasedExpression {
    let table_sql = Table::new(
        external_table_column.dataset_name.clone(),
        external_table_column.table_name.clone(),
    )
    .to_sql();
    let dict = TemplateDict::default().with_on_missing(Rc::new(move |key: &str| {
        Ok(HoleValue::Token(
            Rc::new(column_ref(&table_sql, key)) as Rc<dyn SqlToken>
        ))
    }));
    Expression::with_template(external_table_column.table_aggregation_formula.clone(), dict)
        .as_alias(external_table_column.name().to_string())
}

fn build_cte(external_table_column: &ExternalTableColumn) -> Result<Cte> {
    let external_table = Table::new(
        external_table_column.dataset_name.clone(),
        external_table_column.table_name.clone(),
    );
    let table_sql = external_table.to_sql();

    let mut select = SelectStatement::new()
        .from_(Box::new(external_table))
        .select(vec![
            Box::new(column_ref(&table_sql, DATE_PARTITION_COLUMN_NAME)),
            Box::new(column_ref(&table_sql, UNIQUE_ID_COLUMN_NAME)),
            Box::new(formula_column(external_table_column)),
        ])
        .group_by(vec![
            Box::new(column_ref(&table_sql, DATE_PARTITION_COLUMN_NAME)),
            Box::new(column_ref(&table_sql, UNIQUE_ID_COLUMN_NAME)),
        ]);

    if let Some(filter) = &external_table_column.table_filter_formula {
        let table_sql_for_filter = table_sql.clone();
        let dict = TemplateDict::default().with_on_missing(Rc::new(move |key: &str| {
            Ok(HoleValue::Token(
                Rc::new(column_ref(&table_sql_for_filter, key)) as Rc<dyn SqlToken>
            ))
        }));
        let rendered = Expression::with_template(filter.clone(), dict).to_sql_checked()?;
        select = select.where_(BooleanExpression::as_(rendered));
    }

    Ok(Cte::new(cte_name(external_table_column), select))
}

fn register_and_join_cte(
    cte: Cte,
    select_statement: &mut SelectStatement,
    sql_builder: &mut QueryBuilder,
    base_table_sql: &str,
) -> Result<()> {
    let cte_name = cte.cte_name.clone();
    sql_builder.with_cte(cte);
    let cte_table_sql = format!("`{cte_name}`");
    let join = Join::left(Box::new(CteHandle(cte_name)))
        .on(BooleanExpression::as_(format!(
            "{} = {}",
            column_ref(base_table_sql, DATE_PARTITION_COLUMN_NAME).to_sql(),
            column_ref(&cte_table_sql, DATE_PARTITION_COLUMN_NAME).to_sql(),
        )))
        .and(BooleanExpression::as_(format!(
            "{} = {}",
            column_ref(base_table_sql, UNIQUE_ID_COLUMN_NAME).to_sql(),
            column_ref(&cte_table_sql, UNIQUE_ID_COLUMN_NAME).to_sql(),
        )));
    select_statement.push_join_if_new(join)
}

fn build_final_column(
    external_table_column: &ExternalTableColumn,
    base_table_sql: &str,
    date_intervals: &[DatetimeInterval],
    allow_materialized: bool,
    cte_present: bool,
    cte_name: &str,
) -> Result<AliasedExpression> {
    let materialized_column_sql = column_ref(base_table_sql, external_table_column.name()).to_sql();

    let value_sql = if !cte_present {
        materialized_column_sql.clone()
    } else {
        let cte_table_sql = format!("`{cte_name}`");
        let external_column_sql = column_ref(&cte_table_sql, external_table_column.name()).to_sql();
        if !allow_materialized || is_not_materialized_for_whole_period(external_table_column, date_intervals) {
            external_column_sql
        } else {
            let materialized_from = external_table_column
                .materialized_from
                .expect("the partial-materialization branch implies materialized_from is set");
            let date_sql = column_ref(base_table_sql, DATE_PARTITION_COLUMN_NAME).to_sql();
            format!(
                "IF({date_sql} < '{materialized_from}', {external_column_sql}, {materialized_column_sql})"
            )
        }
    };

    let mut dict = TemplateDict::default();
    dict.insert(external_table_column.name(), value_sql);
    Ok(AliasedExpression::new(
        Expression::with_template(external_table_column.user_history_formula.clone(), dict),
        None,
    ))
}
