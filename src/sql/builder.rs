use crate::error::Result;

use super::boolean::BooleanExpression;
use super::expression::{AliasedExpression, Expression};
use super::join::Join;
use super::table::{Cte, TableLike};

/// Common surface for a SELECT projection / GROUP BY / ORDER BY item: a
/// plain `Expression` or an `AliasedExpression` render the same way the
/// original's `Expression`/`AliasedExpression` subclass pair did.
pub trait SelectItem {
    fn to_definition_sql(&self) -> Result<String>;
    fn to_reference_sql(&self) -> Result<String>;
}

impl SelectItem for Expression {
    fn to_definition_sql(&self) -> Result<String> {
        self.to_sql_checked()
    }

    fn to_reference_sql(&self) -> Result<String> {
        self.to_sql_checked()
    }
}

impl SelectItem for AliasedExpression {
    fn to_definition_sql(&self) -> Result<String> {
        AliasedExpression::to_definition_sql(self)
    }

    fn to_reference_sql(&self) -> Result<String> {
        AliasedExpression::to_reference_sql(self)
    }
}

pub trait Statement {
    fn to_sql(&self) -> Result<String>;
}

/// Assembled by chaining `from_`, `select`, `join`, `where_`, `group_by`,
/// `order_by`, `limit`. Emission order is SELECT, FROM, joins, WHERE,
/// GROUP BY, ORDER BY, LIMIT with empty clauses suppressed.
#[derive(Default)]
pub struct SelectStatement {
    select: Vec<Box<dyn SelectItem>>,
    from: Option<Box<dyn TableLike>>,
    joins: Vec<Join>,
    where_: Option<BooleanExpression>,
    group_by: Vec<Box<dyn SelectItem>>,
    order_by: Vec<Box<dyn SelectItem>>,
    limit: Option<usize>,
}

impl SelectStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_(mut self, table: Box<dyn TableLike>) -> Self {
        self.from = Some(table);
        self
    }

    pub fn select(mut self, expressions: Vec<Box<dyn SelectItem>>) -> Self {
        self.select = expressions;
        self
    }

    pub fn select_star(self) -> Self {
        self.select(vec![Box::new(Expression::new("*"))])
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn joins(mut self, joins: Vec<Join>) -> Self {
        self.joins.extend(joins);
        self
    }

    pub fn where_(mut self, boolean_expression: BooleanExpression) -> Self {
        self.where_ = Some(boolean_expression);
        self
    }

    pub fn and_where(mut self, boolean_expression: BooleanExpression) -> Self {
        self.where_ = Some(match self.where_ {
            Some(existing) => existing.and(boolean_expression),
            None => boolean_expression,
        });
        self
    }

    pub fn or_where(mut self, boolean_expression: BooleanExpression) -> Self {
        self.where_ = Some(match self.where_ {
            Some(existing) => existing.or(boolean_expression),
            None => boolean_expression,
        });
        self
    }

    pub fn group_by(mut self, expressions: Vec<Box<dyn SelectItem>>) -> Self {
        self.group_by = expressions;
        self
    }

    pub fn order_by(mut self, expressions: Vec<Box<dyn SelectItem>>) -> Self {
        self.order_by = expressions;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn get_table(&self) -> Option<&dyn TableLike> {
        self.from.as_deref()
    }

    pub fn push_select_item(&mut self, item: Box<dyn SelectItem>) {
        self.select.push(item);
    }

    pub fn has_join(&self, rendered: &str) -> Result<bool> {
        for join in &self.joins {
            if join.to_sql()? == rendered {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn push_join_if_new(&mut self, join: Join) -> Result<()> {
        let rendered = join.to_sql()?;
        if !self.has_join(&rendered)? {
            self.joins.push(join);
        }
        Ok(())
    }
}

impl Statement for SelectStatement {
    fn to_sql(&self) -> Result<String> {
        let select = self
            .select
            .iter()
            .map(|e| e.to_definition_sql())
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        let from = match &self.from {
            Some(table) => format!("FROM {}", table.to_sql()),
            None => String::new(),
        };

        let joins = self
            .joins
            .iter()
            .map(|j| j.to_sql())
            .collect::<Result<Vec<_>>>()?
            .join("\n");

        let where_clause = match &self.where_ {
            Some(b) => format!("WHERE {}", b.to_sql()?),
            None => String::new(),
        };

        let group_by = if self.group_by.is_empty() {
            String::new()
        } else {
            let items = self
                .group_by
                .iter()
                .map(|e| e.to_reference_sql())
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            format!("GROUP BY {items}")
        };

        let order_by = if self.order_by.is_empty() {
            String::new()
        } else {
            let items = self
                .order_by
                .iter()
                .map(|e| e.to_reference_sql())
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            format!("ORDER BY {items}")
        };

        let limit = match self.limit {
            Some(n) => format!("LIMIT {n}"),
            None => String::new(),
        };

        let lines = [
            format!("SELECT {select}"),
            from,
            joins,
            where_clause,
            group_by,
            order_by,
            limit,
        ];
        Ok(lines.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n"))
    }
}

/// Joins its inner selects with `UNION ALL` by default (or `UNION`).
pub struct UnionStatement {
    pub select_statements: Vec<SelectStatement>,
    pub union_all: bool,
}

impl UnionStatement {
    pub fn new(select_statements: Vec<SelectStatement>, union_all: bool) -> Self {
        Self {
            select_statements,
            union_all,
        }
    }
}

impl Statement for UnionStatement {
    fn to_sql(&self) -> Result<String> {
        let separator = if self.union_all { "UNION ALL\n" } else { "UNION\n" };
        let parts = self
            .select_statements
            .iter()
            .map(|s| s.to_sql())
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(&format!("\n {separator}")))
    }
}

/// Owns an ordered CTE map and a trailing statement. CTEs whose name begins
/// with an underscore are inserted at the front so helper CTEs render
/// before user-named ones (§4.2 CTE fusion contract).
#[derive(Default)]
pub struct QueryBuilder {
    cte_order: Vec<String>,
    ctes: std::collections::HashMap<String, Cte>,
    statement: Option<Box<dyn Statement>>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, statement: Box<dyn Statement>) {
        self.statement = Some(statement);
    }

    pub fn has_cte(&self, name: &str) -> bool {
        self.ctes.contains_key(name)
    }

    pub fn cte_mut(&mut self, name: &str) -> Option<&mut Cte> {
        self.ctes.get_mut(name)
    }

    pub fn with_cte(&mut self, cte: Cte) -> &mut Self {
        if !self.ctes.contains_key(&cte.cte_name) {
            if cte.cte_name.starts_with('_') {
                self.cte_order.insert(0, cte.cte_name.clone());
            } else {
                self.cte_order.push(cte.cte_name.clone());
            }
        }
        self.ctes.insert(cte.cte_name.clone(), cte);
        self
    }

    pub fn to_sql(&self) -> Result<String> {
        let statement = self
            .statement
            .as_ref()
            .expect("QueryBuilder.to_sql called before select()");

        let ctes = if self.cte_order.is_empty() {
            String::new()
        } else {
            let rendered = self
                .cte_order
                .iter()
                .map(|name| self.ctes[name].to_definition_sql())
                .collect::<Result<Vec<_>>>()?
                .join(",\n");
            format!("WITH {rendered}\n")
        };

        let sql = format!("{ctes}{}", statement.to_sql()?);
        Ok(sql.lines().filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n"))
    }
}
