use crate::error::Result;

use super::builder::{SelectStatement, Statement, UnionStatement};
use super::expression::{AliasedExpression, Expression};
use super::SqlToken;

/// Anything that can appear in a `FROM`/`JOIN` position and be addressed by
/// dotted column name.
pub trait TableLike: SqlToken {
    fn column(&self, column_name: &str) -> AliasedExpression {
        let rendered = column_name
            .split('.')
            .map(|part| format!("`{part}`"))
            .collect::<Vec<_>>()
            .join(".");
        AliasedExpression::new(Expression::new(format!("{}.{rendered}", self.to_sql())), None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub dataset_name: String,
    pub table_name: String,
}

impl Table {
    pub fn new(dataset_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            table_name: table_name.into(),
        }
    }
}

impl SqlToken for Table {
    fn to_sql(&self) -> String {
        format!("`{}.{}`", self.dataset_name, self.table_name)
    }
}

impl TableLike for Table {}

/// A CTE's inner statement: a plain `SELECT` (the common case, and the only
/// shape the column-source CTE-fusion contract can append further
/// projections to) or a `UNION` of several (the event base-table CTE,
/// built once and never fused into further).
pub enum CteBody {
    Select(Box<SelectStatement>),
    Union(Box<UnionStatement>),
}

impl Statement for CteBody {
    fn to_sql(&self) -> Result<String> {
        match self {
            CteBody::Select(s) => s.to_sql(),
            CteBody::Union(u) => u.to_sql(),
        }
    }
}

/// A named subquery, referenced as `` `cte_name` `` (see the backtick-
/// quoting design note).
pub struct Cte {
    pub cte_name: String,
    pub body: CteBody,
}

impl Cte {
    pub fn new(cte_name: impl Into<String>, select: SelectStatement) -> Self {
        Self {
            cte_name: cte_name.into(),
            body: CteBody::Select(Box::new(select)),
        }
    }

    pub fn from_union(cte_name: impl Into<String>, union: UnionStatement) -> Self {
        Self {
            cte_name: cte_name.into(),
            body: CteBody::Union(Box::new(union)),
        }
    }

    /// `Some` only for a select-bodied CTE — the shape the column-source
    /// CTE-fusion contract appends further projections to.
    pub fn select_mut(&mut self) -> Option<&mut SelectStatement> {
        match &mut self.body {
            CteBody::Select(s) => Some(s),
            CteBody::Union(_) => None,
        }
    }

    pub fn to_definition_sql(&self) -> Result<String> {
        Ok(format!("{} AS (\n{})", self.cte_name, self.body.to_sql()?))
    }
}

impl SqlToken for Cte {
    fn to_sql(&self) -> String {
        format!("`{}`", self.cte_name)
    }
}

impl TableLike for Cte {}
