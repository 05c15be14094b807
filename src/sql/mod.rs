//! A thin, string-producing SQL AST: templated expressions, boolean
//! expression chains, joins, select/union statements and a CTE-owning
//! query builder. This is not a parser — it only ever emits SQL text.

pub mod boolean;
pub mod builder;
pub mod expression;
pub mod join;
pub mod table;

pub use boolean::{BooleanExpression, BooleanOperator};
pub use builder::{QueryBuilder, SelectItem, SelectStatement, Statement, UnionStatement};
pub use expression::{hole_names, AliasedExpression, Constant, Expression, HoleValue, TemplateDict};
pub use join::{Join, JoinType};
pub use table::{Cte, Table, TableLike};

/// Anything that can render itself as a SQL fragment.
pub trait SqlToken {
    fn to_sql(&self) -> String;
}
