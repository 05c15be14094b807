use crate::error::Result;

use super::boolean::BooleanExpression;
use super::table::TableLike;
use super::SqlToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    fn as_sql(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
        }
    }
}

pub struct Join {
    pub join_type: JoinType,
    pub table: Box<dyn TableLike>,
    pub boolean_expression: Option<BooleanExpression>,
}

impl Join {
    pub fn inner(table: Box<dyn TableLike>) -> Self {
        Self {
            join_type: JoinType::Inner,
            table,
            boolean_expression: None,
        }
    }

    pub fn left(table: Box<dyn TableLike>) -> Self {
        Self {
            join_type: JoinType::Left,
            table,
            boolean_expression: None,
        }
    }

    pub fn on(mut self, boolean_expression: BooleanExpression) -> Self {
        self.boolean_expression = Some(boolean_expression);
        self
    }

    pub fn and(mut self, boolean_expression: BooleanExpression) -> Self {
        self.boolean_expression = self.boolean_expression.map(|b| b.and(boolean_expression));
        self
    }

    pub fn or(mut self, boolean_expression: BooleanExpression) -> Self {
        self.boolean_expression = self.boolean_expression.map(|b| b.or(boolean_expression));
        self
    }

    pub fn to_sql(&self) -> Result<String> {
        let on = match &self.boolean_expression {
            Some(b) => b.to_sql()?,
            None => String::new(),
        };
        Ok(format!(
            "{} JOIN {} ON {on}",
            self.join_type.as_sql(),
            self.table.to_sql()
        ))
    }
}
