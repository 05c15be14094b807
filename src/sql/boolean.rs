use crate::catalog::DataType;
use crate::error::{EngineError, Result};
use crate::time::DatetimeInterval;

use super::expression::{Constant, Expression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    fn as_sql(self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
        }
    }
}

struct BooleanNode {
    operator: BooleanOperator,
    expression: BooleanExpression,
}

/// A chain of boolean operands joined by AND/OR, appended to a tail. `and`
/// and `or` both mutate and return `self` so callers can keep chaining,
/// matching the original builder's fluent style.
pub struct BooleanExpression {
    base: Expression,
    next: Option<Box<BooleanNode>>,
}

impl BooleanExpression {
    pub fn as_(expression: impl Into<String>) -> Self {
        Self {
            base: Expression::new(expression),
            next: None,
        }
    }

    pub fn from_expression(expression: Expression) -> Self {
        Self {
            base: expression,
            next: None,
        }
    }

    pub fn all_and(mut expressions: Vec<BooleanExpression>) -> Option<BooleanExpression> {
        if expressions.is_empty() {
            return None;
        }
        let mut iter = expressions.drain(..);
        let mut first = iter.next().unwrap();
        for rest in iter {
            first = first.and(rest);
        }
        Some(first)
    }

    pub fn all_or(mut expressions: Vec<BooleanExpression>) -> Option<BooleanExpression> {
        if expressions.is_empty() {
            return None;
        }
        let mut iter = expressions.drain(..);
        let mut first = iter.next().unwrap();
        for rest in iter {
            first = first.or(rest);
        }
        Some(first)
    }

    fn tail_mut(&mut self) -> &mut BooleanExpression {
        let mut node = self;
        while node.next.is_some() {
            node = &mut node.next.as_mut().unwrap().expression;
        }
        node
    }

    /// Appends `other` with an AND connective.
    pub fn and(mut self, other: BooleanExpression) -> Self {
        self.tail_mut().next = Some(Box::new(BooleanNode {
            operator: BooleanOperator::And,
            expression: other,
        }));
        self
    }

    /// Appends `other` with an OR connective. The source implementation
    /// appends AND here by a reuse-bug (see `DESIGN.md`); this is the
    /// corrected OR-appending behavior per the project's redesign flag.
    pub fn or(mut self, other: BooleanExpression) -> Self {
        self.tail_mut().next = Some(Box::new(BooleanNode {
            operator: BooleanOperator::Or,
            expression: other,
        }));
        self
    }

    pub fn to_sql(&self) -> Result<String> {
        let base = self.base_sql()?;
        let tail = match &self.next {
            Some(node) => format!(" {} {}", node.operator.as_sql(), node.expression.to_sql()?),
            None => String::new(),
        };
        Ok(format!("{base}{tail}"))
    }

    fn base_sql(&self) -> Result<String> {
        self.base.to_sql_checked()
    }

    /// Wraps the rendered expression in parentheses without interfering
    /// with further appending.
    pub fn parenthesized(self) -> Result<BooleanExpression> {
        let rendered = self.to_sql()?;
        Ok(BooleanExpression::as_(format!("({rendered})")))
    }

    pub fn from_filter(
        expression: &Expression,
        operator: &str,
        values: &[String],
        data_type: &DataType,
    ) -> Result<BooleanExpression> {
        let constants: Vec<String> = values.iter().map(|v| Constant::render(v, data_type)).collect();
        let lhs = expression.to_sql_checked()?;

        let rendered = match operator {
            "<" | "<=" | ">" | ">=" | "=" | "!=" => {
                format!("{lhs} {operator} {}", require_one(&constants)?)
            }
            "like" => format!("{lhs} LIKE {}", constants.join(",")),
            "not_like" => format!("{lhs} NOT LIKE {}", constants.join(",")),
            "in" => format!("{lhs} IN ({})", constants.join(",")),
            "not_in" => format!("{lhs} NOT IN ({})", constants.join(",")),
            "is_null" => format!("{lhs} IS NULL"),
            "is_not_null" => format!("{lhs} IS NOT NULL"),
            "boolean_is" => format!("{lhs} IS {}", require_one(&constants)?),
            "boolean_is_not" => format!("{lhs} IS NOT {}", require_one(&constants)?),
            "between" => {
                if constants.len() != 2 {
                    return Err(EngineError::UnsupportedOperator(
                        "between requires exactly two values".to_string(),
                    ));
                }
                format!("{lhs} BETWEEN {} AND {}", constants[0], constants[1])
            }
            other => return Err(EngineError::UnsupportedOperator(other.to_string())),
        };

        Ok(BooleanExpression::as_(rendered))
    }

    pub fn from_date(expression: &Expression, interval: &DatetimeInterval) -> Result<BooleanExpression> {
        Self::from_filter(
            expression,
            "between",
            &[
                interval.date_from.date_naive().to_string(),
                interval.date_to.date_naive().to_string(),
            ],
            &DataType::Date,
        )
    }

    pub fn from_timestamp(expression: &Expression, interval: &DatetimeInterval) -> Result<BooleanExpression> {
        Self::from_filter(
            expression,
            "between",
            &[
                interval.date_from.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
                interval.date_to.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            ],
            &DataType::Datetime,
        )
    }
}

fn require_one(constants: &[String]) -> Result<&String> {
    constants
        .first()
        .ok_or_else(|| EngineError::UnsupportedOperator("operator requires one value".to_string()))
}
