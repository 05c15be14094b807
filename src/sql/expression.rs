use std::collections::HashMap;
use std::rc::Rc;

use crate::catalog::DataType;
use crate::error::{EngineError, Result};

use super::SqlToken;

/// A resolved hole value: either a literal string or another token that
/// renders itself when the hole is expanded.
#[derive(Clone)]
pub enum HoleValue {
    Literal(String),
    Token(Rc<dyn SqlToken>),
}

impl HoleValue {
    fn render(&self) -> String {
        match self {
            HoleValue::Literal(s) => s.clone(),
            HoleValue::Token(t) => t.to_sql(),
        }
    }
}

impl From<String> for HoleValue {
    fn from(value: String) -> Self {
        HoleValue::Literal(value)
    }
}

impl From<&str> for HoleValue {
    fn from(value: &str) -> Self {
        HoleValue::Literal(value.to_string())
    }
}

/// A lookup table from `{name}` hole to its resolved value, with an
/// optional fallback invoked for names it does not contain directly —
/// mirrors the original's `TemplateDict`/`on_missing` pairing, where a
/// column source plugs itself in as the fallback so an unresolved hole
/// resolves to a column reference (and may register a CTE as a side
/// effect).
#[derive(Clone, Default)]
pub struct TemplateDict {
    values: HashMap<String, HoleValue>,
    on_missing: Option<Rc<dyn Fn(&str) -> Result<HoleValue>>>,
}

impl TemplateDict {
    pub fn new(values: HashMap<String, HoleValue>) -> Self {
        Self {
            values,
            on_missing: None,
        }
    }

    pub fn with_on_missing(mut self, on_missing: Rc<dyn Fn(&str) -> Result<HoleValue>>) -> Self {
        self.on_missing = Some(on_missing);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HoleValue>) {
        self.values.insert(key.into(), value.into());
    }

    fn resolve(&self, key: &str) -> Result<String> {
        if let Some(value) = self.values.get(key) {
            return Ok(value.render());
        }
        if let Some(on_missing) = &self.on_missing {
            return Ok(on_missing(key)?.render());
        }
        Err(EngineError::Template(format!("unresolved hole: {key}")))
    }
}

/// Splits a template body into alternating literal/hole segments. Hole
/// names may contain dots (`params.foo`); the whole dotted run between `{`
/// and `}` is treated as a single identifier, never a nested lookup.
fn split_template(template: &str) -> Vec<TemplateSegment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' {
            if !literal.is_empty() {
                segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
            }
            let mut hole = String::new();
            for next in chars.by_ref() {
                if next == '}' {
                    break;
                }
                hole.push(next);
            }
            segments.push(TemplateSegment::Hole(hole));
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        segments.push(TemplateSegment::Literal(literal));
    }
    segments
}

enum TemplateSegment {
    Literal(String),
    Hole(String),
}

/// Returns the distinct hole names in a template body, in first-seen order
/// (mirrors `DotsFormatter.get_format_strings`).
pub fn hole_names(template: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();
    for segment in split_template(template) {
        if let TemplateSegment::Hole(name) = segment {
            if !name.is_empty() && seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }
    names
}

/// A format-string body with a `{name}` hole vocabulary, resolved against a
/// `TemplateDict`.
#[derive(Clone)]
pub struct Expression {
    pub expression: String,
    pub template_dict: Option<TemplateDict>,
}

impl Expression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            template_dict: None,
        }
    }

    pub fn with_template(expression: impl Into<String>, template_dict: TemplateDict) -> Self {
        Self {
            expression: expression.into(),
            template_dict: Some(template_dict),
        }
    }

    pub fn to_definition_sql(&self) -> Result<String> {
        self.to_sql_checked()
    }

    pub fn to_reference_sql(&self) -> Result<String> {
        self.to_sql_checked()
    }

    pub fn to_sql_checked(&self) -> Result<String> {
        let mut out = String::new();
        for segment in split_template(&self.expression) {
            match segment {
                TemplateSegment::Literal(s) => out.push_str(&s),
                TemplateSegment::Hole(name) => {
                    let dict = self.template_dict.as_ref().ok_or_else(|| {
                        EngineError::Template(format!("unresolved hole: {name}"))
                    })?;
                    out.push_str(&dict.resolve(&name)?);
                }
            }
        }
        Ok(out)
    }

    pub fn as_alias(self, alias: impl Into<String>) -> AliasedExpression {
        AliasedExpression {
            expression: self,
            alias: Some(alias.into()),
        }
    }
}

impl SqlToken for Expression {
    fn to_sql(&self) -> String {
        self.to_sql_checked().unwrap_or_default()
    }
}

/// A rendered SQL constant literal, typed for correct quoting.
pub struct Constant;

impl Constant {
    pub fn render(value: &str, data_type: &DataType) -> String {
        data_type.render_literal(value)
    }

    pub fn expression(value: &str, data_type: &DataType) -> Expression {
        Expression::new(Self::render(value, data_type))
    }
}

/// Distinguishes a *definition* form (`expr AS alias`) from a *reference*
/// form (just `alias`), used wherever a SELECT projection must be named
/// once but referenced elsewhere by alias.
#[derive(Clone)]
pub struct AliasedExpression {
    pub expression: Expression,
    pub alias: Option<String>,
}

impl AliasedExpression {
    pub fn new(expression: Expression, alias: Option<String>) -> Self {
        Self { expression, alias }
    }

    pub fn to_definition_sql(&self) -> Result<String> {
        let body = self.expression.to_sql_checked()?;
        Ok(match &self.alias {
            Some(alias) => format!("{body} AS {alias}"),
            None => body,
        })
    }

    pub fn to_reference_sql(&self) -> Result<String> {
        match &self.alias {
            Some(alias) => Ok(alias.clone()),
            None => self.expression.to_sql_checked(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_expression_has_no_holes() {
        let e = Expression::new("1 + 1");
        assert_eq!(e.to_sql_checked().unwrap(), "1 + 1");
    }

    #[test]
    fn dotted_hole_is_a_single_identifier() {
        let mut dict = TemplateDict::default();
        dict.insert("params.foo", "t.`params`.`foo`");
        let e = Expression::with_template("SUM({params.foo})", dict);
        assert_eq!(e.to_sql_checked().unwrap(), "SUM(t.`params`.`foo`)");
    }

    #[test]
    fn missing_hole_without_fallback_is_an_error() {
        let e = Expression::with_template("{x}", TemplateDict::default());
        assert!(e.to_sql_checked().is_err());
    }

    #[test]
    fn on_missing_fallback_resolves_unknown_holes() {
        let dict = TemplateDict::default()
            .with_on_missing(Rc::new(|name: &str| Ok(HoleValue::Literal(format!("col_{name}")))));
        let e = Expression::with_template("{mystery}", dict);
        assert_eq!(e.to_sql_checked().unwrap(), "col_mystery");
    }

    #[test]
    fn aliased_expression_definition_vs_reference() {
        let e = Expression::new("COUNT(*)").as_alias("total");
        assert_eq!(e.to_definition_sql().unwrap(), "COUNT(*) AS total");
        assert_eq!(e.to_reference_sql().unwrap(), "total");
    }

    #[test]
    fn constant_renders_per_type() {
        assert_eq!(Constant::render("abc", &DataType::String), "'abc'");
        assert_eq!(Constant::render("5", &DataType::Integer), "5");
    }
}
