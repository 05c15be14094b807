use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Scalar data types plus the string-keyed map variants the original
/// datasource definitions occasionally use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Number,
    Integer,
    String,
    Date,
    Datetime,
    Boolean,
    Map(Box<DataType>),
}

impl DataType {
    /// Parses a catalog-supplied type string, applying the original's
    /// aliasing table (`float -> number`, `timestamp -> datetime`, and the
    /// corresponding `map<string,...>` forms).
    pub fn parse(data_type: &str) -> Result<Self> {
        let aliased = match data_type {
            "float" => "number",
            "map<string,float>" => "map<string,number>",
            "timestamp" => "datetime",
            "map<string,timestamp>" => "map<string,datetime>",
            other => other,
        };

        if let Some(inner) = aliased
            .strip_prefix("map<string,")
            .and_then(|s| s.strip_suffix('>'))
        {
            return Ok(DataType::Map(Box::new(Self::parse_scalar(inner)?)));
        }

        Self::parse_scalar(aliased)
    }

    fn parse_scalar(s: &str) -> Result<Self> {
        match s {
            "number" => Ok(DataType::Number),
            "integer" => Ok(DataType::Integer),
            "string" => Ok(DataType::String),
            "date" => Ok(DataType::Date),
            "datetime" => Ok(DataType::Datetime),
            "boolean" => Ok(DataType::Boolean),
            other => Err(EngineError::Catalog(format!("unknown data type: {other}"))),
        }
    }

    /// Renders a literal value of this type for inclusion in emitted SQL.
    pub fn render_literal(&self, value: &str) -> String {
        match self {
            DataType::String => format!("'{}'", value.replace('\'', "''")),
            DataType::Date => format!("DATE '{value}'"),
            DataType::Datetime => format!("TIMESTAMP '{value}'"),
            DataType::Number | DataType::Integer | DataType::Boolean => value.to_string(),
            DataType::Map(inner) => inner.render_literal(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub data_type: DataType,
    pub description: String,
    pub label: String,
    pub available_values: Vec<String>,
    pub can_filter: bool,
    pub can_group_by: bool,
    pub hidden: bool,
}

impl Column {
    pub fn new(id: impl Into<String>, data_type: DataType) -> Self {
        let id = id.into();
        let label = default_label(&id);
        Self {
            id,
            data_type,
            description: String::new(),
            label,
            available_values: Vec::new(),
            can_filter: true,
            can_group_by: true,
            hidden: false,
        }
    }
}

fn default_label(id: &str) -> String {
    id.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
