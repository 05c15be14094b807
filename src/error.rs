use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("unsupported x-axis: {0}")]
    UnsupportedXAxis(String),

    #[error("unsupported result type: {0}")]
    UnsupportedResultType(String),

    #[error("illegal join: {0}")]
    IllegalJoin(String),

    #[error("too many requests in flight")]
    TooManyRequests,

    #[error("too many rows requested: {requested} exceeds max {max}")]
    TooManyRows { requested: usize, max: usize },

    #[error("too many distinct group-by values: {distinct} exceeds max {max}")]
    TooManyGroupByValues { distinct: usize, max: usize },

    #[error("query cancelled: {0}")]
    CancelledQuery(String),

    #[error("warehouse error: {0}")]
    Warehouse(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("template error: {0}")]
    Template(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
