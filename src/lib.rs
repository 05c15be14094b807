//! Analytics chart query engine: SQL compilation, a semantic layer over
//! tabular warehouse results, and cancellable concurrent execution.

pub mod error;
pub mod config;
pub mod logging;
pub mod constants;
pub mod time;
pub mod catalog;
pub mod sql;
pub mod column_source;
pub mod compiler;
pub mod semantic;
pub mod xaxis;
pub mod domain;
pub mod warehouse;
pub mod pipeline;
pub mod executor;
pub mod service;

pub use error::{EngineError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
