//! Schema-specific error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no schema document for runner: {0}")]
    NotFound(String),

    #[error("malformed schema for runner {runner}: {source}")]
    Parse {
        runner: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("extends cycle: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("invalid schema search pattern: {0}")]
    InvalidPattern(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SchemaResult<T> = Result<T, SchemaError>;
