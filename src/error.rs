//! Error type for row-window requests, and user-facing message formatting.
//!
//! Polars and I/O errors are mapped by matching their variants rather than by
//! parsing their text, so messages stay readable and engine-agnostic.

use polars::prelude::PolarsError;
use std::io;
use thiserror::Error;

pub type GridResult<T> = std::result::Result<T, GridError>;

/// Why a row window could not be produced. A failed request never yields a partial page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// The request itself is malformed (window, group path, filter operands).
    #[error("invalid request: {0}")]
    Validation(String),
    /// The store failed while running the pipeline.
    #[error("query failed: {0}")]
    QueryExecution(String),
    /// The request was not delivered, or the response was not received or not decodable.
    #[error("transport error: {0}")]
    Transport(String),
}

impl GridError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GridError::Validation(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        GridError::QueryExecution(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        GridError::Transport(msg.into())
    }

    /// Message without the kind prefix, as sent in an HTTP error body.
    pub fn message(&self) -> &str {
        match self {
            GridError::Validation(msg) | GridError::QueryExecution(msg) | GridError::Transport(msg) => {
                msg
            }
        }
    }
}

impl From<PolarsError> for GridError {
    fn from(err: PolarsError) -> Self {
        GridError::QueryExecution(user_message_from_polars(&err))
    }
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check that the field exists in the dataset.",
            msg
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::SchemaFieldNotFound(msg) => format!("Schema field not found: {}", msg),
        PE::ComputeError(msg) => simplify_compute_message(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::ConnectionRefused => "Connection refused.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Strip polars-internal phrasing from compute errors.
fn simplify_compute_message(msg: &str) -> String {
    let first = msg.lines().next().unwrap_or(msg).trim();
    let first = first
        .strip_prefix("cannot compare ")
        .map(|rest| format!("Incompatible comparison: {}", rest))
        .unwrap_or_else(|| first.to_string());
    if first.is_empty() {
        "Query failed".to_string()
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_from_io_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file");
        let msg = user_message_from_io(&err, None);
        assert!(
            msg.contains("not found"),
            "expected 'not found', got: {}",
            msg
        );
    }

    #[test]
    fn test_user_message_from_io_with_context() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let msg = user_message_from_io(&err, Some("(winners.csv)"));
        assert_eq!(msg, "Permission denied. Check read access. (winners.csv)");
    }

    #[test]
    fn test_polars_error_becomes_query_execution() {
        let err: GridError = PolarsError::ColumnNotFound("medal".into()).into();
        match &err {
            GridError::QueryExecution(msg) => {
                assert!(msg.contains("medal"), "expected 'medal', got: {}", msg);
                assert!(msg.contains("Column not found"), "got: {}", msg);
            }
            other => panic!("unexpected error kind: {:?}", other),
        }
        assert!(err.to_string().starts_with("query failed: "));
    }

    #[test]
    fn test_compute_message_keeps_first_line() {
        let err = PolarsError::ComputeError("cannot compare string with numeric type\n\nhint".into());
        assert_eq!(
            user_message_from_polars(&err),
            "Incompatible comparison: string with numeric type"
        );
    }

    #[test]
    fn test_message_has_no_kind_prefix() {
        let err = GridError::validation("startRow must not be negative");
        assert_eq!(err.message(), "startRow must not be negative");
        assert_eq!(
            err.to_string(),
            "invalid request: startRow must not be negative"
        );
    }
}
