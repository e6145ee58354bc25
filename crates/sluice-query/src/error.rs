//! Build-time errors.
//!
//! Everything here is detected before a statement reaches the database.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// Pagination token is not base64url JSON, or names no column.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// Cursor column/direction disagrees with the leading ORDER BY.
    #[error(
        "cursor on '{cursor_column}' does not match ordering on '{order_column}'"
    )]
    CursorOrderMismatch {
        cursor_column: String,
        order_column: String,
    },

    /// Keyset and offset pagination cannot be combined.
    #[error("cursor pagination cannot be combined with offset")]
    CursorWithOffset,

    /// A filter whose operand cannot be expressed safely.
    #[error("invalid filter on '{column}': {reason}")]
    InvalidFilter { column: String, reason: String },

    /// Unknown operator name from the parameter parser.
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// Schema or table name is not a safe identifier.
    #[error("invalid table identifier '{0}'")]
    InvalidTable(String),
}
