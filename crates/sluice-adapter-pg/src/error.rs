//! Execution-time failures and their classification.
//!
//! Database errors are classified once, where they are caught, by SQLSTATE
//! when the driver reports one and by message text otherwise.

use serde::Serialize;
use sluice_audit::AuditError;
use std::fmt;
use thiserror::Error;

/// Class of a database failure. Each class maps to one external error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    DuplicateKey,
    ForeignKeyViolation,
    NotNullViolation,
    CheckViolation,
    InvalidInput,
    /// Rejected by a row-level policy `WITH CHECK` or missing privilege.
    PolicyViolation,
    Unclassified,
}

impl FailureClass {
    /// Classify by SQLSTATE.
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        Some(match code {
            "23505" => Self::DuplicateKey,
            "23503" => Self::ForeignKeyViolation,
            "23502" => Self::NotNullViolation,
            "23514" => Self::CheckViolation,
            // invalid_text_representation, invalid_datetime_format,
            // datetime_field_overflow, numeric_value_out_of_range, undefined_column
            "22P02" | "22007" | "22008" | "22003" | "42703" => Self::InvalidInput,
            "42501" => Self::PolicyViolation,
            _ => return None,
        })
    }

    /// Classify by message text, for errors without a SQLSTATE.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("duplicate key") {
            Self::DuplicateKey
        } else if lower.contains("foreign key constraint") {
            Self::ForeignKeyViolation
        } else if lower.contains("null value in column") || lower.contains("not-null constraint") {
            Self::NotNullViolation
        } else if lower.contains("check constraint") {
            Self::CheckViolation
        } else if lower.contains("invalid input syntax") {
            Self::InvalidInput
        } else if lower.contains("row-level security") {
            Self::PolicyViolation
        } else {
            Self::Unclassified
        }
    }

    pub fn classify(sqlstate: Option<&str>, message: &str) -> Self {
        sqlstate
            .and_then(Self::from_sqlstate)
            .unwrap_or_else(|| Self::from_message(message))
    }
}

/// A classified database failure.
#[derive(Debug, Clone, PartialEq)]
pub struct DbFailure {
    pub class: FailureClass,
    pub sqlstate: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub constraint: Option<String>,
}

impl DbFailure {
    pub fn new(sqlstate: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            class: FailureClass::classify(sqlstate, &message),
            sqlstate: sqlstate.map(str::to_string),
            message,
            detail: None,
            hint: None,
            constraint: None,
        }
    }

    pub fn is_unclassified(&self) -> bool {
        self.class == FailureClass::Unclassified
    }
}

impl fmt::Display for DbFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sqlstate {
            Some(code) => write!(f, "{} (SQLSTATE {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&sqlx::Error> for DbFailure {
    fn from(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let mut failure = DbFailure::new(db.code().as_deref(), db.message());
                failure.constraint = db.constraint().map(str::to_string);
                if let Some(pg) = db.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
                    failure.detail = pg.detail().map(str::to_string);
                    failure.hint = pg.hint().map(str::to_string);
                }
                failure
            }
            other => DbFailure::new(None, other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("database error: {0}")]
    Database(DbFailure),

    #[error("failed to connect to database: {0}")]
    Connect(String),

    /// The audit record for a denied mutation could not be written.
    #[error("audit write failed: {0}")]
    Audit(#[from] AuditError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ExecError {
    fn from(err: sqlx::Error) -> Self {
        ExecError::Database(DbFailure::from(&err))
    }
}

impl ExecError {
    pub fn failure(&self) -> Option<&DbFailure> {
        match self {
            ExecError::Database(failure) => Some(failure),
            _ => None,
        }
    }
}
