//! External error taxonomy.
//!
//! Every failure leaving the data API is an [`ApiError`] rendered as
//! `{error, code, message?, hint?, details?, request_id}`. Only
//! `DATABASE_ERROR` is logged as an error, with the raw cause; it never
//! carries database text to the client.

use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sluice_adapter_pg::{ExecError, FailureClass};
use sluice_query::QueryError;
use std::fmt;
use thiserror::Error;

use crate::request::REQUEST_ID_HEADER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthenticationRequired,
    RlsPolicyViolation,
    NotFound,
    DuplicateKey,
    ForeignKeyViolation,
    NotNullViolation,
    InvalidInput,
    CheckViolation,
    DatabaseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::RlsPolicyViolation => "RLS_POLICY_VIOLATION",
            Self::NotFound => "NOT_FOUND",
            Self::DuplicateKey => "DUPLICATE_KEY",
            Self::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            Self::NotNullViolation => "NOT_NULL_VIOLATION",
            Self::InvalidInput => "INVALID_INPUT",
            Self::CheckViolation => "CHECK_VIOLATION",
            Self::DatabaseError => "DATABASE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::RlsPolicyViolation => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DuplicateKey | Self::ForeignKeyViolation => StatusCode::CONFLICT,
            Self::NotNullViolation | Self::InvalidInput | Self::CheckViolation => {
                StatusCode::BAD_REQUEST
            }
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FailureClass> for ErrorCode {
    fn from(class: FailureClass) -> Self {
        match class {
            FailureClass::DuplicateKey => Self::DuplicateKey,
            FailureClass::ForeignKeyViolation => Self::ForeignKeyViolation,
            FailureClass::NotNullViolation => Self::NotNullViolation,
            FailureClass::CheckViolation => Self::CheckViolation,
            FailureClass::InvalidInput => Self::InvalidInput,
            FailureClass::PolicyViolation => Self::RlsPolicyViolation,
            FailureClass::Unclassified => Self::DatabaseError,
        }
    }
}

/// Wire form of an error.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Canonical reason phrase of the status, e.g. `Conflict`.
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub request_id: String,
}

const DATABASE_ERROR_MESSAGE: &str = "An unexpected database error occurred";

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{code}: {}", .message.as_deref().unwrap_or("-"))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: Option<String>,
    pub hint: Option<String>,
    pub details: Option<serde_json::Value>,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            hint: None,
            details: None,
            request_id: None,
        }
    }

    pub fn authentication_required() -> Self {
        Self::new(ErrorCode::AuthenticationRequired, "Authentication is required for this operation")
    }

    pub fn policy_violation(table: &str) -> Self {
        Self::new(
            ErrorCode::RlsPolicyViolation,
            format!("Row-level security policy denies this operation on {}", table),
        )
    }

    pub fn not_found(table: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("No matching row in {}", table))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    /// Classify an execution failure of `operation`.
    ///
    /// Unclassified failures are logged here with their raw text and
    /// reduced to a generic message.
    pub fn from_exec(err: ExecError, operation: &str, request_id: &str) -> Self {
        let error = match err.failure() {
            Some(failure) if !failure.is_unclassified() => {
                let mut error = Self::new(failure.class.into(), failure.message.clone());
                error.hint = failure.hint.clone();
                if let Some(detail) = &failure.detail {
                    error.details = Some(serde_json::Value::String(detail.clone()));
                }
                tracing::debug!(
                    code = error.code.as_str(),
                    operation,
                    request_id,
                    "database rejected statement"
                );
                error
            }
            _ => {
                tracing::error!(
                    error = %err,
                    operation,
                    request_id,
                    "unclassified database error"
                );
                Self::new(ErrorCode::DatabaseError, DATABASE_ERROR_MESSAGE)
            }
        };
        error.with_request_id(request_id)
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self
                .status()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            code: self.code,
            message: self.message.clone(),
            hint: self.hint.clone(),
            details: self.details.clone(),
            request_id: self
                .request_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        let error = ApiError::invalid_input(err.to_string());
        match err {
            QueryError::InvalidCursor(_) => error.with_hint("Request the first page again to obtain a fresh cursor"),
            QueryError::CursorOrderMismatch { .. } => {
                error.with_hint("Order by the cursor column first, in the cursor's direction")
            }
            _ => error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.to_response_body();
        let header = HeaderValue::from_str(&body.request_id).ok();
        let mut response = (self.status(), Json(body)).into_response();
        if let Some(value) = header {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}
