//! Caller identity, as attached by the authentication middleware.

use serde::{Deserialize, Serialize};

/// The authenticated (or anonymous) caller of a request.
///
/// The engine never inspects claims itself; they are handed to the database
/// as session state so that row-level policies can evaluate against them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Database role the statement runs as (e.g. `authenticated`, `anon`).
    #[serde(default)]
    pub role: String,

    /// Subject of the token, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Full claim set of the token.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub claims: serde_json::Value,
}

impl Identity {
    /// An anonymous caller running as `role`.
    pub fn anonymous(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    /// An authenticated caller.
    pub fn authenticated(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            user_id: Some(user_id.into()),
            claims: serde_json::Value::Null,
        }
    }

    /// Attach the token's claim set.
    pub fn with_claims(mut self, claims: serde_json::Value) -> Self {
        self.claims = claims;
        self
    }

    /// Claims rendered as a JSON object string, `{}` when absent.
    pub fn claims_json(&self) -> String {
        if self.claims.is_null() {
            "{}".to_string()
        } else {
            self.claims.to_string()
        }
    }

    /// Short label used in audit records and logs.
    pub fn label(&self) -> &str {
        self.user_id.as_deref().unwrap_or(&self.role)
    }
}
