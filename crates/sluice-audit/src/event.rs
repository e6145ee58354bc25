//! Audit event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sluice_core::Identity;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Zero-row mutation on a row that exists but is hidden by policy.
    PolicyViolation,
    /// Anonymous caller on a scoped operation.
    AuthenticationRequired,
    MutationApplied,
    QueryFailed,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PolicyViolation => write!(f, "POLICY_VIOLATION"),
            Self::AuthenticationRequired => write!(f, "AUTH_REQUIRED"),
            Self::MutationApplied => write!(f, "MUTATION_APPLIED"),
            Self::QueryFailed => write!(f, "QUERY_FAILED"),
        }
    }
}

/// An audit event.
///
/// Core fields: `[role - user - operation - table]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,

    pub occurred_at: DateTime<Utc>,

    pub event_type: AuditEventType,

    /// Statement kind, e.g. `update`.
    pub operation: String,

    /// Qualified table name, e.g. `public.posts`.
    pub table: String,

    pub role: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Rows affected, for applied mutations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        operation: impl Into<String>,
        table: impl Into<String>,
        identity: &Identity,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            operation: operation.into(),
            table: table.into(),
            role: identity.role.clone(),
            user_id: identity.user_id.clone(),
            request_id: None,
            row_count: None,
            error: None,
            meta: serde_json::Value::Null,
        }
    }

    pub fn builder(
        event_type: AuditEventType,
        operation: impl Into<String>,
        table: impl Into<String>,
        identity: &Identity,
    ) -> AuditEventBuilder {
        AuditEventBuilder {
            event: AuditEvent::new(event_type, operation, table, identity),
        }
    }

    /// Format: `[timestamp] EVENT_TYPE role=... user=... operation=... table=...`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} role={} user={} operation={} table={}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
            self.role,
            self.user_id.as_deref().unwrap_or("-"),
            self.operation,
            self.table,
        );

        if let Some(ref request_id) = self.request_id {
            line.push_str(&format!(" request_id={}", request_id));
        }
        if let Some(rows) = self.row_count {
            line.push_str(&format!(" rows={}", rows));
        }
        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        line
    }
}

#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.event.request_id = Some(request_id.into());
        self
    }

    pub fn row_count(mut self, count: u64) -> Self {
        self.event.row_count = Some(count);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.event.meta = meta;
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_line_carries_core_fields() {
        let identity = Identity::authenticated("u-1", "authenticated");
        let event = AuditEvent::builder(AuditEventType::PolicyViolation, "delete", "public.posts", &identity)
            .request_id("req-9")
            .build();
        let line = event.to_log_line();
        assert!(line.contains("POLICY_VIOLATION"));
        assert!(line.contains("role=authenticated user=u-1 operation=delete table=public.posts"));
        assert!(line.ends_with("request_id=req-9"));
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let identity = Identity::anonymous("anon");
        let event = AuditEvent::new(AuditEventType::AuthenticationRequired, "insert", "public.posts", &identity);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "authentication_required");
        assert!(json.get("user_id").is_none());
        assert!(json.get("meta").is_none());
    }
}
