//! Audit logger.
//!
//! [`AuditLogger`] is shared by every request. Writes are awaited by the
//! caller, so an event is stored before the response that caused it leaves
//! the process.

use chrono::{DateTime, Utc};
use sluice_core::{AuditConfig, Identity};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType};
use crate::storage::{AuditStorage, NullStorage, create_storage};

/// Filter for querying stored events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_type: Option<AuditEventType>,
    pub table: Option<String>,
    pub role: Option<String>,
    pub user_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub(crate) fn matches(&self, event: &AuditEvent) -> bool {
        self.event_type.is_none_or(|t| t == event.event_type)
            && self.table.as_ref().is_none_or(|t| *t == event.table)
            && self.role.as_ref().is_none_or(|r| *r == event.role)
            && self
                .user_id
                .as_ref()
                .is_none_or(|u| event.user_id.as_ref() == Some(u))
            && self.start_time.is_none_or(|s| event.occurred_at >= s)
            && self.end_time.is_none_or(|e| event.occurred_at <= e)
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    enabled: bool,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        Ok(Self {
            enabled: config.enabled,
            storage: create_storage(config)?,
        })
    }

    pub fn with_storage(storage: Arc<dyn AuditStorage>) -> Self {
        Self {
            enabled: true,
            storage,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            storage: Arc::new(NullStorage),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            role = %event.role,
            operation = %event.operation,
            table = %event.table,
            "Audit event"
        );

        self.storage.store(event).await
    }

    /// A mutation matched zero visible rows although the target exists.
    pub async fn log_policy_violation(
        &self,
        operation: &str,
        table: &str,
        identity: &Identity,
        request_id: Option<&str>,
    ) -> Result<(), AuditError> {
        let mut builder = AuditEvent::builder(AuditEventType::PolicyViolation, operation, table, identity);
        if let Some(request_id) = request_id {
            builder = builder.request_id(request_id);
        }
        self.log(builder.build()).await
    }

    pub async fn log_authentication_required(
        &self,
        operation: &str,
        table: &str,
        identity: &Identity,
        request_id: Option<&str>,
    ) -> Result<(), AuditError> {
        let mut builder =
            AuditEvent::builder(AuditEventType::AuthenticationRequired, operation, table, identity);
        if let Some(request_id) = request_id {
            builder = builder.request_id(request_id);
        }
        self.log(builder.build()).await
    }

    pub async fn log_mutation_applied(
        &self,
        operation: &str,
        table: &str,
        identity: &Identity,
        row_count: u64,
        request_id: Option<&str>,
    ) -> Result<(), AuditError> {
        let mut builder = AuditEvent::builder(AuditEventType::MutationApplied, operation, table, identity)
            .row_count(row_count);
        if let Some(request_id) = request_id {
            builder = builder.request_id(request_id);
        }
        self.log(builder.build()).await
    }

    pub async fn log_query_failed(
        &self,
        operation: &str,
        table: &str,
        identity: &Identity,
        error: &str,
        request_id: Option<&str>,
    ) -> Result<(), AuditError> {
        let mut builder =
            AuditEvent::builder(AuditEventType::QueryFailed, operation, table, identity).error(error);
        if let Some(request_id) = request_id {
            builder = builder.request_id(request_id);
        }
        self.log(builder.build()).await
    }

    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.query(filter).await
    }

    pub async fn get(&self, event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        self.storage.get(event_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn policy_violation_is_stored_before_returning() {
        let storage = Arc::new(MemoryStorage::new());
        let logger = AuditLogger::with_storage(storage.clone());
        let identity = Identity::authenticated("u-7", "authenticated");

        logger
            .log_policy_violation("delete", "public.posts", &identity, Some("req-1"))
            .await
            .unwrap();

        assert_eq!(storage.len(), 1);
        let events = logger
            .query(AuditFilter {
                event_type: Some(AuditEventType::PolicyViolation),
                user_id: Some("u-7".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].request_id.as_deref(), Some("req-1"));
        assert_eq!(events[0].operation, "delete");
    }

    #[tokio::test]
    async fn disabled_logger_drops_events() {
        let logger = AuditLogger::disabled();
        let identity = Identity::anonymous("anon");
        logger
            .log_authentication_required("insert", "public.posts", &identity, None)
            .await
            .unwrap();
        assert!(!logger.is_enabled());
        assert!(logger.query(AuditFilter::default()).await.unwrap().is_empty());
    }
}
