//! Resolving zero-row mutations.
//!
//! Under row-level security an UPDATE or DELETE that matches nothing looks
//! the same whether the target row is missing or merely invisible to the
//! caller. A privileged existence probe tells the two apart.
//!
//! The probe runs after the mutation, so a row deleted by a concurrent
//! request between the two statements is reported as `NotFound`, and a row
//! inserted in between can turn a genuine miss into `Forbidden`.

use async_trait::async_trait;
use sluice_audit::AuditLogger;
use sluice_core::{Identity, SessionConfig, TableRef};
use sluice_query::{QueryPlan, StatementKind};
use std::sync::Arc;

use crate::error::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Rows affected.
    Applied(u64),
    NotFound,
    Forbidden,
    AuthenticationRequired,
}

impl Outcome {
    pub fn status_code(&self, kind: StatementKind) -> u16 {
        match self {
            Outcome::Applied(_) => match kind {
                StatementKind::Insert => 201,
                StatementKind::Delete => 204,
                _ => 200,
            },
            Outcome::NotFound => 404,
            Outcome::Forbidden => 403,
            Outcome::AuthenticationRequired => 401,
        }
    }
}

/// Answers whether rows matching an exists plan are present, ignoring row
/// level policies.
#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    async fn exists(&self, plan: &QueryPlan) -> Result<bool, ExecError>;
}

/// What a mutation was aimed at, for outcomes and audit records.
#[derive(Debug, Clone, Copy)]
pub struct MutationTarget<'a> {
    pub kind: StatementKind,
    pub table: &'a TableRef,
    pub identity: &'a Identity,
    pub request_id: Option<&'a str>,
}

#[derive(Clone)]
pub struct Disambiguator {
    probe: Arc<dyn ExistenceProbe>,
    audit: AuditLogger,
    session: SessionConfig,
}

impl Disambiguator {
    pub fn new(probe: Arc<dyn ExistenceProbe>, audit: AuditLogger, session: SessionConfig) -> Self {
        Self {
            probe,
            audit,
            session,
        }
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// `Some(AuthenticationRequired)` when the caller carries no identity.
    /// Must be checked before the statement runs.
    pub async fn admit(&self, target: &MutationTarget<'_>) -> Result<Option<Outcome>, ExecError> {
        if !self.session.is_anonymous(target.identity) {
            return Ok(None);
        }
        tracing::debug!(
            table = %target.table,
            operation = target.kind.as_str(),
            role = %target.identity.role,
            "anonymous caller rejected"
        );
        self.audit
            .log_authentication_required(
                target.kind.as_str(),
                &target.table.to_string(),
                target.identity,
                target.request_id,
            )
            .await?;
        Ok(Some(Outcome::AuthenticationRequired))
    }

    /// Classify a finished mutation. `exists` is only run when nothing was
    /// affected.
    ///
    /// A `Forbidden` outcome is audited before this returns; a failed audit
    /// write fails the call.
    pub async fn resolve(
        &self,
        rows_affected: u64,
        exists: &QueryPlan,
        target: &MutationTarget<'_>,
    ) -> Result<Outcome, ExecError> {
        if rows_affected > 0 {
            return Ok(Outcome::Applied(rows_affected));
        }
        if !self.probe.exists(exists).await? {
            return Ok(Outcome::NotFound);
        }

        tracing::debug!(
            table = %target.table,
            operation = target.kind.as_str(),
            role = %target.identity.role,
            request_id = target.request_id.unwrap_or("-"),
            "mutation hidden by row-level policy"
        );
        self.audit
            .log_policy_violation(
                target.kind.as_str(),
                &target.table.to_string(),
                target.identity,
                target.request_id,
            )
            .await?;
        Ok(Outcome::Forbidden)
    }
}
