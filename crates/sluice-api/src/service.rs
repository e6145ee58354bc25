//! The data API service.
//!
//! Drives one request through plan building, identity-scoped execution and
//! outcome classification. Holds no per-request state.

use serde::Serialize;
use sluice_adapter_pg::{
    DataAdapter, Disambiguator, ExecError, MutationTarget, Outcome, PgDataAdapter, PrivilegedProbe,
};
use sluice_audit::AuditLogger;
use sluice_core::{GuardrailsConfig, Identity, SluiceConfig, TableMeta, TableRef};
use sluice_query::{CursorData, QueryPlan, StatementKind, encode_cursor};
use std::sync::Arc;

use crate::error::{ApiError, ErrorCode};
use crate::ops::{CountRequest, DeleteRequest, InsertRequest, SelectRequest, UpdateRequest, exists_plan};
use crate::request::RequestId;

/// Caller identity and correlation id of one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub request_id: RequestId,
}

impl RequestContext {
    pub fn new(identity: Identity, request_id: RequestId) -> Self {
        Self {
            identity,
            request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectResponse {
    pub rows: Vec<serde_json::Value>,
    /// Token for the following page, present when this page is full and
    /// ordered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationResponse {
    /// 201 for inserts, 200 for updates, 204 for deletes.
    pub status: u16,
    pub rows_affected: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct DataApi {
    adapter: Arc<dyn DataAdapter>,
    disambiguator: Disambiguator,
    guardrails: GuardrailsConfig,
}

impl DataApi {
    pub fn new(adapter: Arc<dyn DataAdapter>, disambiguator: Disambiguator, guardrails: GuardrailsConfig) -> Self {
        Self {
            adapter,
            disambiguator,
            guardrails,
        }
    }

    /// Wire the Postgres adapter, privileged probe and audit logger from
    /// configuration.
    pub async fn connect(config: &SluiceConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let adapter = PgDataAdapter::connect(config).await?;
        let probe = PrivilegedProbe::connect(config).await?;
        let audit = AuditLogger::new(&config.audit)?;
        let disambiguator = Disambiguator::new(Arc::new(probe), audit, config.session.clone());
        Ok(Self::new(Arc::new(adapter), disambiguator, config.guardrails.clone()))
    }

    pub async fn select(
        &self,
        ctx: &RequestContext,
        meta: &TableMeta,
        req: &SelectRequest,
    ) -> Result<SelectResponse, ApiError> {
        self.admit_read(ctx, meta, StatementKind::Select)?;
        let plan = req
            .to_plan(meta, &self.guardrails)
            .map_err(|e| self.build_error(ctx, e))?;
        let rows = match self.adapter.fetch_rows(&ctx.identity, &plan).await {
            Ok(rows) => rows,
            Err(e) => return Err(self.exec_error(ctx, &meta.table, "select", e).await),
        };

        let limit = self.guardrails.effective_limit(req.limit);
        let next_cursor = if req.pageable() && rows.len() as u64 == limit {
            next_cursor(&plan, &rows)
        } else {
            None
        };
        Ok(SelectResponse { rows, next_cursor })
    }

    pub async fn count(&self, ctx: &RequestContext, meta: &TableMeta, req: &CountRequest) -> Result<u64, ApiError> {
        self.admit_read(ctx, meta, StatementKind::Count)?;
        let plan = req.to_plan(meta).map_err(|e| self.build_error(ctx, e))?;
        match self.adapter.fetch_count(&ctx.identity, &plan).await {
            Ok(count) => Ok(count),
            Err(e) => Err(self.exec_error(ctx, &meta.table, "count", e).await),
        }
    }

    pub async fn insert(
        &self,
        ctx: &RequestContext,
        meta: &TableMeta,
        req: &InsertRequest,
    ) -> Result<MutationResponse, ApiError> {
        let target = self.target(ctx, meta, StatementKind::Insert);
        self.admit_mutation(ctx, &target).await?;

        if req.rows.is_empty() {
            return Err(self.reject(ctx, ApiError::invalid_input("insert requires at least one row")));
        }
        let plan = req.to_plan(meta).map_err(|e| self.build_error(ctx, e))?;
        if plan.is_empty() {
            return Err(self.reject(ctx, ApiError::invalid_input("insert names no known column")));
        }

        let result = match self.adapter.execute_mutation(&ctx.identity, &plan).await {
            Ok(result) => result,
            Err(e) => return Err(self.exec_error(ctx, &meta.table, "insert", e).await),
        };
        self.record_applied(&target, result.rows_affected).await;
        let outcome = Outcome::Applied(result.rows_affected);
        Ok(MutationResponse {
            status: outcome.status_code(StatementKind::Insert),
            rows_affected: result.rows_affected,
            rows: result.rows,
        })
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        meta: &TableMeta,
        req: &UpdateRequest,
    ) -> Result<MutationResponse, ApiError> {
        let target = self.target(ctx, meta, StatementKind::Update);
        self.admit_mutation(ctx, &target).await?;

        let plan = req.to_plan(meta).map_err(|e| self.build_error(ctx, e))?;
        if plan.is_empty() {
            return Err(self.reject(ctx, ApiError::invalid_input("update names no known column")));
        }
        let exists = exists_plan(meta, &req.filters).map_err(|e| self.build_error(ctx, e))?;
        self.run_mutation(ctx, &target, &plan, &exists).await
    }

    pub async fn delete(
        &self,
        ctx: &RequestContext,
        meta: &TableMeta,
        req: &DeleteRequest,
    ) -> Result<MutationResponse, ApiError> {
        let target = self.target(ctx, meta, StatementKind::Delete);
        self.admit_mutation(ctx, &target).await?;

        let plan = req.to_plan(meta).map_err(|e| self.build_error(ctx, e))?;
        let exists = exists_plan(meta, &req.filters).map_err(|e| self.build_error(ctx, e))?;
        self.run_mutation(ctx, &target, &plan, &exists).await
    }

    async fn run_mutation(
        &self,
        ctx: &RequestContext,
        target: &MutationTarget<'_>,
        plan: &QueryPlan,
        exists: &QueryPlan,
    ) -> Result<MutationResponse, ApiError> {
        let operation = target.kind.as_str();
        if !plan.filtered && !self.guardrails.allow_unfiltered_mutations {
            return Err(self.reject(
                ctx,
                ApiError::invalid_input(format!("{} requires at least one filter", operation))
                    .with_hint("Add a filter, or enable guardrails.allow_unfiltered_mutations"),
            ));
        }

        let result = match self.adapter.execute_mutation(&ctx.identity, plan).await {
            Ok(result) => result,
            Err(e) => return Err(self.exec_error(ctx, target.table, operation, e).await),
        };
        let outcome = match self.disambiguator.resolve(result.rows_affected, exists, target).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.exec_error(ctx, target.table, operation, e).await),
        };

        let table = target.table.to_string();
        match outcome {
            Outcome::Applied(rows_affected) => {
                self.record_applied(target, rows_affected).await;
                Ok(MutationResponse {
                    status: outcome.status_code(target.kind),
                    rows_affected,
                    rows: result.rows,
                })
            }
            Outcome::NotFound => Err(self.reject(ctx, ApiError::not_found(&table))),
            Outcome::Forbidden => Err(self.reject(ctx, ApiError::policy_violation(&table))),
            Outcome::AuthenticationRequired => Err(self.reject(ctx, ApiError::authentication_required())),
        }
    }

    fn target<'a>(&self, ctx: &'a RequestContext, meta: &'a TableMeta, kind: StatementKind) -> MutationTarget<'a> {
        MutationTarget {
            kind,
            table: &meta.table,
            identity: &ctx.identity,
            request_id: Some(ctx.request_id.as_str()),
        }
    }

    async fn admit_mutation(&self, ctx: &RequestContext, target: &MutationTarget<'_>) -> Result<(), ApiError> {
        match self.disambiguator.admit(target).await {
            Ok(None) => Ok(()),
            Ok(Some(_)) => Err(self.reject(ctx, ApiError::authentication_required())),
            Err(e) => Err(ApiError::from_exec(e, target.kind.as_str(), ctx.request_id.as_str())),
        }
    }

    /// Reads need a role to run under; anonymous roles are refused only when
    /// configured.
    fn admit_read(&self, ctx: &RequestContext, meta: &TableMeta, kind: StatementKind) -> Result<(), ApiError> {
        let role = ctx.identity.role.trim();
        let refused = role.is_empty()
            || (self.guardrails.require_auth_for_reads
                && self.disambiguator.session().is_anonymous(&ctx.identity));
        if refused {
            tracing::debug!(
                table = %meta.table,
                operation = kind.as_str(),
                request_id = %ctx.request_id,
                "anonymous read refused"
            );
            return Err(self.reject(ctx, ApiError::authentication_required()));
        }
        Ok(())
    }

    /// Audit records for successful mutations are best effort; a failed write
    /// is logged and the response still goes out.
    async fn record_applied(&self, target: &MutationTarget<'_>, rows_affected: u64) {
        let audit = self.disambiguator.audit();
        if let Err(e) = audit
            .log_mutation_applied(
                target.kind.as_str(),
                &target.table.to_string(),
                target.identity,
                rows_affected,
                target.request_id,
            )
            .await
        {
            tracing::warn!(error = %e, request_id = target.request_id.unwrap_or("-"), "audit write failed");
        }
    }

    /// Map an execution failure, auditing the ones that surface as
    /// `DATABASE_ERROR`.
    async fn exec_error(&self, ctx: &RequestContext, table: &TableRef, operation: &str, err: ExecError) -> ApiError {
        let cause = err.to_string();
        let error = ApiError::from_exec(err, operation, ctx.request_id.as_str());
        if error.code == ErrorCode::DatabaseError {
            let audit = self.disambiguator.audit();
            if let Err(e) = audit
                .log_query_failed(
                    operation,
                    &table.to_string(),
                    &ctx.identity,
                    &cause,
                    Some(ctx.request_id.as_str()),
                )
                .await
            {
                tracing::warn!(error = %e, request_id = %ctx.request_id, "audit write failed");
            }
        }
        error
    }

    fn build_error(&self, ctx: &RequestContext, err: sluice_query::QueryError) -> ApiError {
        self.reject(ctx, ApiError::from(err))
    }

    fn reject(&self, ctx: &RequestContext, err: ApiError) -> ApiError {
        tracing::debug!(
            code = err.code.as_str(),
            request_id = %ctx.request_id,
            "request rejected"
        );
        err.with_request_id(ctx.request_id.as_str())
    }
}

/// Cursor addressing the row after `rows`' last element, keyed on the
/// plan's leading sort column. A null sort value cannot be resumed from, so
/// no cursor is minted for it.
fn next_cursor(plan: &QueryPlan, rows: &[serde_json::Value]) -> Option<String> {
    let key = plan.sort_key()?;
    let value = rows.last()?.get(&key.column)?;
    if value.is_null() {
        return None;
    }
    Some(encode_cursor(&CursorData::new(key.column.clone(), value.clone(), key.desc)))
}
