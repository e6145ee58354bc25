//! Postgres adapter for the sluice data API.
//!
//! [`PgDataAdapter`] runs built [`QueryPlan`]s through the
//! [`RlsExecutor`], so every statement sees the caller's identity.
//! [`PrivilegedProbe`] answers existence checks on a separate pool whose
//! login role bypasses row-level security.

use async_trait::async_trait;
use sluice_core::{Identity, SluiceConfig};
use sluice_query::QueryPlan;
use sqlx::PgPool;

pub mod bind;
pub mod disambiguate;
pub mod error;
pub mod executor;
pub mod introspect;

pub use disambiguate::{Disambiguator, ExistenceProbe, MutationTarget, Outcome};
pub use error::{DbFailure, ExecError, FailureClass};
pub use executor::{MutationResult, RlsExecutor, connect_pool};
pub use introspect::{introspect_tables, load_table};

/// Identity-scoped statement execution.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    async fn fetch_rows(
        &self,
        identity: &Identity,
        plan: &QueryPlan,
    ) -> Result<Vec<serde_json::Value>, ExecError>;

    async fn fetch_count(&self, identity: &Identity, plan: &QueryPlan) -> Result<u64, ExecError>;

    async fn execute_mutation(
        &self,
        identity: &Identity,
        plan: &QueryPlan,
    ) -> Result<MutationResult, ExecError>;
}

#[derive(Clone)]
pub struct PgDataAdapter {
    executor: RlsExecutor,
}

impl PgDataAdapter {
    pub fn new(executor: RlsExecutor) -> Self {
        Self { executor }
    }

    pub async fn connect(config: &SluiceConfig) -> Result<Self, ExecError> {
        let executor = RlsExecutor::connect(&config.upstream, config.session.clone()).await?;
        Ok(Self::new(executor))
    }

    pub fn executor(&self) -> &RlsExecutor {
        &self.executor
    }
}

#[async_trait]
impl DataAdapter for PgDataAdapter {
    async fn fetch_rows(
        &self,
        identity: &Identity,
        plan: &QueryPlan,
    ) -> Result<Vec<serde_json::Value>, ExecError> {
        let plan = plan.clone();
        self.executor
            .execute_scoped(identity, move |conn| {
                Box::pin(async move { executor::fetch_rows(conn, &plan).await })
            })
            .await
    }

    async fn fetch_count(&self, identity: &Identity, plan: &QueryPlan) -> Result<u64, ExecError> {
        let plan = plan.clone();
        self.executor
            .execute_scoped(identity, move |conn| {
                Box::pin(async move { executor::fetch_count(conn, &plan).await })
            })
            .await
    }

    async fn execute_mutation(
        &self,
        identity: &Identity,
        plan: &QueryPlan,
    ) -> Result<MutationResult, ExecError> {
        if plan.is_empty() {
            return Ok(MutationResult::default());
        }
        let plan = plan.clone();
        self.executor
            .execute_scoped(identity, move |conn| {
                Box::pin(async move { executor::execute_mutation(conn, &plan).await })
            })
            .await
    }
}

/// Existence checks outside any caller identity.
#[derive(Clone)]
pub struct PrivilegedProbe {
    pool: PgPool,
}

impl PrivilegedProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the `privileged` upstream, or the main upstream when none
    /// is configured.
    pub async fn connect(config: &SluiceConfig) -> Result<Self, ExecError> {
        Ok(Self::new(connect_pool(config.privileged_upstream()).await?))
    }
}

#[async_trait]
impl ExistenceProbe for PrivilegedProbe {
    async fn exists(&self, plan: &QueryPlan) -> Result<bool, ExecError> {
        let mut conn = self.pool.acquire().await?;
        executor::fetch_exists(&mut conn, plan).await
    }
}
