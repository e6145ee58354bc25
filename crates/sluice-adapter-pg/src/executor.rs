//! RLS-scoped execution.
//!
//! Every statement runs inside a transaction whose first statement writes the
//! caller's role, user id and claims into transaction-local settings. Row
//! level policies read them back with `current_setting(...)`.

use futures::future::BoxFuture;
use sluice_core::{ConnectionPoolConfig, Identity, SessionConfig, UpstreamConfig};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Row};
use std::time::Duration;

use crate::bind::to_arguments;
use crate::error::ExecError;
use sluice_query::QueryPlan;

/// Build a pool for `upstream`.
pub async fn connect_pool(upstream: &UpstreamConfig) -> Result<PgPool, ExecError> {
    pool_options(&upstream.pool)
        .connect(&upstream.connection_string())
        .await
        .map_err(|e| ExecError::Connect(e.to_string()))
}

fn pool_options(pool: &ConnectionPoolConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(pool.min_connections)
        .max_connections(pool.max_connections)
        .acquire_timeout(Duration::from_secs(pool.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(pool.idle_timeout_seconds))
}

#[derive(Clone)]
pub struct RlsExecutor {
    pool: PgPool,
    session: SessionConfig,
}

impl RlsExecutor {
    pub fn new(pool: PgPool, session: SessionConfig) -> Self {
        Self { pool, session }
    }

    pub async fn connect(upstream: &UpstreamConfig, session: SessionConfig) -> Result<Self, ExecError> {
        Ok(Self::new(connect_pool(upstream).await?, session))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Run `f` inside a transaction scoped to `identity`.
    ///
    /// Commits when `f` returns `Ok` and rolls back when it returns `Err`.
    /// If the future is dropped or `f` panics, the transaction is dropped
    /// unfinished and the driver rolls it back before the connection is
    /// reused.
    pub async fn execute_scoped<T, F>(&self, identity: &Identity, f: F) -> Result<T, ExecError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, ExecError>> + Send,
    {
        let mut tx = self.pool.begin().await?;
        apply_identity(&mut *tx, &self.session, identity).await?;

        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Write the caller's identity into transaction-local settings.
pub async fn apply_identity(
    conn: &mut PgConnection,
    session: &SessionConfig,
    identity: &Identity,
) -> Result<(), ExecError> {
    sqlx::query("SELECT set_config($1, $2, true), set_config($3, $4, true), set_config($5, $6, true)")
        .bind(&session.role_setting)
        .bind(&identity.role)
        .bind(&session.user_id_setting)
        .bind(identity.user_id.as_deref().unwrap_or(""))
        .bind(&session.claims_setting)
        .bind(identity.claims_json())
        .execute(&mut *conn)
        .await?;
    tracing::trace!(role = %identity.role, "session identity applied");
    Ok(())
}

/// Wrap a select so each row comes back as one JSON object. The plan's
/// ordering is repeated on the outer query, since a subquery's order is not
/// carried through.
fn rows_sql(plan: &QueryPlan) -> String {
    match plan.order_clause("t") {
        Some(order) => format!("SELECT to_jsonb(t) AS row FROM ({}) AS t {}", plan.sql, order),
        None => format!("SELECT to_jsonb(t) AS row FROM ({}) AS t", plan.sql),
    }
}

/// Result rows of `plan`, one JSON object per row.
pub async fn fetch_rows(conn: &mut PgConnection, plan: &QueryPlan) -> Result<Vec<serde_json::Value>, ExecError> {
    let sql = rows_sql(plan);
    let recs = sqlx::query_with(&sql, to_arguments(&plan.args)?)
        .fetch_all(&mut *conn)
        .await?;
    recs.into_iter()
        .map(|r| r.try_get::<serde_json::Value, _>("row").map_err(ExecError::from))
        .collect()
}

/// Single `bigint` produced by a count plan.
pub async fn fetch_count(conn: &mut PgConnection, plan: &QueryPlan) -> Result<u64, ExecError> {
    let count: i64 = sqlx::query_scalar_with(&plan.sql, to_arguments(&plan.args)?)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count.max(0) as u64)
}

pub async fn fetch_exists(conn: &mut PgConnection, plan: &QueryPlan) -> Result<bool, ExecError> {
    let exists: bool = sqlx::query_scalar_with(&plan.sql, to_arguments(&plan.args)?)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Outcome of an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResult {
    pub rows_affected: u64,
    /// Rows from the RETURNING clause, empty without one.
    pub rows: Vec<serde_json::Value>,
}

pub async fn execute_mutation(conn: &mut PgConnection, plan: &QueryPlan) -> Result<MutationResult, ExecError> {
    let args = to_arguments(&plan.args)?;
    if plan.returning {
        let sql = format!("WITH m AS ({}) SELECT to_jsonb(m) AS row FROM m", plan.sql);
        let recs = sqlx::query_with(&sql, args).fetch_all(&mut *conn).await?;
        let rows = recs
            .into_iter()
            .map(|r| r.try_get::<serde_json::Value, _>("row"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MutationResult {
            rows_affected: rows.len() as u64,
            rows,
        })
    } else {
        let done = sqlx::query_with(&plan.sql, args).execute(&mut *conn).await?;
        Ok(MutationResult {
            rows_affected: done.rows_affected(),
            rows: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{TableMeta, TableRef};
    use sluice_query::{OrderBy, QueryBuilder};

    #[test]
    fn pool_options_follow_config() {
        let config = ConnectionPoolConfig {
            min_connections: 2,
            max_connections: 7,
            acquire_timeout_seconds: 3,
            idle_timeout_seconds: 60,
        };
        let options = pool_options(&config);
        assert_eq!(options.get_min_connections(), 2);
        assert_eq!(options.get_max_connections(), 7);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(3));
        assert_eq!(options.get_idle_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn row_wrapper_repeats_ordering() {
        let meta = TableMeta::untyped(TableRef::parse("public.posts"));
        let plan = QueryBuilder::new(&meta)
            .columns(["title"])
            .order_by([OrderBy::desc("created_at"), OrderBy::asc("id")])
            .limit(Some(5))
            .build_select()
            .unwrap();
        assert_eq!(
            rows_sql(&plan),
            "SELECT to_jsonb(t) AS row FROM (SELECT \"title\", \"created_at\", \"id\" FROM \"public\".\"posts\" \
             ORDER BY \"created_at\" DESC, \"id\" ASC LIMIT 5) AS t ORDER BY t.\"created_at\" DESC, t.\"id\" ASC"
        );

        let unordered = QueryBuilder::new(&meta).build_select().unwrap();
        assert_eq!(
            rows_sql(&unordered),
            "SELECT to_jsonb(t) AS row FROM (SELECT * FROM \"public\".\"posts\") AS t"
        );
    }
}
