//! `sluice explain`: compile a request document offline.

use anyhow::{Context, Result};
use sluice_api::Operation;
use sluice_core::{GuardrailsConfig, SluiceConfig, TableMeta, TableRef};
use sluice_query::QueryPlan;
use std::fs;
use std::path::Path;

pub fn run(table: &str, request: &Path, meta: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let request = fs::read_to_string(request)
        .with_context(|| format!("Failed to read request document {}", request.display()))?;
    let meta = meta
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read table metadata {}", path.display()))
        })
        .transpose()?;
    let guardrails = match config {
        Some(path) => SluiceConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?
            .guardrails,
        None => GuardrailsConfig::default(),
    };

    let plan = explain(table, &request, meta.as_deref(), &guardrails)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Build the plan for one request document against `table`.
pub fn explain(table: &str, request: &str, meta: Option<&str>, guardrails: &GuardrailsConfig) -> Result<QueryPlan> {
    let table = TableRef::parse(table);
    let meta = match meta {
        Some(json) => select_meta(&table, json)?,
        None => TableMeta::untyped(table),
    };
    let op: Operation = serde_json::from_str(request).context("Invalid request document")?;
    let plan = op.to_plan(&meta, guardrails)?;
    tracing::debug!(table = %meta.table, kind = plan.kind.as_str(), "explained request");
    Ok(plan)
}

/// Accepts either a single table's metadata or the array `introspect` prints.
fn select_meta(table: &TableRef, json: &str) -> Result<TableMeta> {
    let value: serde_json::Value = serde_json::from_str(json).context("Invalid table metadata")?;
    if value.is_array() {
        let tables: Vec<TableMeta> = serde_json::from_value(value).context("Invalid table metadata")?;
        return tables
            .into_iter()
            .find(|m| &m.table == table)
            .with_context(|| format!("No metadata for table {}", table));
    }
    let meta: TableMeta = serde_json::from_value(value).context("Invalid table metadata")?;
    anyhow::ensure!(&meta.table == table, "Metadata describes {}, not {}", meta.table, table);
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sluice_core::{ColumnSpec, Value};
    use sluice_query::StatementKind;

    #[test]
    fn select_document_compiles() {
        let request = r#"{
            "operation": "select",
            "filters": [{"column": "author_id", "operator": "eq", "value": "u1"}],
            "order": [{"column": "created_at", "desc": true}],
            "limit": 20
        }"#;
        let plan = explain("posts", request, None, &GuardrailsConfig::default()).unwrap();
        assert_eq!(plan.kind, StatementKind::Select);
        assert_eq!(
            plan.sql,
            r#"SELECT * FROM "public"."posts" WHERE "author_id" = $1 ORDER BY "created_at" DESC LIMIT 20"#
        );
        assert_eq!(plan.args, vec![Value::from("u1")]);
    }

    #[test]
    fn introspected_metadata_adds_casts() {
        let meta = vec![TableMeta {
            table: TableRef::new("public", "posts"),
            columns: vec![ColumnSpec::new("id", "integer").primary_key()],
        }];
        let meta = serde_json::to_string(&meta).unwrap();
        let request = r#"{"operation": "delete", "filters": [{"column": "id", "operator": "eq", "value": 3}]}"#;
        let plan = explain("public.posts", request, Some(&meta), &GuardrailsConfig::default()).unwrap();
        assert_eq!(plan.sql, r#"DELETE FROM "public"."posts" WHERE "id" = $1::integer"#);
        assert_eq!(plan.args, vec![Value::from("3")]);
    }

    #[test]
    fn metadata_for_another_table_is_refused() {
        let meta = serde_json::to_string(&TableMeta::untyped(TableRef::new("public", "users"))).unwrap();
        let request = r#"{"operation": "count"}"#;
        assert!(explain("posts", request, Some(&meta), &GuardrailsConfig::default()).is_err());
    }

    #[test]
    fn unknown_operation_is_an_error() {
        let err = explain("posts", r#"{"operation": "truncate"}"#, None, &GuardrailsConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("Invalid request document"));
    }
}
