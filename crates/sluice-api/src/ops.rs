//! Request documents handed over by the parameter parser, and the plans
//! they build.

use serde::{Deserialize, Serialize};
use sluice_core::{GuardrailsConfig, TableMeta};
use sluice_query::{
    Aggregate, Filter, OrderBy, QueryBuilder, QueryError, QueryPlan, Row, decode_cursor,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectRequest {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub aggregates: Vec<Aggregate>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Vec<OrderBy>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    /// Opaque token from a previous page's `next_cursor`.
    #[serde(default)]
    pub cursor: Option<String>,
}

impl SelectRequest {
    /// Build with the guardrail limit applied.
    pub fn to_plan(&self, meta: &TableMeta, guardrails: &GuardrailsConfig) -> Result<QueryPlan, QueryError> {
        let cursor = self.cursor.as_deref().map(decode_cursor).transpose()?;
        QueryBuilder::new(meta)
            .columns(self.columns.iter().cloned())
            .aggregates(self.aggregates.iter().cloned())
            .filters(self.filters.iter().cloned())
            .order_by(self.order.iter().cloned())
            .group_by(self.group_by.iter().cloned())
            .limit(Some(guardrails.effective_limit(self.limit)))
            .offset(self.offset)
            .cursor(cursor)
            .build_select()
    }

    /// Whether a full page may have a successor addressable by cursor.
    pub(crate) fn pageable(&self) -> bool {
        self.aggregates.is_empty() && self.group_by.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountRequest {
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl CountRequest {
    pub fn to_plan(&self, meta: &TableMeta) -> Result<QueryPlan, QueryError> {
        QueryBuilder::new(meta)
            .filters(self.filters.iter().cloned())
            .build_count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertRequest {
    pub rows: Vec<Row>,
    #[serde(default)]
    pub returning: Vec<String>,
}

impl InsertRequest {
    pub fn to_plan(&self, meta: &TableMeta) -> Result<QueryPlan, QueryError> {
        QueryBuilder::new(meta)
            .returning(self.returning.iter().cloned())
            .build_insert_many(&self.rows)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub set: Row,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub returning: Vec<String>,
}

impl UpdateRequest {
    pub fn to_plan(&self, meta: &TableMeta) -> Result<QueryPlan, QueryError> {
        QueryBuilder::new(meta)
            .filters(self.filters.iter().cloned())
            .returning(self.returning.iter().cloned())
            .build_update(&self.set)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub returning: Vec<String>,
}

impl DeleteRequest {
    pub fn to_plan(&self, meta: &TableMeta) -> Result<QueryPlan, QueryError> {
        QueryBuilder::new(meta)
            .filters(self.filters.iter().cloned())
            .returning(self.returning.iter().cloned())
            .build_delete()
    }
}

/// Existence check over the same filters as a mutation.
pub(crate) fn exists_plan(meta: &TableMeta, filters: &[Filter]) -> Result<QueryPlan, QueryError> {
    QueryBuilder::new(meta)
        .filters(filters.iter().cloned())
        .build_exists()
}

/// Any request document, tagged by `operation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum Operation {
    Select(SelectRequest),
    Count(CountRequest),
    Insert(InsertRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

impl Operation {
    pub fn to_plan(&self, meta: &TableMeta, guardrails: &GuardrailsConfig) -> Result<QueryPlan, QueryError> {
        match self {
            Operation::Select(req) => req.to_plan(meta, guardrails),
            Operation::Count(req) => req.to_plan(meta),
            Operation::Insert(req) => req.to_plan(meta),
            Operation::Update(req) => req.to_plan(meta),
            Operation::Delete(req) => req.to_plan(meta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sluice_core::TableRef;
    use sluice_query::StatementKind;

    #[test]
    fn select_limit_is_clamped() {
        let meta = TableMeta::untyped(TableRef::parse("posts"));
        let guardrails = GuardrailsConfig::default();
        let plan = SelectRequest {
            limit: Some(50_000),
            ..Default::default()
        }
        .to_plan(&meta, &guardrails)
        .unwrap();
        assert_eq!(plan.sql, "SELECT * FROM \"public\".\"posts\" LIMIT 1000");

        let plan = SelectRequest::default().to_plan(&meta, &guardrails).unwrap();
        assert!(plan.sql.ends_with("LIMIT 100"));
    }

    #[test]
    fn operation_documents() {
        let op: Operation = serde_json::from_str(
            r#"{"operation": "update",
                "set": {"title": "x", "views": 2},
                "filters": [{"column": "id", "operator": "eq", "value": 3}],
                "returning": ["id"]}"#,
        )
        .unwrap();
        let meta = TableMeta::untyped(TableRef::parse("posts"));
        let plan = op.to_plan(&meta, &GuardrailsConfig::default()).unwrap();
        assert_eq!(plan.kind, StatementKind::Update);
        assert_eq!(
            plan.sql,
            "UPDATE \"public\".\"posts\" SET \"title\" = $1, \"views\" = $2 WHERE \"id\" = $3 RETURNING \"id\""
        );
    }

    #[test]
    fn malformed_cursor_fails_before_building() {
        let meta = TableMeta::untyped(TableRef::parse("posts"));
        let err = SelectRequest {
            cursor: Some("???".into()),
            ..Default::default()
        }
        .to_plan(&meta, &GuardrailsConfig::default())
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidCursor(_)));
    }
}
