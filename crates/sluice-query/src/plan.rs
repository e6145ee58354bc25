//! Built statements.

use serde::Serialize;
use sluice_core::Value;

use crate::filter::OrderBy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Count,
    Exists,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Count => "count",
            Self::Exists => "exists",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// SQL text plus its positional arguments. `args[i]` binds to `$(i + 1)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub kind: StatementKind,
    pub sql: String,
    pub args: Vec<Value>,
    /// Whether a WHERE clause was emitted.
    pub filtered: bool,
    /// Whether the statement carries a RETURNING clause.
    pub returning: bool,
    /// ORDER BY of a select. Kept only when every term names an output
    /// column, so it can be re-applied over the result rows.
    pub order: Vec<OrderBy>,
}

impl QueryPlan {
    /// Plan for a mutation with nothing to do, e.g. an update whose payload
    /// names no valid column. Executors skip it.
    pub fn empty(kind: StatementKind) -> Self {
        Self {
            kind,
            sql: String::new(),
            args: Vec::new(),
            filtered: false,
            returning: false,
            order: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Leading ORDER BY term, used to mint next-page cursors.
    pub fn sort_key(&self) -> Option<&OrderBy> {
        self.order.first()
    }

    /// `ORDER BY` over the output columns, each qualified with `alias`.
    pub fn order_clause(&self, alias: &str) -> Option<String> {
        let terms: Vec<String> = self
            .order
            .iter()
            .filter_map(OrderBy::to_sql)
            .map(|term| format!("{}.{}", alias, term))
            .collect();
        if terms.is_empty() {
            return None;
        }
        Some(format!("ORDER BY {}", terms.join(", ")))
    }
}
