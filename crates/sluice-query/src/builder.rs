//! Statement composition.
//!
//! A [`QueryBuilder`] is created per statement and consumed by the `build_*`
//! call that produces its [`QueryPlan`]. Every clause (SET, WHERE, cursor,
//! VALUES) binds through the builder's single [`ArgCounter`].

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sluice_core::{TableMeta, Value};
use std::fmt;

use crate::args::ArgCounter;
use crate::cursor::CursorData;
use crate::error::QueryError;
use crate::filter::{Filter, OrderBy, PredicateCompiler, coerce_operand};
use crate::ident::{quote_ident, quote_table};
use crate::plan::{QueryPlan, StatementKind};

/// Column/value pairs of an insert or update payload, in client order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<(String, Value)>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column`, replacing an earlier value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.0.push((column, value)),
        }
        self
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// Deserialized by hand so key order follows the document.
impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of column values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((k, v)) = access.next_entry::<String, serde_json::Value>()? {
                    row.set(k, Value::from(v));
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    fn sql_name(&self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

/// Aggregate expression in a select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: AggregateFn,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Aggregate {
    pub fn count() -> Self {
        Self {
            function: AggregateFn::Count,
            column: None,
            alias: None,
        }
    }

    pub fn of(function: AggregateFn, column: impl Into<String>) -> Self {
        Self {
            function,
            column: Some(column.into()),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn to_sql(&self, meta: &TableMeta) -> Option<String> {
        let arg = match (&self.column, self.function) {
            (None, AggregateFn::Count) => "*".to_string(),
            (None, _) => return None,
            (Some(column), _) if !meta.has_column(column) => return None,
            (Some(column), _) => quote_ident(column)?,
        };
        let expr = format!("{}({})", self.function.sql_name(), arg);
        match &self.alias {
            Some(alias) => Some(format!("{} AS {}", expr, quote_ident(alias)?)),
            None => Some(expr),
        }
    }
}

pub struct QueryBuilder<'a> {
    meta: &'a TableMeta,
    columns: Vec<String>,
    aggregates: Vec<Aggregate>,
    filters: Vec<Filter>,
    order: Vec<OrderBy>,
    group_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    cursor: Option<CursorData>,
    returning: Vec<String>,
    args: ArgCounter,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(meta: &'a TableMeta) -> Self {
        Self {
            meta,
            columns: Vec::new(),
            aggregates: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
            cursor: None,
            returning: Vec::new(),
            args: ArgCounter::new(),
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn aggregates(mut self, aggregates: impl IntoIterator<Item = Aggregate>) -> Self {
        self.aggregates.extend(aggregates);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn order_by(mut self, order: impl IntoIterator<Item = OrderBy>) -> Self {
        self.order.extend(order);
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    pub fn cursor(mut self, cursor: Option<CursorData>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Columns for `RETURNING`; `"*"` returns every column.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn build_select(mut self) -> Result<QueryPlan, QueryError> {
        let table = self.table()?;
        let order = self.effective_order()?;

        let mut output: Vec<String> = self
            .columns
            .iter()
            .filter(|c| self.meta.has_column(c) && quote_ident(c).is_some())
            .cloned()
            .collect();
        // Ungrouped column lists also project the order columns, so the rows
        // carry the values a cursor is minted from.
        if !output.is_empty() && self.aggregates.is_empty() && self.group_by.is_empty() {
            for term in &order {
                let column = &term.column;
                if !output.contains(column) && self.meta.has_column(column) && quote_ident(column).is_some() {
                    output.push(column.clone());
                }
            }
        }

        let mut select: Vec<String> = output.iter().filter_map(|c| quote_ident(c)).collect();
        select.extend(self.aggregates.iter().filter_map(|a| a.to_sql(self.meta)));
        let wildcard = select.is_empty();
        let select = if wildcard {
            "*".to_string()
        } else {
            select.join(", ")
        };
        output.extend(self.aggregates.iter().filter_map(|a| a.alias.clone()));

        let mut sql = format!("SELECT {} FROM {}", select, table);

        let mut conditions = Vec::new();
        if let Some(predicate) = self.predicate()? {
            conditions.push(predicate);
        }
        if let Some(cursor) = self.cursor.take() {
            conditions.push(self.cursor_predicate(&cursor)?);
        }
        let filtered = !conditions.is_empty();
        if filtered {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        let group: Vec<String> = self.group_by.iter().filter_map(|c| quote_ident(c)).collect();
        if !group.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&group.join(", "));
        }

        let order_sql: Vec<String> = order.iter().filter_map(OrderBy::to_sql).collect();
        if !order_sql.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_sql.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        let mut order: Vec<OrderBy> = order.into_iter().filter(|o| o.to_sql().is_some()).collect();
        if !wildcard && !order.iter().all(|o| output.contains(&o.column)) {
            order.clear();
        }
        Ok(self.finish(StatementKind::Select, sql, filtered, false, order))
    }

    /// `COUNT(*)` over the filtered set. Ordering, grouping, paging and any
    /// cursor are ignored.
    pub fn build_count(mut self) -> Result<QueryPlan, QueryError> {
        let table = self.table()?;
        let mut sql = format!("SELECT COUNT(*) FROM {}", table);
        let predicate = self.predicate()?;
        let filtered = predicate.is_some();
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        Ok(self.finish(StatementKind::Count, sql, filtered, false, Vec::new()))
    }

    pub fn build_exists(mut self) -> Result<QueryPlan, QueryError> {
        let table = self.table()?;
        let predicate = self.predicate()?;
        let filtered = predicate.is_some();
        let sql = match predicate {
            Some(predicate) => format!("SELECT EXISTS (SELECT 1 FROM {} WHERE {})", table, predicate),
            None => format!("SELECT EXISTS (SELECT 1 FROM {})", table),
        };
        Ok(self.finish(StatementKind::Exists, sql, filtered, false, Vec::new()))
    }

    /// Single-row insert. Keys that fail quoting or are not columns of the
    /// table are skipped; an empty plan is returned when none remain.
    pub fn build_insert(self, row: &Row) -> Result<QueryPlan, QueryError> {
        self.build_insert_many(std::slice::from_ref(row))
    }

    /// Multi-row insert over the union of valid keys, in first-appearance
    /// order. Cells a row does not provide render `DEFAULT`.
    pub fn build_insert_many(mut self, rows: &[Row]) -> Result<QueryPlan, QueryError> {
        let table = self.table()?;

        let mut columns: Vec<(&str, String)> = Vec::new();
        for row in rows {
            for (name, _) in row.iter() {
                if columns.iter().any(|(c, _)| *c == name) || !self.meta.has_column(name) {
                    continue;
                }
                if let Some(quoted) = quote_ident(name) {
                    columns.push((name, quoted));
                }
            }
        }
        if columns.is_empty() {
            return Ok(QueryPlan::empty(StatementKind::Insert));
        }

        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|(name, _)| match row.get(name) {
                    Some(value) => self.bind_for_column(name, value),
                    None => "DEFAULT".to_string(),
                })
                .collect();
            tuples.push(format!("({})", cells.join(", ")));
        }

        let names: Vec<&str> = columns.iter().map(|(_, q)| q.as_str()).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            names.join(", "),
            tuples.join(", ")
        );
        let returning = self.push_returning(&mut sql);
        Ok(self.finish(StatementKind::Insert, sql, false, returning, Vec::new()))
    }

    /// `UPDATE ... SET` from `row`, restricted by the builder's filters.
    /// SET placeholders precede WHERE placeholders.
    pub fn build_update(mut self, row: &Row) -> Result<QueryPlan, QueryError> {
        let table = self.table()?;

        let mut assignments = Vec::new();
        for (name, value) in row.iter() {
            if !self.meta.has_column(name) {
                continue;
            }
            let Some(column) = quote_ident(name) else {
                continue;
            };
            let placeholder = self.bind_for_column(name, value);
            assignments.push(format!("{} = {}", column, placeholder));
        }
        if assignments.is_empty() {
            return Ok(QueryPlan::empty(StatementKind::Update));
        }

        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
        let predicate = self.predicate()?;
        let filtered = predicate.is_some();
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        let returning = self.push_returning(&mut sql);
        Ok(self.finish(StatementKind::Update, sql, filtered, returning, Vec::new()))
    }

    pub fn build_delete(mut self) -> Result<QueryPlan, QueryError> {
        let table = self.table()?;
        let mut sql = format!("DELETE FROM {}", table);
        let predicate = self.predicate()?;
        let filtered = predicate.is_some();
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        let returning = self.push_returning(&mut sql);
        Ok(self.finish(StatementKind::Delete, sql, filtered, returning, Vec::new()))
    }

    fn table(&self) -> Result<String, QueryError> {
        quote_table(&self.meta.table).ok_or_else(|| QueryError::InvalidTable(self.meta.table.to_string()))
    }

    fn predicate(&mut self) -> Result<Option<String>, QueryError> {
        let filters = std::mem::take(&mut self.filters);
        PredicateCompiler::new(self.meta).compile(&filters, &mut self.args)
    }

    fn bind_for_column(&mut self, column: &str, value: &Value) -> String {
        let data_type = self.meta.column(column).map(|c| c.data_type.as_str());
        let (value, cast) = coerce_operand(value, data_type);
        self.args.bind(value, cast.as_deref())
    }

    /// ORDER BY to render, after reconciling it with the cursor.
    fn effective_order(&self) -> Result<Vec<OrderBy>, QueryError> {
        let Some(cursor) = &self.cursor else {
            return Ok(self.order.clone());
        };
        if self.offset.is_some_and(|o| o > 0) {
            return Err(QueryError::CursorWithOffset);
        }
        if quote_ident(&cursor.column).is_none() {
            return Err(QueryError::InvalidCursor(format!(
                "invalid column '{}'",
                cursor.column
            )));
        }
        match self.order.first() {
            None => Ok(vec![OrderBy {
                column: cursor.column.clone(),
                desc: cursor.desc,
                nulls: Default::default(),
            }]),
            Some(lead) if lead.column == cursor.column && lead.desc == cursor.desc => {
                Ok(self.order.clone())
            }
            Some(lead) => Err(QueryError::CursorOrderMismatch {
                cursor_column: cursor.column.clone(),
                order_column: lead.column.clone(),
            }),
        }
    }

    fn cursor_predicate(&mut self, cursor: &CursorData) -> Result<String, QueryError> {
        let column = quote_ident(&cursor.column)
            .ok_or_else(|| QueryError::InvalidCursor(format!("invalid column '{}'", cursor.column)))?;
        let placeholder = self.bind_for_column(&cursor.column, &cursor.value);
        Ok(format!("{} {} {}", column, cursor.comparison(), placeholder))
    }

    fn push_returning(&self, sql: &mut String) -> bool {
        if self.returning.is_empty() {
            return false;
        }
        let clause = if self.returning.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            let cols: Vec<String> = self
                .returning
                .iter()
                .filter(|c| self.meta.has_column(c))
                .filter_map(|c| quote_ident(c))
                .collect();
            if cols.is_empty() {
                return false;
            }
            cols.join(", ")
        };
        sql.push_str(" RETURNING ");
        sql.push_str(&clause);
        true
    }

    fn finish(
        self,
        kind: StatementKind,
        sql: String,
        filtered: bool,
        returning: bool,
        order: Vec<OrderBy>,
    ) -> QueryPlan {
        let args = self.args.into_args();
        tracing::debug!(
            table = %self.meta.table,
            kind = kind.as_str(),
            sql = %sql,
            arg_count = args.len(),
            "built statement"
        );
        QueryPlan {
            kind,
            sql,
            args,
            filtered,
            returning,
            order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operator;
    use pretty_assertions::assert_eq;
    use sluice_core::{ColumnSpec, TableRef};

    fn posts() -> TableMeta {
        TableMeta::untyped(TableRef::parse("public.posts"))
    }

    fn typed_posts() -> TableMeta {
        TableMeta::new(
            TableRef::parse("public.posts"),
            vec![
                ColumnSpec::new("id", "bigint").primary_key(),
                ColumnSpec::new("author_id", "text"),
                ColumnSpec::new("title", "text"),
                ColumnSpec::new("views", "integer"),
                ColumnSpec::new("created_at", "timestamp with time zone"),
            ],
        )
    }

    #[test]
    fn select_star_with_filter_order_limit() {
        let meta = posts();
        let plan = QueryBuilder::new(&meta)
            .filter(Filter::eq("author_id", "u1"))
            .order_by([OrderBy::desc("created_at")])
            .limit(Some(20))
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT * FROM \"public\".\"posts\" WHERE \"author_id\" = $1 ORDER BY \"created_at\" DESC LIMIT 20"
        );
        assert_eq!(plan.args, vec![Value::from("u1")]);
        assert!(plan.filtered);
        assert_eq!(plan.sort_key(), Some(&OrderBy::desc("created_at")));
    }

    #[test]
    fn column_list_projects_order_columns() {
        let meta = typed_posts();
        let plan = QueryBuilder::new(&meta)
            .columns(["title"])
            .order_by([OrderBy::asc("id")])
            .limit(Some(2))
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT \"title\", \"id\" FROM \"public\".\"posts\" ORDER BY \"id\" ASC LIMIT 2"
        );
        assert_eq!(plan.sort_key(), Some(&OrderBy::asc("id")));

        let plan = QueryBuilder::new(&meta)
            .columns(["title", "id"])
            .order_by([OrderBy::desc("created_at"), OrderBy::asc("id")])
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT \"title\", \"id\", \"created_at\" FROM \"public\".\"posts\" ORDER BY \"created_at\" DESC, \"id\" ASC"
        );
        assert_eq!(plan.order.len(), 2);
    }

    #[test]
    fn cursor_column_is_projected() {
        let meta = typed_posts();
        let plan = QueryBuilder::new(&meta)
            .columns(["title"])
            .cursor(Some(CursorData::new("id", 42, false)))
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT \"title\", \"id\" FROM \"public\".\"posts\" WHERE \"id\" > $1::bigint ORDER BY \"id\" ASC"
        );
    }

    #[test]
    fn grouped_select_keeps_order_off_unprojected_columns() {
        let meta = typed_posts();
        let plan = QueryBuilder::new(&meta)
            .columns(["author_id"])
            .aggregate(Aggregate::count().alias("n"))
            .group_by(["author_id"])
            .order_by([OrderBy::desc("n")])
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT \"author_id\", COUNT(*) AS \"n\" FROM \"public\".\"posts\" GROUP BY \"author_id\" ORDER BY \"n\" DESC"
        );
        assert_eq!(plan.sort_key(), Some(&OrderBy::desc("n")));

        let plan = QueryBuilder::new(&meta)
            .columns(["author_id"])
            .group_by(["author_id"])
            .order_by([OrderBy::asc("title")])
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT \"author_id\" FROM \"public\".\"posts\" GROUP BY \"author_id\" ORDER BY \"title\" ASC"
        );
        assert_eq!(plan.sort_key(), None);
    }

    #[test]
    fn select_columns_filtered_to_known_and_safe() {
        let meta = typed_posts();
        let plan = QueryBuilder::new(&meta)
            .columns(["id", "title", "missing", "bad name"])
            .build_select()
            .unwrap();
        assert_eq!(plan.sql, "SELECT \"id\", \"title\" FROM \"public\".\"posts\"");
        assert!(!plan.filtered);
    }

    #[test]
    fn no_valid_columns_selects_star() {
        let meta = typed_posts();
        let plan = QueryBuilder::new(&meta).columns(["nope"]).build_select().unwrap();
        assert_eq!(plan.sql, "SELECT * FROM \"public\".\"posts\"");
    }

    #[test]
    fn aggregates_follow_columns() {
        let meta = typed_posts();
        let plan = QueryBuilder::new(&meta)
            .columns(["author_id"])
            .aggregate(Aggregate::count().alias("n"))
            .aggregate(Aggregate::of(AggregateFn::Sum, "views").alias("total"))
            .aggregate(Aggregate::of(AggregateFn::Max, "nope"))
            .aggregate(Aggregate::of(AggregateFn::Avg, "views").alias("bad alias"))
            .group_by(["author_id"])
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT \"author_id\", COUNT(*) AS \"n\", SUM(\"views\") AS \"total\" FROM \"public\".\"posts\" GROUP BY \"author_id\""
        );
    }

    #[test]
    fn cursor_appends_keyset_predicate() {
        let meta = posts();
        let plan = QueryBuilder::new(&meta)
            .filter(Filter::eq("author_id", "u1"))
            .cursor(Some(CursorData::new("id", 42, false)))
            .limit(Some(10))
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT * FROM \"public\".\"posts\" WHERE \"author_id\" = $1 AND \"id\" > $2 ORDER BY \"id\" ASC LIMIT 10"
        );
        assert_eq!(plan.args, vec![Value::from("u1"), Value::from(42)]);
    }

    #[test]
    fn typed_cursor_value_is_cast() {
        let meta = typed_posts();
        let plan = QueryBuilder::new(&meta)
            .order_by([OrderBy::desc("created_at"), OrderBy::asc("id")])
            .cursor(Some(CursorData::new("created_at", "2024-05-01T00:00:00Z", true)))
            .build_select()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT * FROM \"public\".\"posts\" WHERE \"created_at\" < $1::timestamptz ORDER BY \"created_at\" DESC, \"id\" ASC"
        );
    }

    #[test]
    fn cursor_must_match_leading_order() {
        let meta = posts();
        let err = QueryBuilder::new(&meta)
            .order_by([OrderBy::asc("title")])
            .cursor(Some(CursorData::new("id", 1, false)))
            .build_select()
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::CursorOrderMismatch {
                cursor_column: "id".into(),
                order_column: "title".into(),
            }
        );

        let err = QueryBuilder::new(&meta)
            .order_by([OrderBy::asc("id")])
            .cursor(Some(CursorData::new("id", 1, true)))
            .build_select()
            .unwrap_err();
        assert!(matches!(err, QueryError::CursorOrderMismatch { .. }));
    }

    #[test]
    fn cursor_rejects_offset_and_bad_column() {
        let meta = posts();
        let err = QueryBuilder::new(&meta)
            .offset(Some(20))
            .cursor(Some(CursorData::new("id", 1, false)))
            .build_select()
            .unwrap_err();
        assert_eq!(err, QueryError::CursorWithOffset);

        let err = QueryBuilder::new(&meta)
            .cursor(Some(CursorData::new("id;--", 1, false)))
            .build_select()
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidCursor(_)));
    }

    #[test]
    fn count_ignores_paging() {
        let meta = posts();
        let plan = QueryBuilder::new(&meta)
            .filter(Filter::new("views", Operator::Gt, 10))
            .order_by([OrderBy::asc("id")])
            .group_by(["author_id"])
            .limit(Some(5))
            .offset(Some(10))
            .build_count()
            .unwrap();
        assert_eq!(plan.sql, "SELECT COUNT(*) FROM \"public\".\"posts\" WHERE \"views\" > $1");
        assert_eq!(plan.kind, StatementKind::Count);
    }

    #[test]
    fn exists_statement() {
        let meta = posts();
        let plan = QueryBuilder::new(&meta)
            .filter(Filter::eq("id", 7))
            .build_exists()
            .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT EXISTS (SELECT 1 FROM \"public\".\"posts\" WHERE \"id\" = $1)"
        );
    }

    #[test]
    fn insert_skips_invalid_keys() {
        let meta = typed_posts();
        let row = Row::new()
            .with("title", "hello")
            .with("bad key", "x")
            .with("views", 3)
            .with("unknown", 1);
        let plan = QueryBuilder::new(&meta)
            .returning(["id"])
            .build_insert(&row)
            .unwrap();
        assert_eq!(
            plan.sql,
            "INSERT INTO \"public\".\"posts\" (\"title\", \"views\") VALUES ($1, $2::integer) RETURNING \"id\""
        );
        assert_eq!(plan.args, vec![Value::from("hello"), Value::from("3")]);
        assert!(plan.returning);
    }

    #[test]
    fn insert_without_valid_columns_is_empty() {
        let meta = typed_posts();
        let plan = QueryBuilder::new(&meta)
            .build_insert(&Row::new().with("x;y", 1))
            .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.kind, StatementKind::Insert);
    }

    #[test]
    fn insert_many_fills_defaults() {
        let meta = posts();
        let rows = vec![
            Row::new().with("title", "a"),
            Row::new().with("author_id", "u2").with("title", "b"),
        ];
        let plan = QueryBuilder::new(&meta).build_insert_many(&rows).unwrap();
        assert_eq!(
            plan.sql,
            "INSERT INTO \"public\".\"posts\" (\"title\", \"author_id\") VALUES ($1, DEFAULT), ($2, $3)"
        );
        assert_eq!(
            plan.args,
            vec![Value::from("a"), Value::from("b"), Value::from("u2")]
        );
    }

    #[test]
    fn update_set_precedes_where() {
        let meta = posts();
        let plan = QueryBuilder::new(&meta)
            .filter(Filter::eq("id", 5))
            .returning(["*"])
            .build_update(&Row::new().with("title", "new").with("views", 0))
            .unwrap();
        assert_eq!(
            plan.sql,
            "UPDATE \"public\".\"posts\" SET \"title\" = $1, \"views\" = $2 WHERE \"id\" = $3 RETURNING *"
        );
        assert_eq!(
            plan.args,
            vec![Value::from("new"), Value::from(0), Value::from(5)]
        );
        assert!(plan.filtered);
    }

    #[test]
    fn delete_without_filters_is_unfiltered() {
        let meta = posts();
        let plan = QueryBuilder::new(&meta).build_delete().unwrap();
        assert_eq!(plan.sql, "DELETE FROM \"public\".\"posts\"");
        assert!(!plan.filtered);
        assert!(!plan.returning);
    }

    #[test]
    fn invalid_table_fails() {
        let meta = TableMeta::untyped(TableRef::new("public", "posts; drop"));
        let err = QueryBuilder::new(&meta).build_delete().unwrap_err();
        assert!(matches!(err, QueryError::InvalidTable(_)));
    }

    #[test]
    fn row_keeps_document_order() {
        let row: Row = serde_json::from_str(r#"{"z": 1, "a": "x", "m": null}"#).unwrap();
        let keys: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(row.get("m"), Some(&Value::Null));
    }
}
