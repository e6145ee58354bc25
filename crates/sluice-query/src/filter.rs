//! Client filters and their compilation into a WHERE expression.

use serde::{Deserialize, Serialize};
use sluice_core::{TableMeta, Value};
use std::str::FromStr;

use crate::args::ArgCounter;
use crate::error::QueryError;
use crate::ident::quote_ident;
use crate::types::{array_cast_for, cast_for, is_json};

/// Group key of filters flagged `is_or` without an explicit group id.
pub const LEGACY_OR_GROUP: i64 = -1;

/// Comparison operators a client filter may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    #[serde(rename = "neq", alias = "not_eq")]
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    Is,
    In,
    #[serde(rename = "cs", alias = "contains")]
    Contains,
    #[serde(rename = "cd", alias = "contained_by")]
    ContainedBy,
    #[serde(rename = "ov", alias = "overlap")]
    Overlap,
}

impl Operator {
    /// SQL infix for binary operators. `In` and `Is` render specially.
    fn infix(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::Contains => "@>",
            Operator::ContainedBy => "<@",
            Operator::Overlap => "&&",
            Operator::In => "= ANY",
            Operator::Is => "IS",
        }
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    /// Accepts both the long names and the short query-string forms
    /// (`eq`, `neq`, `cs`, `cd`, `ov`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "eq" => Operator::Eq,
            "neq" | "not_eq" | "noteq" => Operator::NotEq,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "like" => Operator::Like,
            "ilike" => Operator::ILike,
            "is" => Operator::Is,
            "in" => Operator::In,
            "cs" | "contains" => Operator::Contains,
            "cd" | "contained_by" | "containedby" => Operator::ContainedBy,
            "ov" | "overlap" => Operator::Overlap,
            _ => return Err(QueryError::UnknownOperator(s.to_string())),
        })
    }
}

/// One client-supplied condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    /// Legacy flag: member of the single implicit OR group.
    #[serde(default)]
    pub is_or: bool,
    /// Positive ids group filters into explicit OR groups.
    #[serde(default)]
    pub or_group_id: i64,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
            is_or: false,
            or_group_id: 0,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Eq, value)
    }

    /// Place this filter in explicit OR group `id` (must be positive).
    pub fn in_group(mut self, id: i64) -> Self {
        self.or_group_id = id;
        self
    }

    /// Place this filter in the legacy implicit OR group.
    pub fn or(mut self) -> Self {
        self.is_or = true;
        self
    }

    /// `None` for top-level AND filters.
    pub fn group_key(&self) -> Option<i64> {
        if self.or_group_id > 0 {
            Some(self.or_group_id)
        } else if self.is_or {
            Some(LEGACY_OR_GROUP)
        } else {
            None
        }
    }
}

/// Direction of NULLs in an ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nulls {
    #[default]
    None,
    First,
    Last,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub desc: bool,
    #[serde(default)]
    pub nulls: Nulls,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: false,
            nulls: Nulls::None,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: true,
            nulls: Nulls::None,
        }
    }

    pub fn nulls(mut self, nulls: Nulls) -> Self {
        self.nulls = nulls;
        self
    }

    /// Rendered term, or `None` if the column fails quoting.
    pub(crate) fn to_sql(&self) -> Option<String> {
        let column = quote_ident(&self.column)?;
        let dir = if self.desc { "DESC" } else { "ASC" };
        Some(match self.nulls {
            Nulls::None => format!("{} {}", column, dir),
            Nulls::First => format!("{} {} NULLS FIRST", column, dir),
            Nulls::Last => format!("{} {} NULLS LAST", column, dir),
        })
    }
}

/// Compiles filter lists into a boolean SQL expression, binding operands
/// through the statement's shared [`ArgCounter`].
pub struct PredicateCompiler<'a> {
    meta: &'a TableMeta,
}

enum Slot {
    Single(String),
    Group(i64),
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(meta: &'a TableMeta) -> Self {
        Self { meta }
    }

    /// Compile `filters` into an AND-joined expression. Returns `None` when
    /// no filter survives, in which case the caller omits `WHERE`.
    ///
    /// OR groups render at the position of their first member, so the output
    /// is deterministic for a given filter order.
    pub fn compile(
        &self,
        filters: &[Filter],
        args: &mut ArgCounter,
    ) -> Result<Option<String>, QueryError> {
        let mut slots: Vec<Slot> = Vec::new();
        let mut groups: Vec<(i64, Vec<String>)> = Vec::new();

        for filter in filters {
            let Some(fragment) = self.compile_one(filter, args)? else {
                tracing::debug!(column = %filter.column, "dropping filter on invalid identifier");
                continue;
            };
            match filter.group_key() {
                None => slots.push(Slot::Single(fragment)),
                Some(key) => match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, members)) => members.push(fragment),
                    None => {
                        groups.push((key, vec![fragment]));
                        slots.push(Slot::Group(key));
                    }
                },
            }
        }

        let parts: Vec<String> = slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Single(fragment) => Some(fragment),
                Slot::Group(key) => {
                    let (_, members) = groups.iter().find(|(k, _)| *k == key)?;
                    Some(if members.len() == 1 {
                        members[0].clone()
                    } else {
                        format!("({})", members.join(" OR "))
                    })
                }
            })
            .collect();

        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(parts.join(" AND ")))
        }
    }

    /// Compile one filter. `Ok(None)` means the column failed quoting and the
    /// filter is dropped without consuming a placeholder.
    fn compile_one(
        &self,
        filter: &Filter,
        args: &mut ArgCounter,
    ) -> Result<Option<String>, QueryError> {
        let Some(column) = quote_ident(&filter.column) else {
            return Ok(None);
        };

        if filter.operator == Operator::Is {
            return is_predicate(&column, filter).map(Some);
        }

        let data_type = self.meta.column(&filter.column).map(|c| c.data_type.as_str());
        let fragment = match filter.operator {
            Operator::In => {
                let list = match &filter.value {
                    Value::List(_) => filter.value.clone(),
                    single => Value::List(vec![single.clone()]),
                };
                let cast = data_type.and_then(array_cast_for);
                let placeholder = args.bind(list, cast.as_deref());
                format!("{} = ANY({})", column, placeholder)
            }
            Operator::Like | Operator::ILike => {
                let placeholder = args.bind(filter.value.clone(), None);
                format!("{} {} {}", column, filter.operator.infix(), placeholder)
            }
            _ => {
                let (value, cast) = coerce_operand(&filter.value, data_type);
                let placeholder = args.bind(value, cast.as_deref());
                format!("{} {} {}", column, filter.operator.infix(), placeholder)
            }
        };
        Ok(Some(fragment))
    }
}

/// Value and cast to bind for a column of the given type.
///
/// JSON columns receive the JSON text of the operand so that lists and
/// scalars keep their JSON shape after the `::jsonb` cast.
pub(crate) fn coerce_operand(value: &Value, data_type: Option<&str>) -> (Value, Option<String>) {
    match data_type {
        Some(ty) if is_json(ty) => {
            let text = match value {
                Value::Null => Value::Null,
                Value::String(s) if serde_json::from_str::<serde_json::Value>(s).is_ok() => {
                    Value::String(s.clone())
                }
                other => Value::String(other.to_json().to_string()),
            };
            (text, cast_for(ty))
        }
        Some(ty) => (value.clone(), cast_for(ty)),
        None => (value.clone(), None),
    }
}

fn is_predicate(column: &str, filter: &Filter) -> Result<String, QueryError> {
    let keyword = match &filter.value {
        Value::Null => "NULL",
        Value::Bool(true) => "TRUE",
        Value::Bool(false) => "FALSE",
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "null" => "NULL",
            "not_null" | "not null" => "NOT NULL",
            "true" => "TRUE",
            "false" => "FALSE",
            "unknown" => "UNKNOWN",
            _ => {
                return Err(QueryError::InvalidFilter {
                    column: filter.column.clone(),
                    reason: format!("'is' does not accept '{}'", s),
                });
            }
        },
        other => {
            return Err(QueryError::InvalidFilter {
                column: filter.column.clone(),
                reason: format!("'is' does not accept {:?}", other),
            });
        }
    };
    Ok(format!("{} IS {}", column, keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sluice_core::{ColumnSpec, TableRef};

    fn untyped() -> TableMeta {
        TableMeta::untyped(TableRef::parse("public.posts"))
    }

    fn compile(meta: &TableMeta, filters: &[Filter]) -> (Option<String>, Vec<Value>) {
        let mut args = ArgCounter::new();
        let sql = PredicateCompiler::new(meta).compile(filters, &mut args).unwrap();
        (sql, args.into_args())
    }

    #[test]
    fn operator_table() {
        let meta = untyped();
        let cases = [
            (Operator::Eq, "\"c\" = $1"),
            (Operator::NotEq, "\"c\" <> $1"),
            (Operator::Gt, "\"c\" > $1"),
            (Operator::Gte, "\"c\" >= $1"),
            (Operator::Lt, "\"c\" < $1"),
            (Operator::Lte, "\"c\" <= $1"),
            (Operator::Like, "\"c\" LIKE $1"),
            (Operator::ILike, "\"c\" ILIKE $1"),
            (Operator::In, "\"c\" = ANY($1)"),
            (Operator::Contains, "\"c\" @> $1"),
            (Operator::ContainedBy, "\"c\" <@ $1"),
            (Operator::Overlap, "\"c\" && $1"),
        ];
        for (op, expected) in cases {
            let (sql, args) = compile(&meta, &[Filter::new("c", op, 1)]);
            assert_eq!(sql.as_deref(), Some(expected));
            assert_eq!(args.len(), 1);
        }
    }

    #[test]
    fn or_grouping() {
        let filters = [
            Filter::eq("a", 1).in_group(1),
            Filter::eq("a", 2).in_group(1),
            Filter::eq("b", 3),
        ];
        let (sql, args) = compile(&untyped(), &filters);
        assert_eq!(sql.as_deref(), Some("(\"a\" = $1 OR \"a\" = $2) AND \"b\" = $3"));
        assert_eq!(args, vec![Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[test]
    fn groups_render_at_first_member_position() {
        let filters = [
            Filter::eq("x", 0),
            Filter::eq("a", 1).in_group(2),
            Filter::eq("b", 2).in_group(7),
            Filter::eq("a", 3).in_group(2),
            Filter::eq("c", 4).or(),
            Filter::eq("d", 5).or(),
        ];
        let (sql, _) = compile(&untyped(), &filters);
        assert_eq!(
            sql.as_deref(),
            Some("\"x\" = $1 AND (\"a\" = $2 OR \"a\" = $4) AND \"b\" = $3 AND (\"c\" = $5 OR \"d\" = $6)")
        );
    }

    #[test]
    fn invalid_identifier_drops_filter_without_placeholder() {
        let filters = [
            Filter::eq("ok", 1),
            Filter::eq("bad;drop", 2),
            Filter::eq("also_ok", 3),
        ];
        let (sql, args) = compile(&untyped(), &filters);
        assert_eq!(sql.as_deref(), Some("\"ok\" = $1 AND \"also_ok\" = $2"));
        assert_eq!(args, vec![Value::from(1), Value::from(3)]);
    }

    #[test]
    fn empty_filter_list() {
        let (sql, args) = compile(&untyped(), &[]);
        assert_eq!(sql, None);
        assert!(args.is_empty());
    }

    #[test]
    fn is_operator_uses_no_placeholder() {
        let filters = [
            Filter::new("deleted_at", Operator::Is, Value::Null),
            Filter::new("archived", Operator::Is, "null"),
            Filter::new("flag", Operator::Is, true),
            Filter::new("reviewed_at", Operator::Is, "not_null"),
            Filter::eq("id", 9),
        ];
        let (sql, args) = compile(&untyped(), &filters);
        assert_eq!(
            sql.as_deref(),
            Some("\"deleted_at\" IS NULL AND \"archived\" IS NULL AND \"flag\" IS TRUE AND \"reviewed_at\" IS NOT NULL AND \"id\" = $1")
        );
        assert_eq!(args, vec![Value::from(9)]);
    }

    #[test]
    fn is_operator_rejects_free_text() {
        let mut args = ArgCounter::new();
        let err = PredicateCompiler::new(&untyped())
            .compile(&[Filter::new("c", Operator::Is, "1; drop table x")], &mut args)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter { .. }));
    }

    #[test]
    fn typed_columns_get_casts() {
        let meta = TableMeta::new(
            TableRef::parse("posts"),
            vec![
                ColumnSpec::new("id", "bigint"),
                ColumnSpec::new("author_id", "uuid"),
                ColumnSpec::new("title", "text"),
                ColumnSpec::new("tags", "text[]"),
                ColumnSpec::new("meta", "jsonb"),
            ],
        );
        let filters = [
            Filter::new("id", Operator::In, vec![1, 2]),
            Filter::eq("author_id", "5f0c"),
            Filter::new("title", Operator::ILike, "%rust%"),
            Filter::new("tags", Operator::Contains, vec!["a"]),
            Filter::new("meta", Operator::Contains, Value::from(serde_json::json!({"k": 1}))),
        ];
        let (sql, args) = compile(&meta, &filters);
        assert_eq!(
            sql.as_deref(),
            Some("\"id\" = ANY($1::bigint[]) AND \"author_id\" = $2::uuid AND \"title\" ILIKE $3 AND \"tags\" @> $4 AND \"meta\" @> $5::jsonb")
        );
        assert_eq!(args[4], Value::from(r#"{"k":1}"#));
    }

    #[test]
    fn in_wraps_scalars() {
        let (sql, args) = compile(&untyped(), &[Filter::new("id", Operator::In, 5)]);
        assert_eq!(sql.as_deref(), Some("\"id\" = ANY($1)"));
        assert_eq!(args, vec![Value::List(vec![Value::from(5)])]);
    }

    #[test]
    fn operator_names() {
        assert_eq!("neq".parse::<Operator>().unwrap(), Operator::NotEq);
        assert_eq!("cs".parse::<Operator>().unwrap(), Operator::Contains);
        assert_eq!("ILIKE".parse::<Operator>().unwrap(), Operator::ILike);
        assert!(matches!(
            "regex".parse::<Operator>(),
            Err(QueryError::UnknownOperator(_))
        ));
    }

    #[test]
    fn filters_deserialize_from_short_names() {
        let filters: Vec<Filter> = serde_json::from_str(
            r#"[{"column": "a", "operator": "neq", "value": 1},
                {"column": "b", "operator": "ilike", "value": "%x%", "or_group_id": 2},
                {"column": "c", "operator": "contains", "value": ["t"]}]"#,
        )
        .unwrap();
        assert_eq!(filters[0].operator, Operator::NotEq);
        assert_eq!(filters[1].operator, Operator::ILike);
        assert_eq!(filters[1].group_key(), Some(2));
        assert_eq!(filters[2].operator, Operator::Contains);
        assert_eq!(filters[2].value, Value::from(vec!["t"]));
    }

    #[test]
    fn object_operand_from_request_reaches_jsonb_containment() {
        let meta = TableMeta::new(TableRef::parse("posts"), vec![ColumnSpec::new("meta", "jsonb")]);
        let filters: Vec<Filter> =
            serde_json::from_str(r#"[{"column":"meta","operator":"cs","value":{"k":1}}]"#).unwrap();
        assert_eq!(filters[0].value, Value::from(r#"{"k":1}"#));

        let (sql, args) = compile(&meta, &filters);
        assert_eq!(sql.as_deref(), Some("\"meta\" @> $1::jsonb"));
        assert_eq!(args, vec![Value::from(r#"{"k":1}"#)]);
    }

    #[test]
    fn order_by_rendering() {
        assert_eq!(OrderBy::asc("a").to_sql().as_deref(), Some("\"a\" ASC"));
        assert_eq!(
            OrderBy::desc("b").nulls(Nulls::Last).to_sql().as_deref(),
            Some("\"b\" DESC NULLS LAST")
        );
        assert_eq!(OrderBy::asc("bad col").to_sql(), None);
    }
}
