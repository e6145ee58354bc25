//! Binding [`Value`]s to Postgres parameters.
//!
//! Scalars bind by variant. Lists bind as a typed array when every non-null
//! element agrees on a type, and as `text[]` otherwise. Placeholders that
//! carry a cast already received text from the query builder.

use sluice_core::Value;
use sqlx::Arguments;
use sqlx::postgres::PgArguments;

use crate::error::ExecError;

fn args_add<T>(args: &mut PgArguments, v: T) -> Result<(), ExecError>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v).map_err(|e| ExecError::Internal(anyhow::anyhow!(e)))
}

pub fn to_arguments(values: &[Value]) -> Result<PgArguments, ExecError> {
    let mut args = PgArguments::default();
    for value in values {
        add_value(&mut args, value)?;
    }
    Ok(args)
}

fn add_value(args: &mut PgArguments, value: &Value) -> Result<(), ExecError> {
    match value {
        Value::Null => args_add(args, Option::<String>::None),
        Value::Bool(b) => args_add(args, *b),
        Value::Int(n) => args_add(args, *n),
        Value::Float(f) => args_add(args, *f),
        Value::String(s) => args_add(args, s.clone()),
        Value::List(items) => add_list(args, items),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ListKind {
    Bool,
    Int,
    Float,
    Text,
}

fn list_kind(items: &[Value]) -> ListKind {
    let mut kind: Option<ListKind> = None;
    for item in items {
        let next = match item {
            Value::Null => continue,
            Value::Bool(_) => ListKind::Bool,
            Value::Int(_) => ListKind::Int,
            Value::Float(_) => ListKind::Float,
            Value::String(_) | Value::List(_) => return ListKind::Text,
        };
        kind = Some(match (kind, next) {
            (None, next) => next,
            (Some(ListKind::Int), ListKind::Float) | (Some(ListKind::Float), ListKind::Int) => {
                ListKind::Float
            }
            (Some(current), next) if current == next => current,
            _ => return ListKind::Text,
        });
    }
    kind.unwrap_or(ListKind::Text)
}

fn add_list(args: &mut PgArguments, items: &[Value]) -> Result<(), ExecError> {
    match list_kind(items) {
        ListKind::Bool => args_add(
            args,
            items
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<Option<bool>>>(),
        ),
        ListKind::Int => args_add(
            args,
            items
                .iter()
                .map(|v| match v {
                    Value::Int(n) => Some(*n),
                    _ => None,
                })
                .collect::<Vec<Option<i64>>>(),
        ),
        ListKind::Float => args_add(
            args,
            items
                .iter()
                .map(|v| match v {
                    Value::Int(n) => Some(*n as f64),
                    Value::Float(f) => Some(*f),
                    _ => None,
                })
                .collect::<Vec<Option<f64>>>(),
        ),
        ListKind::Text => args_add(
            args,
            items.iter().map(Value::to_text).collect::<Vec<Option<String>>>(),
        ),
    }
}
