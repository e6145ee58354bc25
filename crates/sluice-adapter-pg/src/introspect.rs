//! Schema introspection into [`TableMeta`].
//!
//! Column types come from `format_type`, so they match what the query
//! builder expects for casts (`timestamp with time zone`, `integer[]`, ...).

use sluice_core::{ColumnSpec, ForeignKeyRef, TableMeta, TableRef};
use sqlx::{PgPool, Row};

use crate::error::ExecError;

/// Tables and views of `schemas` (all non-system schemas when empty),
/// ordered by schema and name.
pub async fn introspect_tables(pool: &PgPool, schemas: &[String]) -> Result<Vec<TableMeta>, ExecError> {
    let table_rows = sqlx::query(
        r#"
        select table_schema, table_name
        from information_schema.tables
        where table_type in ('BASE TABLE', 'VIEW')
          and table_schema not in ('pg_catalog', 'information_schema')
          and table_schema not like 'pg_toast%'
          and (cardinality($1::text[]) = 0 or table_schema = any($1::text[]))
        order by table_schema, table_name
        "#,
    )
    .bind(schemas)
    .fetch_all(pool)
    .await?;

    let mut tables = Vec::with_capacity(table_rows.len());
    for row in table_rows {
        let table = TableRef::new(
            row.try_get::<String, _>("table_schema")?,
            row.try_get::<String, _>("table_name")?,
        );
        tables.push(load_table(pool, &table).await?);
    }
    tracing::debug!(count = tables.len(), "introspected tables");
    Ok(tables)
}

/// Metadata of one table. A table with no visible columns yields an empty
/// column list.
pub async fn load_table(pool: &PgPool, table: &TableRef) -> Result<TableMeta, ExecError> {
    let col_rows = sqlx::query(
        r#"
        select a.attname as column_name,
               format_type(a.atttypid, a.atttypmod) as data_type,
               not a.attnotnull as nullable,
               pg_get_expr(d.adbin, d.adrelid) as column_default
        from pg_attribute a
        join pg_class c on c.oid = a.attrelid
        join pg_namespace n on n.oid = c.relnamespace
        left join pg_attrdef d on d.adrelid = a.attrelid and d.adnum = a.attnum
        where n.nspname = $1
          and c.relname = $2
          and a.attnum > 0
          and not a.attisdropped
        order by a.attnum
        "#,
    )
    .bind(&table.schema)
    .bind(&table.table)
    .fetch_all(pool)
    .await?;

    let pk_rows = sqlx::query(
        r#"
        select kcu.column_name
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on tc.constraint_name = kcu.constraint_name
         and tc.table_schema = kcu.table_schema
        where tc.constraint_type = 'PRIMARY KEY'
          and tc.table_schema = $1
          and tc.table_name = $2
        order by kcu.ordinal_position
        "#,
    )
    .bind(&table.schema)
    .bind(&table.table)
    .fetch_all(pool)
    .await?;
    let primary_key = pk_rows
        .into_iter()
        .map(|r| r.try_get::<String, _>("column_name"))
        .collect::<Result<Vec<_>, _>>()?;

    let fk_rows = sqlx::query(
        r#"
        select
          kcu.column_name as column_name,
          ccu.table_schema as foreign_table_schema,
          ccu.table_name as foreign_table_name,
          ccu.column_name as foreign_column_name
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on tc.constraint_name = kcu.constraint_name
         and tc.table_schema = kcu.table_schema
        join information_schema.constraint_column_usage ccu
          on ccu.constraint_name = tc.constraint_name
         and ccu.table_schema = tc.table_schema
        where tc.constraint_type = 'FOREIGN KEY'
          and tc.table_schema = $1
          and tc.table_name = $2
        order by tc.constraint_name, kcu.ordinal_position
        "#,
    )
    .bind(&table.schema)
    .bind(&table.table)
    .fetch_all(pool)
    .await?;
    let mut foreign_keys: Vec<(String, ForeignKeyRef)> = Vec::with_capacity(fk_rows.len());
    for fk in fk_rows {
        foreign_keys.push((
            fk.try_get("column_name")?,
            ForeignKeyRef {
                schema: fk.try_get("foreign_table_schema")?,
                table: fk.try_get("foreign_table_name")?,
                column: fk.try_get("foreign_column_name")?,
            },
        ));
    }

    let mut columns = Vec::with_capacity(col_rows.len());
    for c in col_rows {
        let name: String = c.try_get("column_name")?;
        let mut spec = ColumnSpec::new(name, c.try_get::<String, _>("data_type")?);
        spec.nullable = c.try_get("nullable")?;
        spec.default = c.try_get("column_default")?;
        spec.is_primary_key = primary_key.contains(&spec.name);
        // Composite keys keep the first target per column.
        if let Some((_, target)) = foreign_keys.iter().find(|(col, _)| *col == spec.name) {
            spec.foreign_target = Some(target.clone());
        }
        columns.push(spec);
    }

    Ok(TableMeta::new(table.clone(), columns))
}
