//! Sluice query construction.
//!
//! Turns client-supplied column lists, filters, ordering and pagination into
//! parameterized Postgres statements. Nothing here touches a database: every
//! error is detected at build time, and the only client text that reaches SQL
//! is identifiers that pass [`quote_ident`].

pub mod args;
pub mod builder;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod ident;
pub mod plan;
pub mod types;

pub use args::ArgCounter;
pub use builder::{Aggregate, AggregateFn, QueryBuilder, Row};
pub use cursor::{CursorData, decode_cursor, encode_cursor};
pub use error::QueryError;
pub use filter::{Filter, Nulls, Operator, OrderBy, PredicateCompiler};
pub use ident::{quote_ident, quote_table};
pub use plan::{QueryPlan, StatementKind};
