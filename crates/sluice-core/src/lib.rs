//! # sluice-core
//!
//! Shared data model for the sluice data API engine.
//!
//! Everything in here is a plain value type: table references and column
//! metadata (owned by the schema cache and read-only to the engine), the
//! caller identity attached by authentication middleware, and the typed
//! [`Value`] that replaces untyped client filter values.
//!
//! Configuration lives in [`config`] and is loaded from a single YAML file.

pub mod config;
pub mod identity;
pub mod table;
pub mod value;

pub use config::{
    AuditConfig, AuditOutput, ConfigError, ConnectionPoolConfig, GuardrailsConfig,
    SessionConfig, SluiceConfig, SslMode, UpstreamConfig,
};
pub use identity::Identity;
pub use table::{ColumnSpec, ForeignKeyRef, TableMeta, TableRef};
pub use value::Value;
