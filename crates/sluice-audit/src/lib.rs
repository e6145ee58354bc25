//! # sluice-audit
//!
//! Audit trail for the data API.
//!
//! Events are written when the engine reaches an outcome that an operator
//! must be able to reconstruct later. Denials and unclassified database
//! failures are recorded, and so is every mutation that touched rows.
//! Denial records are written before the response; the others are best
//! effort.
//!
//! - **File output**: JSON Lines (one event per line)
//! - **Console output**: JSON Lines on stdout
//! - **None**: events are discarded
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `PolicyViolation` | Mutation matched no visible row, but the row exists |
//! | `AuthenticationRequired` | Anonymous caller attempted a scoped operation |
//! | `MutationApplied` | Mutation affected at least one row |
//! | `QueryFailed` | Statement failed with an unclassified database error |

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::{AuditFilter, AuditLogger};
pub use storage::{
    AuditStorage, ConsoleStorage, FileStorage, MemoryStorage, NullStorage, create_storage,
};
