//! Sub-command implementations for the `sluice` binary.

pub mod check;
pub mod explain;
pub mod introspect;
