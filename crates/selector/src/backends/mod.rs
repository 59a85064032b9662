//! Statement executors.
//!
//! The compiler only depends on [`crate::core::StatementExecutor`]. The
//! executors here are reference implementations over concrete stores.

#[cfg(feature = "sqlite")]
pub mod sqlite;
