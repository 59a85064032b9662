//! Collaborator contracts.
//!
//! The compiler depends on these traits rather than on concrete services:
//!
//! - [`StatementExecutor`] - runs rendered statements
//! - [`IdentityProvider`] - roles of the acting identity
//! - [`PaginationContext`] - current page number
//! - [`ApiBindings`] - fallback values for unknown field names

mod context;
mod executor;

pub use context::{
    AccessIdentity, ApiBindings, IdentityProvider, NoBindings, PaginationContext, RequestContext,
};
pub use executor::{Row, RowSet, StatementExecutor};
