//! Folio page selector compiler
//!
//! This crate compiles page selectors (ordered lists of field/operator/value
//! predicates) into a single parameterised SQL statement over the Folio page
//! store, runs it, and returns the matching page ids in order together with
//! the total number of matches.
//!
//! # Features
//!
//! - **Custom fields**: every registered field type declares its storage
//!   columns, the operators it answers and its blank value
//! - **Native columns**: `id`, `name`, `path`, `parent`, `template`,
//!   `status`, dates, and the virtual `has_parent` and `num_children`
//! - **Nesting**: sub-selectors (`refs=[template=tag]`) and labelled
//!   OR-groups (`foo=(a=1), foo=(b=2)`)
//! - **Status and access**: hidden, unpublished and trashed pages are kept
//!   out unless asked for, and template view roles are enforced
//! - **Pagination**: `limit`, `start`, page numbers and two total strategies
//!
//! # Backend Features
//!
//! - `sqlite` (default) - pooled SQLite executor and schema installer
//!
//! # Architecture
//!
//! - [`types`] - predicates, options, results and page status flags
//! - [`query`] - SQL fragments, the query builder and the renderer
//! - [`schema`] - native column knowledge and the template/field registry
//! - [`fieldtypes`] - shipped field storage providers
//! - [`compiler`] - the selector compiler
//! - [`core`] - collaborator traits (executor, identity, pagination)
//! - [`backends`] - executor implementations
//! - [`config`] - compiler configuration
//! - [`error`] - error types
//!
//! # Building predicates
//!
//! ```
//! use folio_selector::types::{Operator, Predicate};
//!
//! // template=article, title|body*=rust, !views<10, sort=-created
//! let selector = vec![
//!     Predicate::eq("template", "article"),
//!     Predicate::any_field(["title", "body"], Operator::ContainsPhrase, "rust"),
//!     Predicate::new("views", Operator::LessThan, 10).negated(),
//!     Predicate::eq("sort", "-created"),
//! ];
//! assert!(selector[2].is_exclusion());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod compiler;
pub mod config;
pub mod core;
pub mod error;
pub mod fieldtypes;
pub mod query;
pub mod schema;
pub mod types;

// Re-export commonly used types at crate root
pub use compiler::SelectorCompiler;
pub use config::CompilerConfig;
pub use error::{SelectorError, SelectorResult};
pub use types::{CompileOptions, CompileResult, Operator, Predicate, Scalar, TotalStrategy};

// Re-export collaborator traits
pub use core::{IdentityProvider, PaginationContext, RequestContext, StatementExecutor};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
