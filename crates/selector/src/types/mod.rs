//! Core types for the selector compiler.
//!
//! - [`Predicate`], [`Operator`], [`Scalar`] - The parsed selector model
//! - [`CompileOptions`], [`TotalStrategy`] - Per-call compile switches
//! - [`CompileResult`], [`VerboseRow`] - What a compile call returns
//! - [`Status`] - Page status flags
//!
//! # Examples
//!
//! ```
//! use folio_selector::types::{Operator, Predicate, Scalar};
//!
//! // title*=hello, !parent=1
//! let predicates = vec![
//!     Predicate::new("title", Operator::ContainsPhrase, "hello"),
//!     Predicate::eq("parent", 1).negated(),
//! ];
//!
//! assert_eq!(predicates[0].values(), &[Scalar::from("hello")]);
//! assert!(predicates[1].negate);
//! ```

mod options;
mod predicate;
mod result;
mod status;
mod timestamp;

pub use options::{CompileOptions, TotalStrategy};
pub use predicate::{Operator, Predicate, PredicateValue, QuoteKind, Scalar};
pub use result::{CompileResult, VerboseRow};
pub use status::Status;
pub use timestamp::{Timestamp, TimestampPrecision, parse_timestamp};

/// Identifier of a row in the `pages` table.
pub type PageId = i64;

/// Identifier of a template.
pub type TemplateId = i64;

/// Identifier of an access role.
pub type RoleId = i64;
