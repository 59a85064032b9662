//! SQLite statement executor.
//!
//! Runs compiled statements on a pooled SQLite database and installs the
//! page, template and field tables the compiler expects.
//!
//! # Example
//!
//! ```no_run
//! use folio_selector::backends::sqlite::SqliteExecutor;
//! use folio_selector::schema::SchemaRegistry;
//!
//! let registry = SchemaRegistry::from_json(
//!     r#"{"templates": [{"id": 1, "name": "home"}], "fields": [{"name": "title", "type": "text"}]}"#,
//! )?;
//! let executor = SqliteExecutor::open("site.db")?;
//! executor.install_schema(&registry)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod executor;
mod schema;

pub use executor::{SqliteExecutor, SqliteExecutorConfig};
pub use schema::{create_field_table, install, install_core, sync_templates, verify_field_table};
