//! Field storage providers.
//!
//! Every custom field stores its values in its own table,
//! `field_<name>(pages_id, data, ...)`, and its [`Fieldtype`] owns the match
//! clause for that table. The compiler decides which alias to use, how values
//! combine and how negation and blank values are handled; a field type only
//! answers "what does a stored row matching this value look like".

mod datetime;
mod integer;
mod page_ref;
mod text;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{SelectorError, SelectorResult, SyntaxError};
use crate::query::QueryFragment;
use crate::types::{Operator, Scalar};

pub use datetime::{DatetimeField, timestamp_condition};
pub use integer::IntegerField;
pub use page_ref::PageRefField;
pub use text::TextField;

/// How many rows a page may have in a field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// At most one row per page.
    SingleValue,
    /// Any number of rows per page.
    MultiValue,
}

/// A column of a field table, besides `pages_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: &'static str,
    /// SQLite column type.
    pub sql_type: &'static str,
}

/// What a field type gets to know when building its match clause.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// Field name, for error messages.
    pub field: &'a str,
    /// Table alias to qualify columns with.
    pub alias: &'a str,
    /// Column being matched.
    pub column: &'a str,
    /// Comparison operator, with `!=` already folded into `=`.
    pub operator: Operator,
    /// Reference time for relative dates.
    pub now: DateTime<Utc>,
}

impl MatchContext<'_> {
    /// The qualified column, `alias.column`.
    pub fn column_ref(&self) -> String {
        format!("{}.{}", self.alias, self.column)
    }

    /// Error for an operator the field type cannot answer.
    pub fn unsupported(&self, fieldtype: &str) -> SelectorError {
        SyntaxError::UnsupportedOperator {
            field: self.field.to_string(),
            operator: self.operator.to_string(),
            classification: fieldtype.to_string(),
        }
        .into()
    }

    /// Error for a value the field type cannot coerce.
    pub fn invalid_value(&self, value: &Scalar, message: impl Into<String>) -> SelectorError {
        SyntaxError::InvalidValue {
            field: self.field.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
        .into()
    }
}

/// The field-storage provider contract.
pub trait Fieldtype: Send + Sync + fmt::Debug {
    /// Type name used in schema documents.
    fn name(&self) -> &'static str;

    /// Row cardinality per page.
    fn storage(&self) -> StorageKind {
        StorageKind::SingleValue
    }

    /// Table columns besides `pages_id`.
    fn columns(&self) -> &'static [ColumnDef];

    /// Column matched when no subfield is given.
    fn primary_column(&self) -> &'static str {
        "data"
    }

    /// Maps a subfield to a storage column.
    fn column_for(&self, subfield: &str) -> Option<&'static str> {
        self.columns()
            .iter()
            .find(|c| c.name == subfield)
            .map(|c| c.name)
    }

    /// Returns true if the operator can be matched.
    fn supports(&self, operator: Operator) -> bool;

    /// Builds the condition a stored row must satisfy to match `value`.
    ///
    /// The condition goes in `wheres`. It is never negated here; the compiler
    /// wraps it for negated predicates.
    fn match_clause(&self, ctx: &MatchContext<'_>, value: &Scalar) -> SelectorResult<QueryFragment>;

    /// The value a page without a row is considered to have.
    fn blank_value(&self) -> Scalar;

    /// Returns true if the value means "empty" for this type.
    fn is_empty_value(&self, value: &Scalar) -> bool {
        match value {
            Scalar::Null => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Returns true if a page with no row satisfies `operator value`.
    ///
    /// When true the compiler LEFT JOINs the table and accepts absent rows.
    fn blank_matches(&self, operator: Operator, value: &Scalar) -> bool {
        let blank = self.blank_value();
        match operator {
            Operator::Equal => self.is_empty_value(value) || scalars_equal(&blank, value),
            op if op.is_range() => match &blank {
                Scalar::Null => false,
                // text columns compare with SQLite's binary collation
                Scalar::Text(blank) => range_holds(op, blank.as_str().cmp(value.as_text().as_ref())),
                _ => match (blank.as_f64(), value.as_f64()) {
                    (Some(lhs), Some(rhs)) => op.compare(lhs, rhs).unwrap_or(false),
                    _ => false,
                },
            },
            _ => false,
        }
    }

    /// Returns true if the stored values are page ids.
    fn is_relation(&self) -> bool {
        false
    }
}

fn range_holds(operator: Operator, ordering: Ordering) -> bool {
    match operator {
        Operator::LessThan => ordering == Ordering::Less,
        Operator::LessThanEqual => ordering != Ordering::Greater,
        Operator::GreaterThan => ordering == Ordering::Greater,
        Operator::GreaterThanEqual => ordering != Ordering::Less,
        _ => false,
    }
}

fn scalars_equal(a: &Scalar, b: &Scalar) -> bool {
    match (a, b) {
        (Scalar::Null, _) | (_, Scalar::Null) => false,
        (Scalar::Text(x), Scalar::Text(y)) => x == y,
        _ => matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y),
    }
}

/// Looks up a shipped field type by its schema name.
pub fn fieldtype_by_name(name: &str) -> Option<Arc<dyn Fieldtype>> {
    let fieldtype: Arc<dyn Fieldtype> = match name.to_ascii_lowercase().as_str() {
        "text" | "textarea" => Arc::new(TextField),
        "integer" => Arc::new(IntegerField),
        "datetime" => Arc::new(DatetimeField),
        "page" => Arc::new(PageRefField),
        _ => return None,
    };
    Some(fieldtype)
}
