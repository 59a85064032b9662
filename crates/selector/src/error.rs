//! Error types for the selector compiler.
//!
//! Errors are grouped by category: selector syntax errors (bad field names,
//! operators the field cannot answer, runaway nesting), schema errors (field
//! storage that disagrees with its type) and execution errors raised by the
//! statement executor. Every category is fatal to the compile call that
//! raised it.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all compile operations.
#[derive(Error, Debug)]
pub enum SelectorError {
    /// The selector cannot be compiled as written.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The schema backing a field is inconsistent.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The generated statement failed to execute.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl SelectorError {
    /// Returns true for selector syntax errors.
    pub fn is_syntax(&self) -> bool {
        matches!(self, SelectorError::Syntax(_))
    }

    /// Returns true for schema errors.
    pub fn is_schema(&self) -> bool {
        matches!(self, SelectorError::Schema(_))
    }

    /// Returns true for execution errors.
    pub fn is_execution(&self) -> bool {
        matches!(self, SelectorError::Execution(_))
    }
}

/// Errors in the predicate list itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    /// No native column, registered field or API binding has this name.
    #[error("unknown field: {field}")]
    UnknownField { field: String },

    /// The field exists but has no such subfield.
    #[error("unknown subfield '{subfield}' for field '{field}'")]
    UnknownSubfield { field: String, subfield: String },

    /// The operator is not supported for this kind of field.
    #[error("operator '{operator}' is not supported by {classification} field '{field}'")]
    UnsupportedOperator {
        field: String,
        operator: String,
        classification: String,
    },

    /// The attribute cannot be combined with other fields in one predicate.
    #[error("field '{field}' cannot be OR-combined with other fields")]
    UnsupportedMultiField { field: String },

    /// A template name did not resolve.
    #[error("unknown template: {name}")]
    UnknownTemplate { name: String },

    /// A value could not be coerced for the field.
    #[error("invalid value '{value}' for field '{field}': {message}")]
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// Sub-selectors nest deeper than allowed.
    #[error("sub-selector nesting depth {depth} exceeds maximum {max}")]
    NestingTooDeep { depth: usize, max: usize },

    /// A directive (`include`, `limit`, ...) has an unusable value.
    #[error("invalid value '{value}' for directive '{directive}'")]
    InvalidDirective { directive: String, value: String },
}

/// Errors in the field and template schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A table, column or alias name is not a plain identifier.
    #[error("invalid identifier: {identifier}")]
    InvalidIdentifier { identifier: String },

    /// A field table lacks a column its type requires.
    #[error("table {table} is missing required column {column}")]
    MissingColumn { table: String, column: String },

    /// A field claims a table that does not exist.
    #[error("table {table} does not exist")]
    MissingTable { table: String },

    /// A field with this name is already registered.
    #[error("field already registered: {name}")]
    DuplicateField { name: String },

    /// A template with this name or id is already registered.
    #[error("template already registered: {name}")]
    DuplicateTemplate { name: String },

    /// No template has this id.
    #[error("no template with id {id}")]
    MissingTemplate { id: i64 },

    /// No field type is known by this name.
    #[error("unknown field type: {name}")]
    UnknownFieldtype { name: String },

    /// The schema document could not be parsed.
    #[error("invalid schema document: {message}")]
    InvalidDocument { message: String },
}

/// Errors raised while executing generated statements.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The statement failed. The generated SQL is attached for diagnostics.
    #[error("query execution failed: {message} [sql: {sql}]")]
    QueryFailed { message: String, sql: String },

    /// A connection could not be obtained.
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// A result row did not have the expected shape.
    #[error("failed to decode row: {message} [sql: {sql}]")]
    RowDecode { message: String, sql: String },
}

/// Result type for compile operations.
pub type SelectorResult<T> = Result<T, SelectorError>;
