//! SQL fragments with bound parameters.
//!
//! Placeholders are positional `?`. A fragment's parameters are listed in the
//! order its placeholders appear, and every combinator preserves that order,
//! so the renderer only has to concatenate parameters in the order it emits
//! fragments.

use crate::types::Scalar;

/// A bound parameter. Parameters are predicate scalars bound as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam(pub Scalar);

impl SqlParam {
    /// A text parameter.
    pub fn string(s: impl Into<String>) -> Self {
        Self(Scalar::Text(s.into()))
    }

    /// An integer parameter.
    pub fn integer(i: i64) -> Self {
        Self(Scalar::Integer(i))
    }
}

impl From<&Scalar> for SqlParam {
    fn from(value: &Scalar) -> Self {
        Self(value.clone())
    }
}

/// SQL text plus the parameters for its placeholders, in placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// One parameter per placeholder.
    pub params: Vec<SqlParam>,
}

impl SqlFragment {
    /// A fragment without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self::with_params(sql, Vec::new())
    }

    /// A fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A condition that never holds.
    pub fn always_false() -> Self {
        Self::new("1 = 0")
    }

    /// A condition that always holds.
    pub fn always_true() -> Self {
        Self::new("1 = 1")
    }

    /// `expr IN (?, ?, ...)`. An empty list never matches.
    pub fn in_list(expr: &str, params: Vec<SqlParam>) -> Self {
        if params.is_empty() {
            return Self::always_false();
        }
        let placeholders = vec!["?"; params.len()].join(", ");
        Self::with_params(format!("{} IN ({})", expr, placeholders), params)
    }

    /// `expr NOT IN (?, ?, ...)`. An empty list always matches.
    pub fn not_in_list(expr: &str, params: Vec<SqlParam>) -> Self {
        if params.is_empty() {
            return Self::always_true();
        }
        let placeholders = vec!["?"; params.len()].join(", ");
        Self::with_params(format!("{} NOT IN ({})", expr, placeholders), params)
    }

    /// `(self) AND (other)`. An empty side drops out.
    pub fn and(self, other: SqlFragment) -> Self {
        self.join("AND", other)
    }

    /// `(self) OR (other)`. An empty side drops out.
    pub fn or(self, other: SqlFragment) -> Self {
        self.join("OR", other)
    }

    fn join(mut self, keyword: &str, other: SqlFragment) -> Self {
        self.sql = match (self.sql.is_empty(), other.sql.is_empty()) {
            (false, false) => format!("({}) {} ({})", self.sql, keyword, other.sql),
            (true, _) => other.sql,
            (false, true) => self.sql,
        };
        self.params.extend(other.params);
        self
    }

    /// Negates the fragment.
    pub fn not(mut self) -> Self {
        if !self.sql.is_empty() {
            self.sql = format!("NOT ({})", self.sql);
        }
        self
    }

    /// Negates the fragment, treating an unknown (NULL) outcome as no match
    /// before negating, so rows with NULL columns satisfy the negation.
    pub fn negate_nullable(mut self) -> Self {
        if !self.sql.is_empty() {
            self.sql = format!("NOT COALESCE(({}), 0)", self.sql);
        }
        self
    }

    /// ANDs all fragments together. Empty input yields an empty fragment.
    pub fn all(fragments: impl IntoIterator<Item = SqlFragment>) -> Self {
        fragments.into_iter().fold(Self::default(), Self::and)
    }

    /// ORs all fragments together. Empty input yields an empty fragment.
    pub fn any(fragments: impl IntoIterator<Item = SqlFragment>) -> Self {
        fragments.into_iter().fold(Self::default(), Self::or)
    }

    /// True when there is no SQL text.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Number of `?` placeholders in the SQL.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Escapes `%`, `_` and the escape character for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
