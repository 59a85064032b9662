//! Selector predicate types.
//!
//! A selector such as `template=article, title*=rust, sort=-created, limit=10`
//! arrives here already parsed into an ordered list of [`Predicate`]s.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Comparison operators understood by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equal (`=`).
    #[serde(rename = "=")]
    Equal,
    /// Not equal (`!=`).
    #[serde(rename = "!=")]
    NotEqual,
    /// Less than (`<`).
    #[serde(rename = "<")]
    LessThan,
    /// Greater than (`>`).
    #[serde(rename = ">")]
    GreaterThan,
    /// Less than or equal (`<=`).
    #[serde(rename = "<=")]
    LessThanEqual,
    /// Greater than or equal (`>=`).
    #[serde(rename = ">=")]
    GreaterThanEqual,
    /// Contains the phrase (`*=`).
    #[serde(rename = "*=")]
    ContainsPhrase,
    /// Contains all the words, in any order (`~=`).
    #[serde(rename = "~=")]
    ContainsWords,
    /// SQL LIKE pattern (`%=`).
    #[serde(rename = "%=")]
    Like,
    /// Starts with (`^=`).
    #[serde(rename = "^=")]
    StartsWith,
    /// Ends with (`$=`).
    #[serde(rename = "$=")]
    EndsWith,
    /// Bitwise AND is non-zero (`&`).
    #[serde(rename = "&")]
    BitAnd,
}

impl Operator {
    /// Returns the selector symbol for this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThanEqual => ">=",
            Operator::ContainsPhrase => "*=",
            Operator::ContainsWords => "~=",
            Operator::Like => "%=",
            Operator::StartsWith => "^=",
            Operator::EndsWith => "$=",
            Operator::BitAnd => "&",
        }
    }

    /// Returns true for `<`, `>`, `<=` and `>=`.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::LessThan
                | Operator::GreaterThan
                | Operator::LessThanEqual
                | Operator::GreaterThanEqual
        )
    }

    /// Returns true for the text search operators.
    pub fn is_text_search(&self) -> bool {
        matches!(
            self,
            Operator::ContainsPhrase
                | Operator::ContainsWords
                | Operator::Like
                | Operator::StartsWith
                | Operator::EndsWith
        )
    }

    /// The SQL comparison operator for equality and range operators.
    pub fn sql_comparison(&self) -> Option<&'static str> {
        match self {
            Operator::Equal => Some("="),
            Operator::NotEqual => Some("!="),
            Operator::LessThan => Some("<"),
            Operator::GreaterThan => Some(">"),
            Operator::LessThanEqual => Some("<="),
            Operator::GreaterThanEqual => Some(">="),
            _ => None,
        }
    }

    /// Evaluates the operator against two numbers.
    ///
    /// Returns `None` for operators that have no numeric meaning.
    pub fn compare(&self, lhs: f64, rhs: f64) -> Option<bool> {
        match self {
            Operator::Equal => Some(lhs == rhs),
            Operator::NotEqual => Some(lhs != rhs),
            Operator::LessThan => Some(lhs < rhs),
            Operator::GreaterThan => Some(lhs > rhs),
            Operator::LessThanEqual => Some(lhs <= rhs),
            Operator::GreaterThanEqual => Some(lhs >= rhs),
            Operator::BitAnd => Some((lhs as i64) & (rhs as i64) != 0),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            ">" => Ok(Operator::GreaterThan),
            "<=" => Ok(Operator::LessThanEqual),
            ">=" => Ok(Operator::GreaterThanEqual),
            "*=" => Ok(Operator::ContainsPhrase),
            "~=" => Ok(Operator::ContainsWords),
            "%=" => Ok(Operator::Like),
            "^=" => Ok(Operator::StartsWith),
            "$=" => Ok(Operator::EndsWith),
            "&" => Ok(Operator::BitAnd),
            _ => Err(format!("unknown operator: {}", s)),
        }
    }
}

/// A single predicate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// No value.
    Null,
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// Text, including paths, dates and names.
    Text(String),
}

impl Scalar {
    /// Returns true for [`Scalar::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Interprets the value as an integer.
    ///
    /// Floats convert only when they have no fractional part; text must parse.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            Scalar::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interprets the value as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Null => None,
        }
    }

    /// Renders the value as text. Null renders as the empty string.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Scalar::Null => Cow::Borrowed(""),
            Scalar::Integer(i) => Cow::Owned(i.to_string()),
            Scalar::Float(f) => Cow::Owned(f.to_string()),
            Scalar::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Returns true for text that looks like a page path (`/about/team/`).
    pub fn is_path(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.trim_start().starts_with('/'))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Integer(v as i64)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::Integer(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// The right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateValue {
    /// One or more plain values, ORed together.
    Scalars(Vec<Scalar>),
    /// A bracketed sub-selector, `field=[...]`, resolved to page ids first.
    SubSelector(Vec<Predicate>),
    /// One alternative of a parenthesised OR-group, `label=(...)`.
    OrGroup(Vec<Predicate>),
}

/// Quoting marker of a predicate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    /// A plain value.
    None,
    /// `(`: an OR-group alternative.
    Paren,
    /// `[`: a sub-selector.
    Bracket,
}

/// A single field/operator/value constraint.
///
/// More than one entry in `fields` means the value may match any of them
/// (`title|body*=rust`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Field paths, optionally `field.subfield`.
    pub fields: Vec<String>,
    /// The comparison operator.
    pub operator: Operator,
    /// The value(s) to compare against.
    pub value: PredicateValue,
    /// Whether the whole predicate is negated (`!field=value`).
    #[serde(default)]
    pub negate: bool,
}

impl Predicate {
    /// Creates a predicate with a single value.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Scalar>) -> Self {
        Self {
            fields: vec![field.into()],
            operator,
            value: PredicateValue::Scalars(vec![value.into()]),
            negate: false,
        }
    }

    /// Creates an equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(field, Operator::Equal, value)
    }

    /// Creates a predicate that matches any of several values (`field=a|b|c`).
    pub fn any_of<I, V>(field: impl Into<String>, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        Self {
            fields: vec![field.into()],
            operator,
            value: PredicateValue::Scalars(values.into_iter().map(Into::into).collect()),
            negate: false,
        }
    }

    /// Creates a predicate matching one value against several fields.
    pub fn any_field<I, F>(fields: I, operator: Operator, value: impl Into<Scalar>) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            operator,
            value: PredicateValue::Scalars(vec![value.into()]),
            negate: false,
        }
    }

    /// Creates a sub-selector predicate, `field=[predicates]`.
    pub fn sub_selector(field: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            fields: vec![field.into()],
            operator: Operator::Equal,
            value: PredicateValue::SubSelector(predicates),
            negate: false,
        }
    }

    /// Creates one alternative of an OR-group, `label=(predicates)`.
    pub fn or_group(label: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            fields: vec![label.into()],
            operator: Operator::Equal,
            value: PredicateValue::OrGroup(predicates),
            negate: false,
        }
    }

    /// Returns the predicate with its negation flag set.
    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// The first field path.
    pub fn field(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or_default()
    }

    /// Plain values of the predicate. Empty for nested values.
    pub fn values(&self) -> &[Scalar] {
        match &self.value {
            PredicateValue::Scalars(values) => values,
            _ => &[],
        }
    }

    /// The quoting marker implied by the value.
    pub fn quote_kind(&self) -> QuoteKind {
        match self.value {
            PredicateValue::Scalars(_) => QuoteKind::None,
            PredicateValue::SubSelector(_) => QuoteKind::Bracket,
            PredicateValue::OrGroup(_) => QuoteKind::Paren,
        }
    }

    /// Returns true when the predicate excludes what it names, either through
    /// `!=` or the negation flag. The two cancel out.
    pub fn is_exclusion(&self) -> bool {
        self.negate != (self.operator == Operator::NotEqual)
    }

    /// The operator with `!=` folded into `=`; pair with [`Self::is_exclusion`].
    pub fn positive_operator(&self) -> Operator {
        match self.operator {
            Operator::NotEqual => Operator::Equal,
            op => op,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trip() {
        for symbol in ["=", "!=", "<", ">", "<=", ">=", "*=", "~=", "%=", "^=", "$=", "&"] {
            let op: Operator = symbol.parse().unwrap();
            assert_eq!(op.to_string(), symbol);
        }
        assert!("==".parse::<Operator>().is_err());
    }

    #[test]
    fn test_operator_compare() {
        assert_eq!(Operator::LessThan.compare(0.0, 5.0), Some(true));
        assert_eq!(Operator::GreaterThanEqual.compare(0.0, 1.0), Some(false));
        assert_eq!(Operator::BitAnd.compare(1025.0, 1024.0), Some(true));
        assert_eq!(Operator::ContainsPhrase.compare(0.0, 0.0), None);
    }

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(Scalar::from("42").as_i64(), Some(42));
        assert_eq!(Scalar::Float(3.0).as_i64(), Some(3));
        assert_eq!(Scalar::Float(3.5).as_i64(), None);
        assert_eq!(Scalar::Null.as_text(), "");
        assert!(Scalar::from("/about/").is_path());
        assert!(!Scalar::from("about").is_path());
    }

    #[test]
    fn test_scalar_untagged_serde() {
        let values: Vec<Scalar> = serde_json::from_str(r#"[null, 1, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Scalar::Null,
                Scalar::Integer(1),
                Scalar::Float(2.5),
                Scalar::Text("x".to_string())
            ]
        );
    }

    #[test]
    fn test_exclusion_flags() {
        let p = Predicate::new("title", Operator::NotEqual, "x");
        assert!(p.is_exclusion());
        assert_eq!(p.positive_operator(), Operator::Equal);

        // !title!=x is a double negative
        let p = p.negated();
        assert!(!p.is_exclusion());

        assert!(Predicate::eq("title", "x").negated().is_exclusion());
    }

    #[test]
    fn test_quote_kind() {
        assert_eq!(Predicate::eq("a", 1).quote_kind(), QuoteKind::None);
        assert_eq!(
            Predicate::sub_selector("refs", vec![]).quote_kind(),
            QuoteKind::Bracket
        );
        assert_eq!(Predicate::or_group("g", vec![]).quote_kind(), QuoteKind::Paren);
    }

    #[test]
    fn test_predicate_deserialize() {
        let p: Predicate = serde_json::from_str(
            r#"{"fields": ["title", "body"], "operator": "*=", "value": {"scalars": ["rust"]}}"#,
        )
        .unwrap();
        assert_eq!(p.fields.len(), 2);
        assert_eq!(p.operator, Operator::ContainsPhrase);
        assert!(!p.negate);
    }
}
