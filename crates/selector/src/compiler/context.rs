//! Per-compile mutable state.
//!
//! One [`CompileContext`] exists per compile invocation, recursive
//! sub-compiles included. Alias counters, deferred sorts and OR-groups never
//! leak between calls.

use std::collections::HashMap;

use crate::query::SortDirection;
use crate::types::{Predicate, Scalar};

/// A deferred `sort=` token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SortToken {
    pub field: String,
    pub direction: SortDirection,
}

impl SortToken {
    /// Parses `-field` (descending) or `field`. A negated predicate flips the
    /// direction.
    pub fn parse(value: &Scalar, negate: bool) -> Option<Self> {
        let text = value.as_text();
        let text = text.trim();
        let (field, descending) = match text.strip_prefix('-') {
            Some(rest) => (rest.trim(), true),
            None => (text, false),
        };
        if field.is_empty() {
            return None;
        }
        let direction = if descending != negate {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        Some(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// One alternative of an OR-group.
#[derive(Debug, Clone)]
pub(crate) struct OrAlternative {
    pub predicates: Vec<Predicate>,
    pub negate: bool,
}

/// All alternatives written under one label.
#[derive(Debug, Clone)]
pub(crate) struct OrGroup {
    pub label: String,
    pub alternatives: Vec<OrAlternative>,
}

#[derive(Debug, Default)]
pub(crate) struct CompileContext {
    /// Sub-selector nesting depth; 0 for the top-level call.
    pub depth: usize,
    table_counts: HashMap<String, usize>,
    pub sorts: Vec<SortToken>,
    pub limit: Option<u64>,
    pub start: Option<u64>,
    pub or_groups: Vec<OrGroup>,
    /// The predicates name `status` explicitly.
    pub explicit_status: bool,
}

impl CompileContext {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    /// Returns a fresh alias for `table`: `table_0`, `table_1`, ...
    pub fn alias(&mut self, table: &str) -> String {
        let count = self.table_counts.entry(table.to_string()).or_insert(0);
        let alias = format!("{}_{}", table, count);
        *count += 1;
        alias
    }

    /// Files an OR-group alternative under its label.
    pub fn add_or_group(&mut self, label: &str, predicates: Vec<Predicate>, negate: bool) {
        let alternative = OrAlternative { predicates, negate };
        match self.or_groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.alternatives.push(alternative),
            None => self.or_groups.push(OrGroup {
                label: label.to_string(),
                alternatives: vec![alternative],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_counts_per_table() {
        let mut ctx = CompileContext::new(0);
        assert_eq!(ctx.alias("field_title"), "field_title_0");
        assert_eq!(ctx.alias("field_title"), "field_title_1");
        assert_eq!(ctx.alias("field_body"), "field_body_0");
    }

    #[test]
    fn test_or_groups_collect_by_label() {
        let mut ctx = CompileContext::new(0);
        ctx.add_or_group("g", vec![Predicate::eq("b", 2)], false);
        ctx.add_or_group("h", vec![Predicate::eq("c", 1)], false);
        ctx.add_or_group("g", vec![Predicate::eq("b", 3)], false);
        assert_eq!(ctx.or_groups.len(), 2);
        assert_eq!(ctx.or_groups[0].alternatives.len(), 2);
    }

    #[test]
    fn test_sort_token_parse() {
        let token = SortToken::parse(&Scalar::from("-created"), false).unwrap();
        assert_eq!(token.field, "created");
        assert_eq!(token.direction, SortDirection::Descending);

        let token = SortToken::parse(&Scalar::from("title"), true).unwrap();
        assert_eq!(token.direction, SortDirection::Descending);

        assert!(SortToken::parse(&Scalar::from("-"), false).is_none());
    }
}
