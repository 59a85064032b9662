//! Page reference fields: a multi-value relation to other pages.
//!
//! One row per referenced page, `data` holding the referenced page id and
//! `sort` its position. Subfields other than `id`, `data` and `sort` refer to
//! the referenced page and are resolved by the compiler as sub-selectors.

use crate::error::SelectorResult;
use crate::query::{QueryFragment, SqlFragment, SqlParam};
use crate::types::{Operator, Scalar};

use super::{ColumnDef, Fieldtype, MatchContext, StorageKind};

const COLUMNS: &[ColumnDef] = &[
    ColumnDef {
        name: "data",
        sql_type: "INTEGER",
    },
    ColumnDef {
        name: "sort",
        sql_type: "INTEGER",
    },
];

/// A page reference field. Blank means no rows at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageRefField;

impl Fieldtype for PageRefField {
    fn name(&self) -> &'static str {
        "page"
    }

    fn storage(&self) -> StorageKind {
        StorageKind::MultiValue
    }

    fn columns(&self) -> &'static [ColumnDef] {
        COLUMNS
    }

    fn column_for(&self, subfield: &str) -> Option<&'static str> {
        match subfield {
            "id" | "data" => Some("data"),
            "sort" => Some("sort"),
            _ => None,
        }
    }

    fn supports(&self, operator: Operator) -> bool {
        operator.sql_comparison().is_some()
    }

    fn match_clause(&self, ctx: &MatchContext<'_>, value: &Scalar) -> SelectorResult<QueryFragment> {
        // blank is "no rows"; a stored row never equals it
        if value.is_null() {
            return Ok(QueryFragment::condition(SqlFragment::always_false()));
        }

        let id = value
            .as_i64()
            .ok_or_else(|| ctx.invalid_value(value, "expected a page id or path"))?;
        let cmp = ctx
            .operator
            .sql_comparison()
            .ok_or_else(|| ctx.unsupported(self.name()))?;

        Ok(QueryFragment::condition(SqlFragment::with_params(
            format!("{} {} ?", ctx.column_ref(), cmp),
            vec![SqlParam::integer(id)],
        )))
    }

    fn blank_value(&self) -> Scalar {
        Scalar::Null
    }

    fn is_relation(&self) -> bool {
        true
    }
}
