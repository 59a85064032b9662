//! Custom field matching.
//!
//! Each predicate on a registered field joins the field's table under a fresh
//! alias, so two predicates on the same field never constrain the same row.
//! All values of one predicate share that alias and are ORed.
//!
//! A page with no row in the table is treated as holding the field type's
//! blank value:
//!
//! - positive values the blank satisfies accept absent rows through a LEFT
//!   JOIN and `alias.pages_id IS NULL`
//! - exclusions (`!=`, `!field=`) always accept absent rows
//!
//! Single-value tables express exclusions as a LEFT JOIN; multi-value tables
//! as `pages.id NOT IN (rows matching any value)`, since one matching row must
//! disqualify the page even when other rows don't match.

use std::sync::Arc;

use tracing::trace;

use crate::error::{SelectorResult, SyntaxError};
use crate::fieldtypes::{MatchContext, StorageKind};
use crate::query::{Join, JoinKind, QueryBuilder, QueryFragment, SqlFragment, SqlParam};
use crate::schema::{FieldDefinition, split_path};
use crate::types::{Operator, Predicate, PredicateValue, Scalar};

use super::context::CompileContext;
use super::native::nest_subfield;
use super::{Compilation, distinct_values, invalid_value, unsupported_operator};

/// The match for one value of a predicate.
struct ValueMatch {
    condition: SqlFragment,
    /// Absent rows satisfy this value.
    accepts_blank: bool,
    extras: QueryFragment,
}

impl ValueMatch {
    fn ids(column: &str, ids: Vec<i64>) -> Self {
        Self {
            condition: SqlFragment::in_list(column, ids.into_iter().map(SqlParam::integer).collect()),
            accepts_blank: false,
            extras: QueryFragment::default(),
        }
    }
}

impl Compilation<'_> {
    pub(super) fn resolve_custom(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        path: &str,
        predicate: &Predicate,
        multi_field: bool,
    ) -> SelectorResult<SqlFragment> {
        let (name, subfield) = split_path(path);
        let Some(field) = self.registry.field(name) else {
            return self.resolve_binding(path, name, subfield, predicate, multi_field);
        };
        let fieldtype = Arc::clone(&field.fieldtype);

        let column = match subfield {
            None => fieldtype.primary_column(),
            Some(subfield) => match fieldtype.column_for(subfield) {
                Some(column) => column,
                None if fieldtype.is_relation() => {
                    // refs.title=x  =>  refs=[title=x]
                    let rewritten = nest_subfield(name, subfield, predicate);
                    return self.resolve_custom(builder, ctx, name, &rewritten, multi_field);
                }
                None => {
                    return Err(SyntaxError::UnknownSubfield {
                        field: name.to_string(),
                        subfield: subfield.to_string(),
                    }
                    .into());
                }
            },
        };

        let operator = predicate.positive_operator();
        if !fieldtype.supports(operator) {
            return Err(unsupported_operator(
                path,
                operator,
                format!("custom {}", fieldtype.name()),
            ));
        }

        let exclude = predicate.is_exclusion();
        let alias = ctx.alias(&field.table);
        let column_ref = format!("{}.{}", alias, column);
        trace!(field = name, alias = %alias, exclude, "matching custom field");

        let mut matches = Vec::new();
        match &predicate.value {
            PredicateValue::SubSelector(nested) => {
                if !fieldtype.is_relation() || operator != Operator::Equal {
                    return Err(invalid_value(path, "[...]", "sub-selectors need a page reference"));
                }
                let ids = self.sub_selector_ids(ctx, nested, Some(&field.scope))?;
                matches.push(ValueMatch::ids(&column_ref, ids));
            }
            PredicateValue::OrGroup(_) => {
                return Err(invalid_value(path, "(...)", "OR-groups need a label"));
            }
            PredicateValue::Scalars(values) => {
                for value in distinct_values(values) {
                    if fieldtype.is_relation() && value.is_path() {
                        let nested = [Predicate::eq("path", value.clone())];
                        let ids = self.sub_selector_ids(ctx, &nested, None)?;
                        matches.push(ValueMatch::ids(&column_ref, ids));
                        continue;
                    }

                    let accepts_blank = !exclude && fieldtype.blank_matches(operator, value);
                    let value = if fieldtype.is_empty_value(value) {
                        fieldtype.blank_value()
                    } else {
                        value.clone()
                    };
                    let matcher = MatchContext {
                        field: path,
                        alias: &alias,
                        column,
                        operator,
                        now: self.now,
                    };
                    let mut extras = fieldtype.match_clause(&matcher, &value)?;
                    let condition = extras.take_condition();
                    matches.push(ValueMatch {
                        condition,
                        accepts_blank,
                        extras,
                    });
                }
            }
        }

        Ok(if exclude {
            self.exclude_rows(builder, &field, &alias, matches)
        } else {
            self.require_rows(builder, &field, &alias, matches, multi_field)
        })
    }

    fn require_rows(
        &self,
        builder: &mut QueryBuilder,
        field: &FieldDefinition,
        alias: &str,
        matches: Vec<ValueMatch>,
        multi_field: bool,
    ) -> SqlFragment {
        let needs_left = multi_field || matches.iter().any(|m| m.accepts_blank);
        let kind = if needs_left {
            JoinKind::Left
        } else {
            JoinKind::Inner
        };
        builder.join(Join::table(
            kind,
            field.table.as_str(),
            alias,
            SqlFragment::new(format!("{}.pages_id = pages.id", alias)),
        ));

        let mut conditions = Vec::with_capacity(matches.len());
        for value_match in matches {
            builder.merge(value_match.extras);
            conditions.push(if value_match.accepts_blank {
                SqlFragment::new(format!("{}.pages_id IS NULL", alias)).or(value_match.condition)
            } else {
                value_match.condition
            });
        }
        SqlFragment::any(conditions)
    }

    fn exclude_rows(
        &self,
        builder: &mut QueryBuilder,
        field: &FieldDefinition,
        alias: &str,
        matches: Vec<ValueMatch>,
    ) -> SqlFragment {
        let matched = SqlFragment::any(matches.into_iter().map(|m| m.condition));
        if matched.is_empty() {
            return SqlFragment::always_true();
        }

        match field.fieldtype.storage() {
            StorageKind::MultiValue => SqlFragment::with_params(
                format!(
                    "pages.id NOT IN (SELECT {alias}.pages_id FROM {table} AS {alias} WHERE {matched})",
                    alias = alias,
                    table = field.table,
                    matched = matched.sql
                ),
                matched.params,
            ),
            StorageKind::SingleValue => {
                builder.join(Join::table(
                    JoinKind::Left,
                    field.table.as_str(),
                    alias,
                    SqlFragment::new(format!("{}.pages_id = pages.id", alias)),
                ));
                SqlFragment::new(format!("{}.pages_id IS NULL", alias))
                    .or(matched.negate_nullable())
            }
        }
    }

    /// Unknown field names may name an API value instead. Only a single
    /// equality against a single value is allowed, and it resolves to a
    /// constant condition.
    fn resolve_binding(
        &self,
        path: &str,
        name: &str,
        subfield: Option<&str>,
        predicate: &Predicate,
        multi_field: bool,
    ) -> SelectorResult<SqlFragment> {
        let Some(bound) = self.request.bindings().lookup(name, subfield) else {
            return Err(SyntaxError::UnknownField {
                field: path.to_string(),
            }
            .into());
        };

        let values = predicate.values();
        let operator = predicate.positive_operator();
        if multi_field || values.len() != 1 || operator != Operator::Equal {
            return Err(unsupported_operator(path, predicate.operator, "api binding"));
        }

        let equal = match (&bound, &values[0]) {
            (Scalar::Text(_), _) | (_, Scalar::Text(_)) => bound.as_text() == values[0].as_text(),
            (lhs, rhs) => lhs.as_f64().is_some() && lhs.as_f64() == rhs.as_f64(),
        };
        trace!(field = path, equal, "resolved api binding");

        Ok(if equal != predicate.is_exclusion() {
            SqlFragment::always_true()
        } else {
            SqlFragment::always_false()
        })
    }
}
