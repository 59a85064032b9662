//! Native columns of `pages` and the virtual attributes computed from
//! `pages` and `pages_parents`.

use crate::error::{SelectorResult, SyntaxError};
use crate::fieldtypes::{DatetimeField, Fieldtype, IntegerField, MatchContext, TextField};
use crate::query::{
    Join, JoinKind, QueryBuilder, SqlFragment, SqlParam, render_id_subquery,
};
use crate::schema::{ColumnKind, NativeColumn, split_path};
use crate::types::{Operator, PageId, Predicate, PredicateValue, Scalar, Status};

use super::context::CompileContext;
use super::{Compilation, distinct_values, invalid_value, unsupported_operator};

/// Direct children per parent, joined for child-count matches and sorts.
pub(super) const CHILD_COUNTS: &str =
    "SELECT parent_id, COUNT(*) AS num_children FROM pages GROUP BY parent_id";

impl Compilation<'_> {
    pub(super) fn resolve_native(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        path: &str,
        column: NativeColumn,
        predicate: &Predicate,
    ) -> SelectorResult<SqlFragment> {
        if let (_, Some(subfield)) = split_path(path) {
            return match (column, subfield) {
                (NativeColumn::Template, "id" | "name") => {
                    self.resolve_native(builder, ctx, "template", column, predicate)
                }
                (NativeColumn::Parent, _) => {
                    // parent.title=x  =>  parent=[title=x]
                    let rewritten = nest_subfield("parent", subfield, predicate);
                    self.resolve_native(builder, ctx, "parent", column, &rewritten)
                }
                _ => Err(SyntaxError::UnknownSubfield {
                    field: column.column().to_string(),
                    subfield: subfield.to_string(),
                }
                .into()),
            };
        }

        let operator = predicate.positive_operator();
        let expr = format!("pages.{}", column.column());
        let condition = match &predicate.value {
            PredicateValue::SubSelector(nested) => {
                let accepts_ids = matches!(column.kind(), ColumnKind::Integer | ColumnKind::Parent);
                if !accepts_ids || operator != Operator::Equal {
                    return Err(invalid_value(path, "[...]", "sub-selectors resolve to page ids"));
                }
                let ids = self.sub_selector_ids(ctx, nested, None)?;
                SqlFragment::in_list(&expr, ids.into_iter().map(SqlParam::integer).collect())
            }
            PredicateValue::OrGroup(_) => {
                return Err(invalid_value(path, "(...)", "OR-groups need a label"));
            }
            PredicateValue::Scalars(values) => {
                let mut conditions = Vec::new();
                for value in distinct_values(values) {
                    conditions.push(self.native_condition(path, column, operator, value)?);
                }
                SqlFragment::any(conditions)
            }
        };

        if predicate.is_exclusion() {
            Ok(condition.negate_nullable())
        } else {
            Ok(condition)
        }
    }

    fn native_condition(
        &self,
        path: &str,
        column: NativeColumn,
        operator: Operator,
        value: &Scalar,
    ) -> SelectorResult<SqlFragment> {
        let classification = format!("native {}", column.column());
        let matcher = MatchContext {
            field: path,
            alias: "pages",
            column: column.column(),
            operator,
            now: self.now,
        };

        match column.kind() {
            ColumnKind::Integer => {
                if !IntegerField.supports(operator) {
                    return Err(unsupported_operator(path, operator, classification));
                }
                Ok(IntegerField.match_clause(&matcher, value)?.take_condition())
            }
            ColumnKind::Text => {
                if !TextField.supports(operator) {
                    return Err(unsupported_operator(path, operator, classification));
                }
                Ok(TextField.match_clause(&matcher, value)?.take_condition())
            }
            ColumnKind::Datetime => {
                if !DatetimeField.supports(operator) {
                    return Err(unsupported_operator(path, operator, classification));
                }
                let value = if DatetimeField.is_empty_value(value) {
                    Scalar::Null
                } else {
                    value.clone()
                };
                Ok(DatetimeField.match_clause(&matcher, &value)?.take_condition())
            }
            ColumnKind::Status => {
                let (bits, named) = match value {
                    Scalar::Text(text) if text.trim().parse::<i64>().is_err() => {
                        let status = Status::from_name(text)
                            .ok_or_else(|| invalid_value(path, value, "unknown status"))?;
                        (i64::from(status.bits()), true)
                    }
                    _ => (
                        value
                            .as_i64()
                            .ok_or_else(|| invalid_value(path, value, "expected a status"))?,
                        false,
                    ),
                };
                let bit_test = || {
                    SqlFragment::with_params(
                        "(pages.status & ?) != 0",
                        vec![SqlParam::integer(bits)],
                    )
                };
                match operator {
                    Operator::BitAnd => Ok(bit_test()),
                    Operator::Equal if named => Ok(bit_test()),
                    op => match op.sql_comparison() {
                        Some(cmp) => Ok(SqlFragment::with_params(
                            format!("pages.status {} ?", cmp),
                            vec![SqlParam::integer(bits)],
                        )),
                        None => Err(unsupported_operator(path, op, classification)),
                    },
                }
            }
            ColumnKind::Template => {
                if operator != Operator::Equal {
                    return Err(unsupported_operator(path, operator, classification));
                }
                let id = match value {
                    Scalar::Text(name) if name.trim().parse::<i64>().is_err() => {
                        if name.trim().is_empty() {
                            return Err(invalid_value(path, value, "expected a template"));
                        }
                        self.registry
                            .template(name.trim())
                            .map(|template| template.id)
                            .ok_or_else(|| SyntaxError::UnknownTemplate {
                                name: name.trim().to_string(),
                            })?
                    }
                    _ => value
                        .as_i64()
                        .ok_or_else(|| invalid_value(path, value, "expected a template"))?,
                };
                Ok(SqlFragment::with_params(
                    "pages.templates_id = ?",
                    vec![SqlParam::integer(id)],
                ))
            }
            ColumnKind::Parent => {
                if value.is_path() {
                    if operator != Operator::Equal {
                        return Err(unsupported_operator(path, operator, classification));
                    }
                    let subquery = self.path_subquery(value)?;
                    return Ok(SqlFragment::with_params(
                        format!("pages.parent_id IN ({})", subquery.sql),
                        subquery.params,
                    ));
                }
                let id = value
                    .as_i64()
                    .ok_or_else(|| invalid_value(path, value, "expected a page id or path"))?;
                let cmp = operator
                    .sql_comparison()
                    .ok_or_else(|| unsupported_operator(path, operator, classification))?;
                Ok(SqlFragment::with_params(
                    format!("pages.parent_id {} ?", cmp),
                    vec![SqlParam::integer(id)],
                ))
            }
        }
    }

    /// Resolves `path=/a/b/` by walking from the leaf segment up to the root.
    pub(super) fn resolve_path(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        path: &str,
        predicate: &Predicate,
        multi_field: bool,
    ) -> SelectorResult<SqlFragment> {
        let operator = predicate.positive_operator();
        if operator != Operator::Equal {
            return Err(unsupported_operator(path, operator, "virtual path"));
        }
        let PredicateValue::Scalars(values) = &predicate.value else {
            return Err(invalid_value(path, "[...]", "expected a path"));
        };
        let values = distinct_values(values);
        let exclude = predicate.is_exclusion();

        if !exclude && !multi_field && values.len() == 1 {
            return self.join_path(builder, ctx, values[0]);
        }

        let mut conditions = Vec::with_capacity(values.len());
        for value in values {
            let subquery = self.path_subquery(value)?;
            conditions.push(SqlFragment::with_params(
                format!("pages.id IN ({})", subquery.sql),
                subquery.params,
            ));
        }
        let condition = SqlFragment::any(conditions);
        Ok(if exclude { condition.not() } else { condition })
    }

    /// Adds the ancestor joins for a path to `builder` and returns the
    /// condition on the joined chain.
    fn join_path(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        value: &Scalar,
    ) -> SelectorResult<SqlFragment> {
        let text = value.as_text();
        let segments: Vec<&str> = text
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let root = self.config.root_page_id;

        let Some((leaf, ancestors)) = segments.split_last() else {
            return Ok(SqlFragment::with_params(
                "pages.id = ?",
                vec![SqlParam::integer(root)],
            ));
        };

        let mut current = "pages".to_string();
        for segment in ancestors.iter().rev() {
            let alias = ctx.alias("path_pages");
            let on = SqlFragment::with_params(
                format!("{alias}.id = {current}.parent_id AND {alias}.name = ?"),
                vec![SqlParam::string(*segment)],
            );
            builder.join(Join::table(JoinKind::Inner, "pages", alias.as_str(), on));
            current = alias;
        }

        Ok(SqlFragment::with_params(
            "pages.name = ?",
            vec![SqlParam::string(*leaf)],
        )
        .and(SqlFragment::with_params(
            format!("{}.parent_id = ?", current),
            vec![SqlParam::integer(root)],
        )))
    }

    /// `SELECT pages.id ...` for the page at a path.
    pub(super) fn path_subquery(&self, value: &Scalar) -> SelectorResult<SqlFragment> {
        // aliases only need to be unique within the sub-select
        let mut ctx = CompileContext::new(0);
        let mut builder = QueryBuilder::new();
        let condition = self.join_path(&mut builder, &mut ctx, value)?;
        builder.where_(condition);
        Ok(render_id_subquery(&builder))
    }

    /// Resolves `has_parent=` against the ancestor closure in `pages_parents`.
    pub(super) fn resolve_has_parent(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        path: &str,
        predicate: &Predicate,
    ) -> SelectorResult<SqlFragment> {
        let operator = predicate.positive_operator();
        if operator != Operator::Equal {
            return Err(unsupported_operator(path, operator, "virtual has_parent"));
        }

        let mut ids: Vec<PageId> = Vec::new();
        let mut subqueries = Vec::new();
        match &predicate.value {
            PredicateValue::SubSelector(nested) => {
                ids.extend(self.sub_selector_ids(ctx, nested, None)?);
            }
            PredicateValue::Scalars(values) => {
                for value in distinct_values(values) {
                    if value.is_path() {
                        subqueries.push(self.path_subquery(value)?);
                    } else {
                        ids.push(value.as_i64().ok_or_else(|| {
                            invalid_value(path, value, "expected a page id or path")
                        })?);
                    }
                }
            }
            PredicateValue::OrGroup(_) => {
                return Err(invalid_value(path, "(...)", "OR-groups need a label"));
            }
        }

        let ancestors = |column: &str| -> SqlFragment {
            let mut conditions = Vec::new();
            if !ids.is_empty() {
                conditions.push(SqlFragment::in_list(
                    column,
                    ids.iter().map(|id| SqlParam::integer(*id)).collect(),
                ));
            }
            for subquery in &subqueries {
                conditions.push(SqlFragment::with_params(
                    format!("{} IN ({})", column, subquery.sql),
                    subquery.params.clone(),
                ));
            }
            if conditions.is_empty() {
                SqlFragment::always_false()
            } else {
                SqlFragment::any(conditions)
            }
        };

        if predicate.is_exclusion() {
            let alias = ctx.alias("pages_parents");
            let on = SqlFragment::new(format!("{}.pages_id = pages.id", alias))
                .and(ancestors(&format!("{}.parents_id", alias)));
            builder.join(Join::table(JoinKind::Left, "pages_parents", alias.as_str(), on));
            Ok(SqlFragment::new(format!("{}.pages_id IS NULL", alias)))
        } else {
            let inner = ancestors("pages_parents.parents_id");
            Ok(SqlFragment::with_params(
                format!(
                    "pages.id IN (SELECT pages_parents.pages_id FROM pages_parents WHERE {})",
                    inner.sql
                ),
                inner.params,
            ))
        }
    }

    /// Resolves `num_children`.
    ///
    /// When a page without children can match, the count comes from a LEFT
    /// JOIN aggregated in HAVING and `None` is returned. Otherwise the
    /// pre-aggregated counts are inner joined and the WHERE condition returned.
    pub(super) fn resolve_num_children(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        path: &str,
        predicate: &Predicate,
    ) -> SelectorResult<Option<SqlFragment>> {
        let operator = predicate.positive_operator();
        let Some(cmp) = operator.sql_comparison() else {
            return Err(unsupported_operator(path, operator, "virtual num_children"));
        };
        let PredicateValue::Scalars(values) = &predicate.value else {
            return Err(invalid_value(path, "[...]", "expected a count"));
        };

        let mut counts = Vec::new();
        for value in distinct_values(values) {
            let count = match value {
                Scalar::Null => 0,
                Scalar::Text(text) if text.trim().is_empty() => 0,
                _ => value
                    .as_i64()
                    .ok_or_else(|| invalid_value(path, value, "expected a count"))?,
            };
            counts.push(count);
        }

        let exclude = predicate.is_exclusion();
        let zero_matches = exclude
            || counts
                .iter()
                .any(|n| operator.compare(0.0, *n as f64) == Some(true));
        let alias = ctx.alias("children");
        let on = SqlFragment::new(format!("{}.parent_id = pages.id", alias));

        if zero_matches {
            builder.join(Join::table(JoinKind::Left, "pages", alias.as_str(), on));
            let count = format!("COUNT(DISTINCT {}.id)", alias);
            let condition = SqlFragment::any(counts.iter().map(|n| {
                SqlFragment::with_params(format!("{} {} ?", count, cmp), vec![SqlParam::integer(*n)])
            }));
            builder.having(if exclude { condition.not() } else { condition });
            Ok(None)
        } else {
            builder.join(Join::subquery(
                JoinKind::Inner,
                SqlFragment::new(CHILD_COUNTS),
                alias.as_str(),
                on,
            ));
            let condition = SqlFragment::any(counts.iter().map(|n| {
                SqlFragment::with_params(
                    format!("{}.num_children {} ?", alias, cmp),
                    vec![SqlParam::integer(*n)],
                )
            }));
            Ok(Some(condition))
        }
    }
}

/// Rewrites `owner.subfield op values` into `owner=[subfield op values]`,
/// keeping the exclusion on the outer predicate.
pub(super) fn nest_subfield(owner: &str, subfield: &str, predicate: &Predicate) -> Predicate {
    let nested = Predicate {
        fields: vec![subfield.to_string()],
        operator: predicate.positive_operator(),
        value: predicate.value.clone(),
        negate: false,
    };
    Predicate {
        fields: vec![owner.to_string()],
        operator: if predicate.is_exclusion() {
            Operator::NotEqual
        } else {
            Operator::Equal
        },
        value: PredicateValue::SubSelector(vec![nested]),
        negate: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nest_subfield_keeps_exclusion_outside() {
        let predicate = Predicate::new("parent.title", Operator::NotEqual, "News");
        let nested = nest_subfield("parent", "title", &predicate);
        assert_eq!(nested.fields, vec!["parent".to_string()]);
        assert!(nested.is_exclusion());

        let PredicateValue::SubSelector(inner) = &nested.value else {
            panic!("expected a sub-selector");
        };
        assert_eq!(inner[0].fields, vec!["title".to_string()]);
        assert_eq!(inner[0].operator, Operator::Equal);
        assert!(!inner[0].is_exclusion());
    }
}
