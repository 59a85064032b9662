//! Sub-selectors and OR-groups.
//!
//! Both compile an embedded predicate list with a fresh builder at the next
//! nesting depth. Sub-selectors are executed right away and contribute their
//! ids; OR-group alternatives stay embedded as `pages.id IN (SELECT ...)`.

use tracing::debug;

use crate::error::SelectorResult;
use crate::query::{QueryBuilder, SqlFragment, render, render_id_subquery};
use crate::schema::{Classification, NativeColumn, RelationScope, VirtualAttribute, classify};
use crate::types::{CompileOptions, Operator, PageId, Predicate};

use super::Compilation;
use super::context::CompileContext;

/// Options of every nested compile: status and access are the outer
/// compile's concern.
fn nested_options() -> CompileOptions {
    CompileOptions {
        include_all: true,
        load_entities: false,
        compute_total: Some(false),
        ..Default::default()
    }
}

/// Returns true if the predicates already say which templates or parents
/// they search.
fn names_scope(predicates: &[Predicate]) -> bool {
    predicates.iter().flat_map(|p| p.fields.iter()).any(|field| {
        matches!(
            classify(field),
            Classification::Native(NativeColumn::Template | NativeColumn::Parent)
                | Classification::Virtual(VirtualAttribute::HasParent)
        )
    })
}

impl Compilation<'_> {
    /// Compiles and runs an embedded predicate list, returning its page ids.
    ///
    /// A non-empty `scope` narrows lists that don't name a template or parent
    /// themselves.
    pub(super) fn sub_selector_ids(
        &self,
        ctx: &CompileContext,
        predicates: &[Predicate],
        scope: Option<&RelationScope>,
    ) -> SelectorResult<Vec<PageId>> {
        let mut predicates = predicates.to_vec();
        if let Some(scope) = scope {
            if self.config.sub_selector_scope && !scope.is_empty() && !names_scope(&predicates) {
                if !scope.template_ids.is_empty() {
                    predicates.insert(
                        0,
                        Predicate::any_of("template", Operator::Equal, scope.template_ids.clone()),
                    );
                }
                if let Some(parent_id) = scope.parent_id {
                    predicates.insert(0, Predicate::eq("parent", parent_id));
                }
            }
        }

        let plan = self.plan(&predicates, &nested_options(), ctx.depth + 1)?;
        let statement = render(&plan.builder);
        debug!(
            depth = ctx.depth + 1,
            sql = %statement.sql,
            params = statement.params.len(),
            "executing sub-selector"
        );
        let rows = self.executor.select(&statement)?;
        Ok(rows.rows.into_iter().map(|row| row.id).collect())
    }

    /// Folds the collected OR-groups into `builder`: alternatives under one
    /// label are ORed, labels are ANDed.
    pub(super) fn apply_or_groups(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
    ) -> SelectorResult<()> {
        let groups = std::mem::take(&mut ctx.or_groups);
        for group in groups {
            let mut alternatives = Vec::with_capacity(group.alternatives.len());
            for alternative in &group.alternatives {
                let plan = self.plan(&alternative.predicates, &nested_options(), ctx.depth + 1)?;
                let subquery = render_id_subquery(&plan.builder);
                let membership = if alternative.negate { "NOT IN" } else { "IN" };
                alternatives.push(SqlFragment::with_params(
                    format!("pages.id {} ({})", membership, subquery.sql),
                    subquery.params,
                ));
            }
            debug!(
                label = %group.label,
                alternatives = alternatives.len(),
                "applying OR-group"
            );
            builder.where_(SqlFragment::any(alternatives));
        }
        Ok(())
    }
}
