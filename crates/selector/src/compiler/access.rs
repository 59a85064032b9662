//! Status and access filtering.
//!
//! The pre-pass consumes `include=` and `check_access=` directives before any
//! predicate is resolved. After the main loop the status ceiling and the
//! role-based template filter are injected, exactly once per top-level
//! compile; sub-compiles always run with `include_all`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::{SelectorResult, SyntaxError};
use crate::query::{Join, JoinKind, QueryBuilder, SqlFragment, SqlParam};
use crate::schema::{Classification, Directive, NativeColumn, SchemaRegistry, classify};
use crate::types::{CompileOptions, Predicate, RoleId, Scalar, Status, TemplateId};

use super::Compilation;
use super::context::CompileContext;

/// Templates an identity may and may not see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AccessSets {
    pub allowed: Vec<TemplateId>,
    pub denied: Vec<TemplateId>,
}

impl AccessSets {
    fn compute(registry: &SchemaRegistry, roles: &[RoleId]) -> Self {
        let mut sets = AccessSets::default();
        for template in registry.templates() {
            if template.allows(roles) {
                sets.allowed.push(template.id);
            } else {
                sets.denied.push(template.id);
            }
        }
        sets.allowed.sort_unstable();
        sets.denied.sort_unstable();
        sets
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AccessKey {
    generation: u64,
    roles: Vec<RoleId>,
}

/// Resolved access sets per role set, valid for one registry generation.
#[derive(Debug, Default)]
pub(crate) struct AccessCache {
    entries: RwLock<HashMap<AccessKey, Arc<AccessSets>>>,
}

impl AccessCache {
    pub fn get_or_compute(&self, registry: &SchemaRegistry, mut roles: Vec<RoleId>) -> Arc<AccessSets> {
        roles.sort_unstable();
        roles.dedup();
        let key = AccessKey {
            generation: registry.generation(),
            roles,
        };

        if let Some(sets) = self.entries.read().get(&key) {
            return Arc::clone(sets);
        }

        let sets = Arc::new(AccessSets::compute(registry, &key.roles));
        let mut entries = self.entries.write();
        // entries of older generations can never be hit again
        entries.retain(|k, _| k.generation == key.generation);
        entries.insert(key, Arc::clone(&sets));
        sets
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// The exclusive upper bound on `pages.status`, or `None` for no bound.
pub(crate) fn status_ceiling(options: &CompileOptions, explicit_status: bool) -> Option<Status> {
    if options.include_all {
        return None;
    }
    let ceiling = if options.include_trash {
        Status::DELETED
    } else if options.include_unpublished {
        Status::TRASH
    } else if options.include_hidden || options.find_one || explicit_status {
        Status::UNPUBLISHED
    } else {
        Status::HIDDEN
    };
    Some(ceiling)
}

fn parse_flag(directive: &str, value: &Scalar) -> SelectorResult<bool> {
    match value.as_text().trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(SyntaxError::InvalidDirective {
            directive: directive.to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

impl Compilation<'_> {
    /// Consumes status-related directives into `options` and returns the
    /// predicates left to resolve.
    pub(crate) fn status_prepass<'p>(
        &self,
        ctx: &mut CompileContext,
        options: &mut CompileOptions,
        predicates: &'p [Predicate],
    ) -> SelectorResult<Vec<&'p Predicate>> {
        let mut remaining = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            match classify(predicate.field()) {
                Classification::Directive(Directive::Include) => {
                    for value in predicate.values() {
                        match value.as_text().trim().to_ascii_lowercase().as_str() {
                            "hidden" => options.include_hidden = true,
                            "unpublished" => options.include_unpublished = true,
                            "trash" | "trashed" => options.include_trash = true,
                            "all" => options.include_all = true,
                            other => {
                                return Err(SyntaxError::InvalidDirective {
                                    directive: "include".to_string(),
                                    value: other.to_string(),
                                }
                                .into());
                            }
                        }
                    }
                    trace!(values = predicate.values().len(), "consumed include directive");
                }
                Classification::Directive(Directive::CheckAccess) => {
                    for value in predicate.values() {
                        options.check_access = parse_flag("check_access", value)?;
                    }
                }
                _ => {
                    let names_status = predicate.fields.iter().any(|field| {
                        classify(field) == Classification::Native(NativeColumn::Status)
                    });
                    if names_status {
                        ctx.explicit_status = true;
                    }
                    remaining.push(predicate);
                }
            }
        }
        Ok(remaining)
    }

    /// Appends the status ceiling and the template access filter.
    pub(crate) fn apply_status_and_access(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        options: &CompileOptions,
    ) {
        if options.include_all {
            trace!("include=all: no status or access filter");
            return;
        }

        if let Some(ceiling) = status_ceiling(options, ctx.explicit_status) {
            builder.where_(SqlFragment::with_params(
                "pages.status < ?",
                vec![SqlParam::integer(i64::from(ceiling.bits()))],
            ));
        }

        let identity = self.request.identity();
        if !options.check_access || identity.is_privileged() {
            return;
        }

        let sets = self.access_cache.get_or_compute(self.registry, identity.roles());
        if sets.denied.is_empty() {
            return;
        }

        let ids = |list: &[TemplateId]| -> Vec<SqlParam> {
            list.iter().map(|id| SqlParam::integer(*id)).collect()
        };
        let template_filter = if sets.allowed.len() <= sets.denied.len() {
            SqlFragment::in_list("pages.templates_id", ids(&sets.allowed))
        } else {
            SqlFragment::not_in_list("pages.templates_id", ids(&sets.denied))
        };
        builder.where_(template_filter);

        // pages whose access is governed by a denied ancestor template
        let alias = ctx.alias("pages_access");
        let denied = SqlFragment::in_list(&format!("{}.templates_id", alias), ids(&sets.denied));
        let on = SqlFragment::new(format!("{}.pages_id = pages.id", alias)).and(denied);
        builder.join(Join::table(JoinKind::Left, "pages_access", alias.as_str(), on));
        builder.where_(SqlFragment::new(format!("{}.pages_id IS NULL", alias)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TemplateDefinition;

    #[test]
    fn test_status_ceiling() {
        let default = CompileOptions::default();
        assert_eq!(status_ceiling(&default, false), Some(Status::HIDDEN));
        assert_eq!(status_ceiling(&default, true), Some(Status::UNPUBLISHED));
        assert_eq!(
            status_ceiling(&CompileOptions::find_one(), false),
            Some(Status::UNPUBLISHED)
        );

        let unpublished = CompileOptions {
            include_unpublished: true,
            ..Default::default()
        };
        assert_eq!(status_ceiling(&unpublished, true), Some(Status::TRASH));

        let trash = CompileOptions {
            include_trash: true,
            ..Default::default()
        };
        assert_eq!(status_ceiling(&trash, false), Some(Status::DELETED));
        assert_eq!(status_ceiling(&CompileOptions::include_all(), false), None);
    }

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register_template(TemplateDefinition::new(1, "basic"))
            .unwrap();
        registry
            .register_template(TemplateDefinition::new(2, "members").with_view_roles([7]))
            .unwrap();
        registry
            .register_template(TemplateDefinition::new(3, "staff").with_view_roles([8]))
            .unwrap();
        registry
    }

    #[test]
    fn test_access_sets() {
        let registry = registry();
        let guest = AccessSets::compute(&registry, &[]);
        assert_eq!(guest.allowed, vec![1]);
        assert_eq!(guest.denied, vec![2, 3]);

        let member = AccessSets::compute(&registry, &[7]);
        assert_eq!(member.allowed, vec![1, 2]);
        assert_eq!(member.denied, vec![3]);
    }

    #[test]
    fn test_access_cache_keys_on_generation() {
        let mut registry = registry();
        let cache = AccessCache::default();

        let first = cache.get_or_compute(&registry, vec![7, 7]);
        let second = cache.get_or_compute(&registry, vec![7]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        registry
            .update_template(TemplateDefinition::new(3, "staff").with_view_roles([7, 8]))
            .unwrap();
        let third = cache.get_or_compute(&registry, vec![7]);
        assert_eq!(third.denied, Vec::<TemplateId>::new());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("check_access", &Scalar::from(1)).unwrap());
        assert!(!parse_flag("check_access", &Scalar::from("0")).unwrap());
        assert!(parse_flag("check_access", &Scalar::from("maybe")).is_err());
    }
}
