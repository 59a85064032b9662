//! The selector compiler.
//!
//! [`SelectorCompiler::compile`] turns an ordered predicate list into one
//! parameterised SELECT over `pages`, runs it through the configured
//! [`StatementExecutor`], and optionally computes the total match count.
//!
//! # Compile pipeline
//!
//! 1. status pre-pass: `include=` and `check_access=` directives adjust the
//!    options and are removed
//! 2. every remaining predicate is resolved in source order against a fresh
//!    [`QueryBuilder`]; `sort`, `limit` and `start` are deferred
//! 3. OR-groups are folded in as id sub-selects
//! 4. the status ceiling and role-based access filter are appended
//! 5. sorts are resolved, then LIMIT/OFFSET and the total strategy decided
//! 6. the statement is rendered and executed; the total is counted when asked
//!
//! Sub-selectors (`field=[...]`) and OR-group alternatives (`label=(...)`)
//! re-enter step 1 one nesting level deeper, with `include_all` set so that
//! status and access are applied once, at the top.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use folio_selector::backends::sqlite::SqliteExecutor;
//! use folio_selector::core::RequestContext;
//! use folio_selector::schema::SchemaRegistry;
//! use folio_selector::types::{CompileOptions, Predicate};
//! use folio_selector::SelectorCompiler;
//! use parking_lot::RwLock;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(RwLock::new(SchemaRegistry::new()));
//! let executor = Arc::new(SqliteExecutor::open("site.db")?);
//! let compiler = SelectorCompiler::new(registry, executor);
//!
//! let result = compiler.compile(
//!     &RequestContext::guest(),
//!     &[Predicate::eq("template", "article"), Predicate::eq("limit", 10)],
//!     &CompileOptions::default(),
//! )?;
//! println!("{} of {:?}", result.len(), result.total);
//! # Ok(())
//! # }
//! ```

mod access;
mod context;
mod fields;
mod native;
mod nested;
mod sort;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::config::CompilerConfig;
use crate::core::{RequestContext, StatementExecutor};
use crate::error::{SelectorError, SelectorResult, SyntaxError};
use crate::query::{QueryBuilder, SqlFragment, Statement, render, render_count};
use crate::schema::{Classification, SchemaRegistry, VirtualAttribute, classify};
use crate::types::{
    CompileOptions, CompileResult, Operator, Predicate, PredicateValue, Scalar, TotalStrategy,
    VerboseRow,
};

use access::AccessCache;
use context::CompileContext;
use sort::Pagination;

/// Compiles predicate lists into page ids.
///
/// A compiler is cheap to share: every compile call builds its own
/// statement and context. The only state kept between calls is the access
/// cache, keyed by registry generation.
pub struct SelectorCompiler {
    registry: Arc<RwLock<SchemaRegistry>>,
    executor: Arc<dyn StatementExecutor>,
    config: CompilerConfig,
    access_cache: AccessCache,
}

impl SelectorCompiler {
    /// Creates a compiler with the default configuration.
    pub fn new(registry: Arc<RwLock<SchemaRegistry>>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self::with_config(registry, executor, CompilerConfig::default())
    }

    /// Creates a compiler with the given configuration.
    pub fn with_config(
        registry: Arc<RwLock<SchemaRegistry>>,
        executor: Arc<dyn StatementExecutor>,
        config: CompilerConfig,
    ) -> Self {
        Self {
            registry,
            executor,
            config,
            access_cache: AccessCache::default(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// The shared schema registry.
    pub fn registry(&self) -> &Arc<RwLock<SchemaRegistry>> {
        &self.registry
    }

    /// Drops all cached access sets.
    pub fn clear_access_cache(&self) {
        self.access_cache.clear();
    }

    /// Compiles and executes `predicates`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::Syntax`] for unknown fields, unsupported
    /// operators, bad values and excessive nesting, and
    /// [`SelectorError::Execution`] when the main statement (or a
    /// sub-selector) fails. A failing count statement does not fail the
    /// call; the total is reported as `None`.
    pub fn compile(
        &self,
        ctx: &RequestContext,
        predicates: &[Predicate],
        options: &CompileOptions,
    ) -> SelectorResult<CompileResult> {
        let registry = self.registry.read();
        let compilation = self.compilation(&registry, ctx);
        let plan = compilation.plan(predicates, options, 0)?;
        compilation.run(plan)
    }

    /// Builds the main statement without executing it.
    ///
    /// Sub-selectors are still executed, since their ids are bound into the
    /// statement.
    pub fn build_statement(
        &self,
        ctx: &RequestContext,
        predicates: &[Predicate],
        options: &CompileOptions,
    ) -> SelectorResult<Statement> {
        let registry = self.registry.read();
        let plan = self.compilation(&registry, ctx).plan(predicates, options, 0)?;
        Ok(render(&plan.builder))
    }

    fn compilation<'a>(
        &'a self,
        registry: &'a SchemaRegistry,
        request: &'a RequestContext,
    ) -> Compilation<'a> {
        Compilation {
            config: &self.config,
            registry,
            executor: self.executor.as_ref(),
            request,
            access_cache: &self.access_cache,
            now: Utc::now(),
        }
    }
}

impl std::fmt::Debug for SelectorCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorCompiler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Everything one top-level compile call shares with its sub-compiles.
pub(crate) struct Compilation<'a> {
    config: &'a CompilerConfig,
    registry: &'a SchemaRegistry,
    executor: &'a dyn StatementExecutor,
    request: &'a RequestContext,
    access_cache: &'a AccessCache,
    /// Reference time for relative dates, fixed for the whole call.
    now: DateTime<Utc>,
}

/// A finished builder and the decisions needed to run it.
pub(crate) struct Plan {
    builder: QueryBuilder,
    pagination: Pagination,
    verbose: bool,
}

impl Compilation<'_> {
    fn plan(
        &self,
        predicates: &[Predicate],
        options: &CompileOptions,
        depth: usize,
    ) -> SelectorResult<Plan> {
        if depth > self.config.max_nesting_depth {
            return Err(SyntaxError::NestingTooDeep {
                depth,
                max: self.config.max_nesting_depth,
            }
            .into());
        }

        let mut ctx = CompileContext::new(depth);
        let mut options = options.clone();
        let predicates = self.status_prepass(&mut ctx, &mut options, predicates)?;

        let mut builder = QueryBuilder::new();
        let verbose = options.wants_verbose_rows();
        if verbose {
            builder.select(SqlFragment::new("pages.parent_id"), "parent_id");
            builder.select(SqlFragment::new("pages.templates_id"), "templates_id");
            builder.select_score();
        }

        for predicate in predicates {
            self.resolve_predicate(&mut builder, &mut ctx, predicate)?;
        }

        self.apply_or_groups(&mut builder, &mut ctx)?;
        self.apply_status_and_access(&mut builder, &mut ctx, &options);
        self.apply_sorts(&mut builder, &mut ctx)?;
        let pagination = self.apply_pagination(&mut builder, &ctx, &options);

        Ok(Plan {
            builder,
            pagination,
            verbose,
        })
    }

    fn resolve_predicate(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        predicate: &Predicate,
    ) -> SelectorResult<()> {
        if predicate.fields.is_empty() {
            return Err(SyntaxError::UnknownField {
                field: String::new(),
            }
            .into());
        }
        trace!(
            fields = ?predicate.fields,
            operator = %predicate.operator,
            negate = predicate.negate,
            depth = ctx.depth,
            "resolving predicate"
        );

        if let PredicateValue::OrGroup(alternative) = &predicate.value {
            ctx.add_or_group(predicate.field(), alternative.clone(), predicate.is_exclusion());
            return Ok(());
        }

        let multi_field = predicate.fields.len() > 1;
        if let Classification::Directive(directive) = classify(predicate.field()) {
            if multi_field {
                return Err(SyntaxError::UnsupportedMultiField {
                    field: predicate.field().to_string(),
                }
                .into());
            }
            return self.apply_directive(ctx, directive, predicate);
        }

        let mut conditions = Vec::with_capacity(predicate.fields.len());
        for path in &predicate.fields {
            let condition = match classify(path) {
                Classification::Directive(_) => {
                    return Err(SyntaxError::UnsupportedMultiField {
                        field: path.clone(),
                    }
                    .into());
                }
                Classification::Native(column) => {
                    self.resolve_native(builder, ctx, path, column, predicate)?
                }
                Classification::Virtual(VirtualAttribute::Path) => {
                    self.resolve_path(builder, ctx, path, predicate, multi_field)?
                }
                Classification::Virtual(VirtualAttribute::HasParent) => {
                    self.resolve_has_parent(builder, ctx, path, predicate)?
                }
                Classification::Virtual(VirtualAttribute::NumChildren) => {
                    if multi_field {
                        return Err(SyntaxError::UnsupportedMultiField {
                            field: path.clone(),
                        }
                        .into());
                    }
                    match self.resolve_num_children(builder, ctx, path, predicate)? {
                        Some(condition) => condition,
                        None => continue,
                    }
                }
                Classification::Custom => {
                    self.resolve_custom(builder, ctx, path, predicate, multi_field)?
                }
            };
            conditions.push(condition);
        }

        builder.where_(SqlFragment::any(conditions));
        Ok(())
    }

    fn run(&self, plan: Plan) -> SelectorResult<CompileResult> {
        let statement = render(&plan.builder);
        debug!(
            sql = %statement.sql,
            params = statement.params.len(),
            "executing selector statement"
        );
        let rowset = self.executor.select(&statement)?;

        let verbose_rows = plan.verbose.then(|| {
            rowset
                .rows
                .iter()
                .map(|row| VerboseRow {
                    id: row.id,
                    parent_id: row.parent_id.unwrap_or_default(),
                    templates_id: row.templates_id.unwrap_or_default(),
                    score: row.score.unwrap_or_default(),
                })
                .collect()
        });
        let ids: Vec<_> = rowset.rows.iter().map(|row| row.id).collect();
        let returned = ids.len() as u64;

        let Pagination {
            limit,
            start,
            compute_total,
            strategy,
        } = plan.pagination;
        let total = if !compute_total {
            Some(returned)
        } else {
            match (strategy, rowset.found_rows) {
                (TotalStrategy::Calc, Some(found)) => Some(found),
                // no row carried the counter: either nothing matched, or
                // the page is past the end
                (TotalStrategy::Calc, None) if start == 0 => Some(returned),
                _ => self.count_total(&plan.builder),
            }
        };

        Ok(CompileResult {
            ids,
            verbose_rows,
            total,
            limit,
            start,
        })
    }

    fn count_total(&self, builder: &QueryBuilder) -> Option<u64> {
        let statement = render_count(builder);
        debug!(
            sql = %statement.sql,
            params = statement.params.len(),
            "executing count statement"
        );
        match self.executor.count(&statement) {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(error = %e, "total count failed, reporting total as unknown");
                None
            }
        }
    }
}

/// Distinct values in first-seen order. An empty list stands for the blank
/// value.
pub(crate) fn distinct_values(values: &[Scalar]) -> Vec<&Scalar> {
    static BLANK: Scalar = Scalar::Null;

    if values.is_empty() {
        return vec![&BLANK];
    }
    let mut distinct: Vec<&Scalar> = Vec::with_capacity(values.len());
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    distinct
}

pub(crate) fn unsupported_operator(
    field: &str,
    operator: Operator,
    classification: impl Into<String>,
) -> SelectorError {
    SyntaxError::UnsupportedOperator {
        field: field.to_string(),
        operator: operator.to_string(),
        classification: classification.into(),
    }
    .into()
}

pub(crate) fn invalid_value(
    field: &str,
    value: impl ToString,
    message: impl Into<String>,
) -> SelectorError {
    SyntaxError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        message: message.into(),
    }
    .into()
}
