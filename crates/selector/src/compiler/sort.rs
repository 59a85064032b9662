//! Sort directives and pagination.

use tracing::trace;

use crate::core::PaginationContext;
use crate::error::{SelectorResult, SyntaxError};
use crate::query::{Join, JoinKind, OrderBy, QueryBuilder, SortDirection, SqlFragment};
use crate::schema::{Classification, Directive, NativeColumn, VirtualAttribute, classify, split_path};
use crate::types::{CompileOptions, Predicate, TotalStrategy};

use super::Compilation;
use super::context::{CompileContext, SortToken};
use super::native::CHILD_COUNTS;

/// Pagination decided for one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pagination {
    pub limit: Option<u64>,
    pub start: u64,
    pub compute_total: bool,
    pub strategy: TotalStrategy,
}

/// Largest row count or offset SQLite binds.
const MAX_ROWS: u64 = i64::MAX as u64;

fn parse_count(directive: &str, predicate: &Predicate) -> SelectorResult<u64> {
    let invalid = |value: String| SyntaxError::InvalidDirective {
        directive: directive.to_string(),
        value,
    };
    let value = predicate
        .values()
        .first()
        .ok_or_else(|| invalid(String::new()))?;
    value
        .as_i64()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| invalid(value.to_string()).into())
}

impl Compilation<'_> {
    /// Consumes `sort`, `limit` and `start`. Only the first `limit` and
    /// `start` count.
    pub(super) fn apply_directive(
        &self,
        ctx: &mut CompileContext,
        directive: Directive,
        predicate: &Predicate,
    ) -> SelectorResult<()> {
        match directive {
            Directive::Sort => {
                for value in predicate.values() {
                    match SortToken::parse(value, predicate.negate) {
                        Some(token) => ctx.sorts.push(token),
                        None => {
                            return Err(SyntaxError::InvalidDirective {
                                directive: "sort".to_string(),
                                value: value.to_string(),
                            }
                            .into());
                        }
                    }
                }
            }
            Directive::Limit => {
                if ctx.limit.is_none() {
                    ctx.limit = Some(parse_count("limit", predicate)?);
                } else {
                    trace!("ignoring repeated limit");
                }
            }
            Directive::Start => {
                if ctx.start.is_none() {
                    ctx.start = Some(parse_count("start", predicate)?);
                } else {
                    trace!("ignoring repeated start");
                }
            }
            // consumed by the status pre-pass
            Directive::Include | Directive::CheckAccess => {}
        }
        Ok(())
    }

    /// Resolves sort tokens in reverse, prepending each, so the first token
    /// written ends up as the primary key.
    pub(super) fn apply_sorts(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
    ) -> SelectorResult<()> {
        let sorts = std::mem::take(&mut ctx.sorts);
        for token in sorts.iter().rev() {
            let order = self.resolve_sort(builder, ctx, token)?;
            builder.prepend_order_by(order);
        }

        if self.config.tie_break_by_id && !builder.order_bys.iter().any(|o| o.expr == "pages.id") {
            builder.order_by(OrderBy::new("pages.id", SortDirection::Ascending));
        }
        Ok(())
    }

    fn resolve_sort(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        token: &SortToken,
    ) -> SelectorResult<OrderBy> {
        let direction = token.direction;
        let (name, subfield) = split_path(&token.field);
        if name == "random" {
            return Ok(OrderBy::raw("RANDOM()"));
        }

        let invalid = || SyntaxError::InvalidDirective {
            directive: "sort".to_string(),
            value: token.field.clone(),
        };

        match classify(&token.field) {
            Classification::Directive(Directive::Sort) => Ok(OrderBy::new("pages.sort", direction)),
            Classification::Directive(_) => Err(invalid().into()),
            Classification::Virtual(VirtualAttribute::NumChildren) => {
                let alias = ctx.alias("children");
                builder.join(Join::subquery(
                    JoinKind::Left,
                    SqlFragment::new(CHILD_COUNTS),
                    alias.as_str(),
                    SqlFragment::new(format!("{}.parent_id = pages.id", alias)),
                ));
                Ok(OrderBy::new(
                    format!("COALESCE({}.num_children, 0)", alias),
                    direction,
                ))
            }
            Classification::Virtual(_) => Err(invalid().into()),
            Classification::Native(NativeColumn::Parent) => {
                let alias = ctx.alias("sort_parent");
                builder.join(Join::table(
                    JoinKind::Left,
                    "pages",
                    alias.as_str(),
                    SqlFragment::new(format!("{}.id = pages.parent_id", alias)),
                ));
                let expr = match subfield {
                    None => format!("{}.name", alias),
                    Some(subfield) => match NativeColumn::from_name(subfield) {
                        Some(column) => format!("{}.{}", alias, column.column()),
                        None => {
                            self.custom_sort(builder, ctx, &format!("{}.id", alias), subfield)?
                        }
                    },
                };
                Ok(OrderBy::new(expr, direction))
            }
            Classification::Native(NativeColumn::Template) => {
                let alias = ctx.alias("sort_templates");
                builder.join(Join::table(
                    JoinKind::Left,
                    "templates",
                    alias.as_str(),
                    SqlFragment::new(format!("{}.id = pages.templates_id", alias)),
                ));
                Ok(OrderBy::new(format!("{}.name", alias), direction))
            }
            Classification::Native(column) => {
                if subfield.is_some() {
                    return Err(invalid().into());
                }
                Ok(OrderBy::new(format!("pages.{}", column.column()), direction))
            }
            Classification::Custom => {
                let expr = self.custom_sort(builder, ctx, "pages.id", &token.field)?;
                Ok(OrderBy::new(expr, direction))
            }
        }
    }

    /// LEFT JOINs the field named by `path` onto the page `owner_id` and
    /// returns the expression to order by. Relation fields are followed into
    /// the referenced page's native column or field.
    fn custom_sort(
        &self,
        builder: &mut QueryBuilder,
        ctx: &mut CompileContext,
        owner_id: &str,
        path: &str,
    ) -> SelectorResult<String> {
        let (name, subfield) = split_path(path);
        let field = self.registry.field(name).ok_or_else(|| SyntaxError::UnknownField {
            field: path.to_string(),
        })?;
        let fieldtype = &field.fieldtype;

        let alias = ctx.alias(&field.table);
        builder.join(Join::table(
            JoinKind::Left,
            field.table.as_str(),
            alias.as_str(),
            SqlFragment::new(format!("{}.pages_id = {}", alias, owner_id)),
        ));

        let Some(subfield) = subfield else {
            return Ok(format!("MIN({}.{})", alias, fieldtype.primary_column()));
        };
        if let Some(column) = fieldtype.column_for(subfield) {
            return Ok(format!("MIN({}.{})", alias, column));
        }
        if !fieldtype.is_relation() {
            return Err(SyntaxError::UnknownSubfield {
                field: name.to_string(),
                subfield: subfield.to_string(),
            }
            .into());
        }

        let referenced = format!("{}.{}", alias, fieldtype.primary_column());
        match NativeColumn::from_name(subfield) {
            Some(column) => {
                let page_alias = ctx.alias("sort_ref");
                builder.join(Join::table(
                    JoinKind::Left,
                    "pages",
                    page_alias.as_str(),
                    SqlFragment::new(format!("{}.id = {}", page_alias, referenced)),
                ));
                Ok(format!("MIN({}.{})", page_alias, column.column()))
            }
            None => self.custom_sort(builder, ctx, &referenced, subfield),
        }
    }

    /// Decides LIMIT, OFFSET and the total strategy.
    pub(super) fn apply_pagination(
        &self,
        builder: &mut QueryBuilder,
        ctx: &CompileContext,
        options: &CompileOptions,
    ) -> Pagination {
        let (limit, start) = if options.find_one {
            (Some(1), 0)
        } else {
            // pagination context only applies to the outermost listing
            let page = if ctx.depth == 0 {
                u64::from(self.request.page_number())
            } else {
                1
            };
            let start = match (ctx.start, ctx.limit) {
                (Some(start), _) => start,
                (None, Some(limit)) => page.saturating_sub(1).saturating_mul(limit).min(MAX_ROWS),
                (None, None) => 0,
            };
            (ctx.limit, start)
        };

        let compute_total = options
            .compute_total
            .unwrap_or(!options.find_one && (ctx.limit.is_some() || ctx.start.is_some()));
        let strategy = options
            .total_strategy
            .unwrap_or(self.config.default_total_strategy);

        if let Some(limit) = limit {
            builder.limit(limit);
        }
        if start > 0 {
            builder.offset(start);
        }
        if compute_total && strategy == TotalStrategy::Calc {
            builder.calc_found_rows(true);
        }

        Pagination {
            limit,
            start,
            compute_total,
            strategy,
        }
    }
}
