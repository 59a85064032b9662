//! Mutable SELECT statement accumulator.
//!
//! A [`QueryBuilder`] is created fresh for every compile call (and for every
//! recursive sub-compile) and is mutated in place by the resolvers. Nothing is
//! turned into SQL until [`super::render`] runs over the finished builder.

use std::fmt;

use super::fragment::SqlFragment;

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "JOIN"),
            JoinKind::Left => write!(f, "LEFT JOIN"),
        }
    }
}

/// What a join reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinSource {
    /// A table, by name.
    Table(String),
    /// A parenthesised sub-select.
    Subquery(SqlFragment),
}

/// A single join clause. The alias is unique within its builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join flavour.
    pub kind: JoinKind,
    /// Table or sub-select being joined.
    pub source: JoinSource,
    /// Alias the rest of the statement refers to.
    pub alias: String,
    /// The ON condition.
    pub on: SqlFragment,
}

impl Join {
    /// Joins a table.
    pub fn table(
        kind: JoinKind,
        table: impl Into<String>,
        alias: impl Into<String>,
        on: SqlFragment,
    ) -> Self {
        Self {
            kind,
            source: JoinSource::Table(table.into()),
            alias: alias.into(),
            on,
        }
    }

    /// Joins a sub-select.
    pub fn subquery(
        kind: JoinKind,
        subquery: SqlFragment,
        alias: impl Into<String>,
        on: SqlFragment,
    ) -> Self {
        Self {
            kind,
            source: JoinSource::Subquery(subquery),
            alias: alias.into(),
            on,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Ascending,
    /// Descending.
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "ASC"),
            SortDirection::Descending => write!(f, "DESC"),
        }
    }
}

/// An ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// The expression to order by.
    pub expr: String,
    /// Direction, ignored for raw entries.
    pub direction: SortDirection,
    /// Emit the expression as-is, without a direction (e.g. `RANDOM()`).
    pub raw: bool,
}

impl OrderBy {
    /// A directed ORDER BY entry.
    pub fn new(expr: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            expr: expr.into(),
            direction,
            raw: false,
        }
    }

    /// A raw ORDER BY entry.
    pub fn raw(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            direction: SortDirection::Ascending,
            raw: true,
        }
    }
}

/// Additions a resolver wants merged into the statement.
///
/// Field types return one of these from their match clause; the compiler
/// decides how its `wheres` are combined with other values and negation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFragment {
    /// Extra select expressions.
    pub selects: Vec<SqlFragment>,
    /// Extra joins.
    pub joins: Vec<Join>,
    /// Conditions, ANDed together.
    pub wheres: Vec<SqlFragment>,
    /// Extra ORDER BY entries.
    pub order_bys: Vec<OrderBy>,
    /// Extra GROUP BY expressions.
    pub group_bys: Vec<String>,
    /// Relevance terms summed into the score column.
    pub scores: Vec<SqlFragment>,
}

impl QueryFragment {
    /// A fragment holding only a condition.
    pub fn condition(condition: SqlFragment) -> Self {
        Self {
            wheres: vec![condition],
            ..Default::default()
        }
    }

    /// Adds a relevance term.
    pub fn with_score(mut self, score: SqlFragment) -> Self {
        self.scores.push(score);
        self
    }

    /// Splits off the ANDed conditions, leaving the rest of the fragment.
    pub fn take_condition(&mut self) -> SqlFragment {
        SqlFragment::all(std::mem::take(&mut self.wheres))
    }
}

/// A SELECT over `pages` under construction.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub(crate) selects: Vec<(SqlFragment, String)>,
    pub(crate) joins: Vec<Join>,
    pub(crate) wheres: Vec<SqlFragment>,
    pub(crate) group_bys: Vec<String>,
    pub(crate) havings: Vec<SqlFragment>,
    pub(crate) order_bys: Vec<OrderBy>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) calc_found_rows: bool,
    pub(crate) scores: Vec<SqlFragment>,
    pub(crate) score_column: bool,
}

impl QueryBuilder {
    /// Creates a builder selecting `pages.id`, grouped by it to collapse the
    /// duplicate rows produced by multi-value joins.
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.select(SqlFragment::new("pages.id"), "id");
        builder.group_by("pages.id");
        builder
    }

    /// Adds a select expression under the given column alias.
    pub fn select(&mut self, expr: SqlFragment, alias: impl Into<String>) -> &mut Self {
        let alias = alias.into();
        if !self.selects.iter().any(|(_, a)| *a == alias) {
            self.selects.push((expr, alias));
        }
        self
    }

    /// Adds a join. A join whose alias is already present is ignored.
    pub fn join(&mut self, join: Join) -> &mut Self {
        if !self.has_join(&join.alias) {
            self.joins.push(join);
        }
        self
    }

    /// Returns true if a join with this alias exists.
    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|j| j.alias == alias)
    }

    /// Adds a WHERE condition, ANDed with the others.
    pub fn where_(&mut self, condition: SqlFragment) -> &mut Self {
        if !condition.is_empty() {
            self.wheres.push(condition);
        }
        self
    }

    /// Adds a HAVING condition, ANDed with the others.
    pub fn having(&mut self, condition: SqlFragment) -> &mut Self {
        if !condition.is_empty() {
            self.havings.push(condition);
        }
        self
    }

    /// Adds a GROUP BY expression.
    pub fn group_by(&mut self, expr: impl Into<String>) -> &mut Self {
        let expr = expr.into();
        if !self.group_bys.contains(&expr) {
            self.group_bys.push(expr);
        }
        self
    }

    /// Appends an ORDER BY entry as the lowest-priority key.
    pub fn order_by(&mut self, order: OrderBy) -> &mut Self {
        self.order_bys.push(order);
        self
    }

    /// Inserts an ORDER BY entry as the highest-priority key.
    pub fn prepend_order_by(&mut self, order: OrderBy) -> &mut Self {
        self.order_bys.insert(0, order);
        self
    }

    /// Sets LIMIT.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Sets OFFSET.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Requests a found-rows counter on the main statement.
    pub fn calc_found_rows(&mut self, enabled: bool) -> &mut Self {
        self.calc_found_rows = enabled;
        self
    }

    /// Adds a relevance term to the score column.
    pub fn score(&mut self, term: SqlFragment) -> &mut Self {
        self.scores.push(term);
        self
    }

    /// Selects the score column even when no relevance term exists.
    pub fn select_score(&mut self) -> &mut Self {
        self.score_column = true;
        self
    }

    /// Merges everything but the conditions of a resolver fragment.
    ///
    /// Conditions are left to the caller, who combines them with negation
    /// and the other values of the predicate.
    pub fn merge(&mut self, fragment: QueryFragment) -> &mut Self {
        let QueryFragment {
            selects,
            joins,
            wheres,
            order_bys,
            group_bys,
            scores,
        } = fragment;
        debug_assert!(wheres.is_empty(), "conditions must be taken before merging");
        for select in selects {
            let alias = format!("extra_{}", self.selects.len());
            self.select(select, alias);
        }
        for join in joins {
            self.join(join);
        }
        self.order_bys.extend(order_bys);
        for group in group_bys {
            self.group_by(group);
        }
        self.scores.extend(scores);
        self
    }

    /// Returns true if any WHERE condition has been added.
    pub fn has_conditions(&self) -> bool {
        !self.wheres.is_empty()
    }

    /// Returns true if any HAVING condition has been added.
    pub fn has_having(&self) -> bool {
        !self.havings.is_empty()
    }

    /// The column aliases selected, in order.
    pub fn column_aliases(&self) -> impl Iterator<Item = &str> {
        self.selects.iter().map(|(_, alias)| alias.as_str())
    }
}
