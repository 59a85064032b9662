//! Statement renderer.
//!
//! The only place SQL text is assembled from a [`QueryBuilder`]. Parameters
//! are appended in exactly the order their fragments are written, so the
//! positional `?` placeholders always line up with [`Statement::params`].

use super::builder::{JoinSource, QueryBuilder};
use super::fragment::{SqlFragment, SqlParam};

/// Which shape of statement was rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Returns matched rows.
    Select,
    /// Returns a single `total` column.
    Count,
}

/// A result column the executor should decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// `id`
    Id,
    /// `parent_id`
    ParentId,
    /// `templates_id`
    TemplatesId,
    /// `score`
    Score,
    /// `found_rows`, the match count ignoring LIMIT.
    FoundRows,
    /// Any other selected expression.
    Other,
}

impl Column {
    fn from_alias(alias: &str) -> Self {
        match alias {
            "id" => Column::Id,
            "parent_id" => Column::ParentId,
            "templates_id" => Column::TemplatesId,
            _ => Column::Other,
        }
    }
}

/// A finished statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// The SQL text.
    pub sql: String,
    /// Bound parameters, in placeholder order.
    pub params: Vec<SqlParam>,
    /// Statement shape.
    pub kind: StatementKind,
    /// Result columns in select order. Empty for count statements.
    pub columns: Vec<Column>,
}

impl Statement {
    /// Returns true if the statement carries a found-rows column.
    pub fn has_found_rows(&self) -> bool {
        self.columns.contains(&Column::FoundRows)
    }
}

struct Writer {
    sql: String,
    params: Vec<SqlParam>,
}

impl Writer {
    fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn push_fragment(&mut self, fragment: &SqlFragment) {
        self.sql.push_str(&fragment.sql);
        self.params.extend(fragment.params.iter().cloned());
    }

    fn push_joined(&mut self, fragments: &[SqlFragment], separator: &str, wrap: bool) {
        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            if wrap {
                self.push("(");
                self.push_fragment(fragment);
                self.push(")");
            } else {
                self.push_fragment(fragment);
            }
        }
    }

    fn finish(self) -> SqlFragment {
        SqlFragment::with_params(self.sql, self.params)
    }
}

/// Renders the main statement.
pub fn render(builder: &QueryBuilder) -> Statement {
    let mut w = Writer::new();
    let mut columns = Vec::new();

    w.push("SELECT ");
    for (i, (expr, alias)) in builder.selects.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.push_fragment(expr);
        w.push(" AS ");
        w.push(alias);
        columns.push(Column::from_alias(alias));
    }

    if builder.score_column || !builder.scores.is_empty() {
        w.push(", ");
        if builder.scores.is_empty() {
            w.push("0.0");
        } else {
            w.push("(");
            w.push_joined(&builder.scores, " + ", true);
            w.push(")");
        }
        w.push(" AS score");
        columns.push(Column::Score);
    }

    if builder.calc_found_rows {
        w.push(", COUNT(*) OVER () AS found_rows");
        columns.push(Column::FoundRows);
    }

    push_from_where(&mut w, builder);
    push_group_having(&mut w, builder);

    if !builder.order_bys.is_empty() {
        w.push(" ORDER BY ");
        for (i, order) in builder.order_bys.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push(&order.expr);
            if !order.raw {
                w.push(&format!(" {}", order.direction));
            }
        }
    }

    let offset = builder.offset.filter(|o| *o > 0);
    match (builder.limit, offset) {
        (Some(limit), offset) => {
            w.push(" LIMIT ?");
            w.params.push(bind_count(limit));
            if let Some(offset) = offset {
                w.push(" OFFSET ?");
                w.params.push(bind_count(offset));
            }
        }
        (None, Some(offset)) => {
            w.push(" LIMIT -1 OFFSET ?");
            w.params.push(bind_count(offset));
        }
        (None, None) => {}
    }

    let fragment = w.finish();
    Statement {
        sql: fragment.sql,
        params: fragment.params,
        kind: StatementKind::Select,
        columns,
    }
}

fn bind_count(n: u64) -> SqlParam {
    SqlParam::integer(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Renders the total-count statement: ordering, limits and selects stripped.
///
/// Builders with HAVING conditions are counted through a grouped sub-select,
/// since the aggregate conditions need the grouping to survive.
pub fn render_count(builder: &QueryBuilder) -> Statement {
    let mut w = Writer::new();

    if builder.havings.is_empty() {
        w.push("SELECT COUNT(DISTINCT pages.id) AS total");
        push_from_where(&mut w, builder);
    } else {
        w.push("SELECT COUNT(*) AS total FROM (SELECT pages.id");
        push_from_where(&mut w, builder);
        push_group_having(&mut w, builder);
        w.push(") AS matched");
    }

    let fragment = w.finish();
    Statement {
        sql: fragment.sql,
        params: fragment.params,
        kind: StatementKind::Count,
        columns: Vec::new(),
    }
}

/// Renders `SELECT pages.id ...` for embedding in an `IN (...)` condition.
pub fn render_id_subquery(builder: &QueryBuilder) -> SqlFragment {
    let mut w = Writer::new();
    w.push("SELECT pages.id");
    push_from_where(&mut w, builder);
    if !builder.havings.is_empty() {
        push_group_having(&mut w, builder);
    }
    w.finish()
}

fn push_from_where(w: &mut Writer, builder: &QueryBuilder) {
    w.push(" FROM pages");
    for join in &builder.joins {
        w.push(&format!(" {} ", join.kind));
        match &join.source {
            JoinSource::Table(table) => w.push(table),
            JoinSource::Subquery(subquery) => {
                w.push("(");
                w.push_fragment(subquery);
                w.push(")");
            }
        }
        w.push(" AS ");
        w.push(&join.alias);
        w.push(" ON ");
        w.push_fragment(&join.on);
    }

    if !builder.wheres.is_empty() {
        w.push(" WHERE ");
        w.push_joined(&builder.wheres, " AND ", builder.wheres.len() > 1);
    }
}

fn push_group_having(w: &mut Writer, builder: &QueryBuilder) {
    if !builder.group_bys.is_empty() {
        w.push(" GROUP BY ");
        w.push(&builder.group_bys.join(", "));
    }
    if !builder.havings.is_empty() {
        w.push(" HAVING ");
        w.push_joined(&builder.havings, " AND ", builder.havings.len() > 1);
    }
}
