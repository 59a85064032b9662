//! Statement execution contract.

use crate::error::SelectorResult;
use crate::query::Statement;
use crate::types::{PageId, TemplateId};

/// A result row of a select statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// The page id.
    pub id: PageId,
    /// Parent id, when selected.
    pub parent_id: Option<PageId>,
    /// Template id, when selected.
    pub templates_id: Option<TemplateId>,
    /// Relevance score, when selected.
    pub score: Option<f64>,
}

impl Row {
    /// A row carrying only an id.
    pub fn id(id: PageId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Rows returned by a select statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    /// The rows, in statement order.
    pub rows: Vec<Row>,
    /// Matches ignoring LIMIT, when the statement carried a found-rows column
    /// and returned at least one row.
    pub found_rows: Option<u64>,
}

/// Executes rendered statements against a store.
///
/// Timeouts and retries are the executor's business; the compiler calls it
/// synchronously and treats any error from [`select`](Self::select) as fatal.
pub trait StatementExecutor: Send + Sync {
    /// Runs a select statement and decodes the columns it declares.
    fn select(&self, statement: &Statement) -> SelectorResult<RowSet>;

    /// Runs a count statement and returns its single value.
    fn count(&self, statement: &Statement) -> SelectorResult<u64>;
}
