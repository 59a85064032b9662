//! Compile results.

use serde::{Deserialize, Serialize};

use super::{PageId, TemplateId};

/// A matched page with the columns needed to hydrate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerboseRow {
    /// The page id.
    pub id: PageId,
    /// The parent page id.
    pub parent_id: PageId,
    /// The page's template id.
    pub templates_id: TemplateId,
    /// Relevance score from word searches, 0 otherwise.
    pub score: f64,
}

/// The outcome of a compile call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompileResult {
    /// Matched page ids, in result order.
    pub ids: Vec<PageId>,
    /// Verbose rows, when requested.
    pub verbose_rows: Option<Vec<VerboseRow>>,
    /// Number of pages matching without limit.
    ///
    /// Equals `ids.len()` when the total was not requested. `None` when
    /// the count statement failed after the main statement succeeded.
    pub total: Option<u64>,
    /// The limit applied, if any.
    pub limit: Option<u64>,
    /// The offset applied.
    pub start: u64,
}

impl CompileResult {
    /// Returns true if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of ids returned.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if more pages exist beyond this one.
    pub fn has_more(&self) -> bool {
        match self.total {
            Some(total) => self.start + (self.ids.len() as u64) < total,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_more() {
        let result = CompileResult {
            ids: (21..=30).collect(),
            verbose_rows: None,
            total: Some(35),
            limit: Some(10),
            start: 20,
        };
        assert!(result.has_more());
        assert_eq!(result.len(), 10);

        let last = CompileResult {
            ids: (31..=35).collect(),
            start: 30,
            ..result
        };
        assert!(!last.has_more());
    }

    #[test]
    fn test_unknown_total_has_no_more() {
        let result = CompileResult {
            ids: vec![1],
            total: None,
            ..Default::default()
        };
        assert!(!result.has_more());
    }
}
