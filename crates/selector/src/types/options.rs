//! Per-call compile options.

use serde::{Deserialize, Serialize};

/// How the total number of matches is computed when a page of results is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalStrategy {
    /// Issue a second `COUNT` statement without ordering or limits.
    #[default]
    Count,
    /// Carry a found-rows counter on the main statement.
    Calc,
}

/// Options that shape a single compile call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Return at most one page. Forces `limit=1, start=0`.
    pub find_one: bool,
    /// Include hidden pages.
    pub include_hidden: bool,
    /// Include unpublished pages.
    pub include_unpublished: bool,
    /// Include pages in the trash.
    pub include_trash: bool,
    /// Skip all status and access filtering.
    pub include_all: bool,
    /// Results feed entity hydration; parent and template columns are returned.
    pub load_entities: bool,
    /// Return `{id, parent_id, templates_id, score}` rows along with the ids.
    pub verbose_rows: bool,
    /// Whether to compute the total. `None` picks a default from the limit.
    pub compute_total: Option<bool>,
    /// Overrides the configured total strategy.
    pub total_strategy: Option<TotalStrategy>,
    /// Apply role-based access filtering.
    pub check_access: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            find_one: false,
            include_hidden: false,
            include_unpublished: false,
            include_trash: false,
            include_all: false,
            load_entities: false,
            verbose_rows: false,
            compute_total: None,
            total_strategy: None,
            check_access: true,
        }
    }
}

impl CompileOptions {
    /// Options for fetching a single page.
    pub fn find_one() -> Self {
        Self {
            find_one: true,
            ..Default::default()
        }
    }

    /// Options that bypass status and access filtering.
    pub fn include_all() -> Self {
        Self {
            include_all: true,
            ..Default::default()
        }
    }

    /// Sets whether the total is computed.
    pub fn with_total(mut self, compute: bool) -> Self {
        self.compute_total = Some(compute);
        self
    }

    /// Sets the total strategy.
    pub fn with_strategy(mut self, strategy: TotalStrategy) -> Self {
        self.total_strategy = Some(strategy);
        self
    }

    /// Requests verbose rows.
    pub fn verbose(mut self) -> Self {
        self.verbose_rows = true;
        self
    }

    /// Returns true when parent and template columns must be selected.
    pub fn wants_verbose_rows(&self) -> bool {
        self.verbose_rows || self.load_entities
    }
}
