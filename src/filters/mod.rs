//! Change selection: commit ranges plus commit and diff predicates

pub mod commit;
pub mod diff;
pub mod range;

pub use commit::CommitFilter;
pub use diff::DiffFilter;
pub use range::CommitRange;

use crate::config::CollectConfig;
use crate::error::MineResult;
use crate::git::ScmProvider;
use crate::models::{ChangeSet, Commit};

/// A range plus the commit predicates that must all accept.
#[derive(Debug, Clone, Default)]
pub struct ChangeSelector {
    pub range: CommitRange,
    pub commit_filters: Vec<CommitFilter>,
    pub first_parent_only: bool,
}

impl ChangeSelector {
    pub fn new(range: CommitRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: CommitFilter) -> Self {
        self.commit_filters.push(filter);
        self
    }

    pub fn first_parent_only(mut self, yes: bool) -> Self {
        self.first_parent_only = yes;
        self
    }

    pub fn select(&self, scm: &dyn ScmProvider) -> MineResult<Vec<ChangeSet>> {
        self.range.select(scm, self.first_parent_only)
    }

    pub fn accepts(&self, commit: &Commit) -> bool {
        commit::accept_all(&self.commit_filters, commit)
    }

    /// What a commit must carry for ingestion: its message, plus branch
    /// membership when a filter reads it. Diff text and source snapshots
    /// are never read.
    pub fn required_collect(&self) -> CollectConfig {
        CollectConfig {
            commit_messages: true,
            branches: self.commit_filters.iter().any(CommitFilter::needs_branches),
            source_code: false,
            diffs: false,
        }
    }
}
