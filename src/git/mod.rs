//! SCM access for the mining pipelines
//!
//! [`ScmProvider`] is the narrow seam the pipelines consume: history
//! traversal, diffs, blame and ref resolution. [`GitProvider`] implements
//! it on libgit2.

pub mod blame;
pub mod diff_parser;
pub mod provider;

pub use blame::{BlameAggregator, BlameAuthorInfo, BlameFileInfo, BlameManager, BlamePackageInfo};
pub use diff_parser::{DiffBlock, DiffLine, DiffLineType, DiffParser};
pub use provider::{GitProvider, ProviderOptions, TOO_BIG_SENTINEL};

use crate::config::CollectConfig;
use crate::error::MineResult;
use crate::models::{BlamedLine, ChangeSet, Commit, FileEdits, Modification};

/// Version-control operations consumed by the pipelines.
///
/// Implementations must be shareable across worker threads.
pub trait ScmProvider: Send + Sync {
    /// Repository display name
    fn name(&self) -> String;

    fn resolve_head(&self) -> MineResult<String>;

    /// Newest-first history reachable from HEAD.
    fn list_change_sets(&self, first_parent_only: bool) -> MineResult<Vec<ChangeSet>>;

    /// Newest-first commits whose first-parent diff touches `path` (all commits when `None`).
    fn list_change_sets_touching(&self, path: Option<&str>) -> MineResult<Vec<ChangeSet>>;

    /// Fails with `NotFound` if absent, `TooManyFiles` above the configured ceiling.
    fn get_commit(&self, id: &str) -> MineResult<Commit>;

    /// [`get_commit`](Self::get_commit) restricted to the toggles enabled in
    /// both `collect` and the provider's own configuration.
    fn get_commit_collecting(&self, id: &str, collect: CollectConfig) -> MineResult<Commit>;

    fn parents(&self, id: &str) -> MineResult<Vec<String>>;

    fn diff(&self, from: &str, to: &str) -> MineResult<Vec<Modification>>;

    /// Zero-context line edits between two commits; `from = None` diffs against the empty tree.
    fn file_edits(&self, from: Option<&str>, to: &str) -> MineResult<Vec<FileEdits>>;

    /// Sum of blob sizes in the commit's tree.
    fn commit_tree_size(&self, id: &str) -> MineResult<u64>;

    fn blame_at_commit(&self, path: &str, commit: &str) -> MineResult<Vec<BlamedLine>>;

    fn list_branches(&self) -> MineResult<Vec<String>>;

    fn list_tags(&self) -> MineResult<Vec<String>>;

    fn resolve_tag_to_commit(&self, tag: &str) -> MineResult<String>;

    /// Refuses with `CheckoutConflict` when local changes would be lost.
    fn checkout_branch(&self, name: &str) -> MineResult<()>;

    /// Files tracked at HEAD.
    fn current_files(&self) -> MineResult<Vec<String>>;

    /// Commit ids reachable from a local branch.
    fn branch_commits(&self, branch: &str) -> MineResult<Vec<String>>;
}
