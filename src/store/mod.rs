//! Durable metadata for mined projects
//!
//! [`MetadataStore`] is one session against the store. Sessions are not
//! shared between threads: every worker asks the [`StoreConnector`] for its
//! own. Get-or-create operations are atomic in the store itself, so a
//! natural key maps to exactly one identifier no matter how many sessions
//! race on it.

mod redb_store;

pub use redb_store::{RedbConnector, RedbStore};

use crate::error::MineResult;
use crate::models::{CommitFacts, CommitSize, DeveloperInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted line ownership of one author within one file at one head commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameRecord {
    pub blame_file_id: u64,
    pub path_id: u64,
    pub path: String,
    pub author_name: String,
    pub author_email: String,
    pub line_ids: Vec<usize>,
    pub line_count: u64,
    pub line_size: u64,
    /// Most recent commit contributing a line
    pub latest_commit_time: DateTime<Utc>,
}

/// One store session.
pub trait MetadataStore: Send {
    fn get_or_create_project(&self, name: &str, path: &str) -> MineResult<u64>;

    fn commit_exists(&self, project: u64, commit_id: &str) -> MineResult<bool>;

    fn get_or_create_author(&self, project: u64, email: &str, name: &str) -> MineResult<u64>;

    fn get_or_create_file_path(&self, project: u64, path: &str) -> MineResult<u64>;

    /// Every known path with its id.
    fn list_file_paths(&self, project: u64) -> MineResult<Vec<(String, u64)>>;

    /// Insert a commit row together with its file associations, in one write.
    /// Returns false (and writes nothing) if the commit is already stored.
    fn insert_commit_facts(&self, project: u64, facts: &CommitFacts) -> MineResult<bool>;

    /// Path ids touched by a stored commit.
    fn file_associations(&self, project: u64, commit_id: &str) -> MineResult<Vec<u64>>;

    fn get_commit_facts(&self, project: u64, commit_id: &str) -> MineResult<Option<CommitFacts>>;

    fn get_blame_file_record_id(
        &self,
        project: u64,
        path_id: u64,
        head: &str,
    ) -> MineResult<Option<u64>>;

    /// Store the (path, head) blame marker and its records in one write.
    ///
    /// Records are stamped with the marker id. When the marker is already
    /// present nothing is written and the existing id is returned.
    fn insert_blame_file(
        &self,
        project: u64,
        path_id: u64,
        head: &str,
        records: &[BlameRecord],
    ) -> MineResult<u64>;

    /// All blame records computed at `head`.
    fn get_blame_records(&self, project: u64, head: &str) -> MineResult<Vec<BlameRecord>>;

    /// Overwrite the durable row of each developer.
    fn merge_developer_aggregates(
        &self,
        project: u64,
        developers: &HashMap<String, DeveloperInfo>,
    ) -> MineResult<()>;

    fn developers(&self, project: u64) -> MineResult<Vec<DeveloperInfo>>;

    /// Size view of every commit touching a path containing `path` (all commits when `None`), oldest first.
    fn commit_sizes(&self, project: u64, path: Option<&str>) -> MineResult<Vec<CommitSize>>;

    fn insert_branch_commits(&self, project: u64, branch: &str, commits: &[String])
        -> MineResult<()>;

    fn branch_commits(&self, project: u64, branch: &str) -> MineResult<Vec<String>>;
}

/// Hands out per-worker store sessions.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> MineResult<Box<dyn MetadataStore>>;
}
