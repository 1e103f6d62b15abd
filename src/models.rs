//! Data model shared by the selector, the pipelines and the store
//!
//! Everything here is plain data. Provider types (`ChangeSet`, `Commit`,
//! `Modification`, `FileEdits`) are produced by an SCM provider; fact and
//! aggregate types (`FileChangeFacts`, `CommitFacts`, `DeveloperInfo`,
//! `CommitSize`) are produced by the pipelines and persisted by the store.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Minimal commit reference used for range selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: String,
    pub time: DateTime<Utc>,
}

impl ChangeSet {
    pub fn new(id: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            time,
        }
    }
}

/// A commit author or committer. Identity is the email, compared verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Developer {
    pub name: String,
    pub email: String,
}

impl Developer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModificationType {
    Add,
    Delete,
    Modify,
    Rename,
    Copy,
    Unknown,
}

impl From<git2::Delta> for ModificationType {
    fn from(delta: git2::Delta) -> Self {
        match delta {
            git2::Delta::Added | git2::Delta::Untracked => ModificationType::Add,
            git2::Delta::Deleted => ModificationType::Delete,
            git2::Delta::Modified | git2::Delta::Typechange => ModificationType::Modify,
            git2::Delta::Renamed => ModificationType::Rename,
            git2::Delta::Copied => ModificationType::Copy,
            _ => ModificationType::Unknown,
        }
    }
}

/// One file-level change within a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub change_type: ModificationType,
    /// Unified diff text, or the oversize sentinel, or empty when diffs are not collected
    pub diff: String,
    pub source_code: Option<String>,
    pub added: usize,
    pub removed: usize,
}

impl Modification {
    pub fn new(
        old_path: Option<String>,
        new_path: Option<String>,
        change_type: ModificationType,
        diff: String,
        source_code: Option<String>,
    ) -> Self {
        let (added, removed) = count_diff_lines(&diff);
        Self {
            old_path,
            new_path,
            change_type,
            diff,
            source_code,
            added,
            removed,
        }
    }

    /// Path of the file after the change, or before it for deletions.
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or_default()
    }

    pub fn filename(&self) -> &str {
        Path::new(self.path())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(self.path()).extension().and_then(|e| e.to_str())
    }
}

/// Count `+`/`-` lines of a unified diff, skipping the file headers.
pub fn count_diff_lines(diff: &str) -> (usize, usize) {
    let mut added = 0;
    let mut removed = 0;
    for line in diff.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            added += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            removed += 1;
        }
    }
    (added, removed)
}

/// A fully materialized commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub author: Developer,
    pub committer: Developer,
    pub author_time: DateTime<FixedOffset>,
    pub committer_time: DateTime<FixedOffset>,
    pub message: String,
    pub parents: Vec<String>,
    pub merge: bool,
    pub branches: BTreeSet<String>,
    pub in_main_branch: bool,
    pub modifications: Vec<Modification>,
}

impl Commit {
    /// Author timezone offset in seconds west of UTC, matching git's convention.
    pub fn author_timezone(&self) -> i32 {
        -self.author_time.offset().local_minus_utc()
    }

    pub fn committer_timezone(&self) -> i32 {
        -self.committer_time.offset().local_minus_utc()
    }

    pub fn first_line(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Insert,
    Delete,
    Replace,
    Empty,
}

/// One zero-context hunk. `a` is the old side, `b` the new side; ranges are
/// half-open and zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    pub begin_a: u32,
    pub end_a: u32,
    pub begin_b: u32,
    pub end_b: u32,
    /// Bytes of the removed and added line content
    pub size_bytes: u64,
}

impl LineEdit {
    pub fn len_a(&self) -> u32 {
        self.end_a - self.begin_a
    }

    pub fn len_b(&self) -> u32 {
        self.end_b - self.begin_b
    }

    pub fn kind(&self) -> EditKind {
        match (self.len_a(), self.len_b()) {
            (0, 0) => EditKind::Empty,
            (0, _) => EditKind::Insert,
            (_, 0) => EditKind::Delete,
            _ => EditKind::Replace,
        }
    }
}

/// Line edits of one file between two trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdits {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub change_type: ModificationType,
    pub edits: Vec<LineEdit>,
    /// Blob size of the file after the change (0 for deletions)
    pub size_after: u64,
}

impl FileEdits {
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or_default()
    }

    pub fn touches(&self, path: &str) -> bool {
        self.new_path.as_deref() == Some(path) || self.old_path.as_deref() == Some(path)
    }
}

/// Change counters for one file in one commit, or their sum over a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeFacts {
    pub files_added: u64,
    pub files_deleted: u64,
    pub files_modified: u64,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub lines_modified: u64,
    /// lines_added + lines_deleted + lines_modified
    pub changes: u64,
    pub changes_size: u64,
}

impl FileChangeFacts {
    /// Classify one file's edits. Replaced lines count both sides as modified.
    pub fn from_edits(file: &FileEdits) -> Self {
        let mut facts = FileChangeFacts::default();
        match file.change_type {
            ModificationType::Add | ModificationType::Copy => facts.files_added += 1,
            ModificationType::Delete => facts.files_deleted += 1,
            ModificationType::Modify | ModificationType::Rename => facts.files_modified += 1,
            ModificationType::Unknown => {}
        }
        for edit in &file.edits {
            match edit.kind() {
                EditKind::Insert => facts.lines_added += u64::from(edit.len_b()),
                EditKind::Delete => facts.lines_deleted += u64::from(edit.len_a()),
                EditKind::Replace => {
                    facts.lines_modified += u64::from(edit.len_a() + edit.len_b())
                }
                EditKind::Empty => {}
            }
            facts.changes_size += edit.size_bytes;
        }
        facts.changes = facts.lines_added + facts.lines_deleted + facts.lines_modified;
        facts
    }

    pub fn add(&mut self, other: &FileChangeFacts) {
        self.files_added += other.files_added;
        self.files_deleted += other.files_deleted;
        self.files_modified += other.files_modified;
        self.lines_added += other.lines_added;
        self.lines_deleted += other.lines_deleted;
        self.lines_modified += other.lines_modified;
        self.changes += other.changes;
        self.changes_size += other.changes_size;
    }
}

/// Per-file record kept with a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTouch {
    pub path: String,
    pub path_id: u64,
    pub change_type: ModificationType,
    pub facts: FileChangeFacts,
    pub size_after: u64,
}

/// Persisted per-commit aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitFacts {
    pub commit_id: String,
    pub author_id: u64,
    pub author_name: String,
    pub author_email: String,
    pub time: DateTime<Utc>,
    /// Total blob size of the tree at this commit
    pub size: u64,
    pub stability: f64,
    pub facts: FileChangeFacts,
    pub files: Vec<FileTouch>,
    pub message: Option<String>,
}

/// Commit size view: total project size plus per-file sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSize {
    pub name: String,
    pub project_size: u64,
    pub file_sizes: BTreeMap<String, u64>,
    pub author_name: String,
    pub author_email: String,
    pub stability: f64,
    pub date: DateTime<Utc>,
}

/// One blamed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlamedLine {
    pub line_index: usize,
    pub content: String,
    pub author: Developer,
    pub committer: Developer,
    pub commit_id: String,
    pub commit_time: DateTime<Utc>,
}

/// Per-developer accumulator keyed by author email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeveloperInfo {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub commits: BTreeSet<String>,
    pub changes: u64,
    pub changes_size: u64,
    pub actual_lines_owned: u64,
    pub actual_lines_size: u64,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub lines_modified: u64,
    pub files_added: u64,
    pub files_deleted: u64,
    pub files_modified: u64,
    pub authored_files: Vec<String>,
    pub owned_files: Vec<String>,
}

impl DeveloperInfo {
    pub fn new(id: u64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    /// Fold one commit's facts in. Returns false if the commit was already counted.
    pub fn update_by_commit(&mut self, facts: &CommitFacts) -> bool {
        if !self.commits.insert(facts.commit_id.clone()) {
            return false;
        }
        let f = &facts.facts;
        self.changes += f.changes;
        self.changes_size += f.changes_size;
        self.lines_added += f.lines_added;
        self.lines_deleted += f.lines_deleted;
        self.lines_modified += f.lines_modified;
        self.files_added += f.files_added;
        self.files_deleted += f.files_deleted;
        self.files_modified += f.files_modified;
        // sorted and unique
        for file in facts.files.iter().filter(|f| f.facts.files_added > 0) {
            if let Err(pos) = self.authored_files.binary_search(&file.path) {
                self.authored_files.insert(pos, file.path.clone());
            }
        }
        true
    }
}
