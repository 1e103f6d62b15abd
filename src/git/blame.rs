//! Current line ownership per file, per author and per directory
//!
//! The aggregator blames every file at HEAD in parallel and folds the lines
//! into [`BlameFileInfo`] records. A file's owner is derived on demand: the
//! author with the most lines, ties going to the author whose latest line
//! was committed most recently.

use super::ScmProvider;
use crate::error::MineResult;
use crate::models::BlamedLine;
use crate::pipeline::{log_unit_failure, worker_pool};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Lines of one author within a file or directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlameAuthorInfo {
    pub author: String,
    /// commit id -> commit time
    pub commits: BTreeMap<String, DateTime<Utc>>,
    pub line_count: u64,
    pub line_size: u64,
}

impl BlameAuthorInfo {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, other: &BlameAuthorInfo) {
        self.commits
            .extend(other.commits.iter().map(|(id, t)| (id.clone(), *t)));
        self.line_count += other.line_count;
        self.line_size += other.line_size;
    }

    pub fn latest_commit_time(&self) -> Option<DateTime<Utc>> {
        self.commits.values().max().copied()
    }
}

fn latest_commit(commits: &BTreeMap<String, DateTime<Utc>>) -> Option<(&str, DateTime<Utc>)> {
    commits
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(id, t)| (id.as_str(), *t))
}

/// Blame summary of one file, keyed by author name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlameFileInfo {
    pub file_name: String,
    pub commits: BTreeMap<String, DateTime<Utc>>,
    pub line_count: u64,
    pub line_size: u64,
    pub authors: BTreeMap<String, BlameAuthorInfo>,
}

impl BlameFileInfo {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    pub fn from_lines(file_name: impl Into<String>, lines: &[BlamedLine]) -> Self {
        let mut info = Self::new(file_name);
        for line in lines {
            let mut slice = BlameAuthorInfo::new(line.author.name.clone());
            slice.commits.insert(line.commit_id.clone(), line.commit_time);
            slice.line_count = 1;
            slice.line_size = line.content.len() as u64;
            info.add(&slice);
        }
        info
    }

    pub fn add(&mut self, author: &BlameAuthorInfo) {
        self.authors
            .entry(author.author.clone())
            .or_insert_with(|| BlameAuthorInfo::new(author.author.clone()))
            .add(author);
        self.line_count += author.line_count;
        self.line_size += author.line_size;
        self.commits
            .extend(author.commits.iter().map(|(id, t)| (id.clone(), *t)));
    }

    pub fn owner(&self) -> Option<&BlameAuthorInfo> {
        self.authors.values().max_by(|a, b| {
            a.line_count
                .cmp(&b.line_count)
                .then_with(|| a.latest_commit_time().cmp(&b.latest_commit_time()))
        })
    }

    pub fn find_latest_commit(&self) -> Option<(&str, DateTime<Utc>)> {
        latest_commit(&self.commits)
    }
}

/// Blame roll-up of one directory and everything below it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlamePackageInfo {
    pub package_name: String,
    pub commits: BTreeMap<String, DateTime<Utc>>,
    pub line_count: u64,
    pub line_size: u64,
    /// file path -> file summary
    pub files: BTreeMap<String, BlameFileInfo>,
    pub authors: BTreeMap<String, BlameAuthorInfo>,
}

impl BlamePackageInfo {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, file_path: &str, file: &BlameFileInfo) {
        self.files.insert(file_path.to_string(), file.clone());
        self.line_count += file.line_count;
        self.line_size += file.line_size;
        self.commits
            .extend(file.commits.iter().map(|(id, t)| (id.clone(), *t)));
        for author in file.authors.values() {
            self.authors
                .entry(author.author.clone())
                .or_insert_with(|| BlameAuthorInfo::new(author.author.clone()))
                .add(author);
        }
    }

    pub fn find_latest_commit(&self) -> Option<(&str, DateTime<Utc>)> {
        latest_commit(&self.commits)
    }
}

/// Read view over the blame of every file at HEAD.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlameManager {
    pub project_name: String,
    pub files: BTreeMap<String, BlameFileInfo>,
}

impl BlameManager {
    pub fn new(project_name: impl Into<String>, files: BTreeMap<String, BlameFileInfo>) -> Self {
        Self {
            project_name: project_name.into(),
            files,
        }
    }

    /// Per-directory roll-up keyed by `/<project>/<dir>`; the root is `/<project>`.
    pub fn packages(&self) -> BTreeMap<String, BlamePackageInfo> {
        let mut packages: BTreeMap<String, BlamePackageInfo> = BTreeMap::new();
        for (path, info) in &self.files {
            let full = format!("/{}/{}", self.project_name, path);
            let mut package = parent_of(&full);
            while !package.is_empty() {
                let name = package.rsplit('/').next().unwrap_or_default();
                packages
                    .entry(package.to_string())
                    .or_insert_with(|| BlamePackageInfo::new(name))
                    .add(path, info);
                package = parent_of(package);
            }
        }
        packages
    }

    pub fn root_package(&self) -> Option<BlamePackageInfo> {
        self.packages().remove(&format!("/{}", self.project_name))
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Builds a [`BlameManager`] with a bounded worker pool.
pub struct BlameAggregator<'a> {
    scm: &'a dyn ScmProvider,
    workers: usize,
}

impl<'a> BlameAggregator<'a> {
    pub fn new(scm: &'a dyn ScmProvider, workers: usize) -> Self {
        Self {
            scm,
            workers: workers.max(1),
        }
    }

    /// Blame every file tracked at HEAD. Files that fail to blame are logged and left out.
    pub fn build(&self) -> MineResult<BlameManager> {
        let head = self.scm.resolve_head()?;
        let files = self.scm.current_files()?;
        info!("Blaming {} files at {}", files.len(), short(&head));

        let pool = worker_pool(self.workers)?;

        let failed = AtomicUsize::new(0);
        let blamed: Vec<(String, BlameFileInfo)> = pool.install(|| {
            files
                .par_iter()
                .filter_map(|path| match self.scm.blame_at_commit(path, &head) {
                    Ok(lines) => Some((path.clone(), BlameFileInfo::from_lines(path.clone(), &lines))),
                    Err(e) => {
                        log_unit_failure("blame", path, &e);
                        failed.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                })
                .collect()
        });

        info!(
            "Blamed {} files ({} failed)",
            blamed.len(),
            failed.load(Ordering::Relaxed)
        );
        Ok(BlameManager::new(self.scm.name(), blamed.into_iter().collect()))
    }
}

pub(crate) fn short(id: &str) -> &str {
    &id[..id.len().min(12)]
}
