//! Shared fixtures: throwaway git repositories with controlled authors and times

#![allow(dead_code)]

use git2::{Oid, Repository, Signature, Time};
use repominer::cache::MiningCaches;
use repominer::git::{GitProvider, ProviderOptions};
use repominer::store::{RedbConnector, StoreConnector};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// 2024-01-01T00:00:00Z
pub const EPOCH: i64 = 1_704_067_200;
pub const DAY: i64 = 86_400;

pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write (`Some`) or delete (`None`) files and commit as `author` at `time`.
    pub fn commit(
        &self,
        files: &[(&str, Option<&str>)],
        author: (&str, &str),
        time: i64,
        message: &str,
    ) -> String {
        let mut index = self.repo.index().unwrap();
        for (path, content) in files {
            let full = self.path().join(path);
            match content {
                Some(content) => {
                    if let Some(parent) = full.parent() {
                        fs::create_dir_all(parent).unwrap();
                    }
                    fs::write(&full, content).unwrap();
                    index.add_path(Path::new(path)).unwrap();
                }
                None => {
                    fs::remove_file(&full).unwrap();
                    index.remove_path(Path::new(path)).unwrap();
                }
            }
        }
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new(author.0, author.1, &Time::new(time, 0)).unwrap();
        let parents: Vec<git2::Commit> = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let oid: Oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
        oid.to_string()
    }

    pub fn tag(&self, name: &str, commit: &str) {
        let object = self.repo.revparse_single(commit).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }

    pub fn provider(&self) -> GitProvider {
        GitProvider::open(self.path(), ProviderOptions::default()).unwrap()
    }

    pub fn provider_with(&self, options: ProviderOptions) -> GitProvider {
        GitProvider::open(self.path(), options).unwrap()
    }
}

pub const ALICE: (&str, &str) = ("alice", "alice@example.com");
pub const BOB: (&str, &str) = ("bob", "bob@example.com");

/// Numbered lines `<prefix>1` .. `<prefix>n`, newline terminated.
pub fn lines(prefix: &str, range: std::ops::RangeInclusive<u32>) -> String {
    range.map(|i| format!("{}{}\n", prefix, i)).collect()
}

pub struct Store {
    pub connector: RedbConnector,
    pub caches: MiningCaches,
    pub project: u64,
}

pub fn memory_store(name: &str) -> Store {
    let connector = RedbConnector::in_memory().unwrap();
    let project = connector
        .connect()
        .unwrap()
        .get_or_create_project(name, "/tmp/demo")
        .unwrap();
    Store {
        connector,
        caches: MiningCaches::new(),
        project,
    }
}
