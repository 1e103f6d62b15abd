//! libgit2-backed SCM provider
//!
//! Every operation opens its own `Repository` handle, so one provider can be
//! shared by all workers of a pool. Blob sizes are cached per object id for
//! the lifetime of the provider.

use super::ScmProvider;
use crate::config::{CollectConfig, MinerConfig, DEFAULT_MAX_DIFF_BYTES, DEFAULT_MAX_FILES};
use crate::error::{MineError, MineResult};
use crate::filters::{diff as diff_filter, DiffFilter};
use crate::models::{
    BlamedLine, ChangeSet, Commit, Developer, FileEdits, LineEdit, Modification,
    ModificationType,
};
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use dashmap::DashMap;
use git2::build::CheckoutBuilder;
use git2::{
    BlameOptions, BranchType, Delta, Diff, DiffFindOptions, DiffOptions, FileMode, ObjectType, Oid,
    Patch, Repository, Signature, Sort, Status, StatusOptions, TreeWalkMode, TreeWalkResult,
};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Replaces diff text larger than the configured limit.
pub const TOO_BIG_SENTINEL: &str = "-- TOO BIG --";

/// Knobs that shape what a materialized commit carries.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub max_files: usize,
    pub max_diff_bytes: usize,
    pub collect: CollectConfig,
    pub diff_filters: Vec<DiffFilter>,
    pub main_branch: Option<String>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_diff_bytes: DEFAULT_MAX_DIFF_BYTES,
            collect: CollectConfig::everything(),
            diff_filters: Vec::new(),
            main_branch: None,
        }
    }
}

impl From<&MinerConfig> for ProviderOptions {
    fn from(config: &MinerConfig) -> Self {
        Self {
            max_files: config.max_files_per_commit,
            max_diff_bytes: config.max_diff_bytes,
            collect: config.collect,
            diff_filters: config.diff_filters(),
            main_branch: config.main_branch.clone(),
        }
    }
}

/// Git repository accessed through libgit2.
pub struct GitProvider {
    root: PathBuf,
    name: String,
    main_branch: String,
    options: ProviderOptions,
    blob_sizes: DashMap<Oid, u64>,
}

impl GitProvider {
    /// Open the repository containing `path`.
    pub fn open(path: &Path, options: ProviderOptions) -> MineResult<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| MineError::Provider(format!("{}: {}", path.display(), e.message())))?;
        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repo")
            .trim_end_matches(".git")
            .to_string();
        let main_branch = options.main_branch.clone().unwrap_or_else(|| {
            repo.head()
                .ok()
                .and_then(|h| h.shorthand().map(String::from))
                .unwrap_or_else(|| "master".to_string())
        });
        debug!("Opened git repository at {:?} (main branch {})", root, main_branch);

        Ok(Self {
            root,
            name,
            main_branch,
            options,
            blob_sizes: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn main_branch(&self) -> &str {
        &self.main_branch
    }

    fn repo(&self) -> MineResult<Repository> {
        Repository::open(&self.root).map_err(|e| MineError::Provider(e.message().to_string()))
    }

    fn find_commit<'r>(repo: &'r Repository, id: &str) -> MineResult<git2::Commit<'r>> {
        Oid::from_str(id)
            .and_then(|oid| repo.find_commit(oid))
            .map_err(|_| MineError::not_found("commit", id))
    }

    /// Size of a blob, read from the object header and cached.
    fn blob_size(&self, repo: &Repository, oid: Oid) -> MineResult<u64> {
        if oid.is_zero() {
            return Ok(0);
        }
        if let Some(size) = self.blob_sizes.get(&oid) {
            return Ok(*size);
        }
        let (size, _) = repo.odb()?.read_header(oid)?;
        let size = size as u64;
        self.blob_sizes.insert(oid, size);
        Ok(size)
    }

    fn walk(&self, repo: &Repository, first_parent_only: bool) -> MineResult<Vec<Oid>> {
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push_head()?;
        if first_parent_only {
            revwalk.simplify_first_parent()?;
        }
        revwalk.map(|oid| oid.map_err(MineError::from)).collect()
    }

    /// Diff between a commit's first parent (or the empty tree) and the commit.
    fn first_parent_diff<'r>(
        repo: &'r Repository,
        commit: &git2::Commit<'_>,
        opts: Option<&mut DiffOptions>,
    ) -> MineResult<Diff<'r>> {
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        let tree = commit.tree()?;
        let mut diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), opts)?;
        detect_renames(&mut diff)?;
        Ok(diff)
    }

    fn tree_diff<'r>(
        repo: &'r Repository,
        from: Option<&str>,
        to: &str,
        opts: Option<&mut DiffOptions>,
    ) -> MineResult<Diff<'r>> {
        let old_tree = match from {
            Some(id) => Some(Self::find_commit(repo, id)?.tree()?),
            None => None,
        };
        let new_tree = Self::find_commit(repo, to)?.tree()?;
        let mut diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), opts)?;
        detect_renames(&mut diff)?;
        Ok(diff)
    }

    fn modifications(
        &self,
        repo: &Repository,
        diff: &Diff<'_>,
        collect: CollectConfig,
    ) -> MineResult<Vec<Modification>> {
        let mut modifications = Vec::new();
        for (idx, delta) in diff.deltas().enumerate() {
            let change_type = ModificationType::from(delta.status());
            let old_path = (change_type != ModificationType::Add)
                .then(|| path_string(delta.old_file().path()))
                .flatten();
            let new_path = (change_type != ModificationType::Delete)
                .then(|| path_string(delta.new_file().path()))
                .flatten();
            let path = new_path.as_deref().or(old_path.as_deref()).unwrap_or_default();
            if !diff_filter::accept_all(&self.options.diff_filters, path) {
                continue;
            }

            let diff_text = if collect.diffs {
                self.diff_text(diff, idx, path)?
            } else {
                String::new()
            };

            let source_code = if collect.source_code && delta.status() != Delta::Deleted {
                repo.find_blob(delta.new_file().id())
                    .ok()
                    .filter(|blob| !blob.is_binary())
                    .map(|blob| String::from_utf8_lossy(blob.content()).into_owned())
            } else {
                None
            };

            modifications.push(Modification::new(
                old_path,
                new_path,
                change_type,
                diff_text,
                source_code,
            ));
        }
        Ok(modifications)
    }

    fn diff_text(&self, diff: &Diff<'_>, idx: usize, path: &str) -> MineResult<String> {
        let Some(mut patch) = Patch::from_diff(diff, idx)? else {
            return Ok(String::new());
        };
        let buf = patch.to_buf()?;
        if buf.len() > self.options.max_diff_bytes {
            warn!(
                "Diff of {} is {} bytes (limit {}), storing sentinel",
                path,
                buf.len(),
                self.options.max_diff_bytes
            );
            return Ok(TOO_BIG_SENTINEL.to_string());
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn branches_containing(&self, repo: &Repository, oid: Oid) -> MineResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            let Some(tip) = branch.get().target() else {
                continue;
            };
            if tip == oid || repo.graph_descendant_of(tip, oid)? {
                if let Some(name) = branch.name()? {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

fn detect_renames(diff: &mut Diff<'_>) -> MineResult<()> {
    let mut find = DiffFindOptions::new();
    find.renames(true);
    diff.find_similar(Some(&mut find))?;
    Ok(())
}

fn path_string(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.to_string_lossy().replace('\\', "/"))
}

fn git_time_utc(time: &git2::Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_default()
}

fn git_time_fixed(time: &git2::Time) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .unwrap_or_else(|| Utc.fix());
    git_time_utc(time).with_timezone(&offset)
}

fn developer(sig: &Signature<'_>) -> Developer {
    Developer::new(
        sig.name().unwrap_or("Unknown"),
        sig.email().unwrap_or_default(),
    )
}

/// Convert one zero-context hunk header into half-open, zero-based ranges.
fn hunk_edit(old_start: u32, old_lines: u32, new_start: u32, new_lines: u32) -> LineEdit {
    let begin_a = if old_lines == 0 { old_start } else { old_start - 1 };
    let begin_b = if new_lines == 0 { new_start } else { new_start - 1 };
    LineEdit {
        begin_a,
        end_a: begin_a + old_lines,
        begin_b,
        end_b: begin_b + new_lines,
        size_bytes: 0,
    }
}

impl ScmProvider for GitProvider {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn resolve_head(&self) -> MineResult<String> {
        let repo = self.repo()?;
        let head = repo
            .head()
            .map_err(|_| MineError::not_found("ref", "HEAD"))?;
        let id = head.peel_to_commit()?.id().to_string();
        Ok(id)
    }

    fn list_change_sets(&self, first_parent_only: bool) -> MineResult<Vec<ChangeSet>> {
        let repo = self.repo()?;
        self.walk(&repo, first_parent_only)?
            .into_iter()
            .map(|oid| {
                let commit = repo.find_commit(oid)?;
                let time = git_time_utc(&commit.committer().when());
                Ok(ChangeSet::new(oid.to_string(), time))
            })
            .collect()
    }

    fn list_change_sets_touching(&self, path: Option<&str>) -> MineResult<Vec<ChangeSet>> {
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            return self.list_change_sets(false);
        };
        let repo = self.repo()?;
        let mut touching = Vec::new();
        for oid in self.walk(&repo, false)? {
            let commit = repo.find_commit(oid)?;
            let mut opts = DiffOptions::new();
            opts.pathspec(path);
            let parent_tree = match commit.parent(0) {
                Ok(parent) => Some(parent.tree()?),
                Err(_) => None,
            };
            let diff =
                repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&commit.tree()?), Some(&mut opts))?;
            if diff.deltas().len() > 0 {
                touching.push(ChangeSet::new(
                    oid.to_string(),
                    git_time_utc(&commit.committer().when()),
                ));
            }
        }
        Ok(touching)
    }

    fn get_commit(&self, id: &str) -> MineResult<Commit> {
        self.get_commit_collecting(id, self.options.collect)
    }

    fn get_commit_collecting(&self, id: &str, collect: CollectConfig) -> MineResult<Commit> {
        let collect = self.options.collect.intersect(collect);
        let repo = self.repo()?;
        let commit = Self::find_commit(&repo, id)?;
        let diff = Self::first_parent_diff(&repo, &commit, None)?;

        let count = diff.deltas().len();
        if count > self.options.max_files {
            return Err(MineError::TooManyFiles {
                commit: id.to_string(),
                count,
                limit: self.options.max_files,
            });
        }

        let modifications = self.modifications(&repo, &diff, collect)?;
        let branches = if collect.branches {
            self.branches_containing(&repo, commit.id())?
        } else {
            BTreeSet::new()
        };
        let in_main_branch = branches.contains(&self.main_branch);
        let message = if collect.commit_messages {
            commit.message().unwrap_or_default().to_string()
        } else {
            String::new()
        };
        let parents: Vec<String> = commit.parent_ids().map(|p| p.to_string()).collect();

        let materialized = Commit {
            id: commit.id().to_string(),
            author: developer(&commit.author()),
            committer: developer(&commit.committer()),
            author_time: git_time_fixed(&commit.author().when()),
            committer_time: git_time_fixed(&commit.committer().when()),
            message,
            merge: parents.len() > 1,
            parents,
            branches,
            in_main_branch,
            modifications,
        };
        Ok(materialized)
    }

    fn parents(&self, id: &str) -> MineResult<Vec<String>> {
        let repo = self.repo()?;
        let commit = Self::find_commit(&repo, id)?;
        Ok(commit.parent_ids().map(|p| p.to_string()).collect())
    }

    fn diff(&self, from: &str, to: &str) -> MineResult<Vec<Modification>> {
        let repo = self.repo()?;
        let diff = Self::tree_diff(&repo, Some(from), to, None)?;
        self.modifications(&repo, &diff, self.options.collect)
    }

    fn file_edits(&self, from: Option<&str>, to: &str) -> MineResult<Vec<FileEdits>> {
        let repo = self.repo()?;
        let mut opts = DiffOptions::new();
        opts.context_lines(0);
        let diff = Self::tree_diff(&repo, from, to, Some(&mut opts))?;

        let mut files = Vec::new();
        for (idx, delta) in diff.deltas().enumerate() {
            let change_type = ModificationType::from(delta.status());
            let mut edits = Vec::new();
            if let Some(patch) = Patch::from_diff(&diff, idx)? {
                for h in 0..patch.num_hunks() {
                    let (hunk, lines) = patch.hunk(h)?;
                    let mut edit = hunk_edit(
                        hunk.old_start(),
                        hunk.old_lines(),
                        hunk.new_start(),
                        hunk.new_lines(),
                    );
                    for l in 0..lines {
                        let line = patch.line_in_hunk(h, l)?;
                        if matches!(line.origin(), '+' | '-') {
                            edit.size_bytes += line.content().len() as u64;
                        }
                    }
                    edits.push(edit);
                }
            }
            let size_after = if change_type == ModificationType::Delete
                || delta.new_file().mode() == FileMode::Commit
            {
                0
            } else {
                self.blob_size(&repo, delta.new_file().id())?
            };
            files.push(FileEdits {
                old_path: (change_type != ModificationType::Add)
                    .then(|| path_string(delta.old_file().path()))
                    .flatten(),
                new_path: (change_type != ModificationType::Delete)
                    .then(|| path_string(delta.new_file().path()))
                    .flatten(),
                change_type,
                edits,
                size_after,
            });
        }
        Ok(files)
    }

    fn commit_tree_size(&self, id: &str) -> MineResult<u64> {
        let repo = self.repo()?;
        let tree = Self::find_commit(&repo, id)?.tree()?;
        let mut blobs = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |_, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                blobs.push(entry.id());
            }
            TreeWalkResult::Ok
        })?;
        blobs
            .into_iter()
            .try_fold(0u64, |total, oid| Ok(total + self.blob_size(&repo, oid)?))
    }

    fn blame_at_commit(&self, path: &str, commit: &str) -> MineResult<Vec<BlamedLine>> {
        let repo = self.repo()?;
        let target = Self::find_commit(&repo, commit)?;
        let entry = target
            .tree()?
            .get_path(Path::new(path))
            .map_err(|_| MineError::not_found("file", path))?;
        let blob = repo.find_blob(entry.id())?;
        if blob.is_binary() {
            return Ok(Vec::new());
        }
        let content = String::from_utf8_lossy(blob.content()).into_owned();

        let mut opts = BlameOptions::new();
        opts.newest_commit(target.id());
        let blame = repo
            .blame_file(Path::new(path), Some(&mut opts))
            .map_err(|e| MineError::Provider(format!("blame {}: {}", path, e.message())))?;

        let mut committers: HashMap<Oid, (Developer, DateTime<Utc>)> = HashMap::new();
        let mut lines = Vec::new();
        for (idx, text) in content.lines().enumerate() {
            let Some(hunk) = blame.get_line(idx + 1) else {
                continue;
            };
            let source = hunk.final_commit_id();
            let (committer, commit_time) = match committers.get(&source) {
                Some(known) => known.clone(),
                None => {
                    let c = repo.find_commit(source)?;
                    let known = (developer(&c.committer()), git_time_utc(&c.committer().when()));
                    committers.insert(source, known.clone());
                    known
                }
            };
            lines.push(BlamedLine {
                line_index: idx,
                content: text.to_string(),
                author: developer(&hunk.final_signature()),
                committer,
                commit_id: source.to_string(),
                commit_time,
            });
        }
        Ok(lines)
    }

    fn list_branches(&self) -> MineResult<Vec<String>> {
        let repo = self.repo()?;
        let mut names = Vec::new();
        for branch in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn list_tags(&self) -> MineResult<Vec<String>> {
        let repo = self.repo()?;
        let tags = repo.tag_names(None)?;
        Ok(tags.iter().flatten().map(String::from).collect())
    }

    fn resolve_tag_to_commit(&self, tag: &str) -> MineResult<String> {
        let repo = self.repo()?;
        let object = repo
            .revparse_single(&format!("refs/tags/{}", tag))
            .map_err(|_| MineError::not_found("tag", tag))?;
        let id = object.peel_to_commit()?.id().to_string();
        Ok(id)
    }

    fn checkout_branch(&self, name: &str) -> MineResult<()> {
        let repo = self.repo()?;
        if repo.is_bare() {
            return Err(MineError::CheckoutConflict(
                "cannot check out in a bare repository".to_string(),
            ));
        }
        let mut status_opts = StatusOptions::new();
        status_opts.include_untracked(false).include_ignored(false);
        let dirty = repo
            .statuses(Some(&mut status_opts))?
            .iter()
            .any(|entry| entry.status() != Status::CURRENT);
        if dirty {
            return Err(MineError::CheckoutConflict(
                "there are uncommitted changes in the working directory".to_string(),
            ));
        }

        let branch = repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| MineError::not_found("branch", name))?;
        let tree = branch.get().peel_to_tree()?;
        repo.checkout_tree(tree.as_object(), Some(CheckoutBuilder::new().safe()))?;
        repo.set_head(&format!("refs/heads/{}", name))?;
        debug!("Checked out branch {}", name);
        Ok(())
    }

    fn current_files(&self) -> MineResult<Vec<String>> {
        let repo = self.repo()?;
        let tree = repo.head()?.peel_to_tree()?;
        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    files.push(format!("{}{}", root, name));
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(files)
    }

    fn branch_commits(&self, branch: &str) -> MineResult<Vec<String>> {
        let repo = self.repo()?;
        let branch_ref = repo
            .find_branch(branch, BranchType::Local)
            .map_err(|_| MineError::not_found("branch", branch))?;
        let tip = branch_ref
            .get()
            .target()
            .ok_or_else(|| MineError::not_found("branch target", branch))?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push(tip)?;
        revwalk
            .map(|oid| oid.map(|o| o.to_string()).map_err(MineError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn commit_file(repo: &Repository, dir: &Path, path: &str, content: &str, msg: &str) -> Oid {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, content).unwrap();
        let sig = repo.signature().unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(path)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &parent_refs)
            .unwrap()
    }

    fn create_test_repo() -> (TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        (dir, repo)
    }

    #[test]
    fn test_hunk_edit_coordinates() {
        // pure insertion of 2 lines after line 3
        let insert = hunk_edit(3, 0, 4, 2);
        assert_eq!((insert.begin_a, insert.end_a, insert.begin_b, insert.end_b), (3, 3, 3, 5));
        // deletion of lines 2..=3
        let delete = hunk_edit(2, 2, 1, 0);
        assert_eq!((delete.begin_a, delete.end_a, delete.begin_b, delete.end_b), (1, 3, 1, 1));
    }

    #[test]
    fn test_history_and_edits() {
        let (dir, repo) = create_test_repo();
        let first = commit_file(&repo, dir.path(), "a.txt", "1\n2\n3\n", "first");
        let second = commit_file(&repo, dir.path(), "a.txt", "1\n2\n3\n4\n5\n", "second");

        let provider = GitProvider::open(dir.path(), ProviderOptions::default()).unwrap();
        let history = provider.list_change_sets(false).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.to_string());
        assert_eq!(provider.resolve_head().unwrap(), second.to_string());

        let edits = provider
            .file_edits(Some(&first.to_string()), &second.to_string())
            .unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].edits.len(), 1);
        assert_eq!(edits[0].edits[0].len_b(), 2);
        assert_eq!(edits[0].edits[0].size_bytes, 4);
        assert_eq!(edits[0].size_after, 10);

        assert_eq!(provider.commit_tree_size(&second.to_string()).unwrap(), 10);
    }

    #[test]
    fn test_get_commit_counts_and_limits() {
        let (dir, repo) = create_test_repo();
        commit_file(&repo, dir.path(), "a.txt", "x\n", "first");
        let second = commit_file(&repo, dir.path(), "a.txt", "x\ny\nz\n", "second\n\nbody");

        let provider = GitProvider::open(dir.path(), ProviderOptions::default()).unwrap();
        let commit = provider.get_commit(&second.to_string()).unwrap();
        assert_eq!(commit.author.email, "test@example.com");
        assert_eq!(commit.first_line(), "second");
        assert!(!commit.merge);
        assert!(commit.in_main_branch);
        assert_eq!(commit.modifications.len(), 1);
        assert_eq!(commit.modifications[0].added, 2);
        assert_eq!(commit.modifications[0].removed, 0);

        let strict = GitProvider::open(
            dir.path(),
            ProviderOptions {
                max_files: 0,
                ..Default::default()
            },
        )
        .unwrap();
        let err = strict.get_commit(&second.to_string()).unwrap_err();
        assert!(matches!(err, MineError::TooManyFiles { .. }));

        let err = provider.get_commit("0123456789abcdef0123456789abcdef01234567").unwrap_err();
        assert!(matches!(err, MineError::NotFound { .. }));
    }

    #[test]
    fn test_oversized_diff_is_replaced() {
        let (dir, repo) = create_test_repo();
        let id = commit_file(&repo, dir.path(), "big.txt", &"line\n".repeat(100), "big");
        let provider = GitProvider::open(
            dir.path(),
            ProviderOptions {
                max_diff_bytes: 50,
                ..Default::default()
            },
        )
        .unwrap();
        let commit = provider.get_commit(&id.to_string()).unwrap();
        assert_eq!(commit.modifications[0].diff, TOO_BIG_SENTINEL);
    }

    #[test]
    fn test_basic_only_collects_nothing_extra() {
        let (dir, repo) = create_test_repo();
        let id = commit_file(&repo, dir.path(), "a.rs", "fn main() {}\n", "msg");
        let provider = GitProvider::open(
            dir.path(),
            ProviderOptions {
                collect: CollectConfig::basic_only(),
                ..Default::default()
            },
        )
        .unwrap();
        let commit = provider.get_commit(&id.to_string()).unwrap();
        assert!(commit.message.is_empty());
        assert!(commit.branches.is_empty());
        assert!(commit.modifications[0].diff.is_empty());
        assert!(commit.modifications[0].source_code.is_none());
    }

    #[test]
    fn test_diff_between_two_commits() {
        let (dir, repo) = create_test_repo();
        let first = commit_file(&repo, dir.path(), "a.txt", "1\n2\n", "first");
        commit_file(&repo, dir.path(), "docs/b.md", "x\n", "second");
        let third = commit_file(&repo, dir.path(), "a.txt", "1\n2\n3\n", "third");

        let provider = GitProvider::open(dir.path(), ProviderOptions::default()).unwrap();
        let mut modifications = provider
            .diff(&first.to_string(), &third.to_string())
            .unwrap();
        modifications.sort_by(|a, b| a.path().cmp(b.path()));

        assert_eq!(modifications.len(), 2);
        assert_eq!(modifications[0].path(), "a.txt");
        assert_eq!(modifications[0].change_type, ModificationType::Modify);
        assert_eq!((modifications[0].added, modifications[0].removed), (1, 0));
        assert_eq!(modifications[1].path(), "docs/b.md");
        assert_eq!(modifications[1].change_type, ModificationType::Add);
        assert!(modifications[1].old_path.is_none());

        assert!(provider
            .diff(&third.to_string(), &third.to_string())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_collecting_narrows_provider_toggles() {
        let (dir, repo) = create_test_repo();
        let id = commit_file(&repo, dir.path(), "a.rs", "fn main() {}\n", "msg").to_string();
        let provider = GitProvider::open(dir.path(), ProviderOptions::default()).unwrap();

        let lean = provider
            .get_commit_collecting(
                &id,
                CollectConfig {
                    commit_messages: true,
                    ..CollectConfig::basic_only()
                },
            )
            .unwrap();
        assert_eq!(lean.message, "msg");
        assert!(lean.branches.is_empty());
        assert!(lean.modifications[0].diff.is_empty());
        assert!(lean.modifications[0].source_code.is_none());

        // a toggle the provider disables stays off
        let quiet = GitProvider::open(
            dir.path(),
            ProviderOptions {
                collect: CollectConfig::basic_only(),
                ..Default::default()
            },
        )
        .unwrap();
        let commit = quiet
            .get_commit_collecting(&id, CollectConfig::everything())
            .unwrap();
        assert!(commit.message.is_empty());
    }

    #[test]
    fn test_blame_and_files() {
        let (dir, repo) = create_test_repo();
        commit_file(&repo, dir.path(), "src/lib.rs", "a\nb\n", "one");
        let head = commit_file(&repo, dir.path(), "README", "hi\n", "two");

        let provider = GitProvider::open(dir.path(), ProviderOptions::default()).unwrap();
        let mut files = provider.current_files().unwrap();
        files.sort();
        assert_eq!(files, vec!["README".to_string(), "src/lib.rs".to_string()]);

        let lines = provider
            .blame_at_commit("src/lib.rs", &head.to_string())
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].content, "b");
        assert_eq!(lines[0].author.name, "Test User");

        let touching = provider.list_change_sets_touching(Some("src")).unwrap();
        assert_eq!(touching.len(), 1);
    }

    #[test]
    fn test_tags_and_checkout_guard() {
        let (dir, repo) = create_test_repo();
        let id = commit_file(&repo, dir.path(), "a.txt", "1\n", "one");
        let obj = repo.find_object(id, None).unwrap();
        repo.tag_lightweight("v1", &obj, false).unwrap();

        let provider = GitProvider::open(dir.path(), ProviderOptions::default()).unwrap();
        assert_eq!(provider.list_tags().unwrap(), vec!["v1".to_string()]);
        assert_eq!(provider.resolve_tag_to_commit("v1").unwrap(), id.to_string());
        assert!(matches!(
            provider.resolve_tag_to_commit("nope"),
            Err(MineError::NotFound { .. })
        ));

        fs::write(dir.path().join("a.txt"), "dirty\n").unwrap();
        let branch = provider.main_branch().to_string();
        assert!(matches!(
            provider.checkout_branch(&branch),
            Err(MineError::CheckoutConflict(_))
        ));
    }
}
