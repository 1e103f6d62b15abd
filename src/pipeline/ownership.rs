//! Ownership attribution
//!
//! Phase A folds the persisted facts of every commit touching the subtree
//! into per-developer accumulators. Phase B blames the files at HEAD (once
//! per file and head, results persisted) and assigns current line
//! ownership. Phase B starts only after every Phase A unit has finished.

use super::{in_subtree, log_unit_failure, worker_pool, Progress, ProgressCallback};
use crate::cache::MiningCaches;
use crate::error::{MineError, MineResult};
use crate::git::blame::short;
use crate::git::ScmProvider;
use crate::models::{BlamedLine, ChangeSet, DeveloperInfo};
use crate::store::{BlameRecord, MetadataStore, StoreConnector};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Files never attributed to anyone
const IGNORED_FILES: &[&str] = &[".DS_Store"];

pub struct OwnershipAttributor<'a> {
    scm: &'a dyn ScmProvider,
    connector: &'a dyn StoreConnector,
    caches: &'a MiningCaches,
    workers: usize,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> OwnershipAttributor<'a> {
    pub fn new(
        scm: &'a dyn ScmProvider,
        connector: &'a dyn StoreConnector,
        caches: &'a MiningCaches,
    ) -> Self {
        Self {
            scm,
            connector,
            caches,
            workers: 1,
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Developer statistics keyed by author email, restricted to `subtree` when given.
    pub fn attribute(
        &self,
        project: u64,
        subtree: Option<&str>,
    ) -> MineResult<HashMap<String, DeveloperInfo>> {
        let start = Instant::now();
        let pool = worker_pool(self.workers)?;
        let ledger: DashMap<String, DeveloperInfo> = DashMap::new();

        let history = self.scm.list_change_sets_touching(subtree)?;
        self.collect_history(&pool, project, &history, &ledger);

        let head = self.scm.resolve_head()?;
        self.assign_ownership(&pool, project, &head, subtree, &ledger)?;

        let developers: HashMap<String, DeveloperInfo> = ledger.into_iter().collect();
        self.connector
            .connect()?
            .merge_developer_aggregates(project, &developers)?;
        info!(
            "Attributed {} developers in {:?}",
            developers.len(),
            start.elapsed()
        );
        Ok(developers)
    }

    /// Phase A: fold stored commit facts into the ledger.
    fn collect_history(
        &self,
        pool: &rayon::ThreadPool,
        project: u64,
        history: &[ChangeSet],
        ledger: &DashMap<String, DeveloperInfo>,
    ) {
        info!("Collecting history of {} commits", history.len());
        let failed = AtomicUsize::new(0);
        let progress = Progress::new(history.len(), self.progress_callback.as_ref());
        pool.install(|| {
            history.par_iter().for_each_init(
                || self.connector.connect(),
                |session, change| {
                    let outcome = match session {
                        Ok(session) => Self::fold_commit(&**session, project, change, ledger),
                        Err(e) => Err(MineError::StoreUnavailable(e.to_string())),
                    };
                    if let Err(e) = outcome {
                        log_unit_failure("collect commit", &change.id, &e);
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                    progress.tick();
                },
            )
        });
        let failed = failed.load(Ordering::Relaxed);
        if failed > 0 {
            warn!("{} commits could not be collected", failed);
        }
    }

    fn fold_commit(
        session: &dyn MetadataStore,
        project: u64,
        change: &ChangeSet,
        ledger: &DashMap<String, DeveloperInfo>,
    ) -> MineResult<()> {
        let Some(facts) = session.get_commit_facts(project, &change.id)? else {
            debug!("Commit {} not ingested, skipping", short(&change.id));
            return Ok(());
        };
        // entry() holds the shard lock for the whole merge
        ledger
            .entry(facts.author_email.clone())
            .or_insert_with(|| {
                DeveloperInfo::new(facts.author_id, &facts.author_name, &facts.author_email)
            })
            .update_by_commit(&facts);
        Ok(())
    }

    /// Phase B: blame the files at `head` and assign line ownership.
    fn assign_ownership(
        &self,
        pool: &rayon::ThreadPool,
        project: u64,
        head: &str,
        subtree: Option<&str>,
        ledger: &DashMap<String, DeveloperInfo>,
    ) -> MineResult<()> {
        let session = self.connector.connect()?;
        for (path, id) in session.list_file_paths(project)? {
            self.caches.file_paths.insert(path, id);
        }

        let files: Vec<(String, u64)> = self
            .scm
            .current_files()?
            .into_iter()
            .filter(|path| in_subtree(path, subtree) && !is_ignored(path))
            .filter_map(|path| {
                let id = self.caches.file_paths.get(&path)?;
                Some((path, id))
            })
            .collect();
        info!("Blaming {} files at {}", files.len(), short(head));

        let failed = AtomicUsize::new(0);
        let progress = Progress::new(files.len(), self.progress_callback.as_ref());
        pool.install(|| {
            files.par_iter().for_each_init(
                || self.connector.connect(),
                |session, (path, path_id)| {
                    let outcome = match session {
                        Ok(session) => self.blame_file(&**session, project, head, path, *path_id),
                        Err(e) => Err(MineError::StoreUnavailable(e.to_string())),
                    };
                    if let Err(e) = outcome {
                        log_unit_failure("blame", path, &e);
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                    progress.tick();
                },
            )
        });

        let in_scope: HashSet<u64> = files.iter().map(|(_, id)| *id).collect();
        let records: Vec<BlameRecord> = session
            .get_blame_records(project, head)?
            .into_iter()
            .filter(|r| in_scope.contains(&r.path_id))
            .collect();

        for (email, owned) in tally(&records) {
            let mut developer = match ledger.get_mut(&email) {
                Some(developer) => developer,
                None => {
                    let id = self
                        .caches
                        .authors
                        .get_or_try_insert_with(email.clone(), || {
                            session.get_or_create_author(project, &email, &owned.name)
                        })?;
                    ledger
                        .entry(email.clone())
                        .or_insert_with(|| DeveloperInfo::new(id, &owned.name, &email))
                }
            };
            developer.actual_lines_owned = owned.lines;
            developer.actual_lines_size = owned.size;
            developer.owned_files = owned.files;
        }

        info!(
            "Ownership assigned from {} blame records ({} files failed)",
            records.len(),
            failed.load(Ordering::Relaxed)
        );
        Ok(())
    }

    /// Blame one file unless it is already recorded for `head`.
    fn blame_file(
        &self,
        session: &dyn MetadataStore,
        project: u64,
        head: &str,
        path: &str,
        path_id: u64,
    ) -> MineResult<()> {
        if session
            .get_blame_file_record_id(project, path_id, head)?
            .is_some()
        {
            return Ok(());
        }
        let lines = self.scm.blame_at_commit(path, head)?;
        let records = group_by_author(path_id, path, &lines);
        session.insert_blame_file(project, path_id, head, &records)?;
        Ok(())
    }
}

fn is_ignored(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    IGNORED_FILES.contains(&name)
}

/// One record per author email. The blame file id is assigned by the store.
fn group_by_author(
    path_id: u64,
    path: &str,
    lines: &[BlamedLine],
) -> Vec<BlameRecord> {
    let mut by_email: BTreeMap<&str, BlameRecord> = BTreeMap::new();
    for line in lines {
        let record = by_email
            .entry(line.author.email.as_str())
            .or_insert_with(|| BlameRecord {
                blame_file_id: 0,
                path_id,
                path: path.to_string(),
                author_name: line.author.name.clone(),
                author_email: line.author.email.clone(),
                line_ids: Vec::new(),
                line_count: 0,
                line_size: 0,
                latest_commit_time: line.commit_time,
            });
        record.line_ids.push(line.line_index);
        record.line_count += 1;
        record.line_size += line.content.len() as u64;
        record.latest_commit_time = record.latest_commit_time.max(line.commit_time);
    }
    by_email.into_values().collect()
}

#[derive(Debug, Default)]
struct Owned {
    name: String,
    lines: u64,
    size: u64,
    files: Vec<String>,
}

/// Per-email line totals plus the files each email owns.
///
/// A file's owner holds the most lines; ties go to the most recent line.
fn tally(records: &[BlameRecord]) -> BTreeMap<String, Owned> {
    let mut owned: BTreeMap<String, Owned> = BTreeMap::new();
    let mut owners: BTreeMap<u64, &BlameRecord> = BTreeMap::new();
    let rank = |r: &BlameRecord| (r.line_count, r.latest_commit_time);

    for record in records {
        let entry = owned.entry(record.author_email.clone()).or_default();
        entry.name.clone_from(&record.author_name);
        entry.lines += record.line_count;
        entry.size += record.line_size;

        let current = owners.entry(record.path_id).or_insert(record);
        if rank(record) > rank(*current) {
            *current = record;
        }
    }

    for record in owners.into_values() {
        if let Some(entry) = owned.get_mut(&record.author_email) {
            entry.files.push(record.path.clone());
        }
    }
    for entry in owned.values_mut() {
        entry.files.sort();
    }
    owned
}
