//! Commit ingestion
//!
//! Turns selected changesets into persisted [`CommitFacts`]. Commits already
//! in the store are dropped before dispatch and never fetched again, so a
//! second run over the same selection only picks up what failed or is new.

use super::{log_unit_failure, worker_pool, Progress, ProgressCallback, StabilityAnalyzer};
use crate::cache::MiningCaches;
use crate::error::{MineError, MineResult};
use crate::filters::ChangeSelector;
use crate::git::blame::short;
use crate::git::ScmProvider;
use crate::models::{ChangeSet, CommitFacts, FileChangeFacts, FileTouch};
use crate::store::{MetadataStore, StoreConnector};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome counts of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub ingested: usize,
    /// Already stored, either before dispatch or by a concurrent writer
    pub skipped: usize,
    /// Rejected by a commit filter
    pub filtered: usize,
    pub failed: usize,
    pub failed_commits: Vec<String>,
}

enum Unit {
    Ingested,
    Skipped,
    Filtered,
}

pub struct CommitIngestor<'a> {
    scm: &'a dyn ScmProvider,
    connector: &'a dyn StoreConnector,
    caches: &'a MiningCaches,
    selector: ChangeSelector,
    workers: usize,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> CommitIngestor<'a> {
    pub fn new(
        scm: &'a dyn ScmProvider,
        connector: &'a dyn StoreConnector,
        caches: &'a MiningCaches,
    ) -> Self {
        Self {
            scm,
            connector,
            caches,
            selector: ChangeSelector::default(),
            workers: 1,
            progress_callback: None,
        }
    }

    /// Commit filters applied to each materialized commit.
    pub fn with_selector(mut self, selector: ChangeSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Ingest every commit of `selected` (newest first) that the store does not know yet.
    ///
    /// Store failures while building the working set abort the call; failures
    /// inside one commit are logged and reported.
    pub fn ingest(&self, project: u64, selected: &[ChangeSet]) -> MineResult<IngestReport> {
        let start = Instant::now();
        let mut report = IngestReport::default();

        let pending: Vec<usize> = {
            let session = self.connector.connect()?;
            let mut pending = Vec::with_capacity(selected.len());
            for (index, change) in selected.iter().enumerate() {
                if session.commit_exists(project, &change.id)? {
                    report.skipped += 1;
                } else {
                    pending.push(index);
                }
            }
            pending
        };
        info!(
            "Ingesting {} commits ({} already stored)",
            pending.len(),
            report.skipped
        );

        let pool = worker_pool(self.workers)?;
        let progress = Progress::new(pending.len(), self.progress_callback.as_ref());
        let outcomes: Vec<(usize, MineResult<Unit>)> = pool.install(|| {
            pending
                .par_iter()
                .map_init(
                    || self.connector.connect(),
                    |session, &index| {
                        let outcome = match session {
                            Ok(session) => self.ingest_one(&**session, project, selected, index),
                            Err(e) => Err(MineError::StoreUnavailable(e.to_string())),
                        };
                        progress.tick();
                        (index, outcome)
                    },
                )
                .collect()
        });

        for (index, outcome) in outcomes {
            match outcome {
                Ok(Unit::Ingested) => report.ingested += 1,
                Ok(Unit::Skipped) => report.skipped += 1,
                Ok(Unit::Filtered) => report.filtered += 1,
                Err(e) => {
                    let id = &selected[index].id;
                    log_unit_failure("ingest commit", id, &e);
                    report.failed += 1;
                    report.failed_commits.push(id.clone());
                }
            }
        }

        info!(
            "Ingestion done in {:?}: {} ingested, {} skipped, {} filtered, {} failed",
            start.elapsed(),
            report.ingested,
            report.skipped,
            report.filtered,
            report.failed
        );
        Ok(report)
    }

    fn ingest_one(
        &self,
        session: &dyn MetadataStore,
        project: u64,
        selected: &[ChangeSet],
        index: usize,
    ) -> MineResult<Unit> {
        let change = &selected[index];
        let commit = self
            .scm
            .get_commit_collecting(&change.id, self.selector.required_collect())?;
        if !self.selector.accepts(&commit) {
            debug!("Commit {} rejected by filters", short(&change.id));
            return Ok(Unit::Filtered);
        }

        let author = &commit.author;
        let author_id = self
            .caches
            .authors
            .get_or_try_insert_with(author.email.clone(), || {
                session.get_or_create_author(project, &author.email, &author.name)
            })?;

        let parent = commit.parents.first().map(String::as_str);
        let edits = self.scm.file_edits(parent, &change.id)?;
        let stability = StabilityAnalyzer::analyze(self.scm, selected, index, Some(edits.as_slice()))?;
        let size = self.scm.commit_tree_size(&change.id)?;

        let mut facts = FileChangeFacts::default();
        let mut files = Vec::with_capacity(edits.len());
        for file in &edits {
            let path = file.path();
            let path_id = self
                .caches
                .file_paths
                .get_or_try_insert_with(path.to_string(), || {
                    session.get_or_create_file_path(project, path)
                })?;
            let file_facts = FileChangeFacts::from_edits(file);
            facts.add(&file_facts);
            files.push(FileTouch {
                path: path.to_string(),
                path_id,
                change_type: file.change_type,
                facts: file_facts,
                size_after: file.size_after,
            });
        }

        let record = CommitFacts {
            commit_id: change.id.clone(),
            author_id,
            author_name: author.name.clone(),
            author_email: author.email.clone(),
            time: change.time,
            size,
            stability,
            facts,
            files,
            message: Some(commit.message).filter(|m| !m.is_empty()),
        };

        if !session.insert_commit_facts(project, &record)? {
            debug!("Commit {} stored concurrently", short(&change.id));
            return Ok(Unit::Skipped);
        }
        Ok(Unit::Ingested)
    }
}
