//! Mining pipelines
//!
//! Each pipeline fans independent work units (one commit, one file) out to a
//! bounded rayon pool and blocks until all of them finish. A failing unit is
//! logged and counted; it never cancels its siblings.

pub mod branches;
pub mod ingest;
pub mod ownership;
pub mod stability;

pub use branches::BranchIndexer;
pub use ingest::{CommitIngestor, IngestReport};
pub use ownership::OwnershipAttributor;
pub use stability::StabilityAnalyzer;

use crate::error::{MineError, MineResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, warn, Level};

/// Progress callback: (units done, units total)
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

pub(crate) fn worker_pool(workers: usize) -> MineResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| MineError::Provider(format!("worker pool: {}", e)))
}

/// Shared completion counter feeding an optional callback.
pub(crate) struct Progress<'a> {
    done: AtomicUsize,
    total: usize,
    callback: Option<&'a ProgressCallback>,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(total: usize, callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
            callback,
        }
    }

    pub(crate) fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(callback) = self.callback {
            callback(done, self.total);
        }
    }
}

/// Severity of a failed work unit: store and provider failures are errors.
pub(crate) fn failure_level(err: &MineError) -> Level {
    if err.is_unit_local() {
        Level::WARN
    } else {
        Level::ERROR
    }
}

/// Log one failed work unit, e.g. `log_unit_failure("ingest commit", id, &e)`.
pub(crate) fn log_unit_failure(action: &str, unit: &str, err: &MineError) {
    if failure_level(err) == Level::WARN {
        warn!("Failed to {} {}: {}", action, unit, err);
    } else {
        error!("Failed to {} {}: {}", action, unit, err);
    }
}

/// True when `path` lies inside `subtree` (everything matches when `None` or empty).
pub(crate) fn in_subtree(path: &str, subtree: Option<&str>) -> bool {
    let Some(prefix) = subtree.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()) else {
        return true;
    };
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
