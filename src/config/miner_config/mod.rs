//! Miner configuration support
//!
//! Loads configuration from `repominer.toml` in the repository root, then
//! applies environment overrides. CLI flags are applied last by the binary.
//!
//! # Configuration Format
//!
//! ```toml
//! # repominer.toml
//! max_files_per_commit = 5000
//! max_diff_bytes = 100000
//! workers = 8
//! first_parent_only = false
//! main_branch = "main"
//! db_path = "/var/cache/repominer/project.redb"
//!
//! [collect]
//! commit_messages = true
//! branches = true
//! source_code = false
//! diffs = true
//!
//! [filters]
//! only_extensions = [".rs", ".toml"]
//! exclude_extensions = [".lock"]
//! skip_merges = true
//! ```

use crate::cache::get_mining_db_path;
use crate::error::{MineError, MineResult};
use crate::filters::{CommitFilter, DiffFilter};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "repominer.toml";
pub const DEFAULT_MAX_FILES: usize = 5000;
pub const DEFAULT_MAX_DIFF_BYTES: usize = 100_000;
pub const ENV_MAX_FILES: &str = "REPOMINER_MAX_FILES";
pub const ENV_MAX_DIFF: &str = "REPOMINER_MAX_DIFF";

/// Top-level miner configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MinerConfig {
    /// Commits touching more files fail ingestion for that commit only
    pub max_files_per_commit: usize,
    /// Diff text above this size is replaced with a sentinel
    pub max_diff_bytes: usize,
    /// Worker pool size (default: available parallelism)
    pub workers: Option<usize>,
    pub first_parent_only: bool,
    /// Branch treated as main (default: the branch HEAD points at)
    pub main_branch: Option<String>,
    pub db_path: Option<PathBuf>,
    pub collect: CollectConfig,
    pub filters: FilterConfig,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            max_files_per_commit: DEFAULT_MAX_FILES,
            max_diff_bytes: DEFAULT_MAX_DIFF_BYTES,
            workers: None,
            first_parent_only: false,
            main_branch: None,
            db_path: None,
            collect: CollectConfig::default(),
            filters: FilterConfig::default(),
        }
    }
}

/// What a materialized commit carries. A disabled toggle yields empty data.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectConfig {
    pub commit_messages: bool,
    pub branches: bool,
    pub source_code: bool,
    pub diffs: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self::everything()
    }
}

impl CollectConfig {
    pub fn everything() -> Self {
        Self {
            commit_messages: true,
            branches: true,
            source_code: true,
            diffs: true,
        }
    }

    /// Identity, parents and file list only.
    pub fn basic_only() -> Self {
        Self {
            commit_messages: false,
            branches: false,
            source_code: false,
            diffs: false,
        }
    }

    /// Toggles enabled in both.
    pub fn intersect(self, other: CollectConfig) -> Self {
        Self {
            commit_messages: self.commit_messages && other.commit_messages,
            branches: self.branches && other.branches,
            source_code: self.source_code && other.source_code,
            diffs: self.diffs && other.diffs,
        }
    }
}

/// Filter settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
    pub only_extensions: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub skip_merges: bool,
}

impl MinerConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.filter(|w| *w > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Configured database path, or the per-repository cache location.
    pub fn db_path_for(&self, repo_path: &Path) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| get_mining_db_path(repo_path))
    }

    pub fn diff_filters(&self) -> Vec<DiffFilter> {
        let mut filters = Vec::new();
        if !self.filters.only_extensions.is_empty() {
            filters.push(DiffFilter::OnlyDiffsWithFileTypes(
                self.filters.only_extensions.clone(),
            ));
        }
        if !self.filters.exclude_extensions.is_empty() {
            filters.push(DiffFilter::OnlyDiffsWithoutFileTypes(
                self.filters.exclude_extensions.clone(),
            ));
        }
        filters
    }

    pub fn commit_filters(&self) -> Vec<CommitFilter> {
        if self.filters.skip_merges {
            vec![CommitFilter::OnlyNoMerge]
        } else {
            Vec::new()
        }
    }

    /// Apply `REPOMINER_MAX_FILES` / `REPOMINER_MAX_DIFF` from `lookup`.
    ///
    /// Each variable is applied on its own; malformed ones are skipped and
    /// returned.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<MineError> {
        let mut rejected = Vec::new();
        let overrides: [(&str, &mut usize); 2] = [
            (ENV_MAX_FILES, &mut self.max_files_per_commit),
            (ENV_MAX_DIFF, &mut self.max_diff_bytes),
        ];
        for (name, slot) in overrides {
            let Some(raw) = lookup(name) else {
                continue;
            };
            match parse_limit(name, &raw) {
                Ok(value) => *slot = value,
                Err(e) => rejected.push(e),
            }
        }
        rejected
    }

    pub fn validate(&self) -> MineResult<()> {
        if self.max_files_per_commit == 0 {
            return Err(MineError::Config(
                "max_files_per_commit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_limit(name: &str, raw: &str) -> MineResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| MineError::Config(format!("{}={:?}: {}", name, raw, e)))
}

/// Load configuration for a repository
///
/// Reads `repominer.toml` from the repository root and applies environment
/// overrides. Missing or broken files fall back to defaults.
pub fn load_miner_config(repo_path: &Path) -> MinerConfig {
    let toml_path = repo_path.join(CONFIG_FILE_NAME);
    let mut config = if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded miner config from {}", toml_path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
                MinerConfig::default()
            }
        }
    } else {
        debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        MinerConfig::default()
    };

    for e in config.apply_env(|key| std::env::var(key).ok()) {
        warn!("Ignoring environment override: {}", e);
    }
    config
}

/// Load configuration from a TOML file
fn load_toml_config(path: &Path) -> anyhow::Result<MinerConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: MinerConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
