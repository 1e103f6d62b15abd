//! CLI command definitions and handlers

mod blame;
mod branches;
mod developers;
mod ingest;
mod sizes;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use repominer::cache::MiningCaches;
use repominer::config::{load_miner_config, MinerConfig};
use repominer::git::{GitProvider, ProviderOptions, ScmProvider};
use repominer::pipeline::ProgressCallback;
use repominer::store::{RedbConnector, StoreConnector};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Repominer - incremental git history mining
///
/// Everything stays local: history is read with libgit2 and facts are kept
/// in an embedded database under the user cache directory.
#[derive(Parser, Debug)]
#[command(name = "repominer")]
#[command(
    version,
    about = "Mine git history into per-developer contribution and ownership statistics",
    after_help = "\
Examples:
  repominer . ingest                       Ingest every commit reachable from HEAD
  repominer . ingest --range months:6      Only the last six months
  repominer . developers --format json     Developer statistics as JSON
  repominer . developers --subtree src     Restrict to one directory
  repominer . blame                        Line ownership per directory
  repominer . sizes --path src/lib.rs      Size history of matching files"
)]
pub struct Cli {
    /// Path to repository (default: current directory)
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: available parallelism)
    #[arg(long, global = true, env = "REPOMINER_WORKERS", value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Metadata database file (default: per-repository cache location)
    #[arg(long, global = true, env = "REPOMINER_DB")]
    pub db: Option<PathBuf>,

    /// Follow only first parents when walking history
    #[arg(long, global = true)]
    pub first_parent: bool,

    /// Commits touching more files than this fail ingestion
    #[arg(long, global = true)]
    pub max_files: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest commits into the metadata store
    #[command(after_help = "\
Ranges:
  all                     Every commit reachable from HEAD (default)
  head                    Only HEAD
  commit:<id>             One commit
  commits:<id>,<id>,...   A list of commits
  since:<rfc3339>         Commits after a point in time
  between:<a>..<b>        Commits strictly between two RFC 3339 times
  months:<n>              The last n months of history
  daily:<n>               At most one commit every n days
  tags:<a>..<b>           Commits between two tags
  range:<a>..<b>          Commits between two commit ids")]
    Ingest {
        /// Commit range to ingest
        #[arg(long, default_value = "all")]
        range: String,

        /// Also record branch membership of ingested commits
        #[arg(long)]
        branches: bool,
    },

    /// Per-developer contribution and ownership statistics
    Developers {
        /// Only count history and files under this directory
        #[arg(long)]
        subtree: Option<String>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Line ownership per directory at HEAD
    Blame {
        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Directory depth to print (text format)
        #[arg(long, default_value = "2")]
        depth: usize,
    },

    /// Project and file sizes per ingested commit
    Sizes {
        /// Only commits touching paths containing this fragment
        #[arg(long)]
        path: Option<String>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Index branch membership of ingested commits
    Branches,
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    let ctx = MiningContext::open(&cli)?;
    match cli.command {
        Commands::Ingest { range, branches } => ingest::run(&ctx, &range, branches),
        Commands::Developers { subtree, format } => {
            developers::run(&ctx, subtree.as_deref(), &format)
        }
        Commands::Blame { format, depth } => blame::run(&ctx, &format, depth),
        Commands::Sizes { path, format } => sizes::run(&ctx, path.as_deref(), &format),
        Commands::Branches => branches::run(&ctx),
    }
}

/// Everything a command needs: config, provider, store and project id.
pub(crate) struct MiningContext {
    pub repo_path: PathBuf,
    pub config: MinerConfig,
    pub scm: GitProvider,
    pub connector: RedbConnector,
    pub caches: MiningCaches,
    pub project: u64,
}

impl MiningContext {
    fn open(cli: &Cli) -> Result<Self> {
        let repo_path = cli
            .path
            .canonicalize()
            .with_context(|| format!("Path does not exist: {}", cli.path.display()))?;

        let mut config = load_miner_config(&repo_path);
        if let Some(workers) = cli.workers {
            config.workers = Some(workers);
        }
        if let Some(db) = &cli.db {
            config.db_path = Some(db.clone());
        }
        if let Some(max_files) = cli.max_files {
            config.max_files_per_commit = max_files;
        }
        config.first_parent_only |= cli.first_parent;
        config.validate()?;

        let scm = GitProvider::open(&repo_path, ProviderOptions::from(&config))
            .with_context(|| format!("Not a git repository: {}", repo_path.display()))?;
        let db_path = config.db_path_for(&repo_path);
        debug!("Using metadata store at {}", db_path.display());
        let connector = RedbConnector::open(&db_path)
            .with_context(|| format!("Failed to open metadata store {}", db_path.display()))?;
        let project = connector
            .connect()?
            .get_or_create_project(&scm.name(), &repo_path.to_string_lossy())?;

        Ok(Self {
            repo_path,
            config,
            scm,
            connector,
            caches: MiningCaches::new(),
            project,
        })
    }

    pub fn workers(&self) -> usize {
        self.config.worker_count()
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .expect("valid progress template")
        .progress_chars("█▓▒░  ")
}

/// A progress bar plus the library callback that drives it.
pub(crate) fn progress_bar(message: &'static str) -> (ProgressBar, ProgressCallback) {
    let bar = ProgressBar::new(0);
    bar.set_style(create_bar_style());
    bar.set_message(message);
    let handle = bar.clone();
    let callback: ProgressCallback = Box::new(move |done, total| {
        handle.set_length(total as u64);
        handle.set_position(done as u64);
    });
    (bar, callback)
}

pub(crate) fn short(id: &str) -> &str {
    &id[..id.len().min(12)]
}
