//! Ingest command - mine selected commits into the store

use super::{progress_bar, MiningContext};
use anyhow::{Context, Result};
use console::style;
use repominer::filters::{ChangeSelector, CommitRange};
use repominer::pipeline::{BranchIndexer, CommitIngestor};

pub fn run(ctx: &MiningContext, range: &str, index_branches: bool) -> Result<()> {
    let range: CommitRange = range.parse()?;
    let mut selector =
        ChangeSelector::new(range).first_parent_only(ctx.config.first_parent_only);
    for filter in ctx.config.commit_filters() {
        selector = selector.with_filter(filter);
    }

    let selected = selector
        .select(&ctx.scm)
        .context("Failed to select commits")?;
    println!(
        "\nIngesting {} into {}\n",
        style(ctx.repo_path().display()).cyan(),
        style(ctx.config.db_path_for(ctx.repo_path()).display()).dim()
    );

    let (bar, callback) = progress_bar("Ingesting commits...");
    let report = CommitIngestor::new(&ctx.scm, &ctx.connector, &ctx.caches)
        .with_selector(selector)
        .with_workers(ctx.workers())
        .with_progress_callback(callback)
        .ingest(ctx.project, &selected)?;
    bar.finish_and_clear();

    println!(
        "  {} {} selected, {} ingested, {} already stored, {} filtered",
        style("[OK]").green(),
        selected.len(),
        style(report.ingested).cyan(),
        report.skipped,
        report.filtered
    );
    if report.failed > 0 {
        println!(
            "  {} {} commits failed (rerun to retry):",
            style("[!!]").yellow(),
            report.failed
        );
        for id in report.failed_commits.iter().take(10) {
            println!("      {}", super::short(id));
        }
    }

    if index_branches && ctx.config.collect.branches {
        let indexed = BranchIndexer::new(&ctx.scm, &ctx.connector).index_branches(ctx.project)?;
        println!("  {} {} branches indexed", style("[OK]").green(), indexed.len());
    }
    println!();
    Ok(())
}
