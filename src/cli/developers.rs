//! Developers command - contribution totals and current ownership

use super::{progress_bar, MiningContext};
use anyhow::Result;
use console::style;
use repominer::models::DeveloperInfo;
use repominer::pipeline::OwnershipAttributor;

pub fn run(ctx: &MiningContext, subtree: Option<&str>, format: &str) -> Result<()> {
    let (bar, callback) = progress_bar("Attributing ownership...");
    let developers = OwnershipAttributor::new(&ctx.scm, &ctx.connector, &ctx.caches)
        .with_workers(ctx.workers())
        .with_progress_callback(callback)
        .attribute(ctx.project, subtree)?;
    bar.finish_and_clear();

    let mut developers: Vec<DeveloperInfo> = developers.into_values().collect();
    developers.sort_by(|a, b| {
        b.actual_lines_owned
            .cmp(&a.actual_lines_owned)
            .then_with(|| b.commits.len().cmp(&a.commits.len()))
            .then_with(|| a.email.cmp(&b.email))
    });

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&developers)?);
        return Ok(());
    }

    if developers.is_empty() {
        println!(
            "No developers found. Run {} first.",
            style("repominer ingest").cyan()
        );
        return Ok(());
    }

    let scope = subtree.unwrap_or("(whole repository)");
    println!("\nDevelopers in {}\n", style(scope).bold());
    println!(
        "  {:<32} {:>8} {:>10} {:>10} {:>10} {:>8}",
        "Author", "Commits", "Added", "Deleted", "Owned", "Files"
    );
    for dev in &developers {
        println!(
            "  {:<32} {:>8} {:>10} {:>10} {:>10} {:>8}",
            truncate(&format!("{} <{}>", dev.name, dev.email), 32),
            dev.commits.len(),
            style(dev.lines_added).green(),
            style(dev.lines_deleted).red(),
            style(dev.actual_lines_owned).cyan(),
            dev.owned_files.len()
        );
    }
    println!();
    Ok(())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let head: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
