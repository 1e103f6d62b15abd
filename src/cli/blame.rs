//! Blame command - line ownership per directory at HEAD

use super::MiningContext;
use anyhow::Result;
use console::style;
use repominer::git::{BlameAggregator, BlamePackageInfo};

pub fn run(ctx: &MiningContext, format: &str, depth: usize) -> Result<()> {
    let manager = BlameAggregator::new(&ctx.scm, ctx.workers()).build()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&manager)?);
        return Ok(());
    }

    let packages = manager.packages();
    if packages.is_empty() {
        println!("Nothing to blame.");
        return Ok(());
    }

    let root = format!("/{}", manager.project_name);
    println!("\nLine ownership in {}\n", style(&manager.project_name).bold());
    for (path, package) in &packages {
        let level = path
            .strip_prefix(&root)
            .map(|rest| rest.matches('/').count())
            .unwrap_or(0);
        if level > depth {
            continue;
        }
        print_package(path, package, level);
    }
    println!();
    Ok(())
}

fn print_package(path: &str, package: &BlamePackageInfo, level: usize) {
    let top = package
        .authors
        .values()
        .max_by_key(|a| a.line_count)
        .map(|a| {
            let share = if package.line_count == 0 {
                0.0
            } else {
                a.line_count as f64 * 100.0 / package.line_count as f64
            };
            format!("{} ({:.0}%)", a.author, share)
        })
        .unwrap_or_default();
    println!(
        "  {}{} {:>8} lines  {:>4} files  {}",
        "  ".repeat(level),
        style(format!("{:<40}", path)).cyan(),
        package.line_count,
        package.files.len(),
        top
    );
}
