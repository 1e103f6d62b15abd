//! Branches command - record which ingested commits each branch contains

use super::MiningContext;
use anyhow::Result;
use console::style;
use repominer::pipeline::BranchIndexer;

pub fn run(ctx: &MiningContext) -> Result<()> {
    let indexed = BranchIndexer::new(&ctx.scm, &ctx.connector).index_branches(ctx.project)?;
    if indexed.is_empty() {
        println!("No local branches found.");
        return Ok(());
    }

    println!("\nBranches\n");
    for (branch, commits) in &indexed {
        println!(
            "  {} {} ingested commits",
            style(format!("{:<30}", branch)).cyan(),
            commits
        );
    }
    println!();
    Ok(())
}
