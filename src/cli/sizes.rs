//! Sizes command - project and file sizes per ingested commit

use super::{short, MiningContext};
use anyhow::Result;
use console::style;
use repominer::store::StoreConnector;

pub fn run(ctx: &MiningContext, path: Option<&str>, format: &str) -> Result<()> {
    let sizes = ctx.connector.connect()?.commit_sizes(ctx.project, path)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&sizes)?);
        return Ok(());
    }
    if sizes.is_empty() {
        println!("No matching commits.");
        return Ok(());
    }

    println!("\nCommit sizes\n");
    for size in &sizes {
        println!(
            "  {} {} {:>10} bytes  stability {:.2}  {}",
            style(short(&size.name)).yellow(),
            size.date.format("%Y-%m-%d"),
            style(size.project_size).cyan(),
            size.stability,
            size.author_name
        );
        if path.is_some() {
            for (file, bytes) in &size.file_sizes {
                println!("      {:<50} {:>10}", file, bytes);
            }
        }
    }
    println!();
    Ok(())
}
