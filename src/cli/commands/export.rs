//! Export command.

use std::path::Path;

use anyhow::{bail, Context};
use console::style;

use socrawler::config::Settings;
use socrawler::feed::save_feed;

use crate::cli::helpers::open_repository;

/// Write stored items out as a feed document, newest first.
pub async fn cmd_export(settings: &Settings, limit: usize, output: &str) -> anyhow::Result<()> {
    let repo = open_repository(settings).await?;
    let feed = repo.export_feed(limit).await?;
    if feed.items.is_empty() {
        bail!("Nothing to export: the database has no items");
    }

    if output == "-" {
        println!("{}", serde_json::to_string_pretty(&feed)?);
    } else {
        let path = Path::new(output);
        save_feed(path, &feed)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!(
            "{} Exported {} items to {}",
            style("✓").green(),
            feed.items.len(),
            path.display()
        );
    }
    Ok(())
}
