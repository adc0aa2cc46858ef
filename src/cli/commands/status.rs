//! Status command.

use console::style;

use socrawler::config::Settings;

use crate::cli::helpers::{open_repository, print_row};

/// Show stored item counts and upload progress.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    if !settings.database_path.exists() {
        println!(
            "{} No database at {}. Run 'socrawler feed download' first.",
            style("!").yellow(),
            settings.database_path.display()
        );
        return Ok(());
    }

    let repo = open_repository(settings).await?;
    let stats = repo.upload_stats().await?;
    let separator = "─".repeat(50);

    println!();
    println!("{}", style("socrawler status").bold());
    println!("{}", separator);
    print_row("Database", settings.database_path.display());
    print_row("Downloads", settings.downloads_dir.display());
    println!("{}", separator);
    print_row("Items", stats.total);
    print_row("In object store", stats.in_object_store);
    print_row("Published to CMS", stats.uploaded);
    print_row("Awaiting CMS", stats.pending);

    let recent = repo.list(5).await?;
    if !recent.is_empty() {
        println!("{}", separator);
        println!("Most recent:");
        for item in recent {
            let state = if item.uploaded_to_cms {
                style("published").green()
            } else if item.uploaded_to_object_store() {
                style("stored").cyan()
            } else {
                style("local").dim()
            };
            println!("  {:<40} {}", item.post_id, state);
        }
    }
    println!();
    Ok(())
}
