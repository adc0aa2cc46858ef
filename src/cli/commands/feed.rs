//! Feed fetch and download commands.

use std::path::PathBuf;

use anyhow::Context;
use console::style;

use socrawler::config::Settings;
use socrawler::services::ingest::{FeedIngestor, FeedSource, IngestResult};

use crate::cli::helpers::{downloader, format_duration, open_repository, print_paths, print_row};

/// Fetch the feed and write it to a snapshot file.
#[cfg(feature = "browser")]
pub async fn cmd_feed_fetch(settings: &Settings, output: Option<PathBuf>) -> anyhow::Result<()> {
    use socrawler::browser::{launch, BrowserSession};

    let output = output
        .or_else(|| settings.feed.snapshot.as_ref().map(PathBuf::from))
        .context("No output file given (use --output or set feed.snapshot)")?;
    let fetcher = settings.feed.fetcher();

    let browser = launch(&settings.browser)
        .await
        .context("Failed to start browser")?;
    let result = match browser.new_session().await {
        Ok(session) => {
            let result = fetcher.fetch_to_file(&session, &output).await;
            let _ = session.close().await;
            result
        }
        Err(e) => {
            browser.close().await;
            return Err(e).context("Failed to open browser page");
        }
    };
    browser.close().await;
    let feed = result.context("Feed fetch failed")?;

    println!(
        "{} Saved {} feed items to {}",
        style("✓").green(),
        feed.items.len(),
        output.display()
    );
    Ok(())
}

#[cfg(not(feature = "browser"))]
pub async fn cmd_feed_fetch(_settings: &Settings, _output: Option<PathBuf>) -> anyhow::Result<()> {
    Err(socrawler::browser::BrowserError::NotCompiled.into())
}

/// Download new feed items, from a snapshot or the live endpoint.
pub async fn cmd_feed_download(
    settings: &Settings,
    from: Option<PathBuf>,
    limit: usize,
) -> anyhow::Result<()> {
    let repo = open_repository(settings).await?;
    let downloader = downloader(settings)?;
    let ingestor = FeedIngestor::new(&repo, &downloader);

    let result = match from {
        Some(path) => {
            println!(
                "{} Downloading from snapshot {}",
                style("→").cyan(),
                path.display()
            );
            ingestor.ingest(FeedSource::Snapshot(path), limit).await?
        }
        None => ingest_live(settings, &ingestor, limit).await?,
    };

    print_ingest(&result);
    Ok(())
}

#[cfg(feature = "browser")]
async fn ingest_live(
    settings: &Settings,
    ingestor: &FeedIngestor<'_>,
    limit: usize,
) -> anyhow::Result<IngestResult> {
    use socrawler::browser::{launch, BrowserSession};

    println!(
        "{} Fetching feed from {}",
        style("→").cyan(),
        settings.feed.url
    );
    let fetcher = settings.feed.fetcher();

    let browser = launch(&settings.browser)
        .await
        .context("Failed to start browser")?;
    let result = match browser.new_session().await {
        Ok(session) => {
            let source = FeedSource::Live {
                session: &session,
                fetcher: &fetcher,
            };
            let result = ingestor.ingest(source, limit).await;
            let _ = session.close().await;
            result
        }
        Err(e) => {
            browser.close().await;
            return Err(e).context("Failed to open browser page");
        }
    };
    browser.close().await;
    Ok(result?)
}

#[cfg(not(feature = "browser"))]
async fn ingest_live(
    _settings: &Settings,
    _ingestor: &FeedIngestor<'_>,
    _limit: usize,
) -> anyhow::Result<IngestResult> {
    Err(anyhow::Error::new(socrawler::browser::BrowserError::NotCompiled)
        .context("Live feed download needs the browser; use --from with a snapshot"))
}

fn print_ingest(result: &IngestResult) {
    let marker = if result.failed == 0 {
        style("✓").green()
    } else {
        style("!").yellow()
    };
    println!("{} {}", marker, style("Feed download complete").bold());
    print_row("Fetched", result.fetched);
    print_row("New", result.new_count);
    print_row("Downloaded", result.downloaded);
    print_row("Skipped", result.skipped);
    print_row("Failed", result.failed);
    print_row("Duration", format_duration(result.duration));
    print_paths("Videos", &result.video_paths);
    for post_id in &result.failed_post_ids {
        println!("    {} {}", style("✗").red(), post_id);
    }
}
