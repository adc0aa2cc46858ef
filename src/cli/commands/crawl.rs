//! Live crawl command.

use socrawler::config::Settings;

/// Crawl the live feed page, then download every captured video.
#[cfg(feature = "browser")]
pub async fn cmd_crawl(settings: &Settings) -> anyhow::Result<()> {
    use anyhow::Context;
    use console::style;
    use socrawler::browser::launch;
    use socrawler::crawl::crawl_and_download;

    use crate::cli::helpers::{cancel_on_ctrl_c, downloader, format_duration, print_paths, print_row};

    let downloader = downloader(settings)?;
    std::fs::create_dir_all(&settings.downloads_dir)?;
    let request = settings
        .crawl
        .to_request(Some(settings.downloads_dir.clone()));

    println!(
        "{} Crawling {} for {}s (scroll every {}s)",
        style("→").cyan(),
        request.target_url,
        settings.crawl.duration,
        settings.crawl.scroll_interval
    );

    let browser = launch(&settings.browser)
        .await
        .context("Failed to start browser")?;
    let result = match browser.new_session().await {
        Ok(session) => {
            crawl_and_download(&session, request, &downloader, cancel_on_ctrl_c()).await
        }
        Err(e) => {
            browser.close().await;
            return Err(e).context("Failed to open browser page");
        }
    };
    browser.close().await;
    let result = result.context("Crawl failed")?;

    println!("{} Crawl complete", style("✓").green());
    print_row("Videos seen", result.total_videos);
    print_row("Thumbnails seen", result.total_thumbnails);
    print_row("Videos saved", result.videos.len());
    print_row("Thumbnails saved", result.thumbnails.len());
    print_row("Requests observed", result.stats.total_requests);
    print_row("Scrolls", result.stats.scrolls);
    print_row("Duration", format_duration(result.duration));
    print_paths("Videos", &result.videos);

    for failure in &result.failures {
        println!(
            "    {} {}: {}",
            style("✗").red(),
            failure.url,
            style(&failure.error).dim()
        );
    }
    Ok(())
}

#[cfg(not(feature = "browser"))]
pub async fn cmd_crawl(_settings: &Settings) -> anyhow::Result<()> {
    Err(socrawler::browser::BrowserError::NotCompiled.into())
}
