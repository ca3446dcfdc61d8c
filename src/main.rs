mod archive;
mod config;
mod cursor;
mod dedup;
mod detail;
mod error;
mod http;
mod index;
mod ingest;
mod model;
mod parser;
mod render;
mod rss;
mod stats;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use url::Url;

use crate::archive::{pause, ArchiveCrawler, CrawlPolicy, CrawlTarget};
use crate::config::Settings;
use crate::cursor::CursorStore;
use crate::dedup::FlightIndex;
use crate::http::{HttpClient, HttpFetch};
use crate::index::elastic::ElasticBackend;
use crate::index::SearchBackend;
use crate::ingest::Ingestor;
use crate::model::Provenance;
use crate::render::HttpRenderer;
use crate::rss::FeedPoller;

#[derive(Parser)]
#[command(name = "xcontest_extractor", version, about = "Harvest XContest flights into Elasticsearch")]
struct Cli {
    /// Settings file (default: ./xcontest.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the paginated flight archive of one year
    Archive {
        /// Listing URL ending in the offset parameter
        #[arg(long)]
        url: Option<String>,
        /// Archive year (default: taken from the URL)
        #[arg(long)]
        year: Option<i32>,
        /// Start at this offset instead of the saved cursor
        #[arg(long)]
        start: Option<u64>,
        /// Crawl once and exit instead of re-running on an interval
        #[arg(long)]
        once: bool,
    },
    /// Poll the live flights feed
    Rss {
        /// Poll once and exit
        #[arg(long)]
        once: bool,
    },
    /// Inspect or overwrite the archive cursor
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },
    /// Fetch one flight detail page and print the extracted fields
    Detail { url: String },
}

#[derive(Subcommand)]
enum CursorAction {
    Show {
        #[arg(long)]
        year: i32,
    },
    Set {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        offset: u64,
    },
}

fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    init_tracing(&settings.log_level);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        settings = ?settings,
        "starting xcontest_extractor"
    );

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    match cli.command {
        Commands::Archive {
            url,
            year,
            start,
            once,
        } => run_archive(&settings, url, year, start, once, &cancel).await,
        Commands::Rss { once } => run_rss(&settings, once, &cancel).await,
        Commands::Cursor { action } => {
            let cursors = CursorStore::new(search_backend(&settings)?, &settings.state_index);
            match action {
                CursorAction::Show { year } => {
                    let offset = cursors.load(year).await?;
                    println!("{year}: {offset}");
                }
                CursorAction::Set { year, offset } => {
                    cursors.save(year, offset).await?;
                    println!("{year}: {offset} (saved)");
                }
            }
            Ok(())
        }
        Commands::Detail { url } => {
            let http = http_client(&settings)?;
            let site = Url::parse(&settings.site_url).context("invalid site_url")?;
            let url = detail::absolute_link(&site, &url);
            let details = detail::fetch_details(http.as_ref(), &url).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(())
        }
    }
}

async fn run_archive(
    settings: &Settings,
    url: Option<String>,
    year: Option<i32>,
    start: Option<u64>,
    once: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let year = match (&url, year) {
        (_, Some(year)) => Some(year),
        (Some(url), None) => archive::year_in_url(url).or(settings.archive_year),
        (None, None) => settings.archive_year(),
    };
    let base_url = url.unwrap_or_else(|| settings.archive_url.clone());
    let year = year.with_context(|| format!("no archive year given and none found in {base_url}"))?;
    let start = start.or_else(|| (!settings.load_last_offset).then_some(settings.start_offset));
    let target = CrawlTarget {
        base_url,
        year,
        start,
    };

    let backend = search_backend(settings)?;
    let renderer = HttpRenderer::new(
        &settings.render_url,
        &settings.listing_selector,
        settings.render_timeout(),
        &settings.user_agent,
    )?;
    let crawler = ArchiveCrawler::new(
        Arc::new(renderer),
        CursorStore::new(backend.clone(), &settings.state_index),
        ingestor(settings, backend)?,
        CrawlPolicy {
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
            page_delay: settings.page_delay(),
        },
    );

    loop {
        let t0 = Instant::now();
        match crawler.run(&target, cancel).await {
            Ok(report) => {
                report.stats.log_summary(Provenance::Archive);
                info!(
                    year = report.year,
                    offset = report.final_offset,
                    elapsed = %format_duration(t0.elapsed()),
                    "archive crawl stopped"
                );
                if report.cancelled {
                    break;
                }
            }
            Err(e) => error!(year, "could not resume crawl: {e}"),
        }
        if once || !pause(settings.archive_rerun(), cancel).await {
            break;
        }
    }
    Ok(())
}

async fn run_rss(settings: &Settings, once: bool, cancel: &CancellationToken) -> anyhow::Result<()> {
    let http = http_client(settings)?;
    let poller = FeedPoller::new(
        http,
        ingestor(settings, search_backend(settings)?)?,
        &settings.feed_url,
        settings.fetch_attempts,
        settings.retry_delay(),
    );

    while !cancel.is_cancelled() {
        let stats = poller.poll_once().await;
        stats.log_summary(Provenance::Rss);
        if once || !pause(settings.feed_interval(), cancel).await {
            break;
        }
    }
    Ok(())
}

fn search_backend(settings: &Settings) -> anyhow::Result<Arc<dyn SearchBackend>> {
    let backend = ElasticBackend::new(
        &settings.elasticsearch_url,
        &settings.elasticsearch_username,
        &settings.elasticsearch_password,
        settings.http_timeout(),
    )
    .context("building Elasticsearch client")?;
    Ok(Arc::new(backend))
}

fn http_client(settings: &Settings) -> anyhow::Result<Arc<dyn HttpFetch>> {
    let client = HttpClient::new(settings.http_timeout(), &settings.user_agent)
        .context("building HTTP client")?;
    Ok(Arc::new(client))
}

fn ingestor(settings: &Settings, backend: Arc<dyn SearchBackend>) -> anyhow::Result<Ingestor> {
    let site = Url::parse(&settings.site_url).context("invalid site_url")?;
    Ok(Ingestor::new(
        http_client(settings)?,
        FlightIndex::new(backend, &settings.flight_index),
        site,
        settings.fetch_attempts,
        settings.retry_delay(),
    ))
}

/// Cancel `cancel` on Ctrl+C or SIGTERM. Work already in flight is left to finish.
fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        info!("received shutdown signal");
        cancel.cancel();
    });
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
