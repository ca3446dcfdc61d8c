//! Paginated crawl of the yearly flight archive.
//!
//! One run walks the listing page by page from the saved cursor until the
//! renderer keeps returning empty pages. The cursor is saved after every
//! processed page so a restart picks up where the last run stopped.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cursor::CursorStore;
use crate::error::IndexError;
use crate::ingest::Ingestor;
use crate::model::{ListingEntry, Provenance};
use crate::parser::listing;
use crate::render::Renderer;
use crate::stats::RunStats;

/// Rows per listing page; the offset parameter moves in these steps.
pub const PAGE_SIZE: u64 = 100;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{4}").unwrap());

/// First four-digit run in the listing URL, e.g. `.../world/2021/flights/...`.
pub fn year_in_url(url: &str) -> Option<i32> {
    YEAR_RE.find(url).and_then(|m| m.as_str().parse().ok())
}

/// What one run crawls.
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    /// Listing URL the offset is appended to.
    pub base_url: String,
    pub year: i32,
    /// Fixed start offset; `None` resumes from the saved cursor.
    pub start: Option<u64>,
}

impl CrawlTarget {
    pub fn page_url(&self, offset: u64) -> String {
        format!("{}{}", self.base_url, offset)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CrawlPolicy {
    /// Consecutive empty pages tolerated before the run ends.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub page_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub year: i32,
    pub final_offset: u64,
    pub stats: RunStats,
    pub cancelled: bool,
}

enum State {
    Resume,
    FetchPage,
    Scan(String),
    ProcessEntries(Vec<ListingEntry>),
    Advance,
    Done,
}

pub struct ArchiveCrawler {
    renderer: Arc<dyn Renderer>,
    cursors: CursorStore,
    ingestor: Ingestor,
    policy: CrawlPolicy,
}

impl ArchiveCrawler {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        cursors: CursorStore,
        ingestor: Ingestor,
        policy: CrawlPolicy,
    ) -> Self {
        Self {
            renderer,
            cursors,
            ingestor,
            policy,
        }
    }

    /// Crawl until the archive runs dry or `cancel` fires.
    ///
    /// Only a failure to read the saved cursor ends the run with an error;
    /// everything after that is logged, counted and skipped.
    pub async fn run(
        &self,
        target: &CrawlTarget,
        cancel: &CancellationToken,
    ) -> Result<CrawlReport, IndexError> {
        let mut stats = RunStats::new();
        let mut offset = 0;
        let mut retries = 0u32;
        let mut cancelled = false;
        let mut state = State::Resume;

        loop {
            state = match state {
                State::Resume => {
                    offset = match target.start {
                        Some(start) => start,
                        None => self.cursors.load(target.year).await?,
                    };
                    retries = 0;
                    info!(year = target.year, offset, "starting archive crawl");
                    State::FetchPage
                }
                State::FetchPage => {
                    if cancel.is_cancelled() {
                        cancelled = true;
                        State::Done
                    } else {
                        let url = target.page_url(offset);
                        debug!(offset, url = %url, "rendering page");
                        stats.http_requests += 1;
                        let page = match self.renderer.render(&url).await {
                            Ok(html) => html,
                            Err(e) => {
                                warn!(offset, "render failed: {e}");
                                String::new()
                            }
                        };

                        if !page.trim().is_empty() {
                            retries = 0;
                            stats.pages += 1;
                            State::Scan(page)
                        } else {
                            retries += 1;
                            if retries > self.policy.max_retries {
                                info!(offset, retries, "no more pages");
                                State::Done
                            } else {
                                warn!(offset, retries, "empty page, retrying");
                                if pause(self.policy.retry_delay, cancel).await {
                                    State::FetchPage
                                } else {
                                    cancelled = true;
                                    State::Done
                                }
                            }
                        }
                    }
                }
                State::Scan(page) => {
                    let mut entries = Vec::new();
                    for row in listing::scan(&page) {
                        match row {
                            Ok(entry) => entries.push(entry),
                            Err(e) => {
                                warn!(offset, "dropping row: {e}");
                                stats.error();
                            }
                        }
                    }
                    debug!(offset, entries = entries.len(), "scanned page");
                    State::ProcessEntries(entries)
                }
                State::ProcessEntries(entries) => {
                    for entry in &entries {
                        self.ingestor
                            .process(entry, Provenance::Archive, None, &mut stats)
                            .await;
                    }
                    State::Advance
                }
                State::Advance => {
                    offset += PAGE_SIZE;
                    if let Err(e) = self.cursors.save(target.year, offset).await {
                        error!(year = target.year, offset, "failed to save cursor: {e}");
                        stats.error();
                    }
                    if pause(self.policy.page_delay, cancel).await {
                        State::FetchPage
                    } else {
                        cancelled = true;
                        State::Done
                    }
                }
                State::Done => break,
            };
        }

        Ok(CrawlReport {
            year: target.year,
            final_offset: offset,
            stats,
            cancelled,
        })
    }
}

/// Sleep for `delay` unless `cancel` fires first. Returns false when cancelled.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
