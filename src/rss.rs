use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::http::{get_with_retry, HttpFetch};
use crate::ingest::Ingestor;
use crate::model::Provenance;
use crate::parser::feed::{entry_from_item, parse_feed};
use crate::stats::RunStats;

/// Polls the live flight feed. Every tick is a complete pass over whatever
/// the feed holds at that moment; the flight index filters out repeats.
pub struct FeedPoller {
    http: Arc<dyn HttpFetch>,
    ingestor: Ingestor,
    feed_url: String,
    fetch_attempts: u32,
    retry_delay: Duration,
}

impl FeedPoller {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        ingestor: Ingestor,
        feed_url: &str,
        fetch_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            http,
            ingestor,
            feed_url: feed_url.to_string(),
            fetch_attempts,
            retry_delay,
        }
    }

    /// One tick. A feed that cannot be fetched or parsed yields no items.
    pub async fn poll_once(&self) -> RunStats {
        let mut stats = RunStats::new();
        let xml = match get_with_retry(
            self.http.as_ref(),
            &self.feed_url,
            self.fetch_attempts,
            self.retry_delay,
            &mut stats.http_requests,
        )
        .await
        {
            Ok(xml) => xml,
            Err(e) => {
                error!(url = %self.feed_url, "feed fetch failed: {e}");
                stats.error();
                return stats;
            }
        };

        let items = match parse_feed(&xml) {
            Ok(items) => items,
            Err(e) => {
                error!(url = %self.feed_url, "unreadable feed: {e}");
                stats.error();
                return stats;
            }
        };
        stats.pages += 1;
        debug!(items = items.len(), "feed fetched");

        for item in &items {
            match entry_from_item(item) {
                Ok(feed_entry) => {
                    self.ingestor
                        .process(
                            &feed_entry.entry,
                            Provenance::Rss,
                            Some(feed_entry.publication_date),
                            &mut stats,
                        )
                        .await;
                }
                Err(e) => {
                    warn!(title = %item.title, "skipping feed item: {e}");
                    stats.entries += 1;
                    stats.error();
                }
            }
        }
        stats
    }
}
