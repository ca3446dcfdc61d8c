//! The per-entry pipeline shared by the archive crawl and the feed poller:
//! identity check, detail fetch, record assembly, insert.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::dedup::{FlightIndex, InsertOutcome};
use crate::detail::{absolute_link, fetch_details};
use crate::error::{DetailError, IngestError};
use crate::http::HttpFetch;
use crate::model::{FlightDetails, FlightRecord, ListingEntry, Provenance};
use crate::stats::RunStats;

#[derive(Clone)]
pub struct Ingestor {
    http: Arc<dyn HttpFetch>,
    flights: FlightIndex,
    site: Url,
    fetch_attempts: u32,
    retry_delay: Duration,
}

impl Ingestor {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        flights: FlightIndex,
        site: Url,
        fetch_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            http,
            flights,
            site,
            fetch_attempts: fetch_attempts.max(1),
            retry_delay,
        }
    }

    /// Run one entry through the pipeline, logging and counting the result.
    /// Failures never propagate past the entry.
    pub async fn process(
        &self,
        entry: &ListingEntry,
        provenance: Provenance,
        publication_date: Option<i64>,
        stats: &mut RunStats,
    ) {
        stats.entries += 1;
        match self.ingest(entry, provenance, publication_date, stats).await {
            Ok(outcome) => {
                match outcome {
                    InsertOutcome::Inserted => info!(
                        full_name = %entry.full_name,
                        distance = entry.distance,
                        source = %provenance,
                        "inserted flight"
                    ),
                    InsertOutcome::Duplicate => debug!(
                        full_name = %entry.full_name,
                        distance = entry.distance,
                        "flight already stored"
                    ),
                }
                stats.record(outcome);
            }
            Err(e) => {
                warn!(full_name = %entry.full_name, link = %entry.link, "skipping entry: {e}");
                stats.error();
            }
        }
    }

    pub async fn ingest(
        &self,
        entry: &ListingEntry,
        provenance: Provenance,
        publication_date: Option<i64>,
        stats: &mut RunStats,
    ) -> Result<InsertOutcome, IngestError> {
        if entry.link.is_empty() {
            return Err(IngestError::MissingLink {
                full_name: entry.full_name.clone(),
            });
        }
        let record = self.build_record(entry, provenance, publication_date, stats);
        self.flights.insert_if_absent(entry.identity(), record).await
    }

    /// Resolve the link, fetch the detail page and merge it with `entry`.
    async fn build_record(
        &self,
        entry: &ListingEntry,
        provenance: Provenance,
        publication_date: Option<i64>,
        stats: &mut RunStats,
    ) -> Result<FlightRecord, IngestError> {
        let url = absolute_link(&self.site, &entry.link);
        let details = self.details_with_retry(&url, stats).await?;
        let resolved = ListingEntry {
            link: url,
            ..entry.clone()
        };
        Ok(FlightRecord::assemble(
            &resolved,
            details,
            provenance,
            publication_date,
        ))
    }

    async fn details_with_retry(
        &self,
        url: &str,
        stats: &mut RunStats,
    ) -> Result<FlightDetails, DetailError> {
        let mut attempt = 1;
        loop {
            stats.http_requests += 1;
            match fetch_details(self.http.as_ref(), url).await {
                Err(DetailError::Fetch(e)) if e.is_transient() && attempt < self.fetch_attempts => {
                    warn!(url, attempt, "detail fetch failed ({e}), retrying");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
