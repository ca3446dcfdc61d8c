//! Check-then-insert against the flight index.
//!
//! The existence check and the insert are two separate requests; two
//! pipelines racing on the same identity can both pass the check and both
//! insert. Deduplication is therefore eventual, not strict, when several
//! extractors run at once.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::error::IndexError;
use crate::index::{ExactQuery, SearchBackend};
use crate::model::{FlightRecord, Identity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[derive(Clone)]
pub struct FlightIndex {
    backend: Arc<dyn SearchBackend>,
    index: String,
}

impl FlightIndex {
    pub fn new(backend: Arc<dyn SearchBackend>, index: &str) -> Self {
        Self {
            backend,
            index: index.to_string(),
        }
    }

    pub fn identity_query(identity: &Identity<'_>) -> ExactQuery {
        ExactQuery::new()
            .field("full_name", identity.full_name)
            .field("distance", identity.distance)
            .field("flight_date", identity.flight_date)
    }

    /// Whether a flight with this identity is already stored.
    pub async fn exists(&self, identity: &Identity<'_>) -> Result<bool, IndexError> {
        let query = Self::identity_query(identity);
        let hits = self.backend.count(&self.index, &query).await?;
        debug!(full_name = identity.full_name, hits, "identity lookup");
        Ok(hits > 0)
    }

    /// Unconditional write; callers go through [`FlightIndex::insert_if_absent`].
    pub async fn insert(&self, record: &FlightRecord) -> Result<(), IndexError> {
        let document = serde_json::to_value(record)?;
        self.backend.index(&self.index, &document).await
    }

    /// Insert the flight identified by `identity` unless it is already stored.
    ///
    /// `record` is only awaited for a new identity, so a duplicate costs no
    /// detail page request. The record it yields must carry `identity`.
    pub async fn insert_if_absent<E>(
        &self,
        identity: Identity<'_>,
        record: impl Future<Output = Result<FlightRecord, E>>,
    ) -> Result<InsertOutcome, E>
    where
        E: From<IndexError>,
    {
        if self.exists(&identity).await? {
            return Ok(InsertOutcome::Duplicate);
        }
        let record = record.await?;
        self.insert(&record).await?;
        Ok(InsertOutcome::Inserted)
    }
}
