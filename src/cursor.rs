//! Per-year resume offsets for the archive crawl.
//!
//! Each year has exactly one document in the state index, addressed by
//! `md5("<state index>-<year>")`, so saving overwrites instead of appending.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::IndexError;
use crate::index::SearchBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub year: i32,
    #[serde(rename = "last_flight_number")]
    pub offset: u64,
}

#[derive(Clone)]
pub struct CursorStore {
    backend: Arc<dyn SearchBackend>,
    index: String,
}

impl CursorStore {
    pub fn new(backend: Arc<dyn SearchBackend>, index: &str) -> Self {
        Self {
            backend,
            index: index.to_string(),
        }
    }

    /// Document id for `year`'s cursor.
    pub fn state_id(&self, year: i32) -> String {
        format!("{:x}", md5::compute(format!("{}-{}", self.index, year)))
    }

    /// Last saved offset for `year`; zero when nothing was saved yet.
    pub async fn load(&self, year: i32) -> Result<u64, IndexError> {
        let id = self.state_id(year);
        debug!(year, id = %id, "loading cursor");
        match self.backend.get_by_id(&self.index, &id).await? {
            Some(document) => {
                let cursor: Cursor = serde_json::from_value(document)?;
                Ok(cursor.offset)
            }
            None => {
                warn!(year, "no saved cursor, starting at 0");
                Ok(0)
            }
        }
    }

    /// Overwrite `year`'s cursor, refreshing so the next load sees it.
    pub async fn save(&self, year: i32, offset: u64) -> Result<(), IndexError> {
        let id = self.state_id(year);
        let document = serde_json::to_value(Cursor { year, offset })?;
        self.backend
            .index_with_id(&self.index, &id, &document, true)
            .await?;
        debug!(year, offset, id = %id, "saved cursor");
        Ok(())
    }
}
