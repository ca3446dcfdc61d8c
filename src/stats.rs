use std::ops::AddAssign;

use tracing::info;

use crate::dedup::InsertOutcome;
use crate::model::Provenance;

/// Counters for one archive run or one feed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub pages: usize,
    pub entries: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub http_requests: usize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::Duplicate => self.duplicates += 1,
        }
    }

    pub fn error(&mut self) {
        self.errors += 1;
    }

    pub fn log_summary(&self, source: Provenance) {
        info!(
            source = %source,
            pages = self.pages,
            entries = self.entries,
            inserted = self.inserted,
            duplicates = self.duplicates,
            errors = self.errors,
            http_requests = self.http_requests,
            "run finished"
        );
    }
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, other: Self) {
        self.pages += other.pages;
        self.entries += other.entries;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.errors += other.errors;
        self.http_requests += other.http_requests;
    }
}
