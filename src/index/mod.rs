//! Narrow interface to the search index: the handful of reads and writes the
//! pipeline issues, nothing more.

pub mod elastic;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::IndexError;

/// Conjunction of exact field equalities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExactQuery {
    pub terms: Vec<(String, Value)>,
}

impl ExactQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.terms.push((name.to_string(), value.into()));
        self
    }
}

/// Black-box document store.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Number of documents in `index` matching `query`. A missing index counts as empty.
    async fn count(&self, index: &str, query: &ExactQuery) -> Result<u64, IndexError>;

    /// Store `document` under a generated id.
    async fn index(&self, index: &str, document: &Value) -> Result<(), IndexError>;

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Value>, IndexError>;

    /// Create or replace the document `id`; with `refresh` it is searchable on return.
    async fn index_with_id(
        &self,
        index: &str,
        id: &str,
        document: &Value,
        refresh: bool,
    ) -> Result<(), IndexError>;
}
