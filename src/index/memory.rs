//! In-memory backend for tests. Writes are visible immediately.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use super::{ExactQuery, SearchBackend};
use crate::error::IndexError;

#[derive(Default)]
pub struct MemoryBackend {
    indices: RwLock<HashMap<String, Vec<(Option<String>, Value)>>>,
    /// Fail every write to this index.
    failing_writes: RwLock<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .unwrap()
            .get(index)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn documents(&self, index: &str) -> Vec<Value> {
        self.indices
            .read()
            .unwrap()
            .get(index)
            .map(|docs| docs.iter().map(|(_, doc)| doc.clone()).collect())
            .unwrap_or_default()
    }

    pub fn fail_writes_to(&self, index: &str) {
        *self.failing_writes.write().unwrap() = Some(index.to_string());
    }

    fn check_writable(&self, index: &str) -> Result<(), IndexError> {
        match self.failing_writes.read().unwrap().as_deref() {
            Some(failing) if failing == index => Err(IndexError::Status {
                index: index.to_string(),
                status: 503,
                body: "unavailable".into(),
            }),
            _ => Ok(()),
        }
    }
}

/// Whether `document` carries every term of `query` with an equal value.
fn matches(query: &ExactQuery, document: &Value) -> bool {
    query
        .terms
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn count(&self, index: &str, query: &ExactQuery) -> Result<u64, IndexError> {
        let indices = self.indices.read().unwrap();
        let hits = indices
            .get(index)
            .map(|docs| docs.iter().filter(|(_, doc)| matches(query, doc)).count())
            .unwrap_or(0);
        Ok(hits as u64)
    }

    async fn index(&self, index: &str, document: &Value) -> Result<(), IndexError> {
        self.check_writable(index)?;
        self.indices
            .write()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .push((None, document.clone()));
        Ok(())
    }

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Value>, IndexError> {
        let indices = self.indices.read().unwrap();
        Ok(indices.get(index).and_then(|docs| {
            docs.iter()
                .find(|(doc_id, _)| doc_id.as_deref() == Some(id))
                .map(|(_, doc)| doc.clone())
        }))
    }

    async fn index_with_id(
        &self,
        index: &str,
        id: &str,
        document: &Value,
        _refresh: bool,
    ) -> Result<(), IndexError> {
        self.check_writable(index)?;
        let mut indices = self.indices.write().unwrap();
        let docs = indices.entry(index.to_string()).or_default();
        match docs.iter_mut().find(|(doc_id, _)| doc_id.as_deref() == Some(id)) {
            Some((_, existing)) => *existing = document.clone(),
            None => docs.push((Some(id.to_string()), document.clone())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn count_requires_every_term() {
        let backend = MemoryBackend::new();
        backend
            .index(
                "flight",
                &json!({"full_name": "A B", "distance": 12.5, "flight_date": 1000}),
            )
            .await
            .unwrap();
        let hit = ExactQuery::new()
            .field("full_name", "A B")
            .field("distance", 12.5)
            .field("flight_date", 1000);
        let miss = hit.clone().field("country_code", "CH");

        assert_eq!(backend.count("flight", &hit).await.unwrap(), 1);
        assert_eq!(backend.count("flight", &miss).await.unwrap(), 0);
        let other_distance = ExactQuery::new().field("distance", 12.0);
        assert_eq!(backend.count("flight", &other_distance).await.unwrap(), 0);
        assert_eq!(backend.count("missing", &hit).await.unwrap(), 0);
    }
}
