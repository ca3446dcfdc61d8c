//! Elasticsearch REST backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{ExactQuery, SearchBackend};
use crate::error::IndexError;

pub struct ElasticBackend {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    total: Total,
}

#[derive(Deserialize)]
struct Total {
    value: u64,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

impl ElasticBackend {
    pub fn new(
        endpoint: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.endpoint, path))
            .basic_auth(&self.username, Some(&self.password))
    }
}

/// Search body counting exact matches. Strings are compared on the dynamic
/// `.keyword` sub-field, which holds the whole unanalyzed value.
pub fn count_body(query: &ExactQuery) -> Value {
    let filters: Vec<Value> = query
        .terms
        .iter()
        .map(|(field, value)| match value {
            Value::String(_) => json!({ "term": { format!("{field}.keyword"): value } }),
            _ => json!({ "term": { field: value } }),
        })
        .collect();
    json!({
        "size": 0,
        "track_total_hits": true,
        "query": { "bool": { "filter": filters } },
    })
}

async fn error_for(index: &str, response: reqwest::Response) -> IndexError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    IndexError::Status {
        index: index.to_string(),
        status,
        body,
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn count(&self, index: &str, query: &ExactQuery) -> Result<u64, IndexError> {
        let body = count_body(query);
        debug!(index, query = %body, "search");
        let response = self
            .request(reqwest::Method::POST, &format!("{index}/_search"))
            .json(&body)
            .send()
            .await?;

        match response.status().as_u16() {
            404 => Ok(0),
            s if (200..300).contains(&s) => {
                let parsed: SearchResponse = serde_json::from_str(&response.text().await?)?;
                Ok(parsed.hits.total.value)
            }
            _ => Err(error_for(index, response).await),
        }
    }

    async fn index(&self, index: &str, document: &Value) -> Result<(), IndexError> {
        let response = self
            .request(reqwest::Method::POST, &format!("{index}/_doc"))
            .json(document)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for(index, response).await);
        }
        debug!(index, status = response.status().as_u16(), "indexed document");
        Ok(())
    }

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Value>, IndexError> {
        let response = self
            .request(reqwest::Method::GET, &format!("{index}/_doc/{id}"))
            .send()
            .await?;

        match response.status().as_u16() {
            404 => Ok(None),
            s if (200..300).contains(&s) => {
                let parsed: GetResponse = serde_json::from_str(&response.text().await?)?;
                Ok(parsed.source.filter(|_| parsed.found))
            }
            _ => Err(error_for(index, response).await),
        }
    }

    async fn index_with_id(
        &self,
        index: &str,
        id: &str,
        document: &Value,
        refresh: bool,
    ) -> Result<(), IndexError> {
        let response = self
            .request(reqwest::Method::PUT, &format!("{index}/_doc/{id}"))
            .query(&[("refresh", if refresh { "true" } else { "false" })])
            .json(document)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for(index, response).await);
        }
        debug!(index, id, "stored document");
        Ok(())
    }
}
