use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Plain GET access to the feed and detail pages.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Body of `url`; non-2xx answers are errors.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(20)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for HttpClient {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "GET");
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}

/// GET with up to `attempts` tries, pausing `delay` after each transient failure.
/// Every try is added to `requests`.
///
/// Permanent failures (4xx other than 429) return immediately.
pub async fn get_with_retry(
    http: &dyn HttpFetch,
    url: &str,
    attempts: u32,
    delay: Duration,
    requests: &mut usize,
) -> Result<String, FetchError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        *requests += 1;
        match http.get_text(url).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(
                    url,
                    attempt,
                    attempts,
                    "fetch failed ({e}), retrying in {:.1}s",
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
