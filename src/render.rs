//! Client for the headless rendering service that materializes listing pages.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::json;
use tracing::debug;

use crate::error::RenderError;

/// Turns a URL into rendered markup of the listing table.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Serialized listing fragment, or an empty string when the table has no rows.
    async fn render(&self, url: &str) -> Result<String, RenderError>;
}

/// Renders through a browserless-style `/content` endpoint, waiting for the
/// listing table before the document is returned.
pub struct HttpRenderer {
    client: reqwest::Client,
    endpoint: String,
    wait_for: String,
    fragment: Selector,
    timeout: Duration,
    user_agent: String,
}

impl HttpRenderer {
    pub fn new(
        endpoint: &str,
        listing_selector: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let fragment = Selector::parse(listing_selector)
            .map_err(|e| anyhow::anyhow!("invalid listing selector {listing_selector:?}: {e}"))?;
        // the table itself shows up before its rows are filled in
        let wait_for = listing_selector
            .split_whitespace()
            .next()
            .unwrap_or(listing_selector)
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            wait_for,
            fragment,
            timeout,
            user_agent: user_agent.to_string(),
        })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        let body = json!({
            "url": url,
            "userAgent": self.user_agent,
            "waitForSelector": {
                "selector": self.wait_for,
                "visible": true,
                "timeout": self.timeout.as_millis() as u64,
            },
        });
        let transport = |source| RenderError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let document = response.text().await.map_err(transport)?;
        let fragment = select_fragment(&document, &self.fragment);
        debug!(url, bytes = fragment.len(), "rendered listing");
        Ok(fragment)
    }
}

/// Outer HTML of the first element matching `selector`, empty if none does.
///
/// Attributes are written back in source order (scraper's `deterministic`
/// feature); the listing scanner reads them by position.
pub fn select_fragment(document: &str, selector: &Selector) -> String {
    Html::parse_document(document)
        .select(selector)
        .next()
        .map(|el| el.html())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_listing_body_out_of_document() {
        let doc = r#"<html><body><div id="flights"><table class="XClist"><thead><tr><th>#</th></tr></thead><tbody><tr><td><b>Pilot</b></td></tr></tbody></table></div></body></html>"#;
        let selector = Selector::parse("table.XClist tbody").unwrap();
        let fragment = select_fragment(doc, &selector);
        assert!(fragment.starts_with("<tbody>"));
        assert!(fragment.contains("<b>Pilot</b>"));
        assert!(!fragment.contains("<th>"));
    }

    #[test]
    fn fragment_keeps_attribute_order_for_the_scanner() {
        let rows = std::fs::read_to_string("tests/fixtures/listing_page.html").unwrap();
        let doc = format!(
            r#"<html><body><table class="XClist"><thead><tr><th>#</th></tr></thead>{rows}</table></body></html>"#
        );
        let selector = Selector::parse("table.XClist tbody").unwrap();
        let fragment = select_fragment(&doc, &selector);
        assert!(fragment.contains(r#"<div class="disc-fai" title="Free Flight">"#));

        let entries: Vec<_> = crate::parser::listing::scan(&fragment)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0].link,
            "https://www.xcontest.org/world/en/flights/detail:Claricegomes/5.12.2021/14:23"
        );
        assert_eq!(entries[0].flight_type, "free_flight");
        assert_eq!(entries[1].flight_type, "flat_triangle");
        assert_eq!(entries[2].full_name, "Henry Hoyos");
    }

    #[test]
    fn missing_table_is_an_empty_page() {
        let selector = Selector::parse("table.XClist tbody").unwrap();
        assert!(select_fragment("<html><body>Nothing here</body></html>", &selector).is_empty());
    }
}
