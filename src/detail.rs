use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::trace;
use url::Url;

use crate::error::DetailError;
use crate::http::HttpFetch;
use crate::model::FlightDetails;
use crate::parser::description::extract_details;

static DESCRIPTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[property*='og:description']").unwrap());

/// Fetch one flight detail page and extract its attributes. One request, no retry.
pub async fn fetch_details(http: &dyn HttpFetch, url: &str) -> Result<FlightDetails, DetailError> {
    let page = http.get_text(url).await?;
    let description = description_of(&page).ok_or_else(|| DetailError::MissingDescription {
        url: url.to_string(),
    })?;
    trace!(url, description = %description, "detail description");
    extract_details(&description).map_err(|source| DetailError::Extract {
        url: url.to_string(),
        source,
    })
}

/// `content` of the first `og:description` meta tag.
pub fn description_of(page: &str) -> Option<String> {
    Html::parse_document(page)
        .select(&DESCRIPTION_SEL)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::to_string)
}

/// Listing links may be site-relative; the index stores absolute URLs.
pub fn absolute_link(site: &Url, link: &str) -> String {
    match site.join(link) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, Field};
    use crate::testing::StubHttp;

    const URL_01: &str =
        "https://www.xcontest.org/world/en/flights/detail:Claricegomes/5.12.2021/14:23";
    const URL_02: &str = "https://www.xcontest.org/world/en/flights/detail:Fayber/5.12.2021/17:01";
    const URL_03: &str =
        "https://www.xcontest.org/world/en/flights/detail:HENRYHOYOS/5.12.2021/19:11";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[tokio::test]
    async fn detail_01() {
        let http = StubHttp::new().with_body(URL_01, &fixture("flight_detail_01"));
        let d = fetch_details(&http, URL_01).await.unwrap();
        assert_eq!(d.country_code, "BR");
        assert_eq!(d.take_off, "Governador Valadares - Ibituruna");
        assert_eq!(d.altitude_max, 2210);
    }

    #[tokio::test]
    async fn detail_02() {
        let http = StubHttp::new().with_body(URL_02, &fixture("flight_detail_02"));
        let d = fetch_details(&http, URL_02).await.unwrap();
        assert_eq!(d.country_code, "CO");
        assert_eq!(d.average_speed, 32.4);
    }

    #[tokio::test]
    async fn detail_03_unknown_takeoff_marker() {
        let http = StubHttp::new().with_body(URL_03, &fixture("flight_detail_03"));
        let d = fetch_details(&http, URL_03).await.unwrap();
        assert_eq!(d.country_code, "CO");
        assert_eq!(d.take_off, "?");
    }

    #[tokio::test]
    async fn page_without_description() {
        let http = StubHttp::new().with_body(URL_01, &fixture("flight_detail_no_meta"));
        let err = fetch_details(&http, URL_01).await.unwrap_err();
        assert!(matches!(err, DetailError::MissingDescription { .. }));
    }

    #[tokio::test]
    async fn extraction_failure_is_reported() {
        let page = r#"<html><head><meta property="og:description" content="⛳ Nowhere ∷ ⌛ 1:00 ∷ ø 1.0 km/h ∷ ⊺ 1 m"></head></html>"#;
        let http = StubHttp::new().with_body(URL_01, page);
        let err = fetch_details(&http, URL_01).await.unwrap_err();
        assert!(matches!(
            err,
            DetailError::Extract {
                source: ExtractError::MissingField(Field::Country),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn http_failure_is_reported() {
        let http = StubHttp::new().with_status(URL_01, 404);
        let err = fetch_details(&http, URL_01).await.unwrap_err();
        assert!(matches!(err, DetailError::Fetch(_)));
    }

    #[test]
    fn relative_links_are_resolved() {
        let site = Url::parse("https://www.xcontest.org").unwrap();
        assert_eq!(
            absolute_link(&site, "/world/en/flights/detail:a/1.07.2021/10:00"),
            "https://www.xcontest.org/world/en/flights/detail:a/1.07.2021/10:00"
        );
        assert_eq!(absolute_link(&site, URL_01), URL_01);
    }
}
