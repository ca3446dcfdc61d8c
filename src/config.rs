//! Runtime settings: built-in defaults, then `xcontest.toml` (or `--config`),
//! then `XCONTEST_*` environment variables.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::archive::year_in_url;

pub const ENV_PREFIX: &str = "XCONTEST";
const DEFAULT_FILE: &str = "xcontest";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,

    pub elasticsearch_url: String,
    pub elasticsearch_username: String,
    pub elasticsearch_password: String,
    pub flight_index: String,
    pub state_index: String,

    /// Base for resolving relative detail links.
    pub site_url: String,
    /// Listing URL ending in the offset parameter.
    pub archive_url: String,
    pub archive_year: Option<i32>,
    pub start_offset: u64,
    pub load_last_offset: bool,

    pub render_url: String,
    pub render_timeout_secs: u64,
    pub listing_selector: String,
    pub user_agent: String,

    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub page_delay_secs: u64,
    pub archive_rerun_secs: u64,

    pub feed_url: String,
    pub feed_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub fetch_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            elasticsearch_url: "http://127.0.0.1:9200".into(),
            elasticsearch_username: "CHANGEME".into(),
            elasticsearch_password: "CHANGEME".into(),
            flight_index: "flight".into(),
            state_index: "download-state".into(),
            site_url: "https://www.xcontest.org".into(),
            archive_url: "https://www.xcontest.org/2021/world/en/flights/#flights[start]=".into(),
            archive_year: None,
            start_offset: 0,
            load_last_offset: true,
            render_url: "http://127.0.0.1:3000/content".into(),
            render_timeout_secs: 60,
            listing_selector: "table.XClist tbody".into(),
            user_agent: concat!("xcontest_extractor/", env!("CARGO_PKG_VERSION")).into(),
            max_retries: 5,
            retry_delay_secs: 10,
            page_delay_secs: 120,
            archive_rerun_secs: 3600,
            feed_url: "https://www.xcontest.org/rss/flights/?world".into(),
            feed_interval_secs: 300,
            http_timeout_secs: 10,
            fetch_attempts: 3,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("log_level", &self.log_level)
            .field("elasticsearch_url", &self.elasticsearch_url)
            .field("elasticsearch_username", &self.elasticsearch_username)
            .field("elasticsearch_password", &"<redacted>")
            .field("flight_index", &self.flight_index)
            .field("state_index", &self.state_index)
            .field("site_url", &self.site_url)
            .field("archive_url", &self.archive_url)
            .field("archive_year", &self.archive_year)
            .field("start_offset", &self.start_offset)
            .field("load_last_offset", &self.load_last_offset)
            .field("render_url", &self.render_url)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("listing_selector", &self.listing_selector)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("page_delay_secs", &self.page_delay_secs)
            .field("archive_rerun_secs", &self.archive_rerun_secs)
            .field("feed_url", &self.feed_url)
            .field("feed_interval_secs", &self.feed_interval_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("fetch_attempts", &self.fetch_attempts)
            .finish()
    }
}

impl Settings {
    /// Load from `path` if given (it must exist), else from an optional
    /// `xcontest.toml` in the working directory, with the environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        Self::from_builder(
            Config::builder().add_source(file).add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .ignore_empty(true),
            ),
        )
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Archive year: configured explicitly or read from the listing URL.
    pub fn archive_year(&self) -> Option<i32> {
        self.archive_year.or_else(|| year_in_url(&self.archive_url))
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.page_delay_secs)
    }

    pub fn archive_rerun(&self) -> Duration {
        Duration::from_secs(self.archive_rerun_secs)
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_secs(self.feed_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
