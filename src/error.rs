//! Typed errors for the extraction pipeline.
//!
//! Every variant here is local to one entry, page or tick; the controllers log
//! and count them, none of them stops a crawl.

use std::fmt;

use thiserror::Error;

/// Attributes read from the detail page description, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Country,
    Duration,
    Speed,
    Altitude,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Country => "country code",
            Field::Duration => "duration",
            Field::Speed => "average speed",
            Field::Altitude => "max altitude",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no {0} in description")]
    MissingField(Field),

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidNumber {
        field: Field,
        value: String,
        reason: String,
    },
}

/// A listing row that could not be turned into an entry.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unrecognized flight date {value:?} in link {link}")]
    Date { link: String, value: String },

    #[error("invalid distance {value:?} for {link}")]
    Distance { link: String, value: String },

    #[error("malformed listing markup at byte {position}: {message}")]
    Markup { position: u64, message: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// Transport failures, throttling and server errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("rendering {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rendering service answered {status} for {url}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no description metadata on {url}")]
    MissingDescription { url: String },

    #[error("extracting {url}: {source}")]
    Extract {
        url: String,
        #[source]
        source: ExtractError,
    },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed document: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("no {field} in feed title {title:?}")]
    MissingTitleField { field: &'static str, title: String },

    #[error("invalid distance {value:?} in feed title")]
    Distance { value: String },

    #[error("unrecognized flight date {value:?} in feed title")]
    FlightDate { value: String },

    #[error("unrecognized publication date {value:?}")]
    PublicationDate { value: String },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("index {index} answered {status}: {body}")]
    Status {
        index: String,
        status: u16,
        body: String,
    },

    #[error("unexpected index response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure to process one listing entry or feed item.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("entry for {full_name:?} has no detail link")]
    MissingLink { full_name: String },

    #[error(transparent)]
    Detail(#[from] DetailError),

    #[error(transparent)]
    Index(#[from] IndexError),
}
