//! In-memory collaborators for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{FetchError, RenderError};
use crate::http::HttpFetch;
use crate::render::Renderer;

#[derive(Clone)]
enum Reply {
    Body(String),
    Status(u16),
}

/// Canned HTTP answers per URL. Replies are served in order; the last one repeats.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct StubHttp {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StubHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: &str) -> Self {
        self.push(url, Reply::Body(body.to_string()));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.push(url, Reply::Status(status));
        self
    }

    fn push(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl HttpFetch for StubHttp {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Renderer that plays back a fixed sequence of pages, one per call, and
/// records every URL it was asked for. Once the script runs out it renders
/// empty pages.
#[derive(Default)]
pub struct ScriptedRenderer {
    pages: Mutex<VecDeque<Result<String, u16>>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, html: &str) -> Self {
        self.pages.lock().unwrap().push_back(Ok(html.to_string()));
        self
    }

    pub fn failure(self, status: u16) -> Self {
        self.pages.lock().unwrap().push_back(Err(status));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.pages.lock().unwrap().pop_front() {
            Some(Ok(html)) => Ok(html),
            Some(Err(status)) => Err(RenderError::Status {
                url: url.to_string(),
                status,
            }),
            None => Ok(String::new()),
        }
    }
}

/// One listing row in the archive table layout.
pub fn listing_row(name: &str, day: &str, km: &str) -> String {
    let slug = name.replace(' ', "");
    format!(
        r#"<tr><td><a class="plt" href="/pilots/detail:{slug}"><b>{name}</b></a></td><td><div class="disc-fai" title="Free Flight"><div>free flight</div></div></td><td class="km"><strong>{km}</strong> km</td><td><a class="detail" title="flight detail" href="https://www.xcontest.org/world/en/flights/detail:{slug}/{day}/10:00">detail</a></td></tr>"#
    )
}

/// Detail page whose description carries every marker.
pub fn detail_page(country: &str) -> String {
    format!(
        r#"<html><head><meta property="og:description" content="⛳ Somewhere [{country}] ∷ ⌛ 1:30 ∷ ø 25.0 km/h ∷ ⊺ 1800 m ∷ 40.00 km"></head><body></body></html>"#
    )
}
