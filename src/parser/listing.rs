//! Streaming scanner for the archive listing table.
//!
//! The rendered `<tbody>` is walked as a flat stream of open/close/text events;
//! one [`ListingEntry`] is emitted per closed `<tr>`. No tree is built, so the
//! scanner follows the markup positionally and relies on the attribute order
//! the listing uses (see [`detail_href`] and [`discipline_label`]).

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::ScanError;
use crate::model::ListingEntry;
use crate::parser::{day_millis, parse_flight_date};

/// `<a class="detail" title=".." href="..">`: the link is the third attribute.
pub const DETAIL_HREF_INDEX: usize = 2;
/// `<div class="disc-.." title="free flight">`: the label is the second attribute.
pub const DISCIPLINE_LABEL_INDEX: usize = 1;

type Attrs = Vec<(String, String)>;

/// Link of a detail anchor, or `None` when the tag is not one.
pub fn detail_href(attrs: &Attrs) -> Option<&str> {
    match attrs.first() {
        Some((_, first)) if first == "detail" => Some(
            attrs
                .get(DETAIL_HREF_INDEX)
                .map(|(_, v)| v.as_str())
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

/// Discipline label of a discipline marker, or `None` when the tag is not one.
pub fn discipline_label(attrs: &Attrs) -> Option<&str> {
    match attrs.first() {
        Some((_, first)) if first.contains("disc") => Some(
            attrs
                .get(DISCIPLINE_LABEL_INDEX)
                .map(|(_, v)| v.as_str())
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

fn is_distance_cell(attrs: &Attrs) -> bool {
    matches!(attrs.first(), Some((_, first)) if first == "km")
}

/// `Free Flight` -> `free_flight`
pub fn normalize_category(label: &str) -> String {
    label.replace(' ', "_").to_lowercase()
}

/// Scan a listing fragment.
pub fn scan(fragment: &str) -> ListingScanner<'_> {
    ListingScanner::new(fragment)
}

#[derive(Debug, Clone, Copy)]
enum TextField {
    FullName,
    Distance,
}

/// Text node to capture once `skip` more events have gone by.
#[derive(Debug, Clone, Copy)]
struct Capture {
    field: TextField,
    skip: u8,
}

#[derive(Default)]
struct Row {
    entry: ListingEntry,
    rejected: Option<ScanError>,
}

impl Row {
    fn reject(&mut self, err: ScanError) {
        if self.rejected.is_none() {
            self.rejected = Some(err);
        }
    }

    fn finish(self) -> Result<ListingEntry, ScanError> {
        match self.rejected {
            Some(err) => Err(err),
            None => Ok(self.entry),
        }
    }
}

/// Lazy, single-pass iterator over the rows of a listing fragment.
///
/// Yields `Ok` for each completed row and `Err` for rows that had to be
/// dropped. A row still open when the input ends is discarded. Unrecoverable
/// markup errors are yielded once and end the scan.
pub struct ListingScanner<'a> {
    reader: Reader<&'a [u8]>,
    row: Option<Row>,
    pending: Option<Capture>,
    done: bool,
}

impl<'a> ListingScanner<'a> {
    pub fn new(fragment: &'a str) -> Self {
        let mut reader = Reader::from_str(fragment);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.check_comments = false;
        Self {
            reader,
            row: None,
            pending: None,
            done: false,
        }
    }

    fn on_open(&mut self, tag: &BytesStart<'_>) {
        let name = tag.name();
        if name.as_ref() == b"tr" {
            self.row = Some(Row::default());
            return;
        }
        let Some(row) = self.row.as_mut() else {
            return;
        };

        match name.as_ref() {
            b"b" => {
                self.pending = Some(Capture {
                    field: TextField::FullName,
                    skip: 0,
                })
            }
            b"a" => {
                let attrs = attributes(tag);
                if let Some(link) = detail_href(&attrs) {
                    row.entry.link = link.to_string();
                    let day = link.rsplit('/').nth(1).unwrap_or_default();
                    match parse_flight_date(day) {
                        Some(date) => row.entry.flight_date = day_millis(date),
                        None => row.reject(ScanError::Date {
                            link: link.to_string(),
                            value: day.to_string(),
                        }),
                    }
                }
            }
            b"div" => {
                let attrs = attributes(tag);
                if let Some(label) = discipline_label(&attrs) {
                    row.entry.flight_type = normalize_category(label);
                }
            }
            b"td" => {
                if is_distance_cell(&attributes(tag)) {
                    // the value sits inside a <strong>
                    self.pending = Some(Capture {
                        field: TextField::Distance,
                        skip: 1,
                    });
                }
            }
            _ => {}
        }
    }

    fn on_capture(&mut self, field: TextField, text: String) {
        let Some(row) = self.row.as_mut() else {
            return;
        };
        match field {
            TextField::FullName => row.entry.full_name = text.trim().to_string(),
            TextField::Distance => match text.trim().parse::<f64>() {
                Ok(km) => row.entry.distance = km,
                Err(_) => {
                    let link = row.entry.link.clone();
                    row.reject(ScanError::Distance { link, value: text });
                }
            },
        }
    }
}

impl Iterator for ListingScanner<'_> {
    type Item = Result<ListingEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let event = match self.reader.read_event() {
                Ok(Event::Eof) => {
                    self.done = true;
                    if self.row.take().is_some() {
                        debug!("listing ended inside a row, dropping it");
                    }
                    return None;
                }
                Ok(event) => event,
                Err(e) => {
                    self.done = true;
                    self.row = None;
                    return Some(Err(ScanError::Markup {
                        position: self.reader.buffer_position() as u64,
                        message: e.to_string(),
                    }));
                }
            };

            let closes_row = matches!(&event, Event::End(tag) if tag.name().as_ref() == b"tr");
            // a capture never reaches past the end of its row
            if let Some(capture) = self.pending.take().filter(|_| !closes_row) {
                if capture.skip > 0 {
                    self.pending = Some(Capture {
                        skip: capture.skip - 1,
                        ..capture
                    });
                } else {
                    let text = match &event {
                        Event::Text(t) => decode_text(t),
                        _ => String::new(),
                    };
                    self.on_capture(capture.field, text);
                }
                continue;
            }

            match event {
                Event::Start(tag) | Event::Empty(tag) => self.on_open(&tag),
                Event::End(tag) if tag.name().as_ref() == b"tr" => {
                    if let Some(row) = self.row.take() {
                        return Some(row.finish());
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Attributes in document order, values unescaped where possible.
fn attributes(tag: &BytesStart<'_>) -> Attrs {
    let mut attrs = tag.html_attributes();
    attrs.with_checks(false);
    attrs
        .filter_map(|attr| attr.ok())
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            (key, lossy_unescape(&attr.value))
        })
        .collect()
}

fn decode_text(text: &BytesText<'_>) -> String {
    lossy_unescape(text)
}

/// Unescape known XML entities; HTML-only entities such as `&nbsp;` are kept verbatim.
fn lossy_unescape(bytes: &[u8]) -> String {
    let raw = String::from_utf8_lossy(bytes);
    match quick_xml::escape::unescape(&raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}
