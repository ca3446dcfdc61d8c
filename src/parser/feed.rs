//! Reader for the live flights RSS feed.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use quick_xml::events::Event;
use regex::Regex;

use crate::error::FeedError;
use crate::model::ListingEntry;
use crate::parser::day_millis;

static DISTANCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+\.\d+) km").unwrap());
static FLIGHT_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":: (\w+)\]").unwrap());
static FULL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\] (.*)").unwrap());

/// Leading date token of an item title, e.g. `05.12.21`.
const TITLE_DATE_FORMAT: &str = "%d.%m.%y";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

/// A feed item reduced to a listing entry plus its publication time.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub entry: ListingEntry,
    pub publication_date: i64,
}

#[derive(Clone, Copy)]
enum ItemField {
    Title,
    Link,
    Description,
    PubDate,
}

/// Parse an RSS document into its `<item>`s, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, FeedError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut items = Vec::new();
    let mut item: Option<FeedItem> = None;
    let mut field: Option<ItemField> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"item" => item = Some(FeedItem::default()),
                b"title" if item.is_some() => field = Some(ItemField::Title),
                b"link" if item.is_some() => field = Some(ItemField::Link),
                b"description" if item.is_some() => field = Some(ItemField::Description),
                b"pubDate" if item.is_some() => field = Some(ItemField::PubDate),
                _ => {}
            },
            Event::Text(e) => {
                if let (Some(item), Some(field)) = (item.as_mut(), field) {
                    push_text(item, field, &e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let (Some(item), Some(field)) = (item.as_mut(), field) {
                    push_text(item, field, &String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"item" => {
                    if let Some(done) = item.take() {
                        items.push(done);
                    }
                    field = None;
                }
                b"title" | b"link" | b"description" | b"pubDate" => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(items)
}

fn push_text(item: &mut FeedItem, field: ItemField, text: &str) {
    let target = match field {
        ItemField::Title => &mut item.title,
        ItemField::Link => &mut item.link,
        ItemField::Description => &mut item.description,
        ItemField::PubDate => &mut item.pub_date,
    };
    target.push_str(text);
}

/// Pull the identity fields out of an item title such as
/// `05.12.21 [123.45 km :: free_flight] Clarice Gomes`.
pub fn entry_from_item(item: &FeedItem) -> Result<FeedEntry, FeedError> {
    let title = item.title.trim();

    let full_name = title_field(title, &FULL_NAME_RE, "full name")?;
    let distance_raw = title_field(title, &DISTANCE_RE, "distance")?;
    let flight_type = title_field(title, &FLIGHT_TYPE_RE, "flight type")?;

    let distance = distance_raw
        .parse::<f64>()
        .map_err(|_| FeedError::Distance {
            value: distance_raw.to_string(),
        })?;

    let day = title.split(' ').next().unwrap_or_default();
    let flight_date = NaiveDate::parse_from_str(day, TITLE_DATE_FORMAT)
        .map(day_millis)
        .map_err(|_| FeedError::FlightDate {
            value: day.to_string(),
        })?;

    let publication_date = parse_pub_date(&item.pub_date)?;

    Ok(FeedEntry {
        entry: ListingEntry {
            full_name: full_name.trim().to_string(),
            flight_date,
            distance,
            flight_type: flight_type.to_string(),
            link: item.link.trim().to_string(),
        },
        publication_date,
    })
}

/// RFC 2822 publication time in epoch millis.
pub fn parse_pub_date(value: &str) -> Result<i64, FeedError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|t| t.timestamp_millis())
        .map_err(|_| FeedError::PublicationDate {
            value: value.to_string(),
        })
}

fn title_field<'t>(
    title: &'t str,
    re: &Regex,
    field: &'static str,
) -> Result<&'t str, FeedError> {
    re.captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| FeedError::MissingTitleField {
            field,
            title: title.to_string(),
        })
}
