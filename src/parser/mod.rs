pub mod description;
pub mod feed;
pub mod listing;

use chrono::{NaiveDate, NaiveTime};

/// Day formats found in detail links, tried in order.
const FLIGHT_DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%-d.%m.%Y"];

/// Parse a `dd.mm.yyyy` / `d.mm.yyyy` flight day; the first format that parses wins.
///
/// chrono reads `%m` and `%Y` leniently, so the month must be two digits and
/// the year four before any format is tried.
pub fn parse_flight_date(input: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = input.split('.').collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    if !(1..=2).contains(&day.len()) || month.len() != 2 || year.len() != 4 {
        return None;
    }
    FLIGHT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
}

/// Epoch millis of midnight UTC on `date`.
pub fn day_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}
