//! Field extraction from the `og:description` text of a flight detail page.
//!
//! The description is a single line of glyph-separated attributes, e.g.
//! `⛳ Ibituruna [BR] ∷ ⌛ 3:12 ∷ ø 38.6 km/h ∷ ⊺ 2210 m`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ExtractError, Field};
use crate::model::FlightDetails;

static TAKEOFF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"⛳ (.*?) \[").unwrap());
static COUNTRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([A-Z]{2})\]").unwrap());
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"⌛ ([0-9:].*?) ∷").unwrap());
static SPEED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"∷ ø (.*?) km/h ∷").unwrap());
static ALTITUDE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"⊺ (.*?) m").unwrap());

/// Stand-in for a description without a take-off marker.
pub const UNKNOWN_TAKEOFF: &str = "unknown";

/// Extract take-off, country, duration, speed and altitude, in that order.
///
/// Only the take-off is optional. The first missing or unparseable mandatory
/// field aborts the whole extraction.
pub fn extract_details(description: &str) -> Result<FlightDetails, ExtractError> {
    let take_off = capture(description, &TAKEOFF_RE)
        .unwrap_or(UNKNOWN_TAKEOFF)
        .to_string();
    let country_code = require(description, &COUNTRY_RE, Field::Country)?.to_string();
    let flight_duration = require(description, &DURATION_RE, Field::Duration)?.to_string();

    let speed = require(description, &SPEED_RE, Field::Speed)?;
    let average_speed = speed
        .trim()
        .parse::<f64>()
        .map_err(|e| invalid(Field::Speed, speed, e))?;

    let altitude = require(description, &ALTITUDE_RE, Field::Altitude)?;
    let altitude_max = altitude
        .trim()
        .parse::<i64>()
        .map_err(|e| invalid(Field::Altitude, altitude, e))?;

    Ok(FlightDetails {
        take_off,
        country_code,
        flight_duration,
        average_speed,
        altitude_max,
    })
}

fn capture<'t>(text: &'t str, re: &Regex) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn require<'t>(text: &'t str, re: &Regex, field: Field) -> Result<&'t str, ExtractError> {
    capture(text, re).ok_or(ExtractError::MissingField(field))
}

fn invalid(field: Field, value: &str, err: impl std::fmt::Display) -> ExtractError {
    ExtractError::InvalidNumber {
        field,
        value: value.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "Clarice Gomes ∷ 5.12.2021 ∷ ⛳ Governador Valadares - Ibituruna [BR] ∷ ⌛ 3:12 ∷ ø 38.6 km/h ∷ ⊺ 2210 m ∷ 123.45 km";

    #[test]
    fn extracts_all_fields() {
        let d = extract_details(FULL).unwrap();
        assert_eq!(d.take_off, "Governador Valadares - Ibituruna");
        assert_eq!(d.country_code, "BR");
        assert_eq!(d.flight_duration, "3:12");
        assert_eq!(d.average_speed, 38.6);
        assert_eq!(d.altitude_max, 2210);
    }

    #[test]
    fn extraction_is_repeatable() {
        assert_eq!(extract_details(FULL).unwrap(), extract_details(FULL).unwrap());
    }

    #[test]
    fn question_mark_takeoff_is_kept() {
        let text = "HENRYHOYOS ∷ ⛳ ? [CO] ∷ ⌛ 0:41 ∷ ø 12.0 km/h ∷ ⊺ 1650 m";
        let d = extract_details(text).unwrap();
        assert_eq!(d.take_off, "?");
        assert_eq!(d.country_code, "CO");
    }

    #[test]
    fn missing_takeoff_is_unknown() {
        let text = "Fayber ∷ [CO] ∷ ⌛ 1:05 ∷ ø 20.5 km/h ∷ ⊺ 2500 m";
        let d = extract_details(text).unwrap();
        assert_eq!(d.take_off, UNKNOWN_TAKEOFF);
        assert_eq!(d.country_code, "CO");
    }

    #[test]
    fn missing_country_aborts() {
        let text = "⛳ Somewhere ∷ ⌛ 1:05 ∷ ø 20.5 km/h ∷ ⊺ 2500 m";
        let err = extract_details(text).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField(Field::Country)));
    }

    #[test]
    fn first_missing_field_is_reported() {
        // duration and speed both absent, duration comes first
        let text = "⛳ Somewhere [CH] ∷ ⊺ 2500 m";
        let err = extract_details(text).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField(Field::Duration)));
    }

    #[test]
    fn unparseable_speed_aborts() {
        let text = "⛳ Somewhere [CH] ∷ ⌛ 1:05 ∷ ø fast km/h ∷ ⊺ 2500 m";
        let err = extract_details(text).unwrap_err();
        match err {
            ExtractError::InvalidNumber { field, value, .. } => {
                assert_eq!(field, Field::Speed);
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unparseable_altitude_aborts() {
        let text = "⛳ Somewhere [CH] ∷ ⌛ 1:05 ∷ ø 20.5 km/h ∷ ⊺ 2500.5 m";
        let err = extract_details(text).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::InvalidNumber {
                field: Field::Altitude,
                ..
            }
        ));
    }
}
