use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a flight record was harvested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Archive,
    Rss,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Archive => "archive",
            Provenance::Rss => "rss",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the archive listing or one feed item, before enrichment.
///
/// Fields the source did not provide stay at their zero value; an entry with an
/// empty `link` cannot be enriched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingEntry {
    pub full_name: String,
    /// Epoch millis, midnight UTC of the flight day.
    pub flight_date: i64,
    pub distance: f64,
    pub flight_type: String,
    pub link: String,
}

impl ListingEntry {
    pub fn identity(&self) -> Identity<'_> {
        Identity {
            full_name: &self.full_name,
            distance: self.distance,
            flight_date: self.flight_date,
        }
    }
}

/// The (full name, distance, flight date) triple two copies of a flight share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Identity<'a> {
    pub full_name: &'a str,
    pub distance: f64,
    pub flight_date: i64,
}

/// Attributes recovered from the detail page description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightDetails {
    pub take_off: String,
    pub country_code: String,
    pub flight_duration: String,
    pub average_speed: f64,
    pub altitude_max: i64,
}

/// Document written to the flight index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub full_name: String,
    pub flight_date: i64,
    pub distance: f64,
    pub flight_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<i64>,
    pub url: String,
    pub take_off: String,
    pub country_code: String,
    pub average_speed: f64,
    pub flight_duration: String,
    pub altitude_max: i64,
    pub parsing_source: Provenance,
}

impl FlightRecord {
    /// Merge listing-derived fields with the detail page attributes.
    pub fn assemble(
        entry: &ListingEntry,
        details: FlightDetails,
        provenance: Provenance,
        publication_date: Option<i64>,
    ) -> Self {
        FlightRecord {
            full_name: entry.full_name.clone(),
            flight_date: entry.flight_date,
            distance: entry.distance,
            flight_type: entry.flight_type.clone(),
            publication_date,
            url: entry.link.clone(),
            take_off: details.take_off,
            country_code: details.country_code,
            average_speed: details.average_speed,
            flight_duration: details.flight_duration,
            altitude_max: details.altitude_max,
            parsing_source: provenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_index_field_names() {
        let entry = ListingEntry {
            full_name: "Clarice Gomes".into(),
            flight_date: 1_638_662_400_000,
            distance: 123.45,
            flight_type: "free_flight".into(),
            link: "https://www.xcontest.org/world/en/flights/detail:Claricegomes/5.12.2021/14:23"
                .into(),
        };
        let details = FlightDetails {
            take_off: "Ibituruna".into(),
            country_code: "BR".into(),
            flight_duration: "3:12".into(),
            average_speed: 38.6,
            altitude_max: 2210,
        };
        let record = FlightRecord::assemble(&entry, details, Provenance::Archive, None);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["full_name"], "Clarice Gomes");
        assert_eq!(json["take_off"], "Ibituruna");
        assert_eq!(json["parsing_source"], "archive");
        assert_eq!(json["altitude_max"], 2210);
        assert!(json.get("publication_date").is_none());
        assert_eq!(json["distance"], 123.45);
    }
}
