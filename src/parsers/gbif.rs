//! GBIF occurrence parser.
//!
//! An occurrence is kept only when it has an event date, both coordinates,
//! and falls inside a bounding box whose ecosystem actually exists.

use std::collections::HashSet;

use serde_json::Value;

use super::{parse_date_prefix, ParseStats, Parsed};
use crate::classify::EcosystemClassifier;
use crate::models::WildlifeRecord;

#[derive(Debug, Clone, Default)]
pub struct GbifParser {
    classifier: EcosystemClassifier,
}

impl GbifParser {
    // ---
    pub fn new(classifier: EcosystemClassifier) -> Self {
        Self { classifier }
    }

    pub fn parse(
        &self,
        species_id: i32,
        occurrences: &[Value],
        known_ecosystems: &HashSet<i32>,
    ) -> Parsed<WildlifeRecord> {
        // ---
        let mut stats = ParseStats::default();
        let mut records = Vec::new();

        for occ in occurrences {
            let event_date = occ.get("eventDate").and_then(Value::as_str);
            let lat = occ.get("decimalLatitude").and_then(Value::as_f64);
            let lon = occ.get("decimalLongitude").and_then(Value::as_f64);

            let (Some(event_date), Some(lat), Some(lon)) = (event_date, lat, lon) else {
                stats.missing += 1;
                continue;
            };

            let Some(ecosystem_id) = self
                .classifier
                .classify(lat, lon)
                .filter(|id| known_ecosystems.contains(id))
            else {
                tracing::debug!("GBIF occurrence at ({}, {}) is unclassified", lat, lon);
                stats.unclassified += 1;
                continue;
            };

            let Some(date) = parse_date_prefix(event_date) else {
                tracing::debug!(
                    "Skipping occurrence for species {} with unparseable date {:?}",
                    species_id,
                    event_date
                );
                stats.invalid += 1;
                continue;
            };

            records.push(WildlifeRecord {
                species_id,
                ecosystem_id,
                population_count: population_count(occ.get("individualCount")),
                date_recorded: date,
                location_lat: lat,
                location_lon: lon,
            });
        }

        stats.produced = records.len();
        Parsed { records, stats }
    }
}

/// An occurrence implies at least one individual.
fn population_count(raw: Option<&Value>) -> i32 {
    // ---
    let count = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match count {
        Some(n) if n.is_finite() && n >= 1.0 => n.min(f64::from(i32::MAX)) as i32,
        _ => 1,
    }
}
