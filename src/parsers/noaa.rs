//! NOAA CDO (GHCN-Daily) observation parser.

use serde::Deserialize;

use super::{parse_date_prefix, ParseStats, Parsed};
use crate::models::ClimateRecord;

pub const DATA_SOURCE_PREFIX: &str = "NOAA_GHCND";
pub const UNKNOWN_UNIT: &str = "unknown";

/// Ordered datatype → physical unit table.
///
/// The order is also the order of the `datatypeid` query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitMap {
    entries: Vec<(String, String)>,
}

impl UnitMap {
    // ---
    pub fn new<K: Into<String>, V: Into<String>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Unit for a datatype; unmapped datatypes are `"unknown"`, never an error.
    pub fn unit_for(&self, datatype: &str) -> &str {
        self.entries
            .iter()
            .find(|(k, _)| k == datatype)
            .map(|(_, v)| v.as_str())
            .unwrap_or(UNKNOWN_UNIT)
    }

    pub fn datatypes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Default for UnitMap {
    /// Metric units as returned with `units=metric`.
    fn default() -> Self {
        Self::new([
            ("TAVG", "celsius"),
            ("TMAX", "celsius"),
            ("TMIN", "celsius"),
            ("PRCP", "mm"),
        ])
    }
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    datatype: String,
    value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct NoaaParser {
    units: UnitMap,
}

impl NoaaParser {
    // ---
    pub fn new(units: UnitMap) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &UnitMap {
        &self.units
    }

    /// Convert one station's observations. The ecosystem is resolved per
    /// station by the caller, not per row.
    pub fn parse(
        &self,
        station_id: &str,
        ecosystem_id: i32,
        results: &[serde_json::Value],
    ) -> Parsed<ClimateRecord> {
        // ---
        let data_source = format!("{DATA_SOURCE_PREFIX}:{station_id}");
        let mut stats = ParseStats::default();
        let mut records = Vec::with_capacity(results.len());

        for item in results {
            let obs = match serde_json::from_value::<Observation>(item.clone()) {
                Ok(obs) => obs,
                Err(e) => {
                    tracing::debug!("NOAA {}: skipping malformed observation: {}", station_id, e);
                    stats.invalid += 1;
                    continue;
                }
            };

            let Some(date) = parse_date_prefix(&obs.date) else {
                tracing::debug!("NOAA {}: skipping bad date {:?}", station_id, obs.date);
                stats.invalid += 1;
                continue;
            };

            records.push(ClimateRecord {
                ecosystem_id: Some(ecosystem_id),
                data_source: data_source.clone(),
                unit: self.units.unit_for(&obs.datatype).to_string(),
                measurement_type: obs.datatype,
                value: obs.value,
                date_recorded: date,
                location_lat: None,
                location_lon: None,
            });
        }

        stats.produced = records.len();
        Parsed { records, stats }
    }
}
