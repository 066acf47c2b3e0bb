//! NASA GISS GISTEMP table parser.
//!
//! The table is a comma-separated, space-padded file. Preamble lines come
//! before a header row starting with `Year`; each following row carries a
//! year, twelve monthly anomalies in hundredths of a degree, then seasonal
//! and annual aggregates which are ignored.

use chrono::NaiveDate;

use super::{ParseStats, Parsed};
use crate::models::ClimateRecord;

pub const DATA_SOURCE: &str = "NASA_GISS";
pub const MEASUREMENT_TYPE: &str = "temperature_anomaly";
pub const UNIT: &str = "celsius";

/// Year column plus twelve months.
const MIN_COLUMNS: usize = 13;

const NO_DATA: [&str; 2] = ["***", "****"];

/// One global monthly anomaly, already converted to degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyAnomaly {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NasaParser;

impl NasaParser {
    // ---
    /// Parse the table and replicate every anomaly once per ecosystem.
    ///
    /// The source has no location, so the global value applies uniformly.
    pub fn parse(&self, csv_text: &str, ecosystem_ids: &[i32]) -> Parsed<ClimateRecord> {
        // ---
        let Parsed {
            records: anomalies,
            mut stats,
        } = self.parse_anomalies(csv_text);

        let records: Vec<ClimateRecord> = anomalies
            .iter()
            .flat_map(|a| {
                ecosystem_ids.iter().map(move |&eco| ClimateRecord {
                    ecosystem_id: Some(eco),
                    data_source: DATA_SOURCE.to_string(),
                    measurement_type: MEASUREMENT_TYPE.to_string(),
                    value: a.value,
                    unit: UNIT.to_string(),
                    date_recorded: a.date,
                    location_lat: None,
                    location_lon: None,
                })
            })
            .collect();

        stats.produced = records.len();
        Parsed { records, stats }
    }

    /// Parse the monthly anomalies without fan-out.
    pub fn parse_anomalies(&self, csv_text: &str) -> Parsed<MonthlyAnomaly> {
        // ---
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv_text.as_bytes());

        let mut stats = ParseStats::default();
        let mut records = Vec::new();
        let mut seen_header = false;

        for (line, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::debug!("NASA line {}: unreadable row: {}", line + 1, e);
                    if seen_header {
                        stats.invalid += 1;
                    }
                    continue;
                }
            };

            if !seen_header {
                seen_header = row.get(0).is_some_and(|c| c.starts_with("Year"));
                continue;
            }

            if row.len() < MIN_COLUMNS {
                stats.invalid += 1;
                continue;
            }

            let Ok(year) = row[0].parse::<i32>() else {
                tracing::debug!("NASA line {}: non-numeric year {:?}", line + 1, &row[0]);
                stats.invalid += 1;
                continue;
            };

            for month in 1..=12u32 {
                let cell = &row[month as usize];
                if NO_DATA.contains(&cell) {
                    stats.missing += 1;
                    continue;
                }

                let parsed = cell.parse::<f64>().ok().filter(|v| v.is_finite());
                let date = NaiveDate::from_ymd_opt(year, month, 1);
                match (parsed, date) {
                    (Some(raw), Some(date)) => records.push(MonthlyAnomaly {
                        date,
                        value: raw / 100.0,
                    }),
                    _ => {
                        tracing::warn!(
                            "NASA {}-{:02}: skipping non-numeric value {:?}",
                            year,
                            month,
                            cell
                        );
                        stats.invalid += 1;
                    }
                }
            }
        }

        if !seen_header {
            tracing::warn!("NASA table has no `Year` header row; nothing parsed");
        }

        stats.produced = records.len();
        Parsed { records, stats }
    }
}
