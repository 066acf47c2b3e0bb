//! Data models for the ingestion pipeline.
//!
//! Parsers produce typed records; the loader only sees a [`RowSet`], a
//! column-named tabular form that can be checked against a target table
//! before anything is inserted.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{IngestError, Result};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EcosystemKind {
    Aquatic,
    Terrestrial,
}

impl EcosystemKind {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            EcosystemKind::Aquatic => "aquatic",
            EcosystemKind::Terrestrial => "terrestrial",
        }
    }
}

/// Reference ecosystem. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Ecosystem {
    // ---
    pub id: i32,
    pub name: String,
    pub kind: EcosystemKind,
    pub subtype: Option<String>,
    pub description: Option<String>,
}

/// Species row as created by the resolver: only the scientific name is set.
#[derive(Debug, Clone, Serialize)]
pub struct Species {
    // ---
    pub id: i32,
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub conservation_status: Option<String>,
}

/// One normalized `climate_data` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateRecord {
    // ---
    pub ecosystem_id: Option<i32>,
    pub data_source: String,
    pub measurement_type: String,
    pub value: f64,
    pub unit: String,
    pub date_recorded: NaiveDate,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
}

/// One normalized `wildlife_data` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WildlifeRecord {
    // ---
    pub species_id: i32,
    pub ecosystem_id: i32,
    pub population_count: i32,
    pub date_recorded: NaiveDate,
    pub location_lat: f64,
    pub location_lon: f64,
}

// ---

/// A single typed cell. Nulls keep their type so PostgreSQL binds them cleanly.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(Option<i32>),
    Float(Option<f64>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
}

impl Value {
    // ---
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Value::Int(None) | Value::Float(None) | Value::Text(None) | Value::Date(None)
        )
    }
}

/// Records that know their column layout.
pub trait Record {
    const COLUMNS: &'static [&'static str];

    fn into_values(self) -> Vec<Value>;
}

impl Record for ClimateRecord {
    // ---
    const COLUMNS: &'static [&'static str] = &[
        "ecosystem_id",
        "data_source",
        "measurement_type",
        "value",
        "unit",
        "date_recorded",
        "location_lat",
        "location_lon",
    ];

    fn into_values(self) -> Vec<Value> {
        vec![
            Value::Int(self.ecosystem_id),
            Value::Text(Some(self.data_source)),
            Value::Text(Some(self.measurement_type)),
            Value::Float(Some(self.value)),
            Value::Text(Some(self.unit)),
            Value::Date(Some(self.date_recorded)),
            Value::Float(self.location_lat),
            Value::Float(self.location_lon),
        ]
    }
}

impl Record for WildlifeRecord {
    // ---
    const COLUMNS: &'static [&'static str] = &[
        "species_id",
        "ecosystem_id",
        "population_count",
        "date_recorded",
        "location_lat",
        "location_lon",
    ];

    fn into_values(self) -> Vec<Value> {
        vec![
            Value::Int(Some(self.species_id)),
            Value::Int(Some(self.ecosystem_id)),
            Value::Int(Some(self.population_count)),
            Value::Date(Some(self.date_recorded)),
            Value::Float(Some(self.location_lat)),
            Value::Float(Some(self.location_lon)),
        ]
    }
}

/// Column-named rows ready for the bulk loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    // ---
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_records<R: Record>(records: impl IntoIterator<Item = R>) -> Self {
        // ---
        let mut set = Self::new(R::COLUMNS.iter().copied());
        set.rows = records.into_iter().map(Record::into_values).collect();
        set
    }

    /// Append a row; its width must match the column list.
    pub fn push(&mut self, row: Vec<Value>) -> Result<()> {
        // ---
        if row.len() != self.columns.len() {
            return Err(IngestError::Parse(format!(
                "row has {} values but the row set has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `index`, if both exist.
    pub fn get(&self, index: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index).and_then(|row| row.get(col))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn sample_climate(ecosystem_id: Option<i32>) -> ClimateRecord {
        // ---
        ClimateRecord {
            ecosystem_id,
            data_source: "NASA_GISS".to_string(),
            measurement_type: "temperature_anomaly".to_string(),
            value: -0.18,
            unit: "celsius".to_string(),
            date_recorded: NaiveDate::from_ymd_opt(1880, 1, 1).unwrap(),
            location_lat: None,
            location_lon: None,
        }
    }

    #[test]
    fn test_row_set_from_records_keeps_column_order() {
        // ---
        let set = RowSet::from_records(vec![sample_climate(Some(3)), sample_climate(None)]);

        assert_eq!(set.columns().len(), ClimateRecord::COLUMNS.len());
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0, "ecosystem_id"), Some(&Value::Int(Some(3))));
        assert_eq!(set.get(1, "ecosystem_id"), Some(&Value::Int(None)));
        assert_eq!(set.get(0, "value"), Some(&Value::Float(Some(-0.18))));
        assert!(set.get(0, "station").is_none());
    }

    #[test]
    fn test_reference_rows_serialize_for_reports() {
        // ---
        let ecosystem = Ecosystem {
            id: 3,
            name: "Arctic Terrestrial Systems".to_string(),
            kind: EcosystemKind::Terrestrial,
            subtype: None,
            description: None,
        };
        let json = serde_json::to_value(&ecosystem).unwrap();
        assert_eq!(json["kind"], "terrestrial");

        let species = Species {
            id: 1,
            scientific_name: "Ursus maritimus".to_string(),
            common_name: None,
            conservation_status: None,
        };
        let json = serde_json::to_value(&species).unwrap();
        assert_eq!(json["scientific_name"], "Ursus maritimus");
        assert!(json["common_name"].is_null());
    }

    #[test]
    fn test_push_rejects_ragged_rows() {
        // ---
        let mut set = RowSet::new(["a", "b"]);
        assert!(set.push(vec![Value::Int(Some(1))]).is_err());
        assert!(set
            .push(vec![Value::Int(Some(1)), Value::Text(None)])
            .is_ok());
        assert_eq!(set.len(), 1);
        assert!(set.rows()[0][1].is_null());
    }

    #[test]
    fn test_ecosystem_kind_serializes_lowercase() {
        // ---
        let json = serde_json::to_string(&EcosystemKind::Terrestrial).unwrap();
        assert_eq!(json, "\"terrestrial\"");
        assert_eq!(EcosystemKind::Aquatic.as_str(), "aquatic");
    }
}
