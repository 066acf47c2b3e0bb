//! Read-only data-quality report over the ingested tables.

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Check {
    All,
    Counts,
    Nulls,
    Dates,
    Sources,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NullCount {
    pub table: String,
    pub column: String,
    pub nulls: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub table: String,
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub counts: Vec<(String, i64)>,
    pub nulls: Vec<NullCount>,
    pub date_ranges: Vec<DateRange>,
    /// Climate rows per `data_source`.
    pub sources: Vec<(String, i64)>,
}

impl VerifyReport {
    // ---
    pub const COUNTED_TABLES: [&'static str; 4] =
        ["ecosystems", "species", "climate_data", "wildlife_data"];

    pub const NULL_CHECKED_COLUMNS: [(&'static str, &'static str); 4] = [
        ("climate_data", "value"),
        ("climate_data", "date_recorded"),
        ("wildlife_data", "population_count"),
        ("wildlife_data", "date_recorded"),
    ];

    /// Human-readable lines for the selected checks.
    pub fn render(&self, checks: &[Check]) -> Vec<String> {
        // ---
        let wants = |c: Check| checks.contains(&Check::All) || checks.contains(&c);
        let mut lines = Vec::new();

        if wants(Check::Counts) {
            for (table, count) in &self.counts {
                lines.push(format!("Table '{table}' has {count} records."));
            }
        }
        if wants(Check::Nulls) {
            for n in &self.nulls {
                lines.push(format!(
                    "Found {} NULL values in '{}.{}'.",
                    n.nulls, n.table, n.column
                ));
            }
        }
        if wants(Check::Dates) {
            for r in &self.date_ranges {
                let fmt = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
                lines.push(format!(
                    "Date range for '{}.date_recorded': {} to {}.",
                    r.table,
                    fmt(r.min),
                    fmt(r.max)
                ));
            }
        }
        if wants(Check::Sources) {
            lines.push("Source counts for 'climate_data':".to_string());
            for (source, count) in &self.sources {
                lines.push(format!("  - {source}: {count}"));
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn sample() -> VerifyReport {
        // ---
        VerifyReport {
            counts: vec![("climate_data".to_string(), 12)],
            nulls: vec![NullCount {
                table: "climate_data".to_string(),
                column: "value".to_string(),
                nulls: 0,
            }],
            date_ranges: vec![DateRange {
                table: "wildlife_data".to_string(),
                min: None,
                max: None,
            }],
            sources: vec![("NASA_GISS".to_string(), 12)],
        }
    }

    #[test]
    fn test_render_selected_checks_only() {
        // ---
        let lines = sample().render(&[Check::Counts]);
        assert_eq!(lines, vec!["Table 'climate_data' has 12 records."]);

        let lines = sample().render(&[Check::Sources, Check::Dates]);
        assert_eq!(
            lines,
            vec![
                "Date range for 'wildlife_data.date_recorded': - to -.",
                "Source counts for 'climate_data':",
                "  - NASA_GISS: 12",
            ]
        );
    }

    #[test]
    fn test_render_all() {
        // ---
        assert_eq!(sample().render(&[Check::All]).len(), 5);
    }
}
