//! Provider payload parsers.
//!
//! Parsers are pure: raw payload in, normalized records plus skip counts out.
//! Row- and cell-level problems are absorbed here and only surface as
//! [`ParseStats`].

use chrono::NaiveDate;

pub mod gbif;
pub mod nasa;
pub mod noaa;

pub use gbif::GbifParser;
pub use nasa::NasaParser;
pub use noaa::{NoaaParser, UnitMap};

// ---

/// Per-parse counters, logged once per parse instead of once per row.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    /// Records produced (after any fan-out).
    pub produced: usize,

    /// Cells or rows with no value: an explicit "no data" marker, or a
    /// required field that is absent or null.
    pub missing: usize,

    /// Rows or cells dropped because they could not be converted.
    pub invalid: usize,

    /// Rows dropped because no known ecosystem matched.
    pub unclassified: usize,
}

impl ParseStats {
    // ---
    pub fn dropped(&self) -> usize {
        self.missing + self.invalid + self.unclassified
    }

    pub fn log_summary(&self, label: &str) {
        if self.dropped() > 0 {
            tracing::info!(
                "{}: produced {} rows, skipped {} (missing {}, invalid {}, unclassified {})",
                label,
                self.produced,
                self.dropped(),
                self.missing,
                self.invalid,
                self.unclassified
            );
        } else {
            tracing::debug!("{}: produced {} rows", label, self.produced);
        }
    }
}

/// Records produced by a parser together with its counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<R> {
    pub records: Vec<R>,
    pub stats: ParseStats,
}

/// Date portion of an ISO timestamp (`2021-06-01T10:00:00` → 2021-06-01).
pub(crate) fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let date = raw.trim().split('T').next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
