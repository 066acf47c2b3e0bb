//! Error taxonomy for the ingestion pipeline.
//!
//! Row- and cell-level problems never become an [`IngestError`]; parsers
//! absorb them and report counts through `ParseStats`. Everything in this
//! module is fatal to the run that raised it and causes a rollback.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Network or HTTP failure while talking to an upstream provider.
#[derive(Debug, Clone, Error)]
#[error("fetch {url} failed{}: {message}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
pub struct FetchError {
    // ---
    pub url: String,

    /// HTTP status, absent for transport-level failures.
    pub status: Option<u16>,

    pub message: String,
}

impl FetchError {
    // ---
    pub fn transport(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self {
            url: url.into(),
            status: None,
            message: err.to_string(),
        }
    }

    pub fn status(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    // ---
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("columns {columns:?} are not part of table `{table}`")]
    SchemaMismatch { table: String, columns: Vec<String> },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    // ---
    /// Map a sqlx error, surfacing unique-index violations as [`IngestError::Constraint`].
    pub fn from_db(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Constraint(db_err.message().to_string());
            }
        }
        Self::Database(err)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn fetch_error_display_includes_status_when_present() {
        // ---
        let err = FetchError::status("https://example.test/data", 503, "Service Unavailable");
        assert_eq!(
            err.to_string(),
            "fetch https://example.test/data failed with status 503: Service Unavailable"
        );

        let err = FetchError::transport("https://example.test/data", "connection refused");
        assert_eq!(
            err.to_string(),
            "fetch https://example.test/data failed: connection refused"
        );
    }

    #[test]
    fn schema_mismatch_names_offending_columns() {
        // ---
        let err = IngestError::SchemaMismatch {
            table: "climate_data".to_string(),
            columns: vec!["station".to_string()],
        };
        assert!(err.to_string().contains("station"));
        assert!(err.to_string().contains("climate_data"));
    }
}
