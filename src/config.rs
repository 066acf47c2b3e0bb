//! Configuration loader for the `climate-wildlife-ingest` pipeline.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Lookup tables are not configured here; they are
//! plain data handed to the classifier and parsers at construction.
//!
use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};

use crate::error::IngestError;

pub const DEFAULT_NASA_GISTEMP_URL: &str =
    "https://data.giss.nasa.gov/gistemp/tabledata_v4/GLB.Ts+dSST.csv";
pub const DEFAULT_NOAA_API_URL: &str = "https://www.ncei.noaa.gov/cdo-web/api/v2";
pub const DEFAULT_GBIF_API_URL: &str = "https://api.gbif.org/v1";

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// NOAA CDO token. Only the NOAA ingester needs it.
    pub noaa_api_key: Option<String>,

    pub nasa_gistemp_url: String,
    pub noaa_api_url: String,
    pub gbif_api_url: String,

    /// Where downloaded raw files are archived.
    pub raw_data_dir: PathBuf,

    /// Fixed pause between paginated requests and loop iterations.
    pub request_delay: Duration,

    pub http_timeout: Duration,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `NOAA_API_KEY` – NOAA CDO token (required only when running NOAA)
/// - `NASA_GISTEMP_URL`, `NOAA_API_URL`, `GBIF_API_URL` – upstream endpoints
/// - `RAW_DATA_DIR` – raw download archive (default: `data/raw`)
/// - `REQUEST_DELAY_MS` – inter-request delay (default: 200)
/// - `HTTP_TIMEOUT_SECS` – per-request timeout (default: 60)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = u32::try_from(parse_env_u64!("DB_POOL_MAX", 5))
        .map_err(|e| anyhow!("Invalid DB_POOL_MAX: {}", e))?;
    let noaa_api_key = env::var("NOAA_API_KEY").ok().filter(|k| !k.trim().is_empty());
    let request_delay = Duration::from_millis(parse_env_u64!("REQUEST_DELAY_MS", 200));
    let http_timeout = Duration::from_secs(parse_env_u64!("HTTP_TIMEOUT_SECS", 60));

    Ok(Config {
        db_url,
        db_pool_max,
        noaa_api_key,
        nasa_gistemp_url: env_or!("NASA_GISTEMP_URL", DEFAULT_NASA_GISTEMP_URL),
        noaa_api_url: env_or!("NOAA_API_URL", DEFAULT_NOAA_API_URL),
        gbif_api_url: env_or!("GBIF_API_URL", DEFAULT_GBIF_API_URL),
        raw_data_dir: PathBuf::from(env_or!("RAW_DATA_DIR", "data/raw")),
        request_delay,
        http_timeout,
    })
}

impl Config {
    // ---
    /// The NOAA token, or a configuration error if it was never supplied.
    pub fn require_noaa_api_key(&self) -> std::result::Result<&str, IngestError> {
        self.noaa_api_key.as_deref().ok_or_else(|| {
            IngestError::Configuration("NOAA_API_KEY is not set in the environment".to_string())
        })
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password and the NOAA token.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL      : {}", mask_db_url(&self.db_url));
        tracing::info!("  DB_POOL_MAX       : {}", self.db_pool_max);
        tracing::info!(
            "  NOAA_API_KEY      : {}",
            if self.noaa_api_key.is_some() { "****" } else { "<unset>" }
        );
        tracing::info!("  NASA_GISTEMP_URL  : {}", self.nasa_gistemp_url);
        tracing::info!("  NOAA_API_URL      : {}", self.noaa_api_url);
        tracing::info!("  GBIF_API_URL      : {}", self.gbif_api_url);
        tracing::info!("  RAW_DATA_DIR      : {}", self.raw_data_dir.display());
        tracing::info!("  REQUEST_DELAY_MS  : {}", self.request_delay.as_millis());
        tracing::info!("  HTTP_TIMEOUT_SECS : {}", self.http_timeout.as_secs());
    }
}

/// Replace the password in a connection string with `****`.
fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // A colon belonging to the scheme ("postgres://user@host") is not a password
            if !db_url[colon_pos..].starts_with("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}
