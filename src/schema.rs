//! Database schema management for `climate-wildlife-ingest`.
//!
//! Ensures the reference and observation tables exist before any ingester
//! runs, seeds the reference ecosystems the default lookup tables point at,
//! and describes the column sets the bulk loader validates against.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::{Ecosystem, EcosystemKind};

// ---

/// Name and full column set of an insert target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl TableSchema {
    // ---
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

pub const CLIMATE_DATA: TableSchema = TableSchema {
    name: "climate_data",
    columns: &[
        "id",
        "ecosystem_id",
        "data_source",
        "measurement_type",
        "value",
        "unit",
        "date_recorded",
        "location_lat",
        "location_lon",
    ],
};

pub const WILDLIFE_DATA: TableSchema = TableSchema {
    name: "wildlife_data",
    columns: &[
        "id",
        "species_id",
        "ecosystem_id",
        "population_count",
        "habitat_quality_score",
        "migration_pattern",
        "date_recorded",
        "location_lat",
        "location_lon",
    ],
};

/// Reference ecosystems referenced by the default bounding boxes and station map.
pub fn default_ecosystems() -> Vec<Ecosystem> {
    // ---
    vec![
        Ecosystem {
            id: 3,
            name: "Arctic Terrestrial Systems".to_string(),
            kind: EcosystemKind::Terrestrial,
            subtype: Some("tundra".to_string()),
            description: Some("Tundra, permafrost, and cold-adapted ecosystems".to_string()),
        },
        Ecosystem {
            id: 5,
            name: "Temperate Ecosystem Complexes".to_string(),
            kind: EcosystemKind::Terrestrial,
            subtype: Some("temperate".to_string()),
            description: None,
        },
        Ecosystem {
            id: 6,
            name: "Arid and Semi-Arid Systems".to_string(),
            kind: EcosystemKind::Terrestrial,
            subtype: Some("desert".to_string()),
            description: None,
        },
    ]
}

/// Create the database schema (idempotent).
///
/// Creates `ecosystems`, `species`, `climate_data` and `wildlife_data`.
/// Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ecosystems (
            id          SERIAL PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            type        TEXT NOT NULL CHECK (type IN ('aquatic', 'terrestrial')),
            subtype     TEXT,
            description TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS species (
            id                     SERIAL PRIMARY KEY,
            scientific_name        TEXT NOT NULL,
            common_name            TEXT,
            conservation_status    TEXT,
            ecosystem_dependencies JSONB,
            climate_sensitivity    DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS climate_data (
            id               SERIAL PRIMARY KEY,
            ecosystem_id     INTEGER REFERENCES ecosystems (id),
            data_source      TEXT,
            measurement_type TEXT,
            value            DOUBLE PRECISION,
            unit             TEXT,
            date_recorded    DATE,
            location_lat     DOUBLE PRECISION,
            location_lon     DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wildlife_data (
            id                    SERIAL PRIMARY KEY,
            species_id            INTEGER REFERENCES species (id),
            ecosystem_id          INTEGER REFERENCES ecosystems (id),
            population_count      INTEGER,
            habitat_quality_score DOUBLE PRECISION,
            migration_pattern     JSONB,
            date_recorded         DATE,
            location_lat          DOUBLE PRECISION,
            location_lon          DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Species are resolved by exact scientific name
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS ix_species_scientific_name
            ON species (scientific_name);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS ix_climate_data_source
            ON climate_data (data_source);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS ix_wildlife_data_species_id
            ON wildlife_data (species_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Insert the reference ecosystems, leaving existing rows untouched.
pub async fn seed_ecosystems(pool: &PgPool, ecosystems: &[Ecosystem]) -> Result<u64> {
    // ---
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for eco in ecosystems {
        let result = sqlx::query(
            r#"
            INSERT INTO ecosystems (id, name, type, subtype, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(eco.id)
        .bind(&eco.name)
        .bind(eco.kind.as_str())
        .bind(&eco.subtype)
        .bind(&eco.description)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    // Explicit ids bypass the sequence; move it past them
    sqlx::query(
        r#"
        SELECT setval(
            pg_get_serial_sequence('ecosystems', 'id'),
            GREATEST((SELECT COALESCE(MAX(id), 0) FROM ecosystems), 1)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if inserted > 0 {
        tracing::info!("Seeded {} reference ecosystems", inserted);
    }
    Ok(inserted)
}
