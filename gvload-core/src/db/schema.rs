//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//! Tables are created with `IF NOT EXISTS` so a database laid out by an
//! older loader (user_version 0, tables present) migrates cleanly.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: record and contact tables
    r#"
    CREATE TABLE IF NOT EXISTS texts (
        time      DATETIME,
        number    TEXT,
        message   TEXT,
        texttype  TEXT
    );

    CREATE TABLE IF NOT EXISTS audio (
        time        DATETIME,
        number      TEXT,
        duration    INTEGER,
        type        TEXT,
        text        TEXT,
        confidence  REAL,
        filename    TEXT
    );

    CREATE TABLE IF NOT EXISTS calls (
        time      DATETIME,
        number    TEXT,
        duration  INTEGER,
        calltype  TEXT
    );

    CREATE TABLE IF NOT EXISTS contacts (
        name    TEXT,
        number  TEXT UNIQUE,
        notes   TEXT
    );
    "#,
    // Version 2: lookup indexes
    r#"
    CREATE INDEX IF NOT EXISTS idx_texts_number ON texts(number, time);
    CREATE INDEX IF NOT EXISTS idx_audio_number ON audio(number, time);
    CREATE INDEX IF NOT EXISTS idx_calls_number ON calls(number, time);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
