//! Error types for gvload-core

use thiserror::Error;

/// Main error type for the gvload-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid file discovery pattern
    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    /// A timestamp attribute could not be parsed
    #[error("unparseable date {input:?}: {message}")]
    DateParse { input: String, message: String },

    /// A duration did not match the `HH:MM:SS` layout
    #[error("unparseable duration {0:?}")]
    DurationParse(String),

    /// A record was structurally located but a required field is missing
    #[error("missing field in {kind} record: {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// Contact directory problem (duplicate numbers, refused overwrite)
    #[error("contacts error: {0}")]
    Contacts(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for gvload-core
pub type Result<T> = std::result::Result<T, Error>;
