//! # gvload-core
//!
//! Core library for gvload - a loader for Google Voice exports.
//!
//! This library provides:
//! - Domain types for calls, voicemails, recordings and text messages
//! - Record extraction from exported pages
//! - Contact reconciliation across a whole export
//! - Database storage layer with SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Pipeline
//!
//! Every batch runs the same four steps, strictly in order:
//! - **Extract:** classify each page into a conversation, call or audio document
//! - **Flatten:** explode conversations into one record per message
//! - **Reconcile:** build name↔number maps and back-fill missing contact fields
//! - **Persist:** write records and contacts to SQLite and a contacts CSV
//!
//! ## Example
//!
//! ```rust,no_run
//! use gvload_core::{reconcile, Config, Database, Ingestor};
//!
//! let config = Config::load().expect("failed to load config");
//! let my_numbers = config.account.normalized_numbers();
//!
//! let ingest = Ingestor::new("Takeout/Voice/Calls", my_numbers.clone())
//!     .ingest_all()
//!     .expect("failed to read export");
//! let mut records = ingest.into_records();
//! let outcome = reconcile(&mut records, None, &my_numbers);
//!
//! let db = Database::open(&config.resolved_database()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! db.insert_records(&records).expect("failed to insert records");
//! db.insert_contacts(&outcome.index.contact_rows(None))
//!     .expect("failed to insert contacts");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use contacts::{ContactDirectory, ContactRow};
pub use db::{Database, InsertSummary};
pub use error::{Error, Result};
pub use ingest::{IngestResult, Ingestor};
pub use reconcile::{reconcile, ContactIndex, Reconciliation};
pub use types::*;

// Public modules
pub mod config;
pub mod contacts;
pub mod db;
pub mod error;
pub mod extract;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod reconcile;
pub mod types;
