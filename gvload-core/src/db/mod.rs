//! Database layer for gvload
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Record and contact inserts in single transactions

pub mod repo;
pub mod schema;

pub use repo::{Database, InsertSummary};
