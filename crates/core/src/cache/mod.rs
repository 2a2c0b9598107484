//! SQLite-backed persistent store for resolved icons.
//!
//! This module provides a session-spanning, origin-keyed icon store using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - One row per normalized origin key (upsert semantics)
//! - SHA-256 byte digests for no-op replacement detection
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! Rows are disposable: losing the store only costs re-fetching icons, so
//! callers treat write failures as non-fatal.

pub mod connection;
pub mod hash;
pub mod icons;
pub mod migrations;

pub use crate::Error;

pub use connection::IconDb;
pub use icons::IconRecord;
