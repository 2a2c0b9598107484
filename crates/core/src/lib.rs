//! Core types and shared functionality for iconduit.
//!
//! This crate provides:
//! - Persistent icon cache with SQLite backend
//! - Blob arena for temporary in-memory byte handles
//! - Origin-key normalization
//! - Unified error types
//! - Configuration structures

pub mod blob;
pub mod cache;
pub mod config;
pub mod error;
pub mod origin;

pub use blob::BlobArena;
pub use cache::{IconDb, IconRecord};
pub use config::AppConfig;
pub use error::Error;
pub use origin::{OriginError, origin_key};
