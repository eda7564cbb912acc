//! Data models for the schema cache.
//!
//! This module contains the core data structures shared by the fetcher,
//! the local store and the schema manager.

mod document;
mod metadata;
mod state;

pub use document::{SchemaDocument, SchemaFormat, checksum_bytes};
pub use metadata::{CacheMetadata, CacheSource, format_age};
pub use state::{FetchAttempt, FetchOutcome, SchemaState, SchemaStatus, StaleWarning};
