//! # Schema Cache
//!
//! GraphQL schema acquisition and cache manager for API documentation
//! assistants.
//!
//! The crate obtains an authoritative schema document from a GraphQL endpoint
//! through introspection, validates it, keeps it in a local cache directory
//! with a time-to-live, and falls back to a stale copy when the endpoint is
//! unreachable.
//!
//! ## Features
//!
//! - Introspection fetch with bounded retry and jittered exponential backoff
//! - SDL rendering of the introspection result for text search
//! - Validation of SDL and introspection JSON before anything is cached
//! - Atomic cache writes (temp file + rename, metadata as commit point)
//! - Fallback order: fresh local, refreshed remote, stale local, bundled, unavailable
//! - Single-flight refresh so concurrent callers share one remote fetch
//!
//! ## Example
//!
//! ```rust,ignore
//! use schema_cache::{SchemaCacheConfig, SchemaManager};
//!
//! let config = SchemaCacheConfig::load_default();
//! let manager = SchemaManager::from_config(&config)?;
//! let schema = manager.get_schema_content()?;
//! println!("{} bytes", schema.size());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod fetch;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
pub mod validation;

// Re-exports for convenience
pub use config::{Credentials, SchemaCacheConfig};
pub use fetch::{
    FetchError, FetchErrorKind, RemoteFetcher, RetryPolicy, RetryingFetcher, SchemaFetcher,
    UnconfiguredFetcher,
};
pub use models::{
    CacheMetadata, CacheSource, FetchAttempt, FetchOutcome, SchemaDocument, SchemaFormat,
    SchemaState, SchemaStatus, StaleWarning,
};
pub use services::{
    CacheSlot, Clock, ManualClock, SchemaManager, SingleFlight, SlotReport, SystemClock,
};
pub use storage::{LocalStore, is_fresh};
pub use validation::{ValidationReport, validate};

/// Error type for schema cache operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed endpoint URL, zero timeout, bad config values |
/// | `Network` | Connect failures and timeouts against the GraphQL endpoint |
/// | `Auth` | The endpoint rejected the configured credentials |
/// | `Validation` | A schema document fails the shape checks |
/// | `Io` | The cache directory cannot be read or written |
/// | `SchemaUnavailable` | No usable schema exists by any path |
/// | `OperationFailed` | Serialization and config parsing failures |
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - The endpoint is not an absolute `http`/`https` URL
    /// - The request timeout is zero
    /// - A config value cannot be interpreted
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The remote endpoint could not be reached or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// The remote endpoint rejected the credentials.
    ///
    /// Never retried, and returned even when a stale copy could be served.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// A schema document failed validation.
    #[error("schema validation failed: {reason}")]
    Validation {
        /// Why the document was rejected.
        reason: String,
    },

    /// Filesystem access to the cache directory failed.
    #[error("i/o operation '{operation}' failed: {cause}")]
    Io {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// No usable schema could be produced.
    ///
    /// Callers decide whether to continue in reduced mode or halt.
    #[error("schema not available: {0}")]
    SchemaUnavailable(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::Io`] from an operation name and an I/O error.
    pub(crate) fn io(operation: &str, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.to_string(),
            cause: err.to_string(),
        }
    }
}

/// Result type alias for schema cache operations.
pub type Result<T> = std::result::Result<T, Error>;
