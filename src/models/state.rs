//! Acquisition state and outcomes.

use super::{CacheMetadata, CacheSource, SchemaDocument, format_age};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of a cache slot.
///
/// ```text
/// Uninitialized ──► Refreshing ──► Fresh
///       │               │
///       │               ├──► Stale
///       │               └──► Unavailable
///       └──► Fresh (cache hit)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
    /// No acquisition has run yet.
    #[default]
    Uninitialized,
    /// A validated document within its TTL is available.
    Fresh,
    /// Only an expired or bundled document is available.
    Stale,
    /// A remote fetch is in flight.
    Refreshing,
    /// No usable document exists.
    Unavailable,
}

impl SchemaState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Refreshing => "refreshing",
            Self::Unavailable => "unavailable",
        }
    }

    /// Stable numeric encoding for atomics.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Fresh => 1,
            Self::Stale => 2,
            Self::Refreshing => 3,
            Self::Unavailable => 4,
        }
    }

    /// Decodes [`Self::to_u8`]; unknown values map to `Uninitialized`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fresh,
            2 => Self::Stale,
            3 => Self::Refreshing,
            4 => Self::Unavailable,
            _ => Self::Uninitialized,
        }
    }
}

impl fmt::Display for SchemaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Non-fatal warning attached to a stale result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleWarning {
    /// When the returned document was obtained.
    pub fetched_at: DateTime<Utc>,
    /// Age of the document at the time of the call.
    pub age: Duration,
    /// Origin of the returned document.
    pub source: CacheSource,
    /// Why a fresh copy could not be obtained.
    pub cause: String,
}

impl StaleWarning {
    /// Builds a warning for `metadata` as seen at `now`.
    #[must_use]
    pub fn new(metadata: &CacheMetadata, now: DateTime<Utc>, cause: impl Into<String>) -> Self {
        Self {
            fetched_at: metadata.fetched_at,
            age: metadata.age(now),
            source: metadata.source,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for StaleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            CacheSource::Remote => write!(
                f,
                "schema may be outdated: using cached copy from {} ({} old); refresh failed: {}",
                self.fetched_at.to_rfc3339(),
                format_age(self.age),
                self.cause
            ),
            CacheSource::BundledFallback => write!(
                f,
                "schema may be outdated: using bundled fallback copy; refresh failed: {}",
                self.cause
            ),
        }
    }
}

/// Result of one `ensure_schema()` call.
#[derive(Debug, Clone)]
pub enum SchemaStatus {
    /// A validated document within its TTL.
    Fresh {
        /// The document.
        document: Arc<SchemaDocument>,
        /// Its metadata.
        metadata: CacheMetadata,
    },
    /// A previously validated document past its TTL.
    Stale {
        /// The document.
        document: Arc<SchemaDocument>,
        /// Its metadata.
        metadata: CacheMetadata,
        /// Why a fresh copy is not available.
        warning: StaleWarning,
    },
    /// No usable document exists.
    Unavailable {
        /// The last failure seen.
        reason: String,
    },
}

impl SchemaStatus {
    /// The slot state this result corresponds to.
    #[must_use]
    pub const fn state(&self) -> SchemaState {
        match self {
            Self::Fresh { .. } => SchemaState::Fresh,
            Self::Stale { .. } => SchemaState::Stale,
            Self::Unavailable { .. } => SchemaState::Unavailable,
        }
    }

    /// Returns the document, if any.
    #[must_use]
    pub const fn document(&self) -> Option<&Arc<SchemaDocument>> {
        match self {
            Self::Fresh { document, .. } | Self::Stale { document, .. } => Some(document),
            Self::Unavailable { .. } => None,
        }
    }

    /// Returns the metadata, if any.
    #[must_use]
    pub const fn metadata(&self) -> Option<&CacheMetadata> {
        match self {
            Self::Fresh { metadata, .. } | Self::Stale { metadata, .. } => Some(metadata),
            Self::Unavailable { .. } => None,
        }
    }

    /// Returns the stale warning, if any.
    #[must_use]
    pub const fn warning(&self) -> Option<&StaleWarning> {
        match self {
            Self::Stale { warning, .. } => Some(warning),
            _ => None,
        }
    }

    /// Returns true if a document is available.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }

    /// Converts into the document, or [`Error::SchemaUnavailable`].
    ///
    /// # Errors
    ///
    /// Returns an error if no document is available.
    pub fn into_document(self) -> Result<Arc<SchemaDocument>> {
        match self {
            Self::Fresh { document, .. } | Self::Stale { document, .. } => Ok(document),
            Self::Unavailable { reason } => Err(Error::SchemaUnavailable(reason)),
        }
    }
}

/// Outcome of a single fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The attempt produced a document.
    Success,
    /// Connect failure, 5xx, or a terminal HTTP status.
    NetworkError,
    /// The payload failed shape checks.
    ValidationError,
    /// The request exceeded its timeout.
    Timeout,
    /// The endpoint rejected the credentials.
    AuthError,
}

impl FetchOutcome {
    /// Returns the outcome as a string slice (used as a metrics label).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NetworkError => "network_error",
            Self::ValidationError => "validation_error",
            Self::Timeout => "timeout",
            Self::AuthError => "auth_error",
        }
    }
}

/// Record of one fetch attempt. Transient: logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    /// Attempt number, starting at 1.
    pub number: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// How it ended.
    pub outcome: FetchOutcome,
    /// Error text for failed attempts.
    pub error_detail: Option<String>,
}

impl FetchAttempt {
    /// A successful attempt.
    #[must_use]
    pub const fn succeeded(number: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            number,
            started_at,
            outcome: FetchOutcome::Success,
            error_detail: None,
        }
    }

    /// A failed attempt.
    #[must_use]
    pub fn failed(
        number: u32,
        started_at: DateTime<Utc>,
        outcome: FetchOutcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            number,
            started_at,
            outcome,
            error_detail: Some(detail.into()),
        }
    }

    /// Logs the attempt at a level matching its outcome.
    pub fn log(&self) {
        let detail = self.error_detail.as_deref().unwrap_or("");
        match self.outcome {
            FetchOutcome::Success => tracing::debug!(
                attempt = self.number,
                started_at = %self.started_at,
                "Schema fetch attempt succeeded"
            ),
            FetchOutcome::AuthError => tracing::error!(
                attempt = self.number,
                outcome = self.outcome.as_str(),
                error = detail,
                "Schema fetch rejected credentials"
            ),
            _ => tracing::warn!(
                attempt = self.number,
                outcome = self.outcome.as_str(),
                error = detail,
                "Schema fetch attempt failed"
            ),
        }
    }
}
