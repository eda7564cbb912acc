//! Cache metadata sidecar.

use super::{SchemaDocument, SchemaFormat};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a cached document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    /// Fetched from the configured GraphQL endpoint.
    #[default]
    Remote,
    /// Seeded from a schema file shipped alongside the application.
    #[serde(alias = "bundled")]
    BundledFallback,
}

impl CacheSource {
    /// Returns the source as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::BundledFallback => "bundled_fallback",
        }
    }
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata stored next to a cached schema document.
///
/// One record per cache slot, overwritten on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the document was obtained.
    pub fetched_at: DateTime<Utc>,
    /// Origin of the document.
    pub source: CacheSource,
    /// TTL in effect when the document was written.
    pub ttl_hours: u64,
    /// Whether the document passed validation at write time.
    pub is_valid: bool,
    /// SHA-256 of the document bytes, hex encoded.
    pub checksum: String,
    /// Document size in bytes.
    pub size_bytes: u64,
    /// Document encoding.
    #[serde(default)]
    pub format: SchemaFormat,
    /// Endpoint the document was fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl CacheMetadata {
    /// Builds metadata describing `document`.
    ///
    /// `is_valid` starts out false; the manager flips it only after the
    /// validator accepted the document.
    #[must_use]
    pub fn for_document(
        document: &SchemaDocument,
        source: CacheSource,
        ttl_hours: u64,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fetched_at,
            source,
            ttl_hours,
            is_valid: false,
            checksum: document.checksum(),
            size_bytes: u64::try_from(document.size()).unwrap_or(u64::MAX),
            format: document.format(),
            endpoint: None,
        }
    }

    /// Marks the document as validated.
    #[must_use]
    pub const fn validated(mut self) -> Self {
        self.is_valid = true;
        self
    }

    /// Records the endpoint the document came from.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Age of the entry at `now`, clamped to zero for future timestamps.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        let age = now.signed_duration_since(self.fetched_at);
        if age < Duration::zero() {
            Duration::zero()
        } else {
            age
        }
    }

    /// Name of the document file this record points at.
    ///
    /// Content addressed, so a new document never overwrites the file the
    /// committed metadata still references.
    #[must_use]
    pub fn document_file_name(&self) -> String {
        let prefix: String = self.checksum.chars().take(16).collect();
        format!("schema-{prefix}.{}", self.format.extension())
    }

    /// Returns true if `document` matches the recorded checksum and size.
    #[must_use]
    pub fn matches(&self, document: &SchemaDocument) -> bool {
        u64::try_from(document.size()).is_ok_and(|size| size == self.size_bytes)
            && document.checksum() == self.checksum
    }
}

/// Formats a duration as a short human-readable age (`3h 12m`).
#[must_use]
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes().max(0);
    let hours = minutes / 60;
    let days = hours / 24;
    if days > 0 {
        format!("{days}d {}h", hours % 24)
    } else if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else {
        format!("{minutes}m")
    }
}
