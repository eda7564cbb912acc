//! Remote schema acquisition.
//!
//! A [`SchemaFetcher`] produces a [`SchemaDocument`] from some origin. The
//! production implementation is [`RemoteFetcher`], which issues a single
//! introspection request; [`RetryingFetcher`] wraps any fetcher with bounded
//! retry and jittered exponential backoff.

pub mod introspection;
mod remote;
mod retry;

pub use remote::RemoteFetcher;
pub use retry::{RetryPolicy, RetryingFetcher};

use crate::models::{FetchOutcome, SchemaDocument};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Trait for schema origins.
pub trait SchemaFetcher: Send + Sync {
    /// Short name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    /// Endpoint the fetcher talks to, if it has one.
    fn endpoint(&self) -> Option<&str> {
        None
    }

    /// Fetches one schema document.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why no document was produced.
    fn fetch(&self) -> Result<SchemaDocument, FetchError>;
}

impl<F: SchemaFetcher + ?Sized> SchemaFetcher for Arc<F> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn endpoint(&self) -> Option<&str> {
        (**self).endpoint()
    }

    fn fetch(&self) -> Result<SchemaDocument, FetchError> {
        (**self).fetch()
    }
}

impl<F: SchemaFetcher + ?Sized> SchemaFetcher for Box<F> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn endpoint(&self) -> Option<&str> {
        (**self).endpoint()
    }

    fn fetch(&self) -> Result<SchemaDocument, FetchError> {
        (**self).fetch()
    }
}

/// Fetcher used when no endpoint is configured.
///
/// Every fetch fails, so the manager serves whatever is cached or bundled.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredFetcher;

impl SchemaFetcher for UnconfiguredFetcher {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    fn fetch(&self) -> Result<SchemaDocument, FetchError> {
        Err(FetchError::network("no GraphQL endpoint configured"))
    }
}

/// Category of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Connect failure or non-success HTTP status.
    Network,
    /// The request exceeded its timeout.
    Timeout,
    /// The endpoint rejected the credentials (401/403).
    Auth,
    /// The payload was not a usable introspection result.
    Malformed,
}

impl FetchErrorKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by a [`SchemaFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    /// Failure category.
    pub kind: FetchErrorKind,
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
    /// Human-readable detail.
    pub detail: String,
}

impl FetchError {
    /// Connect-level failure with no HTTP status.
    #[must_use]
    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Network,
            status: None,
            detail: detail.into(),
        }
    }

    /// Request timeout.
    #[must_use]
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Timeout,
            status: None,
            detail: detail.into(),
        }
    }

    /// Rejected credentials.
    #[must_use]
    pub fn auth(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Auth,
            status,
            detail: detail.into(),
        }
    }

    /// Unusable payload.
    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Malformed,
            status: None,
            detail: detail.into(),
        }
    }

    /// Classifies a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        if matches!(status, 401 | 403) {
            Self::auth(Some(status), detail)
        } else {
            Self {
                kind: FetchErrorKind::Network,
                status: Some(status),
                detail: detail.into(),
            }
        }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Timeouts, connect failures, 408, 429 and 5xx are transient; auth
    /// rejections, malformed payloads and other 4xx statuses are terminal.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self.kind {
            FetchErrorKind::Timeout => true,
            FetchErrorKind::Network => match self.status {
                None => true,
                Some(status) => status == 408 || status == 429 || status >= 500,
            },
            FetchErrorKind::Auth | FetchErrorKind::Malformed => false,
        }
    }

    /// Maps the error onto the attempt outcome taxonomy.
    #[must_use]
    pub const fn outcome(&self) -> FetchOutcome {
        match self.kind {
            FetchErrorKind::Network => FetchOutcome::NetworkError,
            FetchErrorKind::Timeout => FetchOutcome::Timeout,
            FetchErrorKind::Auth => FetchOutcome::AuthError,
            FetchErrorKind::Malformed => FetchOutcome::ValidationError,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} error (HTTP {status}): {}", self.kind, self.detail),
            None => write!(f, "{} error: {}", self.kind, self.detail),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<FetchError> for crate::Error {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FetchErrorKind::Network | FetchErrorKind::Timeout => Self::Network(err.to_string()),
            FetchErrorKind::Auth => Self::Auth(err.to_string()),
            FetchErrorKind::Malformed => Self::Validation {
                reason: err.to_string(),
            },
        }
    }
}

/// HTTP client configuration for introspection requests.
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (must be non-zero).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl HttpConfig {
    /// Loads HTTP configuration from config settings.
    #[must_use]
    pub const fn from_config(config: &crate::config::SchemaCacheConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            connect_timeout_ms: config.connect_timeout_ms,
        }
    }
}

/// Builds a blocking HTTP client for introspection requests with configured timeouts.
///
/// # Errors
///
/// Returns an error if the timeout is zero or the TLS backend cannot be
/// initialised.
pub fn build_http_client(config: HttpConfig) -> crate::Result<reqwest::blocking::Client> {
    if config.timeout_ms == 0 {
        return Err(crate::Error::InvalidInput(
            "request timeout must be greater than zero".to_string(),
        ));
    }

    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(format!("schema-cache/{}", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_millis(config.timeout_ms));
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().map_err(|e| crate::Error::OperationFailed {
        operation: "build_http_client".to_string(),
        cause: e.to_string(),
    })
}
