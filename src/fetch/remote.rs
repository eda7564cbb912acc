//! HTTP introspection fetcher.

use super::introspection;
use super::{FetchError, HttpConfig, SchemaFetcher, build_http_client};
use crate::config::{Credentials, SchemaCacheConfig};
use crate::models::{SchemaDocument, SchemaFormat};
use crate::{Error, Result};
use secrecy::ExposeSecret;
use std::io::{self, Read};
use std::time::Duration;

/// Fetches a schema by posting the introspection query to a GraphQL endpoint.
///
/// Performs exactly one request per [`SchemaFetcher::fetch`] call. Wrap it in
/// a [`super::RetryingFetcher`] for retries.
pub struct RemoteFetcher {
    endpoint: String,
    credentials: Credentials,
    client: reqwest::blocking::Client,
    timeout: Duration,
    max_body_bytes: u64,
    raw_introspection: bool,
}

impl RemoteFetcher {
    /// Creates a fetcher for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the endpoint is not an absolute
    /// `http`/`https` URL with a host, or the timeout is zero.
    pub fn new(endpoint: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        Self::with_http_config(
            endpoint,
            credentials,
            HttpConfig {
                timeout_ms,
                ..HttpConfig::default()
            },
        )
    }

    /// Creates a fetcher with explicit HTTP client settings.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`], plus TLS initialisation failures.
    pub fn with_http_config(
        endpoint: &str,
        credentials: Credentials,
        http: HttpConfig,
    ) -> Result<Self> {
        let endpoint = validate_endpoint(endpoint)?;
        credentials.validate()?;
        let client = build_http_client(http)?;

        Ok(Self {
            endpoint,
            credentials,
            client,
            timeout: Duration::from_millis(http.timeout_ms),
            max_body_bytes: crate::config::DEFAULT_MAX_DOCUMENT_BYTES,
            raw_introspection: false,
        })
    }

    /// Creates a fetcher from application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint is configured or it is invalid.
    pub fn from_config(config: &SchemaCacheConfig) -> Result<Self> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            Error::InvalidInput("no GraphQL endpoint configured".to_string())
        })?;
        let fetcher =
            Self::with_http_config(endpoint, config.credentials.clone(), HttpConfig::from_config(config))?;
        Ok(fetcher.with_max_body_bytes(config.max_document_bytes))
    }

    /// Keeps the introspection JSON instead of rendering SDL.
    #[must_use]
    pub const fn with_raw_introspection(mut self, raw: bool) -> Self {
        self.raw_introspection = raw;
        self
    }

    /// Caps the accepted response size.
    #[must_use]
    pub const fn with_max_body_bytes(mut self, max: u64) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn add_auth_headers(
        request: reqwest::blocking::RequestBuilder,
        credentials: &Credentials,
    ) -> reqwest::blocking::RequestBuilder {
        match credentials {
            Credentials::None => request,
            Credentials::Bearer { token } => request.bearer_auth(token.expose_secret()),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose_secret()))
            },
            Credentials::Header { name, value } => {
                request.header(name.as_str(), value.expose_secret())
            },
        }
    }

    fn send(&self) -> std::result::Result<String, FetchError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&introspection::request_body());
        let request = Self::add_auth_headers(request, &self.credentials);

        let response = request.send().map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            tracing::debug!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                body = %snippet,
                "Introspection endpoint returned error status"
            );
            return Err(FetchError::from_status(
                status.as_u16(),
                format!("endpoint returned {status}"),
            ));
        }

        if let Some(length) = response.content_length()
            && length > self.max_body_bytes
        {
            return Err(FetchError::malformed(format!(
                "response of {length} bytes exceeds limit of {} bytes",
                self.max_body_bytes
            )));
        }

        // Content-Length is optional, so the cap also applies while reading.
        read_capped(response, self.max_body_bytes)
    }
}

impl SchemaFetcher for RemoteFetcher {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.endpoint)
    }

    fn fetch(&self) -> std::result::Result<SchemaDocument, FetchError> {
        let body = self.send()?;
        let payload = introspection::parse_response(&body)?;

        if self.raw_introspection {
            let text = serde_json::to_string_pretty(&payload)
                .map_err(|e| FetchError::malformed(format!("cannot re-encode payload: {e}")))?;
            return Ok(SchemaDocument::new(text, SchemaFormat::IntrospectionJson));
        }

        let sdl = introspection::render_sdl(&payload)?;
        Ok(SchemaDocument::new(sdl, SchemaFormat::Sdl))
    }
}

impl std::fmt::Debug for RemoteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFetcher")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.credentials.kind())
            .field("timeout", &self.timeout)
            .field("raw_introspection", &self.raw_introspection)
            .finish_non_exhaustive()
    }
}

fn classify_transport_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::timeout(e.to_string())
    } else if e.is_connect() {
        FetchError::network(format!("connect error: {e}"))
    } else if let Some(status) = e.status() {
        FetchError::from_status(status.as_u16(), e.to_string())
    } else if e.is_body() || e.is_decode() {
        FetchError::network(format!("failed to read response: {e}"))
    } else {
        FetchError::network(e.to_string())
    }
}

/// Reads at most `max` bytes of body; one byte more means the limit was hit.
fn read_capped(body: impl Read, max: u64) -> std::result::Result<String, FetchError> {
    let mut bytes = Vec::new();
    body.take(max.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| classify_read_error(&e))?;
    if u64::try_from(bytes.len()).unwrap_or(u64::MAX) > max {
        return Err(FetchError::malformed(format!(
            "response exceeds limit of {max} bytes"
        )));
    }
    String::from_utf8(bytes)
        .map_err(|_| FetchError::malformed("response body is not valid UTF-8"))
}

fn classify_read_error(e: &io::Error) -> FetchError {
    if let Some(inner) = e.get_ref().and_then(|i| i.downcast_ref::<reqwest::Error>()) {
        return classify_transport_error(inner);
    }
    if e.kind() == io::ErrorKind::TimedOut {
        FetchError::timeout(format!("timed out reading response: {e}"))
    } else {
        FetchError::network(format!("failed to read response: {e}"))
    }
}

fn validate_endpoint(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| Error::InvalidInput(format!("invalid endpoint URL '{trimmed}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "endpoint must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidInput(format!(
            "endpoint URL '{trimmed}' has no host"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchErrorKind;
    use test_case::test_case;

    #[test]
    fn test_read_capped_stops_at_limit() {
        // An endless body without a length must not be buffered in full.
        let err = read_capped(io::repeat(b'x'), 1024).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Malformed);
        assert!(err.detail.contains("1024"));
    }

    #[test]
    fn test_read_capped_accepts_body_at_limit() {
        let body = read_capped(io::Cursor::new(vec![b'{'; 16]), 16).unwrap();
        assert_eq!(body.len(), 16);
    }

    #[test]
    fn test_read_capped_rejects_invalid_utf8() {
        let err = read_capped(io::Cursor::new(vec![0xff, 0xfe]), 16).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Malformed);
    }

    #[test]
    fn test_read_timeout_is_classified_as_timeout() {
        let err = classify_read_error(&io::Error::new(io::ErrorKind::TimedOut, "stalled"));
        assert_eq!(err.kind, FetchErrorKind::Timeout);
    }

    #[test_case("https://api.example.com/graphql" ; "https")]
    #[test_case("http://127.0.0.1:8080/graphql" ; "loopback")]
    #[test_case("  https://api.example.com/graphql  " ; "surrounding whitespace")]
    fn test_valid_endpoints(endpoint: &str) {
        assert!(validate_endpoint(endpoint).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("api.example.com/graphql" ; "no scheme")]
    #[test_case("ftp://api.example.com/graphql" ; "wrong scheme")]
    #[test_case("file:///etc/passwd" ; "file url")]
    fn test_invalid_endpoints(endpoint: &str) {
        assert!(matches!(
            validate_endpoint(endpoint),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_rejects_zero_timeout() {
        let result = RemoteFetcher::new(
            "https://api.example.com/graphql",
            Credentials::None,
            Duration::ZERO,
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let config = SchemaCacheConfig::new();
        assert!(RemoteFetcher::from_config(&config).is_err());
    }

    #[test]
    fn test_debug_hides_credentials() {
        let fetcher = RemoteFetcher::new(
            "https://api.example.com/graphql",
            Credentials::bearer("very-secret"),
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{fetcher:?}");
        assert!(debug.contains("bearer"));
        assert!(!debug.contains("very-secret"));
        assert_eq!(fetcher.endpoint(), Some("https://api.example.com/graphql"));
    }
}
