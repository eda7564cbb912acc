//! Configuration management.
//!
//! Precedence, lowest to highest: built-in defaults, `config.toml`,
//! `SCHEMA_CACHE_*` environment variables, CLI flags.
//!
//! ```toml
//! endpoint = "https://api.example.com/graphql"
//! cache_dir = "~/.cache/schema-cache"
//! ttl_hours = 24
//! cache_enabled = true
//! timeout_ms = 30000
//! max_retries = 2
//! bundled_schema_path = "/usr/share/schema-cache/schema.graphql"
//!
//! [auth]
//! kind = "bearer"
//! token = "${SCHEMA_CACHE_TOKEN}"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

mod credentials;

pub use credentials::{ConfigFileAuth, Credentials};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name used for config and cache lookups.
pub const APP_NAME: &str = "schema-cache";

/// Default time-to-live for a cached schema.
pub const DEFAULT_TTL_HOURS: u64 = 24;

/// Default upper bound for cached document size (64 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 64 * 1024 * 1024;

/// Main configuration for the schema cache.
#[derive(Debug, Clone)]
pub struct SchemaCacheConfig {
    /// GraphQL endpoint URL.
    pub endpoint: Option<String>,
    /// Credentials sent with the introspection request.
    pub credentials: Credentials,
    /// Directory holding the cached schema and its metadata.
    pub cache_dir: PathBuf,
    /// Hours a fetched schema stays fresh.
    pub ttl_hours: u64,
    /// When false every call refreshes (stale fallback still applies).
    pub cache_enabled: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base backoff between retries in milliseconds.
    pub retry_backoff_ms: u64,
    /// Cap on a single backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Schema file shipped with the application, used when nothing is cached.
    pub bundled_schema_path: Option<PathBuf>,
    /// Largest document the local store will read.
    pub max_document_bytes: u64,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Logging settings from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `schema_cache=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path (stderr when unset).
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// GraphQL endpoint.
    pub endpoint: Option<String>,
    /// Cache directory.
    pub cache_dir: Option<String>,
    /// TTL in hours.
    pub ttl_hours: Option<u64>,
    /// Cache enabled flag.
    pub cache_enabled: Option<bool>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Max retries.
    pub max_retries: Option<u32>,
    /// Retry backoff base.
    pub retry_backoff_ms: Option<u64>,
    /// Retry backoff cap.
    pub max_backoff_ms: Option<u64>,
    /// Bundled fallback schema.
    pub bundled_schema_path: Option<String>,
    /// Max document size.
    pub max_document_bytes: Option<u64>,
    /// Auth section.
    pub auth: Option<ConfigFileAuth>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// Output format.
    pub format: Option<String>,
    /// Output file.
    pub file: Option<String>,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            credentials: Credentials::None,
            cache_dir: default_cache_dir(),
            ttl_hours: DEFAULT_TTL_HOURS,
            cache_enabled: true,
            timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            max_retries: 2,
            retry_backoff_ms: 250,
            max_backoff_ms: 5_000,
            bundled_schema_path: None,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            logging: LoggingSettings::default(),
        }
    }
}

impl SchemaCacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        let config = Self::from_toml_str(&contents, &env_lookup)?;
        Ok(config.with_env_overrides())
    }

    /// Parses a TOML document without consulting the process environment
    /// for overrides (`${VAR}` references use `lookup`).
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid config TOML.
    pub fn from_toml_str(
        contents: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file, lookup))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/schema-cache/` on macOS)
    /// 2. XDG config dir (`~/.config/schema-cache/` for Unix compatibility)
    ///
    /// Falls back to defaults when no file is found. Environment overrides
    /// are applied in every case.
    #[must_use]
    pub fn load_default() -> Self {
        for candidate in default_config_paths() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default().with_env_overrides()
    }

    /// Converts a `ConfigFile` to `SchemaCacheConfig`.
    fn from_config_file(file: ConfigFile, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(endpoint) = file.endpoint {
            config.endpoint = Some(expand_env_refs(&endpoint, lookup));
        }
        if let Some(cache_dir) = file.cache_dir {
            config.cache_dir = expand_path(&expand_env_refs(&cache_dir, lookup));
        }
        if let Some(ttl_hours) = file.ttl_hours {
            config.ttl_hours = ttl_hours;
        }
        if let Some(enabled) = file.cache_enabled {
            config.cache_enabled = enabled;
        }
        if let Some(timeout_ms) = file.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = file.connect_timeout_ms {
            config.connect_timeout_ms = connect_timeout_ms;
        }
        if let Some(max_retries) = file.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(backoff) = file.retry_backoff_ms {
            config.retry_backoff_ms = backoff;
        }
        if let Some(max_backoff) = file.max_backoff_ms {
            config.max_backoff_ms = max_backoff;
        }
        if let Some(path) = file.bundled_schema_path {
            config.bundled_schema_path = Some(expand_path(&expand_env_refs(&path, lookup)));
        }
        if let Some(max_bytes) = file.max_document_bytes {
            config.max_document_bytes = max_bytes;
        }
        if let Some(auth) = file.auth {
            config.credentials = Credentials::from_config_file(&auth, lookup);
        }
        if let Some(logging) = file.logging {
            config.logging = LoggingSettings {
                level: logging.level,
                format: logging.format,
                file: logging.file.map(|f| expand_path(&f)),
            };
        }

        config
    }

    /// Applies `SCHEMA_CACHE_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(&env_lookup)
    }

    /// Applies overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = non_empty(lookup("SCHEMA_CACHE_ENDPOINT")) {
            self.endpoint = Some(v);
        }
        if let Some(v) = non_empty(lookup("SCHEMA_CACHE_DIR")) {
            self.cache_dir = expand_path(&v);
        }
        if let Some(v) = parse_var::<u64>(lookup, "SCHEMA_CACHE_TTL_HOURS") {
            self.ttl_hours = v;
        }
        if let Some(v) = lookup("SCHEMA_CACHE_ENABLED").and_then(|v| parse_bool(&v)) {
            self.cache_enabled = v;
        }
        if let Some(v) = parse_var::<u64>(lookup, "SCHEMA_CACHE_TIMEOUT_MS") {
            self.timeout_ms = v;
        }
        if let Some(v) = parse_var::<u64>(lookup, "SCHEMA_CACHE_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = parse_var::<u32>(lookup, "SCHEMA_CACHE_MAX_RETRIES") {
            self.max_retries = v;
        }
        if let Some(v) = parse_var::<u64>(lookup, "SCHEMA_CACHE_RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = v;
        }
        if let Some(v) = parse_var::<u64>(lookup, "SCHEMA_CACHE_MAX_BACKOFF_MS") {
            self.max_backoff_ms = v;
        }
        if let Some(v) = non_empty(lookup("SCHEMA_CACHE_BUNDLED_SCHEMA")) {
            self.bundled_schema_path = Some(expand_path(&v));
        }
        if let Some(v) = non_empty(lookup("SCHEMA_CACHE_TOKEN")) {
            self.credentials = Credentials::bearer(v);
        }
        if let Some(v) = non_empty(lookup("SCHEMA_CACHE_AUTH_HEADER")) {
            match Credentials::parse_header(&v) {
                Ok(credentials) => self.credentials = credentials,
                Err(e) => tracing::warn!(error = %e, "Ignoring SCHEMA_CACHE_AUTH_HEADER"),
            }
        }
        if let Some(v) = non_empty(lookup("SCHEMA_CACHE_LOG_FORMAT")) {
            self.logging.format = Some(v);
        }
        if let Some(v) = non_empty(lookup("SCHEMA_CACHE_LOG_FILE")) {
            self.logging.file = Some(expand_path(&v));
        }

        self
    }

    /// Sets the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = path.into();
        self
    }

    /// Sets the TTL.
    #[must_use]
    pub const fn with_ttl_hours(mut self, ttl_hours: u64) -> Self {
        self.ttl_hours = ttl_hours;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// TTL the freshness policy should apply; zero when caching is disabled.
    #[must_use]
    pub const fn effective_ttl_hours(&self) -> u64 {
        if self.cache_enabled { self.ttl_hours } else { 0 }
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates values that cannot be checked while parsing.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero timeout or invalid credentials.
    pub fn validate(&self) -> crate::Result<()> {
        if self.timeout_ms == 0 {
            return Err(crate::Error::InvalidInput(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_document_bytes == 0 {
            return Err(crate::Error::InvalidInput(
                "max_document_bytes must be greater than zero".to_string(),
            ));
        }
        self.credentials.validate()
    }
}

/// Candidate config file locations, in lookup order.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(path) = non_empty(std::env::var("SCHEMA_CACHE_CONFIG_PATH").ok()) {
        paths.push(expand_path(&path));
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        paths.push(base_dirs.config_dir().join(APP_NAME).join("config.toml"));
        paths.push(
            base_dirs
                .home_dir()
                .join(".config")
                .join(APP_NAME)
                .join("config.toml"),
        );
    }

    paths.dedup();
    paths
}

/// Platform cache directory, or `.schema-cache` in the working directory.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME).map_or_else(
        || PathBuf::from(".schema-cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    if trimmed == "~" || trimmed.starts_with("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            let rest = trimmed.trim_start_matches('~').trim_start_matches('/');
            return base_dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(trimmed)
}

/// Replaces `${VAR}` references using `lookup`.
///
/// Unknown variables expand to an empty string; an unterminated `${` is
/// kept literally.
#[must_use]
pub fn expand_env_refs(value: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if let Some(resolved) = lookup(name) {
            out.push_str(&resolved);
        } else {
            tracing::warn!(variable = name, "Config references an unset environment variable");
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() {
        tracing::warn!(variable = key, value = %raw, "Ignoring unparseable environment override");
    }
    parsed
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
