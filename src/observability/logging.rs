//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when nothing else is configured.
const DEFAULT_FILTER: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names fall back to pretty.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" | "text" | "" => Self::Pretty,
            other => {
                tracing::warn!(format = other, "Unknown log format, using pretty");
                Self::Pretty
            },
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Event filter directives.
    pub filter: EnvFilter,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Resolves logging from config settings and the process environment.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::from_settings_with(settings, verbose, &|key| std::env::var(key).ok())
    }

    /// Resolves logging with an explicit variable lookup.
    ///
    /// Filter precedence: `--verbose`, `SCHEMA_CACHE_LOG`, `RUST_LOG`, the
    /// config file level, then `info`.
    #[must_use]
    pub fn from_settings_with(
        settings: &LoggingSettings,
        verbose: bool,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Self {
        let directives = if verbose {
            "debug".to_string()
        } else {
            lookup("SCHEMA_CACHE_LOG")
                .or_else(|| lookup("RUST_LOG"))
                .or_else(|| settings.level.clone())
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string())
        };

        let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
            eprintln!("invalid log filter '{directives}': {e}; using '{DEFAULT_FILTER}'");
            EnvFilter::new(DEFAULT_FILTER)
        });

        let format = lookup("SCHEMA_CACHE_LOG_FORMAT")
            .or_else(|| settings.format.clone())
            .map_or_else(LogFormat::default, |f| LogFormat::parse(&f));

        let file = lookup("SCHEMA_CACHE_LOG_FILE")
            .filter(|f| !f.trim().is_empty())
            .map(|f| crate::config::expand_path(&f))
            .or_else(|| settings.file.clone());

        Self {
            filter,
            format,
            file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::from_settings_with(&LoggingSettings::default(), false, &|_: &str| None);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
        assert_eq!(config.filter.to_string(), "info");
    }

    #[test]
    fn test_verbose_wins() {
        let lookup = lookup_from(&[("SCHEMA_CACHE_LOG", "error")]);
        let config = LoggingConfig::from_settings_with(&LoggingSettings::default(), true, &lookup);
        assert_eq!(config.filter.to_string(), "debug");
    }

    #[test]
    fn test_env_overrides_settings() {
        let settings = LoggingSettings {
            level: Some("warn".to_string()),
            format: Some("pretty".to_string()),
            file: None,
        };
        let lookup = lookup_from(&[
            ("RUST_LOG", "schema_cache=trace"),
            ("SCHEMA_CACHE_LOG_FORMAT", "json"),
            ("SCHEMA_CACHE_LOG_FILE", "/tmp/schema-cache.log"),
        ]);
        let config = LoggingConfig::from_settings_with(&settings, false, &lookup);
        assert_eq!(config.filter.to_string(), "schema_cache=trace");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/schema-cache.log")));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Pretty);
    }
}
