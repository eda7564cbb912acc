//! Credentials for the GraphQL endpoint.
//!
//! Configured under `[auth]` in `config.toml`:
//!
//! ```toml
//! [auth]
//! kind = "bearer"
//! token = "${SCHEMA_CACHE_TOKEN}"
//!
//! # OR vendor-style raw header:
//! # kind = "header"
//! # header_name = "Authorization"
//! # header_value = "Basic ${VENDOR_API_KEY}"
//! ```

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Credentials sent with the introspection request.
///
/// Secret values are held in [`SecretString`] so they are zeroized on drop
/// and never show up in `Debug` output.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    /// No authentication.
    #[default]
    None,
    /// `Authorization: Bearer <token>`.
    Bearer {
        /// The bearer token.
        token: SecretString,
    },
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: SecretString,
    },
    /// An arbitrary header carrying a secret value.
    Header {
        /// Header name.
        name: String,
        /// Header value.
        value: SecretString,
    },
}

impl Credentials {
    /// Bearer token credentials.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: SecretString::from(token.into()),
        }
    }

    /// HTTP basic credentials.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Raw header credentials.
    #[must_use]
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            value: SecretString::from(value.into()),
        }
    }

    /// Parses `Name: value` into header credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the string has no `:` separator or an empty name.
    pub fn parse_header(raw: &str) -> Result<Self> {
        let (name, value) = raw.split_once(':').ok_or_else(|| {
            Error::InvalidInput("auth header must look like 'Name: value'".to_string())
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("auth header name is empty".to_string()));
        }
        Ok(Self::header(name, value.trim()))
    }

    /// Returns the credential kind as a string slice.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bearer { .. } => "bearer",
            Self::Basic { .. } => "basic",
            Self::Header { .. } => "header",
        }
    }

    /// Returns true if no credentials are configured.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Creates credentials from the `[auth]` config file section.
    #[must_use]
    pub fn from_config_file(file: &ConfigFileAuth, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        match file {
            ConfigFileAuth::None => Self::None,
            ConfigFileAuth::Bearer { token } => Self::bearer(super::expand_env_refs(token, lookup)),
            ConfigFileAuth::Basic { username, password } => Self::basic(
                super::expand_env_refs(username, lookup),
                super::expand_env_refs(password, lookup),
            ),
            ConfigFileAuth::Header {
                header_name,
                header_value,
            } => Self::header(
                header_name.trim(),
                super::expand_env_refs(header_value, lookup),
            ),
        }
    }

    /// Validates the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if a required secret or name is empty, or a header
    /// name contains characters that cannot appear in an HTTP header.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Bearer { token } if token.expose_secret().trim().is_empty() => Err(
                Error::InvalidInput("bearer token cannot be empty".to_string()),
            ),
            Self::Basic { username, .. } if username.trim().is_empty() => Err(
                Error::InvalidInput("basic auth username cannot be empty".to_string()),
            ),
            Self::Header { name, value } => {
                if name.is_empty() || !name.chars().all(is_header_name_char) {
                    return Err(Error::InvalidInput(format!(
                        "invalid auth header name: '{name}'"
                    )));
                }
                if value.expose_secret().trim().is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "auth header '{name}' cannot have an empty value"
                    )));
                }
                Ok(())
            },
            _ => Ok(()),
        }
    }
}

const fn is_header_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_')
}

/// Auth section in config file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigFileAuth {
    /// No authentication.
    #[default]
    None,
    /// Bearer token.
    Bearer {
        /// Token (supports `${VAR}`).
        token: String,
    },
    /// HTTP basic.
    Basic {
        /// User name.
        username: String,
        /// Password (supports `${VAR}`).
        #[serde(default)]
        password: String,
    },
    /// Raw header.
    Header {
        /// Header name.
        header_name: String,
        /// Header value (supports `${VAR}`).
        header_value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_debug_does_not_leak_secret() {
        let creds = Credentials::bearer("super-secret-token");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("super-secret-token"));
    }

    #[test_case("Authorization: Basic abc123", "Authorization", "Basic abc123" ; "vendor basic")]
    #[test_case("X-Api-Key:  k-1 ", "X-Api-Key", "k-1" ; "trims whitespace")]
    fn test_parse_header(raw: &str, name: &str, value: &str) {
        let Credentials::Header { name: n, value: v } = Credentials::parse_header(raw).unwrap()
        else {
            unreachable!("expected header credentials");
        };
        assert_eq!(n, name);
        assert_eq!(v.expose_secret(), value);
    }

    #[test]
    fn test_parse_header_rejects_missing_separator() {
        assert!(Credentials::parse_header("Authorization Bearer x").is_err());
        assert!(Credentials::parse_header(": value").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Credentials::None.validate().is_ok());
        assert!(Credentials::bearer("t").validate().is_ok());
        assert!(Credentials::bearer("  ").validate().is_err());
        assert!(Credentials::basic("", "pw").validate().is_err());
        assert!(Credentials::header("Bad Header", "v").validate().is_err());
        assert!(Credentials::header("X-Key", "").validate().is_err());
        assert!(Credentials::header("X-Key", "v").validate().is_ok());
    }

    #[test]
    fn test_from_config_file_expands_env_refs() {
        let file: ConfigFileAuth = toml::from_str(
            r#"
            kind = "header"
            header_name = "Authorization"
            header_value = "Basic ${VENDOR_KEY}"
            "#,
        )
        .unwrap();
        let lookup = |key: &str| (key == "VENDOR_KEY").then(|| "k-42".to_string());
        let Credentials::Header { name, value } = Credentials::from_config_file(&file, &lookup)
        else {
            unreachable!("expected header credentials");
        };
        assert_eq!(name, "Authorization");
        assert_eq!(value.expose_secret(), "Basic k-42");
    }
}
