//! Schema document types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Encoding of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaFormat {
    /// GraphQL schema definition language.
    #[default]
    Sdl,
    /// Raw introspection result as JSON.
    #[serde(alias = "introspection", alias = "json")]
    IntrospectionJson,
}

impl SchemaFormat {
    /// Returns the format as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sdl => "sdl",
            Self::IntrospectionJson => "introspection_json",
        }
    }

    /// File extension used when the document is cached.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Sdl => "graphql",
            Self::IntrospectionJson => "json",
        }
    }

    /// Detects the format from the first non-whitespace character.
    ///
    /// Introspection results are JSON objects; everything else is treated as SDL.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            Self::IntrospectionJson
        } else {
            Self::Sdl
        }
    }
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable GraphQL schema document.
///
/// Shared with consumers behind an `Arc`; the text is never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDocument {
    text: String,
    format: SchemaFormat,
}

impl SchemaDocument {
    /// Creates a document with an explicit format.
    #[must_use]
    pub fn new(text: impl Into<String>, format: SchemaFormat) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }

    /// Creates a document, detecting the format from its content.
    #[must_use]
    pub fn detect(text: impl Into<String>) -> Self {
        let text = text.into();
        let format = SchemaFormat::detect(&text);
        Self { text, format }
    }

    /// Returns the schema text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the raw bytes of the schema text.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Returns the document format.
    #[must_use]
    pub const fn format(&self) -> SchemaFormat {
        self.format
    }

    /// Logical size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.text.len()
    }

    /// Returns true if the document has no content besides whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// SHA-256 of the document bytes, hex encoded.
    #[must_use]
    pub fn checksum(&self) -> String {
        checksum_bytes(self.as_bytes())
    }

    /// Consumes the document and returns its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for SchemaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// SHA-256 of arbitrary bytes, hex encoded.
#[must_use]
pub fn checksum_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(SchemaFormat::detect("type Query { a: Int }"), SchemaFormat::Sdl);
        assert_eq!(
            SchemaFormat::detect("  \n{\"data\": {}}"),
            SchemaFormat::IntrospectionJson
        );
        assert_eq!(SchemaFormat::detect(""), SchemaFormat::Sdl);
    }

    #[test]
    fn test_checksum_is_stable() {
        let doc = SchemaDocument::detect("type Query { ok: Boolean }");
        assert_eq!(doc.checksum(), doc.clone().checksum());
        assert_eq!(doc.checksum().len(), 64);

        let other = SchemaDocument::detect("type Query { ok: Int }");
        assert_ne!(doc.checksum(), other.checksum());
    }

    #[test]
    fn test_size_counts_bytes() {
        let doc = SchemaDocument::new("\"\"\"é\"\"\"", SchemaFormat::Sdl);
        assert_eq!(doc.size(), 8);
    }

    #[test]
    fn test_blank_document() {
        assert!(SchemaDocument::detect(" \n\t").is_blank());
        assert!(!SchemaDocument::detect("scalar Date").is_blank());
    }

    #[test]
    fn test_format_serde_aliases() {
        let format: SchemaFormat = serde_json::from_str("\"introspection\"").unwrap();
        assert_eq!(format, SchemaFormat::IntrospectionJson);
        assert_eq!(serde_json::to_string(&SchemaFormat::Sdl).unwrap(), "\"sdl\"");
    }
}
