//! Schema document validation.
//!
//! A document is accepted only if it is non-empty, parses in its detected
//! format, and defines a query root. Validation is pure: no I/O, no logging.

use crate::fetch::introspection::schema_value;
use crate::models::{SchemaDocument, SchemaFormat};
use crate::{Error, Result};
use async_graphql_parser::types::{TypeKind, TypeSystemDefinition};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Summary of a successfully validated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Detected document format.
    pub format: SchemaFormat,
    /// Name of the query root type.
    pub query_type: String,
    /// Number of named type definitions.
    pub type_count: usize,
}

/// Validates a schema document.
///
/// # Errors
///
/// Returns [`Error::Validation`] describing the first problem found.
pub fn validate(document: &SchemaDocument) -> Result<ValidationReport> {
    if document.is_blank() {
        return Err(invalid("schema document is empty"));
    }

    match document.format() {
        SchemaFormat::Sdl => validate_sdl(document.text()),
        SchemaFormat::IntrospectionJson => validate_introspection(document.text()),
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::Validation {
        reason: reason.into(),
    }
}

fn validate_sdl(text: &str) -> Result<ValidationReport> {
    let document = async_graphql_parser::parse_schema(text)
        .map_err(|e| invalid(format!("SDL does not parse: {e}")))?;

    let mut object_types: HashSet<&str> = HashSet::new();
    let mut named_types: HashSet<&str> = HashSet::new();
    let mut explicit_query: Option<&str> = None;

    for definition in &document.definitions {
        match definition {
            TypeSystemDefinition::Schema(schema) => {
                if let Some(query) = &schema.node.query {
                    explicit_query = Some(query.node.as_str());
                }
            },
            TypeSystemDefinition::Type(ty) => {
                if ty.node.extend {
                    continue;
                }
                let name = ty.node.name.node.as_str();
                named_types.insert(name);
                if matches!(ty.node.kind, TypeKind::Object(_)) {
                    object_types.insert(name);
                }
            },
            TypeSystemDefinition::Directive(_) => {},
        }
    }

    let query_type = match explicit_query {
        Some(name) if object_types.contains(name) => name,
        Some(name) => {
            return Err(invalid(format!(
                "schema declares query root '{name}' but no object type '{name}' is defined"
            )));
        },
        None if object_types.contains("Query") => "Query",
        None => return Err(invalid("schema does not define a Query type")),
    };

    Ok(ValidationReport {
        format: SchemaFormat::Sdl,
        query_type: query_type.to_string(),
        type_count: named_types.len(),
    })
}

fn validate_introspection(text: &str) -> Result<ValidationReport> {
    let payload: Value = serde_json::from_str(text)
        .map_err(|e| invalid(format!("introspection result is not JSON: {e}")))?;
    if !payload.is_object() {
        return Err(invalid("introspection result is not a JSON object"));
    }

    let schema =
        schema_value(&payload).ok_or_else(|| invalid("introspection result has no __schema"))?;

    let query_type = schema
        .pointer("/queryType/name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("introspection result has no queryType"))?;

    let types = schema
        .get("types")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("introspection result has no types list"))?;

    let query_is_object = types.iter().any(|ty| {
        ty.get("name").and_then(Value::as_str) == Some(query_type)
            && ty.get("kind").and_then(Value::as_str) == Some("OBJECT")
    });
    if !query_is_object {
        return Err(invalid(format!(
            "query root '{query_type}' is not an object type in the schema"
        )));
    }

    let type_count = types
        .iter()
        .filter(|ty| ty.get("name").and_then(Value::as_str).is_some())
        .count();

    Ok(ValidationReport {
        format: SchemaFormat::IntrospectionJson,
        query_type: query_type.to_string(),
        type_count,
    })
}
