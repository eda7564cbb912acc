//! Introspection query and SDL rendering.
//!
//! The endpoint answers the standard introspection query with a JSON
//! description of its type system. [`render_sdl`] turns that description into
//! schema definition language so downstream tools can search readable type
//! definitions instead of nested JSON.

use super::FetchError;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;

/// Operation name sent with [`INTROSPECTION_QUERY`].
pub const OPERATION_NAME: &str = "IntrospectionQuery";

/// The standard full introspection query.
pub const INTROSPECTION_QUERY: &str = r"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types { ...FullType }
    directives {
      name
      description
      locations
      args { ...InputValue }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args { ...InputValue }
    type { ...TypeRef }
    isDeprecated
    deprecationReason
  }
  inputFields { ...InputValue }
  interfaces { ...TypeRef }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes { ...TypeRef }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
";

const BUILTIN_SCALARS: &[&str] = &["String", "Int", "Float", "Boolean", "ID"];
const BUILTIN_DIRECTIVES: &[&str] = &["skip", "include", "deprecated", "specifiedBy", "oneOf"];
const DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

/// Builds the JSON request body for the introspection query.
#[must_use]
pub fn request_body() -> Value {
    serde_json::json!({
        "query": INTROSPECTION_QUERY,
        "operationName": OPERATION_NAME,
    })
}

/// Locates the `__schema` object in an introspection payload.
///
/// Accepts both the full response envelope (`{"data": {"__schema": ...}}`)
/// and a bare `{"__schema": ...}` object.
#[must_use]
pub fn schema_value(payload: &Value) -> Option<&Value> {
    payload
        .get("data")
        .and_then(|data| data.get("__schema"))
        .or_else(|| payload.get("__schema"))
        .filter(|schema| schema.is_object())
}

/// Parses a response body and returns the whole payload plus a reference
/// check that `__schema` exists.
///
/// # Errors
///
/// Returns a malformed [`FetchError`] for empty bodies, non-JSON bodies,
/// GraphQL error responses without data, or payloads missing `__schema`.
pub fn parse_response(body: &str) -> Result<Value, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::malformed("empty response body"));
    }

    let payload: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::malformed(format!("response is not JSON: {e}")))?;

    if schema_value(&payload).is_some() {
        return Ok(payload);
    }

    let messages = graphql_error_messages(&payload);
    if messages.is_empty() {
        Err(FetchError::malformed("response has no data.__schema"))
    } else {
        Err(FetchError::malformed(format!(
            "introspection returned errors: {}",
            messages.join("; ")
        )))
    }
}

fn graphql_error_messages(payload: &Value) -> Vec<String> {
    payload
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionSchema {
    query_type: Option<NamedRef>,
    mutation_type: Option<NamedRef>,
    subscription_type: Option<NamedRef>,
    types: Vec<FullType>,
    #[serde(default)]
    directives: Vec<DirectiveDef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullType {
    kind: String,
    name: Option<String>,
    description: Option<String>,
    fields: Option<Vec<FieldDef>>,
    input_fields: Option<Vec<InputValue>>,
    interfaces: Option<Vec<TypeRef>>,
    enum_values: Option<Vec<EnumValueDef>>,
    possible_types: Option<Vec<TypeRef>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldDef {
    name: String,
    description: Option<String>,
    #[serde(default)]
    args: Vec<InputValue>,
    #[serde(rename = "type")]
    ty: TypeRef,
    #[serde(default)]
    is_deprecated: bool,
    deprecation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputValue {
    name: String,
    description: Option<String>,
    #[serde(rename = "type")]
    ty: TypeRef,
    default_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnumValueDef {
    name: String,
    description: Option<String>,
    #[serde(default)]
    is_deprecated: bool,
    deprecation_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectiveDef {
    name: String,
    description: Option<String>,
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    args: Vec<InputValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeRef {
    kind: String,
    name: Option<String>,
    of_type: Option<Box<TypeRef>>,
}

impl TypeRef {
    fn render(&self) -> Option<String> {
        match self.kind.as_str() {
            "NON_NULL" => Some(format!("{}!", self.of_type.as_ref()?.render()?)),
            "LIST" => Some(format!("[{}]", self.of_type.as_ref()?.render()?)),
            _ => self.name.clone(),
        }
    }
}

/// Renders an introspection payload as SDL.
///
/// Built-in scalars, built-in directives and `__`-prefixed introspection
/// types are omitted. A `schema { ... }` block is emitted only when the root
/// operation types do not use the conventional names.
///
/// # Errors
///
/// Returns a malformed [`FetchError`] if the payload does not match the
/// introspection result shape.
pub fn render_sdl(payload: &Value) -> Result<String, FetchError> {
    let schema_json = schema_value(payload)
        .ok_or_else(|| FetchError::malformed("response has no data.__schema"))?;
    let schema: IntrospectionSchema = serde_json::from_value(schema_json.clone())
        .map_err(|e| FetchError::malformed(format!("unexpected introspection shape: {e}")))?;

    let query_root = schema
        .query_type
        .as_ref()
        .map(|q| q.name.as_str())
        .ok_or_else(|| FetchError::malformed("introspection result has no queryType"))?;

    let mut blocks: Vec<String> = Vec::new();

    if let Some(block) = render_schema_block(
        query_root,
        schema.mutation_type.as_ref().map(|m| m.name.as_str()),
        schema.subscription_type.as_ref().map(|s| s.name.as_str()),
    ) {
        blocks.push(block);
    }

    for directive in &schema.directives {
        if BUILTIN_DIRECTIVES.contains(&directive.name.as_str()) {
            continue;
        }
        blocks.push(render_directive(directive)?);
    }

    for ty in &schema.types {
        let Some(name) = ty.name.as_deref() else {
            continue;
        };
        if name.starts_with("__") || (ty.kind == "SCALAR" && BUILTIN_SCALARS.contains(&name)) {
            continue;
        }
        blocks.push(render_type(name, ty)?);
    }

    let mut sdl = blocks.join("\n\n");
    sdl.push('\n');
    Ok(sdl)
}

fn render_schema_block(
    query: &str,
    mutation: Option<&str>,
    subscription: Option<&str>,
) -> Option<String> {
    let conventional = query == "Query"
        && mutation.is_none_or(|m| m == "Mutation")
        && subscription.is_none_or(|s| s == "Subscription");
    if conventional {
        return None;
    }

    let mut out = String::from("schema {\n");
    let _ = writeln!(out, "  query: {query}");
    if let Some(mutation) = mutation {
        let _ = writeln!(out, "  mutation: {mutation}");
    }
    if let Some(subscription) = subscription {
        let _ = writeln!(out, "  subscription: {subscription}");
    }
    out.push('}');
    Some(out)
}

fn render_directive(directive: &DirectiveDef) -> Result<String, FetchError> {
    let mut out = String::new();
    push_description(&mut out, directive.description.as_deref(), "");
    let _ = write!(out, "directive @{}", directive.name);
    out.push_str(&render_args(&directive.args, "")?);
    let _ = write!(out, " on {}", directive.locations.join(" | "));
    Ok(out)
}

fn render_type(name: &str, ty: &FullType) -> Result<String, FetchError> {
    let mut out = String::new();
    push_description(&mut out, ty.description.as_deref(), "");

    match ty.kind.as_str() {
        "SCALAR" => {
            let _ = write!(out, "scalar {name}");
        },
        "OBJECT" | "INTERFACE" => {
            let keyword = if ty.kind == "OBJECT" { "type" } else { "interface" };
            let _ = write!(out, "{keyword} {name}");
            let interfaces = named_refs(ty.interfaces.as_deref().unwrap_or_default());
            if !interfaces.is_empty() {
                let _ = write!(out, " implements {}", interfaces.join(" & "));
            }
            let fields = ty.fields.as_deref().unwrap_or_default();
            if !fields.is_empty() {
                out.push_str(" {\n");
                for field in fields {
                    out.push_str(&render_field(field)?);
                }
                out.push('}');
            }
        },
        "UNION" => {
            let _ = write!(out, "union {name}");
            let members = named_refs(ty.possible_types.as_deref().unwrap_or_default());
            if !members.is_empty() {
                let _ = write!(out, " = {}", members.join(" | "));
            }
        },
        "ENUM" => {
            let _ = write!(out, "enum {name}");
            let values = ty.enum_values.as_deref().unwrap_or_default();
            if !values.is_empty() {
                out.push_str(" {\n");
                for value in values {
                    push_description(&mut out, value.description.as_deref(), "  ");
                    let _ = write!(out, "  {}", value.name);
                    push_deprecation(&mut out, value.is_deprecated, value.deprecation_reason.as_deref());
                    out.push('\n');
                }
                out.push('}');
            }
        },
        "INPUT_OBJECT" => {
            let _ = write!(out, "input {name}");
            let fields = ty.input_fields.as_deref().unwrap_or_default();
            if !fields.is_empty() {
                out.push_str(" {\n");
                for field in fields {
                    push_description(&mut out, field.description.as_deref(), "  ");
                    let _ = writeln!(out, "  {}", render_input_value(field)?);
                }
                out.push('}');
            }
        },
        other => {
            return Err(FetchError::malformed(format!(
                "type '{name}' has unknown kind '{other}'"
            )));
        },
    }

    Ok(out)
}

fn render_field(field: &FieldDef) -> Result<String, FetchError> {
    let mut out = String::new();
    push_description(&mut out, field.description.as_deref(), "  ");
    let ty = field.ty.render().ok_or_else(|| {
        FetchError::malformed(format!("field '{}' has an incomplete type", field.name))
    })?;
    let _ = write!(
        out,
        "  {}{}: {ty}",
        field.name,
        render_args(&field.args, "  ")?
    );
    push_deprecation(&mut out, field.is_deprecated, field.deprecation_reason.as_deref());
    out.push('\n');
    Ok(out)
}

fn render_args(args: &[InputValue], indent: &str) -> Result<String, FetchError> {
    if args.is_empty() {
        return Ok(String::new());
    }

    if args.iter().all(|a| a.description.is_none()) {
        let rendered: Result<Vec<String>, FetchError> =
            args.iter().map(render_input_value).collect();
        return Ok(format!("({})", rendered?.join(", ")));
    }

    let inner = format!("{indent}  ");
    let mut out = String::from("(\n");
    for arg in args {
        push_description(&mut out, arg.description.as_deref(), &inner);
        let _ = writeln!(out, "{inner}{}", render_input_value(arg)?);
    }
    let _ = write!(out, "{indent})");
    Ok(out)
}

fn render_input_value(value: &InputValue) -> Result<String, FetchError> {
    let ty = value.ty.render().ok_or_else(|| {
        FetchError::malformed(format!("argument '{}' has an incomplete type", value.name))
    })?;
    Ok(match value.default_value.as_deref() {
        Some(default) => format!("{}: {ty} = {default}", value.name),
        None => format!("{}: {ty}", value.name),
    })
}

fn named_refs(refs: &[TypeRef]) -> Vec<&str> {
    refs.iter().filter_map(|r| r.name.as_deref()).collect()
}

fn push_description(out: &mut String, description: Option<&str>, indent: &str) {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return;
    };
    let escaped = description.replace("\"\"\"", "\\\"\"\"");
    let _ = writeln!(out, "{indent}\"\"\"");
    for line in escaped.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "{indent}{line}");
        }
    }
    let _ = writeln!(out, "{indent}\"\"\"");
}

fn push_deprecation(out: &mut String, is_deprecated: bool, reason: Option<&str>) {
    if !is_deprecated {
        return;
    }
    match reason.filter(|r| *r != DEFAULT_DEPRECATION_REASON) {
        Some(reason) => {
            let quoted = serde_json::to_string(reason).unwrap_or_else(|_| "\"\"".to_string());
            let _ = write!(out, " @deprecated(reason: {quoted})");
        },
        None => out.push_str(" @deprecated"),
    }
}
