//! Schema validation of successfully received payloads.
//!
//! A [`Schema`] narrows a raw JSON payload to its declared shape or reports every violated
//! sub-path. [`validate`] turns those violations into an [`Error::Validation`]. Schema
//! mismatches are contract problems, so the client never retries them.
//!
//! Three kinds of schema are available out of the box:
//!
//! - [`ObjectSchema`] / [`FieldKind`]: declarative field-type checks that collect every
//!   violation in one pass.
//! - [`Typed<T>`]: deserialization into any `T: DeserializeOwned`, optionally preceded by a
//!   shape check.
//! - any closure `Fn(&Value) -> Result<T, Vec<Violation>>`.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

/// A single violated sub-path of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted path of the offending value (`owner.name`, `risks[2].score`), empty for the root.
    pub path: String,
    /// What was wrong with it.
    pub message: String,
}

impl Violation {
    /// Creates a violation at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a type-mismatch violation (`expected number, got string`).
    pub fn mismatch(path: impl Into<String>, expected: &str, found: &Value) -> Self {
        Self::new(
            path,
            format!("expected {}, got {}", expected, json_type_name(found)),
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "response: {}", self.message)
        } else {
            write!(f, "field {}: {}", self.path, self.message)
        }
    }
}

/// A contract a received payload must satisfy.
///
/// # Examples
///
/// ```
/// use pmo_client::validate::{Schema, Violation};
/// use serde_json::{json, Value};
///
/// struct NonEmptyList;
///
/// impl Schema for NonEmptyList {
///     type Output = Vec<Value>;
///
///     fn parse(&self, payload: &Value) -> Result<Self::Output, Vec<Violation>> {
///         match payload.as_array() {
///             Some(items) if !items.is_empty() => Ok(items.clone()),
///             Some(_) => Err(vec![Violation::new("", "must not be empty")]),
///             None => Err(vec![Violation::mismatch("", "array", payload)]),
///         }
///     }
/// }
///
/// assert!(NonEmptyList.parse(&json!([1])).is_ok());
/// assert!(NonEmptyList.parse(&json!([])).is_err());
/// ```
pub trait Schema {
    /// The narrowed value produced on success.
    type Output;

    /// Narrows `payload` or returns every violation found.
    fn parse(&self, payload: &Value) -> std::result::Result<Self::Output, Vec<Violation>>;
}

impl<F, T> Schema for F
where
    F: Fn(&Value) -> std::result::Result<T, Vec<Violation>>,
{
    type Output = T;

    fn parse(&self, payload: &Value) -> std::result::Result<T, Vec<Violation>> {
        self(payload)
    }
}

/// Applies `schema` to `payload`, mapping violations to [`Error::Validation`].
pub fn validate<S>(payload: &Value, schema: &S) -> Result<S::Output>
where
    S: Schema + ?Sized,
{
    schema.parse(payload).map_err(|details| {
        let message = match details.as_slice() {
            [only] => only.to_string(),
            _ => format!(
                "Response failed schema validation with {} violations",
                details.len()
            ),
        };
        Error::validation(message, details)
    })
}

/// Parses a raw 2xx body as JSON. An empty body reads as `null`.
pub(crate) fn parse_body(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw).map_err(|e| {
        Error::validation(
            "Response body is not valid JSON",
            vec![Violation::new("", e.to_string())],
        )
        .with_cause(e)
    })
}

/// Deserializes a raw 2xx body into `T`. An empty body reads as `null`.
pub(crate) fn decode_body<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let result = if raw.trim().is_empty() {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_str(raw)
    };
    result.map_err(|e| {
        Error::validation(
            format!("Failed to deserialize response: {}", e),
            vec![Violation::new("", e.to_string())],
        )
        .with_cause(e)
    })
}

/// The expected type of a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Any value.
    Any,
    /// `null`.
    Null,
    /// `true` / `false`.
    Boolean,
    /// Any JSON number.
    Number,
    /// A number without a fractional part.
    Integer,
    /// A JSON string.
    String,
    /// An array with elements of any type.
    Array,
    /// An array whose every element matches the inner kind.
    ArrayOf(Box<FieldKind>),
    /// An object matching the given field declarations.
    Object(ObjectSchema),
    /// `null` or the inner kind.
    Nullable(Box<FieldKind>),
}

impl FieldKind {
    /// Shorthand for [`FieldKind::ArrayOf`].
    pub fn array_of(kind: impl Into<FieldKind>) -> Self {
        FieldKind::ArrayOf(Box::new(kind.into()))
    }

    /// Shorthand for [`FieldKind::Nullable`].
    pub fn nullable(kind: impl Into<FieldKind>) -> Self {
        FieldKind::Nullable(Box::new(kind.into()))
    }

    fn name(&self) -> String {
        match self {
            FieldKind::Any => "any".to_string(),
            FieldKind::Null => "null".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::Integer => "integer".to_string(),
            FieldKind::String => "string".to_string(),
            FieldKind::Array | FieldKind::ArrayOf(_) => "array".to_string(),
            FieldKind::Object(_) => "object".to_string(),
            FieldKind::Nullable(inner) => format!("{} or null", inner.name()),
        }
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<Violation>) {
        match (self, value) {
            (FieldKind::Any, _)
            | (FieldKind::Null, Value::Null)
            | (FieldKind::Boolean, Value::Bool(_))
            | (FieldKind::Number, Value::Number(_))
            | (FieldKind::String, Value::String(_))
            | (FieldKind::Array, Value::Array(_)) => {}
            (FieldKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {}
            (FieldKind::Nullable(_), Value::Null) => {}
            (FieldKind::Nullable(inner), _) => inner.check(value, path, out),
            (FieldKind::ArrayOf(inner), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.check(item, &format!("{}[{}]", path, i), out);
                }
            }
            (FieldKind::Object(schema), Value::Object(_)) => schema.check(value, path, out),
            _ => out.push(Violation::mismatch(path, &self.name(), value)),
        }
    }
}

impl From<ObjectSchema> for FieldKind {
    fn from(schema: ObjectSchema) -> Self {
        FieldKind::Object(schema)
    }
}

impl Schema for FieldKind {
    type Output = Value;

    fn parse(&self, payload: &Value) -> std::result::Result<Value, Vec<Violation>> {
        let mut violations = Vec::new();
        self.check(payload, "", &mut violations);
        if violations.is_empty() {
            Ok(payload.clone())
        } else {
            Err(violations)
        }
    }
}

/// Declarative shape of a JSON object.
///
/// Unknown fields are accepted. Every declared field is checked and all violations are
/// reported together.
///
/// # Examples
///
/// ```
/// use pmo_client::validate::{FieldKind, ObjectSchema, Schema};
/// use serde_json::json;
///
/// let project = ObjectSchema::new()
///     .field("id", FieldKind::String)
///     .field("budget", FieldKind::Number)
///     .optional("closed_at", FieldKind::String);
///
/// let violations = project
///     .parse(&json!({ "id": "PRJ-1", "budget": "lots" }))
///     .unwrap_err();
///
/// assert_eq!(violations.len(), 1);
/// assert_eq!(violations[0].to_string(), "field budget: expected number, got string");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    fields: Vec<FieldRule>,
}

#[derive(Debug, Clone, PartialEq)]
struct FieldRule {
    name: String,
    kind: FieldKind,
    required: bool,
}

impl ObjectSchema {
    /// Creates a schema with no declared fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required field.
    pub fn field(mut self, name: impl Into<String>, kind: impl Into<FieldKind>) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            kind: kind.into(),
            required: true,
        });
        self
    }

    /// Declares a field that may be absent or `null`.
    pub fn optional(mut self, name: impl Into<String>, kind: impl Into<FieldKind>) -> Self {
        self.fields.push(FieldRule {
            name: name.into(),
            kind: kind.into(),
            required: false,
        });
        self
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<Violation>) {
        let Some(map) = value.as_object() else {
            out.push(Violation::mismatch(path, "object", value));
            return;
        };

        for rule in &self.fields {
            let field_path = if path.is_empty() {
                rule.name.clone()
            } else {
                format!("{}.{}", path, rule.name)
            };

            match map.get(&rule.name) {
                None if rule.required => out.push(Violation::new(field_path, "is required")),
                None => {}
                Some(Value::Null) if !rule.required => {}
                Some(field) => rule.kind.check(field, &field_path, out),
            }
        }
    }
}

impl Schema for ObjectSchema {
    type Output = Value;

    fn parse(&self, payload: &Value) -> std::result::Result<Value, Vec<Violation>> {
        let mut violations = Vec::new();
        self.check(payload, "", &mut violations);
        if violations.is_empty() {
            Ok(payload.clone())
        } else {
            Err(violations)
        }
    }
}

/// Narrows a payload into a concrete `T` through `serde`.
///
/// With a shape attached, the shape check runs first so callers see every offending field
/// rather than only the first one serde trips on.
pub struct Typed<T> {
    shape: Option<FieldKind>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Typed<T> {
    /// Deserialization only.
    pub fn new() -> Self {
        Self {
            shape: None,
            _marker: PhantomData,
        }
    }

    /// Shape check, then deserialization.
    pub fn with_shape(shape: impl Into<FieldKind>) -> Self {
        Self {
            shape: Some(shape.into()),
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typed")
            .field("target", &std::any::type_name::<T>())
            .field("shape", &self.shape)
            .finish()
    }
}

impl<T: DeserializeOwned> Schema for Typed<T> {
    type Output = T;

    fn parse(&self, payload: &Value) -> std::result::Result<T, Vec<Violation>> {
        if let Some(shape) = &self.shape {
            shape.parse(payload)?;
        }
        T::deserialize(payload).map_err(|e| vec![Violation::new("", e.to_string())])
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn project_schema() -> ObjectSchema {
        ObjectSchema::new()
            .field("id", FieldKind::String)
            .field("name", FieldKind::String)
            .field("budget", FieldKind::Number)
            .optional("owner", ObjectSchema::new().field("email", FieldKind::String))
            .optional("risks", FieldKind::array_of(ObjectSchema::new().field("score", FieldKind::Integer)))
    }

    #[test]
    fn test_valid_payload_passes_through() {
        let payload = json!({ "id": "PRJ-1", "name": "Apollo", "budget": 1200.5, "extra": true });
        let value = validate(&payload, &project_schema()).unwrap();
        assert_eq!(value, payload);
    }

    #[test]
    fn test_collects_every_violation() {
        let payload = json!({
            "id": 7,
            "budget": "high",
            "owner": { "email": null },
            "risks": [{ "score": 3 }, { "score": 2.5 }]
        });

        let violations = project_schema().parse(&payload).unwrap_err();
        let rendered: Vec<String> = violations.iter().map(|v| v.to_string()).collect();

        assert_eq!(
            rendered,
            vec![
                "field id: expected string, got number",
                "field name: is required",
                "field budget: expected number, got string",
                "field owner.email: expected string, got null",
                "field risks[1].score: expected integer, got number",
            ]
        );
    }

    #[test]
    fn test_optional_fields_accept_null_and_absence() {
        let schema = ObjectSchema::new().optional("closed_at", FieldKind::String);
        assert!(schema.parse(&json!({})).is_ok());
        assert!(schema.parse(&json!({ "closed_at": null })).is_ok());
        assert!(schema.parse(&json!({ "closed_at": 5 })).is_err());
    }

    #[test]
    fn test_root_mismatch() {
        let violations = project_schema().parse(&json!([1, 2])).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "");
        assert_eq!(violations[0].to_string(), "response: expected object, got array");
    }

    #[test]
    fn test_nullable_kind() {
        let kind = FieldKind::nullable(FieldKind::Integer);
        assert!(kind.parse(&json!(null)).is_ok());
        assert!(kind.parse(&json!(4)).is_ok());
        let violations = kind.parse(&json!("4")).unwrap_err();
        assert_eq!(violations[0].message, "expected integer, got string");
    }

    #[test]
    fn test_validate_builds_validation_error() {
        let err = validate(&json!({ "id": "PRJ-1", "name": 1, "budget": 1 }), &project_schema())
            .unwrap_err();

        match err {
            Error::Validation {
                field,
                details,
                message,
                ..
            } => {
                assert_eq!(field.as_deref(), Some("name"));
                assert_eq!(details.len(), 1);
                assert_eq!(message, "field name: expected string, got number");
            }
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Project {
        id: String,
        budget: f64,
    }

    #[test]
    fn test_typed_schema() {
        let schema = Typed::<Project>::new();
        let project = schema.parse(&json!({ "id": "PRJ-1", "budget": 10 })).unwrap();
        assert_eq!(project, Project { id: "PRJ-1".into(), budget: 10.0 });

        let violations = schema.parse(&json!({ "id": "PRJ-1" })).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("budget"));
    }

    #[test]
    fn test_typed_schema_with_shape_reports_all_fields() {
        let schema = Typed::<Project>::with_shape(
            ObjectSchema::new()
                .field("id", FieldKind::String)
                .field("budget", FieldKind::Number),
        );
        let violations = schema.parse(&json!({ "id": 1, "budget": "x" })).unwrap_err();
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn test_closure_schema() {
        let positive = |payload: &Value| match payload.as_i64() {
            Some(n) if n > 0 => Ok(n),
            _ => Err(vec![Violation::new("", "must be a positive integer")]),
        };
        assert_eq!(validate(&json!(3), &positive).unwrap(), 3);
        assert!(validate(&json!(-3), &positive).unwrap_err().is_validation());
    }

    #[test]
    fn test_decode_body() {
        let project: Project = decode_body(r#"{"id":"PRJ-2","budget":1}"#).unwrap();
        assert_eq!(project.id, "PRJ-2");

        let unit: Option<Project> = decode_body("").unwrap();
        assert!(unit.is_none());

        let err = decode_body::<Project>("invalid json").unwrap_err();
        assert!(err.is_validation());

        assert_eq!(parse_body("  ").unwrap(), Value::Null);
        assert!(parse_body("{").unwrap_err().is_validation());
    }
}
