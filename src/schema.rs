//! Structural validation of reasoning-service output
//!
//! Schemas are plain JSON-schema documents. The same document is exported
//! into prompts (so the model knows the shape to produce) and checked here
//! once the response comes back. Only the subset of keywords the capability
//! and UI-block schemas use is supported: `type`, `const`, `enum`,
//! `required`, `properties`, `additionalProperties: false` and `items`.
//!
//! Closed schemas describe the shape to the model. Replies are passed
//! through `retain_declared` before validation, so undeclared keys are
//! stripped rather than rejected.

use serde_json::{json, Value};
use thiserror::Error;

/// A value did not conform to its declared schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validate `value` against `schema`. A `null` schema accepts anything.
pub fn validate(value: &Value, schema: &Value) -> Result<(), SchemaViolation> {
    if schema.is_null() {
        return Ok(());
    }
    validate_at(value, schema, "$")
}

/// Drop object fields the schema does not declare, recursing into declared
/// properties and array items. Anything else passes through unchanged.
pub fn retain_declared(value: Value, schema: &Value) -> Value {
    match value {
        Value::Object(map) => match schema.get("properties").and_then(Value::as_object) {
            Some(properties) => Value::Object(
                map.into_iter()
                    .filter_map(|(key, child)| {
                        let child_schema = properties.get(&key)?;
                        let child = retain_declared(child, child_schema);
                        Some((key, child))
                    })
                    .collect(),
            ),
            None => Value::Object(map),
        },
        Value::Array(items) => match schema.get("items") {
            Some(item_schema) => Value::Array(
                items
                    .into_iter()
                    .map(|item| retain_declared(item, item_schema))
                    .collect(),
            ),
            None => Value::Array(items),
        },
        other => other,
    }
}

/// Does the schema declare any object properties?
pub fn declares_properties(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| !props.is_empty())
        .unwrap_or(false)
}

/// Build a closed object schema where every listed property is required.
pub fn object_schema(properties: &[(&str, &str)]) -> Value {
    let props: serde_json::Map<String, Value> = properties
        .iter()
        .map(|(name, ty)| (name.to_string(), json!({ "type": ty })))
        .collect();
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();

    json!({
        "type": "object",
        "properties": props,
        "required": required,
        "additionalProperties": false
    })
}

/// `{ <field>: string[] }`, the shape of every selection response.
pub fn string_list_schema(field: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            field: { "type": "array", "items": { "type": "string" } }
        },
        "required": [field]
    })
}

fn validate_at(value: &Value, schema: &Value, path: &str) -> Result<(), SchemaViolation> {
    let schema_obj = schema
        .as_object()
        .ok_or_else(|| SchemaViolation::new(path, "schema must be an object"))?;

    if let Some(type_spec) = schema_obj.get("type") {
        check_type(value, type_spec, path)?;
    }

    if let Some(constant) = schema_obj.get("const") {
        if value != constant {
            return Err(SchemaViolation::new(path, format!("expected const {}", constant)));
        }
    }

    if let Some(variants) = schema_obj.get("enum").and_then(Value::as_array) {
        if !variants.iter().any(|candidate| candidate == value) {
            return Err(SchemaViolation::new(path, "not one of the allowed enum values"));
        }
    }

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        let object = value
            .as_object()
            .ok_or_else(|| SchemaViolation::new(path, "must be an object for required fields"))?;
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(SchemaViolation::new(
                    path,
                    format!("missing required field '{}'", key),
                ));
            }
        }
    }

    if let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) {
        let object = value.as_object().ok_or_else(|| {
            SchemaViolation::new(path, "must be an object for properties validation")
        })?;

        for (key, property_schema) in properties {
            if let Some(child) = object.get(key) {
                validate_at(child, property_schema, &format!("{}.{}", path, key))?;
            }
        }

        if schema_obj.get("additionalProperties").and_then(Value::as_bool) == Some(false) {
            if let Some(unknown) = object.keys().find(|key| !properties.contains_key(*key)) {
                return Err(SchemaViolation::new(
                    path,
                    format!("contains unknown field '{}'", unknown),
                ));
            }
        }
    }

    if let Some(item_schema) = schema_obj.get("items") {
        let items = value
            .as_array()
            .ok_or_else(|| SchemaViolation::new(path, "must be an array for items validation"))?;
        for (index, item) in items.iter().enumerate() {
            validate_at(item, item_schema, &format!("{}[{}]", path, index))?;
        }
    }

    Ok(())
}

fn check_type(value: &Value, type_spec: &Value, path: &str) -> Result<(), SchemaViolation> {
    let matches = |t: &str| match t {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => false,
    };

    match type_spec {
        Value::String(type_name) if matches(type_name) => Ok(()),
        Value::String(type_name) => Err(SchemaViolation::new(
            path,
            format!("expected type '{}'", type_name),
        )),
        Value::Array(types) => {
            if types.iter().filter_map(Value::as_str).any(matches) {
                Ok(())
            } else {
                Err(SchemaViolation::new(path, "did not match any allowed types"))
            }
        }
        _ => Err(SchemaViolation::new(path, "schema.type must be string or array")),
    }
}
