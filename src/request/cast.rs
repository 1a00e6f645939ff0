//! Casting raw request values to the types their schema declares.
//!
//! Casting never fails fast: every violation is pushed onto the caller's error list
//! so that one response can report all of them.

use crate::schema::{code_for_keyword, schema_type, PropertyError};
use serde_json::{Map, Number, Value};

/// Casts a scalar to `ty`. Returns `None` when the value cannot represent that type.
/// Unknown types pass the value through unchanged.
pub fn cast_scalar(value: &Value, ty: &str) -> Option<Value> {
    match (ty, value) {
        (_, Value::Null) => Some(Value::Null),
        ("boolean", Value::Bool(_)) => Some(value.clone()),
        ("boolean", Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        ("integer", Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Some(value.clone())
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| Value::Number((f as i64).into()))
            }
        }
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(|n| Value::Number(n.into())),
        ("number" | "float", Value::Number(_)) => Some(value.clone()),
        ("number" | "float", Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        ("string", Value::String(_)) => Some(value.clone()),
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("boolean" | "integer" | "number" | "float" | "string", _) => None,
        _ => Some(value.clone()),
    }
}

/// Casts a raw path or query string by declared type; untyped parameters stay strings.
pub fn cast_param(raw: &str, ty: Option<&str>) -> Option<Value> {
    let raw = Value::String(raw.to_string());
    match ty {
        Some(t @ ("integer" | "number" | "float" | "boolean")) => cast_scalar(&raw, t),
        _ => Some(raw),
    }
}

fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn allows_undeclared(schema: &Value) -> bool {
    match schema.get("properties") {
        None => true,
        Some(_) => matches!(
            schema.get("additionalProperties"),
            Some(Value::Bool(true)) | Some(Value::Object(_))
        ),
    }
}

fn check_enum(value: &Value, schema: &Value, path: &str, errors: &mut Vec<PropertyError>) {
    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(PropertyError::from_code(path, code_for_keyword("enum")));
        }
    }
}

/// Casts `value` in place against `schema`, recursing through objects and arrays.
pub fn cast_value(value: &mut Value, schema: &Value, path: &str, errors: &mut Vec<PropertyError>) {
    let invalid_type = || PropertyError::from_code(path, code_for_keyword("type"));
    match schema_type(schema) {
        Some("object") => match value {
            Value::Object(map) => cast_object(map, schema, path, errors),
            Value::Null => {}
            _ => errors.push(invalid_type()),
        },
        Some("array") => match value {
            Value::Array(items) => {
                let item_schema = schema.get("items").cloned().unwrap_or(Value::Null);
                for (i, item) in items.iter_mut().enumerate() {
                    if item_schema.is_object() {
                        cast_value(item, &item_schema, &child_path(path, &i.to_string()), errors);
                    }
                }
            }
            Value::Null => {}
            _ => errors.push(invalid_type()),
        },
        // Uploads travel outside the body and are checked as streams.
        Some("file") => {}
        Some(ty) => match cast_scalar(value, ty) {
            Some(cast) => *value = cast,
            None => {
                errors.push(invalid_type());
                return;
            }
        },
        None => {}
    }
    check_enum(value, schema, path, errors);
}

/// Casts every key of `map`; keys the schema fragment does not declare are errors.
pub fn cast_object(
    map: &mut Map<String, Value>,
    schema: &Value,
    prefix: &str,
    errors: &mut Vec<PropertyError>,
) {
    let open = allows_undeclared(schema);
    for (key, value) in map.iter_mut() {
        let path = child_path(prefix, key);
        match schema.get("properties").and_then(|p| p.get(key)) {
            Some(prop) => cast_value(value, prop, &path, errors),
            None if open => {}
            None => errors.push(PropertyError::from_code(
                path,
                code_for_keyword("additionalProperties"),
            )),
        }
    }
}

/// Splits a query key into its base name and encoding suffix (`[]` array, `{}` object).
pub(crate) fn split_query_key(key: &str) -> (&str, Option<&'static str>) {
    if let Some(base) = key.strip_suffix("[]") {
        (base, Some("[]"))
    } else if let Some(base) = key.strip_suffix("{}") {
        (base, Some("{}"))
    } else {
        (key, None)
    }
}

/// Decodes a raw query value by its key suffix: `[]` splits on commas, `{}` parses JSON.
pub(crate) fn decode_query_value(raw: &str, suffix: Option<&str>) -> Option<Value> {
    match suffix {
        Some("[]") => Some(Value::Array(
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        Some("{}") => serde_json::from_str::<Value>(raw).ok().filter(Value::is_object),
        _ => Some(Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_cast_by_type() {
        assert_eq!(cast_scalar(&json!("42"), "integer"), Some(json!(42)));
        assert_eq!(cast_scalar(&json!(3.0), "integer"), Some(json!(3)));
        assert_eq!(cast_scalar(&json!(3.5), "integer"), None);
        assert_eq!(cast_scalar(&json!("2.5"), "float"), Some(json!(2.5)));
        assert_eq!(cast_scalar(&json!("abc"), "number"), None);
        assert_eq!(cast_scalar(&json!("TRUE"), "boolean"), Some(json!(true)));
        assert_eq!(cast_scalar(&json!("0"), "boolean"), Some(json!(false)));
        assert_eq!(cast_scalar(&json!("maybe"), "boolean"), None);
        assert_eq!(cast_scalar(&json!(7), "string"), Some(json!("7")));
        assert_eq!(cast_scalar(&json!([1]), "string"), None);
        assert_eq!(cast_scalar(&json!("x"), "custom"), Some(json!("x")));
    }

    #[test]
    fn params_cast_only_when_typed() {
        assert_eq!(cast_param("42", Some("integer")), Some(json!(42)));
        assert_eq!(cast_param("4.2", Some("number")), Some(json!(4.2)));
        assert_eq!(cast_param("x", Some("integer")), None);
        assert_eq!(cast_param("42", None), Some(json!("42")));
        assert_eq!(cast_param("42", Some("string")), Some(json!("42")));
    }

    #[test]
    fn objects_collect_every_violation() {
        let schema = json!({
            "type": "object",
            "properties": {
                "age": { "type": "integer" },
                "active": { "type": "boolean" },
                "role": { "type": "string", "enum": ["admin", "user"] },
                "tags": { "type": "array", "items": { "type": "integer" } },
                "address": {
                    "type": "object",
                    "properties": { "zip": { "type": "integer" } }
                }
            }
        });
        let mut body = json!({
            "age": "31",
            "active": "yes",
            "role": "root",
            "tags": ["1", "x"],
            "address": { "zip": "0150", "planet": "earth" },
            "nickname": "a"
        });
        let mut errors = Vec::new();
        cast_value(&mut body, &schema, "", &mut errors);

        assert_eq!(body["age"], json!(31));
        assert_eq!(body["tags"][0], json!(1));
        assert_eq!(body["address"]["zip"], json!(150));

        let found: Vec<(&str, u32)> = errors.iter().map(|e| (e.property.as_str(), e.code)).collect();
        assert!(found.contains(&("active", 0)));
        assert!(found.contains(&("role", 1)));
        assert!(found.contains(&("tags.1", 0)));
        assert!(found.contains(&("address.planet", 303)));
        assert!(found.contains(&("nickname", 303)));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn free_form_objects_accept_any_key() {
        let schema = json!({ "type": "object" });
        let mut body = json!({ "anything": 1 });
        let mut errors = Vec::new();
        cast_value(&mut body, &schema, "", &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn query_key_suffixes() {
        assert_eq!(split_query_key("tags[]"), ("tags", Some("[]")));
        assert_eq!(split_query_key("filter{}"), ("filter", Some("{}")));
        assert_eq!(split_query_key("q"), ("q", None));
        assert_eq!(decode_query_value("a,b", Some("[]")), Some(json!(["a", "b"])));
        assert_eq!(decode_query_value(r#"{"x":1}"#, Some("{}")), Some(json!({ "x": 1 })));
        assert_eq!(decode_query_value("[1]", Some("{}")), None);
    }
}
