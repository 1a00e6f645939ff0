//! Find the sub-schema describing a (possibly nested) property.

use crate::path::PropPath;
use serde_json::Value;

/// Declared `type` of a schema node, when it is a single string.
pub fn schema_type(schema: &Value) -> Option<&str> {
    schema.get("type").and_then(Value::as_str)
}

pub fn locate_str<'a>(schema: &'a Value, path: &str) -> Option<&'a Value> {
    locate(schema, &PropPath::parse(path))
}

/// Walks `schema` along `path`. `@` descends into `properties[key].items`, `.` descends
/// into an object-typed property; anything else is not found.
pub fn locate<'a>(schema: &'a Value, path: &PropPath) -> Option<&'a Value> {
    let head = path.head()?;
    if head.key.is_empty() {
        // Bare leading `@`: the schema itself describes an array.
        let items = schema.get("items")?;
        let rest = path.strip_leading_pluck();
        return if rest.is_empty() {
            Some(items)
        } else {
            locate(items, &rest)
        };
    }
    let prop = schema.get("properties")?.get(&head.key)?;
    if path.is_flat() {
        return Some(prop);
    }
    if head.pluck {
        let items = prop.get("items")?;
        let rest = path.tail().strip_leading_pluck();
        return if rest.is_empty() {
            Some(items)
        } else {
            locate(items, &rest)
        };
    }
    if schema_type(prop) == Some("object") {
        return locate(prop, &path.tail());
    }
    None
}
