//! Property projection ("pluck"): keep only the requested paths of a value.
//!
//! Keys starting with [`META_SIGIL`] always survive. Values tagged with `$link` are
//! opaque and returned untouched. A path that cannot be satisfied does not panic or
//! return `Err`: the result is an inline `{ "$error": ..., "$missing": [...] }` document,
//! see [`is_pluck_error`] and [`missing_paths`].

use crate::path::PropPath;
use serde_json::{json, Map, Value};

pub const META_SIGIL: char = '$';
pub const LINK_KEY: &str = "$link";
pub const ERROR_KEY: &str = "$error";
pub const MISSING_KEY: &str = "$missing";

pub fn is_meta_key(key: &str) -> bool {
    key.starts_with(META_SIGIL)
}

pub fn is_link(value: &Value) -> bool {
    value.get(LINK_KEY).is_some()
}

pub fn is_pluck_error(value: &Value) -> bool {
    value.get(ERROR_KEY).is_some()
}

/// Paths named by a pluck error, empty for anything else.
pub fn missing_paths(value: &Value) -> Vec<String> {
    value
        .get(MISSING_KEY)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Projects `value` onto `props`. An empty list returns the value unchanged.
pub fn pluck<S: AsRef<str>>(value: &Value, props: &[S]) -> Value {
    if props.is_empty() {
        return value.clone();
    }
    let paths = PropPath::parse_all(props);
    if paths.is_empty() {
        return value.clone();
    }
    match pluck_paths(value, &paths) {
        Ok(v) => v,
        Err(missing) => missing_error(missing),
    }
}

fn missing_error(missing: Vec<String>) -> Value {
    json!({
        ERROR_KEY: format!("missing properties: {}", missing.join(", ")),
        MISSING_KEY: missing,
    })
}

/// Core recursion. Always pares down: an empty list here selects nothing but metadata.
fn pluck_paths(value: &Value, paths: &[PropPath]) -> Result<Value, Vec<String>> {
    if is_link(value) {
        return Ok(value.clone());
    }
    match value {
        Value::Array(items) => {
            let reduced: Vec<PropPath> = paths.iter().map(PropPath::strip_leading_pluck).collect();
            // Paths that only addressed the items themselves (`@`) select whole items.
            if reduced.iter().any(PropPath::is_empty) {
                return Ok(value.clone());
            }
            let mut out = Vec::with_capacity(items.len());
            let mut missing: Vec<String> = Vec::new();
            for item in items {
                match pluck_paths(item, &reduced) {
                    Ok(v) => out.push(v),
                    Err(m) => {
                        for p in m {
                            if !missing.contains(&p) {
                                missing.push(p);
                            }
                        }
                    }
                }
            }
            if missing.is_empty() {
                Ok(Value::Array(out))
            } else {
                Err(missing.into_iter().map(|p| format!("@{}", p)).collect())
            }
        }
        Value::Object(map) => pluck_object(map, paths),
        // Scalars have no properties to select.
        _ => Err(paths.iter().map(PropPath::to_string).collect()),
    }
}

fn pluck_object(map: &Map<String, Value>, paths: &[PropPath]) -> Result<Value, Vec<String>> {
    let mut out = Map::new();
    for (k, v) in map {
        if is_meta_key(k) {
            out.insert(k.clone(), v.clone());
        }
    }

    let mut missing: Vec<String> = Vec::new();
    // Grouped in first-seen order so output and error listings are stable.
    let mut nested: Vec<(String, Vec<PropPath>)> = Vec::new();
    for path in paths {
        let Some(head) = path.head() else { continue };
        if head.key.is_empty() {
            // `@` applied to an object cannot be satisfied.
            missing.push(path.to_string());
            continue;
        }
        if path.is_flat() {
            match map.get(&head.key) {
                Some(v) => {
                    out.insert(head.key.clone(), v.clone());
                }
                None => missing.push(head.key.clone()),
            }
            continue;
        }
        match nested.iter_mut().find(|(k, _)| *k == head.key) {
            Some((_, rest)) => rest.push(path.tail()),
            None => nested.push((head.key.clone(), vec![path.tail()])),
        }
    }

    for (key, rest) in nested {
        if is_meta_key(&key) {
            // Metadata was copied whole above.
            continue;
        }
        if out.contains_key(&key) {
            // Requested whole as well as nested: the whole value wins.
            continue;
        }
        let Some(child) = map.get(&key) else {
            missing.push(key);
            continue;
        };
        match pluck_paths(child, &rest) {
            Ok(v) => {
                out.insert(key, v);
            }
            Err(m) => missing.extend(m.into_iter().map(|p| join(&key, &p))),
        }
    }

    if missing.is_empty() {
        Ok(Value::Object(out))
    } else {
        Err(missing)
    }
}

fn join(key: &str, rest: &str) -> String {
    if rest.starts_with('@') {
        format!("{}{}", key, rest)
    } else {
        format!("{}.{}", key, rest)
    }
}

/// True when `value` carries `path` all the way down. Arrays must carry the
/// remainder on every item.
pub fn has_path(value: &Value, path: &PropPath) -> bool {
    let Some(head) = path.head() else {
        return true;
    };
    if head.key.is_empty() {
        return match value {
            Value::Array(items) => {
                let rest = path.strip_leading_pluck();
                items.iter().all(|item| has_path(item, &rest))
            }
            _ => false,
        };
    }
    match value.get(&head.key) {
        Some(child) => has_path(child, &path.tail()),
        None => false,
    }
}

pub fn has_all<S: AsRef<str>>(value: &Value, props: &[S]) -> bool {
    props.iter().all(|p| has_path(value, &PropPath::parse(p.as_ref())))
}
