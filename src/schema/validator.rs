//! Validator boundary: whole-document schema conformance.

use crate::error::EngineError;
use jsonschema::error::ValidationErrorKind;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A single violation: dotted property path, the JSON-Schema keyword that failed, and a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub keyword: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<Violation>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        ValidationReport {
            valid: true,
            errors: Vec::new(),
        }
    }
}

pub trait SchemaValidator: Send + Sync {
    fn validate(&self, schema: &Value, value: &Value) -> Result<ValidationReport, EngineError>;
}

/// Default validator backed by the `jsonschema` crate. Compiled schemas are cached
/// by their normalized text; clones share the cache.
#[derive(Clone, Default)]
pub struct JsonSchemaValidator {
    compiled: Arc<Mutex<HashMap<String, Arc<jsonschema::Validator>>>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(&self, schema: &Value) -> Result<Arc<jsonschema::Validator>, EngineError> {
        let normalized = normalize(schema);
        let key = normalized.to_string();
        let mut compiled = self
            .compiled
            .lock()
            .map_err(|_| EngineError::Internal("schema cache lock poisoned".into()))?;
        if let Some(found) = compiled.get(&key) {
            return Ok(found.clone());
        }
        let validator = jsonschema::validator_for(&normalized)
            .map_err(|e| EngineError::InvalidSchema(e.to_string()))?;
        let validator = Arc::new(validator);
        compiled.insert(key, validator.clone());
        Ok(validator)
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.compiled.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, value: &Value) -> Result<ValidationReport, EngineError> {
        let validator = self.compile(schema)?;
        let mut errors = Vec::new();
        for e in validator.iter_errors(value) {
            let base = pointer_to_property(&e.instance_path.to_string());
            let message = e.to_string();
            match &e.kind {
                ValidationErrorKind::Required { property } => {
                    let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
                    errors.push(Violation {
                        path: join_property(&base, &name),
                        keyword: "required".into(),
                        message,
                    });
                }
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    for name in unexpected {
                        errors.push(Violation {
                            path: join_property(&base, name),
                            keyword: "additionalProperties".into(),
                            message: message.clone(),
                        });
                    }
                }
                _ => {
                    let schema_path = e.schema_path.to_string();
                    let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_string();
                    errors.push(Violation {
                        path: base,
                        keyword,
                        message,
                    });
                }
            }
        }
        Ok(ValidationReport {
            valid: errors.is_empty(),
            errors,
        })
    }
}

fn join_property(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

/// `/items/0/foo` -> `items.0.foo`.
pub fn pointer_to_property(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

/// Rewrites engine-only leaf types into standard JSON-Schema: `float` becomes `number`,
/// `file` leaves lose their type constraint (uploads are checked separately).
pub fn normalize(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                if k == "type" {
                    match normalize_type(v) {
                        Some(t) => {
                            out.insert(k.clone(), t);
                        }
                        None => continue,
                    }
                } else {
                    out.insert(k.clone(), normalize(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

fn normalize_type(t: &Value) -> Option<Value> {
    match t {
        Value::String(s) if s == "file" => None,
        Value::String(s) if s == "float" => Some(Value::String("number".into())),
        Value::Array(types) => {
            let kept: Vec<Value> = types.iter().filter_map(normalize_type).collect();
            if kept.len() < types.len() {
                // A union that admits files cannot be constrained by type.
                None
            } else {
                Some(Value::Array(kept))
            }
        }
        other => Some(other.clone()),
    }
}

/// Drops every `required` list so that partial documents (PATCH bodies, projected
/// results) are validated only on the properties they carry.
pub fn relax_required(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, v)| !(k.as_str() == "required" && v.is_array()))
                .map(|(k, v)| (k.clone(), relax_required(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(relax_required).collect()),
        other => other.clone(),
    }
}
