//! The per-call request context handed to handlers.

use crate::connection::Connection;
use crate::error::{EngineError, ValidationFailure};
use crate::request::cast::{cast_object, cast_param, cast_value, decode_query_value, split_query_key};
use crate::request::upload::{drain_upload, UploadCheck, UploadError, UploadPart, UploadedFile};
use crate::request::Method;
use crate::schema::{code_for_keyword, locate_str, relax_required, schema_type, PropertyError, SchemaValidator};
use futures::Stream;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex};

/// Query parameter carrying the comma-separated requested properties.
pub const PROPS_PARAM: &str = "props";

pub struct RequestContext {
    method: Method,
    path: String,
    params: Map<String, Value>,
    query: BTreeMap<String, String>,
    props: Vec<String>,
    body: Option<Value>,
    schema: Option<Value>,
    errors: Mutex<Vec<PropertyError>>,
    uploads: HashMap<String, Result<UploadedFile, UploadError>>,
    connection: Option<Arc<dyn Connection>>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("query", &self.query)
            .field("props", &self.props)
            .field("body", &self.body)
            .field("uploads", &self.uploads.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RequestContext {
            method,
            path: path.into(),
            params: Map::new(),
            query: BTreeMap::new(),
            props: Vec::new(),
            body: None,
            schema: None,
            errors: Mutex::new(Vec::new()),
            uploads: HashMap::new(),
            connection: None,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path captures and casted query values.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Raw query exactly as received, including `props`.
    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn props(&self) -> &[String] {
        &self.props
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Schema of the matched route, once bound.
    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn set_props(&mut self, props: Vec<String>) {
        self.props = props
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
    }

    pub fn set_query(&mut self, query: BTreeMap<String, String>) {
        self.query = query;
    }

    pub fn set_body(&mut self, body: Option<Value>) {
        self.body = body;
    }

    pub fn set_schema(&mut self, schema: Option<Value>) {
        self.schema = schema;
    }

    pub fn set_connection(&mut self, connection: Arc<dyn Connection>) {
        self.connection = Some(connection);
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Connection for reissuing requests against the same engine.
    pub fn connection(&self) -> Result<Arc<dyn Connection>, EngineError> {
        self.connection
            .clone()
            .ok_or_else(|| EngineError::Internal("request has no connection".into()))
    }

    pub fn errors(&self) -> Vec<PropertyError> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Records a property error, ignoring duplicates of the same (path, code).
    pub fn push_error(&self, error: PropertyError) {
        if let Ok(mut errors) = self.errors.lock() {
            if !errors.iter().any(|e| e.property == error.property && e.code == error.code) {
                errors.push(error);
            }
        }
    }

    /// Records `code` against `property`. Codes of 1000 and up take their name and
    /// message from the property's schema.
    pub fn add_error(&self, property: &str, code: u32) {
        let error = match &self.schema {
            Some(schema) => PropertyError::for_schema(property, code, schema),
            None => PropertyError::from_code(property, code),
        };
        self.push_error(error);
    }

    /// Fails with every recorded property error, if any.
    pub fn check_errors(&self) -> Result<(), EngineError> {
        let errors = self.errors();
        if errors.is_empty() {
            return Ok(());
        }
        Err(EngineError::Validation(ValidationFailure::new(
            format!("{} invalid propert{}", errors.len(), if errors.len() == 1 { "y" } else { "ies" }),
            errors,
        )))
    }

    /// Binds the context to a matched route: casts path captures and query, applies
    /// query defaults, casts and validates the body. Violations accumulate; only a
    /// validator failure returns `Err`.
    pub fn bind(
        &mut self,
        captures: Vec<(String, String)>,
        schema: &Value,
        query_schema: Option<&Value>,
        validator: &dyn SchemaValidator,
    ) -> Result<(), EngineError> {
        self.schema = Some(schema.clone());
        let mut errors = Vec::new();

        self.bind_query(query_schema, &mut errors);

        for (key, raw) in captures {
            let ty = declared_type(schema, &key)
                .or_else(|| query_schema.and_then(|q| declared_type(q, &key)));
            match cast_param(&raw, ty) {
                Some(v) => {
                    self.params.insert(key, v);
                }
                None => {
                    errors.push(PropertyError::from_code(key.clone(), code_for_keyword("type")));
                    self.params.insert(key, Value::String(raw));
                }
            }
        }

        if self.method.carries_body() {
            if let Some(body) = self.body.as_mut() {
                if let Value::Object(map) = body {
                    cast_object(map, schema, "", &mut errors);
                } else {
                    cast_value(body, schema, "", &mut errors);
                }
                let contract = if self.method == Method::Patch {
                    relax_required(schema)
                } else {
                    schema.clone()
                };
                let report = validator.validate(&contract, body)?;
                for v in report.errors {
                    errors.push(PropertyError::from_code(v.path, code_for_keyword(&v.keyword)));
                }
            }
        }

        for e in errors {
            self.push_error(e);
        }
        Ok(())
    }

    fn bind_query(&mut self, query_schema: Option<&Value>, errors: &mut Vec<PropertyError>) {
        let declared = query_schema.and_then(|q| q.get("properties")).and_then(Value::as_object);

        let mut values: Vec<(String, Option<&'static str>, String)> = self
            .query
            .iter()
            .filter(|(k, _)| k.as_str() != PROPS_PARAM)
            .map(|(k, v)| {
                let (base, suffix) = split_query_key(k);
                (base.to_string(), suffix, v.clone())
            })
            .collect();

        if self.method == Method::Get {
            if let Some(declared) = declared {
                values.retain(|(base, _, _)| declared.contains_key(base));
                for (name, prop) in declared {
                    let default = match prop.get("default") {
                        None => continue,
                        Some(Value::String(s)) if s.is_empty() => continue,
                        Some(d) => d,
                    };
                    if !values.iter().any(|(base, _, _)| base == name) {
                        self.params.insert(name.clone(), default.clone());
                    }
                }
            }
        }

        for (base, suffix, raw) in values {
            let Some(mut value) = decode_query_value(&raw, suffix) else {
                errors.push(PropertyError::from_code(base.clone(), code_for_keyword("type")));
                continue;
            };
            if let Some(prop) = declared.and_then(|d| d.get(&base)) {
                cast_value(&mut value, prop, &base, errors);
            }
            self.params.insert(base, value);
        }
    }

    /// Checks and buffers one uploaded part against the `file` leaf for its field.
    /// The outcome is kept for [`RequestContext::upload`]; the stream is always drained.
    pub async fn accept_upload<S, B, E>(&mut self, part: UploadPart, stream: S)
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let check = match self.schema.as_ref() {
            Some(schema) => match locate_str(schema, &part.field) {
                Some(leaf) => UploadCheck::from_schema(part.field.clone(), leaf),
                None => UploadCheck::from_schema(part.field.clone(), &Value::Null),
            },
            None => UploadCheck::unchecked(part.field.clone()),
        };
        let field = part.field.clone();
        let outcome = drain_upload(part, check, stream).await;
        if let Err(e) = &outcome {
            tracing::warn!(%field, error = %e, "upload rejected");
        }
        self.uploads.insert(field, outcome);
    }

    /// The upload received for `field`, or the reason it is unavailable.
    pub fn upload(&self, field: &str) -> Result<&UploadedFile, EngineError> {
        match self.uploads.get(field) {
            Some(Ok(file)) => Ok(file),
            Some(Err(e)) => Err(EngineError::Upload(e.clone())),
            None => Err(EngineError::Upload(UploadError::MissingField(field.to_string()))),
        }
    }

    pub fn upload_fields(&self) -> Vec<&str> {
        self.uploads.keys().map(String::as_str).collect()
    }
}

fn declared_type<'a>(schema: &'a Value, key: &str) -> Option<&'a str> {
    schema.get("properties").and_then(|p| p.get(key)).and_then(schema_type)
}
