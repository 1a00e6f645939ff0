//! Stable validation code table.
//!
//! Codes are grouped by keyword family: 0-99 generic, 100s numbers, 200s strings,
//! 300s objects, 400s arrays, 500s formats and custom keywords. Codes from
//! [`CUSTOM_CODE_START`] up are declared per property in the schema's `errors` map.

use crate::schema::locate_str;
use serde::Serialize;
use serde_json::Value;

pub const CUSTOM_CODE_START: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: u32,
    pub name: &'static str,
    pub message: &'static str,
}

const TABLE: &[(&str, ErrorCode)] = &[
    ("type", ErrorCode { code: 0, name: "INVALID_TYPE", message: "Invalid type" }),
    ("enum", ErrorCode { code: 1, name: "ENUM_MISMATCH", message: "No enum match" }),
    ("anyOf", ErrorCode { code: 10, name: "ANY_OF_MISSING", message: "Data does not match any schemas from \"anyOf\"" }),
    ("oneOf", ErrorCode { code: 11, name: "ONE_OF_MISSING", message: "Data does not match any schemas from \"oneOf\"" }),
    ("not", ErrorCode { code: 13, name: "NOT_PASSED", message: "Data matches schema from \"not\"" }),
    ("multipleOf", ErrorCode { code: 100, name: "NUMBER_MULTIPLE_OF", message: "Value is not a multiple of the required divisor" }),
    ("minimum", ErrorCode { code: 101, name: "NUMBER_MINIMUM", message: "Value is less than minimum" }),
    ("exclusiveMinimum", ErrorCode { code: 102, name: "NUMBER_MINIMUM_EXCLUSIVE", message: "Value is equal to exclusive minimum" }),
    ("maximum", ErrorCode { code: 103, name: "NUMBER_MAXIMUM", message: "Value is greater than maximum" }),
    ("exclusiveMaximum", ErrorCode { code: 104, name: "NUMBER_MAXIMUM_EXCLUSIVE", message: "Value is equal to exclusive maximum" }),
    ("minLength", ErrorCode { code: 200, name: "STRING_LENGTH_SHORT", message: "String is too short" }),
    ("maxLength", ErrorCode { code: 201, name: "STRING_LENGTH_LONG", message: "String is too long" }),
    ("pattern", ErrorCode { code: 202, name: "STRING_PATTERN", message: "String does not match pattern" }),
    ("minProperties", ErrorCode { code: 300, name: "OBJECT_PROPERTIES_MINIMUM", message: "Too few properties defined" }),
    ("maxProperties", ErrorCode { code: 301, name: "OBJECT_PROPERTIES_MAXIMUM", message: "Too many properties defined" }),
    ("required", ErrorCode { code: 302, name: "OBJECT_REQUIRED", message: "Missing required property" }),
    ("additionalProperties", ErrorCode { code: 303, name: "OBJECT_ADDITIONAL_PROPERTIES", message: "Additional properties not allowed" }),
    ("dependencies", ErrorCode { code: 304, name: "OBJECT_DEPENDENCY_KEY", message: "Dependency failed" }),
    ("minItems", ErrorCode { code: 400, name: "ARRAY_LENGTH_SHORT", message: "Array is too short" }),
    ("maxItems", ErrorCode { code: 401, name: "ARRAY_LENGTH_LONG", message: "Array is too long" }),
    ("uniqueItems", ErrorCode { code: 402, name: "ARRAY_UNIQUE", message: "Array items are not unique" }),
    ("additionalItems", ErrorCode { code: 403, name: "ARRAY_ADDITIONAL_ITEMS", message: "Additional items not allowed" }),
    ("format", ErrorCode { code: 500, name: "FORMAT_CUSTOM", message: "Format validation failed" }),
    ("$keyword", ErrorCode { code: 501, name: "KEYWORD_CUSTOM", message: "Keyword failed" }),
];

const KEYWORD_CUSTOM: u32 = 501;

pub fn code_for_keyword(keyword: &str) -> u32 {
    TABLE
        .iter()
        .find(|(k, _)| *k == keyword)
        .map(|(_, c)| c.code)
        .unwrap_or(KEYWORD_CUSTOM)
}

pub fn lookup_code(code: u32) -> Option<&'static ErrorCode> {
    TABLE.iter().map(|(_, c)| c).find(|c| c.code == code)
}

/// One property-level violation as reported to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropertyError {
    pub property: String,
    pub code: u32,
    pub name: String,
    pub message: String,
}

impl PropertyError {
    pub fn new(
        property: impl Into<String>,
        code: u32,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        PropertyError {
            property: property.into(),
            code,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Error from the global table; unknown codes fall back to the custom-keyword entry.
    pub fn from_code(property: impl Into<String>, code: u32) -> Self {
        let entry = lookup_code(code)
            .or_else(|| lookup_code(KEYWORD_CUSTOM))
            .copied()
            .unwrap_or(ErrorCode {
                code,
                name: "KEYWORD_CUSTOM",
                message: "Keyword failed",
            });
        PropertyError::new(property, code, entry.name, entry.message)
    }

    /// Resolves name and message for `code`. Custom codes are read from the target
    /// property's `errors` map, e.g. `{"errors": {"1001": {"name": "TAKEN", "message": "..."}}}`
    /// (a bare string value is taken as the message).
    pub fn for_schema(property: impl Into<String>, code: u32, schema: &Value) -> Self {
        let property = property.into();
        if code < CUSTOM_CODE_START {
            return PropertyError::from_code(property, code);
        }
        let declared = locate_str(schema, &property)
            .and_then(|s| s.get("errors"))
            .and_then(|e| e.get(code.to_string()));
        match declared {
            Some(Value::String(message)) => {
                PropertyError::new(property, code, "CUSTOM_ERROR", message.clone())
            }
            Some(Value::Object(entry)) => {
                let name = entry.get("name").and_then(Value::as_str).unwrap_or("CUSTOM_ERROR");
                let message = entry
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Custom error");
                PropertyError::new(property, code, name, message)
            }
            _ => PropertyError::new(property, code, "CUSTOM_ERROR", format!("Custom error {}", code)),
        }
    }
}
