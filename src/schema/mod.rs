//! Schema helpers: property locator, validation code table, and the validator boundary.

mod codes;
mod locate;
mod validator;

pub use codes::{code_for_keyword, lookup_code, ErrorCode, PropertyError, CUSTOM_CODE_START};
pub use locate::{locate, locate_str, schema_type};
pub use validator::{
    normalize, pointer_to_property, relax_required, JsonSchemaValidator, SchemaValidator,
    ValidationReport, Violation,
};
