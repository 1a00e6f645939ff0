//! HTTP handlers for the resource transport.

pub mod resource;
pub use resource::*;
