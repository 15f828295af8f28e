//! The GraphQL response document shape: `{ "errors": [...], "data": ...,
//! "extensions": {...} }`, plus the `GraphQLError` type appended to during
//! the collect phase. Errors are a plain, append-only `Vec` rather than
//! arena nodes — the arena is reserved for the data tree, matching how
//! this codebase typically keeps its wire-error types as ordinary Rust
//! structs (see `connectors::runtime::errors::RuntimeError`).

use serde::{Deserialize, Serialize};
use serde_json_bytes::Value as JsonValue;

use crate::path::{Path, PathElement};

/// One segment of an error's `path`, either a field name or an array
/// index — exactly the shape GraphQL responses use on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PathSegment {
    Name(String),
    Index(usize),
}

impl From<&PathElement> for PathSegment {
    fn from(value: &PathElement) -> Self {
        match value {
            PathElement::Name(name) => PathSegment::Name(name.as_str().to_string()),
            PathElement::ArrayIndex(index) => PathSegment::Index(*index),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<JsonValue>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>, path: &Path) -> Self {
        let path = if path.is_empty() {
            None
        } else {
            Some(path.elements().iter().map(PathSegment::from).collect())
        };
        Self {
            message: message.into(),
            path,
            extensions: None,
        }
    }

    pub fn with_extensions(mut self, extensions: JsonValue) -> Self {
        self.extensions = Some(extensions);
        self
    }
}

/// Error message builders. Every template here is reproduced exactly as
/// specified — these strings are part of the wire contract.
pub mod messages {
    pub fn object_non_object() -> &'static str {
        "Object cannot represent non-object value."
    }

    pub fn array_non_array() -> &'static str {
        "Array cannot represent non-array value."
    }

    pub fn string_mismatch(value: &str) -> String {
        format!("String cannot represent non-string value: \"{value}\"")
    }

    pub fn bool_mismatch(value: &str) -> String {
        format!("Bool cannot represent non-boolean value: \"{value}\"")
    }

    pub fn int_mismatch(value: &str) -> String {
        format!("Int cannot represent non-integer value: \"{value}\"")
    }

    pub fn float_mismatch(value: &str) -> String {
        format!("Float cannot represent non-float value: \"{value}\"")
    }

    /// `full_path_display` is already rooted, e.g. `Query.me.name`.
    pub fn non_nullable_field_is_null(full_path_display: &str) -> String {
        format!("Cannot return null for non-nullable field {full_path_display}.")
    }

    pub fn unauthorized(path_display: &str, reason: Option<&str>) -> String {
        match reason {
            Some(reason) => format!("Unauthorized to load field '{path_display}', Reason: {reason}."),
            None => format!("Unauthorized to load field '{path_display}'."),
        }
    }
}
