//! Checking wire payloads against the data model.
//!
//! All validation lives in the `Deserialize` impls of the model types; this
//! module is the single place where raw JSON is turned into those types, so
//! that failures surface uniformly as [`ModelError::Validation`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::message::{Message, MessagePart};

/// Parse an already-decoded JSON value into `T`.
pub fn parse<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| invalid::<T>(&e))
}

/// Parse a JSON document into `T`.
///
/// Syntax errors are reported as [`ModelError::Json`]; a well-formed
/// document that does not match the model is a validation error.
pub fn parse_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| match e.classify() {
        serde_json::error::Category::Syntax | serde_json::error::Category::Eof => {
            ModelError::Json(e)
        }
        _ => invalid::<T>(&e),
    })
}

/// Whether `value` validates as `T`.
pub fn is_valid<T: DeserializeOwned>(value: &Value) -> bool {
    T::deserialize(value).is_ok()
}

/// Whether `value` validates as a [`Message`].
pub fn is_message(value: &Value) -> bool {
    is_valid::<Message>(value)
}

/// Whether `value` validates as a [`MessagePart`].
pub fn is_message_part(value: &Value) -> bool {
    is_valid::<MessagePart>(value)
}

fn invalid<T>(err: &serde_json::Error) -> ModelError {
    ModelError::validation(format!("invalid {}: {err}", short_type_name::<T>()))
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Strip module paths but keep generic arguments readable.
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}
