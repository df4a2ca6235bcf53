//! WebDriver wire types
//!
//! The subset of the W3C WebDriver payloads this engine exchanges with a
//! vendor driver.

use serde::Deserialize;
use serde_json::Value;

/// The W3C key under which element references travel
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Envelope every WebDriver response arrives in
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub value: Value,
}

/// Error payload carried inside a failed response's `value`
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Extract the element reference from a `value` object
pub fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(|id| id.as_str())
        .map(str::to_string)
}

/// Build the JSON form of an element reference for request arguments
pub fn element_arg(id: &str) -> Value {
    serde_json::json!({ ELEMENT_KEY: id })
}
