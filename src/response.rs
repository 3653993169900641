//! Bridge reply types and error detection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::Error;

/// Error object the bridge embeds in a reply.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub kind: u16,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

impl From<ApiError> for Error {
    fn from(e: ApiError) -> Self {
        Error::Bridge {
            kind: e.kind,
            address: e.address,
            description: e.description,
        }
    }
}

/// One entry of the reply to `PUT lights/{id}/state`.
///
/// Each entry reports either the attributes that were applied or an error.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SetStateResponse {
    pub success: Option<Map<String, Value>>,
    pub error: Option<ApiError>,
}

impl SetStateResponse {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Returns the first bridge error found in `reply`, if any.
///
/// The bridge reports errors as `[{"error": {...}}]` with a success status
/// code, so every reply has to be checked.
///
/// # Examples
///
/// ```
/// use hue_lights_rs::{Error, bridge_error};
/// use serde_json::json;
///
/// let reply = json!([{"error": {"type": 1, "address": "/", "description": "unauthorized user"}}]);
/// let err = bridge_error(&reply).unwrap();
/// assert_eq!(err.to_string(), "bridge error 1 at /: unauthorized user");
///
/// assert!(bridge_error(&json!({"lights": {"available": 63}})).is_none());
/// ```
pub fn bridge_error(reply: &Value) -> Option<Error> {
    let entries: &[Value] = match reply {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    };
    entries
        .iter()
        .filter_map(|entry| entry.get("error"))
        .find_map(|body| serde_json::from_value::<ApiError>(body.clone()).ok())
        .map(Error::from)
}

/// Returns the first error among `responses`.
pub(crate) fn first_error(responses: &[SetStateResponse]) -> Option<Error> {
    responses
        .iter()
        .find_map(|r| r.error.clone())
        .map(Error::from)
}
