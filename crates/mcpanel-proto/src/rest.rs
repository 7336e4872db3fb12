use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConversionError;

pub const STATUS_STARTED: &str = "Started";
pub const STATUS_SUCCESS: &str = "Success";

/// Raw `server.properties` snapshot, key to string value.
pub type PropertyValues = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub xmx: String,
    pub xms: String,
    pub world_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickCommandRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JarPathRequest {
    pub jar_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JarPathResponse {
    #[serde(default)]
    pub jar_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelStatusResponse {
    pub mc: String,
    pub web: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackupsResponse {
    #[serde(default)]
    pub backups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCreatedResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Generic `{status, message}` acknowledgement. Every field is optional
/// because endpoints disagree on which ones they fill.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AckResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckResponse {
    #[must_use]
    pub fn status_is(&self, expected: &str) -> bool {
        self.status.as_deref() == Some(expected)
    }

    /// Most specific human-readable text in the reply.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        [&self.message, &self.error, &self.status]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|text| !text.is_empty())
    }
}

/// Converts a properties JSON object into string values. Scalars are
/// stringified, `null` becomes the empty string.
pub fn property_values_from_json(value: Value) -> Result<PropertyValues, ConversionError> {
    let Value::Object(map) = value else {
        return Err(ConversionError::InvalidValue {
            message: "properties",
            field: "<root>",
            reason: "expected JSON object".to_string(),
        });
    };

    let mut values = PropertyValues::new();
    for (key, raw) in map {
        let text = match raw {
            Value::String(text) => text,
            Value::Null => String::new(),
            Value::Bool(flag) => flag.to_string(),
            Value::Number(number) => number.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ConversionError::InvalidValue {
                    message: "properties",
                    field: "<value>",
                    reason: format!("{key} is not a scalar"),
                });
            }
        };
        values.insert(key, text);
    }
    Ok(values)
}

/// Extracts the server's own wording from an error body, verbatim. Falls
/// back to the raw body when it is not a recognizable JSON reply.
#[must_use]
pub fn reply_message(body: &str) -> String {
    let trimmed = body.trim();
    serde_json::from_str::<AckResponse>(trimmed)
        .ok()
        .and_then(|ack| ack.summary().map(str::to_string))
        .unwrap_or_else(|| trimmed.to_string())
}
