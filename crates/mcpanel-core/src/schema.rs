//! Property schema.
//!
//! The schema asset maps each `server.properties` key to
//! `{"type", "options"?, "jp"?, "desc"?}`. Key order is display order.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Integer,
    Enum,
    String,
}

impl ValueKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Enum => "enum",
            Self::String => "string",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Some(Self::Boolean),
            "integer" | "int" | "number" => Some(Self::Integer),
            "enum" | "select" => Some(Self::Enum),
            "string" | "text" => Some(Self::String),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    pub value_kind: ValueKind,
    pub enum_options: Vec<String>,
    pub display_label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema root must be a JSON object")]
    NotAnObject,
    #[error("schema entry {key} is malformed: {message}")]
    MalformedEntry { key: String, message: String },
    #[error("enum property {key} declares no options")]
    EmptyEnum { key: String },
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default, alias = "label")]
    jp: Option<String>,
    #[serde(default, alias = "description")]
    desc: Option<String>,
}

/// Ordered, immutable property schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigSchema {
    entries: Vec<(String, PropertyDefinition)>,
}

impl ConfigSchema {
    /// Parses the schema asset. A missing or unrecognized `type` renders as
    /// a string; an enum without options rejects the whole schema.
    pub fn from_json(value: Value) -> Result<Self, SchemaError> {
        let Value::Object(map) = value else {
            return Err(SchemaError::NotAnObject);
        };

        let mut entries = Vec::with_capacity(map.len());
        for (key, raw) in map {
            let raw: RawDefinition =
                serde_json::from_value(raw).map_err(|error| SchemaError::MalformedEntry {
                    key: key.clone(),
                    message: error.to_string(),
                })?;

            let value_kind = match raw.kind.as_deref() {
                None => ValueKind::String,
                Some(kind) => ValueKind::parse(kind).unwrap_or_else(|| {
                    warn!(key = %key, kind, "unknown property type, rendering as string");
                    ValueKind::String
                }),
            };
            if value_kind == ValueKind::Enum && raw.options.is_empty() {
                return Err(SchemaError::EmptyEnum { key });
            }

            let display_label = raw
                .jp
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| key.clone());
            entries.push((
                key,
                PropertyDefinition {
                    value_kind,
                    enum_options: raw.options,
                    display_label,
                    description: raw.desc.unwrap_or_default(),
                },
            ));
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyDefinition> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyDefinition)> {
        self.entries
            .iter()
            .map(|(key, definition)| (key.as_str(), definition))
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn keeps_asset_order_and_labels() -> Result<(), SchemaError> {
        let schema = ConfigSchema::from_json(json!({
            "motd": {"type": "string", "jp": "メッセージ", "desc": "shown in the server list"},
            "pvp": {"type": "boolean", "label": "PvP"},
            "difficulty": {"type": "enum", "options": ["peaceful", "easy", "normal", "hard"]},
            "max-players": {"type": "integer"}
        }))?;

        let keys = schema.iter().map(|(key, _)| key).collect::<Vec<_>>();
        assert_eq!(keys, vec!["motd", "pvp", "difficulty", "max-players"]);
        let motd = schema.get("motd");
        assert_eq!(motd.map(|d| d.display_label.as_str()), Some("メッセージ"));
        assert_eq!(
            motd.map(|d| d.description.as_str()),
            Some("shown in the server list")
        );
        assert_eq!(
            schema.get("pvp").map(|d| d.display_label.as_str()),
            Some("PvP")
        );
        assert_eq!(
            schema.get("max-players").map(|d| d.display_label.as_str()),
            Some("max-players")
        );
        assert_eq!(
            schema.get("difficulty").map(|d| d.value_kind),
            Some(ValueKind::Enum)
        );
        Ok(())
    }

    #[test]
    fn unknown_type_fails_open_to_string() -> Result<(), SchemaError> {
        let schema = ConfigSchema::from_json(json!({
            "level-seed": {"type": "seed"},
            "level-name": {}
        }))?;
        assert_eq!(
            schema.get("level-seed").map(|d| d.value_kind),
            Some(ValueKind::String)
        );
        assert_eq!(
            schema.get("level-name").map(|d| d.value_kind),
            Some(ValueKind::String)
        );
        Ok(())
    }

    #[test]
    fn rejects_invalid_schemas() {
        assert_eq!(
            ConfigSchema::from_json(json!(["pvp"])),
            Err(SchemaError::NotAnObject)
        );
        assert_eq!(
            ConfigSchema::from_json(json!({"gamemode": {"type": "enum", "options": []}})),
            Err(SchemaError::EmptyEnum {
                key: "gamemode".to_string()
            })
        );
        assert!(matches!(
            ConfigSchema::from_json(json!({"pvp": "boolean"})),
            Err(SchemaError::MalformedEntry { .. })
        ));
    }
}
