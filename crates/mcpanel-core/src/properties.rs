//! Schema-driven property form.
//!
//! Values are held as typed [`PropertyValue`]s while editing and only turned
//! back into wire strings when a [`ConfigValueSet`] is built. Serialization
//! goes through a [`FormSubmission`], which mirrors what an HTML form would
//! post: unchecked checkboxes are absent rather than `false`.

use std::collections::BTreeMap;

use mcpanel_proto::PropertyValues;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::schema::{ConfigSchema, PropertyDefinition, SchemaError, ValueKind};

/// Raw key/value snapshot as exchanged with the server.
pub type ConfigValueSet = PropertyValues;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(String),
    /// `current` is the raw value the field was rendered from; it is
    /// submitted unchanged when no option is selected.
    Enum {
        selected: Option<String>,
        current: String,
    },
    Text(String),
}

impl PropertyValue {
    /// Builds the edit value for `definition` from the current raw value.
    /// Missing values render as empty.
    #[must_use]
    pub fn from_current(definition: &PropertyDefinition, current: Option<&str>) -> Self {
        let raw = current.unwrap_or_default();
        match definition.value_kind {
            ValueKind::Boolean => Self::Boolean(raw == "true"),
            ValueKind::Integer => Self::Integer(raw.to_string()),
            ValueKind::Enum => Self::Enum {
                selected: definition
                    .enum_options
                    .iter()
                    .find(|option| option.as_str() == raw)
                    .cloned(),
                current: raw.to_string(),
            },
            ValueKind::String => Self::Text(raw.to_string()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Enum { .. } => ValueKind::Enum,
            Self::Text(_) => ValueKind::String,
        }
    }

    /// What the form would post for this field, if anything.
    #[must_use]
    pub fn signal(&self) -> Option<String> {
        match self {
            Self::Boolean(true) => Some("on".to_string()),
            Self::Boolean(false) => None,
            Self::Integer(raw) | Self::Text(raw) => Some(raw.clone()),
            Self::Enum { selected, current } => {
                Some(selected.clone().unwrap_or_else(|| current.clone()))
            }
        }
    }

    #[must_use]
    pub fn widget(&self, definition: &PropertyDefinition) -> Widget {
        match self {
            Self::Boolean(checked) => Widget::Checkbox { checked: *checked },
            Self::Integer(value) => Widget::Number {
                value: value.clone(),
            },
            Self::Enum { selected, .. } => Widget::Select {
                options: definition
                    .enum_options
                    .iter()
                    .map(|option| SelectOption {
                        value: option.clone(),
                        selected: selected.as_deref() == Some(option.as_str()),
                    })
                    .collect(),
            },
            Self::Text(value) => Widget::Text {
                value: value.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Widget {
    Checkbox { checked: bool },
    Number { value: String },
    Select { options: Vec<SelectOption> },
    Text { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedField<'a> {
    pub key: &'a str,
    pub label: &'a str,
    pub description: &'a str,
    pub widget: Widget,
}

/// Posted form fields. Presence is the only signal a checkbox carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    signals: BTreeMap<String, String>,
}

impl FormSubmission {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.signals.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.signals.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.signals.get(key).map(String::as_str)
    }
}

/// Serializes a submission against the schema. Every schema key gets an
/// explicit entry: booleans become `"true"` when any signal is present and
/// `"false"` otherwise; other kinds pass the raw string through (empty when
/// absent). Keys in `carried` that the schema does not know are kept.
#[must_use]
pub fn serialize_submission(
    schema: &ConfigSchema,
    submission: &FormSubmission,
    carried: &ConfigValueSet,
) -> ConfigValueSet {
    let mut values: ConfigValueSet = carried
        .iter()
        .filter(|(key, _)| !schema.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for (key, definition) in schema.iter() {
        let value = match definition.value_kind {
            ValueKind::Boolean => {
                if submission.has(key) {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            }
            ValueKind::Integer | ValueKind::Enum | ValueKind::String => {
                submission.get(key).unwrap_or_default().to_string()
            }
        };
        values.insert(key.to_string(), value);
    }
    values
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("unknown property: {0}")]
    UnknownKey(String),
    #[error("{key} is a {kind} property")]
    WrongKind { key: String, kind: &'static str },
    #[error("{value} is not an option of {key}")]
    NotAnOption { key: String, value: String },
    #[error("{value} is not a boolean for {key}")]
    InvalidBoolean { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyForm {
    schema: ConfigSchema,
    values: Vec<PropertyValue>,
    carried: ConfigValueSet,
    revision: u64,
    saved_revision: u64,
}

impl PropertyForm {
    #[must_use]
    pub fn new(schema: ConfigSchema, current: &ConfigValueSet) -> Self {
        let values = schema
            .iter()
            .map(|(key, definition)| {
                PropertyValue::from_current(definition, current.get(key).map(String::as_str))
            })
            .collect();
        Self {
            schema,
            values,
            carried: current.clone(),
            revision: 0,
            saved_revision: 0,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Bumped by every accepted edit.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn fields(&self) -> impl Iterator<Item = RenderedField<'_>> {
        self.schema
            .iter()
            .zip(&self.values)
            .map(|((key, definition), value)| RenderedField {
                key,
                label: definition.display_label.as_str(),
                description: definition.description.as_str(),
                widget: value.widget(definition),
            })
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<&PropertyValue> {
        self.schema
            .position(key)
            .and_then(|index| self.values.get(index))
    }

    pub fn set_checked(&mut self, key: &str, checked: bool) -> Result<(), FormError> {
        let slot = self.slot_mut(key)?;
        match slot {
            PropertyValue::Boolean(current) => *current = checked,
            other => {
                return Err(FormError::WrongKind {
                    key: key.to_string(),
                    kind: other.kind().as_str(),
                });
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// Sets an integer or string field. Integers are not validated.
    pub fn set_text(&mut self, key: &str, raw: &str) -> Result<(), FormError> {
        let slot = self.slot_mut(key)?;
        match slot {
            PropertyValue::Integer(current) | PropertyValue::Text(current) => {
                *current = raw.to_string();
            }
            other => {
                return Err(FormError::WrongKind {
                    key: key.to_string(),
                    kind: other.kind().as_str(),
                });
            }
        }
        self.revision += 1;
        Ok(())
    }

    pub fn select(&mut self, key: &str, option: &str) -> Result<(), FormError> {
        let is_option = self
            .schema
            .get(key)
            .is_some_and(|definition| definition.enum_options.iter().any(|o| o == option));
        let slot = self.slot_mut(key)?;
        match slot {
            PropertyValue::Enum { selected, .. } => {
                if !is_option {
                    return Err(FormError::NotAnOption {
                        key: key.to_string(),
                        value: option.to_string(),
                    });
                }
                *selected = Some(option.to_string());
            }
            other => {
                return Err(FormError::WrongKind {
                    key: key.to_string(),
                    kind: other.kind().as_str(),
                });
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// Kind-directed edit from free text.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), FormError> {
        let kind = self
            .schema
            .get(key)
            .map(|definition| definition.value_kind)
            .ok_or_else(|| FormError::UnknownKey(key.to_string()))?;
        match kind {
            ValueKind::Boolean => {
                let checked = match raw.trim().to_ascii_lowercase().as_str() {
                    "true" | "on" | "yes" | "1" => true,
                    "false" | "off" | "no" | "0" => false,
                    _ => {
                        return Err(FormError::InvalidBoolean {
                            key: key.to_string(),
                            value: raw.to_string(),
                        });
                    }
                };
                self.set_checked(key, checked)
            }
            ValueKind::Enum => self.select(key, raw),
            ValueKind::Integer | ValueKind::String => self.set_text(key, raw),
        }
    }

    #[must_use]
    pub fn submission(&self) -> FormSubmission {
        let mut submission = FormSubmission::new();
        for ((key, _), value) in self.schema.iter().zip(&self.values) {
            if let Some(signal) = value.signal() {
                submission.insert(key, signal);
            }
        }
        submission
    }

    #[must_use]
    pub fn to_value_set(&self) -> ConfigValueSet {
        serialize_submission(&self.schema, &self.submission(), &self.carried)
    }

    /// Rebases the form on values the server accepted for the edit state at
    /// `revision`. Later edits are kept and the form stays dirty; returns
    /// whether the form was rebuilt.
    pub fn commit(&mut self, saved: &ConfigValueSet, revision: u64) -> bool {
        if revision != self.revision {
            self.carried = saved.clone();
            return false;
        }
        let mut rebuilt = Self::new(self.schema.clone(), saved);
        rebuilt.revision = revision;
        rebuilt.saved_revision = revision;
        *self = rebuilt;
        true
    }

    fn slot_mut(&mut self, key: &str) -> Result<&mut PropertyValue, FormError> {
        self.schema
            .position(key)
            .and_then(|index| self.values.get_mut(index))
            .ok_or_else(|| FormError::UnknownKey(key.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProgress {
    /// Waiting on the other half of the load.
    Waiting,
    Ready,
    /// The renderer was not loading; the input was dropped.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RendererState {
    #[default]
    Idle,
    Loading {
        schema: Option<ConfigSchema>,
        values: Option<ConfigValueSet>,
    },
    Ready(PropertyForm),
    /// Terminal. No retry.
    Unavailable { reason: String },
}

impl RendererState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading { .. } => "loading",
            Self::Ready(_) => "ready",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigRenderer {
    state: RendererState,
}

impl ConfigRenderer {
    #[must_use]
    pub fn state(&self) -> &RendererState {
        &self.state
    }

    #[must_use]
    pub fn form(&self) -> Option<&PropertyForm> {
        match &self.state {
            RendererState::Ready(form) => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut PropertyForm> {
        match &mut self.state {
            RendererState::Ready(form) => Some(form),
            _ => None,
        }
    }

    #[must_use]
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            RendererState::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }

    /// Enters `Loading` from `Idle`. Returns whether fetches should be issued.
    pub fn begin_load(&mut self) -> bool {
        if matches!(self.state, RendererState::Idle) {
            self.state = RendererState::Loading {
                schema: None,
                values: None,
            };
            true
        } else {
            false
        }
    }

    /// Accepts the schema asset. A schema that fails validation makes the
    /// renderer unavailable.
    pub fn accept_schema(&mut self, raw: Value) -> Result<LoadProgress, SchemaError> {
        let RendererState::Loading { schema, .. } = &mut self.state else {
            return Ok(LoadProgress::Ignored);
        };
        match ConfigSchema::from_json(raw) {
            Ok(parsed) => {
                *schema = Some(parsed);
                Ok(self.try_ready())
            }
            Err(error) => {
                self.fail(error.to_string());
                Err(error)
            }
        }
    }

    pub fn accept_values(&mut self, current: ConfigValueSet) -> LoadProgress {
        let RendererState::Loading { values, .. } = &mut self.state else {
            return LoadProgress::Ignored;
        };
        *values = Some(current);
        self.try_ready()
    }

    /// Moves to the terminal `Unavailable` state. Nothing partial is kept.
    pub fn fail(&mut self, reason: String) {
        if matches!(self.state, RendererState::Unavailable { .. }) {
            return;
        }
        warn!(%reason, "property form unavailable");
        self.state = RendererState::Unavailable { reason };
    }

    fn try_ready(&mut self) -> LoadProgress {
        let state = std::mem::take(&mut self.state);
        match state {
            RendererState::Loading {
                schema: Some(schema),
                values: Some(values),
            } => {
                info!(properties = schema.len(), "property form ready");
                self.state = RendererState::Ready(PropertyForm::new(schema, &values));
                LoadProgress::Ready
            }
            other => {
                self.state = other;
                LoadProgress::Waiting
            }
        }
    }
}
