//! Push-channel frames.
//!
//! Each websocket text frame carries one JSON object:
//! `{"event": "<name>", "data": {...}, "emitted_at": "<RFC3339>"}` where
//! `emitted_at` is optional. `connected`/`disconnected` never travel on the
//! wire; the channel synthesizes them from the socket lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::{ConversionError, ProcessId, ProcessStatus, TunnelKind};

pub const EVENT_STATUS_UPDATE: &str = "status_update";
pub const EVENT_CONSOLE_OUTPUT: &str = "console_output";
pub const EVENT_TUNNEL_STATUS_UPDATE: &str = "ownserver_status_update";
pub const EVENT_TUNNEL_LOG: &str = "ownserver_log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitted_at: Option<DateTime<Utc>>,
}

/// Authoritative status report for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub process: ProcessId,
    pub status: ProcessStatus,
    pub emitted_at: Option<DateTime<Utc>>,
}

impl StatusReport {
    #[must_use]
    pub fn new(process: ProcessId, status: ProcessStatus) -> Self {
        Self {
            process,
            status,
            emitted_at: None,
        }
    }

    #[must_use]
    pub fn emitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.emitted_at = Some(at);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub process: ProcessId,
    pub text: String,
}

/// Typed push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Connected,
    Disconnected,
    Status(StatusReport),
    Log(LogLine),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushDecodeError {
    #[error("push frame is not valid JSON: {0}")]
    Json(String),
    #[error("unknown push event: {0}")]
    UnknownEvent(String),
    #[error("push event {event} missing field {field}")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Decodes one text frame into a typed event.
pub fn decode_push_frame(text: &str) -> Result<PushEvent, PushDecodeError> {
    let frame: PushFrame =
        serde_json::from_str(text).map_err(|error| PushDecodeError::Json(error.to_string()))?;

    match frame.event.as_str() {
        EVENT_STATUS_UPDATE => {
            let status = string_field(&frame.data, EVENT_STATUS_UPDATE, "status")?;
            Ok(PushEvent::Status(StatusReport {
                process: ProcessId::Primary,
                status: ProcessStatus::parse(status)?,
                emitted_at: frame.emitted_at,
            }))
        }
        EVENT_CONSOLE_OUTPUT => {
            let text = string_field(&frame.data, EVENT_CONSOLE_OUTPUT, "log")?;
            Ok(PushEvent::Log(LogLine {
                process: ProcessId::Primary,
                text: line_text(text),
            }))
        }
        EVENT_TUNNEL_STATUS_UPDATE => {
            let kind = string_field(&frame.data, EVENT_TUNNEL_STATUS_UPDATE, "type")?;
            let status = string_field(&frame.data, EVENT_TUNNEL_STATUS_UPDATE, "status")?;
            Ok(PushEvent::Status(StatusReport {
                process: TunnelKind::parse(kind)?.process(),
                status: ProcessStatus::parse(status)?,
                emitted_at: frame.emitted_at,
            }))
        }
        EVENT_TUNNEL_LOG => {
            let kind = string_field(&frame.data, EVENT_TUNNEL_LOG, "type")?;
            let text = string_field(&frame.data, EVENT_TUNNEL_LOG, "log")?;
            Ok(PushEvent::Log(LogLine {
                process: TunnelKind::parse(kind)?.process(),
                text: line_text(text),
            }))
        }
        other => Err(PushDecodeError::UnknownEvent(other.to_string())),
    }
}

impl PushFrame {
    /// Wire frame for an event. Lifecycle events have no wire form.
    #[must_use]
    pub fn from_event(event: &PushEvent) -> Option<Self> {
        match event {
            PushEvent::Connected | PushEvent::Disconnected => None,
            PushEvent::Status(report) => {
                let (name, data) = match report.process.tunnel_kind() {
                    None => (
                        EVENT_STATUS_UPDATE,
                        json!({"status": report.status.as_str()}),
                    ),
                    Some(kind) => (
                        EVENT_TUNNEL_STATUS_UPDATE,
                        json!({"type": kind.as_str(), "status": report.status.as_str()}),
                    ),
                };
                Some(Self {
                    event: name.to_string(),
                    data,
                    emitted_at: report.emitted_at,
                })
            }
            PushEvent::Log(line) => {
                let (name, data) = match line.process.tunnel_kind() {
                    None => (EVENT_CONSOLE_OUTPUT, json!({"log": line.text})),
                    Some(kind) => (
                        EVENT_TUNNEL_LOG,
                        json!({"type": kind.as_str(), "log": line.text}),
                    ),
                };
                Some(Self {
                    event: name.to_string(),
                    data,
                    emitted_at: None,
                })
            }
        }
    }
}

/// Drops the one line terminator the server appends; everything else is
/// operator content.
fn line_text(text: &str) -> String {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text).to_string()
}

fn string_field<'a>(
    data: &'a Value,
    event: &'static str,
    field: &'static str,
) -> Result<&'a str, PushDecodeError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or(PushDecodeError::MissingField { event, field })
}
