//! Control-plane wire contracts.
//!
//! This crate owns the JSON shapes exchanged with the game-server control
//! server: REST request/response bodies, push frames, and the typed process
//! identities and statuses they convert into. It intentionally keeps wire
//! types apart from the richer client-side state in `mcpanel-core`.

pub mod process;
pub mod push;
pub mod rest;

use thiserror::Error;

pub use process::{ProcessId, ProcessStatus, TunnelKind};
pub use push::{LogLine, PushDecodeError, PushEvent, PushFrame, StatusReport, decode_push_frame};
pub use rest::{
    AckResponse, BackupCreatedResponse, BackupsResponse, CommandRequest, JarPathRequest,
    JarPathResponse, PropertyValues, QuickCommandRequest, RestoreRequest, STATUS_STARTED,
    STATUS_SUCCESS, StartRequest, StatusResponse, TunnelStatusResponse, property_values_from_json,
    reply_message,
};

/// Conversion failures from wire-level strings into typed values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("unknown process status: {0}")]
    UnknownStatus(String),
    #[error("unknown tunnel type: {0}")]
    UnknownTunnel(String),
    #[error("{message}.{field} has invalid value: {reason}")]
    InvalidValue {
        message: &'static str,
        field: &'static str,
        reason: String,
    },
}
