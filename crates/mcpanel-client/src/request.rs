use async_trait::async_trait;
use mcpanel_proto::{
    AckResponse, BackupCreatedResponse, BackupsResponse, CommandRequest, JarPathRequest,
    JarPathResponse, PropertyValues, QuickCommandRequest, RestoreRequest, StartRequest,
    StatusResponse, TunnelKind, TunnelStatusResponse,
};

use crate::ControlClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Every call the control API accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Status,
    TunnelStatus,
    Start(StartRequest),
    Stop,
    StartTunnel(TunnelKind),
    StopTunnel(TunnelKind),
    Command(CommandRequest),
    QuickCommand(QuickCommandRequest),
    ListBackups,
    CreateBackup,
    RestoreBackup(RestoreRequest),
    GetJarPath,
    SetJarPath(JarPathRequest),
    GetProperties,
    SaveProperties(PropertyValues),
    FetchSchema,
    StopAll,
}

impl ControlRequest {
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        match self {
            Self::Status
            | Self::TunnelStatus
            | Self::ListBackups
            | Self::GetJarPath
            | Self::GetProperties
            | Self::FetchSchema => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::TunnelStatus => "tunnel_status",
            Self::Start(_) => "start",
            Self::Stop => "stop",
            Self::StartTunnel(_) => "tunnel_start",
            Self::StopTunnel(_) => "tunnel_stop",
            Self::Command(_) => "command",
            Self::QuickCommand(_) => "quick_command",
            Self::ListBackups => "list_backups",
            Self::CreateBackup => "create_backup",
            Self::RestoreBackup(_) => "restore_backup",
            Self::GetJarPath => "get_jar_path",
            Self::SetJarPath(_) => "set_jar_path",
            Self::GetProperties => "get_properties",
            Self::SaveProperties(_) => "save_properties",
            Self::FetchSchema => "fetch_schema",
            Self::StopAll => "stop_all",
        }
    }

    /// Whether the request may discard data or end sessions.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        match self {
            Self::RestoreBackup(_) | Self::StopAll => true,
            Self::QuickCommand(request) => request.action == "ban",
            _ => false,
        }
    }
}

/// Decoded reply, one variant per response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlReply {
    Status(StatusResponse),
    TunnelStatus(TunnelStatusResponse),
    Ack(AckResponse),
    Backups(BackupsResponse),
    BackupCreated(BackupCreatedResponse),
    JarPath(JarPathResponse),
    Properties(PropertyValues),
    Schema(serde_json::Value),
}

/// Seam between session logic and the wire.
#[async_trait]
pub trait ControlTransport: Send + Sync {
    async fn execute(&self, request: &ControlRequest) -> Result<ControlReply, ControlClientError>;
}
