mod request;

use std::time::Duration;

use async_trait::async_trait;
use mcpanel_proto::{
    AckResponse, BackupCreatedResponse, BackupsResponse, CommandRequest, JarPathRequest,
    JarPathResponse, PropertyValues, QuickCommandRequest, RestoreRequest, StartRequest,
    StatusResponse, TunnelKind, TunnelStatusResponse, property_values_from_json,
};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub use request::{ControlReply, ControlRequest, ControlTransport, HttpMethod};

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SCHEMA_PATH: &str = "/static/server_properties_jp.json";

#[derive(Debug, Clone)]
pub struct ControlClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub schema_path: String,
}

impl ControlClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            schema_path: DEFAULT_SCHEMA_PATH.to_string(),
        }
    }
}

/// Single-attempt HTTP client. Failures are returned to the caller as-is;
/// nothing here retries.
#[derive(Debug, Clone)]
pub struct ControlClient {
    base_url: String,
    schema_path: String,
    timeout: Duration,
    http: reqwest::Client,
}

#[derive(Debug, Error)]
pub enum ControlClientError {
    #[error("control_client_base_url_missing")]
    BaseUrlMissing,
    #[error("control_client_invalid_path")]
    InvalidPath,
    #[error("control_request_failed:{message}")]
    Request { message: String },
    #[error("control_read_failed:{message}")]
    Read { message: String },
    #[error("control_http_{status}:{body}")]
    Http { status: StatusCode, body: String },
    #[error("control_json_decode_failed:{message}")]
    Decode { message: String },
}

impl ControlClient {
    pub fn new(config: ControlClientConfig) -> Result<Self, ControlClientError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            schema_path: config.schema_path,
            timeout: Duration::from_millis(config.timeout_ms.max(250)),
            http: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    #[must_use]
    pub fn status_path() -> &'static str {
        "/api/status"
    }

    #[must_use]
    pub fn start_path() -> &'static str {
        "/api/start"
    }

    #[must_use]
    pub fn stop_path() -> &'static str {
        "/api/stop"
    }

    #[must_use]
    pub fn command_path() -> &'static str {
        "/api/command"
    }

    #[must_use]
    pub fn quick_command_path() -> &'static str {
        "/api/quick_command"
    }

    #[must_use]
    pub fn tunnel_status_path() -> &'static str {
        "/api/ownserver/status"
    }

    #[must_use]
    pub fn tunnel_start_path(kind: TunnelKind) -> String {
        format!("/api/ownserver/{}/start", kind.as_str())
    }

    #[must_use]
    pub fn tunnel_stop_path(kind: TunnelKind) -> String {
        format!("/api/ownserver/{}/stop", kind.as_str())
    }

    #[must_use]
    pub fn backups_path() -> &'static str {
        "/api/backups"
    }

    #[must_use]
    pub fn backup_create_path() -> &'static str {
        "/api/backups/create"
    }

    #[must_use]
    pub fn backup_restore_path() -> &'static str {
        "/api/backups/restore"
    }

    #[must_use]
    pub fn config_path() -> &'static str {
        "/api/config"
    }

    #[must_use]
    pub fn properties_path() -> &'static str {
        "/api/properties"
    }

    #[must_use]
    pub fn stop_all_path() -> &'static str {
        "/api/stop_all"
    }

    #[must_use]
    pub fn schema_path(&self) -> &str {
        &self.schema_path
    }

    pub async fn status(&self) -> Result<StatusResponse, ControlClientError> {
        self.get_json(Self::status_path()).await
    }

    pub async fn tunnel_status(&self) -> Result<TunnelStatusResponse, ControlClientError> {
        self.get_json(Self::tunnel_status_path()).await
    }

    pub async fn start(&self, request: &StartRequest) -> Result<AckResponse, ControlClientError> {
        self.post_json(Self::start_path(), request).await
    }

    pub async fn stop(&self) -> Result<AckResponse, ControlClientError> {
        self.post_empty(Self::stop_path()).await
    }

    pub async fn start_tunnel(&self, kind: TunnelKind) -> Result<AckResponse, ControlClientError> {
        self.post_empty(Self::tunnel_start_path(kind).as_str())
            .await
    }

    pub async fn stop_tunnel(&self, kind: TunnelKind) -> Result<AckResponse, ControlClientError> {
        self.post_empty(Self::tunnel_stop_path(kind).as_str())
            .await
    }

    pub async fn send_command(
        &self,
        request: &CommandRequest,
    ) -> Result<AckResponse, ControlClientError> {
        self.post_json(Self::command_path(), request).await
    }

    pub async fn quick_command(
        &self,
        request: &QuickCommandRequest,
    ) -> Result<AckResponse, ControlClientError> {
        self.post_json(Self::quick_command_path(), request).await
    }

    pub async fn list_backups(&self) -> Result<BackupsResponse, ControlClientError> {
        self.get_json(Self::backups_path()).await
    }

    pub async fn create_backup(&self) -> Result<BackupCreatedResponse, ControlClientError> {
        self.post_empty(Self::backup_create_path()).await
    }

    pub async fn restore_backup(
        &self,
        request: &RestoreRequest,
    ) -> Result<AckResponse, ControlClientError> {
        self.post_json(Self::backup_restore_path(), request).await
    }

    pub async fn jar_path(&self) -> Result<JarPathResponse, ControlClientError> {
        self.get_json(Self::config_path()).await
    }

    pub async fn set_jar_path(
        &self,
        request: &JarPathRequest,
    ) -> Result<AckResponse, ControlClientError> {
        self.post_json(Self::config_path(), request).await
    }

    pub async fn properties(&self) -> Result<PropertyValues, ControlClientError> {
        let raw: serde_json::Value = self.get_json(Self::properties_path()).await?;
        property_values_from_json(raw).map_err(|error| ControlClientError::Decode {
            message: error.to_string(),
        })
    }

    pub async fn save_properties(
        &self,
        values: &PropertyValues,
    ) -> Result<AckResponse, ControlClientError> {
        self.post_json(Self::properties_path(), values).await
    }

    /// Fetches the property schema asset. Left undecoded so the caller owns
    /// schema validation.
    pub async fn schema(&self) -> Result<serde_json::Value, ControlClientError> {
        self.get_json(self.schema_path.as_str()).await
    }

    pub async fn stop_all(&self) -> Result<AckResponse, ControlClientError> {
        self.post_empty(Self::stop_all_path()).await
    }

    pub async fn get_json<T>(&self, path: &str) -> Result<T, ControlClientError>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(ControlClientError::InvalidPath)?;
        let response = self
            .http
            .get(url.as_str())
            .header("x-request-id", request_id())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| ControlClientError::Request {
                message: error.to_string(),
            })?;
        decode_json_response(response).await
    }

    pub async fn post_json<Req, Res>(
        &self,
        path: &str,
        payload: &Req,
    ) -> Result<Res, ControlClientError>
    where
        Req: Serialize + ?Sized,
        Res: for<'de> serde::Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(ControlClientError::InvalidPath)?;
        let response = self
            .http
            .post(url.as_str())
            .header("x-request-id", request_id())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|error| ControlClientError::Request {
                message: error.to_string(),
            })?;
        decode_json_response(response).await
    }

    async fn post_empty<Res>(&self, path: &str) -> Result<Res, ControlClientError>
    where
        Res: for<'de> serde::Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(ControlClientError::InvalidPath)?;
        let response = self
            .http
            .post(url.as_str())
            .header("x-request-id", request_id())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| ControlClientError::Request {
                message: error.to_string(),
            })?;
        decode_json_response(response).await
    }
}

#[async_trait]
impl ControlTransport for ControlClient {
    async fn execute(&self, request: &ControlRequest) -> Result<ControlReply, ControlClientError> {
        debug!(request = request.label(), "control request");
        match request {
            ControlRequest::Status => self.status().await.map(ControlReply::Status),
            ControlRequest::TunnelStatus => {
                self.tunnel_status().await.map(ControlReply::TunnelStatus)
            }
            ControlRequest::Start(body) => self.start(body).await.map(ControlReply::Ack),
            ControlRequest::Stop => self.stop().await.map(ControlReply::Ack),
            ControlRequest::StartTunnel(kind) => {
                self.start_tunnel(*kind).await.map(ControlReply::Ack)
            }
            ControlRequest::StopTunnel(kind) => self.stop_tunnel(*kind).await.map(ControlReply::Ack),
            ControlRequest::Command(body) => self.send_command(body).await.map(ControlReply::Ack),
            ControlRequest::QuickCommand(body) => {
                self.quick_command(body).await.map(ControlReply::Ack)
            }
            ControlRequest::ListBackups => self.list_backups().await.map(ControlReply::Backups),
            ControlRequest::CreateBackup => {
                self.create_backup().await.map(ControlReply::BackupCreated)
            }
            ControlRequest::RestoreBackup(body) => {
                self.restore_backup(body).await.map(ControlReply::Ack)
            }
            ControlRequest::GetJarPath => self.jar_path().await.map(ControlReply::JarPath),
            ControlRequest::SetJarPath(body) => self.set_jar_path(body).await.map(ControlReply::Ack),
            ControlRequest::GetProperties => self.properties().await.map(ControlReply::Properties),
            ControlRequest::SaveProperties(values) => {
                self.save_properties(values).await.map(ControlReply::Ack)
            }
            ControlRequest::FetchSchema => self.schema().await.map(ControlReply::Schema),
            ControlRequest::StopAll => self.stop_all().await.map(ControlReply::Ack),
        }
    }
}

pub fn format_http_error(status: StatusCode, body: &[u8]) -> ControlClientError {
    let body = non_empty_string(String::from_utf8_lossy(body).to_string())
        .unwrap_or_else(|| "<empty>".to_string());
    ControlClientError::Http { status, body }
}

fn request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

fn normalize_base_url(base_url: &str) -> Result<String, ControlClientError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(ControlClientError::BaseUrlMissing);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

async fn decode_json_response<T>(response: reqwest::Response) -> Result<T, ControlClientError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| ControlClientError::Read {
            message: error.to_string(),
        })?;

    if !status.is_success() {
        return Err(format_http_error(status, &bytes));
    }

    serde_json::from_slice::<T>(&bytes).map_err(|error| ControlClientError::Decode {
        message: error.to_string(),
    })
}

fn non_empty_string(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
