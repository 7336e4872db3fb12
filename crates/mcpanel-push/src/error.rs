//! Push channel error types.

use mcpanel_proto::PushDecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("timeout error: {0}")]
    Timeout(String),

    #[error("not connected")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,

    /// A frame arrived that could not be turned into a typed event.
    #[error("undecodable push frame: {0}")]
    Decode(#[from] PushDecodeError),
}

pub type Result<T> = std::result::Result<T, PushError>;
