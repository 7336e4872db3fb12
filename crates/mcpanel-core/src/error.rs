use mcpanel_client::ControlClientError;
use mcpanel_proto::reply_message;
use thiserror::Error;

use crate::gate::GateBlock;
use crate::properties::FormError;
use crate::store::StoreError;

/// Failure of one operator action. Terminal to that action; nothing retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("control server unreachable: {message}")]
    Transport { message: String },
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("server properties unavailable: {reason}")]
    SchemaUnavailable { reason: String },
    #[error(transparent)]
    GateBlocked(#[from] GateBlock),
    #[error(transparent)]
    InvalidTransition(#[from] StoreError),
    #[error(transparent)]
    InvalidEdit(#[from] FormError),
}

impl ActionError {
    pub(crate) fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

impl From<ControlClientError> for ActionError {
    fn from(error: ControlClientError) -> Self {
        match error {
            ControlClientError::Http { status, body } => {
                Self::rejected(status.as_u16(), reply_message(&body))
            }
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}
