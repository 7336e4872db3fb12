//! Push transport for control-server events.
//!
//! A single websocket connection delivering typed status and log events.
//! Socket lifecycle is surfaced in-band as `Connected`/`Disconnected` so the
//! consumer sees one ordered stream.

pub mod channel;
pub mod error;

pub use channel::{ChannelConfig, ConnectionState, PushChannel, PushItem, ReconnectPolicy};
pub use error::{PushError, Result};
