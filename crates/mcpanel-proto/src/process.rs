use std::fmt;

use crate::ConversionError;

/// One of the three supervised processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessId {
    /// The managed game server.
    Primary,
    /// Tunnel exposing the game port (`mc` on the wire).
    TunnelA,
    /// Tunnel exposing the web panel (`web` on the wire).
    TunnelB,
}

impl ProcessId {
    pub const ALL: [Self; 3] = [Self::Primary, Self::TunnelA, Self::TunnelB];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::TunnelA => "tunnel_a",
            Self::TunnelB => "tunnel_b",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Primary => "server",
            Self::TunnelA => "tunnel(mc)",
            Self::TunnelB => "tunnel(web)",
        }
    }

    #[must_use]
    pub const fn tunnel_kind(self) -> Option<TunnelKind> {
        match self {
            Self::Primary => None,
            Self::TunnelA => Some(TunnelKind::Mc),
            Self::TunnelB => Some(TunnelKind::Web),
        }
    }

    /// Accepts the canonical id, the display name, or the tunnel wire type.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "primary" | "server" => Some(Self::Primary),
            "tunnel_a" | "mc" => Some(Self::TunnelA),
            "tunnel_b" | "web" => Some(Self::TunnelB),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tunnel type discriminator used by `ownserver_*` endpoints and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelKind {
    Mc,
    Web,
}

impl TunnelKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mc => "mc",
            Self::Web => "web",
        }
    }

    #[must_use]
    pub const fn process(self) -> ProcessId {
        match self {
            Self::Mc => ProcessId::TunnelA,
            Self::Web => ProcessId::TunnelB,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ConversionError> {
        match raw.trim() {
            "mc" => Ok(Self::Mc),
            "web" => Ok(Self::Web),
            other => Err(ConversionError::UnknownTunnel(other.to_string())),
        }
    }
}

/// Lifecycle status of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessStatus {
    #[default]
    Unknown,
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ProcessStatus {
    /// Wire spelling, matching what the control server emits.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Stopped => "Stopped",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
        }
    }

    #[must_use]
    pub const fn is_transitional(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }

    pub fn parse(raw: &str) -> Result<Self, ConversionError> {
        let trimmed = raw.trim();
        [
            Self::Unknown,
            Self::Stopped,
            Self::Starting,
            Self::Running,
            Self::Stopping,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
        .ok_or_else(|| ConversionError::UnknownStatus(trimmed.to_string()))
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
