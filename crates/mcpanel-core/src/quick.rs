use std::fmt;

use mcpanel_proto::QuickCommandRequest;

/// Canned server commands exposed as one-click actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuickAction {
    Op,
    Deop,
    Kick,
    Ban,
    Pardon,
    TimeDay,
    TimeNight,
    WeatherClear,
    WeatherRain,
}

impl QuickAction {
    pub const ALL: [Self; 9] = [
        Self::Op,
        Self::Deop,
        Self::Kick,
        Self::Ban,
        Self::Pardon,
        Self::TimeDay,
        Self::TimeNight,
        Self::WeatherClear,
        Self::WeatherRain,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Op => "op",
            Self::Deop => "deop",
            Self::Kick => "kick",
            Self::Ban => "ban",
            Self::Pardon => "pardon",
            Self::TimeDay => "time_day",
            Self::TimeNight => "time_night",
            Self::WeatherClear => "weather_clear",
            Self::WeatherRain => "weather_rain",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
    }

    #[must_use]
    pub const fn requires_player(self) -> bool {
        matches!(
            self,
            Self::Op | Self::Deop | Self::Kick | Self::Ban | Self::Pardon
        )
    }

    /// Ban is the only quick action that goes through the confirmation gate.
    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::Ban)
    }

    pub(crate) fn request(self, player: Option<String>) -> QuickCommandRequest {
        QuickCommandRequest {
            action: self.as_str().to_string(),
            player: if self.requires_player() { player } else { None },
        }
    }
}

impl fmt::Display for QuickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
