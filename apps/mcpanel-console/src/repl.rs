//! Operator command line grammar.

use clap::{Parser, Subcommand, ValueEnum};
use mcpanel_core::Consequence;
use mcpanel_proto::{ProcessId, TunnelKind};

#[derive(Debug, Parser)]
#[command(
    name = "mcpanel",
    no_binary_name = true,
    disable_version_flag = true,
    help_template = "{subcommands}"
)]
pub struct ReplLine {
    #[command(subcommand)]
    pub command: ConsoleCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TunnelArg {
    Mc,
    Web,
}

impl TunnelArg {
    pub const fn kind(self) -> TunnelKind {
        match self {
            Self::Mc => TunnelKind::Mc,
            Self::Web => TunnelKind::Web,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TunnelAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProcessArg {
    Server,
    Mc,
    Web,
}

impl ProcessArg {
    pub const fn process(self) -> ProcessId {
        match self {
            Self::Server => ProcessId::Primary,
            Self::Mc => ProcessId::TunnelA,
            Self::Web => ProcessId::TunnelB,
        }
    }
}

/// What the operator accepts by confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConsequenceArg {
    #[value(name = "world_discarded")]
    WorldDiscarded,
    #[value(name = "player_banned")]
    PlayerBanned,
    #[value(name = "all_services_stopped")]
    AllServicesStopped,
}

impl ConsequenceArg {
    pub const fn consequence(self) -> Consequence {
        match self {
            Self::WorldDiscarded => Consequence::WorldDiscarded,
            Self::PlayerBanned => Consequence::PlayerBanned,
            Self::AllServicesStopped => Consequence::AllServicesStopped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ConsoleCommand {
    /// Start the game server
    Start {
        /// Maximum heap in GB
        #[arg(long, default_value_t = 2)]
        xmx: u32,
        /// Initial heap in GB
        #[arg(long, default_value_t = 1)]
        xms: u32,
        #[arg(long, default_value = "default")]
        world: String,
    },
    /// Stop the game server
    Stop,
    /// Start or stop a tunnel
    Tunnel {
        #[arg(value_enum)]
        kind: TunnelArg,
        #[arg(value_enum)]
        action: TunnelAction,
    },
    /// Send a raw server command
    Cmd {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Broadcast a chat message
    Say {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Run a canned action (op, deop, kick, ban, pardon, time_day, ...)
    Quick { action: String, player: Option<String> },
    /// List backups
    Backups,
    /// Create a backup
    Backup,
    /// Restore a backup (asks for confirmation)
    Restore { file: String },
    /// Load and show server.properties
    Props,
    /// Edit one property
    Set {
        key: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Tick a boolean property
    Check { key: String },
    /// Untick a boolean property
    Uncheck { key: String },
    /// Save edited properties
    SaveProps,
    /// Show or set the server jar path
    Jar { path: Option<String> },
    /// Stop every service and the control server (asks for confirmation)
    Shutdown,
    /// Confirm the pending action by naming its consequence
    Yes {
        #[arg(value_enum)]
        consequence: ConsequenceArg,
    },
    /// Decline the pending action
    No,
    /// Show process status
    Status,
    /// Re-read status from the server
    Refresh,
    /// Reconnect the push channel now
    Reconnect,
    /// Show recent log lines
    Logs {
        #[arg(value_enum, default_value = "server")]
        process: ProcessArg,
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
    /// Leave the console
    #[command(alias = "exit")]
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, clap::Error> {
    let words = line.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return Ok(None);
    }
    ReplLine::try_parse_from(words).map(|parsed| Some(parsed.command))
}
