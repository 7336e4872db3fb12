//! Confirmation gate for destructive actions.
//!
//! A [`ConfirmedAction`] can only be obtained by echoing the consequence
//! named in a [`PendingConfirmation`], and only a confirmed action can be
//! turned into a [`ControlRequest`].

use std::fmt;

use mcpanel_client::ControlRequest;
use mcpanel_proto::RestoreRequest;
use thiserror::Error;

use crate::backups::BackupCatalog;
use crate::quick::QuickAction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestructiveIntent {
    RestoreBackup { filename: String },
    BanPlayer { player: String },
    StopAll,
}

impl DestructiveIntent {
    #[must_use]
    pub const fn consequence(&self) -> Consequence {
        match self {
            Self::RestoreBackup { .. } => Consequence::WorldDiscarded,
            Self::BanPlayer { .. } => Consequence::PlayerBanned,
            Self::StopAll => Consequence::AllServicesStopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consequence {
    WorldDiscarded,
    PlayerBanned,
    AllServicesStopped,
}

impl Consequence {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorldDiscarded => "world_discarded",
            Self::PlayerBanned => "player_banned",
            Self::AllServicesStopped => "all_services_stopped",
        }
    }

    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::WorldDiscarded => "the current world will be replaced by the backup",
            Self::PlayerBanned => "the player will lose access to the server",
            Self::AllServicesStopped => {
                "every supervised process and the control server will shut down"
            }
        }
    }
}

impl fmt::Display for Consequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Affirm(Consequence),
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateBlock {
    #[error("a player name is required")]
    MissingPlayer,
    #[error("a backup filename is required")]
    MissingFilename,
    #[error("command is empty")]
    EmptyCommand,
    #[error("no backup named {filename}")]
    UnknownBackup { filename: String },
    #[error("declined: {}", .consequence.describe())]
    Declined { consequence: Consequence },
    #[error("acknowledged {acknowledged} but the action means {expected}")]
    ConsequenceMismatch {
        expected: Consequence,
        acknowledged: Consequence,
    },
    #[error("no destructive action is awaiting confirmation")]
    NothingPending,
}

/// Validates a destructive intent and names what confirming it will do.
pub fn request(
    intent: DestructiveIntent,
    catalog: &BackupCatalog,
) -> Result<PendingConfirmation, GateBlock> {
    let intent = match intent {
        DestructiveIntent::RestoreBackup { filename } => {
            let filename = filename.trim().to_string();
            if filename.is_empty() {
                return Err(GateBlock::MissingFilename);
            }
            if !catalog.contains(&filename) {
                return Err(GateBlock::UnknownBackup { filename });
            }
            DestructiveIntent::RestoreBackup { filename }
        }
        DestructiveIntent::BanPlayer { player } => {
            let player = player.trim().to_string();
            if player.is_empty() {
                return Err(GateBlock::MissingPlayer);
            }
            DestructiveIntent::BanPlayer { player }
        }
        DestructiveIntent::StopAll => DestructiveIntent::StopAll,
    };
    Ok(PendingConfirmation { intent })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    intent: DestructiveIntent,
}

impl PendingConfirmation {
    #[must_use]
    pub fn intent(&self) -> &DestructiveIntent {
        &self.intent
    }

    #[must_use]
    pub const fn consequence(&self) -> Consequence {
        self.intent.consequence()
    }

    pub fn confirm(self, acknowledgement: Acknowledgement) -> Result<ConfirmedAction, GateBlock> {
        let expected = self.consequence();
        match acknowledgement {
            Acknowledgement::Affirm(acknowledged) if acknowledged == expected => {
                Ok(ConfirmedAction {
                    intent: self.intent,
                })
            }
            Acknowledgement::Affirm(acknowledged) => Err(GateBlock::ConsequenceMismatch {
                expected,
                acknowledged,
            }),
            Acknowledgement::Decline => Err(GateBlock::Declined {
                consequence: expected,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedAction {
    intent: DestructiveIntent,
}

impl ConfirmedAction {
    #[must_use]
    pub fn intent(&self) -> &DestructiveIntent {
        &self.intent
    }

    #[must_use]
    pub fn into_request(self) -> ControlRequest {
        match self.intent {
            DestructiveIntent::RestoreBackup { filename } => {
                ControlRequest::RestoreBackup(RestoreRequest { filename })
            }
            DestructiveIntent::BanPlayer { player } => {
                ControlRequest::QuickCommand(QuickAction::Ban.request(Some(player)))
            }
            DestructiveIntent::StopAll => ControlRequest::StopAll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> BackupCatalog {
        let mut catalog = BackupCatalog::default();
        catalog.replace(vec!["world_1.zip".to_string()]);
        catalog
    }

    #[test]
    fn request_validates_targets() {
        struct Case {
            name: &'static str,
            intent: DestructiveIntent,
            expected: GateBlock,
        }

        let cases = vec![
            Case {
                name: "blank player",
                intent: DestructiveIntent::BanPlayer {
                    player: "  ".to_string(),
                },
                expected: GateBlock::MissingPlayer,
            },
            Case {
                name: "blank filename",
                intent: DestructiveIntent::RestoreBackup {
                    filename: String::new(),
                },
                expected: GateBlock::MissingFilename,
            },
            Case {
                name: "filename outside catalog",
                intent: DestructiveIntent::RestoreBackup {
                    filename: "world_9.zip".to_string(),
                },
                expected: GateBlock::UnknownBackup {
                    filename: "world_9.zip".to_string(),
                },
            },
        ];

        for case in cases {
            assert_eq!(
                request(case.intent, &catalog()).err(),
                Some(case.expected),
                "case {}",
                case.name
            );
        }
    }

    #[test]
    fn only_matching_affirmation_yields_a_request() -> Result<(), GateBlock> {
        let pending = request(
            DestructiveIntent::RestoreBackup {
                filename: " world_1.zip ".to_string(),
            },
            &catalog(),
        )?;
        assert_eq!(pending.consequence(), Consequence::WorldDiscarded);

        assert_eq!(
            pending.clone().confirm(Acknowledgement::Decline),
            Err(GateBlock::Declined {
                consequence: Consequence::WorldDiscarded
            })
        );
        assert_eq!(
            pending
                .clone()
                .confirm(Acknowledgement::Affirm(Consequence::PlayerBanned)),
            Err(GateBlock::ConsequenceMismatch {
                expected: Consequence::WorldDiscarded,
                acknowledged: Consequence::PlayerBanned
            })
        );

        let confirmed = pending.confirm(Acknowledgement::Affirm(Consequence::WorldDiscarded))?;
        assert_eq!(
            confirmed.into_request(),
            ControlRequest::RestoreBackup(RestoreRequest {
                filename: "world_1.zip".to_string()
            })
        );
        Ok(())
    }

    #[test]
    fn confirmed_ban_is_a_quick_command() -> Result<(), GateBlock> {
        let confirmed = request(
            DestructiveIntent::BanPlayer {
                player: "griefer".to_string(),
            },
            &BackupCatalog::default(),
        )?
        .confirm(Acknowledgement::Affirm(Consequence::PlayerBanned))?;
        let request = confirmed.into_request();
        assert!(request.is_destructive());
        let ControlRequest::QuickCommand(body) = request else {
            unreachable!("ban maps to a quick command");
        };
        assert_eq!(body.action, "ban");
        assert_eq!(body.player.as_deref(), Some("griefer"));
        Ok(())
    }
}
