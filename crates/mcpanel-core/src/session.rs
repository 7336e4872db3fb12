//! Operator session.
//!
//! [`ControlSession`] owns the reconciler, the property renderer, the backup
//! catalog and the confirmation gate. Actions are split in two halves: a
//! `begin_*` call validates and applies any optimistic state, returning a
//! [`PendingCommand`]; the caller runs it with [`execute`] wherever it likes
//! and hands the [`CommandCompletion`] back to [`ControlSession::complete`].

use std::fmt;

use mcpanel_client::{ControlClientError, ControlReply, ControlRequest, ControlTransport};
use mcpanel_proto::{
    AckResponse, CommandRequest, JarPathRequest, ProcessId, ProcessStatus, PushEvent,
    STATUS_STARTED, STATUS_SUCCESS, StartRequest, StatusReport,
};
use tracing::{debug, info, warn};

use crate::backups::BackupCatalog;
use crate::error::ActionError;
use crate::gate::{
    self, Acknowledgement, Consequence, DestructiveIntent, GateBlock, PendingConfirmation,
};
use crate::properties::{ConfigRenderer, ConfigValueSet, LoadProgress, PropertyForm};
use crate::quick::QuickAction;
use crate::reconcile::{ControlEvent, Reconciled, Reconciler};
use crate::store::{
    CommandTicket, DEFAULT_LOG_CAPACITY, LifecycleIntent, LifecycleStore, ProcessView, StoreUpdate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

impl CommandId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}

/// What a pending command is for, carrying whatever the completion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Lifecycle {
        process: ProcessId,
        intent: LifecycleIntent,
        ticket: CommandTicket,
    },
    RefreshPrimary,
    RefreshTunnels,
    Console,
    Quick { action: QuickAction },
    ListBackups,
    CreateBackup,
    RestoreBackup { filename: String },
    LoadJarPath,
    SaveJarPath { jar_path: String },
    LoadSchema,
    LoadProperties,
    SaveProperties { values: ConfigValueSet, revision: u64 },
    StopAll,
}

impl CommandKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lifecycle { .. } => "lifecycle",
            Self::RefreshPrimary => "refresh_primary",
            Self::RefreshTunnels => "refresh_tunnels",
            Self::Console => "console",
            Self::Quick { .. } => "quick",
            Self::ListBackups => "list_backups",
            Self::CreateBackup => "create_backup",
            Self::RestoreBackup { .. } => "restore_backup",
            Self::LoadJarPath => "load_jar_path",
            Self::SaveJarPath { .. } => "save_jar_path",
            Self::LoadSchema => "load_schema",
            Self::LoadProperties => "load_properties",
            Self::SaveProperties { .. } => "save_properties",
            Self::StopAll => "stop_all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub id: CommandId,
    pub kind: CommandKind,
    pub request: ControlRequest,
}

#[derive(Debug)]
pub struct CommandCompletion {
    pub command: PendingCommand,
    pub result: Result<ControlReply, ControlClientError>,
}

/// Runs one command against the transport. Single attempt.
pub async fn execute<T>(transport: &T, command: PendingCommand) -> CommandCompletion
where
    T: ControlTransport + ?Sized,
{
    let result = transport.execute(&command.request).await;
    CommandCompletion { command, result }
}

/// Result of a `begin_*` call that may need confirmation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Issue(PendingCommand),
    Confirm(Consequence),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Lifecycle {
        process: ProcessId,
        intent: LifecycleIntent,
        reconciled: Reconciled,
    },
    Refreshed(Vec<Reconciled>),
    Sent { message: Option<String> },
    Backups { count: usize },
    BackupCreated { filename: Option<String> },
    Restored { filename: String, message: Option<String> },
    JarPath { jar_path: String },
    JarPathSaved { jar_path: String },
    Properties(LoadProgress),
    /// `kept_edits` is set when the form changed while the save was in
    /// flight; those edits stay unsaved.
    PropertiesSaved { count: usize, kept_edits: bool },
    ShutdownRequested { message: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Launch parameters for the primary process. Zero memory values fall back
/// to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    pub max_memory_gb: u32,
    pub min_memory_gb: u32,
    pub world_type: String,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            max_memory_gb: 2,
            min_memory_gb: 1,
            world_type: "default".to_string(),
        }
    }
}

impl StartOptions {
    #[must_use]
    pub fn request(&self) -> StartRequest {
        let or_default = |value: u32, fallback: u32| if value == 0 { fallback } else { value };
        let world_type = self.world_type.trim();
        StartRequest {
            xmx: format!("{}G", or_default(self.max_memory_gb, 2)),
            xms: format!("{}G", or_default(self.min_memory_gb, 1)),
            world_type: if world_type.is_empty() {
                "default".to_string()
            } else {
                world_type.to_string()
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct ControlSession {
    reconciler: Reconciler,
    renderer: ConfigRenderer,
    catalog: BackupCatalog,
    confirmation: Option<PendingConfirmation>,
    jar_path: Option<String>,
    shutdown_requested: bool,
    next_command: u64,
}

impl ControlSession {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            reconciler: Reconciler::new(LifecycleStore::new(config.log_capacity)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    #[must_use]
    pub fn view(&self, process: ProcessId) -> ProcessView<'_> {
        self.reconciler.store().view(process)
    }

    #[must_use]
    pub fn renderer(&self) -> &ConfigRenderer {
        &self.renderer
    }

    #[must_use]
    pub fn catalog(&self) -> &BackupCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn jar_path(&self) -> Option<&str> {
        self.jar_path.as_deref()
    }

    #[must_use]
    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        self.confirmation.as_ref()
    }

    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// True once a requested shutdown has been followed by the push channel
    /// going away.
    #[must_use]
    pub fn shutdown_complete(&self) -> bool {
        self.shutdown_requested && !self.reconciler.is_connected()
    }

    pub fn drain_updates(&mut self) -> Vec<StoreUpdate> {
        self.reconciler.drain_updates()
    }

    /// Applies a push event and returns the commands it calls for. Every
    /// `Connected` re-reads status, since pushes sent while the channel was
    /// down are gone.
    pub fn apply_push(&mut self, event: PushEvent) -> Vec<PendingCommand> {
        if matches!(event, PushEvent::Disconnected) && self.shutdown_requested {
            info!("control server went away after shutdown request");
        }
        match self.reconciler.dispatch(ControlEvent::Push(event)) {
            Reconciled::Connected => {
                debug!("push channel connected, refreshing status");
                self.begin_refresh()
            }
            _ => Vec::new(),
        }
    }

    pub fn begin_start(
        &mut self,
        process: ProcessId,
        options: &StartOptions,
    ) -> Result<PendingCommand, ActionError> {
        let ticket = self.reconciler.begin(process, LifecycleIntent::Start)?;
        let request = match process.tunnel_kind() {
            None => ControlRequest::Start(options.request()),
            Some(kind) => ControlRequest::StartTunnel(kind),
        };
        Ok(self.command(
            CommandKind::Lifecycle {
                process,
                intent: LifecycleIntent::Start,
                ticket,
            },
            request,
        ))
    }

    pub fn begin_stop(&mut self, process: ProcessId) -> Result<PendingCommand, ActionError> {
        let ticket = self.reconciler.begin(process, LifecycleIntent::Stop)?;
        let request = match process.tunnel_kind() {
            None => ControlRequest::Stop,
            Some(kind) => ControlRequest::StopTunnel(kind),
        };
        Ok(self.command(
            CommandKind::Lifecycle {
                process,
                intent: LifecycleIntent::Stop,
                ticket,
            },
            request,
        ))
    }

    pub fn begin_refresh(&mut self) -> Vec<PendingCommand> {
        vec![
            self.command(CommandKind::RefreshPrimary, ControlRequest::Status),
            self.command(CommandKind::RefreshTunnels, ControlRequest::TunnelStatus),
        ]
    }

    /// Jar path and backup catalog. Status comes from the refresh a
    /// `Connected` push issues, or from `begin_refresh` without one.
    pub fn begin_bootstrap(&mut self) -> Vec<PendingCommand> {
        vec![
            self.command(CommandKind::LoadJarPath, ControlRequest::GetJarPath),
            self.begin_list_backups(),
        ]
    }

    pub fn begin_console_command(&mut self, text: &str) -> Result<PendingCommand, ActionError> {
        let command = text.trim();
        if command.is_empty() {
            return Err(GateBlock::EmptyCommand.into());
        }
        Ok(self.command(
            CommandKind::Console,
            ControlRequest::Command(CommandRequest {
                command: command.to_string(),
            }),
        ))
    }

    /// Player actions need a non-blank target. Ban goes through the gate.
    pub fn begin_quick(
        &mut self,
        action: QuickAction,
        player: Option<&str>,
    ) -> Result<Step, ActionError> {
        let player = player.map(str::trim).filter(|name| !name.is_empty());
        if action.requires_player() && player.is_none() {
            return Err(GateBlock::MissingPlayer.into());
        }
        if action.is_destructive() {
            let player = player.unwrap_or_default();
            return self.begin_ban(player).map(Step::Confirm);
        }
        let request = ControlRequest::QuickCommand(action.request(player.map(str::to_string)));
        Ok(Step::Issue(self.command(CommandKind::Quick { action }, request)))
    }

    pub fn begin_ban(&mut self, player: &str) -> Result<Consequence, ActionError> {
        self.hold(DestructiveIntent::BanPlayer {
            player: player.to_string(),
        })
    }

    pub fn begin_restore(&mut self, filename: &str) -> Result<Consequence, ActionError> {
        self.hold(DestructiveIntent::RestoreBackup {
            filename: filename.to_string(),
        })
    }

    pub fn begin_stop_all(&mut self) -> Result<Consequence, ActionError> {
        self.hold(DestructiveIntent::StopAll)
    }

    /// Answers the held confirmation. Restore targets are checked against the
    /// catalog again, since it may have been refreshed in between.
    pub fn confirm(&mut self, acknowledgement: Acknowledgement) -> Result<PendingCommand, ActionError> {
        let pending = self
            .confirmation
            .take()
            .ok_or(GateBlock::NothingPending)?;
        if let DestructiveIntent::RestoreBackup { filename } = pending.intent()
            && !self.catalog.contains(filename)
        {
            return Err(GateBlock::UnknownBackup {
                filename: filename.clone(),
            }
            .into());
        }

        let confirmed = pending.confirm(acknowledgement)?;
        let kind = match confirmed.intent() {
            DestructiveIntent::RestoreBackup { filename } => CommandKind::RestoreBackup {
                filename: filename.clone(),
            },
            DestructiveIntent::BanPlayer { .. } => CommandKind::Quick {
                action: QuickAction::Ban,
            },
            DestructiveIntent::StopAll => CommandKind::StopAll,
        };
        info!(kind = kind.as_str(), "destructive action confirmed");
        Ok(self.command(kind, confirmed.into_request()))
    }

    pub fn begin_list_backups(&mut self) -> PendingCommand {
        self.command(CommandKind::ListBackups, ControlRequest::ListBackups)
    }

    pub fn begin_create_backup(&mut self) -> PendingCommand {
        self.command(CommandKind::CreateBackup, ControlRequest::CreateBackup)
    }

    pub fn begin_load_jar_path(&mut self) -> PendingCommand {
        self.command(CommandKind::LoadJarPath, ControlRequest::GetJarPath)
    }

    pub fn begin_set_jar_path(&mut self, jar_path: &str) -> Result<PendingCommand, ActionError> {
        let jar_path = jar_path.trim();
        if jar_path.is_empty() {
            return Err(GateBlock::MissingFilename.into());
        }
        Ok(self.command(
            CommandKind::SaveJarPath {
                jar_path: jar_path.to_string(),
            },
            ControlRequest::SetJarPath(JarPathRequest {
                jar_path: jar_path.to_string(),
            }),
        ))
    }

    /// Starts the schema and value fetches. Returns nothing to run when the
    /// form is already loaded or loading.
    pub fn begin_load_properties(&mut self) -> Result<Vec<PendingCommand>, ActionError> {
        if let Some(reason) = self.renderer.unavailable_reason() {
            return Err(ActionError::SchemaUnavailable {
                reason: reason.to_string(),
            });
        }
        if !self.renderer.begin_load() {
            return Ok(Vec::new());
        }
        Ok(vec![
            self.command(CommandKind::LoadSchema, ControlRequest::FetchSchema),
            self.command(CommandKind::LoadProperties, ControlRequest::GetProperties),
        ])
    }

    /// Kind-directed edit of one property on the loaded form.
    pub fn edit_property(&mut self, key: &str, raw: &str) -> Result<(), ActionError> {
        let form = self.form_mut()?;
        form.set(key, raw)?;
        Ok(())
    }

    pub fn set_property_checked(&mut self, key: &str, checked: bool) -> Result<(), ActionError> {
        let form = self.form_mut()?;
        form.set_checked(key, checked)?;
        Ok(())
    }

    pub fn begin_save_properties(&mut self) -> Result<PendingCommand, ActionError> {
        let form = self.form_mut()?;
        let values = form.to_value_set();
        let revision = form.revision();
        Ok(self.command(
            CommandKind::SaveProperties {
                values: values.clone(),
                revision,
            },
            ControlRequest::SaveProperties(values),
        ))
    }

    /// Applies a finished command. Failures are returned after any optimistic
    /// state has been reverted.
    pub fn complete(&mut self, completion: CommandCompletion) -> Result<CommandOutcome, ActionError> {
        let CommandCompletion { command, result } = completion;
        let PendingCommand { id, kind, request } = command;
        let label = kind.as_str();
        let outcome = self.apply_completion(kind, result);
        match &outcome {
            Ok(_) => info!(command = %id, kind = label, request = request.label(), "command completed"),
            Err(error) => {
                warn!(command = %id, kind = label, request = request.label(), %error, "command failed");
            }
        }
        outcome
    }

    fn apply_completion(
        &mut self,
        kind: CommandKind,
        result: Result<ControlReply, ControlClientError>,
    ) -> Result<CommandOutcome, ActionError> {
        match kind {
            CommandKind::Lifecycle {
                process,
                intent,
                ticket,
            } => {
                let expected = match intent {
                    LifecycleIntent::Start => Some(STATUS_STARTED),
                    LifecycleIntent::Stop => None,
                };
                let settled = result
                    .map_err(ActionError::from)
                    .and_then(|reply| expect_ack(reply, expected));
                let reconciled = self.reconciler.dispatch(ControlEvent::Settled {
                    ticket,
                    succeeded: settled.is_ok(),
                });
                settled?;
                Ok(CommandOutcome::Lifecycle {
                    process,
                    intent,
                    reconciled,
                })
            }
            CommandKind::RefreshPrimary => {
                let ControlReply::Status(reply) = result? else {
                    return Err(unexpected_reply("status"));
                };
                let status = parse_status(&reply.status)?;
                let reconciled = self.reconciler.dispatch(ControlEvent::Refreshed(
                    StatusReport::new(ProcessId::Primary, status),
                ));
                Ok(CommandOutcome::Refreshed(vec![reconciled]))
            }
            CommandKind::RefreshTunnels => {
                let ControlReply::TunnelStatus(reply) = result? else {
                    return Err(unexpected_reply("tunnel_status"));
                };
                let reports = [
                    StatusReport::new(ProcessId::TunnelA, parse_status(&reply.mc)?),
                    StatusReport::new(ProcessId::TunnelB, parse_status(&reply.web)?),
                ];
                let reconciled = reports
                    .into_iter()
                    .map(|report| self.reconciler.dispatch(ControlEvent::Refreshed(report)))
                    .collect();
                Ok(CommandOutcome::Refreshed(reconciled))
            }
            CommandKind::Console | CommandKind::Quick { .. } => {
                let ack = expect_ack(result?, None)?;
                Ok(CommandOutcome::Sent {
                    message: ack.summary().map(str::to_string),
                })
            }
            CommandKind::ListBackups => {
                let ControlReply::Backups(reply) = result? else {
                    return Err(unexpected_reply("backups"));
                };
                self.catalog.replace(reply.backups);
                Ok(CommandOutcome::Backups {
                    count: self.catalog.len(),
                })
            }
            CommandKind::CreateBackup => {
                let ControlReply::BackupCreated(reply) = result? else {
                    return Err(unexpected_reply("backups/create"));
                };
                if reply.status != STATUS_SUCCESS {
                    return Err(ActionError::rejected(200, reply.status));
                }
                if let Some(filename) = &reply.filename {
                    self.catalog.note_created(filename);
                }
                Ok(CommandOutcome::BackupCreated {
                    filename: reply.filename,
                })
            }
            CommandKind::RestoreBackup { filename } => {
                let ack = expect_ack(result?, Some(STATUS_SUCCESS))?;
                Ok(CommandOutcome::Restored {
                    filename,
                    message: ack.message,
                })
            }
            CommandKind::LoadJarPath => {
                let ControlReply::JarPath(reply) = result? else {
                    return Err(unexpected_reply("config"));
                };
                self.jar_path = Some(reply.jar_path.clone());
                Ok(CommandOutcome::JarPath {
                    jar_path: reply.jar_path,
                })
            }
            CommandKind::SaveJarPath { jar_path } => {
                expect_ack(result?, Some(STATUS_SUCCESS))?;
                self.jar_path = Some(jar_path.clone());
                Ok(CommandOutcome::JarPathSaved { jar_path })
            }
            CommandKind::LoadSchema => {
                let raw = match result {
                    Ok(ControlReply::Schema(raw)) => raw,
                    Ok(_) => return Err(self.fail_properties(unexpected_reply("schema"))),
                    Err(error) => return Err(self.fail_properties(error.into())),
                };
                let progress = self
                    .renderer
                    .accept_schema(raw)
                    .map_err(|error| ActionError::SchemaUnavailable {
                        reason: error.to_string(),
                    })?;
                Ok(CommandOutcome::Properties(progress))
            }
            CommandKind::LoadProperties => {
                let values = match result {
                    Ok(ControlReply::Properties(values)) => values,
                    Ok(_) => return Err(self.fail_properties(unexpected_reply("properties"))),
                    Err(error) => return Err(self.fail_properties(error.into())),
                };
                Ok(CommandOutcome::Properties(
                    self.renderer.accept_values(values),
                ))
            }
            CommandKind::SaveProperties { values, revision } => {
                expect_ack(result?, Some(STATUS_SUCCESS))?;
                let kept_edits = self
                    .renderer
                    .form_mut()
                    .is_some_and(|form| !form.commit(&values, revision));
                if kept_edits {
                    debug!(revision, "properties edited during save, keeping newer edits");
                }
                Ok(CommandOutcome::PropertiesSaved {
                    count: values.len(),
                    kept_edits,
                })
            }
            CommandKind::StopAll => {
                let ack = expect_ack(result?, None)?;
                self.shutdown_requested = true;
                Ok(CommandOutcome::ShutdownRequested {
                    message: ack.summary().map(str::to_string),
                })
            }
        }
    }

    fn fail_properties(&mut self, error: ActionError) -> ActionError {
        let reason = error.to_string();
        self.renderer.fail(reason.clone());
        ActionError::SchemaUnavailable { reason }
    }

    fn form_mut(&mut self) -> Result<&mut PropertyForm, ActionError> {
        if let Some(reason) = self.renderer.unavailable_reason() {
            return Err(ActionError::SchemaUnavailable {
                reason: reason.to_string(),
            });
        }
        self.renderer
            .form_mut()
            .ok_or_else(|| ActionError::SchemaUnavailable {
                reason: "server properties are not loaded".to_string(),
            })
    }

    fn hold(&mut self, intent: DestructiveIntent) -> Result<Consequence, ActionError> {
        let pending = gate::request(intent, &self.catalog)?;
        let consequence = pending.consequence();
        if let Some(replaced) = self.confirmation.replace(pending) {
            debug!(
                replaced = replaced.consequence().as_str(),
                "pending confirmation replaced"
            );
        }
        Ok(consequence)
    }

    fn command(&mut self, kind: CommandKind, request: ControlRequest) -> PendingCommand {
        self.next_command = self.next_command.saturating_add(1);
        PendingCommand {
            id: CommandId(self.next_command),
            kind,
            request,
        }
    }
}

fn expect_ack(reply: ControlReply, expected: Option<&str>) -> Result<AckResponse, ActionError> {
    let ControlReply::Ack(ack) = reply else {
        return Err(unexpected_reply("ack"));
    };
    if let Some(expected) = expected
        && !ack.status_is(expected)
    {
        let message = ack.summary().unwrap_or("no status in reply").to_string();
        return Err(ActionError::rejected(200, message));
    }
    Ok(ack)
}

fn parse_status(raw: &str) -> Result<ProcessStatus, ActionError> {
    ProcessStatus::parse(raw).map_err(|error| ActionError::Transport {
        message: error.to_string(),
    })
}

fn unexpected_reply(expected: &str) -> ActionError {
    ActionError::Transport {
        message: format!("unexpected reply shape, expected {expected}"),
    }
}

#[cfg(test)]
mod tests {
    use mcpanel_proto::{BackupsResponse, LogLine, StatusResponse, TunnelStatusResponse};
    use serde_json::json;

    use super::*;
    use crate::properties::PropertyValue;

    fn ack(status: &str) -> ControlReply {
        ControlReply::Ack(AckResponse {
            status: Some(status.to_string()),
            message: None,
            error: None,
        })
    }

    fn finish(
        session: &mut ControlSession,
        command: PendingCommand,
        result: Result<ControlReply, ControlClientError>,
    ) -> Result<CommandOutcome, ActionError> {
        session.complete(CommandCompletion { command, result })
    }

    fn stopped_session() -> ControlSession {
        let mut session = ControlSession::new(SessionConfig::default());
        session.apply_push(PushEvent::Connected);
        for process in ProcessId::ALL {
            session.apply_push(PushEvent::Status(StatusReport::new(
                process,
                ProcessStatus::Stopped,
            )));
        }
        session.drain_updates();
        session
    }

    #[test]
    fn start_options_fill_defaults() {
        let options = StartOptions {
            max_memory_gb: 0,
            min_memory_gb: 0,
            world_type: " ".to_string(),
        };
        assert_eq!(
            options.request(),
            StartRequest {
                xmx: "2G".to_string(),
                xms: "1G".to_string(),
                world_type: "default".to_string()
            }
        );
        let options = StartOptions {
            max_memory_gb: 4,
            ..StartOptions::default()
        };
        assert_eq!(options.request().xmx, "4G");
    }

    #[test]
    fn start_needs_started_acknowledgement() -> Result<(), ActionError> {
        let mut session = stopped_session();
        let command = session.begin_start(ProcessId::Primary, &StartOptions::default())?;
        assert_eq!(
            session.view(ProcessId::Primary).status,
            ProcessStatus::Starting
        );

        let result = finish(&mut session, command, Ok(ack("Error")));
        assert_eq!(
            result,
            Err(ActionError::Rejected {
                status: 200,
                message: "Error".to_string()
            })
        );
        assert_eq!(
            session.view(ProcessId::Primary).status,
            ProcessStatus::Stopped
        );

        let command = session.begin_start(ProcessId::Primary, &StartOptions::default())?;
        finish(&mut session, command, Ok(ack("Started")))?;
        assert_eq!(
            session.view(ProcessId::Primary).status,
            ProcessStatus::Running
        );
        Ok(())
    }

    #[test]
    fn tunnel_lifecycle_uses_tunnel_routes() -> Result<(), ActionError> {
        let mut session = stopped_session();
        let command = session.begin_start(ProcessId::TunnelB, &StartOptions::default())?;
        assert_eq!(
            command.request,
            ControlRequest::StartTunnel(mcpanel_proto::TunnelKind::Web)
        );
        finish(&mut session, command, Ok(ack("Started")))?;

        let command = session.begin_stop(ProcessId::TunnelB)?;
        assert_eq!(
            command.request,
            ControlRequest::StopTunnel(mcpanel_proto::TunnelKind::Web)
        );
        // Stop accepts whatever the server says on a 2xx.
        finish(&mut session, command, Ok(ack("Already stopped")))?;
        assert_eq!(
            session.view(ProcessId::TunnelB).status,
            ProcessStatus::Stopped
        );
        assert_eq!(
            session.view(ProcessId::Primary).status,
            ProcessStatus::Stopped
        );
        Ok(())
    }

    #[test]
    fn refreshes_apply_as_authoritative_reports() -> Result<(), ActionError> {
        let mut session = ControlSession::default();
        let commands = session.apply_push(PushEvent::Connected);
        assert_eq!(commands.len(), 2);
        let mut commands = commands.into_iter();
        let (Some(primary), Some(tunnels)) = (commands.next(), commands.next()) else {
            unreachable!("connecting refreshes primary and tunnels");
        };
        assert_eq!(primary.request, ControlRequest::Status);
        assert_eq!(tunnels.request, ControlRequest::TunnelStatus);

        finish(
            &mut session,
            primary,
            Ok(ControlReply::Status(StatusResponse {
                status: "Running".to_string(),
            })),
        )?;
        let outcome = finish(
            &mut session,
            tunnels,
            Ok(ControlReply::TunnelStatus(TunnelStatusResponse {
                mc: "Running".to_string(),
                web: "Stopped".to_string(),
            })),
        )?;
        assert!(matches!(outcome, CommandOutcome::Refreshed(ref items) if items.len() == 2));
        assert_eq!(
            session.view(ProcessId::Primary).status,
            ProcessStatus::Running
        );
        assert_eq!(
            session.view(ProcessId::TunnelA).status,
            ProcessStatus::Running
        );
        assert_eq!(
            session.view(ProcessId::TunnelB).status,
            ProcessStatus::Stopped
        );
        Ok(())
    }

    #[test]
    fn restore_waits_for_confirmation_and_rechecks_catalog() -> Result<(), ActionError> {
        let mut session = ControlSession::default();
        let list = session.begin_list_backups();
        finish(
            &mut session,
            list,
            Ok(ControlReply::Backups(BackupsResponse {
                backups: vec!["world_1.zip".to_string()],
            })),
        )?;

        assert_eq!(
            session.begin_restore("world_1.zip")?,
            Consequence::WorldDiscarded
        );
        // Catalog refreshed without the file before the operator answered.
        let list = session.begin_list_backups();
        finish(
            &mut session,
            list,
            Ok(ControlReply::Backups(BackupsResponse {
                backups: Vec::new(),
            })),
        )?;
        assert_eq!(
            session.confirm(Acknowledgement::Affirm(Consequence::WorldDiscarded)),
            Err(ActionError::GateBlocked(GateBlock::UnknownBackup {
                filename: "world_1.zip".to_string()
            }))
        );
        assert!(session.pending_confirmation().is_none());
        Ok(())
    }

    #[test]
    fn ban_is_gated_but_kick_is_not() -> Result<(), ActionError> {
        let mut session = ControlSession::default();
        assert_eq!(
            session.begin_quick(QuickAction::Kick, Some(" ")),
            Err(ActionError::GateBlocked(GateBlock::MissingPlayer))
        );
        assert!(matches!(
            session.begin_quick(QuickAction::Kick, Some("alex"))?,
            Step::Issue(_)
        ));
        assert!(matches!(
            session.begin_quick(QuickAction::TimeNight, None)?,
            Step::Issue(_)
        ));
        assert_eq!(
            session.begin_quick(QuickAction::Ban, Some("alex"))?,
            Step::Confirm(Consequence::PlayerBanned)
        );
        assert_eq!(
            session.confirm(Acknowledgement::Decline),
            Err(ActionError::GateBlocked(GateBlock::Declined {
                consequence: Consequence::PlayerBanned
            }))
        );
        assert_eq!(
            session.confirm(Acknowledgement::Decline),
            Err(ActionError::GateBlocked(GateBlock::NothingPending))
        );
        Ok(())
    }

    #[test]
    fn failed_schema_fetch_makes_properties_unavailable() -> Result<(), ActionError> {
        let mut session = ControlSession::default();
        let commands = session.begin_load_properties()?;
        assert_eq!(commands.len(), 2);
        assert!(session.begin_load_properties()?.is_empty());

        let mut commands = commands.into_iter();
        let (Some(schema), Some(values)) = (commands.next(), commands.next()) else {
            unreachable!("schema and values are both fetched");
        };
        let error = finish(
            &mut session,
            schema,
            Err(ControlClientError::Request {
                message: "connection refused".to_string(),
            }),
        );
        assert!(matches!(error, Err(ActionError::SchemaUnavailable { .. })));

        let late = finish(
            &mut session,
            values,
            Ok(ControlReply::Properties(ConfigValueSet::new())),
        )?;
        assert_eq!(late, CommandOutcome::Properties(LoadProgress::Ignored));
        assert!(matches!(
            session.begin_load_properties(),
            Err(ActionError::SchemaUnavailable { .. })
        ));
        assert!(matches!(
            session.edit_property("pvp", "true"),
            Err(ActionError::SchemaUnavailable { .. })
        ));
        Ok(())
    }

    #[test]
    fn saved_properties_become_the_new_baseline() -> Result<(), ActionError> {
        let mut session = ControlSession::default();
        let mut commands = session.begin_load_properties()?.into_iter();
        let (Some(schema), Some(values)) = (commands.next(), commands.next()) else {
            unreachable!("schema and values are both fetched");
        };
        finish(
            &mut session,
            schema,
            Ok(ControlReply::Schema(json!({
                "pvp": {"type": "boolean"},
                "motd": {"type": "string"}
            }))),
        )?;
        let current = ConfigValueSet::from([("pvp".to_string(), "true".to_string())]);
        let outcome = finish(&mut session, values, Ok(ControlReply::Properties(current)))?;
        assert_eq!(outcome, CommandOutcome::Properties(LoadProgress::Ready));

        session.set_property_checked("pvp", false)?;
        session.edit_property("motd", "hello")?;
        let save = session.begin_save_properties()?;
        let ControlRequest::SaveProperties(body) = &save.request else {
            unreachable!("save builds a properties request");
        };
        assert_eq!(body.get("pvp").map(String::as_str), Some("false"));
        assert_eq!(body.get("motd").map(String::as_str), Some("hello"));

        finish(&mut session, save, Ok(ack("Success")))?;
        let form = session.renderer().form();
        assert_eq!(
            form.and_then(|form| form.value("pvp")),
            Some(&PropertyValue::Boolean(false))
        );
        assert_eq!(form.map(|form| form.is_dirty()), Some(false));
        Ok(())
    }

    #[test]
    fn edits_made_during_a_save_survive_its_completion() -> Result<(), ActionError> {
        let mut session = ControlSession::default();
        let mut commands = session.begin_load_properties()?.into_iter();
        let (Some(schema), Some(values)) = (commands.next(), commands.next()) else {
            unreachable!("schema and values are both fetched");
        };
        finish(
            &mut session,
            schema,
            Ok(ControlReply::Schema(json!({
                "pvp": {"type": "boolean"},
                "motd": {"type": "string"}
            }))),
        )?;
        let current = ConfigValueSet::from([("motd".to_string(), "old".to_string())]);
        finish(&mut session, values, Ok(ControlReply::Properties(current)))?;

        session.edit_property("motd", "first")?;
        let save = session.begin_save_properties()?;
        session.set_property_checked("pvp", true)?;

        let outcome = finish(&mut session, save, Ok(ack("Success")))?;
        assert_eq!(
            outcome,
            CommandOutcome::PropertiesSaved {
                count: 2,
                kept_edits: true
            }
        );
        let form = session.renderer().form();
        assert_eq!(
            form.and_then(|form| form.value("pvp")),
            Some(&PropertyValue::Boolean(true))
        );
        assert_eq!(form.map(|form| form.is_dirty()), Some(true));

        let resave = session.begin_save_properties()?;
        let ControlRequest::SaveProperties(body) = &resave.request else {
            unreachable!("save builds a properties request");
        };
        assert_eq!(body.get("pvp").map(String::as_str), Some("true"));
        assert_eq!(body.get("motd").map(String::as_str), Some("first"));
        let outcome = finish(&mut session, resave, Ok(ack("Success")))?;
        assert_eq!(
            outcome,
            CommandOutcome::PropertiesSaved {
                count: 2,
                kept_edits: false
            }
        );
        assert_eq!(
            session.renderer().form().map(|form| form.is_dirty()),
            Some(false)
        );
        Ok(())
    }

    #[test]
    fn stop_all_marks_shutdown_expected() -> Result<(), ActionError> {
        let mut session = stopped_session();
        session.begin_stop_all()?;
        let command = session.confirm(Acknowledgement::Affirm(Consequence::AllServicesStopped))?;
        assert_eq!(command.request, ControlRequest::StopAll);
        finish(
            &mut session,
            command,
            Ok(ack("All services stopped. Shutting down.")),
        )?;
        assert!(session.shutdown_requested());
        assert!(!session.shutdown_complete());

        session.apply_push(PushEvent::Disconnected);
        assert!(session.shutdown_complete());
        Ok(())
    }

    #[test]
    fn reconnect_refreshes_the_reset_view() -> Result<(), ActionError> {
        let mut session = stopped_session();
        assert!(session.apply_push(PushEvent::Disconnected).is_empty());
        assert_eq!(
            session.view(ProcessId::Primary).status,
            ProcessStatus::Unknown
        );

        let commands = session.apply_push(PushEvent::Connected);
        let requests = commands
            .iter()
            .map(|command| command.request.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            requests,
            vec![ControlRequest::Status, ControlRequest::TunnelStatus]
        );

        let mut commands = commands.into_iter();
        let (Some(primary), Some(tunnels)) = (commands.next(), commands.next()) else {
            unreachable!("both refreshes issued");
        };
        finish(
            &mut session,
            primary,
            Ok(ControlReply::Status(StatusResponse {
                status: "Running".to_string(),
            })),
        )?;
        finish(
            &mut session,
            tunnels,
            Ok(ControlReply::TunnelStatus(TunnelStatusResponse {
                mc: "Stopped".to_string(),
                web: "Running".to_string(),
            })),
        )?;
        assert_eq!(
            session.view(ProcessId::Primary).status,
            ProcessStatus::Running
        );
        assert_eq!(
            session.view(ProcessId::TunnelB).status,
            ProcessStatus::Running
        );
        assert!(
            session
                .apply_push(PushEvent::Log(LogLine {
                    process: ProcessId::Primary,
                    text: "tick".to_string(),
                }))
                .is_empty()
        );
        Ok(())
    }
}
