use anyhow::Result;
use async_trait::async_trait;
use mcpanel_client::{ControlClientError, ControlReply, ControlRequest, ControlTransport};
use mcpanel_core::{
    Acknowledgement, ActionError, CommandOutcome, Consequence, ControlSession, GateBlock,
    Reconciled, SessionConfig, SettleDecision, StartOptions, execute,
};
use mcpanel_proto::{
    AckResponse, BackupsResponse, ProcessId, ProcessStatus, PushEvent, RestoreRequest,
    StatusReport, StatusResponse, TunnelStatusResponse,
};
use serde_json::json;
use tokio::sync::Mutex;

type Responder = fn(&ControlRequest) -> Result<ControlReply, ControlClientError>;

/// Answers every request from a fixed table and records what was sent.
struct RecordingTransport {
    respond: Responder,
    sent: Mutex<Vec<ControlRequest>>,
}

impl RecordingTransport {
    fn new(respond: Responder) -> Self {
        Self {
            respond,
            sent: Mutex::new(Vec::new()),
        }
    }

    async fn sent(&self) -> Vec<ControlRequest> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ControlTransport for RecordingTransport {
    async fn execute(&self, request: &ControlRequest) -> Result<ControlReply, ControlClientError> {
        self.sent.lock().await.push(request.clone());
        (self.respond)(request)
    }
}

fn ack(status: &str, message: Option<&str>) -> ControlReply {
    ControlReply::Ack(AckResponse {
        status: Some(status.to_string()),
        message: message.map(str::to_string),
        error: None,
    })
}

fn happy_server(request: &ControlRequest) -> Result<ControlReply, ControlClientError> {
    Ok(match request {
        ControlRequest::Status => ControlReply::Status(StatusResponse {
            status: "Stopped".to_string(),
        }),
        ControlRequest::TunnelStatus => ControlReply::TunnelStatus(TunnelStatusResponse {
            mc: "Stopped".to_string(),
            web: "Stopped".to_string(),
        }),
        ControlRequest::ListBackups => ControlReply::Backups(BackupsResponse {
            backups: vec![
                "world_20240102.zip".to_string(),
                "world_20240101.zip".to_string(),
            ],
        }),
        ControlRequest::GetJarPath => ControlReply::JarPath(mcpanel_proto::JarPathResponse {
            jar_path: "server.jar".to_string(),
        }),
        ControlRequest::Start(_) | ControlRequest::StartTunnel(_) => ack("Started", None),
        ControlRequest::RestoreBackup(_) => ack("Success", Some("restored")),
        ControlRequest::FetchSchema => ControlReply::Schema(json!({
            "pvp": {"type": "boolean", "jp": "PvP"},
            "hardcore": {"type": "boolean"},
            "difficulty": {"type": "enum", "options": ["peaceful", "easy", "normal", "hard"]},
            "max-players": {"type": "integer"}
        })),
        ControlRequest::GetProperties => ControlReply::Properties(
            [
                ("pvp", "true"),
                ("hardcore", "false"),
                ("difficulty", "legendary"),
                ("max-players", "20"),
                ("level-seed", "8675309"),
            ]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        ),
        ControlRequest::SaveProperties(_) | ControlRequest::SetJarPath(_) => {
            ack("Success", Some("saved"))
        }
        _ => ack("Command sent", None),
    })
}

async fn bootstrapped(transport: &RecordingTransport) -> Result<ControlSession> {
    let mut session = ControlSession::new(SessionConfig::default());
    let mut commands = session.apply_push(PushEvent::Connected);
    commands.extend(session.begin_bootstrap());
    for command in commands {
        let completion = execute(transport, command).await;
        session.complete(completion)?;
    }
    session.drain_updates();
    Ok(session)
}

#[tokio::test]
async fn restore_issues_exactly_one_request_only_after_confirmation() -> Result<()> {
    let transport = RecordingTransport::new(happy_server);
    let mut session = bootstrapped(&transport).await?;
    assert_eq!(session.catalog().len(), 2);
    assert_eq!(session.jar_path(), Some("server.jar"));
    let before = transport.sent().await.len();

    // Unconfirmed: nothing reaches the transport.
    session.begin_restore("world_20240101.zip")?;
    let declined = session.confirm(Acknowledgement::Decline);
    assert!(matches!(
        declined,
        Err(ActionError::GateBlocked(GateBlock::Declined { .. }))
    ));
    assert_eq!(transport.sent().await.len(), before);

    // Unknown filenames never get as far as a confirmation.
    assert_eq!(
        session.begin_restore("world.zip"),
        Err(ActionError::GateBlocked(GateBlock::UnknownBackup {
            filename: "world.zip".to_string()
        }))
    );

    session.begin_restore("world_20240101.zip")?;
    let command = session.confirm(Acknowledgement::Affirm(Consequence::WorldDiscarded))?;
    let outcome = session.complete(execute(&transport, command).await)?;
    assert_eq!(
        outcome,
        CommandOutcome::Restored {
            filename: "world_20240101.zip".to_string(),
            message: Some("restored".to_string())
        }
    );

    let sent = transport.sent().await;
    let restores = sent
        .iter()
        .filter(|request| matches!(request, ControlRequest::RestoreBackup(_)))
        .collect::<Vec<_>>();
    assert_eq!(
        restores,
        vec![&ControlRequest::RestoreBackup(RestoreRequest {
            filename: "world_20240101.zip".to_string()
        })]
    );
    Ok(())
}

#[tokio::test]
async fn push_during_start_request_is_not_overridden() -> Result<()> {
    let transport = RecordingTransport::new(happy_server);
    let mut session = bootstrapped(&transport).await?;
    assert_eq!(
        session.view(ProcessId::Primary).status,
        ProcessStatus::Stopped
    );

    let command = session.begin_start(ProcessId::Primary, &StartOptions::default())?;
    assert_eq!(
        session.view(ProcessId::Primary).status,
        ProcessStatus::Starting
    );

    // The process died on launch and the server said so before replying.
    session.apply_push(PushEvent::Status(StatusReport::new(
        ProcessId::Primary,
        ProcessStatus::Stopped,
    )));
    let outcome = session.complete(execute(&transport, command).await)?;
    assert!(matches!(
        outcome,
        CommandOutcome::Lifecycle {
            reconciled: Reconciled::Settled(SettleDecision::Superseded { .. }),
            ..
        }
    ));
    assert_eq!(
        session.view(ProcessId::Primary).status,
        ProcessStatus::Stopped
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_server_reverts_optimistic_start() -> Result<()> {
    let transport = RecordingTransport::new(happy_server);
    let mut session = bootstrapped(&transport).await?;
    let command = session.begin_start(ProcessId::TunnelA, &StartOptions::default())?;
    assert_eq!(
        session.view(ProcessId::TunnelA).status,
        ProcessStatus::Starting
    );

    let offline = RecordingTransport::new(|_| {
        Err(ControlClientError::Request {
            message: "connection refused".to_string(),
        })
    });
    let result = session.complete(execute(&offline, command).await);
    assert!(matches!(result, Err(ActionError::Transport { .. })));
    assert_eq!(
        session.view(ProcessId::TunnelA).status,
        ProcessStatus::Stopped
    );
    assert_eq!(offline.sent().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn properties_round_trip_through_the_transport() -> Result<()> {
    let transport = RecordingTransport::new(happy_server);
    let mut session = bootstrapped(&transport).await?;
    for command in session.begin_load_properties()? {
        session.complete(execute(&transport, command).await)?;
    }
    assert!(session.renderer().form().is_some());

    session.edit_property("max-players", "10")?;
    let save = session.begin_save_properties()?;
    session.complete(execute(&transport, save).await)?;

    let sent = transport.sent().await;
    let Some(ControlRequest::SaveProperties(values)) = sent.last() else {
        unreachable!("last request is the save");
    };
    let get = |key: &str| values.get(key).map(String::as_str);
    assert_eq!(get("pvp"), Some("true"));
    assert_eq!(get("hardcore"), Some("false"));
    assert_eq!(get("difficulty"), Some("legendary"));
    assert_eq!(get("max-players"), Some("10"));
    assert_eq!(get("level-seed"), Some("8675309"));
    Ok(())
}
