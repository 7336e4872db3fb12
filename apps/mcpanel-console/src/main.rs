mod config;
mod render;
mod repl;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mcpanel_client::ControlClient;
use mcpanel_core::properties::LoadProgress;
use mcpanel_core::{
    Acknowledgement, ActionError, CommandCompletion, CommandOutcome, Consequence, ControlSession,
    GateBlock, PendingCommand, QuickAction, StartOptions, Step, execute,
};
use mcpanel_proto::{ProcessId, PushEvent};
use mcpanel_push::PushChannel;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ConsoleConfig;
use crate::repl::{ConsoleCommand, TunnelAction};

#[derive(Parser, Debug)]
#[command(name = "mcpanel", about = "Operator console for a game-server control plane")]
struct Args {
    /// Control server base URL. Overrides MCPANEL_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,
    /// Push channel URL. Overrides MCPANEL_PUSH_URL.
    #[arg(long)]
    push_url: Option<String>,
    /// Request timeout in milliseconds. Overrides MCPANEL_TIMEOUT_MS.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Log lines kept per process. Overrides MCPANEL_LOG_CAPACITY.
    #[arg(long)]
    log_capacity: Option<usize>,
}

impl Args {
    /// Flag value for a config key.
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "MCPANEL_BASE_URL" => self.base_url.clone(),
            "MCPANEL_PUSH_URL" => self.push_url.clone(),
            "MCPANEL_TIMEOUT_MS" => self.timeout_ms.map(|value| value.to_string()),
            "MCPANEL_LOG_CAPACITY" => self.log_capacity.map(|value| value.to_string()),
            _ => None,
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Console {
    session: ControlSession,
    client: Arc<ControlClient>,
    push: Arc<PushChannel>,
    reconnecting: Option<JoinHandle<()>>,
    completions: mpsc::UnboundedSender<CommandCompletion>,
}

impl Console {
    /// Starts reconnecting the push channel unless an attempt is running.
    fn reconnect_push(&mut self) {
        if self
            .reconnecting
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }
        let push = Arc::clone(&self.push);
        self.reconnecting = Some(tokio::spawn(async move {
            push.reconnect().await;
        }));
    }

    fn push_event(&mut self, event: PushEvent) {
        let dropped = event == PushEvent::Disconnected;
        let follow_up = self.session.apply_push(event);
        self.spawn_all(follow_up);
        if dropped && !self.session.shutdown_requested() {
            render::notice("push channel lost, reconnecting");
            self.reconnect_push();
        }
    }

    fn spawn(&self, command: PendingCommand) {
        let client = Arc::clone(&self.client);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let completion = execute(client.as_ref(), command).await;
            if completions.send(completion).is_err() {
                warn!("console loop gone, completion dropped");
            }
        });
    }

    fn spawn_all(&self, commands: Vec<PendingCommand>) {
        for command in commands {
            self.spawn(command);
        }
    }

    fn run(&self, result: Result<PendingCommand, ActionError>) {
        match result {
            Ok(command) => self.spawn(command),
            Err(error) => render::error(&error),
        }
    }

    fn edit(&self, result: Result<(), ActionError>) {
        match result {
            Ok(()) => {
                if let Some(form) = self.session.renderer().form() {
                    render::form(form);
                }
            }
            Err(error) => render::error(&error),
        }
    }

    fn handle(&mut self, command: ConsoleCommand) -> Flow {
        match command {
            ConsoleCommand::Start { xmx, xms, world } => {
                let options = StartOptions {
                    max_memory_gb: xmx,
                    min_memory_gb: xms,
                    world_type: world,
                };
                let result = self.session.begin_start(ProcessId::Primary, &options);
                self.run(result);
            }
            ConsoleCommand::Stop => {
                let result = self.session.begin_stop(ProcessId::Primary);
                self.run(result);
            }
            ConsoleCommand::Tunnel { kind, action } => {
                let process = kind.kind().process();
                let result = match action {
                    TunnelAction::Start => {
                        self.session.begin_start(process, &StartOptions::default())
                    }
                    TunnelAction::Stop => self.session.begin_stop(process),
                };
                self.run(result);
            }
            ConsoleCommand::Cmd { text } => {
                let result = self.session.begin_console_command(&text.join(" "));
                self.run(result);
            }
            ConsoleCommand::Say { text } => {
                let result = self
                    .session
                    .begin_console_command(&format!("say {}", text.join(" ")));
                self.run(result);
            }
            ConsoleCommand::Quick { action, player } => {
                let Some(action) = QuickAction::parse(&action) else {
                    let names = QuickAction::ALL.map(QuickAction::as_str).join(", ");
                    render::notice(&format!("unknown action {action}; expected one of {names}"));
                    return Flow::Continue;
                };
                match self.session.begin_quick(action, player.as_deref()) {
                    Ok(Step::Issue(command)) => self.spawn(command),
                    Ok(Step::Confirm(consequence)) => render::confirmation(consequence),
                    Err(error) => render::error(&error),
                }
            }
            ConsoleCommand::Backups => {
                render::backups(&self.session);
                let command = self.session.begin_list_backups();
                self.spawn(command);
            }
            ConsoleCommand::Backup => {
                let command = self.session.begin_create_backup();
                self.spawn(command);
            }
            ConsoleCommand::Restore { file } => {
                let result = self.session.begin_restore(&file);
                announce(result);
            }
            ConsoleCommand::Props => match self.session.begin_load_properties() {
                Ok(commands) if commands.is_empty() => {
                    if let Some(form) = self.session.renderer().form() {
                        render::form(form);
                    } else {
                        render::notice("server properties are loading");
                    }
                }
                Ok(commands) => self.spawn_all(commands),
                Err(error) => render::error(&error),
            },
            ConsoleCommand::Set { key, value } => {
                let result = self.session.edit_property(&key, &value.join(" "));
                self.edit(result);
            }
            ConsoleCommand::Check { key } => {
                let result = self.session.set_property_checked(&key, true);
                self.edit(result);
            }
            ConsoleCommand::Uncheck { key } => {
                let result = self.session.set_property_checked(&key, false);
                self.edit(result);
            }
            ConsoleCommand::SaveProps => {
                let result = self.session.begin_save_properties();
                self.run(result);
            }
            ConsoleCommand::Jar { path } => match path {
                Some(path) => {
                    let result = self.session.begin_set_jar_path(&path);
                    self.run(result);
                }
                None => {
                    let command = self.session.begin_load_jar_path();
                    self.spawn(command);
                }
            },
            ConsoleCommand::Shutdown => {
                let result = self.session.begin_stop_all();
                announce(result);
            }
            ConsoleCommand::Yes { consequence } => {
                let result = self
                    .session
                    .confirm(Acknowledgement::Affirm(consequence.consequence()));
                self.run(result);
            }
            ConsoleCommand::No => match self.session.confirm(Acknowledgement::Decline) {
                Err(ActionError::GateBlocked(GateBlock::Declined { .. })) => {
                    render::notice("cancelled");
                }
                Err(error) => render::error(&error),
                Ok(command) => self.spawn(command),
            },
            ConsoleCommand::Status => render::status(&self.session),
            ConsoleCommand::Reconnect => {
                if self.session.reconciler().is_connected() {
                    render::notice("push channel already connected");
                } else {
                    render::notice("reconnecting push channel");
                    self.reconnect_push();
                }
            }
            ConsoleCommand::Refresh => {
                let commands = self.session.begin_refresh();
                self.spawn_all(commands);
            }
            ConsoleCommand::Logs { process, lines } => {
                render::logs(&self.session.view(process.process()), lines);
            }
            ConsoleCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn complete(&mut self, completion: CommandCompletion) {
        match self.session.complete(completion) {
            Ok(outcome) => {
                render::outcome(&outcome);
                if outcome == CommandOutcome::Properties(LoadProgress::Ready)
                    && let Some(form) = self.session.renderer().form()
                {
                    render::form(form);
                }
            }
            Err(error) => render::error(&error),
        }
    }

    fn flush(&mut self) {
        for update in self.session.drain_updates() {
            render::update(&update);
        }
    }
}

fn announce(result: Result<Consequence, ActionError>) {
    match result {
        Ok(consequence) => render::confirmation(consequence),
        Err(error) => render::error(&error),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config =
        ConsoleConfig::from_env_with(|key| args.lookup(key)).context("load console config")?;
    info!(
        base_url = %config.base_url,
        push_url = %config.push_url,
        "starting console"
    );

    let client = ControlClient::new(config.client_config()).context("build control client")?;
    let push = Arc::new(PushChannel::new(&config.push_url).context("configure push channel")?);
    let (completions, mut completed) = mpsc::unbounded_channel();
    let mut console = Console {
        session: ControlSession::new(config.session_config()),
        client: Arc::new(client),
        push: Arc::clone(&push),
        reconnecting: None,
        completions,
    };

    let bootstrap = console.session.begin_bootstrap();
    console.spawn_all(bootstrap);
    if let Err(error) = push.connect().await {
        warn!(%error, "push channel unavailable, retrying in the background");
        let refresh = console.session.begin_refresh();
        console.spawn_all(refresh);
        console.reconnect_push();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    break;
                };
                match repl::parse_line(&line) {
                    Ok(Some(command)) => {
                        if matches!(console.handle(command), Flow::Quit) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(error) => render::usage(&error.to_string()),
                }
            }
            Some(item) = push.recv() => match item {
                Ok(event) => console.push_event(event),
                Err(error) => warn!(%error, "push frame rejected"),
            },
            Some(completion) = completed.recv() => console.complete(completion),
        }
        console.flush();
        if console.session.shutdown_complete() {
            render::notice("control server stopped");
            break;
        }
    }

    if let Some(task) = console.reconnecting.take() {
        task.abort();
    }
    if let Err(error) = push.disconnect().await {
        warn!(%error, "push channel close failed");
    }
    Ok(())
}
