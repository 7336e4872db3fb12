//! Plain-text view on stdout. Logs go to stderr, so this is the only module
//! that prints.

#![expect(clippy::print_stdout)]

use mcpanel_core::{
    ActionError, CommandOutcome, Consequence, ControlSession, PropertyForm, Reconciled,
    SettleDecision, StoreUpdate, Widget,
};
use mcpanel_core::store::ProcessView;
use mcpanel_proto::ProcessId;

pub fn update(update: &StoreUpdate) {
    match update {
        StoreUpdate::Transition {
            process,
            from,
            to,
            cause,
        } => println!("[{}] {from} -> {to} ({})", process.label(), cause.as_str()),
        StoreUpdate::LogAppended { process, line } => println!("[{}] {line}", process.label()),
    }
}

pub fn outcome(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Lifecycle {
            process,
            intent,
            reconciled,
        } => {
            if let Reconciled::Settled(SettleDecision::Superseded { .. }) = reconciled {
                println!(
                    "{} {intent} accepted, but the server had already reported a newer status",
                    process.label()
                );
            } else {
                println!("{} {intent} accepted", process.label());
            }
        }
        CommandOutcome::Refreshed(_) => {}
        CommandOutcome::Sent { message } => {
            println!("sent{}", suffix(message.as_deref()));
        }
        CommandOutcome::Backups { count } => println!("{count} backup(s) available"),
        CommandOutcome::BackupCreated { filename } => match filename {
            Some(filename) => println!("backup created: {filename}"),
            None => println!("backup created"),
        },
        CommandOutcome::Restored { filename, message } => {
            println!("restored {filename}{}", suffix(message.as_deref()));
        }
        CommandOutcome::JarPath { jar_path } | CommandOutcome::JarPathSaved { jar_path } => {
            if jar_path.is_empty() {
                println!("jar path: <not set>");
            } else {
                println!("jar path: {jar_path}");
            }
        }
        CommandOutcome::Properties(_) => {}
        CommandOutcome::PropertiesSaved { count, kept_edits } => {
            println!("saved {count} properties");
            if *kept_edits {
                println!("(edits made during the save are still unsaved)");
            }
        }
        CommandOutcome::ShutdownRequested { message } => {
            println!("shutdown requested{}", suffix(message.as_deref()));
        }
    }
}

pub fn error(error: &ActionError) {
    println!("error: {error}");
}

pub fn usage(text: &str) {
    println!("{}", text.trim_end());
}

pub fn notice(text: &str) {
    println!("{text}");
}

pub fn confirmation(consequence: Consequence) {
    println!(
        "confirm: {}. type `yes {consequence}` to proceed or `no` to cancel",
        consequence.describe()
    );
}

pub fn status(session: &ControlSession) {
    let connection = if session.reconciler().is_connected() {
        "connected"
    } else {
        "disconnected"
    };
    println!("push channel: {connection}");
    for process in ProcessId::ALL {
        let view = session.view(process);
        let pending = view
            .pending
            .map(|intent| format!(" ({intent} pending)"))
            .unwrap_or_default();
        println!("  {:<12} {}{pending}", process.label(), view.status);
    }
    if let Some(jar_path) = session.jar_path() {
        println!("  jar path     {jar_path}");
    }
}

pub fn logs(view: &ProcessView<'_>, count: usize) {
    if view.logs.is_empty() {
        println!("no output from {}", view.process.label());
        return;
    }
    if view.logs.evicted() > 0 {
        println!("({} older line(s) dropped)", view.logs.evicted());
    }
    for line in view.logs.tail(count) {
        println!("{line}");
    }
}

pub fn backups(session: &ControlSession) {
    let catalog = session.catalog();
    if catalog.is_empty() {
        println!("no backups");
        return;
    }
    for filename in catalog.iter() {
        println!("  {filename}");
    }
}

pub fn form(form: &PropertyForm) {
    for field in form.fields() {
        let value = match &field.widget {
            Widget::Checkbox { checked } => if *checked { "[x]" } else { "[ ]" }.to_string(),
            Widget::Number { value } | Widget::Text { value } => value.clone(),
            Widget::Select { options } => options
                .iter()
                .map(|option| {
                    if option.selected {
                        format!("<{}>", option.value)
                    } else {
                        option.value.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" | "),
        };
        if field.label == field.key {
            println!("  {:<32} {value}", field.key);
        } else {
            println!("  {:<32} {value}  ({})", field.key, field.label);
        }
    }
    if form.is_dirty() {
        println!("(unsaved changes, `save-props` to apply)");
    }
}

fn suffix(message: Option<&str>) -> String {
    message.map(|text| format!(": {text}")).unwrap_or_default()
}
