//! Lifecycle state store.
//!
//! One handle per supervised process. A handle keeps the last authoritative
//! status plus, at most, one optimistic overlay created by an outstanding
//! start/stop request. The visible status is the overlay when present,
//! otherwise the authoritative status. Every observable change is queued as a
//! [`StoreUpdate`] for the presentation layer to drain.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use mcpanel_proto::{ProcessId, ProcessStatus, StatusReport};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_LOG_CAPACITY: usize = 1_000;

/// Identifies one optimistic transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandTicket(u64);

impl CommandTicket {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleIntent {
    Start,
    Stop,
}

impl LifecycleIntent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    /// Status shown while the request is in flight.
    #[must_use]
    pub const fn optimistic(self) -> ProcessStatus {
        match self {
            Self::Start => ProcessStatus::Starting,
            Self::Stop => ProcessStatus::Stopping,
        }
    }

    /// Status a successful response confirms.
    #[must_use]
    pub const fn settled(self) -> ProcessStatus {
        match self {
            Self::Start => ProcessStatus::Running,
            Self::Stop => ProcessStatus::Stopped,
        }
    }
}

impl fmt::Display for LifecycleIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    Requested,
    Authoritative,
    Confirmed,
    Reverted,
    Disconnected,
}

impl TransitionCause {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Authoritative => "authoritative",
            Self::Confirmed => "confirmed",
            Self::Reverted => "reverted",
            Self::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUpdate {
    Transition {
        process: ProcessId,
        from: ProcessStatus,
        to: ProcessStatus,
        cause: TransitionCause,
    },
    LogAppended {
        process: ProcessId,
        line: String,
    },
}

/// Result of applying an authoritative status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyDecision {
    Applied {
        from: ProcessStatus,
        to: ProcessStatus,
    },
    Duplicate {
        status: ProcessStatus,
    },
    Stale {
        status: ProcessStatus,
        last_emitted_at: DateTime<Utc>,
    },
}

/// Result of settling an optimistic transition with its request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleDecision {
    Confirmed {
        process: ProcessId,
        status: ProcessStatus,
    },
    Reverted {
        process: ProcessId,
        to: ProcessStatus,
    },
    /// The overlay was already cleared by an authoritative report or
    /// replaced by a later request.
    Superseded { ticket: CommandTicket },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{process} cannot {intent} while {status}")]
    InvalidTransition {
        process: ProcessId,
        intent: LifecycleIntent,
        status: ProcessStatus,
    },
}

/// Bounded, append-only log buffer. The oldest line is evicted when full.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    evicted: u64,
}

impl LogBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
            self.evicted = self.evicted.saturating_add(1);
        }
        self.lines.push_back(line);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.lines.iter().map(String::as_str)
    }

    /// Last `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .skip(self.lines.len().saturating_sub(count))
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTransition {
    ticket: CommandTicket,
    intent: LifecycleIntent,
}

#[derive(Debug, Clone)]
struct ProcessHandle {
    process: ProcessId,
    authoritative: ProcessStatus,
    pending: Option<PendingTransition>,
    last_emitted_at: Option<DateTime<Utc>>,
    logs: LogBuffer,
}

impl ProcessHandle {
    fn new(process: ProcessId, log_capacity: usize) -> Self {
        Self {
            process,
            authoritative: ProcessStatus::Unknown,
            pending: None,
            last_emitted_at: None,
            logs: LogBuffer::new(log_capacity),
        }
    }

    fn status(&self) -> ProcessStatus {
        self.pending
            .map_or(self.authoritative, |pending| pending.intent.optimistic())
    }
}

/// Read-only view of one process.
#[derive(Debug, Clone, Copy)]
pub struct ProcessView<'a> {
    pub process: ProcessId,
    pub status: ProcessStatus,
    pub pending: Option<LifecycleIntent>,
    pub logs: &'a LogBuffer,
}

#[derive(Debug, Clone)]
pub struct LifecycleStore {
    handles: [ProcessHandle; 3],
    next_ticket: u64,
    updates: Vec<StoreUpdate>,
}

impl Default for LifecycleStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

pub(crate) const fn slot(process: ProcessId) -> usize {
    match process {
        ProcessId::Primary => 0,
        ProcessId::TunnelA => 1,
        ProcessId::TunnelB => 2,
    }
}

fn push_transition(
    updates: &mut Vec<StoreUpdate>,
    process: ProcessId,
    from: ProcessStatus,
    to: ProcessStatus,
    cause: TransitionCause,
) {
    if from == to {
        return;
    }
    info!(
        process = process.as_str(),
        from = from.as_str(),
        to = to.as_str(),
        cause = cause.as_str(),
        "process status changed"
    );
    updates.push(StoreUpdate::Transition {
        process,
        from,
        to,
        cause,
    });
}

impl LifecycleStore {
    #[must_use]
    pub fn new(log_capacity: usize) -> Self {
        Self {
            handles: ProcessId::ALL.map(|process| ProcessHandle::new(process, log_capacity)),
            next_ticket: 0,
            updates: Vec::new(),
        }
    }

    #[must_use]
    pub fn status(&self, process: ProcessId) -> ProcessStatus {
        self.handles[slot(process)].status()
    }

    #[must_use]
    pub fn view(&self, process: ProcessId) -> ProcessView<'_> {
        let handle = &self.handles[slot(process)];
        ProcessView {
            process,
            status: handle.status(),
            pending: handle.pending.map(|pending| pending.intent),
            logs: &handle.logs,
        }
    }

    pub fn begin_start(&mut self, process: ProcessId) -> Result<CommandTicket, StoreError> {
        self.begin(process, LifecycleIntent::Start)
    }

    pub fn begin_stop(&mut self, process: ProcessId) -> Result<CommandTicket, StoreError> {
        self.begin(process, LifecycleIntent::Stop)
    }

    /// Applies the optimistic transition for `intent`. Start is permitted
    /// from `Stopped`; stop from `Running` or `Starting`. A stop issued while
    /// a start is outstanding replaces the start's overlay.
    pub fn begin(
        &mut self,
        process: ProcessId,
        intent: LifecycleIntent,
    ) -> Result<CommandTicket, StoreError> {
        let handle = &mut self.handles[slot(process)];
        let from = handle.status();
        let allowed = match intent {
            LifecycleIntent::Start => from == ProcessStatus::Stopped,
            LifecycleIntent::Stop => {
                matches!(from, ProcessStatus::Running | ProcessStatus::Starting)
            }
        };
        if !allowed {
            warn!(
                process = process.as_str(),
                intent = intent.as_str(),
                status = from.as_str(),
                "lifecycle request refused"
            );
            return Err(StoreError::InvalidTransition {
                process,
                intent,
                status: from,
            });
        }

        self.next_ticket = self.next_ticket.saturating_add(1);
        let ticket = CommandTicket(self.next_ticket);
        if let Some(replaced) = handle.pending.replace(PendingTransition { ticket, intent }) {
            debug!(
                process = process.as_str(),
                replaced = %replaced.ticket,
                "optimistic transition replaced"
            );
        }
        push_transition(
            &mut self.updates,
            process,
            from,
            intent.optimistic(),
            TransitionCause::Requested,
        );
        Ok(ticket)
    }

    /// Settles the overlay created under `ticket`. Success confirms the
    /// intent's target status; failure drops the overlay so the view falls
    /// back to the last authoritative status. A ticket whose overlay is gone
    /// changes nothing.
    pub fn settle(&mut self, ticket: CommandTicket, succeeded: bool) -> SettleDecision {
        let Some(handle) = self
            .handles
            .iter_mut()
            .find(|handle| handle.pending.is_some_and(|pending| pending.ticket == ticket))
        else {
            debug!(%ticket, succeeded, "settlement for superseded transition ignored");
            return SettleDecision::Superseded { ticket };
        };

        let from = handle.status();
        let process = handle.process;
        let Some(pending) = handle.pending.take() else {
            return SettleDecision::Superseded { ticket };
        };

        if succeeded {
            handle.authoritative = pending.intent.settled();
            push_transition(
                &mut self.updates,
                process,
                from,
                handle.authoritative,
                TransitionCause::Confirmed,
            );
            SettleDecision::Confirmed {
                process,
                status: handle.authoritative,
            }
        } else {
            push_transition(
                &mut self.updates,
                process,
                from,
                handle.authoritative,
                TransitionCause::Reverted,
            );
            SettleDecision::Reverted {
                process,
                to: handle.authoritative,
            }
        }
    }

    /// Applies an authoritative report. It always overrides an optimistic
    /// overlay; a report emitted before the newest applied one is stale.
    pub fn apply_status(&mut self, report: &StatusReport) -> ApplyDecision {
        let handle = &mut self.handles[slot(report.process)];

        if let (Some(incoming), Some(last)) = (report.emitted_at, handle.last_emitted_at)
            && incoming < last
        {
            warn!(
                process = report.process.as_str(),
                status = report.status.as_str(),
                %incoming,
                %last,
                "stale status report dropped"
            );
            return ApplyDecision::Stale {
                status: report.status,
                last_emitted_at: last,
            };
        }

        if report.emitted_at.is_some() {
            handle.last_emitted_at = report.emitted_at;
        }

        if handle.pending.is_none() && handle.authoritative == report.status {
            debug!(
                process = report.process.as_str(),
                status = report.status.as_str(),
                "duplicate status report"
            );
            return ApplyDecision::Duplicate {
                status: report.status,
            };
        }

        let from = handle.status();
        if let Some(pending) = handle.pending.take() {
            debug!(
                process = report.process.as_str(),
                ticket = %pending.ticket,
                "authoritative report cleared optimistic transition"
            );
        }
        handle.authoritative = report.status;
        push_transition(
            &mut self.updates,
            report.process,
            from,
            report.status,
            TransitionCause::Authoritative,
        );
        ApplyDecision::Applied {
            from,
            to: report.status,
        }
    }

    /// Appends a log line. Lines are never deduplicated.
    pub fn apply_log_line(&mut self, process: ProcessId, text: String) {
        self.handles[slot(process)].logs.push(text.clone());
        self.updates.push(StoreUpdate::LogAppended {
            process,
            line: text,
        });
    }

    /// Resets every process to `Unknown` and drops all overlays. Returns how
    /// many processes visibly changed.
    pub fn disconnect(&mut self) -> usize {
        let mut changed = 0;
        for handle in &mut self.handles {
            let from = handle.status();
            handle.pending = None;
            handle.authoritative = ProcessStatus::Unknown;
            handle.last_emitted_at = None;
            if from != ProcessStatus::Unknown {
                changed += 1;
            }
            push_transition(
                &mut self.updates,
                handle.process,
                from,
                ProcessStatus::Unknown,
                TransitionCause::Disconnected,
            );
        }
        changed
    }

    pub fn drain_updates(&mut self) -> Vec<StoreUpdate> {
        std::mem::take(&mut self.updates)
    }
}
