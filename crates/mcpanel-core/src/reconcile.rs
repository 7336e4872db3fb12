//! Reconciliation engine.
//!
//! Push events, status refreshes and request settlements all flow through
//! [`Reconciler::dispatch`], which is the only writer of the lifecycle store.

use mcpanel_proto::{ProcessId, PushEvent, StatusReport};
use tracing::info;

use crate::store::{
    ApplyDecision, CommandTicket, LifecycleIntent, LifecycleStore, SettleDecision, StoreError,
    StoreUpdate, slot,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// Event from the push channel.
    Push(PushEvent),
    /// Status read back through a request/response call.
    Refreshed(StatusReport),
    /// Outcome of the request behind an optimistic transition.
    Settled {
        ticket: CommandTicket,
        succeeded: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Connected,
    Reset { changed: usize },
    Status {
        process: ProcessId,
        decision: ApplyDecision,
    },
    LogAppended { process: ProcessId },
    Settled(SettleDecision),
}

/// Per-process counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileStats {
    pub applied: u64,
    pub duplicates: u64,
    pub stale: u64,
    pub log_lines: u64,
    pub confirmed: u64,
    pub reverted: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    store: LifecycleStore,
    stats: [ReconcileStats; 3],
    connected: bool,
    superseded: u64,
}

impl Reconciler {
    #[must_use]
    pub fn new(store: LifecycleStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn store(&self) -> &LifecycleStore {
        &self.store
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn stats(&self, process: ProcessId) -> ReconcileStats {
        self.stats[slot(process)]
    }

    #[must_use]
    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    pub fn begin(
        &mut self,
        process: ProcessId,
        intent: LifecycleIntent,
    ) -> Result<CommandTicket, StoreError> {
        self.store.begin(process, intent)
    }

    pub fn drain_updates(&mut self) -> Vec<StoreUpdate> {
        self.store.drain_updates()
    }

    pub fn dispatch(&mut self, event: ControlEvent) -> Reconciled {
        match event {
            ControlEvent::Push(PushEvent::Connected) => {
                self.connected = true;
                info!("push channel live");
                Reconciled::Connected
            }
            ControlEvent::Push(PushEvent::Disconnected) => {
                self.connected = false;
                let changed = self.store.disconnect();
                Reconciled::Reset { changed }
            }
            ControlEvent::Push(PushEvent::Status(report)) | ControlEvent::Refreshed(report) => {
                let decision = self.store.apply_status(&report);
                let stats = &mut self.stats[slot(report.process)];
                match decision {
                    ApplyDecision::Applied { .. } => stats.applied += 1,
                    ApplyDecision::Duplicate { .. } => stats.duplicates += 1,
                    ApplyDecision::Stale { .. } => stats.stale += 1,
                }
                Reconciled::Status {
                    process: report.process,
                    decision,
                }
            }
            ControlEvent::Push(PushEvent::Log(line)) => {
                self.stats[slot(line.process)].log_lines += 1;
                self.store.apply_log_line(line.process, line.text);
                Reconciled::LogAppended {
                    process: line.process,
                }
            }
            ControlEvent::Settled { ticket, succeeded } => {
                let decision = self.store.settle(ticket, succeeded);
                match decision {
                    SettleDecision::Confirmed { process, .. } => {
                        self.stats[slot(process)].confirmed += 1;
                    }
                    SettleDecision::Reverted { process, .. } => {
                        self.stats[slot(process)].reverted += 1;
                    }
                    SettleDecision::Superseded { .. } => self.superseded += 1,
                }
                Reconciled::Settled(decision)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mcpanel_proto::{LogLine, ProcessStatus};

    use super::*;

    fn status(process: ProcessId, status: ProcessStatus) -> ControlEvent {
        ControlEvent::Push(PushEvent::Status(StatusReport::new(process, status)))
    }

    fn log(process: ProcessId, text: &str) -> ControlEvent {
        ControlEvent::Push(PushEvent::Log(LogLine {
            process,
            text: text.to_string(),
        }))
    }

    #[test]
    fn scenario_start_interrupted_by_authoritative_stop() {
        let mut engine = Reconciler::default();
        engine.dispatch(ControlEvent::Push(PushEvent::Connected));
        engine.dispatch(status(ProcessId::Primary, ProcessStatus::Stopped));

        let ticket = engine.begin(ProcessId::Primary, LifecycleIntent::Start);
        assert!(ticket.is_ok());
        assert_eq!(
            engine.store().status(ProcessId::Primary),
            ProcessStatus::Starting
        );

        engine.dispatch(status(ProcessId::Primary, ProcessStatus::Stopped));
        assert_eq!(
            engine.store().status(ProcessId::Primary),
            ProcessStatus::Stopped
        );
        assert_eq!(engine.stats(ProcessId::Primary).applied, 2);
    }

    #[test]
    fn interleaved_logs_keep_per_process_order() {
        let mut engine = Reconciler::default();
        let events = vec![
            log(ProcessId::Primary, "p1"),
            log(ProcessId::TunnelA, "a1"),
            log(ProcessId::Primary, "p2"),
            log(ProcessId::TunnelB, "b1"),
            log(ProcessId::Primary, "p2"),
            log(ProcessId::TunnelA, "a2"),
        ];
        for event in events {
            engine.dispatch(event);
        }

        let primary = engine.store().view(ProcessId::Primary);
        assert_eq!(primary.logs.iter().collect::<Vec<_>>(), vec!["p1", "p2", "p2"]);
        let tunnel_a = engine.store().view(ProcessId::TunnelA);
        assert_eq!(tunnel_a.logs.iter().collect::<Vec<_>>(), vec!["a1", "a2"]);
        assert_eq!(engine.stats(ProcessId::Primary).log_lines, 3);
    }

    #[test]
    fn duplicates_and_refreshes_share_one_ordering() {
        let mut engine = Reconciler::default();
        engine.dispatch(ControlEvent::Refreshed(StatusReport::new(
            ProcessId::TunnelB,
            ProcessStatus::Running,
        )));
        let decision = engine.dispatch(status(ProcessId::TunnelB, ProcessStatus::Running));
        assert_eq!(
            decision,
            Reconciled::Status {
                process: ProcessId::TunnelB,
                decision: ApplyDecision::Duplicate {
                    status: ProcessStatus::Running
                }
            }
        );
        assert_eq!(engine.stats(ProcessId::TunnelB).duplicates, 1);
        assert_eq!(engine.drain_updates().len(), 1);
    }

    #[test]
    fn disconnect_resets_and_settlements_after_it_are_superseded() {
        let mut engine = Reconciler::default();
        engine.dispatch(ControlEvent::Push(PushEvent::Connected));
        for process in ProcessId::ALL {
            engine.dispatch(status(process, ProcessStatus::Stopped));
        }
        let Ok(ticket) = engine.begin(ProcessId::TunnelA, LifecycleIntent::Start) else {
            unreachable!("start from Stopped is allowed");
        };

        assert_eq!(
            engine.dispatch(ControlEvent::Push(PushEvent::Disconnected)),
            Reconciled::Reset { changed: 3 }
        );
        assert!(!engine.is_connected());
        assert_eq!(
            engine.dispatch(ControlEvent::Settled {
                ticket,
                succeeded: true
            }),
            Reconciled::Settled(SettleDecision::Superseded { ticket })
        );
        assert_eq!(
            engine.store().status(ProcessId::TunnelA),
            ProcessStatus::Unknown
        );
        assert_eq!(engine.superseded(), 1);
    }
}
