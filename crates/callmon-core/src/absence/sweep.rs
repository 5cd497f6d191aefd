//! Periodic matching of unanswered callers against the call history

use std::collections::HashSet;
use std::sync::Arc;

use chrono::TimeDelta;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{NotificationPipeline, PendingCall, PendingReceiver};
use crate::collaborators::{CallRecord, CallType, DeviceControl};
use crate::config::AbsenceConfig;

pub struct AbsenceSweep {
    device: Arc<dyn DeviceControl>,
    pipeline: NotificationPipeline,
    config: AbsenceConfig,
    incoming: PendingReceiver,
    pending: Vec<PendingCall>,
    /// Ids of notified records still inside the history window
    notified: HashSet<String>,
}

/// History dates have minute resolution and come from the device clock
fn ring_tolerance() -> TimeDelta {
    TimeDelta::minutes(2)
}

impl AbsenceSweep {
    pub fn new(
        device: Arc<dyn DeviceControl>,
        pipeline: NotificationPipeline,
        config: &AbsenceConfig,
        incoming: PendingReceiver,
    ) -> Self {
        Self {
            device,
            pipeline,
            config: config.clone(),
            incoming,
            pending: Vec::new(),
            notified: HashSet::new(),
        }
    }

    /// Calls still waiting for their history record
    pub fn pending(&self) -> &[PendingCall] {
        &self.pending
    }

    /// Number of notified record ids kept to avoid notifying twice
    pub fn remembered(&self) -> usize {
        self.notified.len()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Sweep once per interval, forever
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// Match every pending call against the recent call history and notify
    /// about the newest matching record. A record matches when it is
    /// unattended, from the same caller, not notified yet and not older than
    /// the ring. Returns the notified records.
    pub async fn sweep_once(&mut self) -> Vec<CallRecord> {
        while let Ok(call) = self.incoming.try_recv() {
            self.pending.push(call);
        }
        if self.pending.is_empty() {
            return Vec::new();
        }

        let mut history = match self.device.call_history(self.config.history_days).await {
            Ok(history) => history,
            Err(e) => {
                warn!("Cannot read call history, {} caller(s) stay pending: {}", self.pending.len(), e);
                return Vec::new();
            }
        };
        history.sort_by(|a, b| b.date.cmp(&a.date));

        // Records that left the window cannot match again
        let in_window: HashSet<&str> = history.iter().map(|call| call.id.as_str()).collect();
        self.notified.retain(|id| in_window.contains(id.as_str()));

        let mut notified = Vec::new();
        let mut still_pending = Vec::new();

        for pending in std::mem::take(&mut self.pending) {
            let earliest = pending.rang_at - ring_tolerance();
            let matched = history.iter().find(|call| {
                call.date >= earliest
                    && !self.notified.contains(&call.id)
                    && self.is_unattended(call)
                    && caller_matches(&pending.caller, &call.caller)
            });
            match matched {
                Some(call) => {
                    self.notified.insert(call.id.clone());
                    if !self.pipeline.notify(call).await {
                        warn!("Notification for call {} could not be delivered", call.id);
                    }
                    notified.push(call.clone());
                }
                None => {
                    debug!("No history record for call {} from {} yet", pending.call_id, pending.caller);
                    still_pending.push(pending);
                }
            }
        }

        self.pending = still_pending;
        if !notified.is_empty() {
            info!("Notified {} call(s), {} pending", notified.len(), self.pending.len());
        }
        notified
    }

    /// Taken by the answering machine, or missed altogether
    fn is_unattended(&self, call: &CallRecord) -> bool {
        match call.call_type {
            CallType::Incoming => call.port == self.config.answering_machine_port,
            CallType::Missed => true,
            _ => false,
        }
    }
}

/// The tracked value is the raw RING caller field, which may carry more than
/// the history's caller number
fn caller_matches(pending: &str, history_caller: &str) -> bool {
    if history_caller.is_empty() {
        pending.is_empty()
    } else {
        pending.contains(history_caller)
    }
}
