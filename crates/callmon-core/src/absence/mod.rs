//! Notification about calls nobody picked up
//!
//! [`AbsenceTracker`] follows every incoming call on its own copy of the
//! monitor stream:
//!
//! ```text
//! RING ──► Ringing ──CONNECT──► answered, forgotten
//!             │
//!             └──DISCONNECT──► caller handed to the sweep
//! ```
//!
//! [`AbsenceSweep`] later finds the matching call history record and hands it
//! to the [`NotificationPipeline`].

pub mod notify;
pub mod sweep;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::{classify_message, Classified};
use crate::events::{CallEvent, CallEventKind, MonitorMessage, MonitorReceiver};

pub use notify::NotificationPipeline;
pub use sweep::AbsenceSweep;

/// Receiving end of the unresolved caller channel
pub type PendingReceiver = mpsc::UnboundedReceiver<PendingCall>;

/// An incoming call that has not been answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub call_id: String,
    /// The RING's caller field
    pub caller: String,
    /// When the call started ringing; history records older than this
    /// belong to earlier calls
    pub rang_at: NaiveDateTime,
}

impl PendingCall {
    pub fn new(call_id: impl Into<String>, caller: impl Into<String>, rang_at: NaiveDateTime) -> Self {
        Self {
            call_id: call_id.into(),
            caller: caller.into(),
            rang_at,
        }
    }
}

/// Per-call state machine over the monitor stream
pub struct AbsenceTracker {
    ringing: HashMap<String, PendingCall>,
    unresolved: mpsc::UnboundedSender<PendingCall>,
    pacing: Duration,
}

impl AbsenceTracker {
    /// Create a tracker and the channel its unanswered callers arrive on
    pub fn new() -> (Self, PendingReceiver) {
        let (unresolved, receiver) = mpsc::unbounded_channel();
        let tracker = Self {
            ringing: HashMap::new(),
            unresolved,
            pacing: Duration::ZERO,
        };
        (tracker, receiver)
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Calls currently ringing
    pub fn ringing(&self) -> usize {
        self.ringing.len()
    }

    pub fn spawn(self, queue: MonitorReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(queue))
    }

    pub async fn run(mut self, mut queue: MonitorReceiver) {
        while let Some(message) = queue.recv().await {
            match classify_message(&message) {
                Classified::Event(event) => {
                    self.on_event(&event);
                }
                Classified::Control(MonitorMessage::ConnectionLost) => self.on_connection_lost(),
                Classified::Control(_) | Classified::Skipped => {}
            }
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }
        info!("Absence queue closed");
    }

    /// Advance the state machine. Returns the call handed to the sweep,
    /// if this event completed an unanswered call.
    pub fn on_event(&mut self, event: &CallEvent) -> Option<PendingCall> {
        match &event.kind {
            CallEventKind::Ring { caller, .. } => {
                let rang_at = event
                    .timestamp
                    .unwrap_or_else(|| Local::now().naive_local());
                self.ringing.insert(
                    event.call_id.clone(),
                    PendingCall::new(event.call_id.clone(), caller.clone(), rang_at),
                );
                debug!("Call {} ringing, {} in flight", event.call_id, self.ringing.len());
                None
            }
            CallEventKind::Connect { .. } => {
                if self.ringing.remove(&event.call_id).is_some() {
                    debug!("Call {} answered", event.call_id);
                }
                None
            }
            CallEventKind::Disconnect { .. } => {
                let call = self.ringing.remove(&event.call_id)?;
                info!("Call {} from {} was not answered", call.call_id, call.caller);
                if self.unresolved.send(call.clone()).is_err() {
                    warn!("Absence sweep is gone, dropping caller {}", call.caller);
                }
                Some(call)
            }
            CallEventKind::Call { .. } => None,
        }
    }

    /// Call ids are only meaningful within one connection
    pub fn on_connection_lost(&mut self) {
        if !self.ringing.is_empty() {
            info!("Connection lost, forgetting {} ringing call(s)", self.ringing.len());
            self.ringing.clear();
        }
    }
}
