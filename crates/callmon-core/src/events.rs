//! Messages and call events flowing from the gateway socket to the workers
//!
//! The listener publishes every raw line it reads into each subscriber queue.
//! Each queue is an independent unbounded FIFO, so every consumer sees the
//! stream in socket order, while no ordering holds *between* consumers.
//!
//! ```text
//! gateway socket ──► EventListener ──► EventHub ──┬──► queue A ──► BackwardSearchWorker
//!                                                  └──► queue B ──► AbsenceTracker
//! ```

use std::fmt;
use std::sync::Mutex;

use bytes::Bytes;
use chrono::NaiveDateTime;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sentinel published when the gateway closed the connection
pub const CONNECTION_LOST: &str = "CONNECTION_LOST";
/// Sentinel asking consumers to reload their view of external state
pub const REFRESH: &str = "REFRESH";

/// One item on a subscriber queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorMessage {
    /// A raw, non-empty line as read from the socket (line terminator removed)
    Line(Bytes),
    /// The gateway connection was lost; a reconnect is under way
    ConnectionLost,
    /// External state changed; consumers should refresh cached views
    Refresh,
}

impl MonitorMessage {
    pub fn line(text: impl Into<Bytes>) -> Self {
        Self::Line(text.into())
    }
}

impl fmt::Display for MonitorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Self::ConnectionLost => f.write_str(CONNECTION_LOST),
            Self::Refresh => f.write_str(REFRESH),
        }
    }
}

pub type MonitorReceiver = mpsc::UnboundedReceiver<MonitorMessage>;

/// Fan-out point for the subscriber queues
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<MonitorMessage>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new queue. Only messages published afterwards are delivered.
    pub fn subscribe(&self) -> MonitorReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    pub fn publish_line(&self, line: Bytes) {
        self.publish(MonitorMessage::Line(line));
    }

    pub fn publish_connection_lost(&self) {
        self.publish(MonitorMessage::ConnectionLost);
    }

    pub fn request_refresh(&self) {
        self.publish(MonitorMessage::Refresh);
    }

    /// Deliver a copy of `message` to every live queue, dropping closed ones
    pub fn publish(&self, message: MonitorMessage) {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        let dropped = before - subscribers.len();
        if dropped > 0 {
            warn!("Dropped {} closed subscriber queue(s)", dropped);
        }
        debug!("Published {} to {} queue(s)", message, subscribers.len());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<MonitorMessage>>> {
        // A poisoned list is still a valid list of senders.
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A classified call monitor event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    /// Gateway timestamp, when the line carried one
    pub timestamp: Option<NaiveDateTime>,
    pub call_id: String,
    pub kind: CallEventKind,
    /// Trailing fields not covered by the fixed layout, in order
    pub extra: Vec<String>,
}

/// Kind-specific fixed field layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEventKind {
    /// Incoming call is ringing: `RING;id;caller;called;line`
    Ring {
        caller: String,
        called: String,
        line: Option<String>,
    },
    /// Outgoing call is dialed: `CALL;id;extension;caller;called;line`
    Call {
        extension: String,
        caller: String,
        called: String,
        line: Option<String>,
    },
    /// Call was picked up: `CONNECT;id;port;caller`
    Connect { port: String, caller: String },
    /// Call ended: `DISCONNECT;id;duration`
    Disconnect { duration_secs: u64 },
}

impl CallEvent {
    /// Number of the remote party, the one worth a reverse lookup
    pub fn remote_number(&self) -> Option<&str> {
        let number = match &self.kind {
            CallEventKind::Ring { caller, .. } => caller,
            CallEventKind::Call { called, .. } => called,
            _ => return None,
        };
        if number.is_empty() {
            None
        } else {
            Some(number.as_str())
        }
    }

    /// Third positional field: caller for RING/CALL, port for CONNECT
    pub fn caller_or_port(&self) -> &str {
        match &self.kind {
            CallEventKind::Ring { caller, .. } => caller,
            CallEventKind::Call { extension, .. } => extension,
            CallEventKind::Connect { port, .. } => port,
            CallEventKind::Disconnect { .. } => "",
        }
    }
}

impl CallEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ring { .. } => "RING",
            Self::Call { .. } => "CALL",
            Self::Connect { .. } => "CONNECT",
            Self::Disconnect { .. } => "DISCONNECT",
        }
    }
}

impl fmt::Display for CallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CallEventKind::Ring { caller, called, .. } => {
                write!(f, "RING #{} {} -> {}", self.call_id, caller, called)
            }
            CallEventKind::Call {
                extension,
                caller,
                called,
                ..
            } => write!(
                f,
                "CALL #{} ext {} {} -> {}",
                self.call_id, extension, caller, called
            ),
            CallEventKind::Connect { port, caller } => {
                write!(f, "CONNECT #{} port {} {}", self.call_id, port, caller)
            }
            CallEventKind::Disconnect { duration_secs } => {
                write!(f, "DISCONNECT #{} after {}s", self.call_id, duration_secs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_queue_gets_every_message_in_order() {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.publish_line(Bytes::from_static(b"RING;1;123;456;"));
        hub.publish_connection_lost();
        hub.publish_line(Bytes::from_static(b"DISCONNECT;1;0;"));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await, Some(MonitorMessage::line("RING;1;123;456;")));
            assert_eq!(rx.recv().await, Some(MonitorMessage::ConnectionLost));
            assert_eq!(rx.recv().await, Some(MonitorMessage::line("DISCONNECT;1;0;")));
        }
    }

    #[tokio::test]
    async fn test_closed_queue_is_pruned() {
        let hub = EventHub::new();
        let mut kept = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.subscriber_count(), 2);

        hub.request_refresh();
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(kept.recv().await, Some(MonitorMessage::Refresh));
    }

    #[test]
    fn test_remote_number() {
        let ring = CallEvent {
            timestamp: None,
            call_id: "0".into(),
            kind: CallEventKind::Ring {
                caller: "0612345".into(),
                called: "987".into(),
                line: None,
            },
            extra: vec![],
        };
        assert_eq!(ring.remote_number(), Some("0612345"));

        let call = CallEvent {
            kind: CallEventKind::Call {
                extension: "1".into(),
                caller: "987".into(),
                called: "0800111".into(),
                line: None,
            },
            ..ring.clone()
        };
        assert_eq!(call.remote_number(), Some("0800111"));

        let anonymous = CallEvent {
            kind: CallEventKind::Ring {
                caller: String::new(),
                called: "987".into(),
                line: None,
            },
            ..ring
        };
        assert_eq!(anonymous.remote_number(), None);
    }
}
