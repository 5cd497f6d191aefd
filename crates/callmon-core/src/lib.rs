//! # Callmon-Core
//!
//! Call monitor for home telephony gateways.
//!
//! This crate provides:
//! - A reconnecting listener for the gateway's call monitor socket
//! - Classification of monitor lines into typed call events
//! - Reverse lookup of unknown callers with progressive number generalization
//!   and a persisted not-found cache
//! - Reconciliation of resolved callers into the device phonebook
//! - Tracking of unanswered calls with voicemail transcription and push
//!   notification
//!
//! ## Architecture
//!
//! The listener publishes every line to an [`EventHub`], which fans it out to
//! one unbounded queue per consumer. The backward search and the absence
//! tracker each own their state and only share the not-found cache. Everything
//! that talks to the outside world sits behind the traits in
//! [`collaborators`].

pub mod absence;
pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod listener;
pub mod logging;
pub mod monitor;
pub mod number;
pub mod resolver;
pub mod search;

pub use absence::{AbsenceSweep, AbsenceTracker, NotificationPipeline};
pub use classifier::{classify_line, classify_message, Classified};
pub use collaborators::{
    CallRecord, CallType, DeviceControl, Notifier, PhonebookInfo, ReverseLookup, SpeechToText,
};
pub use config::CallMonConfig;
pub use directory::{Directory, DirectoryContact, ReconcileReport};
pub use error::{ClassifyError, Error, Result};
pub use events::{CallEvent, CallEventKind, EventHub, MonitorMessage, MonitorReceiver};
pub use listener::{EventListener, ListenerState};
pub use monitor::{CallMonContext, CallMonitor, CallMonitorHandle};
pub use number::{AreaCodeTable, NormalizedNumber, NumberNormalizer};
pub use resolver::{NotFoundStore, NumberResolver, ProbeSequence, ResolvedCaller};
pub use search::BackwardSearchWorker;

/// Commonly used types
pub mod prelude {
    pub use crate::collaborators::{DeviceControl, Notifier, ReverseLookup, SpeechToText};
    pub use crate::config::CallMonConfig;
    pub use crate::error::{Error, Result};
    pub use crate::events::{CallEvent, CallEventKind, MonitorMessage};
    pub use crate::monitor::{CallMonContext, CallMonitor, CallMonitorHandle};
}
