//! Interfaces to the systems the monitor talks to but does not implement
//!
//! The device control protocol, the reverse lookup provider, speech-to-text
//! and push delivery all live behind these traits. The monitor only relies on
//! the contracts documented here.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::Result;

/// A phonebook available on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonebookInfo {
    pub id: String,
    pub name: String,
}

/// Call history record types as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    Incoming,
    Missed,
    Outgoing,
    ActiveIncoming,
    Rejected,
    ActiveOutgoing,
    Other(u8),
}

impl CallType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Incoming,
            2 => Self::Missed,
            3 => Self::Outgoing,
            9 => Self::ActiveIncoming,
            10 => Self::Rejected,
            11 => Self::ActiveOutgoing,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Incoming => 1,
            Self::Missed => 2,
            Self::Outgoing => 3,
            Self::ActiveIncoming => 9,
            Self::Rejected => 10,
            Self::ActiveOutgoing => 11,
            Self::Other(code) => *code,
        }
    }
}

/// One entry of the device's call history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub id: String,
    pub call_type: CallType,
    pub caller: String,
    pub called: String,
    /// Name the device displays; may be digits or `digits (alternate)`
    pub name: String,
    /// Internal port that handled the call (answering machines have their own)
    pub port: String,
    pub date: NaiveDateTime,
    pub duration: String,
    /// Voicemail recording location, when a message was left
    pub path: Option<String>,
}

impl fmt::Display for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.date.format("%d.%m.%y %H:%M"),
            self.name,
            self.caller,
            self.called
        )
    }
}

/// Control channel of the telephony gateway
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Area code of the line the gateway is attached to, without trunk zero
    /// handling (e.g. `06131`)
    async fn area_code(&self) -> Result<String>;

    async fn phonebooks(&self) -> Result<Vec<PhonebookInfo>>;

    /// Whole phonebook document
    async fn phonebook_xml(&self, book_id: &str) -> Result<String>;

    /// One contact document
    async fn phonebook_entry_xml(&self, book_id: &str, contact_id: &str) -> Result<String>;

    /// Store a contact document; `None` creates a new contact
    async fn set_phonebook_entry(
        &self,
        book_id: &str,
        contact_id: Option<&str>,
        entry_xml: &str,
    ) -> Result<()>;

    /// Call history of the last `days` days
    async fn call_history(&self, days: u32) -> Result<Vec<CallRecord>>;

    /// Download location of the voicemail recording of `call`, if any
    async fn voicemail_url(&self, call: &CallRecord) -> Result<Option<String>>;
}

/// Reverse number lookup
#[async_trait]
pub trait ReverseLookup: Send + Sync {
    /// Name registered for `number`, `None` when the service knows none
    async fn lookup(&self, number: &str) -> Result<Option<String>>;
}

/// Speech-to-text transcription of voicemail audio
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &str) -> Result<Option<String>>;
}

/// Outbound push notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns whether the message was accepted
    async fn send(&self, message: &str) -> Result<bool>;
}
