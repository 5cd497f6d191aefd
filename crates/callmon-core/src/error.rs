//! Error types for the call monitor

use thiserror::Error;

/// Result type for call monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the call monitor
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The configured phonebook does not exist on the device. Fatal at startup.
    #[error("Phonebook not found: {name}")]
    PhonebookNotFound { name: String },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device control call failed
    #[error("Device error: {message}")]
    Device { message: String },

    /// Reverse lookup service failed
    #[error("Lookup error for {number}: {message}")]
    Lookup { number: String, message: String },

    /// Speech-to-text collaborator failed
    #[error("Transcription error: {message}")]
    Transcription { message: String },

    /// Notification delivery failed
    #[error("Notification error: {message}")]
    Notification { message: String },

    /// Malformed phonebook document
    #[error("Phonebook XML error: {message}")]
    Xml { message: String },

    /// Unparsable call monitor line
    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    /// One of the monitor's long-running tasks ended
    #[error("Task {name} stopped: {message}")]
    TaskStopped { name: String, message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a device error
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Create a lookup error
    pub fn lookup(number: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup {
            number: number.into(),
            message: message.into(),
        }
    }

    /// Create a transcription error
    pub fn transcription(message: impl Into<String>) -> Self {
        Self::Transcription {
            message: message.into(),
        }
    }

    /// Create a notification error
    pub fn notification(message: impl Into<String>) -> Self {
        Self::Notification {
            message: message.into(),
        }
    }

    /// Create an XML error
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml {
            message: message.into(),
        }
    }

    /// Whether this error must stop the process instead of being absorbed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::PhonebookNotFound { .. })
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Self::xml(e.to_string())
    }
}

/// Reasons a call monitor line could not be turned into a call event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("line is not valid UTF-8")]
    InvalidEncoding,

    #[error("unrecognized event kind: {0}")]
    UnknownKind(String),

    #[error("{kind} event is missing field '{field}'")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("invalid call duration: {0}")]
    InvalidDuration(String),
}
