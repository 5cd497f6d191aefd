//! Parsing of call monitor lines into [`CallEvent`]s
//!
//! The gateway emits one semicolon separated line per event, normally
//! prefixed with a timestamp:
//!
//! ```text
//! 18.10.26 09:14:02;RING;0;0612345678;987654;SIP0;
//! 18.10.26 09:14:05;CONNECT;0;10;0612345678;
//! 18.10.26 09:15:40;DISCONNECT;0;95;
//! ```
//!
//! Lines without the timestamp are accepted as well.

use chrono::NaiveDateTime;
use tracing::warn;

use crate::error::ClassifyError;
use crate::events::{CallEvent, CallEventKind, MonitorMessage};

const TIMESTAMP_FORMAT: &str = "%d.%m.%y %H:%M:%S";

/// Outcome of classifying one queue item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Event(CallEvent),
    /// `ConnectionLost` or `Refresh`; never reaches business logic
    Control(MonitorMessage),
    /// The line could not be classified and was logged
    Skipped,
}

/// Classify a queue item, logging and skipping anything unparsable
pub fn classify_message(message: &MonitorMessage) -> Classified {
    match message {
        MonitorMessage::Line(bytes) => {
            let parsed = std::str::from_utf8(bytes)
                .map_err(|_| ClassifyError::InvalidEncoding)
                .and_then(classify_line);
            match parsed {
                Ok(event) => Classified::Event(event),
                Err(e) => {
                    warn!("Ignoring call monitor line '{}': {}", message, e);
                    Classified::Skipped
                }
            }
        }
        control => Classified::Control(control.clone()),
    }
}

/// Parse one line into a call event
pub fn classify_line(line: &str) -> Result<CallEvent, ClassifyError> {
    let line = line.trim();
    let mut fields: Vec<&str> = line.split(';').collect();
    // A trailing ';' leaves one empty field behind
    if fields.last() == Some(&"") {
        fields.pop();
    }

    let (timestamp, rest) = match fields.first() {
        Some(first) if is_kind(first) => (None, &fields[..]),
        Some(first) if fields.len() > 1 && is_kind(fields[1]) => {
            (NaiveDateTime::parse_from_str(first, TIMESTAMP_FORMAT).ok(), &fields[1..])
        }
        Some(first) => {
            let kind = match fields.get(1) {
                Some(second) if NaiveDateTime::parse_from_str(first, TIMESTAMP_FORMAT).is_ok() => {
                    second
                }
                _ => first,
            };
            return Err(ClassifyError::UnknownKind(kind.to_string()));
        }
        None => return Err(ClassifyError::UnknownKind(String::new())),
    };

    let kind_name =
        event_kind(rest[0]).ok_or_else(|| ClassifyError::UnknownKind(rest[0].to_string()))?;
    let mut cursor = Fields::new(kind_name, &rest[1..]);
    let call_id = cursor.required("id")?;

    let kind = match kind_name {
        "RING" => CallEventKind::Ring {
            caller: cursor.required("caller")?,
            called: cursor.required("called")?,
            line: cursor.optional(),
        },
        "CALL" => CallEventKind::Call {
            extension: cursor.required("extension")?,
            caller: cursor.required("caller")?,
            called: cursor.required("called")?,
            line: cursor.optional(),
        },
        "CONNECT" => CallEventKind::Connect {
            port: cursor.required("port")?,
            caller: cursor.optional().unwrap_or_default(),
        },
        "DISCONNECT" => {
            let raw = cursor.required("duration")?;
            let duration_secs = raw
                .parse()
                .map_err(|_| ClassifyError::InvalidDuration(raw.clone()))?;
            CallEventKind::Disconnect { duration_secs }
        }
        other => return Err(ClassifyError::UnknownKind(other.to_string())),
    };

    Ok(CallEvent {
        timestamp,
        call_id,
        kind,
        extra: cursor.remaining(),
    })
}

fn event_kind(field: &str) -> Option<&'static str> {
    ["RING", "CALL", "CONNECT", "DISCONNECT"]
        .into_iter()
        .find(|kind| *kind == field)
}

fn is_kind(field: &str) -> bool {
    event_kind(field).is_some()
}

struct Fields<'a> {
    kind: &'static str,
    fields: std::slice::Iter<'a, &'a str>,
}

impl<'a> Fields<'a> {
    fn new(kind: &'static str, fields: &'a [&'a str]) -> Self {
        Self {
            kind,
            fields: fields.iter(),
        }
    }

    /// Next field; it has to exist but may be empty (anonymous callers)
    fn required(&mut self, field: &'static str) -> Result<String, ClassifyError> {
        self.fields
            .next()
            .map(|s| s.trim().to_string())
            .ok_or(ClassifyError::MissingField {
                kind: self.kind,
                field,
            })
    }

    fn optional(&mut self) -> Option<String> {
        self.fields.next().map(|s| s.trim().to_string())
    }

    fn remaining(self) -> Vec<String> {
        self.fields.map(|s| s.to_string()).collect()
    }
}
