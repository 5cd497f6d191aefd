//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::escape::escape;

use callmon_core::collaborators::{
    CallRecord, CallType, DeviceControl, Notifier, PhonebookInfo, ReverseLookup, SpeechToText,
};
use callmon_core::directory::{parse_contacts, DirectoryContact};
use callmon_core::error::{Error, Result};

pub const BOOK_ID: &str = "0";
pub const BOOK_NAME: &str = "Telefonbuch";

/// A gateway with one phonebook and a scripted call history
pub struct FakeDevice {
    pub area_code: String,
    contacts: Mutex<Vec<DirectoryContact>>,
    history: Mutex<Vec<CallRecord>>,
    /// `(contact id, document)` of every phonebook write
    pub writes: Mutex<Vec<(Option<String>, String)>>,
    pub history_reads: AtomicUsize,
    pub history_fails: Mutex<bool>,
    pub phonebook_fails: Mutex<bool>,
}

impl FakeDevice {
    pub fn new(area_code: &str) -> Self {
        Self {
            area_code: area_code.to_string(),
            contacts: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            history_reads: AtomicUsize::new(0),
            history_fails: Mutex::new(false),
            phonebook_fails: Mutex::new(false),
        }
    }

    pub fn with_contact(self, name: &str, numbers: &[&str]) -> Self {
        let mut contact = DirectoryContact::new(name, numbers[0]);
        for number in &numbers[1..] {
            contact.append_number(number);
        }
        self.contacts.lock().unwrap().push(contact);
        self
    }

    pub fn push_history(&self, record: CallRecord) {
        self.history.lock().unwrap().push(record);
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap().clear();
    }

    /// Delete a contact the way the device UI does; later ids shift down
    pub fn remove_contact(&self, name: &str) {
        self.contacts.lock().unwrap().retain(|c| c.display_name != name);
    }

    pub fn contacts(&self) -> Vec<DirectoryContact> {
        self.contacts.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    fn render(&self, only: Option<usize>) -> String {
        let contacts = self.contacts.lock().unwrap();
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="utf-8"?><phonebooks><phonebook name="{}">"#,
            BOOK_NAME
        );
        for (idx, contact) in contacts.iter().enumerate() {
            if only.is_some_and(|only| only != idx) {
                continue;
            }
            xml.push_str(&format!(
                "<!-- idx:{} --><contact><category>{}</category><person><realName>{}</realName></person><telephony nid=\"{}\">",
                idx,
                contact.category,
                escape(contact.display_name.as_str()),
                contact.numbers.len()
            ));
            for number in &contact.numbers {
                xml.push_str(&format!(
                    "<number type=\"{}\" id=\"{}\">{}</number>",
                    number.kind,
                    number.id.as_deref().unwrap_or("0"),
                    number.number
                ));
            }
            xml.push_str("</telephony></contact>");
        }
        xml.push_str("</phonebook></phonebooks>");
        xml
    }
}

#[async_trait]
impl DeviceControl for FakeDevice {
    async fn area_code(&self) -> Result<String> {
        Ok(self.area_code.clone())
    }

    async fn phonebooks(&self) -> Result<Vec<PhonebookInfo>> {
        Ok(vec![PhonebookInfo {
            id: BOOK_ID.to_string(),
            name: BOOK_NAME.to_string(),
        }])
    }

    async fn phonebook_xml(&self, _book_id: &str) -> Result<String> {
        if *self.phonebook_fails.lock().unwrap() {
            return Err(Error::device("phonebook unavailable"));
        }
        Ok(self.render(None))
    }

    async fn phonebook_entry_xml(&self, _book_id: &str, contact_id: &str) -> Result<String> {
        let idx: usize = contact_id
            .parse()
            .map_err(|_| Error::device(format!("bad contact id {}", contact_id)))?;
        Ok(self.render(Some(idx)))
    }

    async fn set_phonebook_entry(
        &self,
        _book_id: &str,
        contact_id: Option<&str>,
        entry_xml: &str,
    ) -> Result<()> {
        let contact = parse_contacts(entry_xml)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::device("entry without contact"))?;
        self.writes
            .lock()
            .unwrap()
            .push((contact_id.map(String::from), entry_xml.to_string()));

        let mut contacts = self.contacts.lock().unwrap();
        match contact_id {
            Some(id) => {
                let idx: usize = id
                    .parse()
                    .map_err(|_| Error::device(format!("bad contact id {}", id)))?;
                let slot = contacts
                    .get_mut(idx)
                    .ok_or_else(|| Error::device(format!("no contact {}", idx)))?;
                *slot = contact;
            }
            None => contacts.push(contact),
        }
        Ok(())
    }

    async fn call_history(&self, _days: u32) -> Result<Vec<CallRecord>> {
        self.history_reads.fetch_add(1, Ordering::SeqCst);
        if *self.history_fails.lock().unwrap() {
            return Err(Error::device("history unavailable"));
        }
        Ok(self.history.lock().unwrap().clone())
    }

    async fn voicemail_url(&self, call: &CallRecord) -> Result<Option<String>> {
        Ok(call
            .path
            .as_ref()
            .map(|path| format!("http://fritz.box/download?path={}", path)))
    }
}

/// Reverse lookup answering from a fixed table
#[derive(Default)]
pub struct ScriptedLookup {
    names: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedLookup {
    pub fn with(names: &[(&str, &str)]) -> Self {
        Self {
            names: names
                .iter()
                .map(|(number, name)| (number.to_string(), name.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReverseLookup for ScriptedLookup {
    async fn lookup(&self, number: &str) -> Result<Option<String>> {
        self.calls.lock().unwrap().push(number.to_string());
        Ok(self.names.get(number).cloned())
    }
}

/// Speech-to-text failing a number of times before answering
pub struct FlakyTranscriber {
    failures: AtomicUsize,
    text: Option<String>,
    pub attempts: AtomicUsize,
}

impl FlakyTranscriber {
    pub fn new(failures: usize, text: Option<&str>) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            text: text.map(String::from),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechToText for FlakyTranscriber {
    async fn transcribe(&self, _audio: &str) -> Result<Option<String>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(Error::transcription("recognizer unavailable"));
        }
        Ok(self.text.clone())
    }
}

/// Notifier recording delivered messages, rejecting the first `failures`
pub struct RecordingNotifier {
    failures: AtomicUsize,
    pub attempts: AtomicUsize,
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(Error::notification("push service unavailable"));
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(true)
    }
}

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap()
}

pub fn history_record(
    id: &str,
    call_type: CallType,
    caller: &str,
    port: &str,
    date: NaiveDateTime,
) -> CallRecord {
    CallRecord {
        id: id.to_string(),
        call_type,
        caller: caller.to_string(),
        called: "987654".to_string(),
        name: String::new(),
        port: port.to_string(),
        date,
        duration: "0:00".to_string(),
        path: None,
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
