//! Backward search: name the callers the phonebook does not know yet
//!
//! The worker consumes its own copy of the monitor stream. Every RING or CALL
//! triggers one search pass over the remote number and, optionally, over the
//! unnamed callers of the recent call history. Numbers that resolve are
//! written to the phonebook, numbers that do not are remembered in the
//! not-found cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classifier::{classify_message, Classified};
use crate::collaborators::{CallRecord, CallType, DeviceControl};
use crate::config::ResolverConfig;
use crate::directory::{Directory, ReconcileReport};
use crate::events::{CallEvent, CallEventKind, MonitorMessage, MonitorReceiver};
use crate::number::{only_digits, split_alternate, NormalizedNumber, NumberNormalizer};
use crate::resolver::{NotFoundStore, NumberResolver};

/// Consumer of the backward search queue
pub struct BackwardSearchWorker {
    resolver: NumberResolver,
    normalizer: NumberNormalizer,
    directory: Directory,
    device: Arc<dyn DeviceControl>,
    history_days: u32,
    history_sweep: bool,
    pacing: Duration,
}

impl BackwardSearchWorker {
    pub fn new(
        resolver: NumberResolver,
        normalizer: NumberNormalizer,
        directory: Directory,
        device: Arc<dyn DeviceControl>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            resolver,
            normalizer,
            directory,
            device,
            history_days: config.history_days,
            history_sweep: config.history_sweep,
            pacing: Duration::ZERO,
        }
    }

    /// Pause between two queue items
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn spawn(self, queue: MonitorReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(queue))
    }

    /// Consume the queue until every sender is gone
    pub async fn run(mut self, mut queue: MonitorReceiver) {
        while let Some(message) = queue.recv().await {
            match classify_message(&message) {
                Classified::Event(event) => {
                    self.handle_event(&event).await;
                }
                Classified::Control(MonitorMessage::ConnectionLost) => {
                    info!("Call monitor connection lost, waiting for the next event");
                }
                Classified::Control(MonitorMessage::Refresh) => {
                    if let Err(e) = self.directory.refresh().await {
                        error!("Cannot reload phonebook '{}': {}", self.directory.name(), e);
                    }
                }
                Classified::Control(_) | Classified::Skipped => {}
            }
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }
        info!("Backward search queue closed");
    }

    /// Run one search pass for a RING or CALL against a freshly loaded
    /// phonebook. Other events are ignored and yield `None`, as does a pass
    /// without anything to look up or without a readable phonebook.
    pub async fn handle_event(&mut self, event: &CallEvent) -> Option<ReconcileReport> {
        if !matches!(event.kind, CallEventKind::Ring { .. } | CallEventKind::Call { .. }) {
            return None;
        }

        // Contact ids are positions on the device and shift when entries
        // are deleted there
        if let Err(e) = self.directory.refresh().await {
            error!("Cannot reload phonebook '{}', skipping {}: {}", self.directory.name(), event, e);
            return None;
        }

        let mut raw: Vec<String> = event.remote_number().map(String::from).into_iter().collect();
        if self.history_sweep {
            match self.device.call_history(self.history_days).await {
                Ok(records) => {
                    raw.extend(unknown_callers(&records, self.resolver.not_found()).await)
                }
                Err(e) => warn!("Cannot read call history: {}", e),
            }
        }

        let candidates = self.candidates(&raw).await;
        if candidates.is_empty() {
            debug!("Nothing to look up for {}", event);
            return None;
        }

        let found = self.resolver.resolve_all(&candidates).await;
        self.resolver.not_found().persist().await;
        if found.is_empty() {
            return None;
        }
        Some(self.directory.reconcile(&found).await)
    }

    /// Split, filter and normalize raw caller strings
    async fn candidates(&self, raw: &[String]) -> Vec<NormalizedNumber> {
        let mut seen: Vec<String> = Vec::new();
        let mut candidates = Vec::new();

        for value in raw {
            let (primary, alternate) = split_alternate(value);
            for number in primary.into_iter().chain(alternate) {
                if seen.contains(&number) {
                    continue;
                }
                seen.push(number.clone());

                if let Some(contact) = self.directory.find_by_number(&number) {
                    info!("{} is known as {}", number, contact.display_name);
                    continue;
                }
                if self.resolver.not_found().contains(&number).await {
                    debug!("{} is known to be unresolvable", number);
                    continue;
                }
                if let Some(normalized) = self.normalizer.normalize(&number) {
                    candidates.push(normalized);
                }
            }
        }
        candidates
    }
}

/// Numbers from the call history the device shows without a name.
///
/// Incoming and missed calls contribute their caller, outgoing calls their
/// called number. A partial match the device shows in parentheses is added
/// as well. Numbers in the not-found cache are left out.
pub async fn unknown_callers(records: &[CallRecord], not_found: &NotFoundStore) -> Vec<String> {
    let mut numbers = Vec::new();

    for record in records {
        if record.id.is_empty() || record.caller.is_empty() {
            continue;
        }
        let named = !record.name.is_empty() && !is_digits(&record.name) && !record.name.contains('(');
        if named {
            continue;
        }

        let number = match record.call_type {
            CallType::Incoming | CallType::Missed if is_digits(&record.caller) => {
                if let Some(open) = record.name.find('(') {
                    let alternate = only_digits(&record.name[open + 1..]);
                    if !alternate.is_empty() && !not_found.contains(&alternate).await {
                        numbers.push(alternate);
                    }
                }
                record.caller.clone()
            }
            CallType::Outgoing if is_digits(&record.called) => record.called.clone(),
            _ if is_digits(&record.name) => record.name.clone(),
            _ => continue,
        };

        if !not_found.contains(&number).await {
            numbers.push(number);
        }
    }

    numbers
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: &str, call_type: CallType, caller: &str, called: &str, name: &str) -> CallRecord {
        CallRecord {
            id: id.to_string(),
            call_type,
            caller: caller.to_string(),
            called: called.to_string(),
            name: name.to_string(),
            port: "1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 18)
                .and_then(|d| d.and_hms_opt(9, 14, 0))
                .unwrap(),
            duration: "0:01".to_string(),
            path: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_callers_from_history() {
        let not_found = NotFoundStore::in_memory();
        not_found.insert("0699999").await;

        let records = vec![
            record("1", CallType::Incoming, "0612345", "987", ""),
            record("2", CallType::Missed, "0613333", "987", "Meier"),
            record("3", CallType::Missed, "0614444", "987", "0614444 (0614400)"),
            record("4", CallType::Outgoing, "987", "0615555", ""),
            record("5", CallType::Incoming, "0699999", "987", ""),
            record("", CallType::Incoming, "0616666", "987", ""),
        ];

        let numbers = unknown_callers(&records, &not_found).await;
        assert_eq!(numbers, vec!["0612345", "0614400", "0614444", "0615555"]);
    }

    #[tokio::test]
    async fn test_cached_alternate_is_dropped() {
        let not_found = NotFoundStore::in_memory();
        not_found.insert("0614400").await;

        let records = vec![record("3", CallType::Missed, "0614444", "987", "x (0614400)")];
        assert_eq!(unknown_callers(&records, &not_found).await, vec!["0614444"]);
    }

    #[test]
    fn test_is_digits() {
        assert!(is_digits("0612"));
        assert!(!is_digits(""));
        assert!(!is_digits("06 12"));
    }
}
