//! Voicemail transcription and push delivery for one missed call

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::collaborators::{CallRecord, DeviceControl, Notifier, SpeechToText};
use crate::config::AbsenceConfig;

pub struct NotificationPipeline {
    device: Arc<dyn DeviceControl>,
    stt: Option<Arc<dyn SpeechToText>>,
    notifier: Arc<dyn Notifier>,
    transcribe_attempts: u32,
    notify_attempts: u32,
}

impl NotificationPipeline {
    pub fn new(
        device: Arc<dyn DeviceControl>,
        stt: Option<Arc<dyn SpeechToText>>,
        notifier: Arc<dyn Notifier>,
        config: &AbsenceConfig,
    ) -> Self {
        Self {
            device,
            stt,
            notifier,
            transcribe_attempts: config.transcribe_attempts.max(1),
            notify_attempts: config.notify_attempts.max(1),
        }
    }

    /// Transcribe the call's voicemail, if any, and push the message.
    /// Returns whether the notifier accepted it.
    pub async fn notify(&self, call: &CallRecord) -> bool {
        let transcript = self.transcript(call).await;
        let message = compose_message(call, transcript.as_deref());
        info!("Notifying: {}", message);
        self.deliver(&message).await
    }

    /// Text of the voicemail left during `call`
    pub async fn transcript(&self, call: &CallRecord) -> Option<String> {
        let stt = self.stt.as_ref()?;
        call.path.as_ref()?;

        let url = match self.device.voicemail_url(call).await {
            Ok(Some(url)) => url,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cannot locate voicemail of call {}: {}", call.id, e);
                return None;
            }
        };

        for attempt in 1..=self.transcribe_attempts {
            match stt.transcribe(&url).await {
                Ok(text) => {
                    let text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
                    debug!("Voicemail of call {} transcribed: {:?}", call.id, text);
                    return text;
                }
                Err(e) => warn!(
                    "Transcription of {} failed (attempt {}/{}): {}",
                    url, attempt, self.transcribe_attempts, e
                ),
            }
        }
        None
    }

    async fn deliver(&self, message: &str) -> bool {
        for attempt in 1..=self.notify_attempts {
            match self.notifier.send(message).await {
                Ok(true) => return true,
                Ok(false) => warn!(
                    "Notification rejected (attempt {}/{})",
                    attempt, self.notify_attempts
                ),
                Err(e) => warn!(
                    "Notification failed (attempt {}/{}): {}",
                    attempt, self.notify_attempts, e
                ),
            }
        }
        false
    }
}

/// `"{date} {name} {caller} {called}"`, followed by the voicemail text
pub fn compose_message(call: &CallRecord, transcript: Option<&str>) -> String {
    match transcript {
        Some(text) => format!("{} /Message: {}", call, text),
        None => call.to_string(),
    }
}
