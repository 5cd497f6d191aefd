//! Assembly of the running monitor
//!
//! [`CallMonitor::start`] performs the fallible startup steps (area code,
//! data files, phonebook) and then spawns the long-running tasks:
//!
//! ```text
//!                          ┌──► backward search ──► phonebook
//! socket ──► listener ──►  hub
//!                          └──► absence tracker ──► sweep ──► notifier
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::absence::{AbsenceSweep, AbsenceTracker, NotificationPipeline};
use crate::collaborators::{DeviceControl, Notifier, ReverseLookup, SpeechToText};
use crate::config::CallMonConfig;
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::events::EventHub;
use crate::listener::{EventListener, ListenerState};
use crate::number::{AreaCodeTable, NumberNormalizer};
use crate::resolver::{NotFoundStore, NumberResolver};
use crate::search::BackwardSearchWorker;

/// Configuration and collaborators the monitor is built from
#[derive(Clone)]
pub struct CallMonContext {
    pub config: Arc<CallMonConfig>,
    pub device: Arc<dyn DeviceControl>,
    pub lookup: Arc<dyn ReverseLookup>,
    /// Voicemails are not transcribed without one
    pub stt: Option<Arc<dyn SpeechToText>>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct CallMonitor;

impl CallMonitor {
    /// Start all tasks. Errors here are fatal.
    pub async fn start(ctx: CallMonContext) -> Result<CallMonitorHandle> {
        let config = ctx.config.clone();
        config.validate()?;

        let area_code = ctx.device.area_code().await?;
        info!("Area code of the line: {}", area_code);

        let area_codes = Arc::new(AreaCodeTable::load(&config.resolver.area_code_file).await?);
        let not_found = Arc::new(NotFoundStore::load(&config.resolver.not_found_file).await?);
        let directory = Directory::open(ctx.device.clone(), &config.phonebook.name).await?;

        let hub = Arc::new(EventHub::new());
        let search_queue = hub.subscribe();
        let absence_queue = hub.subscribe();

        let resolver = NumberResolver::new(ctx.lookup.clone(), area_codes, not_found.clone());
        let search = BackwardSearchWorker::new(
            resolver,
            NumberNormalizer::new(area_code),
            directory,
            ctx.device.clone(),
            &config.resolver,
        )
        .with_pacing(config.pacing())
        .spawn(search_queue);

        let (tracker, unresolved) = AbsenceTracker::new();
        let tracker = tracker.with_pacing(config.pacing()).spawn(absence_queue);

        let pipeline = NotificationPipeline::new(
            ctx.device.clone(),
            ctx.stt.clone(),
            ctx.notifier.clone(),
            &config.absence,
        );
        let sweep = AbsenceSweep::new(ctx.device.clone(), pipeline, &config.absence, unresolved).spawn();

        let listener = EventListener::new(&config.gateway, hub.clone());
        let state = listener.state();
        let listener = listener.spawn();

        info!("Call monitor started");
        Ok(CallMonitorHandle {
            hub,
            not_found,
            state,
            listener,
            search,
            tracker,
            sweep,
        })
    }
}

/// Running monitor
pub struct CallMonitorHandle {
    hub: Arc<EventHub>,
    not_found: Arc<NotFoundStore>,
    state: watch::Receiver<ListenerState>,
    listener: JoinHandle<()>,
    search: JoinHandle<()>,
    tracker: JoinHandle<()>,
    sweep: JoinHandle<()>,
}

impl CallMonitorHandle {
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn not_found(&self) -> &Arc<NotFoundStore> {
        &self.not_found
    }

    pub fn listener_state(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// Ask the backward search to reload the phonebook
    pub fn request_refresh(&self) {
        self.hub.request_refresh();
    }

    /// Wait until one of the tasks stops. They only stop on a panic or
    /// abort, so any return is an error.
    pub async fn wait(mut self) -> Result<()> {
        let (name, result) = tokio::select! {
            r = &mut self.listener => ("listener", r),
            r = &mut self.search => ("backward search", r),
            r = &mut self.tracker => ("absence tracker", r),
            r = &mut self.sweep => ("absence sweep", r),
        };
        self.abort();

        let message = match result {
            Ok(()) => "finished unexpectedly".to_string(),
            Err(e) => e.to_string(),
        };
        error!("Task {} stopped: {}", name, message);
        Err(Error::TaskStopped {
            name: name.to_string(),
            message,
        })
    }

    /// Stop all tasks
    pub fn shutdown(self) {
        self.abort();
    }

    fn abort(&self) {
        self.listener.abort();
        self.search.abort();
        self.tracker.abort();
        self.sweep.abort();
    }
}
