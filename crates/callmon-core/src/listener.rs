//! Persistent connection to the gateway's call monitor port
//!
//! The listener keeps exactly one connection open and never gives up: any
//! failure (name resolution, timeout, reset, remote close) leads to a fixed
//! backoff followed by a fresh connect.
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──► Receiving
//!       ▲              │               │            │
//!       └──── backoff ◄┴───────────────┴────────────┘
//! ```
//!
//! Lines are delivered at most once and in socket order to every queue of the
//! [`EventHub`]. Nothing is replayed after a reconnect.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::GatewayConfig;
use crate::events::EventHub;

/// Longest line accepted from the gateway; longer ones are dropped
pub const MAX_LINE_LEN: usize = 4096;

/// Connection state of the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Connected,
    Receiving,
}

/// Reader of the call monitor socket
pub struct EventListener {
    endpoint: String,
    connect_timeout: Duration,
    backoff: Duration,
    hub: Arc<EventHub>,
    state: watch::Sender<ListenerState>,
}

impl EventListener {
    pub fn new(gateway: &GatewayConfig, hub: Arc<EventHub>) -> Self {
        Self::with_endpoint(
            gateway.monitor_endpoint(),
            gateway.connect_timeout(),
            gateway.reconnect_backoff(),
            hub,
        )
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        backoff: Duration,
        hub: Arc<EventHub>,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Disconnected);
        Self {
            endpoint: endpoint.into(),
            connect_timeout,
            backoff,
            hub,
            state,
        }
    }

    /// Watch the connection state
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Run the connect/receive loop on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Connect/receive loop. Only returns when the task is aborted.
    pub async fn run(self) {
        loop {
            match self.connect().await {
                Ok(stream) => {
                    info!("The connection to the call monitor at {} has been established", self.endpoint);
                    self.receive(stream).await;
                }
                Err(e) => {
                    error!("Cannot connect to call monitor at {}: {}", self.endpoint, e);
                }
            }
            self.state.send_replace(ListenerState::Disconnected);
            debug!("Reconnecting in {:?}", self.backoff);
            tokio::time::sleep(self.backoff).await;
        }
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        self.state.send_replace(ListenerState::Connecting);
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no answer within {:?}", self.connect_timeout),
            )),
        }
    }

    async fn receive(&self, stream: TcpStream) {
        self.state.send_replace(ListenerState::Connected);
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(256);
        // Set while skipping the rest of an overlong line
        let mut discarding = false;

        loop {
            buf.clear();
            let read = (&mut reader)
                .take(MAX_LINE_LEN as u64)
                .read_until(b'\n', &mut buf)
                .await;
            match read {
                Ok(0) => {
                    info!("The connection to the call monitor has been stopped");
                    break;
                }
                Ok(_) => {
                    self.state.send_replace(ListenerState::Receiving);
                    let complete = buf.last() == Some(&b'\n');
                    if discarding {
                        discarding = !complete;
                        continue;
                    }
                    if !complete && buf.len() >= MAX_LINE_LEN {
                        warn!("Dropping call monitor line longer than {} bytes", MAX_LINE_LEN);
                        discarding = true;
                        continue;
                    }
                    let line = trim_line(&buf);
                    if line.is_empty() {
                        continue;
                    }
                    self.hub.publish_line(Bytes::copy_from_slice(line));
                }
                Err(e) => {
                    warn!("Reading from the call monitor failed: {}", e);
                    break;
                }
            }
        }

        self.hub.publish_connection_lost();
    }
}

fn trim_line(buf: &[u8]) -> &[u8] {
    let start = buf
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(buf.len());
    let end = buf
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &buf[start..end]
}
