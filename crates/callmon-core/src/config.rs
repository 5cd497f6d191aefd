//! Configuration for the call monitor
//!
//! The configuration is read once from a TOML file and then shared read-only
//! through [`crate::monitor::CallMonContext`].
//!
//! ```toml
//! pacing_ms = 10
//!
//! [gateway]
//! address = "192.168.178.1"
//! monitor_port = 1012
//! username = "admin"
//! password = "secret"
//!
//! [phonebook]
//! name = "Telefonbuch"
//!
//! [resolver]
//! area_code_file = "data/onb.csv"
//! not_found_file = "data/nameNotFound.list"
//!
//! [absence]
//! sweep_interval_secs = 60
//! answering_machine_port = "40"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::logging::parse_log_level;

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallMonConfig {
    pub gateway: GatewayConfig,
    pub phonebook: PhonebookConfig,
    pub resolver: ResolverConfig,
    pub absence: AbsenceConfig,
    pub logging: LoggingConfig,
    /// Pause between two items on each consumer loop
    pub pacing_ms: u64,
}

/// Connection settings for the telephony gateway
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub address: String,
    pub monitor_port: u16,
    pub connect_timeout_secs: u64,
    pub reconnect_backoff_secs: u64,
    pub username: String,
    pub password: String,
}

/// Phonebook the resolved callers are written to
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PhonebookConfig {
    pub name: String,
}

/// Reverse lookup settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub area_code_file: PathBuf,
    pub not_found_file: PathBuf,
    /// How far back the call history is scanned for unnamed callers
    pub history_days: u32,
    pub history_sweep: bool,
}

/// Unanswered call tracking settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AbsenceConfig {
    pub sweep_interval_secs: u64,
    /// Port the answering machine takes calls on
    pub answering_machine_port: String,
    pub history_days: u32,
    pub notify_attempts: u32,
    pub transcribe_attempts: u32,
}

/// Logging output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
    /// Write a daily rotated log file here instead of stdout
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for CallMonConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            phonebook: PhonebookConfig::default(),
            resolver: ResolverConfig::default(),
            absence: AbsenceConfig::default(),
            logging: LoggingConfig::default(),
            pacing_ms: 10,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: "fritz.box".to_string(),
            monitor_port: 1012,
            connect_timeout_secs: 10,
            reconnect_backoff_secs: 10,
            username: String::new(),
            password: String::new(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            area_code_file: PathBuf::from("data/onb.csv"),
            not_found_file: PathBuf::from("data/nameNotFound.list"),
            history_days: 7,
            history_sweep: true,
        }
    }
}

impl Default for AbsenceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            answering_machine_port: "40".to_string(),
            history_days: 5,
            notify_attempts: 5,
            transcribe_attempts: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            directory: None,
            file_prefix: "callmon.log".to_string(),
        }
    }
}

impl CallMonConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without validating it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Check the settings the monitor cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.phonebook.name.trim().is_empty() {
            return Err(Error::config("no phonebook name given"));
        }
        if self.gateway.password.is_empty() {
            return Err(Error::config("no password given"));
        }
        if self.gateway.reconnect_backoff_secs == 0 {
            return Err(Error::config("reconnect_backoff_secs must be positive"));
        }
        if self.absence.sweep_interval_secs == 0 {
            return Err(Error::config("sweep_interval_secs must be positive"));
        }
        parse_log_level(&self.logging.level)?;
        Ok(())
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl GatewayConfig {
    /// `host:port` of the call monitor socket
    pub fn monitor_endpoint(&self) -> String {
        format!("{}:{}", self.address, self.monitor_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

impl AbsenceConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
