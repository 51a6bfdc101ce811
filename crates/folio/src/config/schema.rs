use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::issuance::IssuanceSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Defaults to `~/.folio/data/folio.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    pub certificates_directory: String,
    /// Pickup directory drained by the MTA.
    pub outbox_directory: String,
    /// Public origin used in verification links, e.g. `https://certs.example.edu`.
    pub base_url: String,
    #[serde(default = "default_serial_prefix")]
    pub serial_prefix: String,
    #[serde(default = "default_serial_retry_limit")]
    pub serial_retry_limit: u32,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    pub sender: SenderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_serial_prefix() -> String {
    "CERT".to_string()
}

fn default_serial_retry_limit() -> u32 {
    3
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// `From:` identity of certificate emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderConfig {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl Config {
    /// Resolved database location; `None` when no path is configured and no
    /// home directory is known.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }

    pub fn certificates_directory(&self) -> PathBuf {
        PathBuf::from(&self.certificates_directory)
    }

    pub fn outbox_directory(&self) -> PathBuf {
        PathBuf::from(&self.outbox_directory)
    }

    pub fn issuance_settings(&self) -> IssuanceSettings {
        IssuanceSettings {
            base_url: self.base_url.clone(),
            serial_prefix: self.serial_prefix.clone(),
            serial_retry_limit: self.serial_retry_limit,
        }
    }
}
