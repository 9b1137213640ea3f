use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where session tokens are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Encrypted files under the user's data directory
    #[default]
    File,
    /// OS keyring entries
    Keyring,
    /// Process memory only; nothing survives a restart
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Keyring => f.write_str("keyring"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// User settings stored in `settings.toml`
///
/// Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API root. When unset the environment and then the built-in
    /// development URL are used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub storage: StorageBackend,
    /// Default `tracing` filter when `RUST_LOG` is not set
    pub log_level: String,
    pub share_inflight_refresh: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: None,
            request_timeout_secs: 15,
            connect_timeout_secs: 10,
            storage: StorageBackend::default(),
            log_level: "info".to_string(),
            share_inflight_refresh: true,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
