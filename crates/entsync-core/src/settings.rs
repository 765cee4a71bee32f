//! Engine settings
//!
//! Loaded from a TOML (or JSON) file through [`ConfigStore`]. Every section is
//! optional; a missing file yields the stock defaults.

use std::path::{Path, PathBuf};

use entsync_fs::ConfigStore;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::hooks::HookConfig;

/// Top-level settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub server: ServerSettings,
    pub hooks: Vec<HookConfig>,
}

impl Settings {
    /// Load settings from `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(ConfigStore::new().load_or_default(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        Ok(ConfigStore::new().save(path, self)?)
    }
}

/// Well-known file locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub entitlement_dir: PathBuf,
    pub lock_file: PathBuf,
    pub repo_config: PathBuf,
    pub branded_name: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            entitlement_dir: PathBuf::from("/etc/pki/entitlement"),
            lock_file: PathBuf::from("/var/lock/subsys/rhsm"),
            repo_config: PathBuf::from("/ostree/repo/config"),
            branded_name: PathBuf::from("/var/lib/rhsm/branded_name"),
        }
    }
}

/// Entitlement server connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base URL, e.g. `https://subscription.example.com/subscription`
    pub url: String,
    /// Consumer identity certificate (PEM)
    pub consumer_cert: PathBuf,
    /// Consumer identity key (PEM)
    pub consumer_key: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    /// Request timeout; no timeout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "https://subscription.rhsm.redhat.com/subscription".to_string(),
            consumer_cert: PathBuf::from("/etc/pki/consumer/cert.pem"),
            consumer_key: PathBuf::from("/etc/pki/consumer/key.pem"),
            ca_cert: None,
            timeout_secs: None,
        }
    }
}
