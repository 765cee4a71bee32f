//! Remote and config models
//!
//! A remote is one `[remote "name"]` section of the ostree repo config.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static REMOTE_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^remote\s+"(?P<remote_name>.+)"$"#).unwrap());

/// An ostree remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub url: String,
    /// `gpg-verify`; left out of the file when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpg_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_cert_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_key_path: Option<PathBuf>,
}

impl RemoteEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            gpg_verify: None,
            tls_client_cert_path: None,
            tls_client_key_path: None,
        }
    }

    /// The keyfile section holding this remote.
    pub fn section_name(&self) -> String {
        section_for(&self.name)
    }
}

/// `awesome-os` -> `remote "awesome-os"`
pub fn section_for(name: &str) -> String {
    format!("remote \"{}\"", name)
}

/// `remote "awesome-os"` -> `awesome-os`
pub fn name_from_section(section: &str) -> Result<String> {
    REMOTE_SECTION
        .captures(section)
        .and_then(|caps| caps.name("remote_name"))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::RemoteSectionName {
            section: section.to_string(),
        })
}

/// Whether `section` looks like a remote section, parsable or not.
pub fn is_remote_section(section: &str) -> bool {
    section.starts_with("remote ")
}

/// The state of the ostree repo config this crate manages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OstreeConfig {
    /// `[core]` key/value pairs in file order
    pub core: Vec<(String, String)>,
    pub remotes: Vec<RemoteEntry>,
}

impl OstreeConfig {
    pub fn remote_names(&self) -> Vec<String> {
        self.remotes.iter().map(|r| r.name.clone()).collect()
    }

    pub fn remote(&self, name: &str) -> Option<&RemoteEntry> {
        self.remotes.iter().find(|r| r.name == name)
    }
}
