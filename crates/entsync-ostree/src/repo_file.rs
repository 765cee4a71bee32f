//! ostree keyfiles: the repo config and deployment origin files

use std::path::{Path, PathBuf};

use entsync_fs::KeyFile;

use crate::error::{Error, Result};
use crate::model::{OstreeConfig, RemoteEntry, is_remote_section, name_from_section, section_for};

const CORE_SECTION: &str = "core";
const ORIGIN_SECTION: &str = "origin";
const REFSPEC_KEY: &str = "refspec";

/// The ostree repo config (`/ostree/repo/config`).
///
/// Sections other than `[core]` and the remotes are carried through a
/// load/save cycle untouched.
#[derive(Debug, Clone)]
pub struct RepoFile {
    path: PathBuf,
    doc: KeyFile,
}

impl RepoFile {
    /// Read and parse the config.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = KeyFile::load(&path)?;
        Ok(Self { path, doc })
    }

    /// An empty config that will be written to `path` on save.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            doc: KeyFile::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all remote sections, parsable or not.
    pub fn remote_sections(&self) -> Vec<&str> {
        self.doc
            .section_names()
            .filter(|name| is_remote_section(name))
            .collect()
    }

    /// The remotes currently configured.
    ///
    /// Sections whose name or `url` cannot be read are skipped with a warning.
    pub fn remotes(&self) -> Vec<RemoteEntry> {
        let mut remotes = Vec::new();
        for section in self.doc.sections() {
            if !is_remote_section(section.name()) {
                continue;
            }
            let name = match name_from_section(section.name()) {
                Ok(name) => name,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), "{}", e);
                    continue;
                }
            };
            let Some(url) = section.get("url") else {
                tracing::warn!(path = %self.path.display(), remote = %name, "Remote has no url, ignoring");
                continue;
            };
            remotes.push(RemoteEntry {
                name,
                url: url.to_string(),
                gpg_verify: section.get("gpg-verify").and_then(parse_bool),
                tls_client_cert_path: section.get("tls-client-cert-path").map(PathBuf::from),
                tls_client_key_path: section.get("tls-client-key-path").map(PathBuf::from),
            });
        }
        remotes
    }

    /// `[core]` pairs in file order.
    pub fn core(&self) -> Vec<(String, String)> {
        self.doc
            .section(CORE_SECTION)
            .map(|s| {
                s.pairs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn config(&self) -> OstreeConfig {
        OstreeConfig {
            core: self.core(),
            remotes: self.remotes(),
        }
    }

    /// Remove every remote section.
    pub fn clear_remotes(&mut self) {
        self.doc.retain_sections(|s| !is_remote_section(s.name()));
    }

    /// Write one remote, replacing any section of the same name.
    pub fn set_remote(&mut self, remote: &RemoteEntry) {
        let section = section_for(&remote.name);
        self.doc.remove_section(&section);
        self.doc.set(&section, "url", &remote.url);
        if let Some(verify) = remote.gpg_verify {
            self.doc.set(&section, "gpg-verify", if verify { "true" } else { "false" });
        }
        if let Some(cert) = &remote.tls_client_cert_path {
            self.doc
                .set(&section, "tls-client-cert-path", &cert.display().to_string());
        }
        if let Some(key) = &remote.tls_client_key_path {
            self.doc
                .set(&section, "tls-client-key-path", &key.display().to_string());
        }
    }

    /// Set `[core]` pairs, keeping any other core keys.
    pub fn set_core(&mut self, core: &[(String, String)]) {
        for (key, value) in core {
            self.doc.set(CORE_SECTION, key, value);
        }
    }

    pub fn save(&self) -> Result<()> {
        self.doc.save(&self.path)?;
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// A deployment origin file (`<deployment>.origin`).
#[derive(Debug, Clone)]
pub struct OriginFile {
    path: PathBuf,
    doc: KeyFile,
}

impl OriginFile {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = KeyFile::load(&path)?;
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn refspec(&self) -> Result<&str> {
        self.doc
            .get(ORIGIN_SECTION, REFSPEC_KEY)
            .ok_or_else(|| Error::MissingKey {
                path: self.path.clone(),
                section: ORIGIN_SECTION.to_string(),
                key: REFSPEC_KEY.to_string(),
            })
    }

    pub fn set_refspec(&mut self, refspec: &str) {
        self.doc.set(ORIGIN_SECTION, REFSPEC_KEY, refspec);
    }

    pub fn save(&self) -> Result<()> {
        self.doc.save(&self.path)?;
        Ok(())
    }
}

/// Point `refspec` at `remote`, keeping the ref.
///
/// `old-remote:ref` and bare `ref` both become `remote:ref`.
pub fn replace_refspec_remote(refspec: &str, remote: &str) -> String {
    let reference = refspec
        .split_once(':')
        .map(|(_, reference)| reference)
        .unwrap_or(refspec);
    format!("{}:{}", remote, reference)
}
