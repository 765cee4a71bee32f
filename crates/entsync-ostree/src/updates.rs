//! New remote set construction
//!
//! The new config is built from the content set alone: every remote in the
//! old config is dropped and one remote per content item is written. The diff
//! against the old config is kept for reporting only.

use entsync_core::store::key_path_for;

use crate::content::{ContentItem, ContentSet};
use crate::model::{OstreeConfig, RemoteEntry};
use crate::repo_file::RepoFile;

/// Old and new config for one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdates {
    pub orig: OstreeConfig,
    pub new: OstreeConfig,
}

impl ConfigUpdates {
    /// Replace the remotes of `orig` with one per content item.
    pub fn build(orig: &OstreeConfig, content: &ContentSet) -> Self {
        let new = OstreeConfig {
            core: orig.core.clone(),
            remotes: content.items().iter().map(remote_from_content).collect(),
        };
        Self {
            orig: orig.clone(),
            new,
        }
    }

    /// Names of the remotes in the new config.
    pub fn remote_names(&self) -> Vec<String> {
        self.new.remote_names()
    }

    /// Remotes not present before.
    pub fn added(&self) -> Vec<String> {
        self.new
            .remotes
            .iter()
            .filter(|r| self.orig.remote(&r.name).is_none())
            .map(|r| r.name.clone())
            .collect()
    }

    /// Remotes that are gone from the new config.
    pub fn deleted(&self) -> Vec<String> {
        self.orig
            .remotes
            .iter()
            .filter(|r| self.new.remote(&r.name).is_none())
            .map(|r| r.name.clone())
            .collect()
    }

    /// Write the new config into `file`.
    pub fn apply(&self, file: &mut RepoFile) {
        file.clear_remotes();
        for remote in &self.new.remotes {
            file.set_remote(remote);
        }
        file.set_core(&self.new.core);
    }
}

fn remote_from_content(item: &ContentItem) -> RemoteEntry {
    let mut remote = RemoteEntry::new(&item.content.label, &item.content.url);
    if let Some(cert_path) = &item.cert_path {
        remote.tls_client_key_path = Some(key_path_for(cert_path));
        remote.tls_client_cert_path = Some(cert_path.clone());
    }
    remote
}
