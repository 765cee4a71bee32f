//! ostree remote config reconciliation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use entsync_core::{
    CertificateStore, ChangeHook, ChangeSet, ItemFailure, Reconciler, RemoteReport, Report,
};

use crate::content::ContentSet;
use crate::error::Result;
use crate::origin::{DeploymentInspector, OriginUpdater};
use crate::repo_file::RepoFile;
use crate::updates::ConfigUpdates;

/// Rewrites the ostree remotes from the content of valid entitlements.
///
/// Unlike certificate reconciliation this is a full replace: the remote set
/// is rebuilt from scratch on every run.
pub struct RemoteConfigReconciler {
    store: Arc<dyn CertificateStore>,
    repo_config: PathBuf,
    inspector: Option<Arc<dyn DeploymentInspector>>,
}

impl RemoteConfigReconciler {
    pub const NAME: &'static str = "ostree-remotes";

    pub fn new(store: Arc<dyn CertificateStore>, repo_config: impl Into<PathBuf>) -> Self {
        Self {
            store,
            repo_config: repo_config.into(),
            inspector: None,
        }
    }

    /// Also update the booted deployment's origin after saving.
    pub fn with_deployment_inspector(mut self, inspector: Arc<dyn DeploymentInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn repo_config(&self) -> &Path {
        &self.repo_config
    }

    /// Run one reconciliation.
    ///
    /// # Errors
    ///
    /// Fails when the certificate store cannot be read or the new config
    /// cannot be saved. Origin update failures are recorded in the report.
    pub fn run(&self) -> Result<RemoteReport> {
        let (mut file, existed) = self.load_config();
        let orig = file.config();

        self.store.refresh()?;
        let content = ContentSet::load(self.store.as_ref(), Utc::now())?;
        tracing::debug!(labels = ?content.labels(), "Loaded ostree content");

        let updates = ConfigUpdates::build(&orig, &content);
        let mut report = RemoteReport {
            remote_updates: updates.remote_names(),
            remote_added: updates.added(),
            remote_deleted: updates.deleted(),
            ..RemoteReport::default()
        };

        if !existed && updates.new.remotes.is_empty() {
            tracing::debug!(path = %self.repo_config.display(), "No ostree content and no repo config, nothing to write");
            return Ok(report);
        }

        updates.apply(&mut file);
        file.save()?;
        tracing::debug!(
            path = %self.repo_config.display(),
            remotes = ?report.remote_updates,
            "Saved ostree repo config"
        );

        if let Some(inspector) = &self.inspector {
            match OriginUpdater::new(inspector.as_ref()).run(&updates.new.remotes) {
                Ok(Some(update)) => {
                    report.origin = Some(update.origin.display().to_string());
                    report.refspec = Some(update.refspec);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Failed to update deployment origin: {}", e);
                    report.exceptions.push(ItemFailure::new("origin", &e));
                }
            }
        }

        tracing::debug!("Ostree update report:\n{}", report);
        Ok(report)
    }

    /// Load the repo config, falling back to an empty one.
    fn load_config(&self) -> (RepoFile, bool) {
        match RepoFile::load(&self.repo_config) {
            Ok(file) => (file, true),
            Err(crate::Error::Fs(e)) if e.is_not_found() => {
                tracing::info!(path = %self.repo_config.display(), "No ostree content repo config file found");
                (RepoFile::empty(&self.repo_config), false)
            }
            Err(e) => {
                tracing::warn!(path = %self.repo_config.display(), "Unreadable ostree repo config, starting from empty: {}", e);
                (RepoFile::empty(&self.repo_config), true)
            }
        }
    }
}

impl Reconciler for RemoteConfigReconciler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn reconcile(&self) -> entsync_core::Result<Report> {
        Ok(Report::Remotes(self.run()?))
    }
}

impl ChangeHook for RemoteConfigReconciler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, _changes: &ChangeSet) -> entsync_core::Result<()> {
        RemoteConfigReconciler::run(self)?;
        Ok(())
    }
}
