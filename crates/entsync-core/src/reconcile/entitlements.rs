//! Entitlement certificate reconciliation
//!
//! Brings the local certificate store in line with the serials the
//! entitlement server expects: rogue certificates are deleted, missing ones are
//! fetched and installed. Each certificate is handled on its own, so one bad
//! item never stops the rest of the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::audit::{AuditSink, TracingAudit, audit_lines};
use crate::certificate::{Certificate, PrivateKey};
use crate::error::{Error, Result};
use crate::hooks::{ChangeHook, ChangeSet};
use crate::plan::UpdatePlan;
use crate::report::{EntitlementReport, ItemFailure, Report};
use crate::source::{CertificateBundle, ConsumerIdentity, EntitlementSource};
use crate::store::CertificateStore;

use super::Reconciler;

struct Upstream {
    source: Arc<dyn EntitlementSource>,
    consumer: ConsumerIdentity,
}

/// Reconciles installed entitlement certificates against the server.
///
/// Built without an upstream (see [`CertificateReconciler::unregistered`]) the
/// desired set is empty and every installed certificate is removed.
pub struct CertificateReconciler {
    store: Arc<dyn CertificateStore>,
    upstream: Option<Upstream>,
    repo_hook: Option<Arc<dyn ChangeHook>>,
    branding_hook: Option<Arc<dyn ChangeHook>>,
    audit: Arc<dyn AuditSink>,
}

impl CertificateReconciler {
    pub const NAME: &'static str = "entitlement-certificates";

    pub fn new(
        store: Arc<dyn CertificateStore>,
        source: Arc<dyn EntitlementSource>,
        consumer: ConsumerIdentity,
    ) -> Self {
        Self {
            store,
            upstream: Some(Upstream { source, consumer }),
            repo_hook: None,
            branding_hook: None,
            audit: Arc::new(TracingAudit),
        }
    }

    /// A reconciler that clears the store, used when the system unregisters.
    pub fn unregistered(store: Arc<dyn CertificateStore>) -> Self {
        Self {
            store,
            upstream: None,
            repo_hook: None,
            branding_hook: None,
            audit: Arc::new(TracingAudit),
        }
    }

    pub fn with_repo_hook(mut self, hook: Arc<dyn ChangeHook>) -> Self {
        self.repo_hook = Some(hook);
        self
    }

    pub fn with_branding_hook(mut self, hook: Arc<dyn ChangeHook>) -> Self {
        self.branding_hook = Some(hook);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Run one reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnected`] when the expected serials cannot be
    /// fetched, and the fatal identity errors unchanged. Failures of single
    /// certificates are recorded in the report instead.
    pub fn run(&self) -> Result<EntitlementReport> {
        let mut report = EntitlementReport::new();

        self.store.refresh()?;
        let local: BTreeMap<u64, Certificate> = self
            .store
            .list()?
            .into_iter()
            .map(|cert| (cert.serial, cert))
            .collect();
        report.valid = local.keys().copied().collect();

        let expected = self.expected_serials()?;
        report.expected = expected.clone();

        let plan = UpdatePlan::compute(local.keys().copied(), expected);
        tracing::debug!(missing = ?plan.missing, rogue = ?plan.rogue, "Computed certificate update plan");

        self.delete_rogue(&plan, &local, &mut report);
        self.install_missing(&plan, &mut report)?;

        if report.has_changes() {
            self.run_hooks(&report);
        }

        for line in audit_lines(&report) {
            self.audit.record(&line);
        }

        tracing::info!("certs updated:\n{}", report);
        Ok(report)
    }

    fn expected_serials(&self) -> Result<Vec<u64>> {
        let Some(upstream) = &self.upstream else {
            tracing::debug!("No entitlement source configured, expecting no certificates");
            return Ok(Vec::new());
        };

        upstream
            .source
            .expected_serials(&upstream.consumer)
            .inspect_err(|e| {
                if e.is_disconnected() {
                    tracing::error!("Cannot modify subscriptions while disconnected: {}", e);
                }
            })
    }

    fn delete_rogue(
        &self,
        plan: &UpdatePlan,
        local: &BTreeMap<u64, Certificate>,
        report: &mut EntitlementReport,
    ) {
        for serial in &plan.rogue {
            let Some(cert) = local.get(serial) else {
                continue;
            };
            match self.store.delete(cert) {
                Ok(()) => report.rogue.push(cert.clone()),
                Err(e) => {
                    tracing::warn!(serial, "Failed to delete certificate: {}", e);
                    report
                        .exceptions
                        .push(ItemFailure::new(format!("serial {}", serial), &e));
                }
            }
        }

        let deleted = report.rogue.len();
        if deleted == 0 {
            return;
        }
        if deleted == 1 {
            tracing::info!("1 local certificate has been deleted.");
        } else {
            tracing::info!("{} local certificates have been deleted.", deleted);
        }

        if let Err(e) = self.store.refresh() {
            tracing::warn!("Failed to refresh certificate store after delete: {}", e);
            report.exceptions.push(ItemFailure::new("refresh", &e));
        }
    }

    fn install_missing(&self, plan: &UpdatePlan, report: &mut EntitlementReport) -> Result<()> {
        if plan.missing.is_empty() {
            return Ok(());
        }
        let Some(upstream) = &self.upstream else {
            return Ok(());
        };

        let serials: Vec<u64> = plan.missing.iter().copied().collect();
        let bundles = match upstream
            .source
            .certificate_bundles(&upstream.consumer, &serials)
        {
            Ok(bundles) => bundles,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(serials = ?serials, "Failed to fetch certificate bundles: {}", e);
                report.exceptions.push(ItemFailure::new("bundles", &e));
                return Ok(());
            }
        };

        for (idx, bundle) in bundles.iter().enumerate() {
            match self.install_bundle(bundle) {
                Ok(cert) => {
                    tracing::debug!(serial = cert.serial, "Installed certificate");
                    report.added.push(cert);
                }
                Err(e) => {
                    tracing::error!(bundle = idx, "Bundle not loaded: {}", e);
                    report
                        .exceptions
                        .push(ItemFailure::new(format!("bundle {}", idx), &e));
                }
            }
        }

        Ok(())
    }

    fn install_bundle(&self, bundle: &CertificateBundle) -> Result<Certificate> {
        let key_pem = bundle
            .key
            .as_deref()
            .ok_or(Error::IncompleteBundle { field: "key" })?;
        let cert_pem = bundle
            .cert
            .as_deref()
            .ok_or(Error::IncompleteBundle { field: "cert" })?;

        let key = PrivateKey::from_pem(key_pem)?;
        let cert = Certificate::from_pem(cert_pem)?;
        self.store.write(&key, &cert)
    }

    fn run_hooks(&self, report: &EntitlementReport) {
        let changes = ChangeSet::new(report.added_serials(), report.rogue_serials());

        for hook in [&self.repo_hook, &self.branding_hook].into_iter().flatten() {
            if let Err(e) = hook.run(&changes) {
                tracing::warn!(hook = hook.name(), "Change hook failed: {}", e);
            }
        }
    }
}

impl Reconciler for CertificateReconciler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn reconcile(&self) -> Result<Report> {
        self.run().map(Report::Entitlements)
    }
}
