//! Reconcilers
//!
//! A reconciler compares one kind of desired state against local state,
//! applies the difference and reports what it did. The orchestrator runs a
//! fixed list of them per cycle.

mod entitlements;

pub use entitlements::CertificateReconciler;

use crate::Result;
use crate::report::Report;

/// One unit of reconciliation work.
///
/// Item-level failures belong in the returned report. An `Err` means the
/// reconciler as a whole could not run.
pub trait Reconciler: Send + Sync {
    /// Stable name used in logs and cycle outcomes.
    fn name(&self) -> &str;

    fn reconcile(&self) -> Result<Report>;
}
