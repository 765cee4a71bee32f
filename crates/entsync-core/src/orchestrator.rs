//! Cycle orchestration
//!
//! The orchestrator runs a fixed, ordered list of reconcilers for a cycle kind
//! while holding the system-wide [`ActionLock`]. A recoverable failure of one
//! reconciler is logged and leaves an empty slot; its siblings still run. A
//! fatal failure stops the cycle and is returned to the caller, which is
//! expected to clean up identity state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use entsync_fs::ActionLock;
use serde::Serialize;

use crate::Result;
use crate::reconcile::Reconciler;
use crate::report::Report;

/// The kinds of cycle a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleKind {
    /// Periodic update against the server
    Update,
    /// Repair local state
    Heal,
    /// Remove everything after unregistering
    Unregister,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => write!(f, "update"),
            Self::Heal => write!(f, "heal"),
            Self::Unregister => write!(f, "unregister"),
        }
    }
}

/// What one reconciler produced during a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub reconciler: String,
    /// `None` when the reconciler failed
    pub report: Option<Report>,
    /// Error text of a recoverable failure
    pub error: Option<String>,
    /// Whether the failure was loss of connectivity
    pub disconnected: bool,
}

/// Result of one cycle: one outcome per configured reconciler, in order.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub outcomes: Vec<Outcome>,
}

impl CycleReport {
    /// One slot per reconciler; failed reconcilers are `None`.
    pub fn reports(&self) -> Vec<Option<&Report>> {
        self.outcomes.iter().map(|o| o.report.as_ref()).collect()
    }

    /// Whether any reconciler failed because the server was unreachable.
    pub fn disconnected(&self) -> bool {
        self.outcomes.iter().any(|o| o.disconnected)
    }

    /// Sum of updates across successful reconcilers.
    pub fn updates(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.report.as_ref())
            .map(Report::updates)
            .sum()
    }
}

/// Runs reconciler plans under the action lock.
pub struct Orchestrator {
    lock: Arc<ActionLock>,
    plans: HashMap<CycleKind, Vec<Arc<dyn Reconciler>>>,
}

impl Orchestrator {
    pub fn new(lock: Arc<ActionLock>) -> Self {
        Self {
            lock,
            plans: HashMap::new(),
        }
    }

    /// Set the ordered reconciler list for a cycle kind.
    pub fn with_plan(mut self, kind: CycleKind, reconcilers: Vec<Arc<dyn Reconciler>>) -> Self {
        self.plans.insert(kind, reconcilers);
        self
    }

    /// Names of the reconcilers configured for `kind`, in run order.
    pub fn plan(&self, kind: CycleKind) -> Vec<&str> {
        self.plans
            .get(&kind)
            .map(|list| list.iter().map(|r| r.name()).collect())
            .unwrap_or_default()
    }

    /// Run one cycle.
    ///
    /// # Errors
    ///
    /// Returns an error when the lock cannot be taken, or the first fatal
    /// error raised by a reconciler. The lock is released in both cases.
    pub fn run(&self, kind: CycleKind) -> Result<CycleReport> {
        let _guard = self.lock.acquire()?;
        tracing::debug!(kind = %kind, "Starting cycle");

        let reconcilers = self.plans.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
        let mut outcomes = Vec::with_capacity(reconcilers.len());

        for reconciler in reconcilers {
            let name = reconciler.name().to_string();
            match reconciler.reconcile() {
                Ok(report) => {
                    for failure in report.exceptions() {
                        tracing::error!(reconciler = %name, "{}", failure);
                    }
                    outcomes.push(Outcome {
                        reconciler: name,
                        report: Some(report),
                        error: None,
                        disconnected: false,
                    });
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(reconciler = %name, "Fatal error, aborting cycle: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(reconciler = %name, "Reconciler failed: {}", e);
                    outcomes.push(Outcome {
                        reconciler: name,
                        report: None,
                        error: Some(e.to_string()),
                        disconnected: e.is_disconnected(),
                    });
                }
            }
        }

        tracing::debug!(kind = %kind, "Cycle finished");
        Ok(CycleReport { kind, outcomes })
    }
}
