//! Entitlement state reconciliation
//!
//! Compares the entitlement certificates a consumer should hold (as reported by
//! an [`EntitlementSource`]) with what is installed in a [`CertificateStore`],
//! applies the difference and reports it. The [`Orchestrator`] runs reconcilers
//! in a fixed order under the system-wide action lock.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use entsync_core::{
//!     ActionLock, CertificateReconciler, CycleKind, EntitlementDirectory, Orchestrator,
//! };
//!
//! let store = Arc::new(EntitlementDirectory::new("/etc/pki/entitlement"));
//! let lock = Arc::new(ActionLock::new("/var/lock/subsys/rhsm"));
//!
//! let orchestrator = Orchestrator::new(lock).with_plan(
//!     CycleKind::Unregister,
//!     vec![Arc::new(CertificateReconciler::unregistered(store))],
//! );
//! let cycle = orchestrator.run(CycleKind::Unregister)?;
//! println!("{} updates", cycle.updates());
//! # Ok::<(), entsync_core::Error>(())
//! ```

pub mod audit;
pub mod branding;
pub mod certificate;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod reconcile;
pub mod report;
pub mod settings;
pub mod source;
pub mod store;

pub use audit::{AuditSink, MemoryAudit, TracingAudit};
pub use branding::BrandingInstaller;
pub use certificate::{Certificate, Content, Order, PrivateKey, Product};
pub use error::{Error, ErrorClass, Result};
pub use hooks::{
    ChangeHook, ChangeSet, CommandHook, HookChain, HookConfig, HookContext, HookEvent,
};
pub use orchestrator::{CycleKind, CycleReport, Orchestrator, Outcome};
pub use plan::UpdatePlan;
pub use reconcile::{CertificateReconciler, Reconciler};
pub use report::{CustomReport, EntitlementReport, ItemFailure, RemoteReport, Report};
pub use settings::{PathSettings, ServerSettings, Settings};
pub use source::{CertificateBundle, ConsumerIdentity, EntitlementSource};
pub use store::{CertificateStore, EntitlementDirectory};

pub use entsync_fs::ActionLock;
