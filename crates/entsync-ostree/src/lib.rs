//! ostree remote configuration from entitlements
//!
//! Entitlement certificates can grant `ostree` content sets. This crate turns
//! the content of the currently valid certificates into `[remote "..."]`
//! sections of the ostree repo config, replacing whatever remotes were there,
//! and points the booted deployment's origin at the new remote.
//!
//! [`RemoteConfigReconciler`] is both a [`Reconciler`](entsync_core::Reconciler)
//! for the orchestrator and a [`ChangeHook`](entsync_core::ChangeHook) for the
//! certificate reconciler's repo hook.

pub mod content;
pub mod error;
pub mod model;
pub mod origin;
pub mod reconcile;
pub mod repo_file;
pub mod updates;

pub use content::{ContentItem, ContentSet, OSTREE_CONTENT_TYPE};
pub use error::{Error, Result};
pub use model::{OstreeConfig, RemoteEntry};
pub use origin::{DeploymentInspector, OriginUpdate, OriginUpdater, OstreeSysroot};
pub use reconcile::RemoteConfigReconciler;
pub use repo_file::{OriginFile, RepoFile, replace_refspec_remote};
pub use updates::ConfigUpdates;
