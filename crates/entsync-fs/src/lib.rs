//! Filesystem primitives for entitlement sync
//!
//! Provides atomic file replacement, the system-wide action lock that guards a
//! reconciliation cycle, a format-agnostic settings store and a small
//! keyfile (INI) document model used for ostree configuration files.

pub mod config;
pub mod error;
pub mod io;
pub mod keyfile;
pub mod lock;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use keyfile::{KeyFile, Section};
pub use lock::{ActionLock, LockGuard};
