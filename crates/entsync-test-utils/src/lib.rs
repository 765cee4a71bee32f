//! Shared test utilities for the entsync workspace.
//!
//! Dev-dependency only, never published. Has no dependency on `entsync-core`;
//! use it from `tests/` directories.
//!
//! # Modules
//!
//! - [`payload`] : [`EntitlementBuilder`](payload::EntitlementBuilder) for certificate and key payloads
//! - [`env`] : [`TestEnv`](env::TestEnv), a scratch system layout on a temp dir

pub mod env;
pub mod payload;

pub use env::TestEnv;
pub use payload::{EntitlementBuilder, key_pem};
