//! Error types for entsync-client

use std::path::PathBuf;

/// Result type for client construction
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building an HTTP entitlement source
///
/// Request failures are reported as [`entsync_core::Error`] by the
/// [`EntitlementSource`](entsync_core::EntitlementSource) methods instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid consumer identity at {path}: {message}")]
    Identity { path: PathBuf, message: String },

    #[error("Invalid CA certificate at {path}: {message}")]
    CaCertificate { path: PathBuf, message: String },

    #[error("Invalid server URL `{url}`")]
    InvalidUrl { url: String },

    #[error(transparent)]
    Fs(#[from] entsync_fs::Error),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
