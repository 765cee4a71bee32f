//! Error types for entsync-ostree

use std::path::PathBuf;

/// Result type for entsync-ostree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in entsync-ostree operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `[remote "..."]` section header could not be parsed
    #[error("Cannot parse remote name from section `{section}`")]
    RemoteSectionName { section: String },

    /// A keyfile lacks a required key
    #[error("{path} has no `{key}` in [{section}]")]
    MissingKey {
        path: PathBuf,
        section: String,
        key: String,
    },

    /// The booted deployment could not be resolved
    #[error("Cannot locate booted deployment: {message}")]
    Deployment { message: String },

    #[error(transparent)]
    Fs(#[from] entsync_fs::Error),

    #[error(transparent)]
    Core(#[from] entsync_core::Error),
}

impl From<Error> for entsync_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(e) => e,
            Error::Fs(e) => entsync_core::Error::Fs(e),
            other => entsync_core::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                other.to_string(),
            )),
        }
    }
}
