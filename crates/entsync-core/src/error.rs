//! Error types for entsync-core

/// Result type for entsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// How the orchestrator must treat an error escaping a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unwinds past the orchestrator so the caller can clean up identity state.
    Fatal,
    /// Logged and recorded; sibling reconcilers keep running.
    Recoverable,
}

/// Errors that can occur in entsync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server no longer knows this consumer
    #[error("Consumer {consumer} has been deleted on the entitlement server: {message}")]
    Gone { consumer: String, message: String },

    /// The identity certificate was rejected as expired or revoked
    #[error("Identity certificate is expired or invalid: {message}")]
    IdentityExpired { message: String },

    /// The entitlement server could not be reached
    #[error("Cannot reach the entitlement server: {message}")]
    Disconnected { message: String },

    /// Any other non-success response from the entitlement server
    #[error("Entitlement server returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// A certificate payload could not be decoded
    #[error("Invalid certificate payload: {message}")]
    CertificateParse { message: String },

    /// A private key payload could not be decoded
    #[error("Invalid key payload: {message}")]
    KeyParse { message: String },

    /// A certificate bundle lacks a required field
    #[error("Certificate bundle is missing `{field}`")]
    IncompleteBundle { field: &'static str },

    /// A change hook failed
    #[error("Hook {event} command `{command}` failed: {message}")]
    HookFailed {
        event: String,
        command: String,
        message: String,
    },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from entsync-fs
    #[error(transparent)]
    Fs(#[from] entsync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error for the orchestrator's per-reconciler guard.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Gone { .. } | Self::IdentityExpired { .. } => ErrorClass::Fatal,
            _ => ErrorClass::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_gone_and_expired_identity_are_fatal() {
        let fatal = [
            Error::Gone {
                consumer: "c".into(),
                message: "410".into(),
            },
            Error::IdentityExpired {
                message: "401".into(),
            },
        ];
        for err in &fatal {
            assert_eq!(err.class(), ErrorClass::Fatal, "{}", err);
        }

        let recoverable = [
            Error::Disconnected {
                message: "refused".into(),
            },
            Error::Remote {
                status: 500,
                message: "boom".into(),
            },
            Error::IncompleteBundle { field: "key" },
            Error::Io(std::io::Error::other("disk")),
        ];
        for err in &recoverable {
            assert_eq!(err.class(), ErrorClass::Recoverable, "{}", err);
        }
    }

    #[test]
    fn disconnected_is_distinguishable() {
        let err = Error::Disconnected {
            message: "connection refused".into(),
        };
        assert!(err.is_disconnected());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("connection refused"));
    }
}
