//! Desired-state provider
//!
//! The entitlement server is the authority on which certificates a consumer
//! should hold. Implementations map transport failures onto
//! [`Error::Disconnected`](crate::Error::Disconnected) and identity rejections
//! onto the fatal variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// The registered system identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerIdentity {
    pub uuid: Uuid,
}

impl ConsumerIdentity {
    pub fn new(uuid: Uuid) -> Self {
        Self { uuid }
    }
}

impl fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

/// Raw certificate and key payloads as returned by the server.
///
/// Fields are optional so that a malformed bundle fails on its own instead of
/// failing the whole batch at deserialization time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBundle {
    #[serde(default)]
    pub cert: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

impl CertificateBundle {
    pub fn new(cert: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            cert: Some(cert.into()),
            key: Some(key.into()),
        }
    }
}

/// Remote source of the desired certificate set.
pub trait EntitlementSource: Send + Sync {
    /// Serials the server considers valid for `consumer`.
    fn expected_serials(&self, consumer: &ConsumerIdentity) -> Result<Vec<u64>>;

    /// Bundles for the requested serials, in whatever order the server returns them.
    fn certificate_bundles(
        &self,
        consumer: &ConsumerIdentity,
        serials: &[u64],
    ) -> Result<Vec<CertificateBundle>>;
}
