//! Fakes shared by the entsync-core integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use entsync_core::{
    Certificate, CertificateBundle, CertificateStore, ChangeHook, ChangeSet, ConsumerIdentity,
    EntitlementDirectory, EntitlementSource, Error, PrivateKey, Result,
};
use entsync_test_utils::EntitlementBuilder;
use uuid::Uuid;

pub fn consumer() -> ConsumerIdentity {
    ConsumerIdentity::new(Uuid::from_u128(0x5eed))
}

/// Which error a fake call should fail with.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Disconnected,
    Gone,
    Expired,
    ServerError,
}

impl Failure {
    fn into_error(self) -> Error {
        match self {
            Failure::Disconnected => Error::Disconnected {
                message: "connection refused".into(),
            },
            Failure::Gone => Error::Gone {
                consumer: consumer().to_string(),
                message: "consumer deleted".into(),
            },
            Failure::Expired => Error::IdentityExpired {
                message: "certificate revoked".into(),
            },
            Failure::ServerError => Error::Remote {
                status: 500,
                message: "internal error".into(),
            },
        }
    }
}

/// In-memory entitlement server.
#[derive(Default)]
pub struct FakeSource {
    certs: Vec<EntitlementBuilder>,
    extra_bundles: Vec<CertificateBundle>,
    serials_failure: Option<Failure>,
    bundles_failure: Option<Failure>,
    pub serial_calls: AtomicUsize,
    pub bundle_requests: Mutex<Vec<Vec<u64>>>,
}

impl FakeSource {
    pub fn with_certs(certs: Vec<EntitlementBuilder>) -> Self {
        Self {
            certs,
            ..Self::default()
        }
    }

    pub fn serving(serials: &[u64]) -> Self {
        Self::with_certs(serials.iter().map(|s| EntitlementBuilder::new(*s)).collect())
    }

    /// Return `bundle` alongside the real ones whenever bundles are requested.
    pub fn extra_bundle(mut self, bundle: CertificateBundle) -> Self {
        self.extra_bundles.push(bundle);
        self
    }

    pub fn failing_serials(mut self, failure: Failure) -> Self {
        self.serials_failure = Some(failure);
        self
    }

    pub fn failing_bundles(mut self, failure: Failure) -> Self {
        self.bundles_failure = Some(failure);
        self
    }

    pub fn bundle_requests(&self) -> Vec<Vec<u64>> {
        self.bundle_requests.lock().unwrap().clone()
    }
}

impl EntitlementSource for FakeSource {
    fn expected_serials(&self, _consumer: &ConsumerIdentity) -> Result<Vec<u64>> {
        self.serial_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.serials_failure {
            return Err(failure.into_error());
        }
        Ok(self.certs.iter().map(EntitlementBuilder::serial).collect())
    }

    fn certificate_bundles(
        &self,
        _consumer: &ConsumerIdentity,
        serials: &[u64],
    ) -> Result<Vec<CertificateBundle>> {
        self.bundle_requests.lock().unwrap().push(serials.to_vec());
        if let Some(failure) = self.bundles_failure {
            return Err(failure.into_error());
        }
        let mut bundles: Vec<CertificateBundle> = self
            .certs
            .iter()
            .filter(|c| serials.contains(&c.serial()))
            .map(|c| CertificateBundle::new(c.cert_pem(), c.key_pem()))
            .collect();
        bundles.extend(self.extra_bundles.iter().cloned());
        Ok(bundles)
    }
}

/// Records every invocation; optionally fails after recording.
#[derive(Default)]
pub struct RecordingHook {
    pub calls: Mutex<Vec<ChangeSet>>,
    pub fail: bool,
}

impl RecordingHook {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ChangeSet> {
        self.calls.lock().unwrap().clone()
    }
}

impl ChangeHook for RecordingHook {
    fn name(&self) -> &str {
        "recording"
    }

    fn run(&self, changes: &ChangeSet) -> Result<()> {
        self.calls.lock().unwrap().push(changes.clone());
        if self.fail {
            return Err(Error::HookFailed {
                event: "repo-update".into(),
                command: "recording".into(),
                message: "told to fail".into(),
            });
        }
        Ok(())
    }
}

/// An [`EntitlementDirectory`] whose delete fails for chosen serials.
pub struct FlakyStore {
    pub inner: EntitlementDirectory,
    pub undeletable: Vec<u64>,
    pub refreshes: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: EntitlementDirectory, undeletable: Vec<u64>) -> Self {
        Self {
            inner,
            undeletable,
            refreshes: AtomicUsize::new(0),
        }
    }
}

impl CertificateStore for FlakyStore {
    fn list(&self) -> Result<Vec<Certificate>> {
        self.inner.list()
    }

    fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.inner.refresh()
    }

    fn delete(&self, cert: &Certificate) -> Result<()> {
        if self.undeletable.contains(&cert.serial) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("cannot remove {}", cert.serial),
            )));
        }
        self.inner.delete(cert)
    }

    fn write(&self, key: &PrivateKey, cert: &Certificate) -> Result<Certificate> {
        self.inner.write(key, cert)
    }

    fn list_valid(&self, at: DateTime<Utc>) -> Result<Vec<Certificate>> {
        self.inner.list_valid(at)
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
