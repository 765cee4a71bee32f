//! Local certificate store
//!
//! The store is the on-disk side of reconciliation. [`EntitlementDirectory`]
//! keeps one `<serial>.pem` and one `<serial>-key.pem` per certificate. Its
//! listing is cached until [`CertificateStore::refresh`] is called or the
//! store itself writes or deletes a certificate.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::certificate::{Certificate, PrivateKey};
use crate::Result;

const KEY_SUFFIX: &str = "-key.pem";
const CERT_SUFFIX: &str = ".pem";

/// Directory-like view of installed entitlement certificates.
pub trait CertificateStore: Send + Sync {
    /// Installed certificates, ordered by serial.
    fn list(&self) -> Result<Vec<Certificate>>;

    /// Drop any cached view and re-read the backing storage.
    fn refresh(&self) -> Result<()>;

    /// Remove a certificate and its key.
    fn delete(&self, cert: &Certificate) -> Result<()>;

    /// Persist a key and certificate, returning the stored certificate.
    fn write(&self, key: &PrivateKey, cert: &Certificate) -> Result<Certificate>;

    /// Certificates whose validity window contains `at`.
    fn list_valid(&self, at: DateTime<Utc>) -> Result<Vec<Certificate>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|c| c.is_valid_at(at))
            .collect())
    }
}

/// Filesystem-backed certificate store (e.g. `/etc/pki/entitlement`).
#[derive(Debug)]
pub struct EntitlementDirectory {
    root: PathBuf,
    cache: Mutex<Option<Vec<Certificate>>>,
}

impl EntitlementDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a certificate with `serial` is stored at.
    pub fn cert_path(&self, serial: u64) -> PathBuf {
        self.root.join(format!("{}{}", serial, CERT_SUFFIX))
    }

    /// Path the key for `serial` is stored at.
    pub fn key_path(&self, serial: u64) -> PathBuf {
        self.root.join(format!("{}{}", serial, KEY_SUFFIX))
    }

    fn cache(&self) -> MutexGuard<'_, Option<Vec<Certificate>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn scan(&self) -> Result<Vec<Certificate>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.root.display(), "Entitlement directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(entsync_fs::Error::io(&self.root, e).into()),
        };

        let mut certs = Vec::new();
        let mut seen = BTreeSet::new();

        for entry in entries {
            let path = entry.map_err(|e| entsync_fs::Error::io(&self.root, e))?.path();
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if !name.ends_with(CERT_SUFFIX) || name.ends_with(KEY_SUFFIX) || !path.is_file() {
                continue;
            }

            let pem = entsync_fs::io::read_text(&path)?;
            match Certificate::from_pem(&pem) {
                Ok(cert) => {
                    if !seen.insert(cert.serial) {
                        tracing::warn!(
                            serial = cert.serial,
                            path = %path.display(),
                            "Duplicate serial in entitlement directory, ignoring"
                        );
                        continue;
                    }
                    certs.push(cert.with_path(path));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Skipping unreadable certificate: {}", e);
                }
            }
        }

        certs.sort_by_key(|c| c.serial);
        Ok(certs)
    }
}

impl CertificateStore for EntitlementDirectory {
    fn list(&self) -> Result<Vec<Certificate>> {
        let mut cache = self.cache();
        if let Some(certs) = cache.as_ref() {
            return Ok(certs.clone());
        }
        let certs = self.scan()?;
        *cache = Some(certs.clone());
        Ok(certs)
    }

    fn refresh(&self) -> Result<()> {
        let certs = self.scan()?;
        *self.cache() = Some(certs);
        Ok(())
    }

    fn delete(&self, cert: &Certificate) -> Result<()> {
        let cert_path = cert
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cert_path(cert.serial));

        let removed = remove_pair(&cert_path);
        // Even a partial removal changes the directory.
        *self.cache() = None;
        removed?;

        tracing::debug!(serial = cert.serial, path = %cert_path.display(), "Deleted certificate");
        Ok(())
    }

    fn write(&self, key: &PrivateKey, cert: &Certificate) -> Result<Certificate> {
        let key_path = self.key_path(cert.serial);
        let cert_path = self.cert_path(cert.serial);

        entsync_fs::io::write_text(&key_path, key.pem())?;
        entsync_fs::io::write_text(&cert_path, cert.pem())?;
        *self.cache() = None;

        tracing::debug!(serial = cert.serial, path = %cert_path.display(), "Wrote certificate");
        Ok(cert.clone().with_path(cert_path))
    }
}

/// Key first; if that fails the certificate stays in place.
fn remove_pair(cert_path: &Path) -> Result<()> {
    let key_path = key_path_for(cert_path);
    match entsync_fs::io::remove_file(&key_path) {
        Err(e) if e.is_not_found() => {
            tracing::debug!(path = %key_path.display(), "No key file to remove");
        }
        other => other?,
    }
    entsync_fs::io::remove_file(cert_path)?;
    Ok(())
}

/// Key file stored next to `cert_path` (`100.pem` -> `100-key.pem`).
pub fn key_path_for(cert_path: &Path) -> PathBuf {
    let stem = cert_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let base = stem.strip_suffix(CERT_SUFFIX).unwrap_or(&stem);
    cert_path.with_file_name(format!("{}{}", base, KEY_SUFFIX))
}
