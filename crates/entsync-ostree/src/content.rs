//! ostree content granted by installed entitlements

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use entsync_core::{Certificate, CertificateStore, Content};

/// Content type tag marking ostree content sets.
pub const OSTREE_CONTENT_TYPE: &str = "ostree";

/// One content set and the certificate granting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub content: Content,
    pub serial: u64,
    pub cert_path: Option<PathBuf>,
}

/// ostree content from currently valid certificates, unique by label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSet {
    items: Vec<ContentItem>,
}

impl ContentSet {
    /// Collect ostree content from `certs`.
    ///
    /// When two certificates carry the same label the lower serial wins.
    pub fn from_certificates(certs: &[Certificate]) -> Self {
        let mut ordered: Vec<&Certificate> = certs.iter().collect();
        ordered.sort_by_key(|c| c.serial);

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for cert in ordered {
            for content in cert.content_of_type(OSTREE_CONTENT_TYPE) {
                if !seen.insert(content.label.clone()) {
                    tracing::debug!(label = %content.label, serial = cert.serial, "Duplicate ostree content label, ignoring");
                    continue;
                }
                items.push(ContentItem {
                    content: content.clone(),
                    serial: cert.serial,
                    cert_path: cert.path.clone(),
                });
            }
        }
        Self { items }
    }

    /// Content from certificates in `store` that are valid at `at`.
    pub fn load(store: &dyn CertificateStore, at: DateTime<Utc>) -> entsync_core::Result<Self> {
        let valid = store.list_valid(at)?;
        Ok(Self::from_certificates(&valid))
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.content.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
