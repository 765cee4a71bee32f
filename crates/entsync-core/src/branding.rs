//! Product branding
//!
//! When the installed entitlements provide exactly one OS-branded product, its
//! brand name is written to the branded-name file so the login banner and
//! similar consumers pick it up.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::Result;
use crate::hooks::{ChangeHook, ChangeSet};
use crate::store::CertificateStore;

const OS_BRAND_TYPE: &str = "OS";

/// Writes the branded product name derived from valid certificates.
pub struct BrandingInstaller {
    store: Arc<dyn CertificateStore>,
    path: PathBuf,
}

impl BrandingInstaller {
    pub fn new(store: Arc<dyn CertificateStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Distinct OS brand names across currently valid certificates.
    pub fn brand_names(&self) -> Result<BTreeSet<String>> {
        let names = self
            .store
            .list_valid(Utc::now())?
            .iter()
            .flat_map(|cert| cert.products.iter())
            .filter(|p| p.brand_type.as_deref() == Some(OS_BRAND_TYPE))
            .filter_map(|p| p.brand_name.clone())
            .filter(|name| !name.trim().is_empty())
            .collect();
        Ok(names)
    }

    /// Write the brand name if it is unambiguous and differs from the file.
    ///
    /// Returns the name written, or `None` when nothing changed.
    pub fn install(&self) -> Result<Option<String>> {
        let names = self.brand_names()?;

        let name = match names.len() {
            0 => {
                tracing::debug!("No OS-branded products installed");
                return Ok(None);
            }
            1 => names.into_iter().next().unwrap_or_default(),
            n => {
                tracing::warn!(count = n, brands = ?names, "Multiple OS brand names found, not updating branding");
                return Ok(None);
            }
        };

        let current = match entsync_fs::io::read_text(&self.path) {
            Ok(text) => Some(text),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        if current.as_deref().map(str::trim) == Some(name.as_str()) {
            tracing::debug!(brand = %name, "Branding already current");
            return Ok(None);
        }

        entsync_fs::io::write_text(&self.path, &format!("{}\n", name))?;
        tracing::info!(brand = %name, path = %self.path.display(), "Updated branded name");
        Ok(Some(name))
    }
}

impl ChangeHook for BrandingInstaller {
    fn name(&self) -> &str {
        "branding"
    }

    fn run(&self, _changes: &ChangeSet) -> Result<()> {
        self.install().map(|_| ())
    }
}
