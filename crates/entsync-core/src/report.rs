//! Reconciliation reports
//!
//! Every reconciler returns one [`Report`]. Reports accumulate while the
//! reconciler runs and are read-only once returned.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::certificate::Certificate;

/// A single item that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// What failed, e.g. `serial 100` or `bundle 2`
    pub item: String,
    pub message: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, error: &dyn std::error::Error) -> Self {
        Self {
            item: item.into(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.message)
    }
}

/// Outcome of an entitlement certificate reconciliation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntitlementReport {
    /// Serials found locally at the start of the run
    pub valid: Vec<u64>,
    /// Serials the server expects
    pub expected: Vec<u64>,
    /// Certificates installed by this run
    pub added: Vec<Certificate>,
    /// Certificates removed by this run
    pub rogue: Vec<Certificate>,
    pub exceptions: Vec<ItemFailure>,
}

impl EntitlementReport {
    pub const NAME: &'static str = "Entitlement Cert Updates";

    pub fn new() -> Self {
        Self::default()
    }

    /// Certificates installed plus certificates deleted.
    pub fn updates(&self) -> usize {
        self.added.len() + self.rogue.len()
    }

    pub fn has_changes(&self) -> bool {
        self.updates() > 0
    }

    pub fn added_serials(&self) -> Vec<u64> {
        self.added.iter().map(|c| c.serial).collect()
    }

    pub fn rogue_serials(&self) -> Vec<u64> {
        self.rogue.iter().map(|c| c.serial).collect()
    }
}

fn write_certificates(f: &mut fmt::Formatter<'_>, title: &str, certs: &[Certificate]) -> fmt::Result {
    writeln!(f, "{}", title)?;
    if certs.is_empty() {
        return writeln!(f, "  <NONE>");
    }
    for cert in certs {
        let path = cert
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<not written>".to_string());
        if cert.products.is_empty() {
            writeln!(f, "  [sn:{} ({}) @ {}]", cert.serial, cert.order.name, path)?;
        }
        for product in &cert.products {
            writeln!(f, "  [sn:{} ({}) @ {}]", cert.serial, product.name, path)?;
        }
    }
    Ok(())
}

impl fmt::Display for EntitlementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total updates: {}", self.updates())?;
        writeln!(f, "Found (local) serial# {:?}", self.valid)?;
        writeln!(f, "Expected (server) serial# {:?}", self.expected)?;
        write_certificates(f, "Added (new):", &self.added)?;
        write_certificates(f, "Deleted (rogue):", &self.rogue)?;
        if !self.exceptions.is_empty() {
            writeln!(f, "Exceptions:")?;
            for failure in &self.exceptions {
                writeln!(f, "  {}", failure)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a remote-repository config reconciliation.
///
/// `remote_updates` is the complete new remote set (the config is replaced
/// wholesale); `remote_added` and `remote_deleted` are informational diffs
/// against the previous config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReport {
    pub remote_updates: Vec<String>,
    pub remote_added: Vec<String>,
    pub remote_deleted: Vec<String>,
    /// Origin file rewritten by this run, if any
    pub origin: Option<String>,
    /// Refspec written to the origin file, if any
    pub refspec: Option<String>,
    pub exceptions: Vec<ItemFailure>,
}

impl RemoteReport {
    pub const NAME: &'static str = "Ostree repo updates report";

    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remotes written. Approximate by nature of the full replace.
    pub fn updates(&self) -> usize {
        self.remote_updates.len()
    }
}

impl fmt::Display for RemoteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ostree repo updates")?;
        writeln!(f, "Origin: {}", self.origin.as_deref().unwrap_or("<unchanged>"))?;
        writeln!(f, "Refspec: {}", self.refspec.as_deref().unwrap_or("<unchanged>"))?;
        writeln!(f, "Updated: {:?}", self.remote_updates)?;
        writeln!(f, "Added: {:?}", self.remote_added)?;
        writeln!(f, "Deleted: {:?}", self.remote_deleted)
    }
}

/// Report for reconcilers supplied by embedding applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomReport {
    pub name: String,
    pub updates: usize,
    pub exceptions: Vec<ItemFailure>,
}

impl fmt::Display for CustomReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} updates", self.name, self.updates)
    }
}

/// One reconciler's outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Report {
    Entitlements(EntitlementReport),
    Remotes(RemoteReport),
    Custom(CustomReport),
}

impl Report {
    pub fn name(&self) -> &str {
        match self {
            Self::Entitlements(_) => EntitlementReport::NAME,
            Self::Remotes(_) => RemoteReport::NAME,
            Self::Custom(r) => &r.name,
        }
    }

    pub fn updates(&self) -> usize {
        match self {
            Self::Entitlements(r) => r.updates(),
            Self::Remotes(r) => r.updates(),
            Self::Custom(r) => r.updates,
        }
    }

    pub fn exceptions(&self) -> &[ItemFailure] {
        match self {
            Self::Entitlements(r) => &r.exceptions,
            Self::Remotes(r) => &r.exceptions,
            Self::Custom(r) => &r.exceptions,
        }
    }

    pub fn as_entitlements(&self) -> Option<&EntitlementReport> {
        match self {
            Self::Entitlements(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_remotes(&self) -> Option<&RemoteReport> {
        match self {
            Self::Remotes(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entitlements(r) => fmt::Display::fmt(r, f),
            Self::Remotes(r) => fmt::Display::fmt(r, f),
            Self::Custom(r) => fmt::Display::fmt(r, f),
        }
    }
}
