//! Audit trail for certificate changes

use std::sync::Mutex;

use crate::report::EntitlementReport;

/// Destination for one-line audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, line: &str);
}

/// Writes audit records through `tracing` under the `entsync::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, line: &str) {
        tracing::info!(target: "entsync::audit", "{}", line);
    }
}

/// Keeps audit records in memory.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    lines: Mutex<Vec<String>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.to_string());
    }
}

/// Audit lines for every certificate a report added or removed.
///
/// One line per certificate naming order and contract, then one per product.
pub fn audit_lines(report: &EntitlementReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (verb, certs) in [("Added", &report.added), ("Removed", &report.rogue)] {
        for cert in certs {
            lines.push(format!(
                "{} subscription for '{}' contract '{}'",
                verb, cert.order.name, cert.order.contract
            ));
            for product in &cert.products {
                lines.push(format!("{} subscription for product '{}'", verb, product.name));
            }
        }
    }
    lines
}
