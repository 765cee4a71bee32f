//! Update plan: the set difference between local and desired state

use std::collections::BTreeSet;

/// What a certificate reconciliation has to change.
///
/// Derived fresh every cycle and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// In the desired set but not installed
    pub missing: BTreeSet<u64>,
    /// Installed but not in the desired set
    pub rogue: BTreeSet<u64>,
}

impl UpdatePlan {
    /// `missing = desired - local`, `rogue = local - desired`.
    pub fn compute(
        local: impl IntoIterator<Item = u64>,
        desired: impl IntoIterator<Item = u64>,
    ) -> Self {
        let local: BTreeSet<u64> = local.into_iter().collect();
        let desired: BTreeSet<u64> = desired.into_iter().collect();

        Self {
            missing: desired.difference(&local).copied().collect(),
            rogue: local.difference(&desired).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.rogue.is_empty()
    }
}
