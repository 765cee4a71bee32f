use std::collections::BTreeSet;

use entsync_core::UpdatePlan;
use proptest::prelude::*;

proptest! {
    #[test]
    fn missing_and_rogue_are_disjoint(
        local in prop::collection::btree_set(0u64..64, 0..24),
        desired in prop::collection::btree_set(0u64..64, 0..24),
    ) {
        let plan = UpdatePlan::compute(local.iter().copied(), desired.iter().copied());

        prop_assert!(plan.missing.is_disjoint(&plan.rogue));
        prop_assert!(plan.missing.is_disjoint(&local));
        prop_assert!(plan.rogue.is_subset(&local));
        prop_assert!(plan.missing.is_subset(&desired));
    }

    #[test]
    fn applying_the_plan_reaches_the_desired_set(
        local in prop::collection::btree_set(any::<u64>(), 0..24),
        desired in prop::collection::btree_set(any::<u64>(), 0..24),
    ) {
        let plan = UpdatePlan::compute(local.iter().copied(), desired.iter().copied());

        let after: BTreeSet<u64> = local
            .difference(&plan.rogue)
            .chain(plan.missing.iter())
            .copied()
            .collect();
        prop_assert_eq!(&after, &desired);

        // a second plan against the result is empty
        prop_assert!(UpdatePlan::compute(after, desired).is_empty());
    }
}
