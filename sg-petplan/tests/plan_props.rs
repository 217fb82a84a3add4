//! Property tests for plan bookkeeping.

use proptest::prelude::*;

use sg_petplan::plan::{
    PlanError, PlanItem, PlanStatus, PlanUpdate, apply_plan_update, estimate_progress,
};

fn status_strategy() -> impl Strategy<Value = PlanStatus> {
    prop_oneof![
        Just(PlanStatus::Pending),
        Just(PlanStatus::InProgress),
        Just(PlanStatus::Done),
    ]
}

fn plan_strategy() -> impl Strategy<Value = Vec<PlanItem>> {
    prop::collection::vec(("[a-z]{1,8}", status_strategy()), 1..8).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (content, status))| PlanItem {
                // Suffix with the index so contents stay unique.
                content: format!("{content}-{i}"),
                status,
            })
            .collect()
    })
}

proptest! {
    /// The progress estimate always stays inside its contract band.
    #[test]
    fn progress_stays_in_band(plan in plan_strategy()) {
        let progress = estimate_progress(&plan);
        prop_assert!((10..=80).contains(&progress));
    }

    /// An update naming unknown content is always rejected, whatever the
    /// rest of the batch looks like.
    #[test]
    fn unknown_content_is_always_rejected(plan in plan_strategy(), bogus in "[A-Z]{4,8}") {
        let updates = vec![PlanUpdate {
            content: bogus.clone(),
            status: PlanStatus::Done,
        }];
        let err = apply_plan_update(&plan, &updates).unwrap_err();
        prop_assert_eq!(err, PlanError::UnknownEntry(bogus));
    }

    /// Accepted updates never add or remove entries and never reorder them.
    #[test]
    fn updates_preserve_identity_and_order(plan in plan_strategy()) {
        // Mark every entry done and, to satisfy pairing, the first one
        // in_progress first when something is underway.
        let updates: Vec<PlanUpdate> = plan
            .iter()
            .map(|item| PlanUpdate {
                content: item.content.clone(),
                status: PlanStatus::Done,
            })
            .collect();
        if let Ok(next) = apply_plan_update(&plan, &updates) {
            prop_assert_eq!(next.len(), plan.len());
            for (before, after) in plan.iter().zip(&next) {
                prop_assert_eq!(&before.content, &after.content);
                prop_assert_eq!(after.status, PlanStatus::Done);
            }
        }
    }
}
