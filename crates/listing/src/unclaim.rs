//! Unclaim planning: release a settled row back to the open pool.

use chipin_core::{DomainError, DomainResult};

use crate::row::{ItemRow, RowMutation};

/// Result of planning an unclaim: the mutation batch plus the open row the
/// released quantity now lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct UnclaimOutcome {
    pub mutations: Vec<RowMutation>,
    pub row: ItemRow,
}

/// Plan the release of a settled row.
///
/// If the row's split parent still exists in the group and is open, the
/// quantity merges back into it and the row is deleted — this keeps repeated
/// claim/unclaim cycles from growing the row set without bound. Otherwise
/// the claimant is cleared in place; quantity is never merged into an
/// unrelated row.
///
/// Deliberately not idempotent: unclaiming an already-open row fails
/// `NotClaimed` so the caller can surface a meaningful conflict.
pub fn plan_unclaim(row: &ItemRow, parent: Option<&ItemRow>) -> DomainResult<UnclaimOutcome> {
    if row.is_open() {
        return Err(DomainError::NotClaimed);
    }

    if let Some(parent) = parent {
        let mergeable = parent.is_open()
            && parent.id != row.id
            && parent.list_id == row.list_id
            && parent.canonical_name == row.canonical_name
            && Some(parent.id) == row.parent_row_id;
        if mergeable {
            // Merge only while the combined quantity still fits in a row;
            // past that the row reopens on its own below.
            if let Some(combined) = parent.quantity.checked_add(row.quantity) {
                let mut merged = parent.clone();
                merged.quantity = combined;
                return Ok(UnclaimOutcome {
                    mutations: vec![
                        RowMutation::Update(merged.clone()),
                        RowMutation::Delete(row.id),
                    ],
                    row: merged,
                });
            }
        }
    }

    let mut reopened = row.clone();
    reopened.claimant_name = None;
    Ok(UnclaimOutcome {
        mutations: vec![RowMutation::Update(reopened.clone())],
        row: reopened,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::plan_claim;
    use chipin_core::ListId;
    use chrono::Utc;

    fn seeded_group(quantity: u32) -> (ListId, Vec<ItemRow>) {
        let list_id = ListId::new();
        let rows = vec![ItemRow::open(list_id, "cups", quantity, 0, Utc::now()).unwrap()];
        (list_id, rows)
    }

    fn apply(rows: &mut Vec<ItemRow>, mutations: &[RowMutation]) {
        for m in mutations {
            match m {
                RowMutation::Insert(row) => rows.push(row.clone()),
                RowMutation::Update(row) => {
                    let slot = rows.iter_mut().find(|r| r.id == row.id).expect("update target");
                    *slot = row.clone();
                }
                RowMutation::Delete(id) => rows.retain(|r| r.id != *id),
            }
        }
    }

    #[test]
    fn unclaim_merges_back_into_open_parent() {
        // Scenario D, sibling still open: back to a single open row of qty 5.
        let (_, mut rows) = seeded_group(5);

        let claim = plan_claim(&rows, "Dana", 2, Utc::now()).unwrap();
        apply(&mut rows, &claim.mutations);
        let settled = claim.settled[0].clone();

        let parent = rows
            .iter()
            .find(|r| Some(r.id) == settled.parent_row_id)
            .cloned();
        let outcome = plan_unclaim(&settled, parent.as_ref()).unwrap();
        apply(&mut rows, &outcome.mutations);

        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_open());
        assert_eq!(rows[0].quantity, 5);
        assert_eq!(outcome.row.id, rows[0].id);
    }

    #[test]
    fn unclaim_reopens_in_place_when_parent_is_settled() {
        // Scenario D, sibling consumed meanwhile: independent open row of qty 2.
        let (_, mut rows) = seeded_group(5);

        let dana = plan_claim(&rows, "Dana", 2, Utc::now()).unwrap();
        apply(&mut rows, &dana.mutations);
        let omer = plan_claim(&rows, "Omer", 3, Utc::now()).unwrap();
        apply(&mut rows, &omer.mutations);

        let settled = dana.settled[0].clone();
        let parent = rows
            .iter()
            .find(|r| Some(r.id) == settled.parent_row_id)
            .cloned();
        let outcome = plan_unclaim(&settled, parent.as_ref()).unwrap();
        apply(&mut rows, &outcome.mutations);

        assert_eq!(rows.len(), 2);
        let reopened = rows.iter().find(|r| r.id == settled.id).unwrap();
        assert!(reopened.is_open());
        assert_eq!(reopened.quantity, 2);
        // The other claim is untouched.
        assert!(rows.iter().any(|r| r.claimant_name.as_deref() == Some("Omer")));
    }

    #[test]
    fn unclaim_reopens_in_place_when_parent_is_gone() {
        let (_, mut rows) = seeded_group(5);

        let claim = plan_claim(&rows, "Dana", 2, Utc::now()).unwrap();
        apply(&mut rows, &claim.mutations);
        let settled = claim.settled[0].clone();

        // Parent removed by external deletion.
        rows.retain(|r| Some(r.id) != settled.parent_row_id);

        let outcome = plan_unclaim(&settled, None).unwrap();
        apply(&mut rows, &outcome.mutations);

        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_open());
        assert_eq!(rows[0].quantity, 2);
    }

    #[test]
    fn unclaim_of_open_row_fails_not_claimed() {
        let (_, rows) = seeded_group(5);
        let err = plan_unclaim(&rows[0], None).unwrap_err();
        assert_eq!(err, DomainError::NotClaimed);
    }

    #[test]
    fn quantity_never_merges_into_unrelated_row() {
        let (list_id, mut rows) = seeded_group(5);
        rows.push(ItemRow::open(list_id, "cups", 4, 1, Utc::now()).unwrap());
        let unrelated = rows[1].clone();

        let claim = plan_claim(&rows, "Dana", 2, Utc::now()).unwrap();
        apply(&mut rows, &claim.mutations);
        let settled = claim.settled[0].clone();

        // Even if a caller hands over the wrong candidate, the plan refuses
        // to merge into a row the claim was not split from.
        let outcome = plan_unclaim(&settled, Some(&unrelated)).unwrap();
        assert_eq!(outcome.mutations.len(), 1);
        assert_eq!(outcome.row.id, settled.id);
        assert!(outcome.row.is_open());
    }

    #[test]
    fn merge_that_would_overflow_reopens_in_place() {
        let (_, mut rows) = seeded_group(u32::MAX);

        let claim = plan_claim(&rows, "Dana", 2, Utc::now()).unwrap();
        apply(&mut rows, &claim.mutations);
        let settled = claim.settled[0].clone();

        // External authoring grew the parent back to the maximum; merging
        // would push it past u32::MAX.
        let mut parent = rows
            .iter()
            .find(|r| Some(r.id) == settled.parent_row_id)
            .cloned()
            .unwrap();
        parent.quantity = u32::MAX;

        let outcome = plan_unclaim(&settled, Some(&parent)).unwrap();
        assert_eq!(outcome.mutations.len(), 1);
        assert_eq!(outcome.row.id, settled.id);
        assert!(outcome.row.is_open());
        assert_eq!(outcome.row.quantity, 2);
    }

    #[test]
    fn round_trip_restores_open_quantity() {
        let (_, mut rows) = seeded_group(7);
        let before: u32 = rows.iter().filter(|r| r.is_open()).map(|r| r.quantity).sum();

        let claim = plan_claim(&rows, "Dana", 4, Utc::now()).unwrap();
        apply(&mut rows, &claim.mutations);

        for settled in &claim.settled {
            let parent = settled
                .parent_row_id
                .and_then(|pid| rows.iter().find(|r| r.id == pid))
                .cloned();
            let outcome = plan_unclaim(settled, parent.as_ref()).unwrap();
            apply(&mut rows, &outcome.mutations);
        }

        let after: u32 = rows.iter().filter(|r| r.is_open()).map(|r| r.quantity).sum();
        assert_eq!(before, after);
    }
}
