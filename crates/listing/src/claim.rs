//! Claim planning: reserve quantity from the open rows of one canonical group.
//!
//! Pure decision logic. The caller loads the group's rows in one atomic read,
//! plans here, and commits the resulting mutation batch at the revision it
//! read. The oversell check therefore always runs against the state the
//! commit is conditioned on, never against a client-side snapshot.

use chrono::{DateTime, Utc};

use chipin_core::{DomainError, DomainResult, RowId};

use crate::row::{ItemRow, RowMutation};

/// Result of planning a claim: the mutation batch to commit, plus the settled
/// rows that together form the logical claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimOutcome {
    pub mutations: Vec<RowMutation>,
    pub settled: Vec<ItemRow>,
}

/// Plan a claim of exactly `requested` units for `claimant_name`.
///
/// Draws only from open rows, all-or-nothing:
///
/// - an open row whose quantity equals the request is settled in place;
/// - otherwise the smallest single open row that can cover the request is
///   split once (minimizing unnecessary splits);
/// - otherwise open rows are consumed in display order, full rows settled in
///   place and the final partial row split.
///
/// Fails with no mutations if fewer than `requested` open units exist.
pub fn plan_claim(
    rows: &[ItemRow],
    claimant_name: &str,
    requested: u32,
    now: DateTime<Utc>,
) -> DomainResult<ClaimOutcome> {
    if requested == 0 {
        return Err(DomainError::invalid_quantity(
            "requested quantity must be at least 1",
        ));
    }
    let claimant = claimant_name.trim();
    if claimant.is_empty() {
        return Err(DomainError::EmptyClaimantName);
    }

    let mut open: Vec<&ItemRow> = rows.iter().filter(|r| r.is_open()).collect();
    open.sort_by(|a, b| {
        (a.display_order, a.created_at, a.id).cmp(&(b.display_order, b.created_at, b.id))
    });

    // A group may hold more than u32::MAX units across its rows; sum in u64
    // so the availability check cannot overflow.
    let available: u64 = open.iter().map(|r| u64::from(r.quantity)).sum();
    if u64::from(requested) > available {
        // In this branch available < requested <= u32::MAX, so the narrowing
        // is lossless.
        return Err(DomainError::insufficient(requested, available as u32));
    }

    let mut outcome = ClaimOutcome {
        mutations: Vec::new(),
        settled: Vec::new(),
    };

    // Single-row satisfaction first: exact fit settles in place, otherwise
    // the best-fitting larger row is split once.
    if let Some(row) = open.iter().copied().find(|r| r.quantity == requested) {
        settle_in_place(&mut outcome, row, claimant);
        return Ok(outcome);
    }
    if let Some(row) = open
        .iter()
        .copied()
        .filter(|r| r.quantity > requested)
        .min_by_key(|r| (r.quantity, r.display_order, r.created_at, r.id))
    {
        split(&mut outcome, row, requested, claimant, now);
        return Ok(outcome);
    }

    // Every open row is smaller than the request: span rows in display order.
    let mut remaining = requested;
    for row in open {
        if remaining == 0 {
            break;
        }
        if row.quantity <= remaining {
            remaining -= row.quantity;
            settle_in_place(&mut outcome, row, claimant);
        } else {
            split(&mut outcome, row, remaining, claimant, now);
            remaining = 0;
        }
    }
    debug_assert_eq!(remaining, 0, "availability was checked up front");

    Ok(outcome)
}

/// The whole row is consumed: record the claimant on it, no new row.
fn settle_in_place(outcome: &mut ClaimOutcome, row: &ItemRow, claimant: &str) {
    let mut settled = row.clone();
    settled.claimant_name = Some(claimant.to_string());
    outcome.mutations.push(RowMutation::Update(settled.clone()));
    outcome.settled.push(settled);
}

/// Part of the row is consumed: a new settled row carries the claimed portion
/// and points back at the source, which stays open with the remainder.
fn split(outcome: &mut ClaimOutcome, source: &ItemRow, portion: u32, claimant: &str, now: DateTime<Utc>) {
    debug_assert!(portion < source.quantity);

    let settled = ItemRow {
        id: RowId::new(),
        list_id: source.list_id,
        canonical_name: source.canonical_name.clone(),
        display_name: source.display_name.clone(),
        quantity: portion,
        claimant_name: Some(claimant.to_string()),
        parent_row_id: Some(source.id),
        display_order: source.display_order,
        created_at: now,
        notes: None,
    };

    let mut reduced = source.clone();
    reduced.quantity -= portion;

    outcome.mutations.push(RowMutation::Update(reduced));
    outcome.mutations.push(RowMutation::Insert(settled.clone()));
    outcome.settled.push(settled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chipin_core::ListId;

    fn open_row(list_id: ListId, name: &str, quantity: u32, display_order: i32) -> ItemRow {
        ItemRow::open(list_id, name, quantity, display_order, Utc::now()).unwrap()
    }

    /// Test-side mirror of an atomic commit: apply a mutation batch to a row set.
    pub(crate) fn apply(rows: &mut Vec<ItemRow>, mutations: &[RowMutation]) {
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

    pub(crate) fn total_quantity(rows: &[ItemRow]) -> u64 {
        rows.iter().map(|r| u64::from(r.quantity)).sum()
    }

    fn open_quantity(rows: &[ItemRow]) -> u64 {
        rows.iter()
            .filter(|r| r.is_open())
            .map(|r| u64::from(r.quantity))
            .sum()
    }

    #[test]
    fn partial_claim_splits_the_row() {
        // Scenario A: {qty 5, open}, claim 2 -> settled {2} + open {3}.
        let list_id = ListId::new();
        let mut rows = vec![open_row(list_id, "cups", 5, 0)];
        let source_id = rows[0].id;

        let outcome = plan_claim(&rows, "Dana", 2, Utc::now()).unwrap();
        apply(&mut rows, &outcome.mutations);

        assert_eq!(outcome.settled.len(), 1);
        let settled = &outcome.settled[0];
        assert_eq!(settled.quantity, 2);
        assert_eq!(settled.claimant_name.as_deref(), Some("Dana"));
        assert_eq!(settled.parent_row_id, Some(source_id));

        assert_eq!(total_quantity(&rows), 5);
        assert_eq!(open_quantity(&rows), 3);
    }

    #[test]
    fn exact_claim_settles_in_place() {
        // Scenario B: the remaining open row {3} is consumed fully, no new row.
        let list_id = ListId::new();
        let mut rows = vec![open_row(list_id, "cups", 5, 0)];
        let first = plan_claim(&rows, "Dana", 2, Utc::now()).unwrap();
        apply(&mut rows, &first.mutations);

        let count_before = rows.len();
        let outcome = plan_claim(&rows, "Omer", 3, Utc::now()).unwrap();
        apply(&mut rows, &outcome.mutations);

        assert_eq!(rows.len(), count_before);
        assert_eq!(outcome.settled.len(), 1);
        assert_eq!(outcome.settled[0].quantity, 3);
        assert!(outcome.settled[0].parent_row_id.is_none());
        assert_eq!(open_quantity(&rows), 0);
        assert_eq!(total_quantity(&rows), 5);
    }

    #[test]
    fn claim_beyond_open_quantity_fails_without_mutation() {
        // Scenario C: zero open units -> InsufficientQuantity.
        let list_id = ListId::new();
        let mut rows = vec![open_row(list_id, "cups", 5, 0)];
        for (who, qty) in [("Dana", 2u32), ("Omer", 3u32)] {
            let outcome = plan_claim(&rows, who, qty, Utc::now()).unwrap();
            apply(&mut rows, &outcome.mutations);
        }

        let err = plan_claim(&rows, "Yossi", 1, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientQuantity {
                requested: 1,
                available: 0
            }
        );
    }

    #[test]
    fn claim_spans_rows_in_display_order() {
        let list_id = ListId::new();
        let mut rows = vec![
            open_row(list_id, "plates", 2, 0),
            open_row(list_id, "plates", 2, 1),
            open_row(list_id, "plates", 3, 2),
        ];

        // No single row covers 5: consume {2}, {2}, then split {3} -> 1 + open 2.
        let outcome = plan_claim(&rows, "Noa", 5, Utc::now()).unwrap();
        apply(&mut rows, &outcome.mutations);

        let claimed: u32 = outcome.settled.iter().map(|r| r.quantity).sum();
        assert_eq!(claimed, 5);
        assert_eq!(outcome.settled.len(), 3);
        assert_eq!(total_quantity(&rows), 7);
        assert_eq!(open_quantity(&rows), 2);
    }

    #[test]
    fn single_row_preferred_over_spanning() {
        let list_id = ListId::new();
        let rows = vec![
            open_row(list_id, "plates", 2, 0),
            open_row(list_id, "plates", 2, 1),
            open_row(list_id, "plates", 6, 2),
        ];

        // 4 could span the two front rows, but the single {6} covers it with
        // one split; the best-fit row wins despite its display order.
        let outcome = plan_claim(&rows, "Noa", 4, Utc::now()).unwrap();
        assert_eq!(outcome.settled.len(), 1);
        assert_eq!(outcome.settled[0].quantity, 4);
    }

    #[test]
    fn rejects_zero_quantity_and_blank_claimant() {
        let rows = vec![open_row(ListId::new(), "cups", 5, 0)];
        assert!(matches!(
            plan_claim(&rows, "Dana", 0, Utc::now()),
            Err(DomainError::InvalidQuantity(_))
        ));
        assert!(matches!(
            plan_claim(&rows, "   ", 1, Utc::now()),
            Err(DomainError::EmptyClaimantName)
        ));
    }

    #[test]
    fn availability_check_handles_groups_beyond_u32_units() {
        // Two max-size rows put the group's open total past u32::MAX.
        let list_id = ListId::new();
        let rows = vec![
            open_row(list_id, "cups", u32::MAX, 0),
            open_row(list_id, "cups", u32::MAX, 1),
        ];

        let outcome = plan_claim(&rows, "Dana", 1, Utc::now()).unwrap();
        assert_eq!(outcome.settled.len(), 1);
        assert_eq!(outcome.settled[0].quantity, 1);

        // An exact-fit request for a whole max-size row settles in place.
        let outcome = plan_claim(&rows, "Omer", u32::MAX, Utc::now()).unwrap();
        assert_eq!(outcome.settled.len(), 1);
        assert!(outcome.settled[0].parent_row_id.is_none());
    }

    #[test]
    fn settled_rows_are_never_drawn_from() {
        let list_id = ListId::new();
        let mut taken = open_row(list_id, "cups", 10, 0);
        taken.claimant_name = Some("Dana".to_string());
        let rows = vec![taken, open_row(list_id, "cups", 1, 1)];

        let err = plan_claim(&rows, "Omer", 2, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientQuantity {
                requested: 2,
                available: 1
            }
        );
    }

    mod proptest_tests {
        use super::*;
        use crate::unclaim::plan_unclaim;
        use proptest::prelude::*;

        proptest! {
            /// Conservation: any interleaving of claims and unclaims on one
            /// canonical group keeps `total == unclaimed + settled`.
            #[test]
            fn claim_unclaim_sequences_conserve_quantity(
                initial in 1u32..30,
                ops in prop::collection::vec((0u32..8, any::<bool>()), 1..40),
            ) {
                let list_id = ListId::new();
                let mut rows =
                    vec![ItemRow::open(list_id, "cups", initial, 0, Utc::now()).unwrap()];

                for (idx, (qty, prefer_unclaim)) in ops.into_iter().enumerate() {
                    if prefer_unclaim {
                        if let Some(settled) = rows.iter().find(|r| r.is_settled()).cloned() {
                            let parent = settled
                                .parent_row_id
                                .and_then(|pid| rows.iter().find(|r| r.id == pid))
                                .cloned();
                            let outcome = plan_unclaim(&settled, parent.as_ref()).unwrap();
                            apply(&mut rows, &outcome.mutations);
                        }
                    } else if qty > 0 {
                        let claimant = format!("claimant-{idx}");
                        match plan_claim(&rows, &claimant, qty, Utc::now()) {
                            Ok(outcome) => apply(&mut rows, &outcome.mutations),
                            Err(DomainError::InsufficientQuantity { .. }) => {}
                            Err(other) => return Err(TestCaseError::fail(other.to_string())),
                        }
                    }

                    let open: u64 = rows
                        .iter()
                        .filter(|r| r.is_open())
                        .map(|r| u64::from(r.quantity))
                        .sum();
                    let settled: u64 = rows
                        .iter()
                        .filter(|r| r.is_settled())
                        .map(|r| u64::from(r.quantity))
                        .sum();
                    prop_assert_eq!(total_quantity(&rows), open + settled);
                    prop_assert_eq!(total_quantity(&rows), u64::from(initial));
                    prop_assert!(rows.iter().all(|r| r.quantity >= 1));
                }
            }

            /// A successful claim settles exactly the requested quantity.
            #[test]
            fn successful_claim_settles_exact_quantity(
                initial in 1u32..30,
                requested in 1u32..30,
            ) {
                let list_id = ListId::new();
                let rows =
                    vec![ItemRow::open(list_id, "cups", initial, 0, Utc::now()).unwrap()];

                match plan_claim(&rows, "Dana", requested, Utc::now()) {
                    Ok(outcome) => {
                        prop_assert!(requested <= initial);
                        let settled: u32 = outcome.settled.iter().map(|r| r.quantity).sum();
                        prop_assert_eq!(settled, requested);
                    }
                    Err(DomainError::InsufficientQuantity { requested: r, available }) => {
                        prop_assert!(requested > initial);
                        prop_assert_eq!(r, requested);
                        prop_assert_eq!(available, initial);
                    }
                    Err(other) => return Err(TestCaseError::fail(other.to_string())),
                }
            }
        }
    }
}
