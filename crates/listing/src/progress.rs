//! List progress aggregation.

use serde::{Deserialize, Serialize};

use crate::consolidate::ConsolidatedItem;

/// Overall claimed/total counters for one list.
///
/// A pure function of current row state; no invariants of its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListProgress {
    pub total_quantity: u64,
    pub claimed_quantity: u64,
}

impl ListProgress {
    pub fn is_complete(&self) -> bool {
        self.claimed_quantity == self.total_quantity
    }
}

/// Reduce a list's consolidated items into overall counters.
pub fn list_progress(items: &[ConsolidatedItem]) -> ListProgress {
    let total_quantity = items.iter().map(|i| i.total_quantity).sum();
    let claimed_quantity = items
        .iter()
        .map(|i| i.total_quantity - i.unclaimed_quantity)
        .sum();
    ListProgress {
        total_quantity,
        claimed_quantity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::plan_claim;
    use crate::consolidate::build_view;
    use crate::row::{ItemRow, RowMutation};
    use chipin_core::ListId;
    use chrono::Utc;

    #[test]
    fn sums_across_groups() {
        let list_id = ListId::new();
        let mut rows = vec![
            ItemRow::open(list_id, "cups", 5, 0, Utc::now()).unwrap(),
            ItemRow::open(list_id, "napkins", 3, 1, Utc::now()).unwrap(),
        ];

        let outcome = plan_claim(&rows[..1], "Dana", 2, Utc::now()).unwrap();
        for m in &outcome.mutations {
            match m {
                RowMutation::Insert(row) => rows.push(row.clone()),
                RowMutation::Update(row) => {
                    let slot = rows.iter_mut().find(|r| r.id == row.id).unwrap();
                    *slot = row.clone();
                }
                RowMutation::Delete(id) => rows.retain(|r| r.id != *id),
            }
        }

        let progress = list_progress(&build_view(&rows));
        assert_eq!(progress.total_quantity, 8);
        assert_eq!(progress.claimed_quantity, 2);
        assert!(!progress.is_complete());
    }

    #[test]
    fn empty_list_is_trivially_complete() {
        let progress = list_progress(&[]);
        assert_eq!(progress.total_quantity, 0);
        assert!(progress.is_complete());
    }
}
