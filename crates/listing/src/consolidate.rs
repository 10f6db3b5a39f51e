//! Consolidation view builder.
//!
//! Read-time aggregation of all rows sharing a canonical name into one
//! presentation-ready item. Derived, never persisted: the view must always be
//! re-derivable from row state, and no cached aggregate is authoritative.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use chipin_core::CanonicalName;

use crate::row::ItemRow;

/// One settled portion of a consolidated item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEntry {
    pub row_id: chipin_core::RowId,
    pub claimant_name: String,
    pub quantity: u32,
}

/// The read-time aggregation of one canonical group.
///
/// Invariant at every observable instant:
/// `total_quantity == unclaimed_quantity + Σ claims.quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedItem {
    pub canonical_name: CanonicalName,
    /// Authored name of the group's earliest row.
    pub display_name: String,
    /// u64: a group may hold more than u32::MAX units across its rows.
    pub total_quantity: u64,
    /// Settled portions, oldest first.
    pub claims: Vec<ClaimEntry>,
    pub open_rows: Vec<ItemRow>,
    pub unclaimed_quantity: u64,
}

impl ConsolidatedItem {
    pub fn is_fully_claimed(&self) -> bool {
        self.open_rows.is_empty()
    }

    pub fn is_fully_open(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Group a list's rows by canonical name and aggregate each group.
///
/// Groups are ordered by the minimum `display_order` among member rows
/// (stable across splits and merges, which inherit the source's order);
/// claims within a group are ordered by row creation, oldest first. Parent
/// chains of any depth are irrelevant here: grouping is by canonical name,
/// never by walking parents.
pub fn build_view(rows: &[ItemRow]) -> Vec<ConsolidatedItem> {
    // The per-group minimum display_order decides output order; fold it in
    // while grouping so the pass over `rows` happens once.
    let mut groups: HashMap<&CanonicalName, (i32, Vec<&ItemRow>)> = HashMap::new();
    for row in rows {
        let (min_order, members) = groups
            .entry(&row.canonical_name)
            .or_insert_with(|| (row.display_order, Vec::new()));
        *min_order = (*min_order).min(row.display_order);
        members.push(row);
    }

    let mut items: Vec<(i32, ConsolidatedItem)> = groups
        .into_values()
        .map(|(min_order, members)| (min_order, consolidate_group(&members)))
        .collect();

    items.sort_by(|(a_order, a), (b_order, b)| {
        (a_order, &a.canonical_name).cmp(&(b_order, &b.canonical_name))
    });
    items.into_iter().map(|(_, item)| item).collect()
}

fn consolidate_group(members: &[&ItemRow]) -> ConsolidatedItem {
    let mut by_creation: Vec<&ItemRow> = members.to_vec();
    by_creation.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

    let display_name = by_creation
        .first()
        .map(|r| r.display_name.clone())
        .unwrap_or_default();

    let claims: Vec<ClaimEntry> = by_creation
        .iter()
        .filter(|r| r.is_settled())
        .map(|r| ClaimEntry {
            row_id: r.id,
            claimant_name: r.claimant_name.clone().unwrap_or_default(),
            quantity: r.quantity,
        })
        .collect();

    let mut open_rows: Vec<ItemRow> = members
        .iter()
        .filter(|r| r.is_open())
        .map(|r| (*r).clone())
        .collect();
    open_rows.sort_by(|a, b| {
        (a.display_order, a.created_at, a.id).cmp(&(b.display_order, b.created_at, b.id))
    });

    let unclaimed_quantity: u64 = open_rows.iter().map(|r| u64::from(r.quantity)).sum();
    let total_quantity: u64 = members.iter().map(|r| u64::from(r.quantity)).sum();

    ConsolidatedItem {
        canonical_name: by_creation
            .first()
            .map(|r| r.canonical_name.clone())
            .unwrap_or_else(|| CanonicalName::new("")),
        display_name,
        total_quantity,
        claims,
        open_rows,
        unclaimed_quantity,
    }
}
