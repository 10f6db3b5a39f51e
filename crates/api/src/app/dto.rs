use serde::Deserialize;

use chipin_listing::{ConsolidatedItem, ItemRow, ListProgress};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub name: String,
    /// Defaults to 1 when omitted.
    pub quantity: Option<u32>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub item: String,
    pub claimant: String,
    pub quantity: u32,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn row_to_json(row: &ItemRow) -> serde_json::Value {
    serde_json::json!({
        "id": row.id.to_string(),
        "list_id": row.list_id.to_string(),
        "name": row.display_name,
        "quantity": row.quantity,
        "claimant": row.claimant_name,
        "parent_row_id": row.parent_row_id.map(|id| id.to_string()),
        "display_order": row.display_order,
        "created_at": row.created_at.to_rfc3339(),
    })
}

pub fn consolidated_item_to_json(item: &ConsolidatedItem) -> serde_json::Value {
    serde_json::json!({
        "name": item.display_name,
        "total_quantity": item.total_quantity,
        "unclaimed_quantity": item.unclaimed_quantity,
        "fully_claimed": item.is_fully_claimed(),
        "claims": item.claims.iter().map(|c| serde_json::json!({
            "row_id": c.row_id.to_string(),
            "claimant": c.claimant_name,
            "quantity": c.quantity,
        })).collect::<Vec<_>>(),
        "open_rows": item.open_rows.iter().map(row_to_json).collect::<Vec<_>>(),
    })
}

pub fn progress_to_json(progress: &ListProgress) -> serde_json::Value {
    serde_json::json!({
        "total_quantity": progress.total_quantity,
        "claimed_quantity": progress.claimed_quantity,
        "complete": progress.is_complete(),
    })
}
