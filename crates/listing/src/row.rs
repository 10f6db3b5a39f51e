use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use chipin_core::{CanonicalName, DomainError, DomainResult, ListId, RowId};

/// One persisted unit of reservable quantity for an item.
///
/// A row is **open** while `claimant_name` is `None` and **settled** once a
/// claimant is recorded. Quantity is always ≥ 1: a row whose quantity would
/// reach zero is deleted, never retained.
///
/// `parent_row_id` is set when the row was produced by splitting another row
/// during a partial claim. Parents always point at strictly earlier rows, so
/// the structure is a forest; conservation is a property of the canonical
/// group, never of any single lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: RowId,
    pub list_id: ListId,
    pub canonical_name: CanonicalName,
    pub display_name: String,
    pub quantity: u32,
    pub claimant_name: Option<String>,
    pub parent_row_id: Option<RowId>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    /// Opaque passthrough owned by external collaborators.
    pub notes: Option<JsonValue>,
}

impl ItemRow {
    /// Author a fresh open row.
    pub fn open(
        list_id: ListId,
        display_name: &str,
        quantity: u32,
        display_order: i32,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let canonical_name = CanonicalName::new(display_name);
        if canonical_name.is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if quantity == 0 {
            return Err(DomainError::invalid_quantity("row quantity must be at least 1"));
        }

        Ok(Self {
            id: RowId::new(),
            list_id,
            canonical_name,
            display_name: display_name.trim().to_string(),
            quantity,
            claimant_name: None,
            parent_row_id: None,
            display_order,
            created_at,
            notes: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.claimant_name.is_none()
    }

    pub fn is_settled(&self) -> bool {
        self.claimant_name.is_some()
    }
}

/// One write unit in an atomic commit against a canonical group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowMutation {
    Insert(ItemRow),
    Update(ItemRow),
    Delete(RowId),
}

impl RowMutation {
    /// The row this mutation addresses.
    pub fn row_id(&self) -> RowId {
        match self {
            RowMutation::Insert(row) | RowMutation::Update(row) => row.id,
            RowMutation::Delete(id) => *id,
        }
    }
}
