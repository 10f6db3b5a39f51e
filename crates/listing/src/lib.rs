//! `chipin-listing` — need-list domain model and the pure reservation
//! algorithms.
//!
//! Everything here is side-effect free: claim and unclaim planning take a
//! loaded row set and return a mutation batch for the persistence layer to
//! commit atomically. The consolidation view and list progress are derived
//! read models, always recomputed from rows.

pub mod claim;
pub mod consolidate;
pub mod progress;
pub mod row;
pub mod unclaim;

pub use claim::{plan_claim, ClaimOutcome};
pub use consolidate::{build_view, ClaimEntry, ConsolidatedItem};
pub use progress::{list_progress, ListProgress};
pub use row::{ItemRow, RowMutation};
pub use unclaim::{plan_unclaim, UnclaimOutcome};
