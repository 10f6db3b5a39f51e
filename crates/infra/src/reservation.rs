//! Reservation engine: the write-side entry point for claims and releases.
//!
//! The engine owns the read-plan-commit cycle: load one canonical group
//! atomically, plan mutations with the pure listing functions, and commit at
//! the revision the plan was derived from. A lost race re-plans against fresh
//! state, bounded by [`MAX_COMMIT_ATTEMPTS`].

use chrono::Utc;
use thiserror::Error;

use chipin_core::{CanonicalName, DomainError, ExpectedRevision, ListId, RowId};
use chipin_listing::{
    build_view, list_progress, plan_claim, plan_unclaim, ConsolidatedItem, ItemRow, ListProgress,
};

use crate::row_store::{RowStore, RowStoreError};

/// How many times a claim or unclaim re-plans after losing the revision race
/// before giving up with `ConcurrentModification`.
pub const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Everything a reservation operation can fail with: domain rejections
/// flattened alongside infrastructure failures, so callers match one enum.
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("claimant name must not be empty")]
    EmptyClaimantName,

    #[error("insufficient open quantity: requested {requested}, available {available}")]
    InsufficientQuantity { requested: u32, available: u32 },

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("row is not claimed")]
    NotClaimed,

    #[error("row not found")]
    RowNotFound,

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store failure: {0}")]
    Store(RowStoreError),
}

impl From<DomainError> for ReservationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidQuantity(msg) => Self::InvalidQuantity(msg),
            DomainError::EmptyClaimantName => Self::EmptyClaimantName,
            DomainError::InsufficientQuantity {
                requested,
                available,
            } => Self::InsufficientQuantity {
                requested,
                available,
            },
            DomainError::ConcurrentModification(msg) => Self::ConcurrentModification(msg),
            DomainError::NotClaimed => Self::NotClaimed,
            DomainError::RowNotFound => Self::RowNotFound,
            DomainError::InvalidId(msg) => Self::InvalidId(msg),
            DomainError::Validation(msg) => Self::Validation(msg),
        }
    }
}

impl From<RowStoreError> for ReservationError {
    fn from(err: RowStoreError) -> Self {
        match err {
            RowStoreError::RowNotFound => Self::RowNotFound,
            RowStoreError::Concurrency(msg) => Self::ConcurrentModification(msg),
            other => Self::Store(other),
        }
    }
}

/// Coordinates reads, planning and revisioned commits over a [`RowStore`].
///
/// Generic over the store so tests run against [`InMemoryRowStore`]
/// (`crate::InMemoryRowStore`) and deployments against the Postgres store,
/// with identical semantics.
pub struct ReservationEngine<S: RowStore> {
    store: S,
}

impl<S: RowStore> ReservationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Author a fresh open row on a list.
    #[tracing::instrument(skip(self, display_name))]
    pub fn add_row(
        &self,
        list_id: ListId,
        display_name: &str,
        quantity: u32,
        display_order: i32,
    ) -> Result<ItemRow, ReservationError> {
        let row = ItemRow::open(list_id, display_name, quantity, display_order, Utc::now())?;
        let row = self.store.insert_row(row)?;
        tracing::info!(row_id = %row.id, %list_id, "row added");
        Ok(row)
    }

    /// Claim `quantity` units of `item_name` for `claimant_name`.
    ///
    /// All-or-nothing: either the full quantity is settled and the resulting
    /// rows are returned, or nothing changes. Lost revision races re-plan
    /// against fresh state up to [`MAX_COMMIT_ATTEMPTS`] times.
    #[tracing::instrument(skip(self, item_name, claimant_name))]
    pub fn claim(
        &self,
        list_id: ListId,
        item_name: &str,
        claimant_name: &str,
        quantity: u32,
    ) -> Result<Vec<ItemRow>, ReservationError> {
        let name = CanonicalName::new(item_name);
        if name.is_empty() {
            return Err(ReservationError::Validation(
                "item name must not be blank".to_string(),
            ));
        }

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let snapshot = self.store.load_group(list_id, &name)?;
            let outcome = plan_claim(&snapshot.rows, claimant_name, quantity, Utc::now())?;

            match self.store.commit(
                list_id,
                &name,
                &outcome.mutations,
                ExpectedRevision::Exact(snapshot.revision),
            ) {
                Ok(revision) => {
                    tracing::info!(
                        %list_id,
                        item = %name,
                        quantity,
                        revision,
                        "claim committed"
                    );
                    return Ok(outcome.settled);
                }
                Err(RowStoreError::Concurrency(reason)) => {
                    tracing::debug!(
                        %list_id,
                        item = %name,
                        attempt,
                        %reason,
                        "claim lost revision race, re-planning"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(%list_id, item = %name, "claim gave up after repeated conflicts");
        Err(ReservationError::ConcurrentModification(format!(
            "claim on '{name}' conflicted {MAX_COMMIT_ATTEMPTS} times"
        )))
    }

    /// Release a settled row back to the open pool.
    ///
    /// Returns the open row the released quantity ended up in (either the
    /// merged-into parent or the row itself, reopened).
    #[tracing::instrument(skip(self))]
    pub fn unclaim(&self, row_id: RowId) -> Result<ItemRow, ReservationError> {
        let located = self
            .store
            .find_row(row_id)?
            .ok_or(ReservationError::RowNotFound)?;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let snapshot = self
                .store
                .load_group(located.list_id, &located.canonical_name)?;

            // Plan from the snapshot's copy, never the initial lookup: the
            // row may have changed (or vanished) since.
            let row = snapshot
                .rows
                .iter()
                .find(|r| r.id == row_id)
                .ok_or(ReservationError::RowNotFound)?;
            let parent = row
                .parent_row_id
                .and_then(|pid| snapshot.rows.iter().find(|r| r.id == pid));

            let outcome = plan_unclaim(row, parent)?;

            match self.store.commit(
                snapshot.list_id,
                &snapshot.canonical_name,
                &outcome.mutations,
                ExpectedRevision::Exact(snapshot.revision),
            ) {
                Ok(revision) => {
                    tracing::info!(%row_id, revision, "unclaim committed");
                    return Ok(outcome.row);
                }
                Err(RowStoreError::Concurrency(reason)) => {
                    tracing::debug!(%row_id, attempt, %reason, "unclaim lost revision race, re-planning");
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(%row_id, "unclaim gave up after repeated conflicts");
        Err(ReservationError::ConcurrentModification(format!(
            "unclaim of row {row_id} conflicted {MAX_COMMIT_ATTEMPTS} times"
        )))
    }

    /// Look up a single row.
    pub fn find_row(&self, row_id: RowId) -> Result<ItemRow, ReservationError> {
        self.store
            .find_row(row_id)?
            .ok_or(ReservationError::RowNotFound)
    }

    /// Build the consolidated view of a list from current row state.
    pub fn consolidated_view(
        &self,
        list_id: ListId,
    ) -> Result<Vec<ConsolidatedItem>, ReservationError> {
        let rows = self.store.load_list(list_id)?;
        Ok(build_view(&rows))
    }

    /// Overall claimed/total counters for a list.
    pub fn progress(&self, list_id: ListId) -> Result<ListProgress, ReservationError> {
        let items = self.consolidated_view(list_id)?;
        Ok(list_progress(&items))
    }
}
