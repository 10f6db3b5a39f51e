use std::sync::Arc;

use thiserror::Error;

use chipin_core::{CanonicalName, ExpectedRevision, ListId, RowId};
use chipin_listing::{ItemRow, RowMutation};

/// All rows of one canonical group, plus the revision they were read at.
///
/// A commit conditioned on `revision` succeeds only if no other writer has
/// touched the group since this snapshot was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSnapshot {
    pub list_id: ListId,
    pub canonical_name: CanonicalName,
    pub rows: Vec<ItemRow>,
    pub revision: u64,
}

/// Row store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, isolation) as
/// opposed to domain errors (validation, insufficient quantity).
#[derive(Debug, Error)]
pub enum RowStoreError {
    /// The group revision moved between read and commit.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The addressed row does not exist.
    #[error("row not found")]
    RowNotFound,

    /// A mutation targeted a row outside the addressed group.
    #[error("group isolation violation: {0}")]
    GroupIsolation(String),

    /// The mutation batch is malformed (duplicate insert, zero quantity, ...).
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    /// The backing storage failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Durable storage of reservation rows, scoped by canonical group.
///
/// ## Commit semantics
///
/// `commit()` must:
/// - validate that every mutation targets the addressed `(list, name)` group
/// - reject updates that would retain a zero-quantity row (must be a delete)
/// - check the caller's `ExpectedRevision` against the group's revision
/// - apply the whole batch atomically, or nothing at all
/// - bump the group revision by one
///
/// Groups are independent: operations on different canonical groups may
/// interleave arbitrarily, while operations on the same group are
/// linearizable through the revision check.
///
/// ## Read semantics
///
/// `load_group()` returns the group's rows in display order together with
/// the revision; a group with no rows has revision 0 (or whatever revision
/// prior authoring left it at). `load_list()` is the read side for the view
/// builder and carries no revision — views are derived, never committed.
pub trait RowStore: Send + Sync {
    /// Load one canonical group with its revision, in a single atomic read.
    fn load_group(
        &self,
        list_id: ListId,
        name: &CanonicalName,
    ) -> Result<GroupSnapshot, RowStoreError>;

    /// Look up a single row by id.
    fn find_row(&self, row_id: RowId) -> Result<Option<ItemRow>, RowStoreError>;

    /// Load every row of a list (for the consolidation view).
    fn load_list(&self, list_id: ListId) -> Result<Vec<ItemRow>, RowStoreError>;

    /// Atomically apply a mutation batch to one group at an expected revision.
    ///
    /// Returns the group's new revision.
    fn commit(
        &self,
        list_id: ListId,
        name: &CanonicalName,
        mutations: &[RowMutation],
        expected_revision: ExpectedRevision,
    ) -> Result<u64, RowStoreError>;

    /// Author a fresh row (seeding). Participates in group revisioning like
    /// any other write.
    fn insert_row(&self, row: ItemRow) -> Result<ItemRow, RowStoreError> {
        let name = row.canonical_name.clone();
        self.commit(
            row.list_id,
            &name,
            &[RowMutation::Insert(row.clone())],
            ExpectedRevision::Any,
        )?;
        Ok(row)
    }
}

impl<S> RowStore for Arc<S>
where
    S: RowStore + ?Sized,
{
    fn load_group(
        &self,
        list_id: ListId,
        name: &CanonicalName,
    ) -> Result<GroupSnapshot, RowStoreError> {
        (**self).load_group(list_id, name)
    }

    fn find_row(&self, row_id: RowId) -> Result<Option<ItemRow>, RowStoreError> {
        (**self).find_row(row_id)
    }

    fn load_list(&self, list_id: ListId) -> Result<Vec<ItemRow>, RowStoreError> {
        (**self).load_list(list_id)
    }

    fn commit(
        &self,
        list_id: ListId,
        name: &CanonicalName,
        mutations: &[RowMutation],
        expected_revision: ExpectedRevision,
    ) -> Result<u64, RowStoreError> {
        (**self).commit(list_id, name, mutations, expected_revision)
    }

    fn insert_row(&self, row: ItemRow) -> Result<ItemRow, RowStoreError> {
        (**self).insert_row(row)
    }
}

/// Batch validation shared by store implementations.
///
/// Defense in depth: the planning layer only ever emits well-scoped batches,
/// but a buggy caller must not be able to reach across groups or retain a
/// zero-quantity row.
pub(crate) fn validate_batch(
    list_id: ListId,
    name: &CanonicalName,
    mutations: &[RowMutation],
) -> Result<(), RowStoreError> {
    if mutations.is_empty() {
        return Err(RowStoreError::InvalidCommit("empty mutation batch".to_string()));
    }

    for (idx, m) in mutations.iter().enumerate() {
        match m {
            RowMutation::Insert(row) | RowMutation::Update(row) => {
                if row.list_id != list_id {
                    return Err(RowStoreError::GroupIsolation(format!(
                        "batch addresses a different list (index {idx})"
                    )));
                }
                if row.canonical_name != *name {
                    return Err(RowStoreError::GroupIsolation(format!(
                        "batch addresses a different canonical group (index {idx})"
                    )));
                }
                if row.quantity == 0 {
                    return Err(RowStoreError::InvalidCommit(format!(
                        "a row reaching quantity 0 must be deleted, not written (index {idx})"
                    )));
                }
            }
            RowMutation::Delete(_) => {}
        }
    }

    Ok(())
}
