use std::collections::HashMap;
use std::sync::RwLock;

use chipin_core::{CanonicalName, ExpectedRevision, ListId, RowId};
use chipin_listing::{ItemRow, RowMutation};

use super::r#trait::{validate_batch, GroupSnapshot, RowStore, RowStoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    list_id: ListId,
    canonical_name: CanonicalName,
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<RowId, ItemRow>,
    revisions: HashMap<GroupKey, u64>,
}

/// In-memory row store.
///
/// Intended for tests/dev. A single lock covers rows and revisions so that
/// a commit's revision check and its mutations are one atomic step.
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    inner: RwLock<Inner>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut rows: Vec<ItemRow>) -> Vec<ItemRow> {
        rows.sort_by(|a, b| {
            (a.display_order, a.created_at, a.id).cmp(&(b.display_order, b.created_at, b.id))
        });
        rows
    }
}

impl RowStore for InMemoryRowStore {
    fn load_group(
        &self,
        list_id: ListId,
        name: &CanonicalName,
    ) -> Result<GroupSnapshot, RowStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RowStoreError::Storage("lock poisoned".to_string()))?;

        let key = GroupKey {
            list_id,
            canonical_name: name.clone(),
        };
        let rows: Vec<ItemRow> = inner
            .rows
            .values()
            .filter(|r| r.list_id == list_id && r.canonical_name == *name)
            .cloned()
            .collect();

        Ok(GroupSnapshot {
            list_id,
            canonical_name: name.clone(),
            rows: Self::sorted(rows),
            revision: inner.revisions.get(&key).copied().unwrap_or(0),
        })
    }

    fn find_row(&self, row_id: RowId) -> Result<Option<ItemRow>, RowStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RowStoreError::Storage("lock poisoned".to_string()))?;
        Ok(inner.rows.get(&row_id).cloned())
    }

    fn load_list(&self, list_id: ListId) -> Result<Vec<ItemRow>, RowStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| RowStoreError::Storage("lock poisoned".to_string()))?;
        let rows: Vec<ItemRow> = inner
            .rows
            .values()
            .filter(|r| r.list_id == list_id)
            .cloned()
            .collect();
        Ok(Self::sorted(rows))
    }

    fn commit(
        &self,
        list_id: ListId,
        name: &CanonicalName,
        mutations: &[RowMutation],
        expected_revision: ExpectedRevision,
    ) -> Result<u64, RowStoreError> {
        validate_batch(list_id, name, mutations)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| RowStoreError::Storage("lock poisoned".to_string()))?;

        let key = GroupKey {
            list_id,
            canonical_name: name.clone(),
        };
        let current = inner.revisions.get(&key).copied().unwrap_or(0);
        if !expected_revision.matches(current) {
            return Err(RowStoreError::Concurrency(format!(
                "expected {expected_revision:?}, found {current}"
            )));
        }

        // Pre-validate against the live row set before touching anything, so
        // the batch applies atomically or not at all.
        for m in mutations {
            match m {
                RowMutation::Insert(row) => {
                    if inner.rows.contains_key(&row.id) {
                        return Err(RowStoreError::InvalidCommit(format!(
                            "insert of existing row {}",
                            row.id
                        )));
                    }
                }
                RowMutation::Update(row) => {
                    let existing = inner.rows.get(&row.id).ok_or(RowStoreError::RowNotFound)?;
                    if existing.list_id != list_id || existing.canonical_name != *name {
                        return Err(RowStoreError::GroupIsolation(format!(
                            "update of row {} outside the addressed group",
                            row.id
                        )));
                    }
                }
                RowMutation::Delete(id) => {
                    let existing = inner.rows.get(id).ok_or(RowStoreError::RowNotFound)?;
                    if existing.list_id != list_id || existing.canonical_name != *name {
                        return Err(RowStoreError::GroupIsolation(format!(
                            "delete of row {id} outside the addressed group"
                        )));
                    }
                }
            }
        }

        for m in mutations {
            match m {
                RowMutation::Insert(row) | RowMutation::Update(row) => {
                    inner.rows.insert(row.id, row.clone());
                }
                RowMutation::Delete(id) => {
                    inner.rows.remove(id);
                }
            }
        }

        let next = current + 1;
        inner.revisions.insert(key, next);
        Ok(next)
    }
}
