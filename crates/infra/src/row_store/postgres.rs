//! Postgres-backed row store implementation.
//!
//! Persists reservation rows with group isolation and optimistic concurrency
//! enforced at the database level.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE item_rows (
//!     id             UUID PRIMARY KEY,
//!     list_id        UUID NOT NULL,
//!     canonical_name TEXT NOT NULL,
//!     display_name   TEXT NOT NULL,
//!     quantity       BIGINT NOT NULL CHECK (quantity > 0),
//!     claimant_name  TEXT,
//!     parent_row_id  UUID,
//!     display_order  INTEGER NOT NULL,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     notes          JSONB
//! );
//! CREATE INDEX item_rows_group ON item_rows (list_id, canonical_name);
//!
//! CREATE TABLE row_groups (
//!     list_id        UUID NOT NULL,
//!     canonical_name TEXT NOT NULL,
//!     revision       BIGINT NOT NULL,
//!     PRIMARY KEY (list_id, canonical_name)
//! );
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | RowStoreError |
//! |------------|---------------|---------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (check violation)  | `23514` | `InvalidCommit` |
//! | Database (other)            | any     | `Storage` |
//! | PoolClosed / network        | n/a     | `Storage` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use chipin_core::{CanonicalName, ExpectedRevision, ListId, RowId};
use chipin_listing::{ItemRow, RowMutation};

use super::r#trait::{validate_batch, GroupSnapshot, RowStore, RowStoreError};

/// Postgres-backed row store.
///
/// ## Group Isolation
///
/// Every row query includes `list_id` and (where applicable) `canonical_name`
/// in the WHERE clause, so a commit can never touch a row outside the group
/// it addressed.
///
/// ## Optimistic Concurrency
///
/// `commit()` runs inside a transaction that takes a `FOR UPDATE` lock on the
/// group's `row_groups` entry, validates the caller's expected revision, then
/// applies the batch and bumps the revision. Two writers racing on the same
/// group serialize on that lock; the loser observes a moved revision and
/// fails with `Concurrency`.
#[derive(Debug, Clone)]
pub struct PostgresRowStore {
    pool: Arc<PgPool>,
}

impl PostgresRowStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Load one canonical group and its revision in a single transaction.
    #[instrument(skip(self), fields(list_id = %list_id.as_uuid(), name = %name), err)]
    pub async fn load_group_async(
        &self,
        list_id: ListId,
        name: &CanonicalName,
    ) -> Result<GroupSnapshot, RowStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let revision = read_revision(&mut tx, list_id, name, false).await?;

        let rows = sqlx::query(
            r#"
            SELECT
                id,
                list_id,
                canonical_name,
                display_name,
                quantity,
                claimant_name,
                parent_row_id,
                display_order,
                created_at,
                notes
            FROM item_rows
            WHERE list_id = $1 AND canonical_name = $2
            ORDER BY display_order ASC, created_at ASC, id ASC
            "#,
        )
        .bind(list_id.as_uuid())
        .bind(name.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_group", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let record = ItemRowRecord::from_row(&row)
                .map_err(|e| RowStoreError::Storage(format!("failed to decode row: {e}")))?;
            items.push(record.into());
        }

        Ok(GroupSnapshot {
            list_id,
            canonical_name: name.clone(),
            rows: items,
            revision,
        })
    }

    #[instrument(skip(self), fields(row_id = %row_id.as_uuid()), err)]
    pub async fn find_row_async(&self, row_id: RowId) -> Result<Option<ItemRow>, RowStoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                list_id,
                canonical_name,
                display_name,
                quantity,
                claimant_name,
                parent_row_id,
                display_order,
                created_at,
                notes
            FROM item_rows
            WHERE id = $1
            "#,
        )
        .bind(row_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_row", e))?;

        match row {
            Some(row) => {
                let record = ItemRowRecord::from_row(&row)
                    .map_err(|e| RowStoreError::Storage(format!("failed to decode row: {e}")))?;
                Ok(Some(record.into()))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(list_id = %list_id.as_uuid()), err)]
    pub async fn load_list_async(&self, list_id: ListId) -> Result<Vec<ItemRow>, RowStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                list_id,
                canonical_name,
                display_name,
                quantity,
                claimant_name,
                parent_row_id,
                display_order,
                created_at,
                notes
            FROM item_rows
            WHERE list_id = $1
            ORDER BY display_order ASC, created_at ASC, id ASC
            "#,
        )
        .bind(list_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_list", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let record = ItemRowRecord::from_row(&row)
                .map_err(|e| RowStoreError::Storage(format!("failed to decode row: {e}")))?;
            items.push(record.into());
        }
        Ok(items)
    }

    /// Apply a mutation batch to one group at an expected revision.
    ///
    /// The group's `row_groups` entry is locked `FOR UPDATE` for the duration
    /// of the transaction, the expected revision is validated under that
    /// lock, and every mutation is scoped by `(id, list_id, canonical_name)`
    /// with its affected-row count checked.
    #[instrument(
        skip(self, mutations),
        fields(
            list_id = %list_id.as_uuid(),
            name = %name,
            mutation_count = mutations.len(),
            expected_revision = ?expected_revision
        ),
        err
    )]
    pub async fn commit_async(
        &self,
        list_id: ListId,
        name: &CanonicalName,
        mutations: &[RowMutation],
        expected_revision: ExpectedRevision,
    ) -> Result<u64, RowStoreError> {
        validate_batch(list_id, name, mutations)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current = read_revision(&mut tx, list_id, name, true).await?;
        if !expected_revision.matches(current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(RowStoreError::Concurrency(format!(
                "optimistic concurrency check failed: expected {expected_revision:?}, found {current}"
            )));
        }

        for mutation in mutations {
            apply_mutation(&mut tx, list_id, name, mutation).await?;
        }

        let next = current + 1;
        sqlx::query(
            r#"
            INSERT INTO row_groups (list_id, canonical_name, revision)
            VALUES ($1, $2, $3)
            ON CONFLICT (list_id, canonical_name)
            DO UPDATE SET revision = EXCLUDED.revision
            "#,
        )
        .bind(list_id.as_uuid())
        .bind(name.as_str())
        .bind(next as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("bump_revision", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(next)
    }
}

/// Read a group's current revision, optionally locking it for the rest of
/// the transaction. Missing groups are revision 0.
async fn read_revision(
    tx: &mut Transaction<'_, Postgres>,
    list_id: ListId,
    name: &CanonicalName,
    for_update: bool,
) -> Result<u64, RowStoreError> {
    let query = if for_update {
        "SELECT revision FROM row_groups WHERE list_id = $1 AND canonical_name = $2 FOR UPDATE"
    } else {
        "SELECT revision FROM row_groups WHERE list_id = $1 AND canonical_name = $2"
    };

    let row = sqlx::query(query)
        .bind(list_id.as_uuid())
        .bind(name.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("read_revision", e))?;

    match row {
        Some(row) => {
            let revision: i64 = row
                .try_get("revision")
                .map_err(|e| RowStoreError::Storage(format!("failed to read revision: {e}")))?;
            Ok(revision as u64)
        }
        None => Ok(0),
    }
}

async fn apply_mutation(
    tx: &mut Transaction<'_, Postgres>,
    list_id: ListId,
    name: &CanonicalName,
    mutation: &RowMutation,
) -> Result<(), RowStoreError> {
    match mutation {
        RowMutation::Insert(row) => {
            sqlx::query(
                r#"
                INSERT INTO item_rows (
                    id,
                    list_id,
                    canonical_name,
                    display_name,
                    quantity,
                    claimant_name,
                    parent_row_id,
                    display_order,
                    created_at,
                    notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(row.id.as_uuid())
            .bind(row.list_id.as_uuid())
            .bind(row.canonical_name.as_str())
            .bind(&row.display_name)
            .bind(row.quantity as i64)
            .bind(row.claimant_name.as_deref())
            .bind(row.parent_row_id.map(|id| *id.as_uuid()))
            .bind(row.display_order)
            .bind(row.created_at)
            .bind(&row.notes)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_row", e))?;
        }
        RowMutation::Update(row) => {
            let result = sqlx::query(
                r#"
                UPDATE item_rows
                SET quantity = $4, claimant_name = $5, notes = $6
                WHERE id = $1 AND list_id = $2 AND canonical_name = $3
                "#,
            )
            .bind(row.id.as_uuid())
            .bind(list_id.as_uuid())
            .bind(name.as_str())
            .bind(row.quantity as i64)
            .bind(row.claimant_name.as_deref())
            .bind(&row.notes)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("update_row", e))?;

            if result.rows_affected() == 0 {
                return Err(RowStoreError::RowNotFound);
            }
        }
        RowMutation::Delete(id) => {
            let result = sqlx::query(
                "DELETE FROM item_rows WHERE id = $1 AND list_id = $2 AND canonical_name = $3",
            )
            .bind(id.as_uuid())
            .bind(list_id.as_uuid())
            .bind(name.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("delete_row", e))?;

            if result.rows_affected() == 0 {
                return Err(RowStoreError::RowNotFound);
            }
        }
    }
    Ok(())
}

/// Map SQLx errors to RowStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RowStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RowStoreError::Concurrency(msg),
                Some("23514") => RowStoreError::InvalidCommit(msg),
                _ => RowStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            RowStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => RowStoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row type

#[derive(Debug)]
struct ItemRowRecord {
    id: uuid::Uuid,
    list_id: uuid::Uuid,
    canonical_name: String,
    display_name: String,
    quantity: i64,
    claimant_name: Option<String>,
    parent_row_id: Option<uuid::Uuid>,
    display_order: i32,
    created_at: DateTime<Utc>,
    notes: Option<serde_json::Value>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ItemRowRecord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRowRecord {
            id: row.try_get("id")?,
            list_id: row.try_get("list_id")?,
            canonical_name: row.try_get("canonical_name")?,
            display_name: row.try_get("display_name")?,
            quantity: row.try_get("quantity")?,
            claimant_name: row.try_get("claimant_name")?,
            parent_row_id: row.try_get("parent_row_id")?,
            display_order: row.try_get("display_order")?,
            created_at: row.try_get("created_at")?,
            notes: row.try_get("notes")?,
        })
    }
}

impl From<ItemRowRecord> for ItemRow {
    fn from(record: ItemRowRecord) -> Self {
        ItemRow {
            id: RowId::from_uuid(record.id),
            list_id: ListId::from_uuid(record.list_id),
            canonical_name: CanonicalName::new(&record.canonical_name),
            display_name: record.display_name,
            quantity: record.quantity as u32,
            claimant_name: record.claimant_name,
            parent_row_id: record.parent_row_id.map(RowId::from_uuid),
            display_order: record.display_order,
            created_at: record.created_at,
            notes: record.notes,
        }
    }
}

// The RowStore trait is synchronous; bridge into async via the ambient tokio
// runtime, same as callers inside axum handlers already have.

fn runtime_handle() -> Result<tokio::runtime::Handle, RowStoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        RowStoreError::Storage(
            "PostgresRowStore requires a tokio runtime context".to_string(),
        )
    })
}

impl RowStore for PostgresRowStore {
    fn load_group(
        &self,
        list_id: ListId,
        name: &CanonicalName,
    ) -> Result<GroupSnapshot, RowStoreError> {
        runtime_handle()?.block_on(self.load_group_async(list_id, name))
    }

    fn find_row(&self, row_id: RowId) -> Result<Option<ItemRow>, RowStoreError> {
        runtime_handle()?.block_on(self.find_row_async(row_id))
    }

    fn load_list(&self, list_id: ListId) -> Result<Vec<ItemRow>, RowStoreError> {
        runtime_handle()?.block_on(self.load_list_async(list_id))
    }

    fn commit(
        &self,
        list_id: ListId,
        name: &CanonicalName,
        mutations: &[RowMutation],
        expected_revision: ExpectedRevision,
    ) -> Result<u64, RowStoreError> {
        runtime_handle()?.block_on(self.commit_async(list_id, name, mutations, expected_revision))
    }
}
