//! Infrastructure layer: the row store boundary and the reservation engine.

pub mod reservation;
pub mod row_store;


pub use reservation::{ReservationEngine, ReservationError, MAX_COMMIT_ATTEMPTS};
pub use row_store::{GroupSnapshot, InMemoryRowStore, RowStore, RowStoreError};

#[cfg(feature = "postgres")]
pub use row_store::PostgresRowStore;
