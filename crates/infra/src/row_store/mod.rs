//! Row store boundary.
//!
//! This module defines the infrastructure-facing abstraction for loading and
//! atomically mutating the rows of a canonical group, without making any
//! storage assumptions. Rows of one canonical group are the only shared
//! mutable resource in the system; every write commits against the group
//! revision the writer read.

pub mod in_memory;
pub mod r#trait;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryRowStore;
pub use r#trait::{GroupSnapshot, RowStore, RowStoreError};

#[cfg(feature = "postgres")]
pub use postgres::PostgresRowStore;
