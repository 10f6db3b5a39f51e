//! `chipin-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod name;
pub mod revision;

pub use error::{DomainError, DomainResult};
pub use id::{ListId, RowId};
pub use name::CanonicalName;
pub use revision::ExpectedRevision;
