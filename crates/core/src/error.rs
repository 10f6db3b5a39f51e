//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// This is the closed taxonomy of reservation failures. Infrastructure
/// concerns (storage, connection failures) belong elsewhere.
///
/// `InsufficientQuantity` and `ConcurrentModification` are recoverable: the
/// caller should re-read the consolidated view and retry with adjusted input.
/// The remaining kinds indicate caller logic errors and must not be
/// auto-retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A requested quantity was malformed (zero, or otherwise unusable).
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A claim was issued without a claimant name.
    #[error("claimant name cannot be empty")]
    EmptyClaimantName,

    /// Fewer open units exist than the claim requested.
    ///
    /// Expected and frequent under contention ("someone else just took it").
    #[error("insufficient quantity: requested {requested}, available {available}")]
    InsufficientQuantity { requested: u32, available: u32 },

    /// The operation kept losing the commit race past its retry bound.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Unclaim was issued against a row that is already open.
    #[error("row is not claimed")]
    NotClaimed,

    /// The addressed row does not exist.
    #[error("row not found")]
    RowNotFound,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A value failed validation outside the claim path (e.g. authoring a
    /// row with a blank name).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn insufficient(requested: u32, available: u32) -> Self {
        Self::InsufficientQuantity {
            requested,
            available,
        }
    }

    pub fn concurrent(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the caller can recover by re-reading state and retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientQuantity { .. } | Self::ConcurrentModification(_)
        )
    }
}
