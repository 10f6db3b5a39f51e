//! Optimistic concurrency expectations for row groups.

use crate::error::{DomainError, DomainResult};

/// Revision expectation for a canonical row group.
///
/// Every committed write to a group bumps its revision by one. A writer
/// states the revision it read; the store rejects the commit if another
/// writer got there first.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedRevision {
    /// Skip the revision check (seeding, migrations).
    Any,
    /// Require the group to be at an exact revision.
    Exact(u64),
}

impl ExpectedRevision {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedRevision::Any => true,
            ExpectedRevision::Exact(rev) => rev == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::concurrent(format!(
                "revision check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
