//! Contains the types necessary for Optimistic Locking through versioning.

/// A version used for Optimistic Locking.
///
/// Every [Record][crate::record::Record] starts at version `0`, and each
/// successful commit increments it by exactly one.
pub type Version = u64;

/// Used to set a specific expectation during a commit
/// on a versioned [Record][crate::record::Record].
///
/// It allows for optimistic locking, avoiding lost updates
/// when modifying the same record at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Disables the optimistic locking check: the commit is applied
    /// on top of whatever [Version] is currently stored.
    Any,
    /// Expects that the stored [Version] at commit time
    /// must have the value specified.
    MustBe(Version),
}

impl Check {
    /// Returns a [ConflictError] if the `actual` [Version] does not satisfy
    /// this expectation.
    pub fn verify(self, actual: Version) -> Result<(), ConflictError> {
        match self {
            Check::MustBe(expected) if expected != actual => {
                Err(ConflictError { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

/// This error is returned by a function when a version conflict error has
/// been detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("conflict error detected, expected version was: {expected}, found: {actual}")]
pub struct ConflictError {
    /// The [Version] value that was expected when calling the function that failed.
    pub expected: Version,

    /// The actual [Version] value, which mismatch caused this error.
    pub actual: Version,
}
