//! Contains the [Record] type, the unit of data protected by optimistic locking.

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// A versioned entity, identified by a stable `id`.
///
/// A [Record] returned by a [Reader][crate::store::Reader] is an immutable
/// snapshot: it carries the [Version] it was read at, which is the token
/// to present when committing a new payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<Id, T> {
    id: Id,
    version: Version,
    payload: T,
}

impl<Id, T> Record<Id, T> {
    /// Creates a new [Record] at the initial [Version].
    pub fn new(id: Id, payload: T) -> Self {
        Self {
            id,
            version: 0,
            payload,
        }
    }

    pub(crate) fn at_version(id: Id, version: Version, payload: T) -> Self {
        Self {
            id,
            version,
            payload,
        }
    }

    /// Returns the unique identifier of the record.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Returns the [Version] of the record at the time of this snapshot.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the payload of the record at the time of this snapshot.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consumes the snapshot, returning its payload.
    pub fn into_payload(self) -> T {
        self.payload
    }

    // Replaces the payload and bumps the version, the only way
    // a stored record ever changes.
    pub(crate) fn advance(&mut self, payload: T) -> Version {
        self.payload = payload;
        self.version += 1;
        self.version
    }
}
