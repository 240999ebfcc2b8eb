//! Contains the [InMemory] implementation of the [Store][store::Store] trait,
//! backed by a thread-safe [`std::collections::HashMap`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::record::Record;
use crate::store::{self, CommitError, ReadError};
use crate::version::{self, Version};

/// Error returned by [`InMemory::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    /// A record with the same identifier is already stored.
    #[error("a record with the same id already exists")]
    AlreadyExists,
}

/// In-memory implementation of the [`store::Store`] trait.
///
/// Cloning an [InMemory] store is cheap and every clone
/// shares the same underlying records.
#[derive(Debug, Clone)]
pub struct InMemory<Id, T> {
    backend: Arc<RwLock<HashMap<Id, Record<Id, T>>>>,
}

impl<Id, T> Default for InMemory<Id, T> {
    fn default() -> Self {
        Self {
            backend: Arc::default(),
        }
    }
}

impl<Id, T> InMemory<Id, T>
where
    Id: Clone + Eq + Hash,
    T: Clone,
{
    /// Creates a new record at the initial [Version].
    pub fn insert(&self, id: Id, payload: T) -> Result<Record<Id, T>, InsertError> {
        let mut backend = self.backend.write();

        if backend.contains_key(&id) {
            return Err(InsertError::AlreadyExists);
        }

        let record = Record::new(id.clone(), payload);
        backend.insert(id, record.clone());

        Ok(record)
    }

    /// Replaces the record, if any, with a fresh one at the initial [Version].
    ///
    /// This is a setup operation: it bypasses optimistic locking entirely
    /// and should never be used concurrently with writers.
    pub fn reset(&self, id: Id, payload: T) -> Record<Id, T> {
        let record = Record::new(id.clone(), payload);
        self.backend.write().insert(id, record.clone());

        record
    }

    /// Deletes the record, returning its last stored state.
    pub fn remove(&self, id: &Id) -> Option<Record<Id, T>> {
        self.backend.write().remove(id)
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.backend.read().len()
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.backend.read().is_empty()
    }
}

#[async_trait]
impl<Id, T> store::Reader<Id, T> for InMemory<Id, T>
where
    Id: Clone + Eq + Hash + Send + Sync,
    T: Clone + Send + Sync,
{
    async fn read(&self, id: &Id) -> Result<Record<Id, T>, ReadError> {
        self.backend
            .read()
            .get(id)
            .cloned()
            .ok_or(ReadError::NotFound)
    }
}

#[async_trait]
impl<Id, T> store::Committer<Id, T> for InMemory<Id, T>
where
    Id: Clone + Eq + Hash + Send + Sync,
    T: Clone + Send + Sync,
{
    async fn commit(
        &self,
        id: &Id,
        version_check: version::Check,
        payload: T,
    ) -> Result<Version, CommitError> {
        let mut backend = self.backend.write();
        let record = backend.get_mut(id).ok_or(CommitError::NotFound)?;

        version_check.verify(record.version())?;

        Ok(record.advance(payload))
    }
}
