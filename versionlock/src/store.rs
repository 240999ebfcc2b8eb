//! Contains the storage contract used by optimistic locking: the [Reader]
//! and [Committer] traits, combined in the [Store] super-trait, and
//! connected abstractions such as the [Tracking] decorator.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::record::Record;
use crate::version::{self, Version};

/// Error returned by [`Reader::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The requested record does not exist in the store.
    #[error("record was not found")]
    NotFound,
}

/// All possible error types returned by [`Committer::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// The record to commit to does not exist in the store.
    #[error("failed to commit new payload: record was not found")]
    NotFound,
    /// The stored version did not match the expected one;
    /// the store has been left untouched.
    #[error("failed to commit new payload: {0}")]
    Conflict(#[from] version::ConflictError),
}

/// Interface used to take snapshots of versioned [Record]s.
#[async_trait]
pub trait Reader<Id, T>: Send + Sync
where
    Id: Send + Sync,
    T: Send + Sync,
{
    /// Returns a snapshot of the record, together with the
    /// [Version] it has been read at.
    ///
    /// Reading has no side effects, and is not ordered
    /// with respect to other reads.
    async fn read(&self, id: &Id) -> Result<Record<Id, T>, ReadError>;
}

/// Interface used to commit new payloads to versioned [Record]s.
#[async_trait]
pub trait Committer<Id, T>: Send + Sync
where
    Id: Send + Sync,
    T: Send + Sync,
{
    /// Replaces the payload of the record if the stored [Version] satisfies
    /// the [version check][version::Check].
    ///
    /// The check and the update are indivisible with respect to other commits
    /// on the same record. On success the version is incremented by exactly one
    /// and returned; on [`CommitError::Conflict`] the stored record is not modified.
    async fn commit(
        &self,
        id: &Id,
        version_check: version::Check,
        payload: T,
    ) -> Result<Version, CommitError>;
}

/// A versioned record Store, exposing snapshot reads and
/// atomic commit-if-version-matches updates.
pub trait Store<Id, T>: Reader<Id, T> + Committer<Id, T> + Send + Sync
where
    Id: Send + Sync,
    T: Send + Sync,
{
}

impl<S, Id, T> Store<Id, T> for S
where
    S: Reader<Id, T> + Committer<Id, T> + Send + Sync,
    Id: Send + Sync,
    T: Send + Sync,
{
}

/// A commit attempt observed by the [Tracking] decorator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAttempt<Id> {
    /// The record the commit was directed to.
    pub id: Id,
    /// The version check presented by the caller.
    pub version_check: version::Check,
    /// The outcome returned by the decorated store.
    pub result: Result<Version, CommitError>,
}

/// Decorator type for a [Store] implementation that tracks the list of
/// commit attempts performed through it, successful or not.
///
/// Useful for testing purposes, i.e. asserting how many times a caller
/// went through the read-modify-write cycle.
#[derive(Debug, Clone)]
pub struct Tracking<S, Id, T> {
    store: S,
    attempts: Arc<Mutex<Vec<CommitAttempt<Id>>>>,
    payload: PhantomData<T>,
}

impl<S, Id, T> Tracking<S, Id, T>
where
    Id: Clone,
{
    /// Returns the list of commit attempts recorded through this decorator so far.
    pub fn recorded_commits(&self) -> Vec<CommitAttempt<Id>> {
        self.attempts.lock().clone()
    }

    /// Returns the number of commit attempts that were applied by the store.
    pub fn successful_commits(&self) -> usize {
        self.attempts
            .lock()
            .iter()
            .filter(|attempt| attempt.result.is_ok())
            .count()
    }

    /// Resets the list of recorded commit attempts.
    pub fn reset_recorded_commits(&self) {
        self.attempts.lock().clear();
    }
}

#[async_trait]
impl<S, Id, T> Reader<Id, T> for Tracking<S, Id, T>
where
    S: Store<Id, T>,
    Id: Send + Sync,
    T: Send + Sync,
{
    async fn read(&self, id: &Id) -> Result<Record<Id, T>, ReadError> {
        self.store.read(id).await
    }
}

#[async_trait]
impl<S, Id, T> Committer<Id, T> for Tracking<S, Id, T>
where
    S: Store<Id, T>,
    Id: Clone + Send + Sync,
    T: Send + Sync,
{
    async fn commit(
        &self,
        id: &Id,
        version_check: version::Check,
        payload: T,
    ) -> Result<Version, CommitError> {
        let result = self.store.commit(id, version_check, payload).await;

        self.attempts.lock().push(CommitAttempt {
            id: id.clone(),
            version_check,
            result,
        });

        result
    }
}

/// Extension trait that can be used to pull in supertypes implemented
/// in this module.
pub trait StoreExt<Id, T>: Store<Id, T> + Sized
where
    Id: Clone + Send + Sync,
    T: Send + Sync,
{
    /// Returns a [Tracking] instance that decorates the original [Store]
    /// instance this method has been called on.
    fn with_commit_tracking(self) -> Tracking<Self, Id, T> {
        Tracking {
            store: self,
            attempts: Arc::default(),
            payload: PhantomData,
        }
    }
}

impl<S, Id, T> StoreExt<Id, T> for S
where
    S: Store<Id, T>,
    Id: Clone + Send + Sync,
    T: Send + Sync,
{
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inmemory::InMemory;
    use crate::version::{Check, ConflictError};

    #[tokio::test]
    async fn tracking_store_records_every_commit_attempt() {
        let backend = InMemory::<u64, &'static str>::default();
        backend.insert(1, "v0").expect("record should not exist yet");

        let store = backend.with_commit_tracking();

        store
            .commit(&1, Check::MustBe(0), "v1")
            .await
            .expect("first commit should succeed");

        let err = store
            .commit(&1, Check::MustBe(0), "stale")
            .await
            .expect_err("stale commit should conflict");

        assert_eq!(
            vec![
                CommitAttempt {
                    id: 1,
                    version_check: Check::MustBe(0),
                    result: Ok(1),
                },
                CommitAttempt {
                    id: 1,
                    version_check: Check::MustBe(0),
                    result: Err(err),
                },
            ],
            store.recorded_commits()
        );
        assert_eq!(1, store.successful_commits());

        store.reset_recorded_commits();
        assert!(store.recorded_commits().is_empty());
    }

    #[tokio::test]
    async fn tracking_store_forwards_reads() {
        let backend = InMemory::<u64, &'static str>::default();
        let store = backend.clone().with_commit_tracking();

        assert_eq!(Err(ReadError::NotFound), store.read(&7).await);

        backend.insert(7, "hello").expect("record should not exist yet");
        let record = store.read(&7).await.expect("record should be found");

        assert_eq!(&"hello", record.payload());
        assert!(store.recorded_commits().is_empty());
    }

    #[test]
    fn conflict_errors_convert_into_commit_errors() {
        let err: CommitError = ConflictError {
            expected: 0,
            actual: 1,
        }
        .into();

        assert_eq!(
            "failed to commit new payload: conflict error detected, expected version was: 0, found: 1",
            err.to_string()
        );
    }
}
