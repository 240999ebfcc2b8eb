//! Contains the [RetryHandler], which runs a read-modify-write cycle against
//! a [Store] and transparently absorbs a bounded number of version conflicts.
//!
//! A retry does not resend the same payload: every attempt re-reads the
//! freshest snapshot and re-applies the caller's mutation on top of it.
//! Mutations may therefore be invoked several times per call, and should
//! only depend on the payload they are given.

use std::convert::Infallible;
use std::fmt::Debug;
use std::time::Duration;

use tracing::{debug, warn};

use crate::record::Record;
use crate::store::{CommitError, ReadError, Store};
use crate::version::{Check, ConflictError};

/// Pause applied between a conflicting attempt and the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// Wait the same amount of time before every retry.
    Fixed(Duration),
    /// Double the wait on every retry, starting from `base`
    /// and never exceeding `max`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Upper bound for any single delay.
        max: Duration,
    },
}

impl Backoff {
    /// Returns the delay to observe after the `attempt`-th conflicting attempt
    /// (starting from 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Configuration of a [RetryHandler].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How many times a conflicting attempt is retried.
    /// A call performs at most `max_retries + 1` attempts.
    pub max_retries: u32,
    /// Pause between a conflict and the following attempt.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    /// Creates a policy retrying at most `max_retries` times, with no backoff.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::None,
        }
    }

    /// Creates a policy that gives up on the first conflict.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Sets the [Backoff] strategy of the policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the maximum number of read-modify-write cycles per call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// All possible errors returned by [`RetryHandler::try_execute_with_retry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    /// The record does not exist. This error is never retried.
    #[error("record was not found")]
    NotFound,

    /// Every attempt allowed by the [RetryPolicy] ended in a version conflict.
    /// The stored record has not been modified by this call.
    #[error("gave up after {attempts} conflicting attempts: {last}")]
    ConflictExhausted {
        /// Number of read-modify-write cycles performed.
        attempts: u32,
        /// The conflict observed by the last attempt.
        last: ConflictError,
    },

    /// The mutation refused to apply on top of the latest snapshot.
    #[error("mutation rejected the latest snapshot: {0}")]
    Rejected(#[source] E),
}

/// Executes mutations on versioned records, retrying on version conflicts
/// according to its [RetryPolicy].
#[derive(Debug, Clone)]
pub struct RetryHandler<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S> RetryHandler<S> {
    /// Creates a new handler operating on the given [Store].
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns the [RetryPolicy] applied on each call.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the underlying [Store].
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a handler sharing the same [Store], using a different [RetryPolicy].
    #[must_use]
    pub fn with_policy(&self, policy: RetryPolicy) -> Self
    where
        S: Clone,
    {
        Self {
            store: self.store.clone(),
            policy,
        }
    }

    /// Applies `mutation` to the record and commits it, re-reading and
    /// re-applying on version conflicts.
    ///
    /// Returns the committed state of the record.
    pub async fn execute_with_retry<Id, T, F>(
        &self,
        id: &Id,
        mutation: F,
    ) -> Result<Record<Id, T>, RetryError<Infallible>>
    where
        S: Store<Id, T>,
        Id: Clone + Debug + Send + Sync,
        T: Clone + Send + Sync,
        F: Fn(&mut T),
    {
        self.try_execute_with_retry(id, |payload| {
            mutation(payload);
            Ok(())
        })
        .await
    }

    /// Like [`RetryHandler::execute_with_retry`], but the mutation may inspect
    /// the freshest payload and reject it, aborting the call with
    /// [`RetryError::Rejected`] without committing anything.
    pub async fn try_execute_with_retry<Id, T, E, F>(
        &self,
        id: &Id,
        mutation: F,
    ) -> Result<Record<Id, T>, RetryError<E>>
    where
        S: Store<Id, T>,
        Id: Clone + Debug + Send + Sync,
        T: Clone + Send + Sync,
        F: Fn(&mut T) -> Result<(), E>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let snapshot = self.store.read(id).await.map_err(|err| match err {
                ReadError::NotFound => RetryError::NotFound,
            })?;

            let read_version = snapshot.version();
            let mut payload = snapshot.into_payload();

            mutation(&mut payload).map_err(RetryError::Rejected)?;

            let conflict = match self
                .store
                .commit(id, Check::MustBe(read_version), payload.clone())
                .await
            {
                Ok(new_version) => {
                    debug!(?id, attempt, new_version, "mutation committed");
                    return Ok(Record::at_version(id.clone(), new_version, payload));
                }
                Err(CommitError::NotFound) => return Err(RetryError::NotFound),
                Err(CommitError::Conflict(conflict)) => conflict,
            };

            if attempt >= max_attempts {
                warn!(?id, attempts = attempt, %conflict, "retries exhausted");

                return Err(RetryError::ConflictExhausted {
                    attempts: attempt,
                    last: conflict,
                });
            }

            let delay = self.policy.backoff.delay(attempt);

            debug!(
                ?id,
                attempt,
                expected = conflict.expected,
                actual = conflict.actual,
                ?delay,
                "version conflict detected, retrying on the latest snapshot"
            );

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
