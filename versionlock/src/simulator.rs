//! Contains the [ConflictSimulator], which races several [Caller]s against
//! the same versioned record to reproduce optimistic locking conflicts.
//!
//! Callers are spawned as tasks on the current Tokio runtime and held behind
//! a single [StartBarrier], so that their read phases overlap as much as
//! possible. The interleaving is still up to the scheduler: either caller
//! may win a race, and the resulting [SimulationReport] reflects whatever
//! actually happened.

use std::fmt::{self, Debug, Display};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::barrier::{AbandonedError, StartBarrier};
use crate::record::Record;
use crate::report::Reporter;
use crate::retry::{RetryError, RetryHandler, RetryPolicy};
use crate::store::{self, CommitError, ReadError, Store};
use crate::version::{self, Check, ConflictError, Version};

/// A logical change to a record payload, re-applicable any number of times.
pub type Mutation<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// How a [Caller] talks to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A single read-modify-write cycle straight against the store.
    /// On conflict the mutation is lost.
    Direct,
    /// The mutation goes through a [RetryHandler] configured with this policy.
    Retrying(RetryPolicy),
}

/// One of the concurrent participants of a simulation.
pub struct Caller<T> {
    name: String,
    mode: Mode,
    think_time: Duration,
    mutation: Mutation<T>,
}

impl<T> Clone for Caller<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            mode: self.mode,
            think_time: self.think_time,
            mutation: Arc::clone(&self.mutation),
        }
    }
}

impl<T> Debug for Caller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("think_time", &self.think_time)
            .finish_non_exhaustive()
    }
}

impl<T> Caller<T> {
    /// Creates a [Caller] that commits directly to the store, without retries.
    pub fn direct<F>(name: impl Into<String>, mutation: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            mode: Mode::Direct,
            think_time: Duration::ZERO,
            mutation: Arc::new(mutation),
        }
    }

    /// Creates a [Caller] that commits through a [RetryHandler].
    pub fn retrying<F>(name: impl Into<String>, policy: RetryPolicy, mutation: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            mode: Mode::Retrying(policy),
            think_time: Duration::ZERO,
            mutation: Arc::new(mutation),
        }
    }

    /// Sets a pause between reading the record and committing to it,
    /// widening the conflict window of this caller.
    #[must_use]
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    /// Returns the name of the caller, used in reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how the caller talks to the store.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    async fn execute<S, Id, R>(&self, store: S, id: Id, reporter: R) -> Outcome
    where
        S: Store<Id, T>,
        Id: Clone + Debug + Send + Sync,
        T: Clone + Send + Sync,
        R: Reporter,
    {
        match self.mode {
            Mode::Direct => self.execute_direct(store, id).await,
            Mode::Retrying(policy) => self.execute_with_retry(store, id, reporter, policy).await,
        }
    }

    async fn execute_direct<S, Id>(&self, store: S, id: Id) -> Outcome
    where
        S: Store<Id, T>,
        Id: Clone + Debug + Send + Sync,
        T: Clone + Send + Sync,
    {
        let snapshot = match store.read(&id).await {
            Ok(snapshot) => snapshot,
            Err(ReadError::NotFound) => return Outcome::NotFound,
        };

        let read_version = snapshot.version();
        let mut payload = snapshot.into_payload();
        (self.mutation)(&mut payload);

        match store.commit(&id, Check::MustBe(read_version), payload).await {
            Ok(version) => Outcome::Committed(version),
            Err(CommitError::Conflict(conflict)) => Outcome::Conflict(conflict),
            Err(CommitError::NotFound) => Outcome::NotFound,
        }
    }

    async fn execute_with_retry<S, Id, R>(
        &self,
        store: S,
        id: Id,
        reporter: R,
        policy: RetryPolicy,
    ) -> Outcome
    where
        S: Store<Id, T>,
        Id: Clone + Debug + Send + Sync,
        T: Clone + Send + Sync,
        R: Reporter,
    {
        let handler = RetryHandler::new(store, policy);
        let attempts = AtomicU32::new(0);

        let result = handler
            .execute_with_retry(&id, |payload: &mut T| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                reporter.report(&format!("{}: applying mutation, attempt {attempt}", self.name));
                (self.mutation)(payload);
            })
            .await;

        match result {
            Ok(record) => Outcome::Committed(record.version()),
            Err(RetryError::ConflictExhausted { attempts, .. }) => {
                Outcome::ConflictExhausted { attempts }
            }
            Err(RetryError::NotFound) => Outcome::NotFound,
            Err(RetryError::Rejected(never)) => match never {},
        }
    }
}

/// The result observed by a single [Caller].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The caller's mutation was committed, producing this version.
    Committed(Version),
    /// A direct caller lost the race; its mutation was discarded.
    Conflict(ConflictError),
    /// A retrying caller lost every race its policy allowed.
    ConflictExhausted {
        /// Number of read-modify-write cycles performed.
        attempts: u32,
    },
    /// The record did not exist.
    NotFound,
}

impl Outcome {
    /// Returns `true` if the caller's mutation has been committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    /// Returns `true` if the caller ended on a version conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Outcome::Conflict(_) | Outcome::ConflictExhausted { .. }
        )
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Committed(version) => write!(f, "committed version {version}"),
            Outcome::Conflict(conflict) => write!(f, "conflict detected ({conflict})"),
            Outcome::ConflictExhausted { attempts } => {
                write!(f, "conflict persisted after {attempts} attempts")
            }
            Outcome::NotFound => write!(f, "record not found"),
        }
    }
}

/// The [Outcome] of a named [Caller].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerOutcome {
    /// Name of the caller.
    pub name: String,
    /// What the caller observed.
    pub outcome: Outcome,
}

/// Final state of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport<Id, T> {
    /// The record as stored once every caller has finished.
    pub final_record: Record<Id, T>,
    /// Outcomes of each caller, in the order callers were given.
    pub outcomes: Vec<CallerOutcome>,
}

impl<Id, T> SimulationReport<Id, T> {
    /// Returns the [Outcome] of the caller with the given name.
    pub fn outcome_of(&self, name: &str) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|caller| caller.name == name)
            .map(|caller| caller.outcome)
    }

    /// Returns the number of callers whose mutation has been committed.
    pub fn winners(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|caller| caller.outcome.is_committed())
            .count()
    }

    /// Returns the number of callers that ended on a version conflict.
    pub fn conflicts(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|caller| caller.outcome.is_conflict())
            .count()
    }
}

/// All possible errors returned by [`ConflictSimulator::run`].
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The record could not be read once the callers finished.
    #[error("record was not found after the simulation")]
    NotFound,
    /// A caller task panicked or was cancelled.
    #[error("caller '{0}' did not complete")]
    CallerPanicked(String),
    /// The callers were never released.
    #[error(transparent)]
    Abandoned(#[from] AbandonedError),
}

/// Races a set of [Caller]s against the same record.
#[derive(Debug, Clone)]
pub struct ConflictSimulator<S, R> {
    store: S,
    reporter: R,
}

impl<S, R> ConflictSimulator<S, R>
where
    R: Reporter + Clone,
{
    /// Creates a new simulator sharing the given [Store], reporting
    /// progress lines to `reporter`.
    pub fn new(store: S, reporter: R) -> Self {
        Self { store, reporter }
    }

    /// Starts one task per [Caller], releases them all at once, waits for
    /// every one of them and returns the final state of the record.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn run<Id, T>(
        &self,
        id: Id,
        callers: Vec<Caller<T>>,
    ) -> Result<SimulationReport<Id, T>, SimulationError>
    where
        S: Store<Id, T> + Clone + 'static,
        Id: Clone + Debug + Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
    {
        let barrier = StartBarrier::new();

        let (names, tasks): (Vec<_>, Vec<_>) = callers
            .into_iter()
            .map(|caller| {
                let waiter = barrier.waiter();
                let reporter = self.reporter.clone();
                let id = id.clone();
                let name = caller.name.clone();
                let store = ReadAnnouncer {
                    store: ThinkTime::new(self.store.clone(), caller.think_time),
                    reporter: reporter.clone(),
                    caller: name.clone(),
                    payload: PhantomData,
                };

                let task = tokio::spawn(async move {
                    waiter.wait().await?;
                    Ok::<_, AbandonedError>(caller.execute(store, id, reporter).await)
                });

                (name, task)
            })
            .unzip();

        self.reporter
            .report(&format!("releasing {} concurrent callers", tasks.len()));
        barrier.release();

        let mut outcomes = Vec::with_capacity(names.len());

        for (name, joined) in names.into_iter().zip(join_all(tasks).await) {
            let outcome = match joined {
                Ok(outcome) => outcome?,
                Err(_) => return Err(SimulationError::CallerPanicked(name)),
            };

            self.reporter.report(&format!("{name}: {outcome}"));
            outcomes.push(CallerOutcome { name, outcome });
        }

        let final_record = self
            .store
            .read(&id)
            .await
            .map_err(|_| SimulationError::NotFound)?;

        Ok(SimulationReport {
            final_record,
            outcomes,
        })
    }
}

/// Decorator type for a [Store] implementation that pauses before
/// forwarding every commit, simulating a slow writer.
#[derive(Debug, Clone)]
pub struct ThinkTime<S, T> {
    store: S,
    delay: Duration,
    payload: PhantomData<T>,
}

impl<S, T> ThinkTime<S, T> {
    /// Wraps `store`, delaying each commit by `delay`.
    pub fn new(store: S, delay: Duration) -> Self {
        Self {
            store,
            delay,
            payload: PhantomData,
        }
    }
}

#[async_trait]
impl<S, Id, T> store::Reader<Id, T> for ThinkTime<S, T>
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
impl<S, Id, T> store::Committer<Id, T> for ThinkTime<S, T>
where
    S: Store<Id, T>,
    Id: Send + Sync,
    T: Send + Sync,
{
    async fn commit(
        &self,
        id: &Id,
        version_check: version::Check,
        payload: T,
    ) -> Result<Version, CommitError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.store.commit(id, version_check, payload).await
    }
}

// Reports the version observed by every read of a caller, whether
// it commits directly or through a retry handler.
struct ReadAnnouncer<S, R, T> {
    store: S,
    reporter: R,
    caller: String,
    payload: PhantomData<T>,
}

#[async_trait]
impl<S, R, Id, T> store::Reader<Id, T> for ReadAnnouncer<S, R, T>
where
    S: Store<Id, T>,
    R: Reporter,
    Id: Send + Sync,
    T: Send + Sync,
{
    async fn read(&self, id: &Id) -> Result<Record<Id, T>, ReadError> {
        let record = self.store.read(id).await?;

        self.reporter
            .report(&format!("{}: read version {}", self.caller, record.version()));

        Ok(record)
    }
}

#[async_trait]
impl<S, R, Id, T> store::Committer<Id, T> for ReadAnnouncer<S, R, T>
where
    S: Store<Id, T>,
    R: Reporter,
    Id: Send + Sync,
    T: Send + Sync,
{
    async fn commit(
        &self,
        id: &Id,
        version_check: version::Check,
        payload: T,
    ) -> Result<Version, CommitError> {
        self.store.commit(id, version_check, payload).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inmemory::InMemory;
    use crate::report::Recorder;

    #[tokio::test]
    async fn missing_records_fail_the_simulation() {
        let simulator =
            ConflictSimulator::new(InMemory::<u64, u32>::default(), Recorder::default());

        let err = simulator
            .run(
                42,
                vec![
                    Caller::direct("direct", |n: &mut u32| *n += 1),
                    Caller::retrying("retrying", RetryPolicy::default(), |n: &mut u32| *n += 1),
                ],
            )
            .await
            .expect_err("the record is never created");

        assert!(matches!(err, SimulationError::NotFound));
    }

    #[tokio::test]
    async fn a_single_caller_always_commits() {
        let store = InMemory::default();
        store.insert(1_u64, 10_u32).expect("insert should succeed");

        let recorder = Recorder::default();
        let simulator = ConflictSimulator::new(store, recorder.clone());

        let report = simulator
            .run(1, vec![Caller::direct("alone", |n: &mut u32| *n *= 2)])
            .await
            .expect("simulation should complete");

        assert_eq!(Some(Outcome::Committed(1)), report.outcome_of("alone"));
        assert_eq!(&20, report.final_record.payload());
        assert_eq!(1, report.winners());
        assert_eq!(0, report.conflicts());

        assert_eq!(
            vec![
                "releasing 1 concurrent callers",
                "alone: read version 0",
                "alone: committed version 1",
            ],
            recorder.lines()
        );
    }

    #[test]
    fn outcomes_render_human_readable_lines() {
        let conflict = Outcome::Conflict(ConflictError {
            expected: 0,
            actual: 1,
        });

        assert_eq!(
            "conflict detected (conflict error detected, expected version was: 0, found: 1)",
            conflict.to_string()
        );
        assert_eq!(
            "conflict persisted after 4 attempts",
            Outcome::ConflictExhausted { attempts: 4 }.to_string()
        );
        assert!(conflict.is_conflict());
        assert!(!conflict.is_committed());
    }

    #[test]
    fn callers_keep_their_configuration() {
        let caller = Caller::retrying("slow", RetryPolicy::new(1), |n: &mut u32| *n += 1)
            .with_think_time(Duration::from_millis(5));

        assert_eq!("slow", caller.name());
        assert_eq!(Mode::Retrying(RetryPolicy::new(1)), caller.mode());
        assert!(format!("{caller:?}").contains("think_time"));
    }
}
