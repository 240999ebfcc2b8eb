//! `versionlock` provides optimistic concurrency control over versioned
//! records shared by many concurrent writers.
//!
//! The building blocks are:
//! - a [`Store`][store::Store] contract with snapshot reads and an atomic
//!   commit-if-version-matches operation, with an [`InMemory`][inmemory::InMemory]
//!   implementation;
//! - a [`RetryHandler`][retry::RetryHandler] that re-applies a logical mutation
//!   on top of the freshest state when a conflict is detected;
//! - a [`ConflictSimulator`][simulator::ConflictSimulator] that races several
//!   callers against the same record through a one-shot [`StartBarrier`][barrier::StartBarrier].

#![deny(unsafe_code, trivial_casts)]
#![warn(missing_docs)]

pub mod barrier;
pub mod inmemory;
pub mod record;
pub mod report;
pub mod retry;
pub mod simulator;
pub mod store;
pub mod tracing;
pub mod version;

pub use self::inmemory::InMemory;
pub use self::record::Record;
pub use self::retry::{Backoff, RetryError, RetryHandler, RetryPolicy};
pub use self::simulator::{Caller, ConflictSimulator, Outcome, SimulationReport};
pub use self::store::{CommitError, ReadError, Store};
pub use self::version::{Check, ConflictError, Version};
