//! The two races replayed by the simulator binary.

use chrono::Duration;
use versionlock::report::Reporter;
use versionlock::simulator::SimulationError;
use versionlock::{Caller, ConflictSimulator, RetryPolicy, SimulationReport, Store};

use crate::config::Config;
use crate::reservation::Reservation;

pub const RESERVATION_ID: u64 = 1;

const SLOW_WRITER: &str = "writer-1";
const FAST_WRITER: &str = "writer-2";

fn set_reason(reason: &'static str) -> impl Fn(&mut Reservation) + Send + Sync + 'static {
    move |reservation: &mut Reservation| reservation.set_reason(reason)
}

fn shift_one_hour(reservation: &mut Reservation) {
    reservation.shift(Duration::hours(1));
}

/// Two direct writers race on the reservation: the slow one updates the
/// reason, the fast one moves the interval. The loser's change is lost.
pub async fn without_retry<S, R>(
    store: S,
    reporter: R,
    config: &Config,
) -> Result<SimulationReport<u64, Reservation>, SimulationError>
where
    S: Store<u64, Reservation> + Clone + 'static,
    R: Reporter + Clone,
{
    let callers = vec![
        Caller::direct(SLOW_WRITER, set_reason("Updated by the first writer"))
            .with_think_time(config.slow_writer_think_time()),
        Caller::direct(FAST_WRITER, shift_one_hour)
            .with_think_time(config.fast_writer_think_time()),
    ];

    ConflictSimulator::new(store, reporter)
        .run(RESERVATION_ID, callers)
        .await
}

/// Same race, but both writers go through the retry handler, so the
/// loser re-applies its change on top of the winner's.
pub async fn with_retry<S, R>(
    store: S,
    reporter: R,
    config: &Config,
) -> Result<SimulationReport<u64, Reservation>, SimulationError>
where
    S: Store<u64, Reservation> + Clone + 'static,
    R: Reporter + Clone,
{
    let policy: RetryPolicy = config.retry_policy();

    let callers = vec![
        Caller::retrying(
            SLOW_WRITER,
            policy,
            set_reason("Updated by the first writer, with retry"),
        )
        .with_think_time(config.slow_retrying_writer_think_time()),
        Caller::retrying(FAST_WRITER, policy, shift_one_hour)
            .with_think_time(config.fast_writer_think_time()),
    ];

    ConflictSimulator::new(store, reporter)
        .run(RESERVATION_ID, callers)
        .await
}
