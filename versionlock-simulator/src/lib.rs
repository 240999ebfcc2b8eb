//! Replays the reservation conflict scenarios on top of `versionlock`.

pub mod config;
pub mod reservation;
pub mod scenario;

use anyhow::Context;
use versionlock::report::LogReporter;
use versionlock::tracing::StoreExt;
use versionlock::{InMemory, SimulationReport};

use crate::config::Config;
use crate::reservation::Reservation;
use crate::scenario::RESERVATION_ID;

/// Seeds the store and runs both scenarios, without and with retries.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = InMemory::<u64, Reservation>::default();
    let simulator_store = store.clone().with_tracing();

    let tomorrow = chrono::Local::now()
        .date_naive()
        .succ_opt()
        .context("failed to compute tomorrow's date")?;
    let seed = reservation::team_meeting(tomorrow).context("failed to build seed reservation")?;

    store.reset(RESERVATION_ID, seed.clone());
    log::info!("seed data stored");

    log::info!("=== Conflict simulation without retry ===");
    let report = scenario::without_retry(simulator_store.clone(), LogReporter, &config)
        .await
        .context("simulation without retry failed")?;
    print_final_state(&report);

    store.reset(RESERVATION_ID, seed);
    log::info!("seed data stored");

    log::info!("=== Conflict simulation with retry ===");
    let report = scenario::with_retry(simulator_store, LogReporter, &config)
        .await
        .context("simulation with retry failed")?;
    print_final_state(&report);

    Ok(())
}

fn print_final_state(report: &SimulationReport<u64, Reservation>) {
    let reservation = report.final_record.payload();

    log::info!("=== Final state ===");
    log::info!("reason: {}", reservation.reason());
    log::info!("start: {}", reservation.start());
    log::info!("end: {}", reservation.end());
    log::info!("version: {}", report.final_record.version());
}
