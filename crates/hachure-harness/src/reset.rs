//! Reset sequencing.

use hachure_sim::{Signal, Sim};
use tracing::info;

use crate::config::ResetConfig;

/// Assert `signal`, hold it for the configured duration, then deassert.
///
/// Suspends only the caller; the clock and device models keep running.
pub async fn reset(sim: &Sim, signal: &Signal, config: ResetConfig) {
    info!(signal = signal.name(), duration = %config.duration, "reset asserted");
    signal.set_bool(config.asserted_level());
    sim.timer(config.duration).await;
    signal.set_bool(!config.asserted_level());
    info!(signal = signal.name(), "reset deasserted");
}
