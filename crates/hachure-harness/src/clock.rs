//! Free-running clock source.

use std::num::NonZeroU32;

use hachure_sim::{JoinHandle, Signal, Sim, SimTime};
use tracing::{debug, warn};

/// Start toggling `clock` at `mhz` with 50% duty, beginning high.
///
/// Runs until the returned handle is cancelled or the owning scope ends.
/// Each half-period lasts at least one picosecond, so time always advances.
pub fn start_clock(sim: &Sim, clock: &Signal, mhz: NonZeroU32) -> JoinHandle<()> {
    let period = SimTime::period_of_mhz(mhz);
    if period.as_ps() < 2 {
        warn!(signal = clock.name(), mhz = mhz.get(), "clock too fast, using a 2 ps period");
    }
    let high = SimTime::from_ps((period.as_ps() / 2).max(1));
    let low = SimTime::from_ps(period.as_ps().saturating_sub(high.as_ps()).max(1));
    debug!(signal = clock.name(), %period, "clock started");

    let timer = sim.clone();
    let clock = clock.clone();
    sim.spawn(format!("clock:{}", clock.name()), async move {
        loop {
            clock.set(1);
            timer.timer(high).await;
            clock.set(0);
            timer.timer(low).await;
        }
    })
}
