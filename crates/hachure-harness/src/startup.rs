//! Startup orchestration shared by every scenario.
//!
//! Order: configuration, power (gate-level only), clock, reset (when asked).
//! Configuration is applied before the clock's first edge; reset is asserted
//! only once the clock runs.

use std::cell::Cell;

use hachure_sim::{JoinHandle, Signal, Sim};
use tracing::info;

use crate::{
    clock::start_clock, config::HarnessConfig, configure, error::HarnessError, pins,
    reset::reset, variant::CoreVariant,
};

/// Tracks whether the long-lived circuit still needs its full reset.
///
/// A batch of scenarios that share one circuit resets it only before the
/// first scenario; later ones reuse its state.
#[derive(Debug)]
pub struct StartupSession {
    needs_reset: Cell<bool>,
}

impl Default for StartupSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupSession {
    /// Fresh circuit: the first startup resets.
    pub const fn new() -> Self {
        Self { needs_reset: Cell::new(true) }
    }

    /// Circuit already out of reset.
    pub const fn resumed() -> Self {
        Self { needs_reset: Cell::new(false) }
    }

    /// Whether the next startup will reset.
    pub fn needs_reset(&self) -> bool {
        self.needs_reset.get()
    }

    /// Returns true exactly once for a fresh session.
    pub fn take_reset(&self) -> bool {
        self.needs_reset.replace(false)
    }
}

/// Drive the power rails on: `VDD` high, `VSS` low.
pub fn enable_power(vdd: &Signal, vss: &Signal) {
    vdd.set(1);
    vss.set(0);
    info!("power enabled");
}

/// Bring the circuit up with `variant` selected.
///
/// Every pin the sequence needs is resolved before anything is driven, so a
/// configuration error leaves the circuit untouched. Returns the clock task,
/// which belongs to the caller's scope.
pub async fn start_up(
    sim: &Sim,
    config: &HarnessConfig,
    variant: CoreVariant,
    from_reset: bool,
) -> Result<JoinHandle<()>, HarnessError> {
    let clk = pins::lookup(sim, pins::CLK)?;
    let rst = if from_reset { Some(pins::lookup(sim, pins::RST_N)?) } else { None };
    let rails = if config.gate_level {
        Some((pins::lookup(sim, pins::VDD)?, pins::lookup(sim, pins::VSS)?))
    } else {
        None
    };

    info!(family = %config.family, %variant, from_reset, "startup");
    configure::apply(sim, config.family, variant)?;
    sim.read_write().await;

    if let Some((vdd, vss)) = rails {
        enable_power(&vdd, &vss);
        sim.read_write().await;
    }

    let clock = start_clock(sim, &clk, config.clock_mhz);

    if let Some(rst) = rst {
        reset(sim, &rst, config.reset).await;
    }
    Ok(clock)
}
