//! What a scenario body sees: the simulation and the bench configuration.

use hachure_sim::{Signal, Sim, clock_cycles};

use crate::{
    config::HarnessConfig,
    error::HarnessError,
    pins::{self, SpiPins},
    spi::SpiConfig,
};

/// A circuit under test and the configuration it was brought up with.
#[derive(Debug, Clone)]
pub struct Bench {
    sim: Sim,
    config: HarnessConfig,
}

impl Bench {
    /// Bench over an already populated simulation.
    pub fn new(sim: Sim, config: HarnessConfig) -> Self {
        Self { sim, config }
    }

    /// Simulation handle.
    pub fn sim(&self) -> &Sim {
        &self.sim
    }

    /// Bench configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Mutable configuration, for per-scenario adjustments.
    pub fn config_mut(&mut self) -> &mut HarnessConfig {
        &mut self.config
    }

    /// Look up a signal by name.
    pub fn signal(&self, name: &str) -> Result<Signal, HarnessError> {
        pins::lookup(&self.sim, name)
    }

    /// The port scenarios read results from (`gpio` or `gpo`).
    pub fn output(&self) -> Result<Signal, HarnessError> {
        self.signal(self.config.output_port())
    }

    /// SPI pins plus system clock.
    pub fn spi_pins(&self) -> Result<SpiPins, HarnessError> {
        SpiPins::lookup(&self.sim)
    }

    /// SPI device options derived from the configuration.
    pub fn spi_config(&self) -> SpiConfig {
        SpiConfig { loopback: true, loopback_delay_cycles: self.config.loopback_delay_cycles }
    }

    /// Wait for `n` rising edges of the system clock.
    pub async fn cycles(&self, n: u64) -> Result<(), HarnessError> {
        let clk = self.signal(pins::CLK)?;
        clock_cycles(&clk, n).await;
        Ok(())
    }
}
