//! Signal names on the circuit boundary.

use hachure_sim::{Sim, Signal};

use crate::error::{ConfigError, HarnessError};

/// System clock.
pub const CLK: &str = "clk";
/// Active-low reset.
pub const RST_N: &str = "rst_n";
/// Power rail, gate-level only.
pub const VDD: &str = "VDD";
/// Ground rail, gate-level only.
pub const VSS: &str = "VSS";
/// SPI clock, driven by the chip.
pub const SPI_SCK: &str = "spi_sck";
/// SPI chip select, active low, driven by the chip.
pub const SPI_CS: &str = "spi_cs";
/// SPI data out of the chip.
pub const SPI_SDO: &str = "spi_sdo";
/// SPI data into the chip.
pub const SPI_SDI: &str = "spi_sdi";
/// UART line into the chip.
pub const UART_RX: &str = "uart_rx";
/// UART line out of the chip.
pub const UART_TX: &str = "uart_tx";
/// Tri-state pad bus of the full chip.
pub const GPIO: &str = "gpio";
/// Core output port when the pads are not modelled.
pub const GPO: &str = "gpo";

/// Width of the `gpio`/`gpo` buses.
pub const GPIO_WIDTH: u32 = 8;

/// Look up `name`, reporting an absent signal as a configuration error.
pub fn lookup(sim: &Sim, name: &str) -> Result<Signal, HarnessError> {
    sim.signal(name).map_err(ConfigError::from_lookup)
}

/// The four SPI lines plus the system clock the loopback driver counts.
#[derive(Debug, Clone)]
pub struct SpiPins {
    /// Bus clock.
    pub sck: Signal,
    /// Chip select, active low.
    pub cs: Signal,
    /// Master-out line sampled by the device.
    pub sdo: Signal,
    /// Master-in line driven by the loopback.
    pub sdi: Signal,
    /// System clock.
    pub clk: Signal,
}

impl SpiPins {
    /// Resolve the standard SPI pin names.
    pub fn lookup(sim: &Sim) -> Result<Self, HarnessError> {
        Ok(Self {
            sck: lookup(sim, SPI_SCK)?,
            cs: lookup(sim, SPI_CS)?,
            sdo: lookup(sim, SPI_SDO)?,
            sdi: lookup(sim, SPI_SDI)?,
            clk: lookup(sim, CLK)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_pin_is_config_error() {
        let sim = Sim::new();
        sim.declare(SPI_SCK, 1).expect("declare");
        let err = SpiPins::lookup(&sim).expect_err("incomplete pinout");
        assert_eq!(err, HarnessError::Config(ConfigError::MissingSignal { name: SPI_CS.into() }));
    }
}
