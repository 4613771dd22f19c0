//! Test scenarios.
//!
//! A scenario is the body that runs after the shared startup sequence: it
//! attaches whatever device models it needs, waits a cycle budget written for
//! the 1-bit core (scaled down for wider cores) and checks what the firmware
//! left on the pins.
//!
//! | name          | family    | check                                |
//! |---------------|-----------|--------------------------------------|
//! | `spi`         | Hachure   | SPI frame `0x1D`                     |
//! | `toggle`      | Hachure   | more than 10 toggles of output bit 0 |
//! | `sram`        | Hachure   | output `7` after the pattern check   |
//! | `sram_simple` | Globefish | output `5`                           |
//! | `uart`        | Hachure   | `C` echoed back                      |
//! | `xip`         | Hachure   | output `5`                           |
//! | `simple`      | Globefish | smoke test, no check                 |

mod output;
mod protocol;

use async_trait::async_trait;
pub use output::{OutputCheck, SRAM, SRAM_SIMPLE, XIP};
pub use protocol::{Simple, SpiEcho, Toggle, UartEcho};

use crate::{
    bench::Bench,
    config::HarnessConfig,
    error::{ConfigError, HarnessError},
    model::Program,
    variant::{ChipFamily, CoreVariant},
};

/// One variant's pass through a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Case {
    /// Selected core.
    pub variant: CoreVariant,
    /// The startup sequence reset the circuit for this case.
    pub from_reset: bool,
}

impl Case {
    /// Scale a cycle budget written for the 1-bit core to this case's core.
    pub const fn cycles(self, cycles: u64) -> u64 {
        self.variant.scale_cycles(cycles)
    }
}

/// A scenario body.
#[async_trait(?Send)]
pub trait Scenario {
    /// Name used on the command line.
    fn name(&self) -> &'static str;

    /// Firmware image, relative to the project root.
    fn firmware(&self) -> &'static str;

    /// Behaviour the reference model runs in place of the firmware.
    fn program(&self) -> Program;

    /// Families the firmware exists for.
    fn families(&self) -> &'static [ChipFamily] {
        &[ChipFamily::Hachure]
    }

    /// Per-scenario configuration overrides.
    fn adjust(&self, _config: &mut HarnessConfig) {}

    /// Scenario body, run after startup.
    async fn run(&self, bench: &Bench, case: Case) -> Result<(), HarnessError>;
}

/// Every scenario.
pub fn all() -> [&'static dyn Scenario; 7] {
    [&SpiEcho, &Toggle, &SRAM, &SRAM_SIMPLE, &UartEcho, &XIP, &Simple]
}

/// Look up a scenario by name.
pub fn find(name: &str) -> Result<&'static dyn Scenario, ConfigError> {
    all()
        .into_iter()
        .find(|scenario| scenario.name() == name)
        .ok_or_else(|| ConfigError::UnknownScenario { name: name.to_owned() })
}

/// Fail unless `scenario` has firmware for `family`.
pub fn ensure_supported(scenario: &dyn Scenario, family: ChipFamily) -> Result<(), ConfigError> {
    if scenario.families().contains(&family) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedScenario { scenario: scenario.name(), family })
    }
}
