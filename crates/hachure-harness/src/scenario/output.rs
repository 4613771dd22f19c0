//! Scenarios that let the firmware run and then read its verdict off the
//! output port.

use async_trait::async_trait;
use tracing::info;

use super::{Case, Scenario};
use crate::{
    bench::Bench,
    error::{HarnessError, ensure_eq},
    model::{CHECK_PASSED, Program},
    variant::ChipFamily,
};

/// Wait a scaled cycle budget, then expect a value on the output port.
#[derive(Debug)]
pub struct OutputCheck {
    name: &'static str,
    firmware: &'static str,
    program: Program,
    families: &'static [ChipFamily],
    cycles: u64,
    expected: u64,
}

/// Pattern check of both memories; bits 0..=2 of the output all set.
pub static SRAM: OutputCheck = OutputCheck {
    name: "sram",
    firmware: "firmware/test_sram/build/firmware.hex",
    program: Program::SramCheck,
    families: &[ChipFamily::Hachure],
    cycles: 300_000,
    expected: 7,
};

/// Known words written and read back on Globefish.
pub static SRAM_SIMPLE: OutputCheck = OutputCheck {
    name: "sram_simple",
    firmware: "firmware/test_sram_simple/build/firmware.hex",
    program: Program::SramSimple,
    families: &[ChipFamily::Globefish],
    cycles: 30_000,
    expected: CHECK_PASSED,
};

/// Known words read from the execute-in-place flash.
pub static XIP: OutputCheck = OutputCheck {
    name: "xip",
    firmware: "firmware/test_xip/build/firmware.hex",
    program: Program::Xip,
    families: &[ChipFamily::Hachure],
    cycles: 30_000,
    expected: CHECK_PASSED,
};

#[async_trait(?Send)]
impl Scenario for OutputCheck {
    fn name(&self) -> &'static str {
        self.name
    }

    fn firmware(&self) -> &'static str {
        self.firmware
    }

    fn program(&self) -> Program {
        self.program
    }

    fn families(&self) -> &'static [ChipFamily] {
        self.families
    }

    async fn run(&self, bench: &Bench, case: Case) -> Result<(), HarnessError> {
        let output = bench.output()?;
        bench.cycles(case.cycles(self.cycles)).await?;

        let value = output.value();
        info!(scenario = self.name, port = output.name(), %value, "output after budget");
        let observed = value
            .to_u64()
            .ok_or_else(|| HarnessError::assertion(output.name(), self.expected, value))?;
        ensure_eq(output.name(), self.expected, observed)
    }
}
