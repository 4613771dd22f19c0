//! Firmware behaviours of the reference SoC.
//!
//! Each behaviour reproduces what one test firmware does at the pins, with
//! every bus access costing one core step. A step takes fewer clock cycles on
//! wider cores, which is what lets scenarios scale their cycle budgets.

use std::{fmt, str::FromStr};

use hachure_sim::{Logic, Sim, clock_cycles};
use tracing::{debug, info};

use super::{
    SocPins,
    memory::{MEMORY_WORDS, Memory, PATTERN_OFFSETS, RAM_SEED, SRAM_SEED, XIP_IMAGE, pattern},
};
use crate::{
    error::ConfigError,
    uart::{UartConfig, UartSink, UartSource},
    variant::CoreVariant,
};

/// Clock cycles per step on the 1-bit core.
pub const STEP_CYCLES: u64 = 12;

/// Clock cycles per SPI half bit.
pub const SPI_HALF_PERIOD_CYCLES: u64 = 4;

/// Byte the SPI firmware sends and expects echoed.
pub const SPI_TEST_BYTE: u8 = 0x1D;

/// Steps between GPIO[0] toggles.
pub const TOGGLE_STEPS: u64 = 50;

/// Words written and read back by the simple SRAM check, per memory.
const SRAM_SIMPLE_WORDS: [(u32, u32); 5] = [
    (10, 0xFF00_FF00),
    (511, 0xA523_AAAD),
    (512, 0xCAFE_CAFE),
    (1023, 0x1234_5678),
    (1024, 0x871A_2192),
];
const RAM_SIMPLE_WORDS: [(u32, u32); 5] = [
    (10, 0x8127_122D),
    (511, 0x2389_13DE),
    (512, 0xDEED_AADE),
    (1023, 0x2372_3721),
    (1024, 0xABCD_1234),
];

/// Output value of a successful memory or flash check.
pub const CHECK_PASSED: u64 = 5;

/// Output value of a failed memory or flash check.
pub const CHECK_FAILED: u64 = 4;

/// Firmware behaviour run after reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Program {
    /// Do nothing.
    #[default]
    Idle,
    /// Send [`SPI_TEST_BYTE`] as master; output 1 if it is echoed, else 2.
    SpiLoopback,
    /// Toggle output bit 0 forever.
    Toggle,
    /// Pattern-check both memories; outputs 1, 2, 3, 7, 15, then the result.
    SramCheck,
    /// Write and verify known words; outputs 5 on success, 4 on failure.
    SramSimple,
    /// Echo every byte received on `uart_rx` back on `uart_tx`.
    UartEcho,
    /// Read known words from the flash image; outputs 5 or 4.
    Xip,
}

impl Program {
    /// Every behaviour.
    pub const ALL: [Self; 7] = [
        Self::Idle,
        Self::SpiLoopback,
        Self::Toggle,
        Self::SramCheck,
        Self::SramSimple,
        Self::UartEcho,
        Self::Xip,
    ];

    /// Short name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SpiLoopback => "spi",
            Self::Toggle => "toggle",
            Self::SramCheck => "sram",
            Self::SramSimple => "sram_simple",
            Self::UartEcho => "uart",
            Self::Xip => "xip",
        }
    }

    pub(crate) async fn run(self, core: &Core<'_>) {
        match self {
            Self::Idle => {},
            Self::SpiLoopback => spi_loopback(core).await,
            Self::Toggle => toggle(core).await,
            Self::SramCheck => sram_check(core).await,
            Self::SramSimple => sram_simple(core).await,
            Self::UartEcho => uart_echo(core).await,
            Self::Xip => xip(core).await,
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Program {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|program| program.name() == s)
            .ok_or_else(|| ConfigError::InvalidSetting { key: "program", value: s.to_owned() })
    }
}

/// A core released from reset.
pub(crate) struct Core<'a> {
    pub(crate) sim: &'a Sim,
    pub(crate) pins: &'a SocPins,
    pub(crate) variant: CoreVariant,
}

impl Core<'_> {
    fn step_cycles(&self) -> u64 {
        (STEP_CYCLES / self.variant.cycle_divisor()).max(1)
    }

    async fn steps(&self, n: u64) {
        clock_cycles(&self.pins.clk, n * self.step_cycles()).await;
    }

    async fn cycles(&self, n: u64) {
        clock_cycles(&self.pins.clk, n).await;
    }

    async fn output(&self, value: u64) {
        self.steps(1).await;
        self.pins.output.set(value);
    }

    async fn store(&self, memory: &mut Memory, offset: u32, word: u32) {
        self.steps(1).await;
        memory.write(offset, word);
    }

    async fn load(&self, memory: &Memory, offset: u32) -> u32 {
        self.steps(1).await;
        memory.read(offset)
    }

    /// One full-duplex byte, MSB first, with automatic chip select.
    async fn spi_transfer(&self, byte: u8) -> u8 {
        let pins = self.pins;
        let mut received = 0u8;
        pins.spi_cs.set(0);
        for i in (0..8).rev() {
            pins.spi_sdo.set(u64::from((byte >> i) & 1));
            self.cycles(SPI_HALF_PERIOD_CYCLES).await;
            pins.spi_sck.set(1);
            received = (received << 1) | u8::from(pins.spi_sdi.lsb() == Logic::One);
            self.cycles(SPI_HALF_PERIOD_CYCLES).await;
            pins.spi_sck.set(0);
        }
        pins.spi_cs.set(1);
        received
    }
}

async fn spi_loopback(core: &Core<'_>) {
    core.output(0).await;
    let echo = core.spi_transfer(SPI_TEST_BYTE).await;
    info!(sent = SPI_TEST_BYTE, echo, "spi master transfer done");
    core.output(if echo == SPI_TEST_BYTE { 1 } else { 2 }).await;
}

async fn toggle(core: &Core<'_>) {
    let mut level = 0;
    core.output(level).await;
    loop {
        core.steps(TOGGLE_STEPS).await;
        level ^= 1;
        core.pins.output.set(level);
    }
}

async fn sram_check(core: &Core<'_>) {
    let mut sram = Memory::new(MEMORY_WORDS);
    let mut ram = Memory::new(MEMORY_WORDS);

    core.output(1).await;
    for (memory, seed) in [(&mut sram, SRAM_SEED), (&mut ram, RAM_SEED)] {
        for offset in PATTERN_OFFSETS {
            core.store(memory, offset, pattern(offset, seed)).await;
        }
    }

    core.output(2).await;
    let mut result = 1;
    for (memory, seed, flag) in [(&sram, SRAM_SEED, 1 << 1), (&ram, RAM_SEED, 1 << 2)] {
        let mut correct = true;
        for offset in PATTERN_OFFSETS {
            if core.load(memory, offset).await != pattern(offset, seed) {
                correct = false;
                break;
            }
        }
        if correct {
            result |= flag;
        }
    }

    for marker in [3, 7, 15] {
        core.output(marker).await;
    }
    debug!(result, "sram pattern check done");
    core.output(result).await;
}

async fn sram_simple(core: &Core<'_>) {
    let mut sram = Memory::new(MEMORY_WORDS);
    let mut ram = Memory::new(MEMORY_WORDS);

    core.output(0).await;
    for (memory, words) in [(&mut sram, &SRAM_SIMPLE_WORDS), (&mut ram, &RAM_SIMPLE_WORDS)] {
        for &(offset, word) in words {
            core.store(memory, offset, word).await;
        }
    }
    let checks: [(&Memory, &[(u32, u32)]); 2] =
        [(&sram, &SRAM_SIMPLE_WORDS), (&ram, &RAM_SIMPLE_WORDS)];
    let verdict = verify(core, &checks).await;
    core.output(verdict).await;
}

async fn xip(core: &Core<'_>) {
    let flash = Memory::with_image(MEMORY_WORDS, &XIP_IMAGE);
    core.output(0).await;
    let verdict = verify(core, &[(&flash, &XIP_IMAGE[..])]).await;
    core.output(verdict).await;
}

/// Read back every expected word; [`CHECK_FAILED`] on the first mismatch.
async fn verify(core: &Core<'_>, checks: &[(&Memory, &[(u32, u32)])]) -> u64 {
    for (memory, words) in checks {
        for &(offset, word) in *words {
            let read = core.load(memory, offset).await;
            if read != word {
                debug!(offset, expected = word, read, "memory mismatch");
                return CHECK_FAILED;
            }
        }
    }
    CHECK_PASSED
}

async fn uart_echo(core: &Core<'_>) {
    let config = UartConfig::default();
    let mut rx = UartSink::start(core.sim, &core.pins.uart_rx, config);
    let tx = UartSource::start(core.sim, &core.pins.uart_tx, config);
    loop {
        let Ok(byte) = rx.read(1).await else { return };
        core.steps(1).await;
        if tx.write(byte).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for program in Program::ALL {
            assert_eq!(program.name().parse::<Program>(), Ok(program));
        }
        assert!("blink".parse::<Program>().is_err());
    }
}
