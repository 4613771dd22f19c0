//! Scenarios that talk to the firmware through a device model.

use std::num::NonZeroU32;

use async_trait::async_trait;
use bytes::Bytes;
use hachure_sim::SimTime;
use tracing::info;

use super::{Case, Scenario};
use crate::{
    bench::Bench,
    config::HarnessConfig,
    error::HarnessError,
    model::{Program, SPI_TEST_BYTE},
    monitor::ToggleMonitor,
    pins,
    spi::SpiDevice,
    uart::{UartConfig, UartSink, UartSource},
    variant::ChipFamily,
};

/// The SPI firmware sends one byte and expects it echoed.
#[derive(Debug, Clone, Copy)]
pub struct SpiEcho;

#[async_trait(?Send)]
impl Scenario for SpiEcho {
    fn name(&self) -> &'static str {
        "spi"
    }

    fn firmware(&self) -> &'static str {
        "firmware/test_spi/build/firmware.hex"
    }

    fn program(&self) -> Program {
        Program::SpiLoopback
    }

    async fn run(&self, bench: &Bench, case: Case) -> Result<(), HarnessError> {
        let mut device = SpiDevice::start(bench.sim(), bench.spi_pins()?, bench.spi_config());
        let frame = device.next_frame().await?;
        if frame.value != u64::from(SPI_TEST_BYTE) {
            return Err(HarnessError::assertion(
                "spi frame",
                format_args!("{SPI_TEST_BYTE:#X}"),
                format_args!("{:#X}", frame.value),
            ));
        }
        bench.cycles(case.cycles(10_000)).await
    }
}

/// The toggle firmware flips output bit 0 in a loop.
#[derive(Debug, Clone, Copy)]
pub struct Toggle;

/// Toggles the monitor must see within the budget, exclusive.
pub const MIN_TOGGLES: u64 = 10;

#[async_trait(?Send)]
impl Scenario for Toggle {
    fn name(&self) -> &'static str {
        "toggle"
    }

    fn firmware(&self) -> &'static str {
        "firmware/test_toggle/build/firmware.hex"
    }

    fn program(&self) -> Program {
        Program::Toggle
    }

    async fn run(&self, bench: &Bench, case: Case) -> Result<(), HarnessError> {
        let output = bench.output()?;

        // Pads stay tri-stated until the firmware enables them.
        if case.from_reset && bench.config().tristate_output() {
            let value = output.value();
            if !value.is_all_z() {
                return Err(HarnessError::assertion("gpio after reset", "all z", value));
            }
        }

        let clk = bench.signal(pins::CLK)?;
        let monitor = ToggleMonitor::start(bench.sim(), &clk, &output, 0);
        bench.cycles(case.cycles(15_000)).await?;
        monitor.stop();

        let toggles = monitor.count();
        info!(port = output.name(), toggles, "output bit 0 toggles");
        if toggles > MIN_TOGGLES {
            Ok(())
        } else {
            Err(HarnessError::assertion(
                "output bit 0 toggles",
                format_args!("> {MIN_TOGGLES}"),
                toggles,
            ))
        }
    }
}

/// The UART firmware echoes every received byte.
#[derive(Debug, Clone, Copy)]
pub struct UartEcho;

#[async_trait(?Send)]
impl Scenario for UartEcho {
    fn name(&self) -> &'static str {
        "uart"
    }

    fn firmware(&self) -> &'static str {
        "firmware/test_uart/build/firmware.hex"
    }

    fn program(&self) -> Program {
        Program::UartEcho
    }

    async fn run(&self, bench: &Bench, case: Case) -> Result<(), HarnessError> {
        let config = UartConfig::default();
        let source = UartSource::start(bench.sim(), &bench.signal(pins::UART_RX)?, config);
        let mut sink = UartSink::start(bench.sim(), &bench.signal(pins::UART_TX)?, config);

        bench.cycles(case.cycles(50_000)).await?;
        let sent = Bytes::from_static(b"C");
        source.write(sent.clone()).await?;
        bench.cycles(40_000).await?;

        let received = sink.read(sent.len()).await?;
        if received == sent {
            Ok(())
        } else {
            Err(HarnessError::assertion(
                "uart echo",
                format_args!("{sent:?}"),
                format_args!("{received:?}"),
            ))
        }
    }
}

const SIMPLE_CLOCK_MHZ: NonZeroU32 = match NonZeroU32::new(50) {
    Some(mhz) => mhz,
    None => NonZeroU32::MIN,
};

/// Globefish smoke test: bring the chip up and let it run.
#[derive(Debug, Clone, Copy)]
pub struct Simple;

#[async_trait(?Send)]
impl Scenario for Simple {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn firmware(&self) -> &'static str {
        "firmware/simple/build/simple.hex"
    }

    fn program(&self) -> Program {
        Program::Idle
    }

    fn families(&self) -> &'static [ChipFamily] {
        &[ChipFamily::Globefish]
    }

    fn adjust(&self, config: &mut HarnessConfig) {
        config.clock_mhz = SIMPLE_CLOCK_MHZ;
        config.reset.duration = SimTime::from_ns(1000);
    }

    async fn run(&self, bench: &Bench, _case: Case) -> Result<(), HarnessError> {
        bench.cycles(10_000).await?;
        info!("smoke run finished, inspect the traces");
        Ok(())
    }
}
