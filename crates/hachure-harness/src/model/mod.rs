//! Behavioural reference model of the SoC pin boundary.
//!
//! Stands in for the circuit so every scenario can run without an HDL
//! simulator. It declares the family's pinout, decodes which core the select
//! lines enable once reset is released, and runs one [`Program`] with
//! width-scaled step latency.
//!
//! # Lifecycle
//!
//! - While `rst_n` is low the outputs idle: pads tri-stated (or `gpo` at 0),
//!   SPI chip select high, `uart_tx` high.
//! - On release the core boots for [`BOOT_CYCLES`] cycles, then runs its
//!   program.
//! - Reset assertion or any select-line change aborts the program and starts
//!   over from the idle state.
//!
//! The model task is spawned in the caller's scope. Installed outside
//! [`Sim::run`](hachure_sim::Sim::run), it survives across runs the way a
//! long-lived circuit does.

mod memory;
mod program;

use hachure_sim::{JoinHandle, Logic, LogicVec, Signal, Sim, clock_cycles, first_edge};
pub use memory::{MEMORY_WORDS, Memory, PATTERN_OFFSETS, RAM_SEED, SRAM_SEED, XIP_IMAGE, pattern};
pub use program::{
    CHECK_FAILED, CHECK_PASSED, Program, SPI_HALF_PERIOD_CYCLES, SPI_TEST_BYTE, STEP_CYCLES,
    TOGGLE_STEPS,
};
use program::Core;
use tracing::{debug, info, warn};

use crate::{
    config::HarnessConfig,
    error::HarnessError,
    pins,
    variant::{CoreVariant, FamilyTable},
};

/// Clock cycles between reset release and the first program step.
pub const BOOT_CYCLES: u64 = 64;

/// Signals the model drives or watches.
#[derive(Debug)]
pub(crate) struct SocPins {
    clk: Signal,
    rst_n: Signal,
    selects: Vec<Signal>,
    spi_sck: Signal,
    spi_cs: Signal,
    spi_sdo: Signal,
    spi_sdi: Signal,
    uart_rx: Signal,
    uart_tx: Signal,
    output: Signal,
    tristate: bool,
}

impl SocPins {
    fn declare(
        sim: &Sim,
        table: &FamilyTable,
        config: &HarnessConfig,
    ) -> Result<Self, HarnessError> {
        for fixed in table.fixed {
            sim.declare(fixed.signal, 1)?;
        }
        let selects = table
            .selects
            .iter()
            .map(|select| sim.declare(select.name, select.width))
            .collect::<Result<Vec<_>, _>>()?;
        sim.declare(pins::VDD, 1)?;
        sim.declare(pins::VSS, 1)?;

        Ok(Self {
            clk: sim.declare(pins::CLK, 1)?,
            rst_n: sim.declare(pins::RST_N, 1)?,
            selects,
            spi_sck: sim.declare(pins::SPI_SCK, 1)?,
            spi_cs: sim.declare(pins::SPI_CS, 1)?,
            spi_sdo: sim.declare(pins::SPI_SDO, 1)?,
            spi_sdi: sim.declare(pins::SPI_SDI, 1)?,
            uart_rx: sim.declare(pins::UART_RX, 1)?,
            uart_tx: sim.declare(pins::UART_TX, 1)?,
            output: sim.declare(config.output_port(), pins::GPIO_WIDTH)?,
            tristate: config.tristate_output(),
        })
    }

    fn idle(&self) {
        let output = if self.tristate {
            LogicVec::high_z(pins::GPIO_WIDTH)
        } else {
            LogicVec::new(pins::GPIO_WIDTH, 0)
        };
        self.output.set_value(output);
        self.spi_cs.set(1);
        self.spi_sck.set(0);
        self.spi_sdo.set(0);
        self.uart_tx.set(1);
    }

    fn selected(&self, table: &FamilyTable) -> Option<CoreVariant> {
        table.decode(|name| {
            self.selects.iter().find(|s| s.name() == name).and_then(|s| s.value().to_u64())
        })
    }

    /// Resolves on reset or selection changing.
    async fn control_change(&self) {
        let mut watched = Vec::with_capacity(self.selects.len() + 1);
        watched.push(&self.rst_n);
        watched.extend(&self.selects);
        let index = first_edge(&watched).await;
        debug!(signal = watched[index].name(), "control line changed");
    }
}

/// Installed reference SoC. Dropping it removes the model from the circuit.
#[derive(Debug)]
pub struct SocModel {
    program: Program,
    task: JoinHandle<()>,
}

impl SocModel {
    /// Declare the pinout described by `config` on `sim` and start the model.
    ///
    /// Fails if any pin is already declared.
    pub fn install(
        sim: &Sim,
        config: &HarnessConfig,
        program: Program,
    ) -> Result<Self, HarnessError> {
        let table = config.family.table();
        let pins = SocPins::declare(sim, table, config)?;
        info!(family = %config.family, output = config.output_port(), %program, "soc installed");
        let task = sim.spawn("soc", run_soc(pins, table, sim.clone(), program));
        Ok(Self { program, task })
    }

    /// Program the model runs.
    pub fn program(&self) -> Program {
        self.program
    }

    /// Stop the model; pins keep their last values.
    pub fn stop(&self) {
        self.task.cancel();
    }
}

impl Drop for SocModel {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_soc(pins: SocPins, table: &'static FamilyTable, sim: Sim, program: Program) {
    loop {
        pins.idle();
        while pins.rst_n.lsb() != Logic::One {
            pins.rst_n.rising_edge().await;
        }

        let Some(variant) = pins.selected(table) else {
            warn!(family = %table.family, "no core selected");
            pins.control_change().await;
            continue;
        };
        info!(%variant, %program, "core released from reset");

        let core = Core { sim: &sim, pins: &pins, variant };
        let body = async {
            clock_cycles(&pins.clk, BOOT_CYCLES).await;
            program.run(&core).await;
            debug!(%program, "program finished");
            std::future::pending::<()>().await;
        };

        tokio::select! {
            biased;
            () = pins.control_change() => {},
            () = body => {},
        }
    }
}
