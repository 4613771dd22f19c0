//! SPI slave device model (CPOL=0, CPHA=0).
//!
//! Three observers run concurrently on the bus:
//!
//! - **capturer**: on each rising `sck` with `cs` low, samples `sdo` into the
//!   frame buffer
//! - **finalizer**: on each rising `cs`, folds a non-empty buffer MSB-first
//!   into a [`Frame`] and queues it
//! - **loopback**: after the first `sck` or `cs` change, waits a few system
//!   clock cycles and copies `sdo` onto `sdi`
//!
//! # Invariants
//!
//! - Only the capturer pushes to the frame buffer and only the finalizer
//!   drains it; both run on the kernel thread, so no lock is needed.
//! - A chip-select cycle with no captured bits produces no frame.
//! - Frames longer than 64 bits keep their last 64 bits.

use std::{cell::RefCell, fmt, rc::Rc};

use hachure_sim::{JoinHandle, Logic, Sim, clock_cycles, first_edge};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{config::DEFAULT_LOOPBACK_DELAY_CYCLES, error::HarnessError, pins::SpiPins};

/// One completed chip-select window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Number of bits captured.
    pub bits: usize,
    /// Bits folded MSB-first.
    pub value: u64,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits -> {:#X}", self.bits, self.value)
    }
}

/// Fold bits into an integer, first bit most significant.
pub fn fold_msb_first(bits: &[bool]) -> u64 {
    bits.iter().fold(0u64, |acc, bit| (acc << 1) | u64::from(*bit))
}

/// Bits of the in-flight frame.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    bits: Vec<bool>,
}

impl FrameBuffer {
    /// Append one sampled bit.
    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// No bits captured yet.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Complete the frame and clear the buffer; `None` if nothing was
    /// captured.
    pub fn take_frame(&mut self) -> Option<Frame> {
        if self.bits.is_empty() {
            return None;
        }
        let frame = Frame { bits: self.bits.len(), value: fold_msb_first(&self.bits) };
        self.bits.clear();
        Some(frame)
    }
}

/// Device options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    /// Echo `sdo` back on `sdi`.
    pub loopback: bool,
    /// System clock cycles between a bus edge and the echo.
    pub loopback_delay_cycles: u64,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self { loopback: true, loopback_delay_cycles: DEFAULT_LOOPBACK_DELAY_CYCLES }
    }
}

/// Running SPI slave. Dropping it stops every observer.
#[derive(Debug)]
pub struct SpiDevice {
    frames: mpsc::UnboundedReceiver<Frame>,
    tasks: Vec<JoinHandle<()>>,
}

impl SpiDevice {
    /// Start the observers in the caller's scope.
    pub fn start(sim: &Sim, pins: SpiPins, config: SpiConfig) -> Self {
        let buffer = Rc::new(RefCell::new(FrameBuffer::default()));
        let (tx, frames) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(3);

        let (sck, cs, sdo) = (pins.sck.clone(), pins.cs.clone(), pins.sdo.clone());
        let capture = Rc::clone(&buffer);
        tasks.push(sim.spawn("spi:capture", async move {
            loop {
                sck.rising_edge().await;
                if cs.lsb() != Logic::Zero {
                    continue;
                }
                let bit = match sdo.lsb() {
                    Logic::One => true,
                    Logic::Zero => false,
                    other => {
                        warn!(value = %other.to_char(), "unresolved sdo sampled as 0");
                        false
                    },
                };
                capture.borrow_mut().push(bit);
            }
        }));

        let cs = pins.cs.clone();
        let finalize = Rc::clone(&buffer);
        tasks.push(sim.spawn("spi:finalize", async move {
            loop {
                cs.rising_edge().await;
                let frame = finalize.borrow_mut().take_frame();
                let Some(frame) = frame else { continue };
                info!(bits = frame.bits, value = %format_args!("{:#X}", frame.value), "spi frame");
                if tx.send(frame).is_err() {
                    return;
                }
            }
        }));

        if config.loopback {
            let SpiPins { sck, cs, sdo, sdi, clk } = pins;
            let delay = config.loopback_delay_cycles;
            tasks.push(sim.spawn("spi:loopback", async move {
                loop {
                    first_edge(&[&sck, &cs]).await;
                    clock_cycles(&clk, delay).await;
                    sdi.set_value(sdo.value());
                }
            }));
        }

        Self { frames, tasks }
    }

    /// Wait for the next completed frame.
    pub async fn next_frame(&mut self) -> Result<Frame, HarnessError> {
        self.frames.recv().await.ok_or(HarnessError::DeviceClosed { device: "spi" })
    }

    /// Next frame if one is already queued.
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        self.frames.try_recv().ok()
    }

    /// Stop every observer. Frames already queued stay readable.
    pub fn stop(&self) {
        for task in &self.tasks {
            task.cancel();
        }
    }
}

impl Drop for SpiDevice {
    fn drop(&mut self) {
        self.stop();
    }
}
