//! 8N1 UART source and sink.
//!
//! The source owns one line and drives start, data (LSB first) and stop bits
//! for each queued write. The sink watches one line, samples every bit in the
//! middle of its window and queues received bytes.

use std::num::NonZeroU32;

use bytes::{BufMut, Bytes, BytesMut};
use hachure_sim::{JoinHandle, Logic, Signal, Sim, SimTime};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::HarnessError;

/// Data bits per character.
pub const DATA_BITS: u32 = 8;

const DEFAULT_BAUD: NonZeroU32 = match NonZeroU32::new(115_200) {
    Some(baud) => baud,
    None => NonZeroU32::MIN,
};

/// Line settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Bits per second.
    pub baud: NonZeroU32,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self { baud: DEFAULT_BAUD }
    }
}

impl UartConfig {
    /// Duration of one bit.
    pub fn bit_time(self) -> SimTime {
        SimTime::from_ps(1_000_000_000_000 / u64::from(self.baud.get()))
    }
}

type WriteRequest = (Bytes, oneshot::Sender<()>);

/// Transmitter driving one line.
#[derive(Debug)]
pub struct UartSource {
    requests: mpsc::UnboundedSender<WriteRequest>,
    task: JoinHandle<()>,
}

impl UartSource {
    /// Idle `line` high and start the transmitter.
    pub fn start(sim: &Sim, line: &Signal, config: UartConfig) -> Self {
        let (requests, mut queue) = mpsc::unbounded_channel::<WriteRequest>();
        let bit = config.bit_time();
        let timer = sim.clone();
        let tx = line.clone();
        tx.set(1);

        let task = sim.spawn(format!("uart:tx:{}", line.name()), async move {
            while let Some((data, done)) = queue.recv().await {
                for &byte in &data {
                    tx.set(0);
                    timer.timer(bit).await;
                    for i in 0..DATA_BITS {
                        tx.set(u64::from((byte >> i) & 1));
                        timer.timer(bit).await;
                    }
                    tx.set(1);
                    timer.timer(bit).await;
                    debug!(line = tx.name(), byte, "uart byte sent");
                }
                // The writer may have given up waiting.
                let _ = done.send(());
            }
        });
        Self { requests, task }
    }

    /// Transmit `data` and wait until its last stop bit has been driven.
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<(), HarnessError> {
        let (done, finished) = oneshot::channel();
        self.requests
            .send((data.into(), done))
            .map_err(|_| HarnessError::DeviceClosed { device: "uart source" })?;
        finished.await.map_err(|_| HarnessError::DeviceClosed { device: "uart source" })
    }

    /// Stop the transmitter; the line keeps its last level.
    pub fn stop(&self) {
        self.task.cancel();
    }
}

impl Drop for UartSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Receiver watching one line.
#[derive(Debug)]
pub struct UartSink {
    received: mpsc::UnboundedReceiver<u8>,
    task: JoinHandle<()>,
}

impl UartSink {
    /// Start sampling `line`.
    pub fn start(sim: &Sim, line: &Signal, config: UartConfig) -> Self {
        let (tx, received) = mpsc::unbounded_channel();
        let bit = config.bit_time();
        let half = SimTime::from_ps(bit.as_ps() / 2);
        let timer = sim.clone();
        let rx = line.clone();

        let task = sim.spawn(format!("uart:rx:{}", line.name()), async move {
            loop {
                rx.falling_edge().await;
                timer.timer(half).await;
                if rx.lsb() != Logic::Zero {
                    debug!(line = rx.name(), "start bit glitch ignored");
                    continue;
                }

                let mut byte = 0u8;
                for i in 0..DATA_BITS {
                    timer.timer(bit).await;
                    if rx.lsb() == Logic::One {
                        byte |= 1 << i;
                    }
                }

                timer.timer(bit).await;
                if rx.lsb() != Logic::One {
                    warn!(line = rx.name(), byte, "missing stop bit");
                }
                debug!(line = rx.name(), byte, "uart byte received");
                if tx.send(byte).is_err() {
                    return;
                }
            }
        });
        Self { received, task }
    }

    /// Wait until `n` bytes have been received and return them.
    pub async fn read(&mut self, n: usize) -> Result<Bytes, HarnessError> {
        let mut buf = BytesMut::with_capacity(n);
        while buf.len() < n {
            let byte = self
                .received
                .recv()
                .await
                .ok_or(HarnessError::DeviceClosed { device: "uart sink" })?;
            buf.put_u8(byte);
        }
        Ok(buf.freeze())
    }

    /// Stop sampling. Bytes already received stay readable.
    pub fn stop(&self) {
        self.task.cancel();
    }
}

impl Drop for UartSink {
    fn drop(&mut self) {
        self.stop();
    }
}
