//! Bit toggle counter.

use std::{cell::Cell, rc::Rc};

use hachure_sim::{JoinHandle, Logic, Signal, Sim};

/// Counts changes of one bit of a signal, sampled on every rising clock edge.
///
/// `X` and `Z` read as `0`, so a pad leaving tri-state towards `1` counts as a
/// toggle while one settling at `0` does not.
#[derive(Debug)]
pub struct ToggleMonitor {
    count: Rc<Cell<u64>>,
    task: JoinHandle<()>,
}

fn sample(signal: &Signal, bit: u32) -> bool {
    signal.value().bit(bit) == Logic::One
}

impl ToggleMonitor {
    /// Start counting changes of `signal[bit]` on `clk` rising edges.
    pub fn start(sim: &Sim, clk: &Signal, signal: &Signal, bit: u32) -> Self {
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let (clk, signal) = (clk.clone(), signal.clone());

        let task = sim.spawn(format!("monitor:{}[{bit}]", signal.name()), async move {
            let mut last = sample(&signal, bit);
            loop {
                clk.rising_edge().await;
                let now = sample(&signal, bit);
                if now != last {
                    counter.set(counter.get() + 1);
                    last = now;
                }
            }
        });
        Self { count, task }
    }

    /// Toggles seen so far.
    pub fn count(&self) -> u64 {
        self.count.get()
    }

    /// Stop counting; [`Self::count`] is frozen from here on.
    pub fn stop(&self) {
        self.task.cancel();
    }
}

impl Drop for ToggleMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
