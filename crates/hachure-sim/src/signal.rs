//! Named signals on the simulated circuit boundary.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use tracing::trace;

use crate::{
    logic::{Logic, LogicVec},
    sim::Kernel,
    trigger::{EdgeFuture, EdgeKind, TriggerSlot},
};

struct EdgeWaiter {
    kind: EdgeKind,
    slot: Weak<TriggerSlot>,
}

pub(crate) struct SignalInner {
    name: String,
    width: u32,
    value: Cell<LogicVec>,
    waiters: RefCell<Vec<EdgeWaiter>>,
    kernel: Weak<Kernel>,
}

/// A handle to a declared signal. Clones refer to the same signal.
///
/// Reads return the value as of the last applied delta cycle. Writes are
/// scheduled and become visible once the current delta cycle ends.
#[derive(Clone)]
pub struct Signal(Rc<SignalInner>);

impl Signal {
    pub(crate) fn new(name: String, width: u32, kernel: Weak<Kernel>) -> Self {
        Self(Rc::new(SignalInner {
            name,
            width,
            value: Cell::new(LogicVec::unknown(width)),
            waiters: RefCell::new(Vec::new()),
            kernel,
        }))
    }

    /// Declared name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared width in bits.
    pub fn width(&self) -> u32 {
        self.0.width
    }

    /// Current value.
    pub fn value(&self) -> LogicVec {
        self.0.value.get()
    }

    /// Bit 0 of the current value.
    pub fn lsb(&self) -> Logic {
        self.value().lsb()
    }

    /// True if bit 0 is driven high.
    pub fn is_high(&self) -> bool {
        self.lsb() == Logic::One
    }

    /// Schedule an integer write; bits above the width are dropped.
    pub fn set(&self, value: u64) {
        self.set_value(LogicVec::new(self.0.width, value));
    }

    /// Schedule a single-bit write.
    pub fn set_bool(&self, value: bool) {
        self.set(u64::from(value));
    }

    /// Schedule a four-state write, resized to the signal width.
    pub fn set_value(&self, value: LogicVec) {
        let value = value.resized(self.0.width);
        match self.0.kernel.upgrade() {
            Some(kernel) => kernel.schedule_write(self, value),
            None => trace!(signal = %self.0.name, "write after simulation dropped"),
        }
    }

    /// Resolves on the next change of value.
    pub fn edge(&self) -> EdgeFuture {
        EdgeFuture::new(self.clone(), EdgeKind::Any)
    }

    /// Resolves when bit 0 next becomes `1`.
    pub fn rising_edge(&self) -> EdgeFuture {
        EdgeFuture::new(self.clone(), EdgeKind::Rising)
    }

    /// Resolves when bit 0 next becomes `0`.
    pub fn falling_edge(&self) -> EdgeFuture {
        EdgeFuture::new(self.clone(), EdgeKind::Falling)
    }

    /// Whether two handles refer to the same signal.
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn add_waiter(&self, kind: EdgeKind, slot: &Rc<TriggerSlot>) {
        let mut waiters = self.0.waiters.borrow_mut();
        // Triggers dropped before this signal changed leave dead entries.
        waiters.retain(|waiter| waiter.slot.strong_count() > 0);
        waiters.push(EdgeWaiter { kind, slot: Rc::downgrade(slot) });
    }

    /// Store `new` and fire matching waiters. Returns true if the value changed.
    pub(crate) fn apply(&self, new: LogicVec) -> bool {
        let old = self.0.value.replace(new);
        if old == new {
            return false;
        }
        trace!(signal = %self.0.name, %old, %new, "apply");

        let mut fired = Vec::new();
        self.0.waiters.borrow_mut().retain(|waiter| match waiter.slot.upgrade() {
            None => false,
            Some(slot) if waiter.kind.matches(old, new) => {
                fired.push(slot);
                false
            },
            Some(_) => true,
        });
        for slot in fired {
            slot.fire();
        }
        true
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.0.name)
            .field("width", &self.0.width)
            .field("value", &format_args!("{}", self.value()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Sim, SimTime, first_edge};

    #[test]
    fn abandoned_waiters_do_not_accumulate() {
        let sim = Sim::new();
        let quiet = sim.declare("quiet", 1).expect("declare");
        let busy = sim.declare("busy", 1).expect("declare");

        let s = sim.clone();
        let b = busy.clone();
        let _toggle = sim.spawn("toggle", async move {
            loop {
                b.set(1);
                s.timer(SimTime::from_ns(1)).await;
                b.set(0);
                s.timer(SimTime::from_ns(1)).await;
            }
        });

        let q = quiet.clone();
        let bb = busy.clone();
        sim.run(
            async move {
                for _ in 0..100 {
                    first_edge(&[&q, &bb]).await;
                }
            },
            SimTime::from_us(1),
        )
        .expect("run");

        assert!(quiet.0.waiters.borrow().len() <= 1);
        sim.shutdown();
    }
}
