//! Awaitable simulation events.
//!
//! Every trigger is a future that registers a one-shot [`TriggerSlot`] with
//! the kernel the first time it is polled. The kernel fires the slot when the
//! event happens, which wakes whichever task is suspended on it. Dropping a
//! trigger before it fires unregisters it implicitly: the kernel only holds a
//! weak reference to the slot.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
    task::{Context, Poll, Waker},
};

use crate::{
    logic::{Logic, LogicVec},
    signal::Signal,
    sim::{Kernel, Phase},
    time::SimTime,
};

/// One-shot rendezvous between the kernel and a suspended future.
#[derive(Debug, Default)]
pub(crate) struct TriggerSlot {
    fired: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl TriggerSlot {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn fire(&self) {
        self.fired.set(true);
        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.fired.get()
    }

    fn register(&self, cx: &Context<'_>) {
        let mut slot = self.waker.borrow_mut();
        match slot.as_ref() {
            Some(existing) if existing.will_wake(cx.waker()) => {},
            _ => *slot = Some(cx.waker().clone()),
        }
    }
}

fn poll_slot(slot: Option<&Rc<TriggerSlot>>, cx: &Context<'_>) -> Poll<()> {
    match slot {
        Some(slot) if slot.is_fired() => Poll::Ready(()),
        Some(slot) => {
            slot.register(cx);
            Poll::Pending
        },
        None => Poll::Pending,
    }
}

/// Which value transitions wake an edge waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Any change of the value.
    Any,
    /// Bit 0 becomes `1` from anything else.
    Rising,
    /// Bit 0 becomes `0` from anything else.
    Falling,
}

impl EdgeKind {
    /// Whether the transition `old -> new` counts as this edge.
    pub fn matches(self, old: LogicVec, new: LogicVec) -> bool {
        if old == new {
            return false;
        }
        match self {
            Self::Any => true,
            Self::Rising => old.lsb() != Logic::One && new.lsb() == Logic::One,
            Self::Falling => old.lsb() != Logic::Zero && new.lsb() == Logic::Zero,
        }
    }
}

/// Resolves on the next matching change of one signal.
#[derive(Debug)]
#[must_use = "triggers do nothing unless awaited"]
pub struct EdgeFuture {
    signal: Signal,
    kind: EdgeKind,
    slot: Option<Rc<TriggerSlot>>,
}

impl EdgeFuture {
    pub(crate) fn new(signal: Signal, kind: EdgeKind) -> Self {
        Self { signal, kind, slot: None }
    }
}

impl Future for EdgeFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.slot.is_none() {
            let slot = TriggerSlot::new();
            this.signal.add_waiter(this.kind, &slot);
            this.slot = Some(slot);
        }
        poll_slot(this.slot.as_ref(), cx)
    }
}

/// Resolves with the index of the first of several signals to change.
///
/// If several signals change in the same delta cycle the lowest index wins.
#[derive(Debug)]
#[must_use = "triggers do nothing unless awaited"]
pub struct AnyEdge {
    signals: Vec<Signal>,
    slots: Vec<Rc<TriggerSlot>>,
}

/// Wait for the first change on any of `signals`.
pub fn first_edge(signals: &[&Signal]) -> AnyEdge {
    AnyEdge { signals: signals.iter().map(|s| (*s).clone()).collect(), slots: Vec::new() }
}

impl Future for AnyEdge {
    type Output = usize;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<usize> {
        let this = self.get_mut();
        if this.slots.is_empty() {
            this.slots = this
                .signals
                .iter()
                .map(|signal| {
                    let slot = TriggerSlot::new();
                    signal.add_waiter(EdgeKind::Any, &slot);
                    slot
                })
                .collect();
        }

        if let Some(index) = this.slots.iter().position(|slot| slot.is_fired()) {
            return Poll::Ready(index);
        }
        for slot in &this.slots {
            slot.register(cx);
        }
        Poll::Pending
    }
}

/// Resolves once a relative delay of simulated time has elapsed.
///
/// A zero delay resolves in a fresh evaluation step at the current time.
#[derive(Debug)]
#[must_use = "triggers do nothing unless awaited"]
pub struct Timer {
    kernel: Weak<Kernel>,
    delay: SimTime,
    slot: Option<Rc<TriggerSlot>>,
}

impl Timer {
    pub(crate) fn new(kernel: Weak<Kernel>, delay: SimTime) -> Self {
        Self { kernel, delay, slot: None }
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.slot.is_none() {
            let Some(kernel) = this.kernel.upgrade() else { return Poll::Pending };
            let slot = TriggerSlot::new();
            kernel.add_timer(this.delay, &slot);
            this.slot = Some(slot);
        }
        poll_slot(this.slot.as_ref(), cx)
    }
}

/// Resolves once every write of the current time step has been applied.
///
/// Writes issued after this resolves, and before time advances, are held
/// back until the next evaluation step.
#[derive(Debug)]
#[must_use = "triggers do nothing unless awaited"]
pub struct ReadOnly {
    kernel: Weak<Kernel>,
    slot: Option<Rc<TriggerSlot>>,
}

impl ReadOnly {
    pub(crate) fn new(kernel: Weak<Kernel>) -> Self {
        Self { kernel, slot: None }
    }
}

impl Future for ReadOnly {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.slot.is_none() {
            let Some(kernel) = this.kernel.upgrade() else { return Poll::Pending };
            if kernel.phase() == Phase::ReadOnly {
                return Poll::Ready(());
            }
            let slot = TriggerSlot::new();
            kernel.add_read_only(&slot);
            this.slot = Some(slot);
        }
        poll_slot(this.slot.as_ref(), cx)
    }
}

/// Resolves right after the writes of the current delta cycle are applied.
#[derive(Debug)]
#[must_use = "triggers do nothing unless awaited"]
pub struct ReadWrite {
    kernel: Weak<Kernel>,
    slot: Option<Rc<TriggerSlot>>,
}

impl ReadWrite {
    pub(crate) fn new(kernel: Weak<Kernel>) -> Self {
        Self { kernel, slot: None }
    }
}

impl Future for ReadWrite {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.slot.is_none() {
            let Some(kernel) = this.kernel.upgrade() else { return Poll::Pending };
            let slot = TriggerSlot::new();
            kernel.add_read_write(&slot);
            this.slot = Some(slot);
        }
        poll_slot(this.slot.as_ref(), cx)
    }
}

/// Wait for `cycles` rising edges of `clock`.
pub async fn clock_cycles(clock: &Signal, cycles: u64) {
    for _ in 0..cycles {
        clock.rising_edge().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_kinds() {
        let zero = LogicVec::new(1, 0);
        let one = LogicVec::new(1, 1);
        let x = LogicVec::unknown(1);

        assert!(EdgeKind::Rising.matches(zero, one));
        assert!(EdgeKind::Rising.matches(x, one));
        assert!(!EdgeKind::Rising.matches(one, zero));
        assert!(EdgeKind::Falling.matches(x, zero));
        assert!(!EdgeKind::Any.matches(one, one));
        assert!(EdgeKind::Any.matches(zero, x));
    }

    #[test]
    fn vector_edge_uses_bit_zero() {
        let a = LogicVec::new(4, 0b0010);
        let b = LogicVec::new(4, 0b0011);
        assert!(EdgeKind::Rising.matches(a, b));
        assert!(!EdgeKind::Rising.matches(b, LogicVec::new(4, 0b0111)));
        assert!(EdgeKind::Any.matches(b, LogicVec::new(4, 0b0111)));
    }
}
