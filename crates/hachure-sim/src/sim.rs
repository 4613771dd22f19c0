//! The discrete-event kernel and its public handle.
//!
//! One time step is evaluated as:
//!
//! 1. **Active**: poll every ready task.
//! 2. **Update**: apply the writes scheduled during the active pass (last
//!    write per signal wins), fire edge waiters and [`ReadWrite`] waiters.
//!    Go back to 1 while anything was applied or woken.
//! 3. **Read-only**: fire [`ReadOnly`] waiters and run what they wake. Writes
//!    issued here are deferred to the next evaluation step.
//!
//! Time then advances to the earliest pending [`Timer`].
//!
//! When the main future of a [`Sim::run`] completes, its scope is torn down,
//! writes still queued by torn-down tasks are discarded, and the remaining
//! writes are applied before `run` returns.
//!
//! # Invariants
//!
//! - Simulated time never decreases.
//! - A signal changes at most once per delta cycle.
//! - Tasks woken in the same delta observe the same pre-update values,
//!   whatever order they are polled in.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap, HashSet},
    future::Future,
    pin::pin,
    rc::{Rc, Weak},
    sync::{Arc, PoisonError},
    task::{Poll, Wake},
};

use tracing::{debug, trace};

use crate::{
    error::SimError,
    logic::LogicVec,
    signal::Signal,
    task::{
        CompletionGuard, JoinHandle, JoinSlot, MainTask, ReadyQueue, ScopeId, Task, TaskId,
        TaskWaker,
    },
    time::SimTime,
    trigger::{ReadOnly, ReadWrite, Timer, TriggerSlot},
};

/// Region of the current time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Active,
    ReadOnly,
}

/// A write waiting for the end of its delta cycle, tagged with its issuer.
struct ScheduledWrite {
    signal: Signal,
    value: LogicVec,
    scope: ScopeId,
    task: Option<TaskId>,
}

impl ScheduledWrite {
    fn from_torn_down(&self, scope: ScopeId, task: TaskId) -> bool {
        self.scope == scope && self.task != Some(task)
    }
}

fn merge_write(queue: &mut Vec<ScheduledWrite>, write: ScheduledWrite) {
    match queue.iter_mut().find(|w| w.signal.same_as(&write.signal)) {
        Some(entry) => *entry = write,
        None => queue.push(write),
    }
}

/// Shared kernel state. Owned through [`Sim`]; everything else holds weak
/// references.
pub(crate) struct Kernel {
    now: Cell<SimTime>,
    phase: Cell<Phase>,
    running: Cell<bool>,
    signals: RefCell<HashMap<String, Signal>>,
    pending: RefCell<Vec<ScheduledWrite>>,
    deferred: RefCell<Vec<ScheduledWrite>>,
    timers: RefCell<BTreeMap<(SimTime, u64), Weak<TriggerSlot>>>,
    timer_seq: Cell<u64>,
    read_write: RefCell<Vec<Weak<TriggerSlot>>>,
    read_only: RefCell<Vec<Weak<TriggerSlot>>>,
    tasks: RefCell<BTreeMap<TaskId, Task>>,
    ready: ReadyQueue,
    next_task: Cell<u64>,
    next_scope: Cell<u64>,
    current_task: Cell<Option<TaskId>>,
    current_scope: Cell<ScopeId>,
    cancelled: RefCell<HashSet<TaskId>>,
}

impl Kernel {
    fn new() -> Self {
        Self {
            now: Cell::new(SimTime::ZERO),
            phase: Cell::new(Phase::Active),
            running: Cell::new(false),
            signals: RefCell::new(HashMap::new()),
            pending: RefCell::new(Vec::new()),
            deferred: RefCell::new(Vec::new()),
            timers: RefCell::new(BTreeMap::new()),
            timer_seq: Cell::new(0),
            read_write: RefCell::new(Vec::new()),
            read_only: RefCell::new(Vec::new()),
            tasks: RefCell::new(BTreeMap::new()),
            ready: ReadyQueue::default(),
            next_task: Cell::new(0),
            next_scope: Cell::new(ScopeId::ROOT.0 + 1),
            current_task: Cell::new(None),
            current_scope: Cell::new(ScopeId::ROOT),
            cancelled: RefCell::new(HashSet::new()),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub(crate) fn schedule_write(&self, signal: &Signal, value: LogicVec) {
        let queue = match self.phase.get() {
            Phase::Active => &self.pending,
            Phase::ReadOnly => &self.deferred,
        };
        let write = ScheduledWrite {
            signal: signal.clone(),
            value,
            scope: self.current_scope.get(),
            task: self.current_task.get(),
        };
        merge_write(&mut queue.borrow_mut(), write);
    }

    pub(crate) fn add_timer(&self, delay: SimTime, slot: &Rc<TriggerSlot>) {
        let seq = self.timer_seq.get();
        self.timer_seq.set(seq.wrapping_add(1));
        let at = self.now.get().saturating_add(delay);
        self.timers.borrow_mut().insert((at, seq), Rc::downgrade(slot));
    }

    pub(crate) fn add_read_write(&self, slot: &Rc<TriggerSlot>) {
        self.read_write.borrow_mut().push(Rc::downgrade(slot));
    }

    pub(crate) fn add_read_only(&self, slot: &Rc<TriggerSlot>) {
        self.read_only.borrow_mut().push(Rc::downgrade(slot));
    }

    fn alloc_task_id(&self) -> TaskId {
        let id = self.next_task.get();
        self.next_task.set(id + 1);
        TaskId(id)
    }

    fn new_scope(&self) -> ScopeId {
        let id = self.next_scope.get();
        self.next_scope.set(id + 1);
        ScopeId(id)
    }

    fn enter(&self, task: TaskId, scope: ScopeId) -> (Option<TaskId>, ScopeId) {
        (self.current_task.replace(Some(task)), self.current_scope.replace(scope))
    }

    fn leave(&self, previous: (Option<TaskId>, ScopeId)) {
        self.current_task.set(previous.0);
        self.current_scope.set(previous.1);
    }

    fn pop_ready(&self) -> Option<TaskId> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    pub(crate) fn cancel(&self, id: TaskId) {
        if self.current_task.get() == Some(id) {
            self.cancelled.borrow_mut().insert(id);
            return;
        }
        let task = self.tasks.borrow_mut().remove(&id);
        if let Some(task) = task {
            debug!(task = %task.name, %id, "cancelled");
            drop(task);
        }
    }

    fn cancel_scope(&self, scope: ScopeId) {
        loop {
            let ids: Vec<TaskId> = self
                .tasks
                .borrow()
                .iter()
                .filter(|(_, task)| task.scope == scope)
                .map(|(id, _)| *id)
                .collect();
            if ids.is_empty() {
                break;
            }
            for id in ids {
                self.cancel(id);
            }
        }
    }

    fn poll_task(&self, id: TaskId) {
        let Some(mut task) = self.tasks.borrow_mut().remove(&id) else { return };

        let previous = self.enter(id, task.scope);
        let poll = task.poll();
        self.leave(previous);

        let cancelled = self.cancelled.borrow_mut().remove(&id);
        match poll {
            Poll::Ready(()) => trace!(task = %task.name, %id, "finished"),
            Poll::Pending if cancelled => debug!(task = %task.name, %id, "cancelled itself"),
            Poll::Pending => {
                self.tasks.borrow_mut().insert(id, task);
            },
        }
    }

    fn poll_main<T>(&self, main: &mut MainTask<'_, T>) -> Poll<T> {
        let previous = self.enter(main.id, main.scope);
        let poll = main.poll();
        self.leave(previous);
        poll
    }

    /// Poll ready tasks until the queue drains. Returns the main output if
    /// main completes.
    fn run_ready<T>(&self, main: &mut MainTask<'_, T>) -> Option<T> {
        while let Some(id) = self.pop_ready() {
            if id == main.id {
                if let Poll::Ready(output) = self.poll_main(main) {
                    return Some(output);
                }
            } else {
                self.poll_task(id);
            }
        }
        None
    }

    /// Apply one delta cycle of writes and release `ReadWrite` waiters.
    /// Returns true if anything happened that may have woken a task.
    fn update(&self) -> bool {
        let writes = std::mem::take(&mut *self.pending.borrow_mut());
        let mut progressed = !writes.is_empty();
        for write in writes {
            write.signal.apply(write.value);
        }

        let waiters = std::mem::take(&mut *self.read_write.borrow_mut());
        for slot in waiters.iter().filter_map(Weak::upgrade) {
            slot.fire();
            progressed = true;
        }
        progressed
    }

    /// Evaluate the current time step up to the end of its read-only region.
    fn evaluate_step<T>(&self, main: &mut MainTask<'_, T>) -> Option<T> {
        loop {
            if let Some(output) = self.run_ready(main) {
                return Some(output);
            }
            if !self.update() {
                break;
            }
        }

        self.phase.set(Phase::ReadOnly);
        let waiters = std::mem::take(&mut *self.read_only.borrow_mut());
        for slot in waiters.iter().filter_map(Weak::upgrade) {
            slot.fire();
        }
        let output = self.run_ready(main);
        self.phase.set(Phase::Active);
        output
    }

    /// Move to the next timer, or fail if none can fire within `limit`.
    fn advance_time(&self, limit: SimTime) -> Result<(), SimError> {
        let next = {
            let mut timers = self.timers.borrow_mut();
            loop {
                let Some((key, slot)) = timers.first_key_value() else { break None };
                if slot.strong_count() > 0 {
                    break Some(key.0);
                }
                timers.pop_first();
            }
        };

        let Some(at) = next else {
            // Deferred writes or late ReadWrite waiters start another step
            // at the same time.
            if self.promote_deferred() || !self.read_write.borrow().is_empty() {
                return Ok(());
            }
            return Err(SimError::Stalled { at: self.now.get() });
        };
        if at > limit {
            return Err(SimError::TimeLimitExceeded { limit });
        }

        let due = {
            let mut timers = self.timers.borrow_mut();
            let later = timers.split_off(&(at, u64::MAX));
            std::mem::replace(&mut *timers, later)
        };
        if at != self.now.get() {
            trace!(from = %self.now.get(), to = %at, "advance");
        }
        self.now.set(at);
        self.promote_deferred();
        for slot in due.values().filter_map(Weak::upgrade) {
            slot.fire();
        }
        Ok(())
    }

    fn promote_deferred(&self) -> bool {
        let deferred = std::mem::take(&mut *self.deferred.borrow_mut());
        if deferred.is_empty() {
            return false;
        }
        let mut pending = self.pending.borrow_mut();
        for write in deferred {
            merge_write(&mut pending, write);
        }
        true
    }

    /// Forget writes queued by tasks of `scope` other than `main`.
    fn discard_writes(&self, scope: ScopeId, main: TaskId) {
        for queue in [&self.pending, &self.deferred] {
            queue.borrow_mut().retain(|write| !write.from_torn_down(scope, main));
        }
    }

    /// Run delta cycles at the current time until nothing is left to apply
    /// or wake. Never advances time and leaves the read-only region alone.
    fn flush(&self) {
        loop {
            while let Some(id) = self.pop_ready() {
                self.poll_task(id);
            }
            if !self.update() {
                break;
            }
        }
    }
}

/// Handle to a simulation. Clones share the same kernel.
///
/// Tasks that capture a `Sim` clone keep the kernel alive; call
/// [`Sim::shutdown`] when done to drop them.
#[derive(Clone)]
pub struct Sim {
    kernel: Rc<Kernel>,
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sim")
            .field("now", &self.kernel.now.get())
            .field("signals", &self.kernel.signals.borrow().len())
            .field("tasks", &self.kernel.tasks.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Sim {
    /// Empty simulation at time zero.
    pub fn new() -> Self {
        Self { kernel: Rc::new(Kernel::new()) }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.kernel.now.get()
    }

    /// Declare a new signal, initially all `x`.
    pub fn declare(&self, name: &str, width: u32) -> Result<Signal, SimError> {
        let mut signals = self.kernel.signals.borrow_mut();
        if signals.contains_key(name) {
            return Err(SimError::DuplicateSignal { name: name.to_owned() });
        }
        let signal = Signal::new(name.to_owned(), width, Rc::downgrade(&self.kernel));
        signals.insert(name.to_owned(), signal.clone());
        Ok(signal)
    }

    /// Look up a declared signal.
    pub fn signal(&self, name: &str) -> Result<Signal, SimError> {
        self.kernel
            .signals
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::UnknownSignal { name: name.to_owned() })
    }

    /// Start `future` as a background task in the caller's scope.
    ///
    /// The task is first polled in the current (or next) evaluation step.
    pub fn spawn<T, F>(&self, name: impl Into<String>, future: F) -> JoinHandle<T>
    where
        T: 'static,
        F: Future<Output = T> + 'static,
    {
        let name = name.into();
        let kernel = &self.kernel;
        let id = kernel.alloc_task_id();
        let scope = kernel.current_scope.get();

        let slot = JoinSlot::new(name.clone());
        let guard = CompletionGuard::new(Rc::clone(&slot));
        let body = async move {
            let value = future.await;
            guard.finish(value);
        };

        let waker = TaskWaker::new(id, Arc::clone(&kernel.ready));
        debug!(task = %name, %id, scope = scope.0, "spawn");
        let task = Task::new(name, scope, Box::pin(body), Arc::clone(&waker));
        kernel.tasks.borrow_mut().insert(id, task);
        waker.wake_by_ref();

        JoinHandle::new(id, Rc::downgrade(kernel), slot)
    }

    /// Trigger resolving after `delay`.
    pub fn timer(&self, delay: SimTime) -> Timer {
        Timer::new(Rc::downgrade(&self.kernel), delay)
    }

    /// Settle barrier for the current time step.
    pub fn read_only(&self) -> ReadOnly {
        ReadOnly::new(Rc::downgrade(&self.kernel))
    }

    /// Trigger resolving after the current delta's writes are applied.
    pub fn read_write(&self) -> ReadWrite {
        ReadWrite::new(Rc::downgrade(&self.kernel))
    }

    /// Number of live background tasks.
    pub fn task_count(&self) -> usize {
        self.kernel.tasks.borrow().len()
    }

    /// Drive the simulation until `main` completes.
    ///
    /// `main` runs in a fresh scope: every task it (transitively) spawns is
    /// cancelled when `run` returns, whatever the outcome. Fails with
    /// [`SimError::TimeLimitExceeded`] if `main` has not finished once
    /// `budget` of simulated time has elapsed, and with
    /// [`SimError::Stalled`] if no event is left that could wake it.
    pub fn run<F: Future>(&self, main: F, budget: SimTime) -> Result<F::Output, SimError> {
        let kernel = &self.kernel;
        if kernel.running.replace(true) {
            return Err(SimError::Reentrant);
        }

        let limit = kernel.now.get().saturating_add(budget);
        let scope = kernel.new_scope();
        let id = kernel.alloc_task_id();
        debug!(scope = scope.0, %limit, "run");

        let outcome = {
            let future = pin!(main);
            let mut main =
                MainTask::new(id, scope, future, TaskWaker::new(id, Arc::clone(&kernel.ready)));
            main.schedule();
            loop {
                if let Some(output) = kernel.evaluate_step(&mut main) {
                    break Ok(output);
                }
                if let Err(err) = kernel.advance_time(limit) {
                    break Err(err);
                }
            }
        };

        kernel.cancel_scope(scope);
        kernel.cancelled.borrow_mut().clear();
        kernel.discard_writes(scope, id);
        kernel.flush();
        kernel.running.set(false);
        debug!(scope = scope.0, now = %kernel.now.get(), ok = outcome.is_ok(), "run finished");
        outcome
    }

    /// Evaluate the current time step through its read-only region without
    /// advancing time.
    pub fn settle(&self) -> Result<(), SimError> {
        self.run(self.read_only(), SimTime::ZERO)
    }

    /// Drop every task, including root-scope ones.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.kernel.tasks.borrow_mut());
        debug!(tasks = tasks.len(), "shutdown");
        drop(tasks);
        self.kernel.ready.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
