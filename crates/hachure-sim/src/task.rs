//! Cooperative tasks and their handles.
//!
//! Tasks are plain `!Send` futures owned by the kernel. Waking a task pushes
//! its id onto the kernel's ready queue; the queue sits behind an
//! `Arc<Mutex<_>>` only because [`std::task::Wake`] demands `Send + Sync`.
//! The simulation itself never leaves its thread.
//!
//! # Invariants
//!
//! - A task id is on the ready queue at most once between polls.
//! - A cancelled task is dropped before it can be polled again.

use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll, Wake, Waker},
};

use crate::{error::SimError, sim::Kernel};

/// Identifier of a spawned task, unique for the lifetime of a [`crate::Sim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Group of tasks torn down together at the end of a `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ScopeId(pub(crate) u64);

impl ScopeId {
    /// Tasks spawned outside any `run` live here and are never torn down
    /// implicitly.
    pub(crate) const ROOT: Self = Self(0);
}

pub(crate) type ReadyQueue = Arc<Mutex<VecDeque<TaskId>>>;

pub(crate) struct TaskWaker {
    id: TaskId,
    scheduled: AtomicBool,
    ready: ReadyQueue,
}

impl TaskWaker {
    pub(crate) fn new(id: TaskId, ready: ReadyQueue) -> Arc<Self> {
        Arc::new(Self { id, scheduled: AtomicBool::new(false), ready })
    }

    /// Called right before polling so wakes during the poll re-queue the task.
    pub(crate) fn clear(&self) {
        self.scheduled.store(false, Ordering::Relaxed);
    }
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if !self.scheduled.swap(true, Ordering::Relaxed) {
            self.ready.lock().unwrap_or_else(PoisonError::into_inner).push_back(self.id);
        }
    }
}

pub(crate) struct Task {
    pub(crate) name: String,
    pub(crate) scope: ScopeId,
    future: Pin<Box<dyn Future<Output = ()>>>,
    waker: Arc<TaskWaker>,
}

impl Task {
    pub(crate) fn new(
        name: String,
        scope: ScopeId,
        future: Pin<Box<dyn Future<Output = ()>>>,
        waker: Arc<TaskWaker>,
    ) -> Self {
        Self { name, scope, future, waker }
    }

    pub(crate) fn poll(&mut self) -> Poll<()> {
        self.waker.clear();
        let waker = Waker::from(Arc::clone(&self.waker));
        self.future.as_mut().poll(&mut Context::from_waker(&waker))
    }
}

/// The future handed to `Sim::run`, polled inline rather than boxed.
pub(crate) struct MainTask<'a, T> {
    pub(crate) id: TaskId,
    pub(crate) scope: ScopeId,
    future: Pin<&'a mut (dyn Future<Output = T> + 'a)>,
    waker: Arc<TaskWaker>,
}

impl<'a, T> MainTask<'a, T> {
    pub(crate) fn new(
        id: TaskId,
        scope: ScopeId,
        future: Pin<&'a mut (dyn Future<Output = T> + 'a)>,
        waker: Arc<TaskWaker>,
    ) -> Self {
        Self { id, scope, future, waker }
    }

    pub(crate) fn schedule(&self) {
        self.waker.wake_by_ref();
    }

    pub(crate) fn poll(&mut self) -> Poll<T> {
        self.waker.clear();
        let waker = Waker::from(Arc::clone(&self.waker));
        self.future.as_mut().poll(&mut Context::from_waker(&waker))
    }
}

enum JoinState<T> {
    Running,
    Finished(T),
    Taken,
    Cancelled,
}

/// Shared completion cell between a task body and its [`JoinHandle`].
pub(crate) struct JoinSlot<T> {
    name: String,
    state: RefCell<JoinState<T>>,
    joiner: RefCell<Option<Waker>>,
}

impl<T> JoinSlot<T> {
    pub(crate) fn new(name: String) -> Rc<Self> {
        Rc::new(Self { name, state: RefCell::new(JoinState::Running), joiner: RefCell::new(None) })
    }

    fn settle(&self, state: JoinState<T>) {
        *self.state.borrow_mut() = state;
        let joiner = self.joiner.borrow_mut().take();
        if let Some(joiner) = joiner {
            joiner.wake();
        }
    }
}

/// Lives inside the task future; marks the slot cancelled if the future is
/// dropped before finishing.
pub(crate) struct CompletionGuard<T> {
    slot: Rc<JoinSlot<T>>,
}

impl<T> CompletionGuard<T> {
    pub(crate) fn new(slot: Rc<JoinSlot<T>>) -> Self {
        Self { slot }
    }

    pub(crate) fn finish(self, value: T) {
        self.slot.settle(JoinState::Finished(value));
    }
}

impl<T> Drop for CompletionGuard<T> {
    fn drop(&mut self) {
        let running = matches!(*self.slot.state.borrow(), JoinState::Running);
        if running {
            self.slot.settle(JoinState::Cancelled);
        }
    }
}

/// Owner's handle to a spawned task.
///
/// Awaiting the handle yields the task's output, or
/// [`SimError::Cancelled`] if the task was cancelled first. Dropping the
/// handle detaches the task; it keeps running.
#[must_use = "dropping a JoinHandle detaches the task"]
pub struct JoinHandle<T> {
    id: TaskId,
    kernel: Weak<Kernel>,
    slot: Rc<JoinSlot<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(id: TaskId, kernel: Weak<Kernel>, slot: Rc<JoinSlot<T>>) -> Self {
        Self { id, kernel, slot }
    }

    /// Task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Name given at spawn time.
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Stop the task. It never runs again; its future is dropped right away
    /// (or at the end of the current poll when a task cancels itself).
    pub fn cancel(&self) {
        if let Some(kernel) = self.kernel.upgrade() {
            kernel.cancel(self.id);
        }
    }

    /// True once the task ran to completion.
    pub fn is_finished(&self) -> bool {
        matches!(*self.slot.state.borrow(), JoinState::Finished(_) | JoinState::Taken)
    }

    /// True once the task was cancelled before completing.
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.state.borrow(), JoinState::Cancelled)
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("name", &self.slot.name)
            .field("finished", &self.is_finished())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, SimError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.slot.state.borrow_mut();
        match std::mem::replace(&mut *state, JoinState::Taken) {
            JoinState::Running => {
                *state = JoinState::Running;
                drop(state);
                *self.slot.joiner.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            },
            JoinState::Finished(value) => Poll::Ready(Ok(value)),
            JoinState::Cancelled => {
                *state = JoinState::Cancelled;
                Poll::Ready(Err(SimError::Cancelled { name: self.slot.name.clone() }))
            },
            // Output already handed out by an earlier poll.
            JoinState::Taken => {
                Poll::Ready(Err(SimError::Cancelled { name: self.slot.name.clone() }))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waker_queues_once_until_cleared() {
        let ready: ReadyQueue = Arc::default();
        let waker = TaskWaker::new(TaskId(7), Arc::clone(&ready));

        waker.wake_by_ref();
        waker.wake_by_ref();
        assert_eq!(ready.lock().expect("lock").len(), 1);

        waker.clear();
        waker.wake_by_ref();
        let queued: Vec<_> = ready.lock().expect("lock").iter().copied().collect();
        assert_eq!(queued, vec![TaskId(7), TaskId(7)]);
    }

    #[test]
    fn dropped_guard_marks_cancelled() {
        let slot = JoinSlot::<u32>::new("sampler".into());
        drop(CompletionGuard::new(Rc::clone(&slot)));
        assert!(matches!(*slot.state.borrow(), JoinState::Cancelled));
    }

    #[test]
    fn finished_guard_keeps_value() {
        let slot = JoinSlot::<u32>::new("sampler".into());
        CompletionGuard::new(Rc::clone(&slot)).finish(5);
        assert!(matches!(*slot.state.borrow(), JoinState::Finished(5)));
    }
}
