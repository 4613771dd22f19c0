//! Deterministic discrete-event kernel for pin-level verification.
//!
//! Provides the primitives a testbench needs to drive and observe a circuit
//! through named signals: four-state values, scheduled writes with delta-cycle
//! semantics, edge/timer/settle triggers, and cooperative `!Send` tasks with
//! cancellation.
//!
//! ## Architecture
//!
//! ```text
//! hachure-sim
//!   ├─ Sim        (handle: declare signals, spawn tasks, run)
//!   ├─ Kernel     (time wheel, write queue, ready queue)
//!   ├─ Signal     (named LogicVec + edge waiters)
//!   ├─ triggers   (EdgeFuture, AnyEdge, Timer, ReadWrite, ReadOnly)
//!   └─ JoinHandle (await / cancel a task)
//! ```
//!
//! Everything runs on the calling thread; a run is fully reproducible.
//!
//! ```
//! use hachure_sim::{Sim, SimTime};
//!
//! let sim = Sim::new();
//! let led = sim.declare("led", 1)?;
//! let t = sim.clone();
//! let out = sim.run(
//!     async move {
//!         led.set(1);
//!         t.timer(SimTime::from_ns(5)).await;
//!         led.value().to_u64()
//!     },
//!     SimTime::from_us(1),
//! )?;
//! assert_eq!(out, Some(1));
//! # Ok::<(), hachure_sim::SimError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod logic;
mod signal;
mod sim;
mod task;
mod time;
mod trigger;

pub use error::{LogicParseError, SimError};
pub use logic::{Logic, LogicVec, MAX_WIDTH};
pub use signal::Signal;
pub use sim::Sim;
pub use task::{JoinHandle, TaskId};
pub use time::SimTime;
pub use trigger::{
    AnyEdge, EdgeFuture, EdgeKind, ReadOnly, ReadWrite, Timer, clock_cycles, first_edge,
};
