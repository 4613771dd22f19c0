//! Integration tests for kernel scheduling semantics
//!
//! These tests pin down the ordering guarantees testbenches rely on:
//! - Scheduled writes land at the end of the delta cycle, last write wins
//! - Settle barrier and deferred writes in the read-only region
//! - Task scopes, cancellation and join results
//! - Liveness failures bounded by the time budget

use std::{cell::Cell, rc::Rc};

use hachure_sim::{JoinHandle, Logic, Signal, Sim, SimError, SimTime, clock_cycles, first_edge};
use proptest::prelude::*;

fn spawn_clock(sim: &Sim, clk: &Signal, half_period: SimTime) -> JoinHandle<()> {
    let s = sim.clone();
    let clk = clk.clone();
    sim.spawn("clock", async move {
        let mut level = true;
        loop {
            clk.set_bool(level);
            s.timer(half_period).await;
            level = !level;
        }
    })
}

fn spawn_edge_counter(sim: &Sim, signal: &Signal) -> (Rc<Cell<u32>>, JoinHandle<()>) {
    let count = Rc::new(Cell::new(0));
    let counter = Rc::clone(&count);
    let signal = signal.clone();
    let handle = sim.spawn("edge-counter", async move {
        loop {
            signal.edge().await;
            counter.set(counter.get() + 1);
        }
    });
    (count, handle)
}

#[test]
fn writes_land_after_delta_last_write_wins() {
    let sim = Sim::new();
    let bus = sim.declare("bus", 8).expect("declare");
    let s = sim.clone();

    let (before, after, edges) = sim
        .run(
            async move {
                let (edges, _counter) = spawn_edge_counter(&s, &bus);
                bus.set(1);
                bus.set(2);
                let before = bus.value();
                s.read_write().await;
                let after = bus.value();
                s.timer(SimTime::from_ns(1)).await;
                (before, after, edges.get())
            },
            SimTime::from_us(1),
        )
        .expect("run");

    assert!(!before.is_resolved(), "write must not be visible in the same delta");
    assert_eq!(after.to_u64(), Some(2));
    assert_eq!(edges, 1, "coalesced writes produce a single change");
}

#[test]
fn observers_in_one_delta_see_same_values() {
    let sim = Sim::new();
    let clk = sim.declare("clk", 1).expect("declare");
    let data = sim.declare("data", 8).expect("declare");
    let _clock = spawn_clock(&sim, &clk, SimTime::from_ns(5));

    let seen = Rc::new(Cell::new(None));
    let s = sim.clone();
    let (c1, d1) = (clk.clone(), data.clone());
    let _writer = sim.spawn("writer", async move {
        let mut n = 0;
        loop {
            c1.rising_edge().await;
            n += 1;
            d1.set(n);
        }
    });
    let (c2, d2, seen2) = (clk.clone(), data.clone(), Rc::clone(&seen));
    let _reader = sim.spawn("reader", async move {
        c2.rising_edge().await;
        c2.rising_edge().await;
        seen2.set(d2.value().to_u64());
    });

    sim.run(s.timer(SimTime::from_ns(30)), SimTime::from_us(1)).expect("run");

    // The second rising edge samples the value written on the first.
    assert_eq!(seen.get(), Some(1));
}

#[test]
fn timer_advances_time() {
    let sim = Sim::new();
    let s = sim.clone();
    let now = sim
        .run(
            async move {
                s.timer(SimTime::from_ns(10)).await;
                s.timer(SimTime::from_ps(500)).await;
                s.now()
            },
            SimTime::from_us(1),
        )
        .expect("run");
    assert_eq!(now, SimTime::from_ps(10_500));
    assert_eq!(sim.now(), now);
}

#[test]
fn budget_expiry_is_time_limit_exceeded() {
    let sim = Sim::new();
    let err = sim
        .run(sim.timer(SimTime::from_ns(100)), SimTime::from_ns(50))
        .expect_err("budget too small");
    assert_eq!(err, SimError::TimeLimitExceeded { limit: SimTime::from_ns(50) });
    assert!(err.is_liveness());
}

#[test]
fn nothing_scheduled_is_stalled() {
    let sim = Sim::new();
    let sig = sim.declare("never", 1).expect("declare");
    let err = sim.run(sig.edge(), SimTime::from_us(1)).expect_err("no driver");
    assert_eq!(err, SimError::Stalled { at: SimTime::ZERO });
}

#[test]
fn read_only_defers_writes_to_next_step() {
    let sim = Sim::new();
    let sig = sim.declare("sig", 4).expect("declare");
    let s = sim.clone();

    let observed = sim
        .run(
            async move {
                sig.set(1);
                s.read_only().await;
                let settled = sig.value().to_u64();
                sig.set(2);
                s.read_only().await;
                let still = sig.value().to_u64();
                s.timer(SimTime::ZERO).await;
                s.read_write().await;
                (settled, still, sig.value().to_u64(), s.now())
            },
            SimTime::from_us(1),
        )
        .expect("run");

    assert_eq!(observed, (Some(1), Some(1), Some(2), SimTime::ZERO));
}

#[test]
fn settle_applies_pending_writes() {
    let sim = Sim::new();
    let sig = sim.declare("sig", 1).expect("declare");
    sig.set(1);
    assert_eq!(sig.lsb(), Logic::Unknown);
    sim.settle().expect("settle");
    assert_eq!(sig.lsb(), Logic::One);
    assert_eq!(sim.now(), SimTime::ZERO);
}

#[test]
fn final_writes_of_run_land_before_it_returns() {
    let sim = Sim::new();
    let sig = sim.declare("sig", 1).expect("declare");
    let s = sig.clone();
    sim.run(async move { s.set(1) }, SimTime::from_us(1)).expect("run");

    assert_eq!(sig.value().to_u64(), Some(1));
    assert_eq!(sim.now(), SimTime::ZERO);
}

#[test]
fn torn_down_tasks_leave_no_writes_behind() {
    let sim = Sim::new();
    let done = sim.declare("done", 1).expect("declare");
    let stray = sim.declare("stray", 4).expect("declare");
    let s = sim.clone();
    let d = done.clone();
    let st = stray.clone();

    sim.run(
        async move {
            let t = s.clone();
            let _writer = s.spawn("writer", async move {
                t.timer(SimTime::from_ns(10)).await;
                st.set(7);
                std::future::pending::<()>().await;
            });
            // Let the writer arm its timer first so it is polled first at 10 ns.
            s.read_write().await;
            s.timer(SimTime::from_ns(10)).await;
            d.set(1);
        },
        SimTime::from_us(1),
    )
    .expect("run");

    assert_eq!(done.value().to_u64(), Some(1));
    assert!(!stray.value().is_resolved(), "stray write applied: {}", stray.value());

    sim.settle().expect("settle");
    assert!(!stray.value().is_resolved(), "stray write leaked into the next run");
}

#[test]
fn join_returns_task_output() {
    let sim = Sim::new();
    let s = sim.clone();
    let out = sim
        .run(
            async move {
                let t = s.clone();
                let handle = s.spawn("answer", async move {
                    t.timer(SimTime::from_ns(3)).await;
                    42
                });
                handle.await
            },
            SimTime::from_us(1),
        )
        .expect("run");
    assert_eq!(out, Ok(42));
}

#[test]
fn cancelled_task_never_runs_again() {
    let sim = Sim::new();
    let s = sim.clone();
    let flag = Rc::new(Cell::new(false));
    let flag2 = Rc::clone(&flag);

    let joined = sim
        .run(
            async move {
                let t = s.clone();
                let handle = s.spawn("late", async move {
                    t.timer(SimTime::from_ns(100)).await;
                    flag2.set(true);
                });
                s.timer(SimTime::from_ns(10)).await;
                handle.cancel();
                assert!(handle.is_cancelled());
                s.timer(SimTime::from_ns(200)).await;
                handle.await
            },
            SimTime::from_us(1),
        )
        .expect("run");

    assert_eq!(joined, Err(SimError::Cancelled { name: "late".into() }));
    assert!(!flag.get());
}

#[test]
fn run_tears_down_its_scope_but_not_root_tasks() {
    let sim = Sim::new();
    let clk = sim.declare("clk", 1).expect("declare");
    let _clock = spawn_clock(&sim, &clk, SimTime::from_ns(5));
    assert_eq!(sim.task_count(), 1);

    let s = sim.clone();
    let c = clk.clone();
    let count = sim
        .run(
            async move {
                let (count, _h) = spawn_edge_counter(&s, &c);
                clock_cycles(&c, 4).await;
                assert_eq!(s.task_count(), 2);
                count.get()
            },
            SimTime::from_us(1),
        )
        .expect("run");
    assert!(count >= 6, "counter saw {count} edges");
    assert_eq!(sim.task_count(), 1, "scenario tasks are cancelled");

    let t0 = sim.now();
    sim.run(clock_cycles(&clk, 3), SimTime::from_us(1)).expect("clock survives");
    assert_eq!(sim.now() - t0, SimTime::from_ns(30));

    sim.shutdown();
    assert_eq!(sim.task_count(), 0);
}

#[test]
fn first_edge_reports_index() {
    let sim = Sim::new();
    let a = sim.declare("a", 1).expect("declare");
    let b = sim.declare("b", 1).expect("declare");
    let s = sim.clone();
    let b2 = b.clone();
    let _driver = sim.spawn("driver", async move {
        s.timer(SimTime::from_ns(5)).await;
        b2.set(1);
    });

    let index = sim.run(first_edge(&[&a, &b]), SimTime::from_us(1)).expect("run");
    assert_eq!(index, 1);
    assert_eq!(sim.now(), SimTime::from_ns(5));
}

#[test]
fn nested_run_is_rejected() {
    let sim = Sim::new();
    let s = sim.clone();
    let inner = sim.run(async move { s.settle() }, SimTime::from_us(1)).expect("outer run");
    assert_eq!(inner, Err(SimError::Reentrant));
}

#[test]
fn duplicate_and_unknown_signals() {
    let sim = Sim::new();
    sim.declare("clk", 1).expect("declare");
    assert_eq!(
        sim.declare("clk", 1).expect_err("duplicate"),
        SimError::DuplicateSignal { name: "clk".into() }
    );
    assert_eq!(
        sim.signal("rst_n").expect_err("unknown"),
        SimError::UnknownSignal { name: "rst_n".into() }
    );
}

#[test]
fn prop_edge_count_matches_value_changes() {
    proptest!(|(values in prop::collection::vec(0u64..4, 1..40))| {
        let sim = Sim::new();
        let sig = sim.declare("sig", 2).expect("declare");
        let (edges, _counter) = spawn_edge_counter(&sim, &sig);

        let s = sim.clone();
        let driven = values.clone();
        let sig2 = sig.clone();
        sim.run(
            async move {
                for v in driven {
                    sig2.set(v);
                    s.timer(SimTime::from_ns(1)).await;
                }
            },
            SimTime::from_us(1),
        )
        .expect("run");

        // Initial value is all-x, so the first write is always a change.
        let expected = 1 + values.windows(2).filter(|w| w[0] != w[1]).count();
        prop_assert_eq!(edges.get() as usize, expected);
        prop_assert_eq!(sig.value().to_u64(), values.last().copied());
        sim.shutdown();
    });
}
