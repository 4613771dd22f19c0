//! Edge/condition waits.
//!
//! Waits have no timeout of their own. A condition that never holds shows up
//! as the run's simulated-time budget expiring.

use hachure_sim::{LogicVec, Signal, Sim};

/// Suspend until `signal` changes to a value satisfying `predicate`.
///
/// After each change the wait passes the settle barrier, so the predicate
/// sees the value every write of that time step produced. Changes whose
/// settled value fails the predicate are skipped.
pub async fn wait_until(
    sim: &Sim,
    signal: &Signal,
    predicate: impl Fn(LogicVec) -> bool,
) -> LogicVec {
    loop {
        signal.edge().await;
        sim.read_only().await;
        let value = signal.value();
        if predicate(value) {
            return value;
        }
    }
}

/// Suspend until `signal` settles to a resolved, non-zero integer.
pub async fn wait_until_nonzero(sim: &Sim, signal: &Signal) -> u64 {
    let value = wait_until(sim, signal, |v| v.to_u64().is_some_and(|n| n != 0)).await;
    value.to_u64_or_zero()
}
