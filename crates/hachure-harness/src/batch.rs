//! Runs one scenario over a list of core variants on one long-lived circuit.
//!
//! Every case is its own [`Sim::run`](hachure_sim::Sim::run): the startup
//! sequence followed by the scenario body, bounded by the configured time
//! budget. Tasks a case spawns (clock, device models) end with it; the
//! circuit and its state carry over. Only the first case of a fresh
//! [`StartupSession`] resets the circuit.

use std::fmt;

use hachure_sim::SimTime;
use tracing::{info, warn};

use crate::{
    bench::Bench,
    error::{ConfigError, HarnessError},
    scenario::{self, Case, Scenario},
    startup::{StartupSession, start_up},
    variant::CoreVariant,
};

/// Result of one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    /// Case that ran.
    pub case: Case,
    /// Simulated time the case took, startup included.
    pub elapsed: SimTime,
    /// Pass, or the failure.
    pub result: Result<(), HarnessError>,
}

impl CaseOutcome {
    /// Whether the case passed.
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-variant outcomes of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Scenario name.
    pub scenario: &'static str,
    /// Outcomes in run order.
    pub outcomes: Vec<CaseOutcome>,
}

impl BatchReport {
    /// Number of passing cases.
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Number of failing cases.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// True if every case passed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} passed, {} failed", self.scenario, self.passed(), self.failed())?;
        for outcome in &self.outcomes {
            let (variant, elapsed) = (outcome.case.variant, outcome.elapsed);
            match &outcome.result {
                Ok(()) => writeln!(f, "  {variant:<6} ok     ({elapsed})")?,
                Err(err) => writeln!(f, "  {variant:<6} FAILED ({elapsed}): {err}")?,
            }
        }
        Ok(())
    }
}

/// Run `scenario` once per entry of `variants`, in order.
///
/// Fails before anything runs if the scenario or any variant is unavailable
/// on the bench's family. Case failures are collected in the report; a
/// failing case does not stop the batch.
pub fn run_batch(
    bench: &Bench,
    scenario: &dyn Scenario,
    variants: &[CoreVariant],
    session: &StartupSession,
) -> Result<BatchReport, ConfigError> {
    let config = bench.config();
    scenario::ensure_supported(scenario, config.family)?;
    let table = config.family.table();
    if let Some(variant) = variants.iter().find(|v| !table.supports(**v)) {
        return Err(ConfigError::VariantNotInFamily { variant: *variant, family: config.family });
    }

    let sim = bench.sim();
    let mut outcomes = Vec::with_capacity(variants.len());
    for &variant in variants {
        let case = Case { variant, from_reset: session.take_reset() };
        info!(scenario = scenario.name(), %variant, from_reset = case.from_reset, "case start");

        let started = sim.now();
        let body = async {
            let _clock = start_up(sim, config, variant, case.from_reset).await?;
            scenario.run(bench, case).await
        };
        let result = sim.run(body, config.time_budget).map_err(HarnessError::from).and_then(|r| r);
        let elapsed = sim.now() - started;

        match &result {
            Ok(()) => info!(scenario = scenario.name(), %variant, %elapsed, "case passed"),
            Err(err) => warn!(scenario = scenario.name(), %variant, %elapsed, %err, "case failed"),
        }
        outcomes.push(CaseOutcome { case, elapsed, result });
    }

    Ok(BatchReport { scenario: scenario.name(), outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(
        variant: CoreVariant,
        from_reset: bool,
        ns: u64,
        result: Result<(), HarnessError>,
    ) -> CaseOutcome {
        CaseOutcome { case: Case { variant, from_reset }, elapsed: SimTime::from_ns(ns), result }
    }

    #[test]
    fn report_counts_and_renders() {
        let report = BatchReport {
            scenario: "xip",
            outcomes: vec![
                outcome(CoreVariant::Frv4, true, 301_000, Ok(())),
                outcome(
                    CoreVariant::Frv4Ccx,
                    false,
                    150_000,
                    Err(HarnessError::assertion("gpio", 5, 4)),
                ),
            ],
        };

        assert_eq!((report.passed(), report.failed()), (1, 1));
        assert!(!report.is_success());
        insta::assert_snapshot!(report.to_string().trim_end(), @r"
        xip: 1 passed, 1 failed
          4      ok     (301000 ns)
          4ccx   FAILED (150000 ns): gpio: expected 5, observed 4
        ");
    }
}
