//! Harness error types.
//!
//! Three failure classes reach the runner: configuration errors (raised before
//! any simulated time passes), assertion failures carrying expected and
//! observed values, and liveness failures, which only ever surface as the
//! simulated-time budget running out.

use hachure_sim::SimError;
use thiserror::Error;

use crate::variant::{ChipFamily, CoreVariant};

/// Invalid configuration, detected before anything is driven.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Token does not name any core variant.
    #[error("unknown core variant {token:?}")]
    UnknownVariant {
        /// Rejected token.
        token: String,
    },

    /// Token does not name a chip family.
    #[error("unknown chip family {name:?}")]
    UnknownFamily {
        /// Rejected name.
        name: String,
    },

    /// The variant exists but the family has no such core.
    #[error("core variant {variant} is not available on {family}")]
    VariantNotInFamily {
        /// Requested variant.
        variant: CoreVariant,
        /// Target family.
        family: ChipFamily,
    },

    /// No scenario has this name.
    #[error("unknown scenario {name:?}")]
    UnknownScenario {
        /// Rejected name.
        name: String,
    },

    /// The scenario's firmware does not exist for the family.
    #[error("scenario {scenario} does not run on {family}")]
    UnsupportedScenario {
        /// Scenario name.
        scenario: &'static str,
        /// Target family.
        family: ChipFamily,
    },

    /// The circuit does not expose a signal the sequence needs.
    #[error("circuit has no signal {name:?}")]
    MissingSignal {
        /// Signal name.
        name: String,
    },

    /// Clock frequency of zero, or too fast for picosecond resolution.
    #[error("clock frequency must be 1..=500000 MHz, got {mhz} MHz")]
    InvalidFrequency {
        /// Rejected frequency.
        mhz: u32,
    },

    /// An environment switch holds an unusable value.
    #[error("invalid value {value:?} for {key}")]
    InvalidSetting {
        /// Variable name.
        key: &'static str,
        /// Rejected value.
        value: String,
    },

    /// Two variants of a family drive identical select values.
    #[error("{family}: variants {first} and {second} select the same core")]
    AliasedVariants {
        /// Family whose table is broken.
        family: ChipFamily,
        /// First variant.
        first: CoreVariant,
        /// Variant aliasing it.
        second: CoreVariant,
    },

    /// A variant assigns a signal that is not one of the family's selects, or
    /// a value that does not fit.
    #[error("{family}: variant {variant} assigns {value} to {signal}, which fits no select line")]
    BadAssignment {
        /// Family whose table is broken.
        family: ChipFamily,
        /// Offending variant.
        variant: CoreVariant,
        /// Assigned signal.
        signal: &'static str,
        /// Assigned value.
        value: u64,
    },
}

impl ConfigError {
    /// Map a kernel lookup failure to the configuration error it implies.
    pub(crate) fn from_lookup(err: SimError) -> HarnessError {
        match err {
            SimError::UnknownSignal { name } => Self::MissingSignal { name }.into(),
            other => other.into(),
        }
    }
}

/// Errors surfaced by startup sequencing, device models and scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// Rejected configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Kernel failure, including the time budget running out.
    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    /// A scenario check did not hold.
    #[error("{check}: expected {expected}, observed {observed}")]
    Assertion {
        /// What was checked.
        check: String,
        /// Expected value.
        expected: String,
        /// Observed value.
        observed: String,
    },

    /// A device model stopped before producing the awaited data.
    #[error("{device} stopped before delivering data")]
    DeviceClosed {
        /// Device name.
        device: &'static str,
    },
}

impl HarnessError {
    /// Assertion failure with formatted expected/observed values.
    pub fn assertion(
        check: impl Into<String>,
        expected: impl std::fmt::Display,
        observed: impl std::fmt::Display,
    ) -> Self {
        Self::Assertion {
            check: check.into(),
            expected: expected.to_string(),
            observed: observed.to_string(),
        }
    }

    /// Returns true if an awaited event never happened within the budget.
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::Sim(err) if err.is_liveness())
    }

    /// Returns true for errors raised before the circuit was touched.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Assert `observed == expected`, returning an [`HarnessError::Assertion`]
/// otherwise.
pub fn ensure_eq<T>(check: &str, expected: T, observed: T) -> Result<(), HarnessError>
where
    T: PartialEq + std::fmt::Display,
{
    if expected == observed {
        Ok(())
    } else {
        Err(HarnessError::assertion(check, expected, observed))
    }
}

#[cfg(test)]
mod tests {
    use hachure_sim::SimTime;

    use super::*;

    #[test]
    fn unknown_signal_becomes_missing_signal() {
        let err = ConfigError::from_lookup(SimError::UnknownSignal { name: "en_p2".into() });
        assert_eq!(err, HarnessError::Config(ConfigError::MissingSignal { name: "en_p2".into() }));
        assert!(err.is_config());
    }

    #[test]
    fn liveness_passes_through() {
        let err: HarnessError = SimError::TimeLimitExceeded { limit: SimTime::from_us(3) }.into();
        assert!(err.is_liveness());
        assert!(!HarnessError::assertion("gpio", 7, 3).is_liveness());
    }

    #[test]
    fn assertion_message() {
        let err = ensure_eq("spi frame", 0x1D, 0x1C).expect_err("mismatch");
        assert_eq!(err.to_string(), "spi frame: expected 29, observed 28");
    }
}
