//! Configuration sequencer: drives the select lines for a core variant.

use hachure_sim::{Signal, Sim};
use tracing::{debug, info};

use crate::{
    error::HarnessError,
    pins,
    variant::{ChipFamily, CoreVariant},
};

/// Drive every fixed and select line of `family` so that `variant` is
/// selected.
///
/// Fails without touching any signal if `variant` is not part of `family` or
/// one of the lines is missing from the circuit. The writes land at the end
/// of the current delta cycle.
pub fn apply(sim: &Sim, family: ChipFamily, variant: CoreVariant) -> Result<(), HarnessError> {
    let writes = family.table().resolve(variant)?;
    let resolved = writes
        .iter()
        .map(|a| pins::lookup(sim, a.signal).map(|signal| (signal, a.value)))
        .collect::<Result<Vec<(Signal, u64)>, _>>()?;

    for (signal, value) in &resolved {
        debug!(signal = signal.name(), value, "select");
        signal.set(*value);
    }
    info!(%family, %variant, "core selected");
    Ok(())
}

/// Parse `token` and [`apply`] it.
pub fn apply_token(
    sim: &Sim,
    family: ChipFamily,
    token: &str,
) -> Result<CoreVariant, HarnessError> {
    let variant: CoreVariant = token.parse()?;
    apply(sim, family, variant)?;
    Ok(variant)
}
