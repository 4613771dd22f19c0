//! Harness configuration.
//!
//! Defaults come from the chip family; [`HarnessConfig::from_env`] then
//! applies the same environment switches the external simulator flow reads
//! (`SIM`, `GL`, `SIM_FULL_CHIP`, `PDK_ROOT`, `PDK`, `SCL`).

use std::{
    fmt,
    num::NonZeroU32,
    path::{Path, PathBuf},
    str::FromStr,
};

use hachure_sim::SimTime;

use crate::{error::ConfigError, variant::ChipFamily};

/// Default PDK name.
pub const DEFAULT_PDK: &str = "gf180mcuD";

/// Default standard-cell library.
pub const DEFAULT_SCL: &str = "gf180mcu_fd_sc_mcu7t5v0";

/// Fastest clock whose half-periods are both at least one picosecond.
pub const MAX_CLOCK_MHZ: u32 = 500_000;

/// Default clock cycles the loopback driver waits before echoing.
pub const DEFAULT_LOOPBACK_DELAY_CYCLES: u64 = 2;

/// External HDL simulator the flow would invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulatorKind {
    /// Icarus Verilog.
    #[default]
    Icarus,
    /// Verilator.
    Verilator,
}

impl SimulatorKind {
    /// Extra build arguments for this simulator (tracing for Verilator).
    pub const fn build_args(self) -> &'static [&'static str] {
        match self {
            Self::Icarus => &[],
            Self::Verilator => &["--timing", "--trace", "--trace-fst", "--trace-structs"],
        }
    }
}

impl fmt::Display for SimulatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Icarus => "icarus",
            Self::Verilator => "verilator",
        })
    }
}

impl FromStr for SimulatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "icarus" => Ok(Self::Icarus),
            "verilator" => Ok(Self::Verilator),
            other => Err(ConfigError::InvalidSetting { key: "SIM", value: other.to_owned() }),
        }
    }
}

/// Reset polarity and hold time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetConfig {
    /// Reset is asserted by driving 0.
    pub active_low: bool,
    /// How long reset stays asserted.
    pub duration: SimTime,
}

impl ResetConfig {
    /// Level driven while reset is asserted.
    pub const fn asserted_level(self) -> bool {
        !self.active_low
    }
}

/// Everything a scenario batch needs to know about the bench.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Target chip family.
    pub family: ChipFamily,
    /// External simulator selection.
    pub simulator: SimulatorKind,
    /// Gate-level netlist: power rails must be driven.
    pub gate_level: bool,
    /// Bench wraps the full chip (pads, `gpio`) rather than the core (`gpo`).
    pub full_chip: bool,
    /// System clock frequency.
    pub clock_mhz: NonZeroU32,
    /// Reset sequencing.
    pub reset: ResetConfig,
    /// Clock cycles between a bus edge and the loopback echo.
    pub loopback_delay_cycles: u64,
    /// Simulated-time budget per scenario.
    pub time_budget: SimTime,
    /// Firmware image handed to the circuit's loader.
    pub firmware: Option<PathBuf>,
    /// PDK install root.
    pub pdk_root: PathBuf,
    /// PDK name.
    pub pdk: String,
    /// Standard-cell library.
    pub scl: String,
}

const DEFAULT_CLOCK_MHZ: NonZeroU32 = match NonZeroU32::new(100) {
    Some(mhz) => mhz,
    None => NonZeroU32::MIN,
};

impl HarnessConfig {
    /// Family defaults: 100 MHz clock, active-low reset held 1005 ns on
    /// Globefish and 1000 ns on Hachure, full-chip bench.
    pub fn for_family(family: ChipFamily) -> Self {
        let reset_ns = match family {
            ChipFamily::Globefish => 1005,
            ChipFamily::Hachure => 1000,
        };
        Self {
            family,
            simulator: SimulatorKind::Icarus,
            gate_level: false,
            full_chip: true,
            clock_mhz: DEFAULT_CLOCK_MHZ,
            reset: ResetConfig { active_low: true, duration: SimTime::from_ns(reset_ns) },
            loopback_delay_cycles: DEFAULT_LOOPBACK_DELAY_CYCLES,
            time_budget: SimTime::from_ms(20),
            firmware: None,
            pdk_root: PathBuf::from(".ciel"),
            pdk: DEFAULT_PDK.to_owned(),
            scl: DEFAULT_SCL.to_owned(),
        }
    }

    /// Family defaults overridden by the process environment.
    pub fn from_env(family: ChipFamily) -> Result<Self, ConfigError> {
        Self::from_lookup(family, |key| std::env::var(key).ok())
    }

    /// Family defaults overridden through `lookup`.
    ///
    /// `GL` counts as set when non-empty; `SIM_FULL_CHIP` selects the full
    /// chip only when equal to `1` (the default).
    pub fn from_lookup(
        family: ChipFamily,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::for_family(family);

        if let Some(sim) = lookup("SIM") {
            config.simulator = sim.parse()?;
        }
        config.gate_level = lookup("GL").is_some_and(|v| !v.is_empty());
        config.full_chip = lookup("SIM_FULL_CHIP").is_none_or(|v| v == "1");
        config.pdk_root = match lookup("PDK_ROOT") {
            Some(root) => PathBuf::from(root),
            None => lookup("HOME")
                .map_or_else(|| PathBuf::from(".ciel"), |home| Path::new(&home).join(".ciel")),
        };
        if let Some(pdk) = lookup("PDK") {
            config.pdk = pdk;
        }
        if let Some(scl) = lookup("SCL") {
            config.scl = scl;
        }
        Ok(config)
    }

    /// Set the clock frequency, rejecting zero and anything above
    /// [`MAX_CLOCK_MHZ`].
    pub fn with_clock_mhz(mut self, mhz: u32) -> Result<Self, ConfigError> {
        self.clock_mhz = NonZeroU32::new(mhz)
            .filter(|mhz| mhz.get() <= MAX_CLOCK_MHZ)
            .ok_or(ConfigError::InvalidFrequency { mhz })?;
        Ok(self)
    }

    /// Clock period derived from [`Self::clock_mhz`].
    pub const fn clock_period(&self) -> SimTime {
        SimTime::period_of_mhz(self.clock_mhz)
    }

    /// Name of the testbench toplevel module.
    pub const fn toplevel(&self) -> &'static str {
        match (self.family, self.full_chip) {
            (ChipFamily::Globefish, _) => "globefish_tb",
            (ChipFamily::Hachure, true) => "chip_top_tb",
            (ChipFamily::Hachure, false) => "hachure_tb",
        }
    }

    /// Output port observed by scenarios: the pads of the full Hachure chip,
    /// the core's `gpo` otherwise. Globefish benches only expose `gpo`.
    pub const fn output_port(&self) -> &'static str {
        match (self.family, self.full_chip) {
            (ChipFamily::Hachure, true) => crate::pins::GPIO,
            _ => crate::pins::GPO,
        }
    }

    /// Whether the output port is a tri-state pad bus.
    pub const fn tristate_output(&self) -> bool {
        matches!((self.family, self.full_chip), (ChipFamily::Hachure, true))
    }

    /// Simulator plusargs: waveform format and absolute firmware path.
    pub fn plusargs(&self) -> Vec<String> {
        let mut args = vec!["-fst".to_owned()];
        if let Some(firmware) = &self.firmware {
            let path = std::path::absolute(firmware).unwrap_or_else(|_| firmware.clone());
            args.push(format!("+firmware={}", path.display()));
        }
        args
    }

    /// Results file name for a test module.
    pub fn results_xml(test_module: &str) -> String {
        format!("{}_results.xml", test_module.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn family_defaults() {
        let globefish = HarnessConfig::for_family(ChipFamily::Globefish);
        assert_eq!(globefish.reset.duration, SimTime::from_ns(1005));
        assert_eq!(globefish.clock_period(), SimTime::from_ns(10));
        assert_eq!(globefish.toplevel(), "globefish_tb");
        assert_eq!(globefish.output_port(), "gpo");
        assert!(!globefish.tristate_output());

        let hachure = HarnessConfig::for_family(ChipFamily::Hachure);
        assert_eq!(hachure.reset.duration, SimTime::from_ns(1000));
        assert!(hachure.reset.active_low);
        assert!(!hachure.reset.asserted_level());
        assert_eq!(hachure.loopback_delay_cycles, 2);
    }

    #[test]
    fn environment_overrides() {
        let vars = [("SIM", "verilator"), ("GL", "1"), ("SIM_FULL_CHIP", "0"), ("PDK", "sky130A")];
        let config = HarnessConfig::from_lookup(ChipFamily::Hachure, lookup(&vars))
            .expect("valid environment");

        assert_eq!(config.simulator, SimulatorKind::Verilator);
        assert!(config.gate_level);
        assert!(!config.full_chip);
        assert_eq!(config.toplevel(), "hachure_tb");
        assert_eq!(config.output_port(), "gpo");
        assert_eq!(config.pdk, "sky130A");
        assert_eq!(config.scl, DEFAULT_SCL);
        assert_eq!(config.simulator.build_args().len(), 4);
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        let vars = [("HOME", "/home/ci"), ("GL", "")];
        let config = HarnessConfig::from_lookup(ChipFamily::Hachure, lookup(&vars)).expect("valid");
        assert!(!config.gate_level);
        assert!(config.full_chip);
        assert_eq!(config.toplevel(), "chip_top_tb");
        assert_eq!(config.output_port(), "gpio");
        assert_eq!(config.pdk_root, PathBuf::from("/home/ci/.ciel"));
    }

    #[test]
    fn bad_simulator_is_rejected() {
        let err = HarnessConfig::from_lookup(ChipFamily::Globefish, lookup(&[("SIM", "modelsim")]))
            .expect_err("unknown simulator");
        assert_eq!(err, ConfigError::InvalidSetting { key: "SIM", value: "modelsim".into() });
    }

    #[test]
    fn clock_outside_range_is_rejected() {
        let config = HarnessConfig::for_family(ChipFamily::Hachure);
        for mhz in [0, MAX_CLOCK_MHZ + 1, 2_000_000, u32::MAX] {
            let err = config.clone().with_clock_mhz(mhz).expect_err("out of range");
            assert_eq!(err, ConfigError::InvalidFrequency { mhz });
        }

        let fastest = config.with_clock_mhz(MAX_CLOCK_MHZ).expect("in range");
        assert_eq!(fastest.clock_period(), SimTime::from_ps(2));
    }

    #[test]
    fn plusargs_carry_absolute_firmware() {
        let mut config = HarnessConfig::for_family(ChipFamily::Hachure);
        assert_eq!(config.plusargs(), vec!["-fst".to_owned()]);

        config.firmware = Some(PathBuf::from("firmware/test_spi/build/firmware.hex"));
        let args = config.plusargs();
        assert_eq!(args[0], "-fst");
        assert!(args[1].starts_with("+firmware=/"), "{}", args[1]);
        assert!(args[1].ends_with("firmware/test_spi/build/firmware.hex"));
        assert_eq!(HarnessConfig::results_xml("test_SPI"), "test_spi_results.xml");
    }
}
