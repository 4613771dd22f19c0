//! Hachure scenario runner.
//!
//! Runs one scenario over a list of core variants against the behavioural
//! SoC model and exits non-zero if any case fails.
//!
//! # Usage
//!
//! ```bash
//! # SPI echo on every Hachure core
//! hachure-runner --scenario spi
//!
//! # Simple SRAM check on two Globefish cores, verbose
//! hachure-runner --family globefish --scenario sram_simple --variants 1,8 --log-level debug
//!
//! # Environment switches of the simulator flow apply too
//! SIM=verilator GL=1 hachure-runner --scenario toggle
//! ```

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use hachure_harness::{
    BatchReport, Bench, ChipFamily, ConfigError, CoreVariant, HarnessConfig, HarnessError,
    Scenario, SocModel, StartupSession, run_batch, scenario,
};
use hachure_sim::{Sim, SimTime};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Hachure scenario runner
#[derive(Parser, Debug)]
#[command(name = "hachure-runner")]
#[command(about = "Run a Hachure/Globefish verification scenario over core variants")]
#[command(version)]
struct Args {
    /// Chip family (globefish, hachure)
    #[arg(short, long, env = "HACHURE_FAMILY", default_value = "hachure")]
    family: ChipFamily,

    /// Scenario name (spi, toggle, sram, sram_simple, uart, xip, simple)
    #[arg(short, long, env = "HACHURE_SCENARIO")]
    scenario: String,

    /// Comma-separated core variants; every variant of the family if omitted
    #[arg(short, long, env = "HACHURE_VARIANTS", value_delimiter = ',')]
    variants: Vec<CoreVariant>,

    /// System clock in MHz, overriding the family default
    #[arg(long, env = "HACHURE_CLOCK_MHZ")]
    clock_mhz: Option<u32>,

    /// Reset hold time in nanoseconds, overriding the family default
    #[arg(long, env = "HACHURE_RESET_NS")]
    reset_ns: Option<u64>,

    /// Simulated-time budget per case, in microseconds
    #[arg(long, env = "HACHURE_TIME_BUDGET_US")]
    time_budget_us: Option<u64>,

    /// Clock cycles before the SPI loopback echo
    #[arg(long, env = "HACHURE_LOOPBACK_DELAY")]
    loopback_delay: Option<u64>,

    /// Firmware image handed to the simulator (defaults to the scenario's)
    #[arg(long, env = "HACHURE_FIRMWARE")]
    firmware: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self, scenario: &dyn Scenario) -> Result<HarnessConfig, HarnessError> {
        let mut config = HarnessConfig::from_env(self.family)?;
        scenario.adjust(&mut config);

        if let Some(mhz) = self.clock_mhz {
            config = config.with_clock_mhz(mhz)?;
        }
        if let Some(ns) = self.reset_ns {
            config.reset.duration = SimTime::from_ns(ns);
        }
        if let Some(us) = self.time_budget_us {
            config.time_budget = SimTime::from_us(us);
        }
        if let Some(cycles) = self.loopback_delay {
            config.loopback_delay_cycles = cycles;
        }
        config.firmware =
            Some(self.firmware.clone().unwrap_or_else(|| PathBuf::from(scenario.firmware())));
        Ok(config)
    }

    fn variants(&self) -> Vec<CoreVariant> {
        if self.variants.is_empty() {
            self.family.variants().collect()
        } else {
            self.variants.clone()
        }
    }
}

fn run(args: &Args) -> Result<BatchReport, HarnessError> {
    let scenario = scenario::find(&args.scenario)?;
    let config = args.config(scenario)?;
    info!(
        scenario = scenario.name(),
        family = %config.family,
        toplevel = config.toplevel(),
        simulator = %config.simulator,
        build_args = ?config.simulator.build_args(),
        plusargs = ?config.plusargs(),
        pdk_root = %config.pdk_root.display(),
        pdk = %config.pdk,
        scl = %config.scl,
        results = HarnessConfig::results_xml(scenario.name()),
        "bench configured"
    );

    let sim = Sim::new();
    let model = SocModel::install(&sim, &config, scenario.program())?;
    let bench = Bench::new(sim.clone(), config);
    let report = run_batch(&bench, scenario, &args.variants(), &StartupSession::new());

    drop(model);
    sim.shutdown();
    report.map_err(HarnessError::from)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run(&args) {
        Ok(report) => {
            for line in report.to_string().lines() {
                info!("{line}");
            }
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                warn!(failed = report.failed(), "scenario failed");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!(%err, "batch not run");
            ExitCode::from(2)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_list_parses() {
        let args = Args::try_parse_from([
            "hachure-runner",
            "--family",
            "globefish",
            "--scenario",
            "sram_simple",
            "--variants",
            "1,8",
        ])
        .expect("valid arguments");

        assert_eq!(args.family, ChipFamily::Globefish);
        assert_eq!(args.variants(), vec![CoreVariant::Frv1, CoreVariant::Frv8]);
    }

    #[test]
    fn unknown_variant_rejected() {
        let parsed =
            Args::try_parse_from(["hachure-runner", "--scenario", "spi", "--variants", "16"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn overrides_beat_scenario_adjustments() {
        let args = Args::try_parse_from([
            "hachure-runner",
            "--family",
            "globefish",
            "--scenario",
            "simple",
            "--clock-mhz",
            "25",
            "--time-budget-us",
            "500",
        ])
        .expect("valid arguments");
        let scenario = scenario::find(&args.scenario).expect("registered");
        let config = args.config(scenario).expect("config");

        assert_eq!(config.clock_mhz.get(), 25);
        assert_eq!(config.time_budget, SimTime::from_us(500));
        assert_eq!(config.reset.duration, SimTime::from_ns(1000), "from the scenario");
        assert_eq!(config.firmware, Some(PathBuf::from("firmware/simple/build/simple.hex")));
    }

    #[test]
    fn too_fast_clock_is_config_error() {
        let args = Args::try_parse_from([
            "hachure-runner",
            "--scenario",
            "spi",
            "--clock-mhz",
            "2000000",
        ])
        .expect("valid arguments");
        let scenario = scenario::find(&args.scenario).expect("registered");

        assert!(matches!(
            args.config(scenario),
            Err(HarnessError::Config(ConfigError::InvalidFrequency { mhz: 2_000_000 }))
        ));
    }
}
