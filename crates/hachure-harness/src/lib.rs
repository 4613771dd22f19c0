//! Verification harness for the Hachure and Globefish chips.
//!
//! Drives a circuit through its pins on a [`hachure_sim::Sim`] and checks
//! protocol-level behaviour. Every scenario shares one startup sequence and
//! attaches the device models it needs; a behavioural [`model::SocModel`]
//! stands in for the RTL so the whole flow runs offline.
//!
//! # Architecture
//!
//! ```text
//! batch::run_batch
//!   └─ per variant: Sim::run(start_up + Scenario::run, time budget)
//!        ├─ startup     configure → power (gate-level) → clock → reset
//!        ├─ scenario    spi | toggle | sram | sram_simple | uart | xip | simple
//!        └─ devices     SpiDevice, UartSource/UartSink, ToggleMonitor
//! ```
//!
//! # Failure classes
//!
//! - **Configuration**: unknown variant, variant not in the family, missing
//!   signal. Raised before anything is driven.
//! - **Assertion**: a scenario check did not hold; carries expected and
//!   observed values.
//! - **Liveness**: an awaited event never came; surfaces only as the
//!   simulated-time budget running out.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod bench;
pub mod clock;
pub mod config;
pub mod configure;
pub mod error;
pub mod model;
pub mod monitor;
pub mod pins;
pub mod reset;
pub mod scenario;
pub mod spi;
pub mod startup;
pub mod uart;
pub mod variant;
pub mod wait;

pub use batch::{BatchReport, CaseOutcome, run_batch};
pub use bench::Bench;
pub use config::{HarnessConfig, ResetConfig, SimulatorKind};
pub use error::{ConfigError, HarnessError, ensure_eq};
pub use model::{Program, SocModel};
pub use monitor::ToggleMonitor;
pub use scenario::{Case, Scenario};
pub use spi::{Frame, SpiConfig, SpiDevice};
pub use startup::{StartupSession, start_up};
pub use uart::{UartConfig, UartSink, UartSource};
pub use variant::{ChipFamily, CoreVariant};
pub use wait::{wait_until, wait_until_nonzero};
