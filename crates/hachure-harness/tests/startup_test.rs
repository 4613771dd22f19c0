//! Integration tests for the shared startup sequence
//!
//! - Configuration lands before the first clock edge
//! - Reset holds for exactly its configured duration
//! - Gate-level benches get their power rails driven
//! - Configuration errors leave the circuit untouched

use std::{cell::RefCell, rc::Rc};

use hachure_harness::{
    ChipFamily, ConfigError, CoreVariant, HarnessConfig, HarnessError, Program, SocModel,
    StartupSession, pins, start_up,
};
use hachure_sim::{LogicVec, Sim, SimTime, clock_cycles};

fn hachure_bench() -> (Sim, HarnessConfig, SocModel) {
    let sim = Sim::new();
    let config = HarnessConfig::for_family(ChipFamily::Hachure);
    let model = SocModel::install(&sim, &config, Program::Idle).expect("install");
    (sim, config, model)
}

#[test]
fn reset_held_for_configured_duration() {
    let (sim, config, _model) = hachure_bench();
    let clk = sim.signal(pins::CLK).expect("clk");
    let rst = sim.signal(pins::RST_N).expect("rst_n");
    let enable = sim.signal("en_frv4").expect("en_frv4");

    let samples: Rc<RefCell<Vec<(SimTime, LogicVec, LogicVec)>>> = Rc::default();
    let s = sim.clone();
    let seen = Rc::clone(&samples);
    sim.run(
        async move {
            let (c, r, e) = (clk.clone(), rst.clone(), enable.clone());
            let sampler = s.clone();
            let _sampler = s.spawn("sampler", async move {
                loop {
                    c.rising_edge().await;
                    seen.borrow_mut().push((sampler.now(), r.value(), e.value()));
                }
            });
            let _clock = start_up(&s, &config, CoreVariant::Frv4, true).await.expect("startup");
            clock_cycles(&clk, 10).await;
        },
        SimTime::from_us(5),
    )
    .expect("run");

    let samples = samples.borrow();
    assert_eq!(samples.first().map(|s| s.0), Some(SimTime::ZERO), "clock starts at t=0");
    assert!(samples.len() > 100);
    for (at, rst, enable) in samples.iter() {
        assert_eq!(enable.to_u64(), Some(1), "selected before the first edge (t={at})");
        let expected = u64::from(*at >= SimTime::from_ns(1000));
        assert_eq!(rst.to_u64(), Some(expected), "rst_n at {at}");
    }
    sim.shutdown();
}

#[test]
fn only_selected_enable_is_asserted() {
    let (sim, config, _model) = hachure_bench();
    let s = sim.clone();
    sim.run(
        async move { start_up(&s, &config, CoreVariant::Frv8Bram, false).await.map(|_| ()) },
        SimTime::from_us(1),
    )
    .expect("run")
    .expect("startup");

    let read = |name: &str| sim.signal(name).expect("declared").value().to_u64();
    assert_eq!(read("ccx4_res"), Some(2));
    for name in ["en_frv1", "en_frv2", "en_frv4", "en_frv8", "en_frv4ccx"] {
        assert_eq!(read(name), Some(0), "{name}");
    }
    for name in ["en_p", "en_p2", "en_wb"] {
        assert_eq!(read(name), Some(1), "{name}");
    }
    assert!(!sim.signal(pins::RST_N).expect("rst_n").value().is_resolved(), "no reset asked");
    sim.shutdown();
}

#[test]
fn gate_level_drives_power_rails() {
    let sim = Sim::new();
    let mut config = HarnessConfig::for_family(ChipFamily::Globefish);
    config.gate_level = true;
    let _model = SocModel::install(&sim, &config, Program::Idle).expect("install");

    let s = sim.clone();
    let c = config.clone();
    sim.run(
        async move { start_up(&s, &c, CoreVariant::Frv2, true).await.map(|_| ()) },
        SimTime::from_us(2),
    )
    .expect("run")
    .expect("startup");

    assert_eq!(sim.signal(pins::VDD).expect("VDD").value().to_u64(), Some(1));
    assert_eq!(sim.signal(pins::VSS).expect("VSS").value().to_u64(), Some(0));
    assert_eq!(sim.now(), SimTime::from_ns(1005), "Globefish reset hold");
    assert_eq!(sim.signal(pins::RST_N).expect("rst_n").value().to_u64(), Some(1), "released");
    sim.shutdown();
}

#[test]
fn variant_outside_family_touches_nothing() {
    let sim = Sim::new();
    let config = HarnessConfig::for_family(ChipFamily::Globefish);
    let _model = SocModel::install(&sim, &config, Program::Idle).expect("install");

    let s = sim.clone();
    let c = config.clone();
    let result = sim
        .run(
            async move { start_up(&s, &c, CoreVariant::Frv4Ccx, true).await.map(|_| ()) },
            SimTime::from_us(2),
        )
        .expect("run");

    assert_eq!(
        result,
        Err(HarnessError::Config(ConfigError::VariantNotInFamily {
            variant: CoreVariant::Frv4Ccx,
            family: ChipFamily::Globefish,
        }))
    );
    assert_eq!(sim.now(), SimTime::ZERO);
    for name in [pins::CLK, pins::RST_N, "en_p", "en_frv1"] {
        assert!(!sim.signal(name).expect("declared").value().is_resolved(), "{name} driven");
    }
    sim.shutdown();
}

#[test]
fn missing_signal_is_config_error() {
    let sim = Sim::new();
    sim.declare(pins::CLK, 1).expect("declare");
    let config = HarnessConfig::for_family(ChipFamily::Globefish);

    let s = sim.clone();
    let result = sim
        .run(
            async move { start_up(&s, &config, CoreVariant::Frv1, true).await.map(|_| ()) },
            SimTime::from_us(1),
        )
        .expect("run");
    assert_eq!(
        result,
        Err(HarnessError::Config(ConfigError::MissingSignal { name: pins::RST_N.into() }))
    );
}

#[test]
fn session_resets_first_case_only() {
    let (sim, config, _model) = hachure_bench();
    let session = StartupSession::new();
    let rst = sim.signal(pins::RST_N).expect("rst_n");

    for variant in [CoreVariant::Frv1, CoreVariant::Frv2] {
        let from_reset = session.take_reset();
        let s = sim.clone();
        let c = config.clone();
        let started = sim.now();
        sim.run(
            async move { start_up(&s, &c, variant, from_reset).await.map(|_| ()) },
            SimTime::from_us(2),
        )
        .expect("run")
        .expect("startup");

        let held = sim.now() - started;
        let expected = if from_reset { SimTime::from_ns(1000) } else { SimTime::ZERO };
        assert_eq!(held, expected, "{variant}");
        assert_eq!(rst.value().to_u64(), Some(1));
    }
    sim.shutdown();
}
