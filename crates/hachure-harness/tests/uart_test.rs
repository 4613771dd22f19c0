//! Integration tests for the UART source and sink

use std::num::NonZeroU32;

use bytes::Bytes;
use hachure_harness::{HarnessError, UartConfig, UartSink, UartSource};
use hachure_sim::{Sim, SimTime};

fn fast() -> UartConfig {
    UartConfig { baud: NonZeroU32::new(1_000_000).expect("non-zero") }
}

#[test]
fn source_to_sink_round_trip() {
    let sim = Sim::new();
    let line = sim.declare("uart_tx", 1).expect("declare");
    let s = sim.clone();

    let received = sim
        .run(
            async move {
                let mut sink = UartSink::start(&s, &line, fast());
                let source = UartSource::start(&s, &line, fast());
                source.write(&b"hi"[..]).await.expect("write");
                sink.read(2).await
            },
            SimTime::from_us(100),
        )
        .expect("run");

    assert_eq!(received, Ok(Bytes::from_static(b"hi")));
}

#[test]
fn write_takes_ten_bit_times_per_byte() {
    let sim = Sim::new();
    let line = sim.declare("uart_rx", 1).expect("declare");
    let s = sim.clone();

    let elapsed = sim
        .run(
            async move {
                let source = UartSource::start(&s, &line, fast());
                s.read_write().await;
                let started = s.now();
                source.write(Bytes::from_static(b"abc")).await.expect("write");
                s.now() - started
            },
            SimTime::from_us(100),
        )
        .expect("run");

    assert_eq!(elapsed, SimTime::from_us(30));
}

#[test]
fn stopped_sink_reports_closed() {
    let sim = Sim::new();
    let line = sim.declare("uart_tx", 1).expect("declare");
    let s = sim.clone();

    let result = sim
        .run(
            async move {
                let mut sink = UartSink::start(&s, &line, fast());
                sink.stop();
                sink.read(1).await
            },
            SimTime::from_us(10),
        )
        .expect("run");

    assert_eq!(result, Err(HarnessError::DeviceClosed { device: "uart sink" }));
}
