//! Fuzz target for core variant tokens and the family select tables
//!
//! # Strategy
//!
//! - Arbitrary tokens against both families
//! - Arbitrary select-line readings fed to the decoder
//!
//! # Invariants
//!
//! - Token parsing NEVER panics; accepted tokens render back unchanged
//! - A supported variant's select image decodes back to that variant
//! - An unsupported variant is rejected before any write is produced
//! - The decoder never reports a variant whose image differs from the reading

#![no_main]

use arbitrary::Arbitrary;
use hachure_harness::{ChipFamily, ConfigError, CoreVariant};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    token: String,
    hachure: bool,
    readings: Vec<Option<u8>>,
}

fuzz_target!(|input: Input| {
    let family = if input.hachure { ChipFamily::Hachure } else { ChipFamily::Globefish };
    let table = family.table();

    if let Ok(variant) = input.token.parse::<CoreVariant>() {
        assert_eq!(variant.token(), input.token);
        match table.resolve(variant) {
            Ok(_) => {
                let image = table.select_image(variant).expect("supported");
                let read = |name: &str| {
                    image.iter().find(|a| a.signal == name).map(|a| a.value)
                };
                assert_eq!(table.decode(read), Some(variant));
            },
            Err(err) => {
                assert!(!table.supports(variant));
                assert_eq!(err, ConfigError::VariantNotInFamily { variant, family });
            },
        }
    }

    let read = |name: &str| {
        let index = table.selects.iter().position(|s| s.name == name)?;
        input.readings.get(index).copied().flatten().map(u64::from)
    };
    if let Some(variant) = table.decode(read) {
        let image = table.select_image(variant).expect("decoded variants are supported");
        for (select, want) in table.selects.iter().zip(&image) {
            assert_eq!(read(select.name), Some(want.value));
        }
    }
});
