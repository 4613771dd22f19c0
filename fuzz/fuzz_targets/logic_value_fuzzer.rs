//! Fuzz target for the four-state value parser
//!
//! # Strategy
//!
//! - Raw UTF-8 strings, mostly garbage, some valid `01xz_` literals
//! - Widths around the 64-bit limit
//!
//! # Invariants
//!
//! - Parsing NEVER panics
//! - Accepted input renders back to itself, lowercased, without separators
//! - Width equals the number of value characters
//! - Integer conversion succeeds iff no bit is `x` or `z`
//! - Rejections name the right cause

#![no_main]

use hachure_sim::{LogicParseError, LogicVec, MAX_WIDTH};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else { return };
    let digits: String = text.chars().filter(|c| *c != '_').collect();

    match text.parse::<LogicVec>() {
        Ok(value) => {
            let canonical = digits.to_lowercase();
            assert_eq!(value.to_string(), canonical);
            assert_eq!(value.width() as usize, digits.chars().count());
            assert_eq!(value.to_u64().is_some(), !canonical.contains(['x', 'z']));
            assert_eq!(canonical.parse::<LogicVec>(), Ok(value), "canonical form reparses");
        },
        Err(LogicParseError::Empty) => assert!(digits.is_empty()),
        Err(LogicParseError::InvalidChar { ch, .. }) => {
            assert!(!matches!(ch, '0' | '1' | 'x' | 'X' | 'z' | 'Z' | '_'));
        },
        Err(LogicParseError::TooWide { width, max }) => {
            assert_eq!(max, MAX_WIDTH);
            assert!(width > MAX_WIDTH as usize);
        },
    }
});
