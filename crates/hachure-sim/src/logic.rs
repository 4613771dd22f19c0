//! Four-state logic values.
//!
//! Pins on the circuit boundary can read as `0`, `1`, unknown (`x`) or high
//! impedance (`z`). [`LogicVec`] packs up to 64 such bits into three masks.
//!
//! # Invariants
//!
//! - `value`, `unknown` and `high_z` never have bits set above `width`
//! - `unknown & high_z == 0`
//! - `value` is zero wherever `unknown | high_z` is set

use std::{fmt, str::FromStr};

use crate::error::LogicParseError;

/// Maximum width of a [`LogicVec`].
pub const MAX_WIDTH: u32 = 64;

/// A single four-state bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logic {
    /// Driven low.
    Zero,
    /// Driven high.
    One,
    /// Unknown / uninitialised.
    Unknown,
    /// Not driven.
    HighZ,
}

impl Logic {
    /// Character used in value strings.
    pub const fn to_char(self) -> char {
        match self {
            Self::Zero => '0',
            Self::One => '1',
            Self::Unknown => 'x',
            Self::HighZ => 'z',
        }
    }

    /// Parse a single value character (case-insensitive for `x`/`z`).
    pub const fn from_char(ch: char) -> Option<Self> {
        match ch {
            '0' => Some(Self::Zero),
            '1' => Some(Self::One),
            'x' | 'X' => Some(Self::Unknown),
            'z' | 'Z' => Some(Self::HighZ),
            _ => None,
        }
    }
}

impl From<bool> for Logic {
    fn from(value: bool) -> Self {
        if value { Self::One } else { Self::Zero }
    }
}

const fn width_mask(width: u32) -> u64 {
    if width >= MAX_WIDTH { u64::MAX } else { (1u64 << width) - 1 }
}

/// A vector of up to 64 four-state bits, bit 0 least significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicVec {
    width: u32,
    value: u64,
    unknown: u64,
    high_z: u64,
}

impl LogicVec {
    /// A fully resolved value; bits above `width` are discarded.
    ///
    /// `width` is clamped to `1..=64`.
    pub const fn new(width: u32, value: u64) -> Self {
        let width = clamp_width(width);
        Self { width, value: value & width_mask(width), unknown: 0, high_z: 0 }
    }

    /// All bits unknown.
    pub const fn unknown(width: u32) -> Self {
        let width = clamp_width(width);
        Self { width, value: 0, unknown: width_mask(width), high_z: 0 }
    }

    /// All bits high impedance.
    pub const fn high_z(width: u32) -> Self {
        let width = clamp_width(width);
        Self { width, value: 0, unknown: 0, high_z: width_mask(width) }
    }

    /// Width in bits.
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Bit `index`; out-of-range bits read as unknown.
    pub const fn bit(self, index: u32) -> Logic {
        if index >= self.width {
            return Logic::Unknown;
        }
        let m = 1u64 << index;
        if self.high_z & m != 0 {
            Logic::HighZ
        } else if self.unknown & m != 0 {
            Logic::Unknown
        } else if self.value & m != 0 {
            Logic::One
        } else {
            Logic::Zero
        }
    }

    /// Bit 0.
    pub const fn lsb(self) -> Logic {
        self.bit(0)
    }

    /// Replace bit `index`, returning the updated vector.
    #[must_use]
    pub const fn with_bit(mut self, index: u32, bit: Logic) -> Self {
        if index >= self.width {
            return self;
        }
        let m = 1u64 << index;
        self.value &= !m;
        self.unknown &= !m;
        self.high_z &= !m;
        match bit {
            Logic::Zero => {},
            Logic::One => self.value |= m,
            Logic::Unknown => self.unknown |= m,
            Logic::HighZ => self.high_z |= m,
        }
        self
    }

    /// True if every bit is `0` or `1`.
    pub const fn is_resolved(self) -> bool {
        self.unknown | self.high_z == 0
    }

    /// True if any bit is high impedance.
    pub const fn has_z(self) -> bool {
        self.high_z != 0
    }

    /// True if every bit is high impedance.
    pub const fn is_all_z(self) -> bool {
        self.high_z == width_mask(self.width)
    }

    /// Integer value, or `None` if any bit is `x` or `z`.
    pub const fn to_u64(self) -> Option<u64> {
        if self.is_resolved() { Some(self.value) } else { None }
    }

    /// Integer value with `x` and `z` bits read as `0`.
    pub const fn to_u64_or_zero(self) -> u64 {
        self.value
    }

    /// Truncate or zero-extend to `width` bits.
    #[must_use]
    pub const fn resized(self, width: u32) -> Self {
        let width = clamp_width(width);
        let m = width_mask(width);
        Self { width, value: self.value & m, unknown: self.unknown & m, high_z: self.high_z & m }
    }
}

const fn clamp_width(width: u32) -> u32 {
    if width == 0 {
        1
    } else if width > MAX_WIDTH {
        MAX_WIDTH
    } else {
        width
    }
}

impl From<bool> for LogicVec {
    fn from(value: bool) -> Self {
        Self::new(1, u64::from(value))
    }
}

impl From<Logic> for LogicVec {
    fn from(bit: Logic) -> Self {
        Self::new(1, 0).with_bit(0, bit)
    }
}

impl fmt::Display for LogicVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in (0..self.width).rev() {
            write!(f, "{}", self.bit(index).to_char())?;
        }
        Ok(())
    }
}

impl FromStr for LogicVec {
    type Err = LogicParseError;

    /// Parse an MSB-first string of `0`, `1`, `x`, `z`; `_` separators are
    /// ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = Vec::with_capacity(s.len());
        for (position, ch) in s.chars().enumerate() {
            if ch == '_' {
                continue;
            }
            let bit = Logic::from_char(ch).ok_or(LogicParseError::InvalidChar { ch, position })?;
            bits.push(bit);
        }

        if bits.is_empty() {
            return Err(LogicParseError::Empty);
        }
        let width = u32::try_from(bits.len())
            .ok()
            .filter(|w| *w <= MAX_WIDTH)
            .ok_or(LogicParseError::TooWide { width: bits.len(), max: MAX_WIDTH })?;

        let vec = bits
            .iter()
            .rev()
            .zip(0u32..)
            .fold(Self::new(width, 0), |acc, (bit, index)| acc.with_bit(index, *bit));
        Ok(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_masks_to_width() {
        let v = LogicVec::new(4, 0xFF);
        assert_eq!(v.to_u64(), Some(0xF));
        assert_eq!(v.width(), 4);
    }

    #[test]
    fn unresolved_values_have_no_integer() {
        assert_eq!(LogicVec::unknown(8).to_u64(), None);
        assert_eq!(LogicVec::high_z(8).to_u64(), None);
        assert_eq!(LogicVec::high_z(8).to_u64_or_zero(), 0);
    }

    #[test]
    fn parse_mixed_string() {
        let v: LogicVec = "1z0x".parse().expect("valid value");
        assert_eq!(v.width(), 4);
        assert_eq!(v.bit(3), Logic::One);
        assert_eq!(v.bit(2), Logic::HighZ);
        assert_eq!(v.bit(1), Logic::Zero);
        assert_eq!(v.bit(0), Logic::Unknown);
        assert_eq!(v.to_string(), "1z0x");
        assert_eq!(v.to_u64_or_zero(), 0b1000);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("".parse::<LogicVec>(), Err(LogicParseError::Empty));
        assert_eq!(
            "01a".parse::<LogicVec>(),
            Err(LogicParseError::InvalidChar { ch: 'a', position: 2 })
        );
        let wide = "0".repeat(65);
        let err = wide.parse::<LogicVec>();
        assert!(matches!(err, Err(LogicParseError::TooWide { width: 65, .. })));
    }

    #[test]
    fn all_z_detection() {
        assert!(LogicVec::high_z(8).is_all_z());
        assert!(!LogicVec::high_z(8).with_bit(0, Logic::Zero).is_all_z());
        assert!(LogicVec::high_z(8).with_bit(0, Logic::Zero).has_z());
    }

    #[test]
    fn with_bit_keeps_masks_disjoint() {
        let v = LogicVec::unknown(2).with_bit(1, Logic::HighZ).with_bit(1, Logic::One);
        assert_eq!(v.bit(1), Logic::One);
        assert_eq!(v.bit(0), Logic::Unknown);
    }
}
