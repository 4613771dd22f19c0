//! Simulated time.
//!
//! All kernel time is kept as an integer number of picoseconds so that clock
//! periods derived from MHz frequencies stay exact for the common cases
//! (100 MHz → 10 000 ps, 50 MHz → 20 000 ps).

use std::{
    fmt,
    num::NonZeroU32,
    ops::{Add, AddAssign, Sub},
};

/// A point in, or span of, simulated time with picosecond resolution.
///
/// Arithmetic saturates instead of wrapping: a budget of [`SimTime::MAX`]
/// means "unbounded".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    /// Time zero.
    pub const ZERO: Self = Self(0);

    /// The largest representable time.
    pub const MAX: Self = Self(u64::MAX);

    /// Construct from picoseconds.
    pub const fn from_ps(ps: u64) -> Self {
        Self(ps)
    }

    /// Construct from nanoseconds.
    pub const fn from_ns(ns: u64) -> Self {
        Self(ns.saturating_mul(1_000))
    }

    /// Construct from microseconds.
    pub const fn from_us(us: u64) -> Self {
        Self(us.saturating_mul(1_000_000))
    }

    /// Construct from milliseconds.
    pub const fn from_ms(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000_000_000))
    }

    /// Period of a clock running at `mhz` megahertz (`1000 / mhz` ns).
    pub const fn period_of_mhz(mhz: NonZeroU32) -> Self {
        Self(1_000_000 / mhz.get() as u64)
    }

    /// Raw picosecond count.
    pub const fn as_ps(self) -> u64 {
        self.0
    }

    /// Time in nanoseconds as a float, for logging.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_ns_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Saturating addition.
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Multiply a span by an integer factor (saturating).
    pub const fn saturating_mul(self, factor: u64) -> Self {
        Self(self.0.saturating_mul(factor))
    }
}

impl Add for SimTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl Sub for SimTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ns, ps) = (self.0 / 1_000, self.0 % 1_000);
        if ps == 0 { write!(f, "{ns} ns") } else { write!(f, "{ns}.{ps:03} ns") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_of_common_frequencies() {
        let mhz = |v| NonZeroU32::new(v).expect("non-zero");
        assert_eq!(SimTime::period_of_mhz(mhz(100)), SimTime::from_ns(10));
        assert_eq!(SimTime::period_of_mhz(mhz(50)), SimTime::from_ns(20));
        assert_eq!(SimTime::period_of_mhz(mhz(3)).as_ps(), 333_333);
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(SimTime::MAX + SimTime::from_ns(1), SimTime::MAX);
        assert_eq!(SimTime::ZERO - SimTime::from_ns(1), SimTime::ZERO);
    }

    #[test]
    fn display_in_nanoseconds() {
        assert_eq!(SimTime::from_ns(1005).to_string(), "1005 ns");
        assert_eq!(SimTime::from_ps(2_500).to_string(), "2.500 ns");
    }
}
