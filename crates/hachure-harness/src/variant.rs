//! Chip families, core variants and their select-line tables.
//!
//! Which core a chip runs is chosen by static select lines: one-hot enables
//! plus, on Hachure, a 2-bit `ccx4_res` code. The mapping from variant to
//! select values is a static [`FamilyTable`]; adding a variant is one table
//! entry.
//!
//! # Invariants
//!
//! - Every variant of a family drives a distinct select image
//!   ([`FamilyTable::validate`]).
//! - A variant's image sets exactly its own assignments; every other select
//!   line is zero.

use std::{fmt, str::FromStr};

use crate::error::ConfigError;

/// Circuit family. Each has its own pinout and variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipFamily {
    /// Four single-width cores.
    Globefish,
    /// Globefish cores plus the combined `4ccx` core and memory-backed cores.
    Hachure,
}

impl ChipFamily {
    /// Both families.
    pub const ALL: [Self; 2] = [Self::Globefish, Self::Hachure];

    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Globefish => "globefish",
            Self::Hachure => "hachure",
        }
    }

    /// Select-line table.
    pub fn table(self) -> &'static FamilyTable {
        match self {
            Self::Globefish => &GLOBEFISH,
            Self::Hachure => &HACHURE,
        }
    }

    /// Variants in table order.
    pub fn variants(self) -> impl Iterator<Item = CoreVariant> {
        self.table().variants.iter().map(|(variant, _)| *variant)
    }
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChipFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownFamily { name: s.to_owned() })
    }
}

/// Core variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoreVariant {
    /// 1-bit datapath.
    Frv1,
    /// 2-bit datapath.
    Frv2,
    /// 4-bit datapath.
    Frv4,
    /// 8-bit datapath.
    Frv8,
    /// 4-bit combined core.
    Frv4Ccx,
    /// 1-bit core with BRAM register file.
    Frv1Bram,
    /// 8-bit core with BRAM register file.
    Frv8Bram,
}

impl CoreVariant {
    /// Every variant, in token order.
    pub const ALL: [Self; 7] = [
        Self::Frv1,
        Self::Frv2,
        Self::Frv4,
        Self::Frv8,
        Self::Frv4Ccx,
        Self::Frv1Bram,
        Self::Frv8Bram,
    ];

    /// Selection token as used on the command line.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Frv1 => "1",
            Self::Frv2 => "2",
            Self::Frv4 => "4",
            Self::Frv8 => "8",
            Self::Frv4Ccx => "4ccx",
            Self::Frv1Bram => "1bram",
            Self::Frv8Bram => "8bram",
        }
    }

    /// Datapath width in bits, the token's leading digit.
    pub const fn core_width(self) -> u32 {
        match self {
            Self::Frv1 | Self::Frv1Bram => 1,
            Self::Frv2 => 2,
            Self::Frv4 | Self::Frv4Ccx => 4,
            Self::Frv8 | Self::Frv8Bram => 8,
        }
    }

    /// `floor(log2(1 + width))`: 1, 1, 2, 3 for widths 1, 2, 4, 8.
    pub const fn cycle_divisor(self) -> u64 {
        (self.core_width() + 1).ilog2() as u64
    }

    /// Scale a cycle budget written for the 1-bit core down to this core.
    pub const fn scale_cycles(self, cycles: u64) -> u64 {
        cycles / self.cycle_divisor()
    }
}

impl fmt::Display for CoreVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.token())
    }
}

impl FromStr for CoreVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.token() == s)
            .ok_or_else(|| ConfigError::UnknownVariant { token: s.to_owned() })
    }
}

/// Drive `signal` to `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Signal name.
    pub signal: &'static str,
    /// Value to drive.
    pub value: u64,
}

const fn set(signal: &'static str, value: u64) -> Assignment {
    Assignment { signal, value }
}

/// A select line that is cleared before a variant is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectLine {
    /// Signal name.
    pub name: &'static str,
    /// Width in bits.
    pub width: u32,
}

const fn line(name: &'static str, width: u32) -> SelectLine {
    SelectLine { name, width }
}

/// Static configuration table of one family.
#[derive(Debug)]
pub struct FamilyTable {
    /// Owning family.
    pub family: ChipFamily,
    /// Lines held at a constant level whatever the variant.
    pub fixed: &'static [Assignment],
    /// Lines cleared before the variant's assignments are applied.
    pub selects: &'static [SelectLine],
    /// Per-variant assignments.
    pub variants: &'static [(CoreVariant, &'static [Assignment])],
}

static GLOBEFISH: FamilyTable = FamilyTable {
    family: ChipFamily::Globefish,
    fixed: &[set("en_p", 1), set("en_wb", 1)],
    selects: &[line("en_frv1", 1), line("en_frv2", 1), line("en_frv4", 1), line("en_frv8", 1)],
    variants: &[
        (CoreVariant::Frv1, &[set("en_frv1", 1)]),
        (CoreVariant::Frv2, &[set("en_frv2", 1)]),
        (CoreVariant::Frv4, &[set("en_frv4", 1)]),
        (CoreVariant::Frv8, &[set("en_frv8", 1)]),
    ],
};

static HACHURE: FamilyTable = FamilyTable {
    family: ChipFamily::Hachure,
    fixed: &[set("en_p", 1), set("en_p2", 1), set("en_wb", 1)],
    selects: &[
        line("en_frv1", 1),
        line("en_frv2", 1),
        line("en_frv4", 1),
        line("en_frv8", 1),
        line("en_frv4ccx", 1),
        line("ccx4_res", 2),
    ],
    variants: &[
        (CoreVariant::Frv1, &[set("en_frv1", 1)]),
        (CoreVariant::Frv2, &[set("en_frv2", 1)]),
        (CoreVariant::Frv4, &[set("en_frv4", 1)]),
        (CoreVariant::Frv8, &[set("en_frv8", 1)]),
        (CoreVariant::Frv4Ccx, &[set("en_frv4ccx", 1)]),
        // With en_frv4ccx low, ccx4_res[0] enables the 1-bit BRAM core and
        // ccx4_res[1] the 8-bit one.
        (CoreVariant::Frv1Bram, &[set("ccx4_res", 1)]),
        (CoreVariant::Frv8Bram, &[set("ccx4_res", 2)]),
    ],
};

impl FamilyTable {
    /// Whether this family has `variant`.
    pub fn supports(&self, variant: CoreVariant) -> bool {
        self.variants.iter().any(|(v, _)| *v == variant)
    }

    /// Assignments specific to `variant`.
    pub fn assignments(&self, variant: CoreVariant) -> Result<&'static [Assignment], ConfigError> {
        self.variants
            .iter()
            .find(|(v, _)| *v == variant)
            .map(|(_, assignments)| *assignments)
            .ok_or(ConfigError::VariantNotInFamily { variant, family: self.family })
    }

    /// Value of every select line under `variant`, in table order.
    pub fn select_image(&self, variant: CoreVariant) -> Result<Vec<Assignment>, ConfigError> {
        let assignments = self.assignments(variant)?;
        Ok(self
            .selects
            .iter()
            .map(|select| {
                let value = assignments
                    .iter()
                    .find(|a| a.signal == select.name)
                    .map_or(0, |a| a.value);
                set(select.name, value)
            })
            .collect())
    }

    /// Full set of writes that selects `variant`: fixed lines, then every
    /// select line.
    pub fn resolve(&self, variant: CoreVariant) -> Result<Vec<Assignment>, ConfigError> {
        let image = self.select_image(variant)?;
        Ok(self.fixed.iter().copied().chain(image).collect())
    }

    /// Find the variant whose select image matches the values read through
    /// `read`. Unresolved lines (`None`) never match.
    pub fn decode(&self, read: impl Fn(&str) -> Option<u64>) -> Option<CoreVariant> {
        let current: Vec<Option<u64>> = self.selects.iter().map(|s| read(s.name)).collect();
        self.variants.iter().map(|(variant, _)| *variant).find(|variant| {
            self.select_image(*variant).is_ok_and(|image| {
                image.iter().zip(&current).all(|(want, got)| *got == Some(want.value))
            })
        })
    }

    /// Check that every assignment targets a select line with a value that
    /// fits, and that no two variants alias.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (variant, assignments) in self.variants {
            for a in *assignments {
                let fits = self.selects.iter().any(|s| {
                    s.name == a.signal && a.value != 0 && a.value < (1u64 << s.width.min(63))
                });
                if !fits {
                    return Err(ConfigError::BadAssignment {
                        family: self.family,
                        variant: *variant,
                        signal: a.signal,
                        value: a.value,
                    });
                }
            }
        }

        for (i, (first, _)) in self.variants.iter().enumerate() {
            let first_image = self.select_image(*first)?;
            for (second, _) in &self.variants[i + 1..] {
                if self.select_image(*second)? == first_image {
                    return Err(ConfigError::AliasedVariants {
                        family: self.family,
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
        Ok(())
    }
}
