//! Level numbering and the fixed per-level width and limit tables.
//!
//! Levels are numbered from the finest (1, millisecond) to the coarsest (12, year).
//! Even levels 2..=10 are "middle" levels: the upper half of the field of the full
//! level right below them. When a middle level is not materialized, the full level
//! below it spans the whole field.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stratum_common::{Result, error::Error};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 12;

/// Position of the 4-bit level tag.
pub const LEVEL_TAG_SHIFT: u32 = 60;

/// Mask selecting everything below the level tag.
pub const UNTAGGED_MASK: u64 = (1 << LEVEL_TAG_SHIFT) - 1;

/// Width of each level's slice when the split (middle) layout is used.
pub const LEVEL_BITS: [u32; 13] = [0, 5, 5, 3, 3, 3, 3, 3, 2, 3, 2, 4, 9];

/// Width of each full level's slice when the middle level above it is absent.
/// Middle levels have no slice of their own in that case.
pub const NO_MIDDLE_LEVEL_BITS: [u32; 13] = [0, 10, 0, 6, 0, 6, 0, 5, 0, 5, 0, 4, 9];

/// Largest legal slice value per level in the split layout.
pub const LEVEL_VALUE_LIMITS: [u64; 13] = [0, 31, 31, 7, 7, 7, 7, 7, 2, 7, 3, 12, 511];

/// Largest legal slice value per full level when its middle level is absent.
pub const NO_MIDDLE_VALUE_LIMITS: [u64; 13] = [0, 999, 0, 59, 0, 59, 0, 23, 0, 31, 0, 12, 511];

/// Bit offset of each level's slice within the key (prefix sums of `LEVEL_BITS`).
pub const LEVEL_BIT_OFFSETS: [u32; 13] = [0, 0, 5, 10, 13, 16, 19, 22, 25, 27, 30, 32, 36];

/// Bit offset and width of the whole calendar field each level slices.
pub const LEVEL_FIELDS: [(u32, u32); 13] = [
    (0, 0),
    (0, 10),
    (0, 10),
    (10, 6),
    (10, 6),
    (16, 6),
    (16, 6),
    (22, 5),
    (22, 5),
    (27, 5),
    (27, 5),
    (32, 4),
    (36, 9),
];

/// Smallest legal value of the calendar field each level slices. Day and month are
/// 1-based.
pub const LEVEL_FIELD_MIN: [u64; 13] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 0];

/// Returns `true` for the middle levels (2, 4, 6, 8, 10).
#[inline]
pub const fn is_middle_level(level: u8) -> bool {
    level >= 2 && level <= 10 && level % 2 == 0
}

/// Returns `true` for the levels that always correspond to a whole calendar field.
#[inline]
pub const fn is_full_level(level: u8) -> bool {
    level == MAX_LEVEL || (level >= MIN_LEVEL && level <= 11 && level % 2 == 1)
}

/// The unit of a date index or a date search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 7] = [
        Granularity::Millisecond,
        Granularity::Second,
        Granularity::Minute,
        Granularity::Hour,
        Granularity::Day,
        Granularity::Month,
        Granularity::Year,
    ];

    /// The full level holding this granularity's field.
    pub const fn level(self) -> u8 {
        match self {
            Granularity::Millisecond => 1,
            Granularity::Second => 3,
            Granularity::Minute => 5,
            Granularity::Hour => 7,
            Granularity::Day => 9,
            Granularity::Month => 11,
            Granularity::Year => 12,
        }
    }

    /// Bit offset of this granularity's field within a `DateTerm`.
    pub const fn bit_offset(self) -> u32 {
        LEVEL_BIT_OFFSETS[self.level() as usize]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Granularity::Millisecond => "millisecond",
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_arg("granularity", format!("unknown granularity '{s}'")))
    }
}
