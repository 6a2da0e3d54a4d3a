//! Selection of the materialized date levels.

use stratum_common::{Result, error::Error};

use crate::levels::{
    Granularity, LEVEL_BITS, LEVEL_VALUE_LIMITS, MAX_LEVEL, MIN_LEVEL, NO_MIDDLE_LEVEL_BITS,
    NO_MIDDLE_VALUE_LIMITS, is_full_level, is_middle_level,
};

/// The set of levels a date index materializes, together with its build granularity.
///
/// Every full level from the build granularity up to the year is present, nothing
/// finer than the build granularity is, and middle levels above the build granularity
/// are optional.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateLevelFormat {
    mask: u16,
    granularity: Granularity,
}

impl DateLevelFormat {
    /// Creates the format with all full levels from `granularity` up, plus every middle
    /// level above it when `middle_levels` is set.
    pub fn new(granularity: Granularity, middle_levels: bool) -> DateLevelFormat {
        let mask = (granularity.level()..=MAX_LEVEL)
            .filter(|&level| is_full_level(level) || (middle_levels && is_middle_level(level)))
            .fold(0u16, |mask, level| mask | level_bit(level));
        DateLevelFormat { mask, granularity }
    }

    /// Creates a format from an explicit level mask (bit `level - 1` set for each
    /// present level).
    pub fn from_mask(granularity: Granularity, mask: u16) -> Result<DateLevelFormat> {
        let format = DateLevelFormat { mask, granularity };
        format.validate()?;
        Ok(format)
    }

    fn validate(&self) -> Result<()> {
        let build_level = self.granularity.level();
        if self.mask & !ALL_LEVELS_MASK != 0 {
            return Err(Error::invalid_arg(
                "level_format",
                format!("mask {:#x} has bits outside levels 1..=12", self.mask),
            ));
        }
        for level in MIN_LEVEL..=MAX_LEVEL {
            let present = self.has_level(level);
            if level < build_level && present {
                return Err(Error::invalid_arg(
                    "level_format",
                    format!(
                        "level {level} is finer than the build granularity {}",
                        self.granularity
                    ),
                ));
            }
            if level >= build_level && is_full_level(level) && !present {
                return Err(Error::invalid_arg(
                    "level_format",
                    format!(
                        "full level {level} is required with build granularity {}",
                        self.granularity
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn mask(&self) -> u16 {
        self.mask
    }

    #[inline]
    pub fn has_level(&self, level: u8) -> bool {
        (MIN_LEVEL..=MAX_LEVEL).contains(&level) && self.mask & level_bit(level) != 0
    }

    pub fn has_middle_levels(&self) -> bool {
        (MIN_LEVEL..=MAX_LEVEL).any(|level| is_middle_level(level) && self.has_level(level))
    }

    /// Present levels, finest first.
    pub fn levels(&self) -> impl Iterator<Item = u8> + '_ {
        (MIN_LEVEL..=MAX_LEVEL).filter(|&level| self.has_level(level))
    }

    /// Returns `true` when `level` is a full level absorbing the bits of its absent
    /// middle level.
    #[inline]
    fn is_merged(&self, level: u8) -> bool {
        level % 2 == 1 && level <= 9 && !self.has_level(level + 1)
    }

    /// Width of the level's slice in this format.
    #[inline]
    pub fn level_bits(&self, level: u8) -> u32 {
        if self.is_merged(level) {
            NO_MIDDLE_LEVEL_BITS[level as usize]
        } else {
            LEVEL_BITS[level as usize]
        }
    }

    /// Largest legal value of the level's slice in this format.
    #[inline]
    pub fn level_value_limit(&self, level: u8) -> u64 {
        if self.is_merged(level) {
            NO_MIDDLE_VALUE_LIMITS[level as usize]
        } else {
            LEVEL_VALUE_LIMITS[level as usize]
        }
    }
}

const ALL_LEVELS_MASK: u16 = (1 << MAX_LEVEL) - 1;

#[inline]
const fn level_bit(level: u8) -> u16 {
    1 << (level - 1)
}
