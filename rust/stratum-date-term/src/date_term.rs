//! The packed 64-bit date/time term key.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, Timelike};
use stratum_common::{Result, error::Error};

use crate::{
    level_format::DateLevelFormat,
    levels::{Granularity, LEVEL_BIT_OFFSETS, LEVEL_TAG_SHIFT, MAX_LEVEL, UNTAGGED_MASK},
};

/// Calendar year stored as year offset zero.
pub const EPOCH_YEAR: i32 = 1970;

/// Last calendar year representable by the 9-bit year field.
pub const MAX_YEAR: i32 = EPOCH_YEAR + 511;

const MILLISECOND_SHIFT: u32 = 0;
const MILLISECOND_BITS: u32 = 10;
const SECOND_SHIFT: u32 = 10;
const SECOND_BITS: u32 = 6;
const MINUTE_SHIFT: u32 = 16;
const MINUTE_BITS: u32 = 6;
const HOUR_SHIFT: u32 = 22;
const HOUR_BITS: u32 = 5;
const DAY_SHIFT: u32 = 27;
const DAY_BITS: u32 = 5;
const MONTH_SHIFT: u32 = 32;
const MONTH_BITS: u32 = 4;
const YEAR_SHIFT: u32 = 36;
const YEAR_BITS: u32 = 9;

#[inline]
const fn pack(value: u32, shift: u32, bits: u32) -> u64 {
    ((value as u64) & ((1u64 << bits) - 1)) << shift
}

#[inline]
const fn unpack(raw: u64, shift: u32, bits: u32) -> u32 {
    ((raw >> shift) & ((1u64 << bits) - 1)) as u32
}

/// A date/time value packed into a hierarchical 64-bit key.
///
/// Layout from the least significant bit: millisecond (10 bits), second (6),
/// minute (6), hour (5), day (5), month (4), year since 1970 (9). Bits 60..63 carry
/// an optional level tag (1..=12); zero means untagged. Keys order like their raw
/// integer value, which for untagged keys is chronological order.
///
/// Month and day are stored 1-based, the remaining fields 0-based.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTerm(u64);

impl DateTerm {
    pub const fn from_raw(raw: u64) -> DateTerm {
        DateTerm(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Packs the fields, truncating each one to its width. `year` is the offset
    /// from 1970.
    pub const fn encode(
        year: u32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        millisecond: u32,
    ) -> DateTerm {
        DateTerm(
            pack(year, YEAR_SHIFT, YEAR_BITS)
                | pack(month, MONTH_SHIFT, MONTH_BITS)
                | pack(day, DAY_SHIFT, DAY_BITS)
                | pack(hour, HOUR_SHIFT, HOUR_BITS)
                | pack(minute, MINUTE_SHIFT, MINUTE_BITS)
                | pack(second, SECOND_SHIFT, SECOND_BITS)
                | pack(millisecond, MILLISECOND_SHIFT, MILLISECOND_BITS),
        )
    }

    /// Builds a term from a calendar date and time, checking every field.
    pub fn from_calendar(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        millisecond: u32,
    ) -> Option<DateTerm> {
        if !(EPOCH_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_milli_opt(
            hour,
            minute,
            second,
            millisecond,
        )?;
        Some(DateTerm::encode(
            (year - EPOCH_YEAR) as u32,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        ))
    }

    /// Converts milliseconds since the Unix epoch (UTC). Negative timestamps and
    /// dates past `MAX_YEAR` are not representable.
    pub fn from_timestamp_millis(millis: i64) -> Option<DateTerm> {
        if millis < 0 {
            return None;
        }
        let dt = DateTime::from_timestamp_millis(millis)?;
        DateTerm::from_calendar(
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            dt.timestamp_subsec_millis(),
        )
    }

    /// Converts back to milliseconds since the Unix epoch, ignoring the level tag.
    /// Returns `None` when the fields do not form a valid calendar date.
    pub fn to_timestamp_millis(self) -> Option<i64> {
        let dt = NaiveDate::from_ymd_opt(self.year(), self.month(), self.day())?
            .and_hms_milli_opt(self.hour(), self.minute(), self.second(), self.millisecond())?;
        Some(dt.and_utc().timestamp_millis())
    }

    pub const fn year_offset(self) -> u32 {
        unpack(self.0, YEAR_SHIFT, YEAR_BITS)
    }

    /// Calendar year.
    pub const fn year(self) -> i32 {
        EPOCH_YEAR + self.year_offset() as i32
    }

    pub const fn month(self) -> u32 {
        unpack(self.0, MONTH_SHIFT, MONTH_BITS)
    }

    pub const fn day(self) -> u32 {
        unpack(self.0, DAY_SHIFT, DAY_BITS)
    }

    pub const fn hour(self) -> u32 {
        unpack(self.0, HOUR_SHIFT, HOUR_BITS)
    }

    pub const fn minute(self) -> u32 {
        unpack(self.0, MINUTE_SHIFT, MINUTE_BITS)
    }

    pub const fn second(self) -> u32 {
        unpack(self.0, SECOND_SHIFT, SECOND_BITS)
    }

    pub const fn millisecond(self) -> u32 {
        unpack(self.0, MILLISECOND_SHIFT, MILLISECOND_BITS)
    }

    /// The level tag, 0 when untagged.
    pub const fn level(self) -> u8 {
        (self.0 >> LEVEL_TAG_SHIFT) as u8
    }

    pub fn set_level(&mut self, level: u8) {
        debug_assert!(level <= MAX_LEVEL);
        self.0 = (self.0 & UNTAGGED_MASK) | ((level as u64) << LEVEL_TAG_SHIFT);
    }

    pub fn with_level(mut self, level: u8) -> DateTerm {
        self.set_level(level);
        self
    }

    pub const fn untagged(self) -> DateTerm {
        DateTerm(self.0 & UNTAGGED_MASK)
    }

    /// Raw add on the packed value; carries propagate into coarser fields.
    pub const fn plus_unit(self, unit: u64) -> DateTerm {
        DateTerm(self.0.wrapping_add(unit))
    }

    pub const fn minus_unit(self, unit: u64) -> DateTerm {
        DateTerm(self.0.wrapping_sub(unit))
    }

    /// The raw increment of one unit of `granularity`.
    pub const fn search_granularity_unit(granularity: Granularity) -> u64 {
        1u64 << LEVEL_BIT_OFFSETS[granularity.level() as usize]
    }

    /// Clears all fields finer than `granularity` (and the level tag).
    pub const fn truncate(self, granularity: Granularity) -> DateTerm {
        let unit = DateTerm::search_granularity_unit(granularity);
        DateTerm(self.0 & UNTAGGED_MASK & !(unit - 1))
    }

    /// Sets all fields finer than `granularity` to all-ones: the largest key within
    /// the same `granularity` unit.
    pub const fn end_of(self, granularity: Granularity) -> DateTerm {
        let unit = DateTerm::search_granularity_unit(granularity);
        DateTerm((self.0 & UNTAGGED_MASK) | (unit - 1))
    }

    /// The first key of the following year.
    pub const fn normalize_to_next_year(self) -> DateTerm {
        let unit = DateTerm::search_granularity_unit(Granularity::Year);
        DateTerm((self.truncate(Granularity::Year).0).wrapping_add(unit))
    }
}

/// Produces the indexing tokens of `term`: for every level present in `format`, the
/// term with all finer fields cleared, tagged with that level.
///
/// A query term emitted by `calculate_terms` matches these tokens exactly.
pub fn encode_date_term_to_terms(term: DateTerm, format: &DateLevelFormat) -> Vec<u64> {
    let raw = term.untagged().raw();
    format
        .levels()
        .map(|level| {
            let offset = LEVEL_BIT_OFFSETS[level as usize];
            let cleared = raw & !((1u64 << offset) - 1);
            cleared | ((level as u64) << LEVEL_TAG_SHIFT)
        })
        .collect()
}

impl fmt::Display for DateTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}-{}-{}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second(),
            self.millisecond()
        )
    }
}

impl fmt::Debug for DateTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateTerm({self}")?;
        if self.level() != 0 {
            write!(f, ", level {}", self.level())?;
        }
        write!(f, ")")
    }
}

impl FromStr for DateTerm {
    type Err = Error;

    /// Parses the `year-month-day-hour-minute-second-millisecond` form.
    fn from_str(s: &str) -> Result<DateTerm> {
        let fields = s
            .trim()
            .split('-')
            .map(|part| part.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::invalid_arg("date_term", format!("'{s}': {e}")))?;
        let [year, month, day, hour, minute, second, millisecond] = fields[..] else {
            return Err(Error::invalid_arg(
                "date_term",
                format!("'{s}': expected 7 fields, found {}", fields.len()),
            ));
        };
        let year = i32::try_from(year)
            .ok()
            .filter(|y| (EPOCH_YEAR..=MAX_YEAR).contains(y))
            .ok_or_else(|| {
                Error::invalid_arg(
                    "date_term",
                    format!("'{s}': year outside {EPOCH_YEAR}..={MAX_YEAR}"),
                )
            })?;
        let widths = [
            (month, MONTH_BITS),
            (day, DAY_BITS),
            (hour, HOUR_BITS),
            (minute, MINUTE_BITS),
            (second, SECOND_BITS),
            (millisecond, MILLISECOND_BITS),
        ];
        if widths.iter().any(|&(value, bits)| value >= 1 << bits) {
            return Err(Error::invalid_arg(
                "date_term",
                format!("'{s}': field exceeds its width"),
            ));
        }
        Ok(DateTerm::encode(
            (year - EPOCH_YEAR) as u32,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        ))
    }
}
