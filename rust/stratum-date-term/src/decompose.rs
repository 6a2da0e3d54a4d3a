//! Decomposition of a `[from, to]` date range into per-level keys.
//!
//! The walk goes from the finest present level to the year. At every level the
//! partial parent units at either end of the range are emitted as keys of this level,
//! and the range is narrowed to the whole parent units in between, which the next
//! coarser level covers. When nothing whole remains (or the range is about to be
//! handled at the year level) the rest is emitted at the current level and the walk
//! stops. Every point of the range is therefore covered by exactly one emitted key.
//!
//! A lower bound sitting on the first legal value of its parent unit counts as
//! aligned. For the 1-based day and month fields that value is 1, not 0, so a range
//! starting on the first of a month (or on January) is not split at that level.

use crate::{
    date_term::DateTerm,
    level_format::DateLevelFormat,
    levels::{LEVEL_BITS, LEVEL_FIELD_MIN, LEVEL_FIELDS, LEVEL_TAG_SHIFT, MAX_LEVEL, MIN_LEVEL},
};

/// An inclusive range of tagged keys of a single level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyRange {
    pub from: u64,
    pub to: u64,
}

impl KeyRange {
    pub fn new(from: u64, to: u64) -> KeyRange {
        KeyRange { from, to }
    }

    pub fn level(&self) -> u8 {
        (self.from >> LEVEL_TAG_SHIFT) as u8
    }

    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        self.from <= key && key <= self.to
    }
}

/// A run of keys `[from, to]` (untagged) at one level, plus the level geometry.
#[derive(Clone, Copy, Debug)]
struct LevelSpan {
    level: u8,
    from: u64,
    to: u64,
    shift: u32,
    bits: u32,
    limit: u64,
}

impl LevelSpan {
    #[inline]
    fn slice(&self, key: u64) -> u64 {
        (key >> self.shift) & ((1u64 << self.bits) - 1)
    }

    #[inline]
    fn tag(&self) -> u64 {
        (self.level as u64) << LEVEL_TAG_SHIFT
    }

    /// One key per unit of the level, skipping slice values above the limit.
    fn push_terms(&self, out: &mut Vec<u64>) {
        let unit = 1u64 << self.shift;
        let mut key = self.from;
        while key <= self.to {
            if self.slice(key) <= self.limit {
                out.push(key | self.tag());
            }
            key = match key.checked_add(unit) {
                Some(next) => next,
                None => break,
            };
        }
    }

    /// A single tagged range, with the upper end clamped to the value limit.
    fn push_range(&self, out: &mut Vec<KeyRange>) {
        let to = if self.slice(self.to) > self.limit {
            let field_mask = ((1u64 << self.bits) - 1) << self.shift;
            (self.to & !field_mask) | (self.limit << self.shift)
        } else {
            self.to
        };
        if to < self.from {
            return;
        }
        out.push(KeyRange::new(self.from | self.tag(), to | self.tag()));
    }
}

/// Whether `key` holds the smallest legal value of the field sliced by `level`.
#[inline]
fn starts_field(level: u8, key: u64) -> bool {
    let min = LEVEL_FIELD_MIN[level as usize];
    let (shift, bits) = LEVEL_FIELDS[level as usize];
    min != 0 && (key >> shift) & ((1u64 << bits) - 1) == min
}

fn decompose(from: DateTerm, to: DateTerm, format: &DateLevelFormat, mut emit: impl FnMut(LevelSpan)) {
    let mut left = from.untagged().raw();
    let mut right = to.untagged().raw();
    if left > right {
        return;
    }

    let mut total_bits = 0u32;
    for level in MIN_LEVEL..=MAX_LEVEL {
        let split_bits = LEVEL_BITS[level as usize];
        if !format.has_level(level) {
            total_bits += split_bits;
            continue;
        }

        let below = (1u64 << total_bits) - 1;
        left &= !below;
        right &= !below;

        let bits = format.level_bits(level);
        let limit = format.level_value_limit(level);
        let span = |from: u64, to: u64| LevelSpan {
            level,
            from,
            to,
            shift: total_bits,
            bits,
            limit,
        };

        if level == MAX_LEVEL {
            emit(span(left, right));
            return;
        }

        let all_ones = (1u64 << bits) - 1;
        let mask = all_ones << total_bits;
        let parent_unit = 1u64 << (total_bits + bits);
        let parent_mask = parent_unit - 1;

        let left_value = (left & mask) >> total_bits;
        let right_value = (right & mask) >> total_bits;
        let from_has_terms = left_value != 0 && !starts_field(level, left);
        let to_has_terms = right_value < limit && right_value != all_ones;

        let higher_left = if from_has_terms {
            (left & !parent_mask).checked_add(parent_unit)
        } else {
            Some(left & !parent_mask)
        };
        let higher_right = if to_has_terms {
            (right & !parent_mask).checked_sub(parent_unit)
        } else {
            Some(right & !parent_mask)
        };

        let (higher_left, higher_right) = match (higher_left, higher_right) {
            (Some(l), Some(r)) if l <= r => (l, r),
            _ => {
                emit(span(left, right));
                return;
            }
        };

        if from_has_terms {
            emit(span(left, left | mask));
        }
        if to_has_terms {
            emit(span(right & !mask, right));
        }

        left = higher_left;
        right = higher_right;
        total_bits += split_bits;
    }
}

/// Decomposes `[from, to]` into the tagged point keys covering it.
///
/// Returns an empty vector when `from > to`.
pub fn calculate_terms(from: DateTerm, to: DateTerm, format: &DateLevelFormat) -> Vec<u64> {
    let mut terms = Vec::new();
    decompose(from, to, format, |span| span.push_terms(&mut terms));
    terms
}

/// Decomposes `[from, to]` into tagged key ranges, at most two per level plus the
/// final one.
///
/// Returns an empty vector when `from > to`.
pub fn calculate_ranges(from: DateTerm, to: DateTerm, format: &DateLevelFormat) -> Vec<KeyRange> {
    let mut ranges = Vec::new();
    decompose(from, to, format, |span| span.push_range(&mut ranges));
    ranges
}
