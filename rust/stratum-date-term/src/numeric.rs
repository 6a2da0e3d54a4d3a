//! Two-tier hierarchical encoding of plain `u64` values.
//!
//! A value is indexed under sixteen levels of 4 bits each. Level 0 is the raw value
//! and lives in the bottom tier; levels 1..=15 hold `(value >> 4 * level)` tagged with
//! the level in the top four bits and live in the high tier.

use crate::levels::LEVEL_TAG_SHIFT;

/// Number of bits per numeric level.
pub const NUMERIC_LEVEL_BITS: u32 = 4;

/// Number of numeric levels (bottom plus fifteen high levels).
pub const NUMERIC_LEVEL_COUNT: u64 = 16;

/// Number of dictionary tiers of the numeric range format.
pub const NUMERIC_TIER_COUNT: usize = 2;

const NIBBLE: u64 = 0xF;

/// Maps a signed value onto `u64` preserving order.
#[inline]
pub const fn encode_i64(value: i64) -> u64 {
    (value as u64) ^ (1 << 63)
}

#[inline]
pub const fn decode_i64(value: u64) -> i64 {
    (value ^ (1 << 63)) as i64
}

/// The indexing tokens of `value`: the raw value first (bottom tier), then one tagged
/// token per high level.
pub fn tokenize(value: u64) -> Vec<u64> {
    let mut tokens = Vec::with_capacity(NUMERIC_LEVEL_COUNT as usize);
    tokens.push(value);
    let mut shifted = value;
    for level in 1..NUMERIC_LEVEL_COUNT {
        shifted >>= NUMERIC_LEVEL_BITS;
        tokens.push(shifted + (level << LEVEL_TAG_SHIFT));
    }
    tokens
}

/// Decomposes `[left, right]` into inclusive key ranges of the bottom tier and of the
/// high tier, respectively.
///
/// Returns two empty vectors when `left > right`.
pub fn searching_ranges(left: u64, right: u64) -> (Vec<(u64, u64)>, Vec<(u64, u64)>) {
    let mut bottom_ranges = vec![];
    let mut higher_ranges = vec![];
    if left > right {
        return (bottom_ranges, higher_ranges);
    }

    let mut left = left;
    let mut right = right;
    let mut level = 0u64;
    loop {
        let tag = level << LEVEL_TAG_SHIFT;
        let level_ranges = if level == 0 {
            &mut bottom_ranges
        } else {
            &mut higher_ranges
        };

        let has_lower = left & NIBBLE != 0;
        let has_upper = right & NIBBLE != NIBBLE;
        let next_left = (left >> NUMERIC_LEVEL_BITS) + has_lower as u64;
        let next_right = (right >> NUMERIC_LEVEL_BITS).checked_sub(has_upper as u64);

        let next = match next_right {
            Some(next_right) if level < NUMERIC_LEVEL_COUNT - 1 && next_left <= next_right => {
                (next_left, next_right)
            }
            _ => {
                level_ranges.push((left + tag, right + tag));
                break;
            }
        };

        if has_lower {
            level_ranges.push((left + tag, (left | NIBBLE) + tag));
        }
        if has_upper {
            level_ranges.push(((right & !NIBBLE) + tag, right + tag));
        }

        (left, right) = next;
        level += 1;
    }

    (bottom_ranges, higher_ranges)
}

/// Enumerates the point keys of an inclusive range produced by `searching_ranges`.
pub fn range_terms(range: (u64, u64)) -> impl Iterator<Item = u64> {
    range.0..=range.1
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_ranges {
        ($start:expr, $end:expr, $expected_bottom:expr, $expected_higher:expr) => {
            let (bottom_ranges, higher_ranges) = searching_ranges($start, $end);
            assert_eq!(bottom_ranges, $expected_bottom);
            assert_eq!(higher_ranges, $expected_higher);
        };
    }

    macro_rules! make_range {
        ($left:expr, $right:expr, $level:expr) => {
            ($left + ($level << 60), $right + ($level << 60))
        };
    }

    #[test]
    fn test_tokenize() {
        let value = u64::MAX;
        let mut token = value;
        let mut expect = vec![token];
        for level in 1..16 {
            token >>= 4;
            expect.push(token + (level << 60));
        }
        assert_eq!(tokenize(value), expect);
        assert_eq!(tokenize(0x1234)[..4], [0x1234_u64, 0x123 | 1 << 60, 0x12 | 2 << 60, 0x1 | 3 << 60]);
    }

    #[test]
    fn test_signed_order() {
        let values = [i64::MIN, -100, -1, 0, 1, 100, i64::MAX];
        let encoded: Vec<u64> = values.iter().map(|v| encode_i64(*v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for v in values {
            assert_eq!(decode_i64(encode_i64(v)), v);
        }
    }

    #[test]
    fn test_empty_range() {
        assert_ranges!(5, 4, Vec::<(u64, u64)>::new(), Vec::<(u64, u64)>::new());
    }

    #[test]
    fn test_searching_basic() {
        assert_ranges!(0, 0, vec![(0, 0)], vec![]);
        assert_ranges!(1, 1, vec![(1, 1)], vec![]);
        assert_ranges!(2, 16, vec![(2, 16)], vec![]);
        assert_ranges!(28, 36, vec![(28, 36)], vec![]);
        assert_ranges!(28, 48, vec![(28, 31), (48, 48)], vec![make_range!(2, 2, 1)]);
        assert_ranges!(32, 47, vec![], vec![make_range!(2, 2, 1)]);
        assert_ranges!(240, 256, vec![(256, 256)], vec![make_range!(15, 15, 1)]);
        assert_ranges!(255, 511, vec![(255, 255)], vec![make_range!(1, 1, 2)]);
        assert_ranges!(0, (11_u64 << 32) - 1, vec![], vec![make_range!(0, 10, 8)]);
        assert_ranges!(
            1_u64 << 32,
            1_u64 << 32 | 30,
            vec![(1_u64 << 32 | 16, 1_u64 << 32 | 30)],
            vec![make_range!(1_u64 << 28, 1_u64 << 28, 1)]
        );
    }

    #[test]
    fn test_searching_top_level() {
        assert_ranges!(1_u64 << 60, (3_u64 << 60) - 1, vec![], vec![make_range!(1, 2, 15)]);
        assert_ranges!(0, u64::MAX, vec![], vec![make_range!(0, 15, 15)]);
        let left = (1_u64 << 60) - 1;
        assert_ranges!(left, u64::MAX, vec![(left, left)], vec![make_range!(1, 15, 15)]);
        let higher: Vec<_> = (1..16).map(|i| make_range!(1, 15, i)).collect();
        assert_ranges!(1, u64::MAX, vec![(1, 15)], higher);
        assert_ranges!(0, left, vec![], vec![make_range!(0, 0, 15)]);
    }

    #[test]
    fn test_searching_big_number() {
        let left = u64::MAX - 5;
        assert_ranges!(left, u64::MAX, vec![(left, u64::MAX)], vec![]);
        let left = u64::MAX - 15;
        assert_ranges!(left, u64::MAX - 1, vec![(left, u64::MAX - 1)], vec![]);
        assert_ranges!(left, u64::MAX, vec![], vec![make_range!(left >> 4, u64::MAX >> 4, 1)]);
        let left = u64::MAX - 65536 - 255;
        assert_ranges!(
            left,
            u64::MAX,
            vec![],
            vec![
                make_range!(left >> 8, left >> 8, 2),
                make_range!(u64::MAX >> 16, u64::MAX >> 16, 4)
            ]
        );
    }

    #[test]
    fn test_right_at_zero_parent_falls_back() {
        // right >> 4 == 0 with a partial upper nibble must not underflow.
        assert_ranges!(3, 9, vec![(3, 9)], vec![]);
        assert_ranges!(0, 9, vec![(0, 9)], vec![]);
    }

    #[test]
    fn test_tokens_hit_exactly_one_range() {
        let mut rng = fastrand::Rng::with_seed(99);
        for _ in 0..200 {
            let a = rng.u64(..1 << 20);
            let b = rng.u64(..1 << 20);
            let (left, right) = (a.min(b), a.max(b));
            let (bottom, higher) = searching_ranges(left, right);
            for _ in 0..50 {
                let value = rng.u64(left.saturating_sub(100)..=right + 100);
                let tokens = tokenize(value);
                let hits = bottom.iter().filter(|r| r.0 <= tokens[0] && tokens[0] <= r.1).count()
                    + tokens[1..]
                        .iter()
                        .map(|t| higher.iter().filter(|r| r.0 <= *t && *t <= r.1).count())
                        .sum::<usize>();
                let expected = usize::from(left <= value && value <= right);
                assert_eq!(hits, expected, "value {value} in [{left}, {right}]");
            }
        }
    }
}
