//! Decomposition strategies: how a `[from, to]` query over one key domain becomes
//! per-tier dictionary keys or key ranges.

use stratum_common::{Result, error::Error};
use stratum_date_term::{
    DateLevelFormat, DateTerm, Granularity, calculate_ranges, calculate_terms,
    date_term::{EPOCH_YEAR, MAX_YEAR},
    numeric::{self, NUMERIC_TIER_COUNT},
};

use crate::config::LookupMode;

/// A dictionary probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyQuery {
    Term(u64),
    /// Inclusive key range.
    Range { from: u64, to: u64 },
}

/// A probe addressed to one dictionary tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TierQuery {
    pub tier: usize,
    pub query: KeyQuery,
}

impl TierQuery {
    pub fn term(tier: usize, key: u64) -> TierQuery {
        TierQuery {
            tier,
            query: KeyQuery::Term(key),
        }
    }

    pub fn range(tier: usize, from: u64, to: u64) -> TierQuery {
        TierQuery {
            tier,
            query: KeyQuery::Range { from, to },
        }
    }
}

/// Maps queries of a key domain onto the dictionaries of an index.
pub trait DecompositionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of dictionaries the index is split into.
    fn tier_count(&self) -> usize;

    /// Lowest key of the coarsest unit containing `min`. Used when a query reaches
    /// below the smallest indexed value, where widening costs nothing.
    fn widen_lower(&self, min: u64) -> u64;

    /// Highest key of the coarsest unit containing `max`.
    fn widen_upper(&self, max: u64) -> u64;

    /// Decomposes `[from, to]`; empty when `from > to`.
    fn decompose(&self, from: u64, to: u64, mode: LookupMode) -> Vec<TierQuery>;

    /// Key bounds of a query given in epoch milliseconds, `None` when nothing in the
    /// key domain can match.
    fn timestamp_bounds(&self, left_ms: i64, right_ms: i64) -> Result<Option<(u64, u64)>> {
        let _ = (left_ms, right_ms);
        Err(Error::unsupported(
            "timestamp lookup",
            format!("{} strategy", self.name()),
        ))
    }

    /// Key bounds of a query given as signed integers.
    fn integer_bounds(&self, from: i64, to: i64) -> Result<Option<(u64, u64)>> {
        let _ = (from, to);
        Err(Error::unsupported(
            "integer lookup",
            format!("{} strategy", self.name()),
        ))
    }
}

/// Single-tier date index strategy.
#[derive(Clone, Copy, Debug)]
pub struct DateStrategy {
    format: DateLevelFormat,
    search_granularity: Granularity,
}

impl DateStrategy {
    /// Queries are rounded outward to whole `search_granularity` units (the index
    /// granularity by default). A search granularity finer than the index is
    /// unsupported.
    pub fn new(
        format: DateLevelFormat,
        search_granularity: Option<Granularity>,
    ) -> Result<DateStrategy> {
        let search_granularity = search_granularity.unwrap_or(format.granularity());
        if search_granularity < format.granularity() {
            return Err(Error::unsupported(
                "date search",
                format!(
                    "search granularity {search_granularity} is finer than the indexed {}",
                    format.granularity()
                ),
            ));
        }
        Ok(DateStrategy {
            format,
            search_granularity,
        })
    }

    pub fn format(&self) -> &DateLevelFormat {
        &self.format
    }

    pub fn search_granularity(&self) -> Granularity {
        self.search_granularity
    }

    /// Latest representable instant.
    pub fn max_term() -> DateTerm {
        DateTerm::encode((MAX_YEAR - EPOCH_YEAR) as u32, 0, 0, 0, 0, 0, 0).end_of(Granularity::Year)
    }
}

impl DecompositionStrategy for DateStrategy {
    fn name(&self) -> &'static str {
        "date"
    }

    fn tier_count(&self) -> usize {
        1
    }

    fn widen_lower(&self, min: u64) -> u64 {
        DateTerm::from_raw(min).truncate(Granularity::Year).raw()
    }

    fn widen_upper(&self, max: u64) -> u64 {
        DateTerm::from_raw(max).end_of(Granularity::Year).raw()
    }

    fn decompose(&self, from: u64, to: u64, mode: LookupMode) -> Vec<TierQuery> {
        if from > to {
            return Vec::new();
        }
        let from = DateTerm::from_raw(from).truncate(self.search_granularity);
        let to = DateTerm::from_raw(to).end_of(self.search_granularity);
        match mode {
            LookupMode::Terms => calculate_terms(from, to, &self.format)
                .into_iter()
                .map(|key| TierQuery::term(0, key))
                .collect(),
            LookupMode::Ranges => calculate_ranges(from, to, &self.format)
                .into_iter()
                .map(|range| TierQuery::range(0, range.from, range.to))
                .collect(),
        }
    }

    /// A negative left bound is treated as the epoch; a negative right bound, or a
    /// left bound past the last representable year, matches nothing.
    fn timestamp_bounds(&self, left_ms: i64, right_ms: i64) -> Result<Option<(u64, u64)>> {
        if right_ms < 0 || left_ms > right_ms {
            return Ok(None);
        }
        let Some(from) = DateTerm::from_timestamp_millis(left_ms.max(0)) else {
            return Ok(None);
        };
        let to = DateTerm::from_timestamp_millis(right_ms).unwrap_or_else(DateStrategy::max_term);
        Ok(Some((from.raw(), to.raw())))
    }
}

/// Two-tier numeric range strategy: raw values in the bottom tier, coarser
/// 4-bit levels in the high tier.
#[derive(Clone, Copy, Debug, Default)]
pub struct NumericRangeStrategy {
    signed: bool,
}

impl NumericRangeStrategy {
    pub const BOTTOM_TIER: usize = 0;
    pub const HIGH_TIER: usize = 1;

    pub fn new(signed: bool) -> NumericRangeStrategy {
        NumericRangeStrategy { signed }
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Key of an indexed integer value, or `None` when an unsigned index cannot hold
    /// it.
    pub fn value_key(&self, value: i64) -> Option<u64> {
        if self.signed {
            Some(numeric::encode_i64(value))
        } else {
            u64::try_from(value).ok()
        }
    }

    /// Dictionary tokens of `key` per tier.
    pub fn tokens(key: u64) -> Vec<TierQuery> {
        numeric::tokenize(key)
            .into_iter()
            .enumerate()
            .map(|(level, token)| {
                let tier = if level == 0 {
                    Self::BOTTOM_TIER
                } else {
                    Self::HIGH_TIER
                };
                TierQuery::term(tier, token)
            })
            .collect()
    }
}

impl DecompositionStrategy for NumericRangeStrategy {
    fn name(&self) -> &'static str {
        "numeric range"
    }

    fn tier_count(&self) -> usize {
        NUMERIC_TIER_COUNT
    }

    fn widen_lower(&self, _min: u64) -> u64 {
        0
    }

    fn widen_upper(&self, _max: u64) -> u64 {
        u64::MAX
    }

    fn decompose(&self, from: u64, to: u64, mode: LookupMode) -> Vec<TierQuery> {
        let (bottom, high) = numeric::searching_ranges(from, to);
        let tiers = [(Self::BOTTOM_TIER, bottom), (Self::HIGH_TIER, high)];
        match mode {
            LookupMode::Terms => tiers
                .into_iter()
                .flat_map(|(tier, ranges)| {
                    ranges
                        .into_iter()
                        .flat_map(numeric::range_terms)
                        .map(move |key| TierQuery::term(tier, key))
                })
                .collect(),
            LookupMode::Ranges => tiers
                .into_iter()
                .flat_map(|(tier, ranges)| {
                    ranges
                        .into_iter()
                        .map(move |(from, to)| TierQuery::range(tier, from, to))
                })
                .collect(),
        }
    }

    fn integer_bounds(&self, from: i64, to: i64) -> Result<Option<(u64, u64)>> {
        if from > to {
            return Ok(None);
        }
        if self.signed {
            return Ok(Some((numeric::encode_i64(from), numeric::encode_i64(to))));
        }
        if to < 0 {
            return Ok(None);
        }
        Ok(Some((from.max(0) as u64, to as u64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_date_term::encode_date_term_to_terms;

    fn minute_format() -> DateLevelFormat {
        DateLevelFormat::new(Granularity::Minute, false)
    }

    #[test]
    fn test_search_granularity_rounding() {
        let strategy = DateStrategy::new(minute_format(), Some(Granularity::Hour)).unwrap();
        let from = DateTerm::from_calendar(2018, 1, 16, 4, 19, 0, 0).unwrap();
        let to = DateTerm::from_calendar(2018, 1, 16, 9, 52, 0, 0).unwrap();
        let queries = strategy.decompose(from.raw(), to.raw(), LookupMode::Terms);
        // Rounded outward to hours 4 through 9, which collapse to six hour keys.
        let hours: Vec<(u32, u8)> = queries
            .iter()
            .map(|q| match q.query {
                KeyQuery::Term(key) => (DateTerm::from_raw(key).hour(), DateTerm::from_raw(key).level()),
                KeyQuery::Range { .. } => unreachable!(),
            })
            .collect();
        let hour_level = Granularity::Hour.level();
        assert_eq!(
            hours,
            (4..=9).map(|hour| (hour, hour_level)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_date_terms_match_indexed_tokens() {
        let strategy = DateStrategy::new(minute_format(), None).unwrap();
        let from = DateTerm::from_calendar(2018, 1, 16, 4, 19, 0, 0).unwrap();
        let to = DateTerm::from_calendar(2018, 1, 16, 9, 52, 59, 999).unwrap();
        let inside = DateTerm::from_calendar(2018, 1, 16, 7, 3, 12, 5).unwrap();
        let outside = DateTerm::from_calendar(2018, 1, 16, 9, 53, 0, 0).unwrap();

        let queries = strategy.decompose(from.raw(), to.raw(), LookupMode::Terms);
        let hits = |term: DateTerm| {
            encode_date_term_to_terms(term, strategy.format())
                .into_iter()
                .filter(|token| queries.contains(&TierQuery::term(0, *token)))
                .count()
        };
        assert_eq!(hits(inside), 1);
        assert_eq!(hits(from), 1);
        assert_eq!(hits(to), 1);
        assert_eq!(hits(outside), 0);
    }

    #[test]
    fn test_timestamp_bounds() {
        let strategy = DateStrategy::new(DateLevelFormat::new(Granularity::Year, false), None)
            .unwrap();
        let (from, to) = strategy.timestamp_bounds(-5, 0).unwrap().unwrap();
        let epoch = DateTerm::from_calendar(1970, 1, 1, 0, 0, 0, 0).unwrap();
        assert_eq!((from, to), (epoch.raw(), epoch.raw()));
        assert_eq!(
            strategy.decompose(from, to, LookupMode::Terms),
            vec![TierQuery::term(0, DateTerm::encode(0, 0, 0, 0, 0, 0, 0).with_level(12).raw())]
        );
        assert_eq!(strategy.timestamp_bounds(-10, -1).unwrap(), None);
        assert_eq!(strategy.timestamp_bounds(10, 5).unwrap(), None);

        let (_, to) = strategy.timestamp_bounds(0, i64::MAX).unwrap().unwrap();
        assert_eq!(to, DateStrategy::max_term().raw());
        assert!(strategy.integer_bounds(0, 1).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_widening() {
        let strategy = DateStrategy::new(minute_format(), None).unwrap();
        let min = DateTerm::from_calendar(2018, 3, 4, 5, 6, 7, 8).unwrap();
        let widened = DateTerm::from_raw(strategy.widen_lower(min.raw()));
        assert_eq!((widened.year(), widened.month(), widened.day()), (2018, 0, 0));
        let widened = DateTerm::from_raw(strategy.widen_upper(min.raw()));
        assert_eq!(widened.year(), 2018);
        assert_eq!(widened, widened.end_of(Granularity::Year));

        let numeric = NumericRangeStrategy::new(false);
        assert_eq!(numeric.widen_lower(77), 0);
        assert_eq!(numeric.widen_upper(77), u64::MAX);
    }

    #[test]
    fn test_numeric_tiers() {
        let strategy = NumericRangeStrategy::new(false);
        assert_eq!(strategy.tier_count(), 2);
        let queries = strategy.decompose(0x13, 0x2f, LookupMode::Ranges);
        assert_eq!(
            queries,
            vec![
                TierQuery::range(0, 0x13, 0x1f),
                TierQuery::range(1, 2 | 1 << 60, 2 | 1 << 60),
            ]
        );
        let terms = strategy.decompose(0x13, 0x2f, LookupMode::Terms);
        assert_eq!(terms.len(), 14);
        assert!(terms[..13].iter().all(|q| q.tier == 0));
        assert_eq!(terms[13], TierQuery::term(1, 2 | 1 << 60));

        assert!(strategy.decompose(5, 4, LookupMode::Terms).is_empty());
    }

    #[test]
    fn test_numeric_tokens_hit_once() {
        let strategy = NumericRangeStrategy::new(true);
        let (from, to) = strategy.integer_bounds(-300, 1200).unwrap().unwrap();
        let queries = strategy.decompose(from, to, LookupMode::Ranges);
        for value in [-301i64, -300, -1, 0, 1, 555, 1200, 1201] {
            let key = strategy.value_key(value).unwrap();
            let hits = NumericRangeStrategy::tokens(key)
                .into_iter()
                .filter(|token| {
                    let KeyQuery::Term(token_key) = token.query else {
                        return false;
                    };
                    queries.iter().any(|q| {
                        q.tier == token.tier
                            && matches!(q.query, KeyQuery::Range { from: lo, to: hi } if lo <= token_key && token_key <= hi)
                    })
                })
                .count();
            let expected = usize::from((-300..=1200).contains(&value));
            assert_eq!(hits, expected, "value {value}");
        }
    }

    #[test]
    fn test_unsigned_integer_bounds() {
        let strategy = NumericRangeStrategy::new(false);
        assert_eq!(strategy.integer_bounds(-5, 10).unwrap(), Some((0, 10)));
        assert_eq!(strategy.integer_bounds(-5, -1).unwrap(), None);
        assert_eq!(strategy.value_key(-1), None);
        assert!(strategy.timestamp_bounds(0, 1).unwrap_err().is_unsupported());
    }
}
