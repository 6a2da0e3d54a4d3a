//! Every timestamp must be matched by exactly one decomposed key when it falls inside
//! the queried range, and by none otherwise.

use std::collections::HashSet;

use stratum_date_term::{
    DateLevelFormat, DateTerm, Granularity, KeyRange, calculate_ranges, calculate_terms,
    encode_date_term_to_terms,
};

/// 2018-01-16 00:00:00 UTC
const BASE_MILLIS: i64 = 1516060800000;
const DAY_MILLIS: i64 = 24 * 3600 * 1000;

fn term(millis: i64) -> DateTerm {
    DateTerm::from_timestamp_millis(millis).expect("representable timestamp")
}

fn window_for(granularity: Granularity) -> i64 {
    match granularity {
        Granularity::Millisecond => 5_000,
        Granularity::Second => 10 * 60_000,
        Granularity::Minute => 6 * 3600_000,
        Granularity::Hour => 5 * DAY_MILLIS,
        Granularity::Day => 120 * DAY_MILLIS,
        Granularity::Month | Granularity::Year => 1500 * DAY_MILLIS,
    }
}

fn in_range(t: DateTerm, from: DateTerm, to: DateTerm, granularity: Granularity) -> bool {
    let t = t.truncate(granularity);
    from.truncate(granularity) <= t && t <= to.truncate(granularity)
}

fn samples(rng: &mut fastrand::Rng, from: i64, to: i64, window: i64) -> Vec<i64> {
    let mut samples = vec![from, to, from - 1, to + 1];
    samples.extend((0..40).map(|_| rng.i64(from - window / 4..=to + window / 4)));
    samples.into_iter().filter(|p| *p >= 0).collect()
}

fn check_terms(format: &DateLevelFormat, rng: &mut fastrand::Rng, from: i64, to: i64) {
    let granularity = format.granularity();
    let terms: HashSet<u64> = calculate_terms(term(from), term(to), format)
        .into_iter()
        .collect();
    for sample in samples(rng, from, to, window_for(granularity)) {
        let t = term(sample);
        let hits = encode_date_term_to_terms(t, format)
            .iter()
            .filter(|token| terms.contains(token))
            .count();
        let expected = usize::from(in_range(t, term(from), term(to), granularity));
        assert_eq!(
            hits, expected,
            "terms: {t} in [{}, {}] with {format:?}",
            term(from),
            term(to)
        );
    }
}

fn check_ranges(format: &DateLevelFormat, rng: &mut fastrand::Rng, from: i64, to: i64) {
    let granularity = format.granularity();
    let ranges: Vec<KeyRange> = calculate_ranges(term(from), term(to), format);
    assert!(ranges.iter().all(|r| r.from <= r.to));
    for sample in samples(rng, from, to, window_for(granularity)) {
        let t = term(sample);
        let hits: usize = encode_date_term_to_terms(t, format)
            .iter()
            .map(|token| ranges.iter().filter(|r| r.contains(*token)).count())
            .sum();
        let expected = usize::from(in_range(t, term(from), term(to), granularity));
        assert_eq!(
            hits, expected,
            "ranges: {t} in [{}, {}] with {format:?}",
            term(from),
            term(to)
        );
    }
}

#[test]
fn test_exact_cover_all_formats() {
    let mut rng = fastrand::Rng::with_seed(20180116);
    for granularity in Granularity::ALL {
        for middle_levels in [false, true] {
            let format = DateLevelFormat::new(granularity, middle_levels);
            let window = window_for(granularity);
            for _ in 0..30 {
                let a = BASE_MILLIS + rng.i64(0..window);
                let b = BASE_MILLIS + rng.i64(0..window);
                let (from, to) = (a.min(b), a.max(b));
                check_terms(&format, &mut rng, from, to);
                check_ranges(&format, &mut rng, from, to);
            }
        }
    }
}

#[test]
fn test_exact_cover_near_epoch() {
    let mut rng = fastrand::Rng::with_seed(1970);
    for granularity in Granularity::ALL {
        let format = DateLevelFormat::new(granularity, true);
        let window = window_for(granularity);
        for _ in 0..10 {
            let from = rng.i64(0..window / 2);
            let to = from + rng.i64(0..window / 2);
            check_ranges(&format, &mut rng, from, to);
        }
    }
}

#[test]
fn test_single_point_ranges() {
    let mut rng = fastrand::Rng::with_seed(7);
    for granularity in Granularity::ALL {
        for middle_levels in [false, true] {
            let format = DateLevelFormat::new(granularity, middle_levels);
            for _ in 0..10 {
                let point = BASE_MILLIS + rng.i64(0..DAY_MILLIS);
                check_terms(&format, &mut rng, point, point);
                check_ranges(&format, &mut rng, point, point);
            }
        }
    }
}

#[test]
fn test_ranges_and_terms_agree() {
    let mut rng = fastrand::Rng::with_seed(42);
    for granularity in [Granularity::Second, Granularity::Hour, Granularity::Day] {
        for middle_levels in [false, true] {
            let format = DateLevelFormat::new(granularity, middle_levels);
            let window = window_for(granularity);
            for _ in 0..20 {
                let a = BASE_MILLIS + rng.i64(0..window);
                let b = BASE_MILLIS + rng.i64(0..window);
                let (from, to) = (term(a.min(b)), term(a.max(b)));
                let terms = calculate_terms(from, to, &format);
                let ranges = calculate_ranges(from, to, &format);
                for t in &terms {
                    assert_eq!(ranges.iter().filter(|r| r.contains(*t)).count(), 1);
                }
                for r in &ranges {
                    assert!(terms.iter().any(|t| r.contains(*t)), "range without terms");
                }
            }
        }
    }
}
