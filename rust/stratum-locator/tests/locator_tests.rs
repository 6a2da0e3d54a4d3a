use std::{collections::BTreeMap, ops::Range, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use stratum_common::{Result, error::ErrorKind};
use stratum_date_term::{DateLevelFormat, DateTerm, Granularity, encode_date_term_to_terms};
use stratum_dictionary::{
    DictKey, DictionaryIterator, DictionaryKind, DictionaryLayout, DictionaryOptions,
    DictionaryReader, KeyWidth, TieredDictionaryReader, TieredDictionaryWriter,
};
use stratum_io::{ReadAt, StorageProfile};
use stratum_locator::{
    DateIndexConfig, DateStrategy, DecompositionStrategy, INLINE_POSTING_FLAG, KeyQuery,
    LeafPostingLocator, LocatorOptions, LookupMode, NumericRangeStrategy, PostingFileResolver,
    RangeIndexConfig, RangeSummary, ResolvedPosting, encode_posting_header,
};

/// Serves reads without exposing a memory view, like a file on disk.
struct Paged(Vec<u8>);

impl ReadAt for Paged {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.0.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        let end = (range.end as usize).min(self.0.len());
        let start = (range.start as usize).min(end);
        Ok(Bytes::copy_from_slice(&self.0[start..end]))
    }

    fn storage_profile(&self) -> StorageProfile {
        Default::default()
    }
}

/// A paged dictionary source whose entry region cannot be read.
struct UnreadableEntries {
    data: Vec<u8>,
    entry_region_end: u64,
}

impl UnreadableEntries {
    fn new(data: Vec<u8>) -> Arc<dyn ReadAt> {
        let layout = *TieredDictionaryReader::<u64>::open(
            Arc::new(Bytes::from(data.clone())),
            &DictionaryOptions::new(),
        )
        .unwrap()
        .layout();
        Arc::new(UnreadableEntries {
            data,
            entry_region_end: layout.data_len,
        })
    }
}

impl ReadAt for UnreadableEntries {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        if range.start < self.entry_region_end {
            return Err(std::io::Error::other("disk gone"));
        }
        let end = (range.end as usize).min(self.data.len());
        let start = (range.start as usize).min(end);
        Ok(Bytes::copy_from_slice(&self.data[start..end]))
    }

    fn storage_profile(&self) -> StorageProfile {
        Default::default()
    }
}

/// An index leaf: one dictionary per tier plus the posting file they point into.
struct TestIndex {
    tiers: Vec<Vec<u8>>,
    postings: Vec<u8>,
}

impl TestIndex {
    /// `docs` lists the `(tier, key)` tokens of every document.
    fn build(tier_count: usize, docs: &[(u32, Vec<(usize, u64)>)]) -> TestIndex {
        let mut tier_keys = vec![BTreeMap::<u64, Vec<u32>>::new(); tier_count];
        for (doc, tokens) in docs {
            for (tier, key) in tokens {
                tier_keys[*tier].entry(*key).or_default().push(*doc);
            }
        }

        let mut postings = Vec::new();
        let tiers = tier_keys
            .into_iter()
            .map(|keys| {
                let mut writer = TieredDictionaryWriter::<u64, Vec<u8>>::new(Vec::new());
                for (key, docs) in keys {
                    let value = if docs.len() == 1 {
                        INLINE_POSTING_FLAG | docs[0] as u64
                    } else {
                        let offset = postings.len() as u64;
                        postings.extend_from_slice(&encode_posting_header(
                            (docs.len() * 4) as u32,
                            docs.len() as u32,
                        ));
                        for doc in docs {
                            postings.extend_from_slice(&doc.to_le_bytes());
                        }
                        offset
                    };
                    writer.add_term(key, value).unwrap();
                }
                writer.finish().unwrap()
            })
            .collect();
        TestIndex { tiers, postings }
    }

    fn sources(&self, paged: bool) -> Vec<Arc<dyn ReadAt>> {
        self.tiers
            .iter()
            .map(|tier| {
                if paged {
                    Arc::new(Paged(tier.clone())) as Arc<dyn ReadAt>
                } else {
                    Arc::new(Bytes::from(tier.clone())) as Arc<dyn ReadAt>
                }
            })
            .collect()
    }

    fn locator(
        &self,
        strategy: Arc<dyn DecompositionStrategy>,
        options: &LocatorOptions,
        paged: bool,
    ) -> LeafPostingLocator {
        let resolver = Arc::new(PostingFileResolver::new(Arc::new(self.postings.clone())));
        LeafPostingLocator::open(strategy, self.sources(paged), resolver, options).unwrap()
    }

    fn docs(&self, postings: &[ResolvedPosting]) -> Vec<u32> {
        let mut docs = Vec::new();
        for posting in postings {
            match posting {
                ResolvedPosting::Inline(doc) => docs.push(*doc as u32),
                ResolvedPosting::Location(location) => {
                    let body =
                        &self.postings[location.file_offset as usize..location.end() as usize];
                    assert_eq!(body.len(), location.doc_count_hint as usize * 4);
                    docs.extend(
                        body.chunks_exact(4)
                            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
                    );
                }
            }
        }
        docs.sort_unstable();
        docs
    }
}

const WINDOW_START_MS: i64 = 1_515_903_540_000; // 2018-01-14 04:19
const MINUTE_MS: i64 = 60_000;

fn minute_docs(rng: &mut fastrand::Rng, count: usize) -> Vec<(u32, DateTerm)> {
    (0..count as u32)
        .map(|doc| {
            let millis = WINDOW_START_MS + rng.i64(0..7200) * MINUTE_MS;
            (doc, DateTerm::from_timestamp_millis(millis).unwrap())
        })
        .collect()
}

fn date_index(docs: &[(u32, DateTerm)], format: &DateLevelFormat) -> TestIndex {
    let tokens: Vec<_> = docs
        .iter()
        .map(|(doc, term)| {
            let tokens = encode_date_term_to_terms(*term, format)
                .into_iter()
                .map(|key| (0, key))
                .collect();
            (*doc, tokens)
        })
        .collect();
    TestIndex::build(1, &tokens)
}

fn expected_docs(docs: &[(u32, DateTerm)], from: DateTerm, to: DateTerm) -> Vec<u32> {
    let mut expected: Vec<u32> = docs
        .iter()
        .filter(|(_, term)| from <= *term && *term <= to)
        .map(|(doc, _)| *doc)
        .collect();
    expected.sort_unstable();
    expected
}

fn summary_of(docs: &[(u32, DateTerm)]) -> RangeSummary {
    let min = docs.iter().map(|(_, term)| *term).min().unwrap();
    let max = docs.iter().map(|(_, term)| *term).max().unwrap();
    RangeSummary::from_dates(min, max).unwrap()
}

#[test]
fn test_date_locator_matches_scan() {
    let mut rng = fastrand::Rng::with_seed(21);
    let docs = minute_docs(&mut rng, 2000);

    for middle_levels in [false, true] {
        let config = DateIndexConfig::new(Granularity::Minute, middle_levels);
        let index = date_index(&docs, &config.level_format());
        for (mode, paged, with_summary) in [
            (LookupMode::Terms, false, false),
            (LookupMode::Ranges, false, true),
            (LookupMode::Ranges, true, false),
            (LookupMode::Terms, true, true),
        ] {
            let options = LocatorOptions {
                lookup_mode: mode,
                ..Default::default()
            };
            let mut locator = index.locator(Arc::new(config.strategy().unwrap()), &options, paged);
            if with_summary {
                locator = locator.with_summary(summary_of(&docs));
            }
            for _ in 0..30 {
                let a = WINDOW_START_MS + rng.i64(-100..7300) * MINUTE_MS;
                let b = WINDOW_START_MS + rng.i64(-100..7300) * MINUTE_MS;
                let (from, to) = (
                    DateTerm::from_timestamp_millis(a.min(b)).unwrap(),
                    DateTerm::from_timestamp_millis(a.max(b)).unwrap(),
                );
                let postings = locator.lookup(from.raw(), to.raw()).unwrap();
                assert_eq!(
                    index.docs(&postings),
                    expected_docs(&docs, from, to),
                    "[{from}, {to}] {mode:?} middle levels {middle_levels}"
                );
            }
        }
    }
}

#[test]
fn test_minute_scenario_timestamps() {
    let format = DateLevelFormat::new(Granularity::Minute, false);
    let minutes = [
        (4, 18),
        (4, 19),
        (4, 59),
        (5, 0),
        (7, 30),
        (8, 59),
        (9, 52),
        (9, 53),
    ];
    let docs: Vec<(u32, DateTerm)> = minutes
        .iter()
        .enumerate()
        .map(|(doc, (hour, minute))| {
            (
                doc as u32,
                DateTerm::from_calendar(2018, 1, 16, *hour, *minute, 0, 0).unwrap(),
            )
        })
        .collect();
    let index = date_index(&docs, &format);
    let locator = index.locator(
        Arc::new(DateStrategy::new(format, None).unwrap()),
        &LocatorOptions::default(),
        false,
    );

    let postings = locator
        .lookup_timestamps(1_516_076_340_000, 1_516_096_320_000)
        .unwrap();
    assert_eq!(index.docs(&postings), vec![1, 2, 3, 4, 5, 6]);

    assert!(locator.lookup_timestamps(-10, -1).unwrap().is_empty());
    let postings = locator.lookup_timestamps(-10, 1_516_076_340_000).unwrap();
    assert_eq!(index.docs(&postings), vec![0, 1]);
    assert!(locator.lookup_integers(0, 1).unwrap_err().is_unsupported());
}

#[test]
fn test_summary_bounds() {
    let mut rng = fastrand::Rng::with_seed(4);
    let docs = minute_docs(&mut rng, 300);
    let format = DateLevelFormat::new(Granularity::Minute, true);
    let index = date_index(&docs, &format);
    let summary = summary_of(&docs);
    let locator = index
        .locator(
            Arc::new(DateStrategy::new(format, None).unwrap()),
            &LocatorOptions::default(),
            false,
        )
        .with_summary(summary);

    // Entirely outside the summary: nothing is probed.
    assert!(locator.plan(0, summary.min - 1).unwrap().is_empty());
    assert!(locator.plan(summary.max + 1, u64::MAX >> 4).unwrap().is_empty());
    assert!(locator.lookup(summary.max + 1, u64::MAX >> 4).unwrap().is_empty());

    // A query covering everything collapses to the year of the data.
    let queries = locator.plan(0, u64::MAX >> 4).unwrap();
    assert_eq!(queries.len(), 1);
    let KeyQuery::Range { from, to } = queries[0].query else {
        panic!("expected a range");
    };
    assert_eq!(from, to);
    assert_eq!(DateTerm::from_raw(from).level(), Granularity::Year.level());
    let postings = locator.lookup(0, u64::MAX >> 4).unwrap();
    assert_eq!(index.docs(&postings), (0..300).collect::<Vec<u32>>());
}

fn numeric_index(values: &[(u32, u64)]) -> TestIndex {
    let tokens: Vec<_> = values
        .iter()
        .map(|(doc, value)| {
            let tokens = NumericRangeStrategy::tokens(*value)
                .into_iter()
                .map(|token| match token.query {
                    KeyQuery::Term(key) => (token.tier, key),
                    KeyQuery::Range { .. } => unreachable!(),
                })
                .collect();
            (*doc, tokens)
        })
        .collect();
    TestIndex::build(2, &tokens)
}

#[test]
fn test_numeric_locator_matches_scan() {
    let mut rng = fastrand::Rng::with_seed(99);
    let values: Vec<(u32, u64)> = (0..1500u32).map(|doc| (doc, rng.u64(0..100_000))).collect();
    let index = numeric_index(&values);
    let strategy = Arc::new(RangeIndexConfig::default().strategy());

    for mode in [LookupMode::Terms, LookupMode::Ranges] {
        let options = LocatorOptions {
            lookup_mode: mode,
            ..Default::default()
        };
        let locator = index.locator(strategy.clone(), &options, true);
        for _ in 0..40 {
            let a = rng.u64(0..110_000);
            let b = rng.u64(0..110_000);
            let (from, to) = (a.min(b), a.max(b));
            let mut expected: Vec<u32> = values
                .iter()
                .filter(|(_, value)| (from..=to).contains(value))
                .map(|(doc, _)| *doc)
                .collect();
            expected.sort_unstable();
            let postings = locator.lookup(from, to).unwrap();
            assert_eq!(index.docs(&postings), expected, "[{from}, {to}] {mode:?}");
        }
    }
}

#[test]
fn test_signed_integers() {
    let strategy = NumericRangeStrategy::new(true);
    let values: Vec<(u32, i64)> = (-50..50i64).map(|v| ((v + 50) as u32, v * 1000)).collect();
    let keyed: Vec<(u32, u64)> = values
        .iter()
        .map(|(doc, value)| (*doc, strategy.value_key(*value).unwrap()))
        .collect();
    let index = numeric_index(&keyed);
    let locator = index.locator(Arc::new(strategy), &LocatorOptions::default(), false);

    let postings = locator.lookup_integers(-2500, 1000).unwrap();
    assert_eq!(index.docs(&postings), vec![48, 49, 50, 51]);
    assert!(locator.lookup_integers(5, 4).unwrap().is_empty());
    assert!(locator.lookup_timestamps(0, 1).unwrap_err().is_unsupported());
}

/// A tiered dictionary that reports itself as hash-organized.
struct HashLike(TieredDictionaryReader<u64>);

#[async_trait]
impl DictionaryReader for HashLike {
    fn kind(&self) -> DictionaryKind {
        DictionaryKind::Hash
    }

    fn key_width(&self) -> KeyWidth {
        KeyWidth::U64
    }

    fn layout(&self) -> &DictionaryLayout {
        self.0.layout()
    }

    fn lookup(&self, key: DictKey) -> Result<Option<u64>> {
        self.0.lookup(key)
    }

    async fn lookup_async(&self, key: DictKey) -> Result<Option<u64>> {
        self.0.lookup_async(key).await
    }

    fn seek(&self, key: DictKey) -> Result<Box<dyn DictionaryIterator>> {
        self.0.seek(key)
    }

    async fn seek_async(&self, key: DictKey) -> Result<Box<dyn DictionaryIterator>> {
        self.0.seek_async(key).await
    }
}

#[test]
fn test_construction_errors() {
    let index = numeric_index(&[(0, 5), (1, 500)]);
    let resolver = Arc::new(PostingFileResolver::new(Arc::new(index.postings.clone())));
    let open = |bytes: &Vec<u8>| {
        TieredDictionaryReader::<u64>::open(Arc::new(bytes.clone()), &DictionaryOptions::new())
            .unwrap()
    };

    let err = LeafPostingLocator::open(
        Arc::new(NumericRangeStrategy::default()),
        index.sources(false)[..1].to_vec(),
        resolver.clone(),
        &LocatorOptions::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));

    let tiers: Vec<Arc<dyn DictionaryReader>> = vec![
        Arc::new(open(&index.tiers[0])),
        Arc::new(HashLike(open(&index.tiers[1]))),
    ];
    let err = LeafPostingLocator::new(Arc::new(NumericRangeStrategy::default()), tiers, resolver)
        .err()
        .unwrap();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn test_async_matches_sync() {
    let mut rng = fastrand::Rng::with_seed(77);
    let docs = minute_docs(&mut rng, 1000);
    let config = DateIndexConfig::new(Granularity::Minute, true);
    let index = date_index(&docs, &config.level_format());
    let resolver = Arc::new(PostingFileResolver::new(Arc::new(Paged(index.postings.clone()))));

    for mode in [LookupMode::Terms, LookupMode::Ranges] {
        let options = LocatorOptions {
            lookup_mode: mode,
            bloom_filter: Some(Default::default()),
            ..Default::default()
        };
        let locator = LeafPostingLocator::open_async(
            Arc::new(config.strategy().unwrap()),
            index.sources(true),
            resolver.clone(),
            &options,
        )
        .await
        .unwrap()
        .with_summary(summary_of(&docs));

        for _ in 0..20 {
            let a = WINDOW_START_MS + rng.i64(0..7200) * MINUTE_MS;
            let b = WINDOW_START_MS + rng.i64(0..7200) * MINUTE_MS;
            let (left, right) = (a.min(b), a.max(b));
            let from = DateTerm::from_timestamp_millis(left).unwrap();
            let to = DateTerm::from_timestamp_millis(right).unwrap();

            let postings = locator.lookup_timestamps_async(left, right).await.unwrap();
            assert_eq!(index.docs(&postings), expected_docs(&docs, from, to));

            let mut sync_values = locator.lookup_values(from.raw(), to.raw()).unwrap();
            let mut async_values = locator.lookup_values_async(from.raw(), to.raw()).await.unwrap();
            sync_values.sort_unstable();
            async_values.sort_unstable();
            assert_eq!(sync_values, async_values);
        }
    }
}

fn assert_io_error<T: std::fmt::Debug>(result: Result<T>) {
    match result.unwrap_err().into_kind() {
        ErrorKind::Io { source, .. } => assert_eq!(source.to_string(), "disk gone"),
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn test_block_read_failures_propagate() {
    let mut rng = fastrand::Rng::with_seed(5);
    let docs = minute_docs(&mut rng, 500);
    let config = DateIndexConfig::new(Granularity::Minute, false);
    let index = date_index(&docs, &config.level_format());
    let resolver = Arc::new(PostingFileResolver::new(Arc::new(index.postings.clone())));
    let (left, right) = (WINDOW_START_MS, WINDOW_START_MS + 7200 * MINUTE_MS);

    for mode in [LookupMode::Terms, LookupMode::Ranges] {
        let options = LocatorOptions {
            lookup_mode: mode,
            ..Default::default()
        };
        let sources = index
            .tiers
            .iter()
            .map(|tier| UnreadableEntries::new(tier.clone()))
            .collect();
        let locator = LeafPostingLocator::open(
            Arc::new(config.strategy().unwrap()),
            sources,
            resolver.clone(),
            &options,
        )
        .unwrap();

        assert_io_error(locator.lookup_timestamps(left, right));
        assert_io_error(locator.lookup_timestamps_async(left, right).await);
        // A disjoint range needs no dictionary reads at all.
        assert!(locator.lookup_timestamps(-10, -1).unwrap().is_empty());
    }
}
