//! Query orchestration: decomposition, dictionary probes and posting resolution.

use std::sync::Arc;

use futures::future::try_join_all;
use stratum_common::{Result, error::Error};
use stratum_dictionary::{
    DictKey, DictionaryKind, DictionaryReader, KeyWidth, open_dictionary, open_dictionary_async,
};
use stratum_io::ReadAt;

use crate::{
    config::{LocatorOptions, LookupMode},
    posting::{PostingResolver, ResolvedPosting},
    strategy::{DecompositionStrategy, KeyQuery, TierQuery},
    summary::RangeSummary,
};

/// Resolves range queries against the dictionaries of one index leaf.
///
/// Every query goes through the same steps:
/// 1. a query disjoint from the summary bounds matches nothing;
/// 2. the query is clamped to the summary, and a bound that reaches the summary
///    minimum (maximum) is widened to the start (end) of the coarsest unit;
/// 3. the strategy decomposes it into per-tier probes;
/// 4. each term is looked up, each range is scanned from its start up to its end;
/// 5. every dictionary value found is resolved into a posting.
///
/// The async path issues all probes of a query concurrently, then all resolutions;
/// the first error fails the query. Result order carries no meaning. Finding nothing
/// is an empty result, not an error.
pub struct LeafPostingLocator {
    strategy: Arc<dyn DecompositionStrategy>,
    tiers: Vec<Arc<dyn DictionaryReader>>,
    resolver: Arc<dyn PostingResolver>,
    summary: Option<RangeSummary>,
    mode: LookupMode,
}

impl LeafPostingLocator {
    /// Fails with `InvalidArgument` when the number of dictionaries does not match
    /// the strategy, and with `UnsupportedOperation` when a dictionary cannot serve
    /// ordered lookups.
    pub fn new(
        strategy: Arc<dyn DecompositionStrategy>,
        tiers: Vec<Arc<dyn DictionaryReader>>,
        resolver: Arc<dyn PostingResolver>,
    ) -> Result<LeafPostingLocator> {
        check_tiers(strategy.as_ref(), &tiers)?;
        Ok(LeafPostingLocator {
            strategy,
            tiers,
            resolver,
            summary: None,
            mode: LookupMode::default(),
        })
    }

    /// Opens one tiered `u64` dictionary per source and builds a locator over them.
    pub fn open(
        strategy: Arc<dyn DecompositionStrategy>,
        sources: Vec<Arc<dyn ReadAt>>,
        resolver: Arc<dyn PostingResolver>,
        options: &LocatorOptions,
    ) -> Result<LeafPostingLocator> {
        let dict_options = options.dictionary_options();
        let tiers = sources
            .into_iter()
            .map(|source| {
                open_dictionary(DictionaryKind::Tiered, KeyWidth::U64, source, &dict_options)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LeafPostingLocator::new(strategy, tiers, resolver)?.with_mode(options.lookup_mode))
    }

    pub async fn open_async(
        strategy: Arc<dyn DecompositionStrategy>,
        sources: Vec<Arc<dyn ReadAt>>,
        resolver: Arc<dyn PostingResolver>,
        options: &LocatorOptions,
    ) -> Result<LeafPostingLocator> {
        let dict_options = options.dictionary_options();
        let tiers = try_join_all(sources.into_iter().map(|source| {
            open_dictionary_async(DictionaryKind::Tiered, KeyWidth::U64, source, &dict_options)
        }))
        .await?;
        Ok(LeafPostingLocator::new(strategy, tiers, resolver)?.with_mode(options.lookup_mode))
    }

    pub fn with_summary(mut self, summary: RangeSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_mode(mut self, mode: LookupMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn strategy(&self) -> &Arc<dyn DecompositionStrategy> {
        &self.strategy
    }

    pub fn summary(&self) -> Option<&RangeSummary> {
        self.summary.as_ref()
    }

    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    /// The dictionary probes a `[from, to]` query issues.
    pub fn plan(&self, from: u64, to: u64) -> Result<Vec<TierQuery>> {
        check_tiers(self.strategy.as_ref(), &self.tiers)?;
        let (from, to) = match &self.summary {
            Some(summary) => {
                let Some((mut from, mut to)) = summary.clamp(from, to) else {
                    log::debug!(
                        "[{from:#x}, {to:#x}] outside of summary [{:#x}, {:#x}]",
                        summary.min,
                        summary.max
                    );
                    return Ok(Vec::new());
                };
                if from == summary.min {
                    from = self.strategy.widen_lower(from);
                }
                if to == summary.max {
                    to = self.strategy.widen_upper(to);
                }
                (from, to)
            }
            None => (from, to),
        };
        let queries = self.strategy.decompose(from, to, self.mode);
        log::debug!(
            "{} lookup [{from:#x}, {to:#x}]: {} {:?} queries",
            self.strategy.name(),
            queries.len(),
            self.mode
        );
        Ok(queries)
    }

    /// Dictionary values of all keys within `[from, to]`.
    pub fn lookup_values(&self, from: u64, to: u64) -> Result<Vec<u64>> {
        let mut values = Vec::new();
        for query in self.plan(from, to)? {
            self.query_values(query, &mut values)?;
        }
        Ok(values)
    }

    pub async fn lookup_values_async(&self, from: u64, to: u64) -> Result<Vec<u64>> {
        let queries = self.plan(from, to)?;
        let values = try_join_all(
            queries
                .into_iter()
                .map(|query| self.query_values_async(query)),
        )
        .await?;
        Ok(values.into_iter().flatten().collect())
    }

    /// Postings of all keys within `[from, to]`.
    pub fn lookup(&self, from: u64, to: u64) -> Result<Vec<ResolvedPosting>> {
        self.lookup_values(from, to)?
            .into_iter()
            .map(|value| self.resolver.resolve(value))
            .collect()
    }

    pub async fn lookup_async(&self, from: u64, to: u64) -> Result<Vec<ResolvedPosting>> {
        let values = self.lookup_values_async(from, to).await?;
        try_join_all(
            values
                .into_iter()
                .map(|value| self.resolver.resolve_async(value)),
        )
        .await
    }

    /// Postings of a query in epoch milliseconds. A negative left bound is treated
    /// as the epoch; a negative right bound matches nothing.
    pub fn lookup_timestamps(&self, left_ms: i64, right_ms: i64) -> Result<Vec<ResolvedPosting>> {
        match self.strategy.timestamp_bounds(left_ms, right_ms)? {
            Some((from, to)) => self.lookup(from, to),
            None => Ok(Vec::new()),
        }
    }

    pub async fn lookup_timestamps_async(
        &self,
        left_ms: i64,
        right_ms: i64,
    ) -> Result<Vec<ResolvedPosting>> {
        match self.strategy.timestamp_bounds(left_ms, right_ms)? {
            Some((from, to)) => self.lookup_async(from, to).await,
            None => Ok(Vec::new()),
        }
    }

    /// Postings of a query over indexed integers.
    pub fn lookup_integers(&self, from: i64, to: i64) -> Result<Vec<ResolvedPosting>> {
        match self.strategy.integer_bounds(from, to)? {
            Some((from, to)) => self.lookup(from, to),
            None => Ok(Vec::new()),
        }
    }

    pub async fn lookup_integers_async(&self, from: i64, to: i64) -> Result<Vec<ResolvedPosting>> {
        match self.strategy.integer_bounds(from, to)? {
            Some((from, to)) => self.lookup_async(from, to).await,
            None => Ok(Vec::new()),
        }
    }

    fn tier(&self, tier: usize) -> Result<&dyn DictionaryReader> {
        self.tiers.get(tier).map(|dict| dict.as_ref()).ok_or_else(|| {
            Error::invalid_arg("tier", format!("tier {tier} out of {}", self.tiers.len()))
        })
    }

    fn query_values(&self, query: TierQuery, values: &mut Vec<u64>) -> Result<()> {
        let dict = self.tier(query.tier)?;
        match query.query {
            KeyQuery::Term(key) => values.extend(dict.lookup(DictKey::Term(key))?),
            KeyQuery::Range { from, to } => {
                let mut it = dict.seek(DictKey::Term(from))?;
                while let Some(entry) = it.next_entry()? {
                    match entry.key {
                        DictKey::Term(key) if key <= to => values.push(entry.value),
                        _ => break,
                    }
                }
            }
        }
        Ok(())
    }

    async fn query_values_async(&self, query: TierQuery) -> Result<Vec<u64>> {
        let dict = self.tier(query.tier)?;
        let mut values = Vec::new();
        match query.query {
            KeyQuery::Term(key) => values.extend(dict.lookup_async(DictKey::Term(key)).await?),
            KeyQuery::Range { from, to } => {
                let mut it = dict.seek_async(DictKey::Term(from)).await?;
                while let Some(entry) = it.next_entry_async().await? {
                    match entry.key {
                        DictKey::Term(key) if key <= to => values.push(entry.value),
                        _ => break,
                    }
                }
            }
        }
        Ok(values)
    }
}

fn check_tiers(strategy: &dyn DecompositionStrategy, tiers: &[Arc<dyn DictionaryReader>]) -> Result<()> {
    if tiers.len() != strategy.tier_count() {
        return Err(Error::invalid_arg(
            "tiers",
            format!(
                "{} strategy needs {} dictionaries, got {}",
                strategy.name(),
                strategy.tier_count(),
                tiers.len()
            ),
        ));
    }
    if let Some(dict) = tiers.iter().find(|dict| dict.kind() != DictionaryKind::Tiered) {
        return Err(Error::unsupported(
            "range lookup",
            format!("{} dictionaries have no ordered access", dict.kind()),
        ));
    }
    Ok(())
}
