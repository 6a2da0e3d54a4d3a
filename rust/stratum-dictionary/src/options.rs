//! Reader options and the shared bloom filter cache.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use ahash::AHashMap;
use stratum_bloom_filters::{BloomFilterConfig, KeyFilter};

type FilterCell = Arc<OnceLock<Option<Arc<KeyFilter>>>>;

/// Keeps built key filters alive across dictionary opens.
///
/// Each cache key owns a `OnceLock`, so concurrent openers of the same dictionary
/// build its filter at most once and all observe the same result, including a
/// "no filter" outcome.
#[derive(Default)]
pub struct FilterCache {
    entries: Mutex<AHashMap<String, FilterCell>>,
}

impl FilterCache {
    pub fn new() -> FilterCache {
        Default::default()
    }

    /// Returns the filter cached under `key`, building it with `build` on first use.
    pub fn get_or_build<F>(&self, key: &str, build: F) -> Option<Arc<KeyFilter>>
    where
        F: FnOnce() -> Option<Arc<KeyFilter>>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(key.to_string()).or_default().clone()
        };
        cell.get_or_init(build).clone()
    }

    /// Returns the settled build outcome for `key`, or `None` when no build has
    /// completed yet.
    pub fn get(&self, key: &str) -> Option<Option<Arc<KeyFilter>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).and_then(|cell| cell.get().cloned())
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FilterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCache")
            .field("len", &self.len())
            .finish()
    }
}

/// Options for opening a tiered dictionary.
#[derive(Clone, Debug, Default)]
pub struct DictionaryOptions {
    pub(crate) load_into_memory: bool,
    pub(crate) bloom_filter: Option<BloomFilterConfig>,
    pub(crate) filter_cache: Option<(Arc<FilterCache>, String)>,
}

impl DictionaryOptions {
    pub fn new() -> DictionaryOptions {
        Default::default()
    }

    /// Reads the whole entry region at open, even when the source is not memory
    /// resident.
    pub fn load_into_memory(mut self, load: bool) -> Self {
        self.load_into_memory = load;
        self
    }

    /// Builds a key filter over all dictionary keys at open.
    pub fn bloom_filter(mut self, config: BloomFilterConfig) -> Self {
        self.bloom_filter = Some(config);
        self
    }

    /// Shares the key filter through `cache` under `key`. Only effective together
    /// with `bloom_filter`.
    pub fn filter_cache(mut self, cache: Arc<FilterCache>, key: impl Into<String>) -> Self {
        self.filter_cache = Some((cache, key.into()));
        self
    }

    pub fn is_load_into_memory(&self) -> bool {
        self.load_into_memory
    }

    pub fn bloom_filter_config(&self) -> Option<&BloomFilterConfig> {
        self.bloom_filter.as_ref()
    }
}
