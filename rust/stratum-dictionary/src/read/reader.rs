//! Tiered dictionary reader.

use std::{ops::Range, sync::Arc};

use bytes::Bytes;
use stratum_bloom_filters::{KeyFilter, KeyFilterBuilder};
use stratum_common::{Result, error::Error};
use stratum_io::{AsyncReadAdapter, ReadAt, read_exact_at, read_exact_at_async};

use crate::{
    format::{BlockView, DictionaryLayout, DictionaryMetadata, TRAILER_SIZE},
    key::{DictKey, DictKeyType},
    options::DictionaryOptions,
    read::iterator::{BufferedDictionaryIterator, DictionaryIterator, StreamedDictionaryIterator},
};

/// Reader of a tiered dictionary with keys of type `K`.
///
/// Opening reads the trailer, the null term value and the block index; the block
/// index stays in memory for the lifetime of the reader. Entry blocks are accessed
/// in one of two ways:
///
/// - **integrated**: when the source is memory resident (`ReadAt::memory_view`), or
///   `DictionaryOptions::load_into_memory` is set, the entry region is held as a
///   single buffer and lookups perform no I/O;
/// - **paged**: otherwise every probe reads exactly the one candidate block.
///
/// A point lookup binary-searches the block index for the last block whose first
/// key is not greater than the probe, then binary-searches that block. Neighboring
/// blocks are never consulted: keys are unique and sorted, so a key can only live in
/// that candidate block.
///
/// The reader is cheap to clone and safe to share between threads; each iterator it
/// returns is owned by a single caller.
pub struct TieredDictionaryReader<K: DictKeyType> {
    core: Arc<DictionaryCore<K>>,
}

impl<K: DictKeyType> std::fmt::Debug for TieredDictionaryReader<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredDictionaryReader").finish_non_exhaustive()
    }
}

impl<K: DictKeyType> Clone for TieredDictionaryReader<K> {
    fn clone(&self) -> Self {
        TieredDictionaryReader {
            core: self.core.clone(),
        }
    }
}

pub(crate) struct DictionaryCore<K> {
    source: Arc<dyn ReadAt>,
    async_source: AsyncReadAdapter,
    pub(crate) layout: DictionaryLayout,
    pub(crate) block_index: Vec<K>,
    pub(crate) null_value: Option<u64>,
    /// The entry region, when held in memory.
    resident: Option<Bytes>,
    filter: Option<Arc<KeyFilter>>,
}

impl<K: DictKeyType> TieredDictionaryReader<K> {
    /// Opens a dictionary over `source`, performing blocking reads.
    pub fn open(source: Arc<dyn ReadAt>, options: &DictionaryOptions) -> Result<Self> {
        let total_size = source
            .size()
            .map_err(|e| Error::io("dictionary size", e))?;
        let layout = if total_size < TRAILER_SIZE {
            DictionaryLayout::from_trailer(K::WIDTH, total_size, &[])?
        } else {
            let trailer = read_exact_at(source.as_ref(), total_size - TRAILER_SIZE..total_size)
                .map_err(|e| Error::io("dictionary trailer", e))?;
            DictionaryLayout::from_trailer(K::WIDTH, total_size, &trailer)?
        };
        let metadata = read_exact_at(source.as_ref(), layout.metadata_range())
            .map_err(|e| Error::io("dictionary block index", e))?;
        let metadata = DictionaryMetadata::<K>::decode(&layout, &metadata)?;

        let resident = if Self::wants_resident(&source, options) {
            Some(
                read_exact_at(source.as_ref(), 0..layout.data_len)
                    .map_err(|e| Error::io("dictionary entries", e))?,
            )
        } else {
            None
        };

        let mut core = DictionaryCore::new(source, layout, metadata, resident);
        core.filter = core.resolve_filter(options);
        core.log_open();
        Ok(TieredDictionaryReader {
            core: Arc::new(core),
        })
    }

    /// Opens a dictionary over `source`, suspending at every read.
    ///
    /// When a key filter has to be built from a paged source, the build runs on the
    /// blocking pool.
    pub async fn open_async(source: Arc<dyn ReadAt>, options: &DictionaryOptions) -> Result<Self> {
        let async_source = AsyncReadAdapter::new(source.clone());
        let total_size = stratum_io::AsyncReadAt::size(&async_source)
            .await
            .map_err(|e| Error::io("dictionary size", e))?;
        let layout = if total_size < TRAILER_SIZE {
            DictionaryLayout::from_trailer(K::WIDTH, total_size, &[])?
        } else {
            let trailer =
                read_exact_at_async(&async_source, total_size - TRAILER_SIZE..total_size)
                    .await
                    .map_err(|e| Error::io("dictionary trailer", e))?;
            DictionaryLayout::from_trailer(K::WIDTH, total_size, &trailer)?
        };
        let metadata = read_exact_at_async(&async_source, layout.metadata_range())
            .await
            .map_err(|e| Error::io("dictionary block index", e))?;
        let metadata = DictionaryMetadata::<K>::decode(&layout, &metadata)?;

        let resident = if Self::wants_resident(&source, options) {
            Some(
                read_exact_at_async(&async_source, 0..layout.data_len)
                    .await
                    .map_err(|e| Error::io("dictionary entries", e))?,
            )
        } else {
            None
        };

        let mut core = DictionaryCore::new(source, layout, metadata, resident);
        if options.bloom_filter.is_some() {
            core = if core.resident.is_some() {
                core.filter = core.resolve_filter(options);
                core
            } else {
                let options = options.clone();
                stratum_common::async_runtime::run_blocking(move || {
                    core.filter = core.resolve_filter(&options);
                    core
                })
                .await?
            };
        }
        core.log_open();
        Ok(TieredDictionaryReader {
            core: Arc::new(core),
        })
    }

    fn wants_resident(source: &Arc<dyn ReadAt>, options: &DictionaryOptions) -> bool {
        options.load_into_memory || source.memory_view().is_some()
    }

    pub fn layout(&self) -> &DictionaryLayout {
        &self.core.layout
    }

    pub fn item_count(&self) -> u64 {
        self.core.layout.item_count
    }

    pub fn block_count(&self) -> usize {
        self.core.block_index.len()
    }

    /// First key of each block.
    pub fn block_index(&self) -> &[K] {
        &self.core.block_index
    }

    pub fn null_value(&self) -> Option<u64> {
        self.core.null_value
    }

    /// Returns `true` when entry blocks are served from memory.
    pub fn is_resident(&self) -> bool {
        self.core.resident.is_some()
    }

    pub fn key_filter(&self) -> Option<&Arc<KeyFilter>> {
        self.core.filter.as_ref()
    }

    /// Looks up the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent, including keys that do not fit the
    /// dictionary's key width. The null term is answered without I/O.
    pub fn lookup(&self, key: DictKey) -> Result<Option<u64>> {
        let Some((key, block)) = self.core.plan_lookup(key)? else {
            return Ok(self.core.null_lookup_result(key));
        };
        let bytes = self.core.block_bytes(block)?;
        BlockView::<K>::new(&bytes).map(|view| view.find(key))
    }

    /// Suspending counterpart of `lookup`: suspends only for the block read.
    pub async fn lookup_async(&self, key: DictKey) -> Result<Option<u64>> {
        let Some((key, block)) = self.core.plan_lookup(key)? else {
            return Ok(self.core.null_lookup_result(key));
        };
        let bytes = self.core.block_bytes_async(block).await?;
        BlockView::<K>::new(&bytes).map(|view| view.find(key))
    }

    /// Positions an iterator at the first entry whose key is `>= key`.
    ///
    /// The iterator yields the remaining entries in increasing key order, followed by
    /// the null term when the dictionary has one. Seeking to `DictKey::Null`, or past
    /// the largest representable key, yields only the null term.
    pub fn seek(&self, key: DictKey) -> Result<Box<dyn DictionaryIterator>> {
        let start = self.core.seek_start(key);
        if self.core.resident.is_some() {
            return BufferedDictionaryIterator::new(self.core.clone(), start)
                .map(|it| Box::new(it) as Box<dyn DictionaryIterator>);
        }
        let mut it = StreamedDictionaryIterator::new(self.core.clone(), start);
        it.prefetch()?;
        Ok(Box::new(it))
    }

    /// Suspending counterpart of `seek`: the first block is read before returning.
    pub async fn seek_async(&self, key: DictKey) -> Result<Box<dyn DictionaryIterator>> {
        let start = self.core.seek_start(key);
        if self.core.resident.is_some() {
            return BufferedDictionaryIterator::new(self.core.clone(), start)
                .map(|it| Box::new(it) as Box<dyn DictionaryIterator>);
        }
        let mut it = StreamedDictionaryIterator::new(self.core.clone(), start);
        it.prefetch_async().await?;
        Ok(Box::new(it))
    }
}

/// Where an iteration starts: a block plus the key to position at within it, or past
/// the last entry.
#[derive(Clone, Copy, Debug)]
pub(crate) enum SeekStart<K> {
    Block { block: usize, key: K },
    End,
}

impl<K: DictKeyType> DictionaryCore<K> {
    fn new(
        source: Arc<dyn ReadAt>,
        layout: DictionaryLayout,
        metadata: DictionaryMetadata<K>,
        resident: Option<Bytes>,
    ) -> Self {
        DictionaryCore {
            async_source: AsyncReadAdapter::new(source.clone()),
            source,
            layout,
            block_index: metadata.block_index,
            null_value: metadata.null_value,
            resident,
            filter: None,
        }
    }

    fn log_open(&self) {
        log::debug!(
            "opened {} dictionary: {} entries in {} blocks, null term: {}, resident: {}, filter: {}",
            K::WIDTH,
            self.layout.item_count,
            self.layout.block_count,
            self.layout.has_null_term,
            self.resident.is_some(),
            self.filter.as_ref().map_or(0, |f| f.size()),
        );
    }

    /// Candidate block for `key`: the last block whose first key is `<= key`, or
    /// block 0 when `key` precedes every block. `None` for an empty dictionary.
    #[inline]
    pub(crate) fn locate_block(&self, key: K) -> Option<usize> {
        if self.block_index.is_empty() {
            return None;
        }
        Some(
            self.block_index
                .partition_point(|first| *first <= key)
                .saturating_sub(1),
        )
    }

    /// Resolves everything a point lookup can answer without touching blocks.
    /// Returns the narrowed key and the block to search, or `None` when the answer
    /// is already known (see `null_lookup_result`).
    fn plan_lookup(&self, key: DictKey) -> Result<Option<(K, usize)>> {
        let DictKey::Term(key) = key else {
            return Ok(None);
        };
        let Some(key) = K::from_u64(key) else {
            return Ok(None);
        };
        if let Some(filter) = &self.filter {
            if !filter.may_contain(key.to_u64()) {
                return Ok(None);
            }
        }
        Ok(self.locate_block(key).map(|block| (key, block)))
    }

    fn null_lookup_result(&self, key: DictKey) -> Option<u64> {
        match key {
            DictKey::Null => self.null_value,
            DictKey::Term(_) => None,
        }
    }

    pub(crate) fn seek_start(&self, key: DictKey) -> SeekStart<K> {
        let key = match key {
            DictKey::Term(key) => K::from_u64(key),
            DictKey::Null => None,
        };
        match key.and_then(|key| self.locate_block(key).map(|block| (key, block))) {
            Some((key, block)) => SeekStart::Block { block, key },
            None => SeekStart::End,
        }
    }

    /// The entry region, when resident.
    pub(crate) fn resident(&self) -> Option<&Bytes> {
        self.resident.as_ref()
    }

    fn block_range(&self, block: usize) -> Result<Range<u64>> {
        if block >= self.block_index.len() {
            return Err(Error::invalid_arg(
                "block",
                format!("block {block} out of {}", self.block_index.len()),
            ));
        }
        Ok(self.layout.block_range(block))
    }

    /// Bytes of `block`. Reads never extend past the entry region.
    pub(crate) fn block_bytes(&self, block: usize) -> Result<Bytes> {
        let range = self.block_range(block)?;
        if let Some(data) = &self.resident {
            return Ok(data.slice(range.start as usize..range.end as usize));
        }
        read_exact_at(self.source.as_ref(), range).map_err(|e| Error::io("dictionary block", e))
    }

    pub(crate) async fn block_bytes_async(&self, block: usize) -> Result<Bytes> {
        let range = self.block_range(block)?;
        if let Some(data) = &self.resident {
            return Ok(data.slice(range.start as usize..range.end as usize));
        }
        read_exact_at_async(&self.async_source, range)
            .await
            .map_err(|e| Error::io("dictionary block", e))
    }

    /// Builds the key filter requested by `options`, or fetches it from the shared
    /// cache. A failed or abandoned build leaves the dictionary without a filter.
    fn resolve_filter(&self, options: &DictionaryOptions) -> Option<Arc<KeyFilter>> {
        let config = options.bloom_filter.as_ref()?;
        let build = || {
            if let Err(e) = config.validate() {
                log::warn!("invalid bloom filter config, dictionary opened without a filter: {e}");
                return None;
            }
            match self.build_filter(KeyFilterBuilder::new(config.clone())) {
                Ok(Some(filter)) => Some(Arc::new(filter)),
                Ok(None) => {
                    log::warn!(
                        "bloom filter over {} keys abandoned, dictionary opened without a filter",
                        self.layout.item_count
                    );
                    None
                }
                Err(e) => {
                    log::warn!("bloom filter build failed, dictionary opened without a filter: {e}");
                    None
                }
            }
        };
        match &options.filter_cache {
            Some((cache, key)) => cache.get_or_build(key, build),
            None => build(),
        }
    }

    fn build_filter(&self, mut builder: KeyFilterBuilder) -> Result<Option<KeyFilter>> {
        for block in 0..self.block_index.len() {
            let bytes = self.block_bytes(block)?;
            let view = BlockView::<K>::new(&bytes)?;
            for i in 0..view.len() {
                if !builder.add_key(view.key(i).to_u64()) {
                    return Ok(None);
                }
            }
        }
        Ok(builder.finish())
    }
}
