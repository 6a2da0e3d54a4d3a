//! Ordered iteration over dictionary entries.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use stratum_common::{Result, error::Error, try_or_ret_some_err};

use crate::{
    format::BlockView,
    key::{DictKey, DictKeyType},
    read::reader::{DictionaryCore, SeekStart},
};

/// A dictionary entry yielded by iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DictEntry {
    pub key: DictKey,
    pub value: u64,
}

/// A forward cursor over dictionary entries in increasing key order, ending with the
/// null term when the dictionary has one.
///
/// Both methods advance the same cursor; they may be mixed freely. The async form
/// suspends only when the next block has to be read.
#[async_trait]
pub trait DictionaryIterator: Send {
    fn next_entry(&mut self) -> Result<Option<DictEntry>>;

    async fn next_entry_async(&mut self) -> Result<Option<DictEntry>>;
}

/// Adapts a `DictionaryIterator` to `std::iter::Iterator`.
pub struct DictionaryEntries {
    inner: Box<dyn DictionaryIterator>,
}

impl DictionaryEntries {
    pub fn new(inner: Box<dyn DictionaryIterator>) -> DictionaryEntries {
        DictionaryEntries { inner }
    }
}

impl Iterator for DictionaryEntries {
    type Item = Result<DictEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = try_or_ret_some_err!(self.inner.next_entry());
        entry.map(Ok)
    }
}

fn term_entry<K: DictKeyType>((key, value): (K, u64)) -> DictEntry {
    DictEntry {
        key: DictKey::Term(key.to_u64()),
        value,
    }
}

/// Iterator over a memory-resident entry region. Never performs I/O.
pub struct BufferedDictionaryIterator<K> {
    data: Bytes,
    pos: usize,
    null_value: Option<u64>,
    _core: Arc<DictionaryCore<K>>,
}

impl<K: DictKeyType> BufferedDictionaryIterator<K> {
    pub(crate) fn new(core: Arc<DictionaryCore<K>>, start: SeekStart<K>) -> Result<Self> {
        let data = core
            .resident()
            .cloned()
            .ok_or_else(|| Error::invalid_operation("buffered iteration over a paged dictionary"))?;
        let view = BlockView::<K>::new(&data)?;
        let pos = match start {
            SeekStart::Block { block, key } => {
                let range = core.layout.block_range(block);
                let block_view =
                    BlockView::<K>::new(&data[range.start as usize..range.end as usize])?;
                core.layout.block_first_item(block) as usize + block_view.lower_bound(key)
            }
            SeekStart::End => view.len(),
        };
        Ok(BufferedDictionaryIterator {
            data,
            pos,
            null_value: core.null_value,
            _core: core,
        })
    }
}

#[async_trait]
impl<K: DictKeyType> DictionaryIterator for BufferedDictionaryIterator<K> {
    fn next_entry(&mut self) -> Result<Option<DictEntry>> {
        let view = BlockView::<K>::new(&self.data)?;
        if self.pos < view.len() {
            let entry = view.entry(self.pos);
            self.pos += 1;
            return Ok(Some(term_entry(entry)));
        }
        Ok(self.null_value.take().map(|value| DictEntry {
            key: DictKey::Null,
            value,
        }))
    }

    async fn next_entry_async(&mut self) -> Result<Option<DictEntry>> {
        self.next_entry()
    }
}

enum Step {
    Entry(DictEntry),
    NeedBlock(usize),
    End,
}

/// Iterator over a paged dictionary, reading one block at a time.
pub struct StreamedDictionaryIterator<K: DictKeyType> {
    core: Arc<DictionaryCore<K>>,
    block: usize,
    /// Key to position at once the first block is loaded.
    seek_key: Option<K>,
    data: Option<Bytes>,
    pos: usize,
    null_value: Option<u64>,
}

impl<K: DictKeyType> StreamedDictionaryIterator<K> {
    pub(crate) fn new(core: Arc<DictionaryCore<K>>, start: SeekStart<K>) -> Self {
        let (block, seek_key) = match start {
            SeekStart::Block { block, key } => (block, Some(key)),
            SeekStart::End => (core.block_index.len(), None),
        };
        StreamedDictionaryIterator {
            null_value: core.null_value,
            core,
            block,
            seek_key,
            data: None,
            pos: 0,
        }
    }

    /// Loads the current block ahead of the first `next_entry` call.
    pub(crate) fn prefetch(&mut self) -> Result<()> {
        if self.block < self.core.block_index.len() && self.data.is_none() {
            self.data = Some(self.core.block_bytes(self.block)?);
        }
        Ok(())
    }

    pub(crate) async fn prefetch_async(&mut self) -> Result<()> {
        if self.block < self.core.block_index.len() && self.data.is_none() {
            self.data = Some(self.core.block_bytes_async(self.block).await?);
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Step> {
        while self.block < self.core.block_index.len() {
            let Some(data) = &self.data else {
                return Ok(Step::NeedBlock(self.block));
            };
            let view = BlockView::<K>::new(data)?;
            if let Some(key) = self.seek_key.take() {
                self.pos = view.lower_bound(key);
            }
            if self.pos < view.len() {
                let entry = view.entry(self.pos);
                self.pos += 1;
                return Ok(Step::Entry(term_entry(entry)));
            }
            self.block += 1;
            self.data = None;
            self.pos = 0;
        }
        Ok(match self.null_value.take() {
            Some(value) => Step::Entry(DictEntry {
                key: DictKey::Null,
                value,
            }),
            None => Step::End,
        })
    }
}

#[async_trait]
impl<K: DictKeyType> DictionaryIterator for StreamedDictionaryIterator<K> {
    fn next_entry(&mut self) -> Result<Option<DictEntry>> {
        loop {
            match self.step()? {
                Step::Entry(entry) => return Ok(Some(entry)),
                Step::NeedBlock(block) => self.data = Some(self.core.block_bytes(block)?),
                Step::End => return Ok(None),
            }
        }
    }

    async fn next_entry_async(&mut self) -> Result<Option<DictEntry>> {
        loop {
            match self.step()? {
                Step::Entry(entry) => return Ok(Some(entry)),
                Step::NeedBlock(block) => {
                    self.data = Some(self.core.block_bytes_async(block).await?)
                }
                Step::End => return Ok(None),
            }
        }
    }
}
