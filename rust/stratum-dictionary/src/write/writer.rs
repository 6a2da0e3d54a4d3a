//! Sequential writer of the tiered dictionary format.

use stratum_common::{Result, error::Error};
use stratum_io::SealingWrite;

use crate::{
    format::{DICTIONARY_MAGIC, DICTIONARY_MAGIC_WITH_NULL, ITEM_COUNT_PER_BLOCK},
    key::DictKeyType,
};

const FLUSH_THRESHOLD: usize = 64 * 1024;

/// Streams a tiered dictionary into a `SealingWrite` sink.
///
/// Keys must be added in strictly increasing order. The block index is kept in
/// memory and written by `finish`, after the entries and the optional null term.
pub struct TieredDictionaryWriter<K: DictKeyType, W: SealingWrite> {
    sink: W,
    buffer: Vec<u8>,
    block_index: Vec<K>,
    last_key: Option<K>,
    item_count: u64,
    null_value: Option<u64>,
}

impl<K: DictKeyType, W: SealingWrite> TieredDictionaryWriter<K, W> {
    pub fn new(sink: W) -> Self {
        TieredDictionaryWriter {
            sink,
            buffer: Vec::with_capacity(FLUSH_THRESHOLD),
            block_index: Vec::new(),
            last_key: None,
            item_count: 0,
            null_value: None,
        }
    }

    pub fn add_item(&mut self, key: K, value: u64) -> Result<()> {
        if let Some(last) = self.last_key {
            if key <= last {
                return Err(Error::invalid_arg(
                    "key",
                    format!("{key:?} does not follow the previous key {last:?}"),
                ));
            }
        }
        if self.item_count % ITEM_COUNT_PER_BLOCK as u64 == 0 {
            self.block_index.push(key);
        }
        key.write_le(&mut self.buffer);
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self.item_count += 1;
        self.last_key = Some(key);
        if self.buffer.len() >= FLUSH_THRESHOLD {
            self.flush()?;
        }
        Ok(())
    }

    /// Adds an item given a wide key, which must fit the key width.
    pub fn add_term(&mut self, key: u64, value: u64) -> Result<()> {
        let narrow = K::from_u64(key).ok_or_else(|| {
            Error::invalid_arg("key", format!("{key} does not fit a {} key", K::WIDTH))
        })?;
        self.add_item(narrow, value)
    }

    /// Sets the value of the null term. At most one null term per dictionary.
    pub fn add_null_term(&mut self, value: u64) -> Result<()> {
        if self.null_value.is_some() {
            return Err(Error::invalid_operation("add_null_term: null term already set"));
        }
        self.null_value = Some(value);
        Ok(())
    }

    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Writes the trailer, seals the sink and returns it.
    pub fn finish(mut self) -> Result<W> {
        let block_count = u32::try_from(self.block_index.len())
            .map_err(|_| Error::invalid_arg("block_count", "too many blocks"))?;

        if let Some(value) = self.null_value {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
        for key in std::mem::take(&mut self.block_index) {
            key.write_le(&mut self.buffer);
        }
        self.buffer.extend_from_slice(&block_count.to_le_bytes());
        let magic = if self.null_value.is_some() {
            DICTIONARY_MAGIC_WITH_NULL
        } else {
            DICTIONARY_MAGIC
        };
        self.buffer.extend_from_slice(&magic.to_le_bytes());
        self.flush()?;
        self.sink
            .seal()
            .map_err(|e| Error::io("dictionary seal", e))?;
        Ok(self.sink)
    }

    fn flush(&mut self) -> Result<()> {
        self.sink
            .write_all(&self.buffer)
            .map_err(|e| Error::io("dictionary write", e))?;
        self.buffer.clear();
        Ok(())
    }
}
