//! On-disk layout constants, trailer decoding and the typed block view.

use std::{marker::PhantomData, ops::Range};

use stratum_common::{Result, error::Error, verify_data};

use crate::key::{DictKeyType, KeyWidth};

/// Number of entries per block. The block index holds the first key of every block.
pub const ITEM_COUNT_PER_BLOCK: usize = 128;

/// Trailer magic of a dictionary without a null term.
pub const DICTIONARY_MAGIC: u32 = 0x9876_5432;

/// Trailer magic of a dictionary carrying a null term value.
pub const DICTIONARY_MAGIC_WITH_NULL: u32 = 0x9876_5433;

/// Size of an entry's value.
pub const VALUE_SIZE: usize = 8;

/// `block_count: u32` followed by `magic: u32`.
pub const TRAILER_SIZE: u64 = 8;

/// Size of one packed `key ++ value` entry.
#[inline]
pub const fn entry_size(key_width: KeyWidth) -> usize {
    key_width.size() + VALUE_SIZE
}

/// Decoded geometry of a dictionary file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DictionaryLayout {
    pub key_width: KeyWidth,
    pub total_size: u64,
    pub block_count: u32,
    pub has_null_term: bool,
    pub item_count: u64,
    /// Length of the entry region, starting at offset 0.
    pub data_len: u64,
}

impl DictionaryLayout {
    /// Decodes the 8-byte trailer of a `total_size`-byte file and validates the
    /// resulting geometry.
    pub fn from_trailer(key_width: KeyWidth, total_size: u64, trailer: &[u8]) -> Result<Self> {
        if total_size < TRAILER_SIZE {
            return Err(Error::corrupt_format(
                "dictionary",
                format!("file of {total_size} bytes is smaller than the trailer"),
            ));
        }
        verify_data!(trailer, trailer.len() == TRAILER_SIZE as usize);

        let block_count = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let magic = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        let has_null_term = match magic {
            DICTIONARY_MAGIC => false,
            DICTIONARY_MAGIC_WITH_NULL => true,
            _ => {
                return Err(Error::corrupt_format(
                    "dictionary",
                    format!("unknown magic {magic:#x}"),
                ));
            }
        };

        let metadata_len = block_count as u64 * key_width.size() as u64
            + if has_null_term { VALUE_SIZE as u64 } else { 0 };
        if metadata_len + TRAILER_SIZE > total_size {
            return Err(Error::corrupt_format(
                "dictionary",
                format!(
                    "block index of {block_count} keys does not fit a file of {total_size} bytes"
                ),
            ));
        }

        let data_len = total_size - TRAILER_SIZE - metadata_len;
        let entry_size = entry_size(key_width) as u64;
        if data_len % entry_size != 0 {
            return Err(Error::corrupt_format(
                "dictionary",
                format!("entry region of {data_len} bytes is not a multiple of {entry_size}"),
            ));
        }
        let item_count = data_len / entry_size;
        let expected_blocks = item_count.div_ceil(ITEM_COUNT_PER_BLOCK as u64);
        if block_count as u64 != expected_blocks {
            return Err(Error::corrupt_format(
                "dictionary",
                format!(
                    "block count {block_count} does not match {item_count} entries \
                     ({expected_blocks} blocks expected)"
                ),
            ));
        }

        Ok(DictionaryLayout {
            key_width,
            total_size,
            block_count,
            has_null_term,
            item_count,
            data_len,
        })
    }

    pub fn entry_size(&self) -> u64 {
        entry_size(self.key_width) as u64
    }

    pub fn trailer_range(&self) -> Range<u64> {
        self.total_size - TRAILER_SIZE..self.total_size
    }

    /// Null term value and block index, read together at open.
    pub fn metadata_range(&self) -> Range<u64> {
        self.data_len..self.total_size - TRAILER_SIZE
    }

    /// Byte range of `block` within the entry region. The last block may be short.
    pub fn block_range(&self, block: usize) -> Range<u64> {
        let block_bytes = ITEM_COUNT_PER_BLOCK as u64 * self.entry_size();
        let start = (block as u64 * block_bytes).min(self.data_len);
        let end = (start + block_bytes).min(self.data_len);
        start..end
    }

    /// Index of the first entry of `block`.
    pub fn block_first_item(&self, block: usize) -> u64 {
        block as u64 * ITEM_COUNT_PER_BLOCK as u64
    }
}

/// Decoded contents of the metadata region.
pub(crate) struct DictionaryMetadata<K> {
    pub null_value: Option<u64>,
    pub block_index: Vec<K>,
}

impl<K: DictKeyType> DictionaryMetadata<K> {
    pub fn decode(layout: &DictionaryLayout, bytes: &[u8]) -> Result<Self> {
        verify_data!(
            metadata,
            bytes.len() as u64 == layout.metadata_range().end - layout.metadata_range().start
        );
        let (null_value, index_bytes) = if layout.has_null_term {
            let (value, rest) = bytes.split_at(VALUE_SIZE);
            (Some(read_u64(value)), rest)
        } else {
            (None, bytes)
        };
        let block_index: Vec<K> = index_bytes.chunks_exact(K::SIZE).map(K::read_le).collect();
        verify_data!(
            block_index,
            block_index.windows(2).all(|w| w[0] < w[1])
        );
        Ok(DictionaryMetadata {
            null_value,
            block_index,
        })
    }
}

#[inline]
pub(crate) fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// A bounds-checked view over a run of packed `key ++ value` entries.
#[derive(Clone, Copy)]
pub struct BlockView<'a, K> {
    data: &'a [u8],
    _key: PhantomData<K>,
}

impl<'a, K: DictKeyType> BlockView<'a, K> {
    const ENTRY_SIZE: usize = K::SIZE + VALUE_SIZE;

    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() % Self::ENTRY_SIZE != 0 {
            return Err(Error::corrupt_format(
                "dictionary block",
                format!(
                    "{} bytes is not a multiple of the entry size {}",
                    data.len(),
                    Self::ENTRY_SIZE
                ),
            ));
        }
        Ok(BlockView {
            data,
            _key: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / Self::ENTRY_SIZE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn key(&self, index: usize) -> K {
        K::read_le(&self.data[index * Self::ENTRY_SIZE..])
    }

    #[inline]
    pub fn value(&self, index: usize) -> u64 {
        read_u64(&self.data[index * Self::ENTRY_SIZE + K::SIZE..])
    }

    #[inline]
    pub fn entry(&self, index: usize) -> (K, u64) {
        (self.key(index), self.value(index))
    }

    /// Index of the first entry whose key is `>= key` (`len()` when there is none).
    pub fn lower_bound(&self, key: K) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key(mid) < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Value stored under `key`, if present.
    pub fn find(&self, key: K) -> Option<u64> {
        let index = self.lower_bound(key);
        (index < self.len() && self.key(index) == key).then(|| self.value(index))
    }
}
