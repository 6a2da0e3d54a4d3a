//! Key-width dispatch behind a type-erased reader interface.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratum_common::{Result, error::Error};
use stratum_io::ReadAt;

use crate::{
    format::DictionaryLayout,
    key::{DictKey, DictKeyType, KeyWidth},
    options::DictionaryOptions,
    read::{iterator::DictionaryIterator, reader::TieredDictionaryReader},
};

/// Physical organization of a dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryKind {
    /// Sorted, block-indexed entries. Supports point lookups and ordered iteration.
    Tiered,
    /// Hash-organized entries. Point lookups only; cannot serve ordered iteration.
    Hash,
}

impl std::fmt::Display for DictionaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DictionaryKind::Tiered => f.write_str("tiered"),
            DictionaryKind::Hash => f.write_str("hash"),
        }
    }
}

/// A dictionary reader with the key width erased.
#[async_trait]
pub trait DictionaryReader: Send + Sync {
    fn kind(&self) -> DictionaryKind;

    fn key_width(&self) -> KeyWidth;

    fn layout(&self) -> &DictionaryLayout;

    fn item_count(&self) -> u64 {
        self.layout().item_count
    }

    fn lookup(&self, key: DictKey) -> Result<Option<u64>>;

    async fn lookup_async(&self, key: DictKey) -> Result<Option<u64>>;

    fn seek(&self, key: DictKey) -> Result<Box<dyn DictionaryIterator>>;

    async fn seek_async(&self, key: DictKey) -> Result<Box<dyn DictionaryIterator>>;
}

#[async_trait]
impl<K: DictKeyType> DictionaryReader for TieredDictionaryReader<K> {
    fn kind(&self) -> DictionaryKind {
        DictionaryKind::Tiered
    }

    fn key_width(&self) -> KeyWidth {
        K::WIDTH
    }

    fn layout(&self) -> &DictionaryLayout {
        TieredDictionaryReader::layout(self)
    }

    fn lookup(&self, key: DictKey) -> Result<Option<u64>> {
        TieredDictionaryReader::lookup(self, key)
    }

    async fn lookup_async(&self, key: DictKey) -> Result<Option<u64>> {
        TieredDictionaryReader::lookup_async(self, key).await
    }

    fn seek(&self, key: DictKey) -> Result<Box<dyn DictionaryIterator>> {
        TieredDictionaryReader::seek(self, key)
    }

    async fn seek_async(&self, key: DictKey) -> Result<Box<dyn DictionaryIterator>> {
        TieredDictionaryReader::seek_async(self, key).await
    }
}

fn hash_unsupported() -> Error {
    Error::unsupported(
        "open_dictionary",
        "hash dictionaries cannot serve ordered lookups",
    )
}

/// Opens a dictionary of the given kind and key width.
pub fn open_dictionary(
    kind: DictionaryKind,
    width: KeyWidth,
    source: Arc<dyn ReadAt>,
    options: &DictionaryOptions,
) -> Result<Arc<dyn DictionaryReader>> {
    if kind == DictionaryKind::Hash {
        return Err(hash_unsupported());
    }
    let reader: Arc<dyn DictionaryReader> = match width {
        KeyWidth::U8 => Arc::new(TieredDictionaryReader::<u8>::open(source, options)?),
        KeyWidth::U16 => Arc::new(TieredDictionaryReader::<u16>::open(source, options)?),
        KeyWidth::U32 => Arc::new(TieredDictionaryReader::<u32>::open(source, options)?),
        KeyWidth::U64 => Arc::new(TieredDictionaryReader::<u64>::open(source, options)?),
    };
    Ok(reader)
}

/// Suspending counterpart of `open_dictionary`.
pub async fn open_dictionary_async(
    kind: DictionaryKind,
    width: KeyWidth,
    source: Arc<dyn ReadAt>,
    options: &DictionaryOptions,
) -> Result<Arc<dyn DictionaryReader>> {
    if kind == DictionaryKind::Hash {
        return Err(hash_unsupported());
    }
    let reader: Arc<dyn DictionaryReader> = match width {
        KeyWidth::U8 => Arc::new(TieredDictionaryReader::<u8>::open_async(source, options).await?),
        KeyWidth::U16 => {
            Arc::new(TieredDictionaryReader::<u16>::open_async(source, options).await?)
        }
        KeyWidth::U32 => {
            Arc::new(TieredDictionaryReader::<u32>::open_async(source, options).await?)
        }
        KeyWidth::U64 => {
            Arc::new(TieredDictionaryReader::<u64>::open_async(source, options).await?)
        }
    };
    Ok(reader)
}
