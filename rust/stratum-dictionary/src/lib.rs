//! Tiered dictionary: an immutable, block-indexed sorted map from fixed-width integer
//! keys to 64-bit values.
//!
//! The on-disk layout (little-endian) is
//!
//! ```text
//! [entry; N]                 entry = key (1/2/4/8 bytes) ++ value (u64), packed
//! [null_term_value: u64]     present only with DICTIONARY_MAGIC_WITH_NULL
//! [block_first_key; B]       B = ceil(N / ITEM_COUNT_PER_BLOCK)
//! [block_count: u32]
//! [magic: u32]
//! ```
//!
//! Readers keep the small block index in memory and either hold the entry region
//! resident or fetch one block per lookup.

pub mod format;
pub mod key;
pub mod options;
pub mod read;
pub mod write;

pub use format::{
    DICTIONARY_MAGIC, DICTIONARY_MAGIC_WITH_NULL, DictionaryLayout, ITEM_COUNT_PER_BLOCK,
};
pub use key::{DictKey, DictKeyType, KeyWidth};
pub use options::{DictionaryOptions, FilterCache};
pub use read::{
    factory::{DictionaryKind, DictionaryReader, open_dictionary, open_dictionary_async},
    iterator::{DictEntry, DictionaryEntries, DictionaryIterator},
    reader::TieredDictionaryReader,
};
pub use write::TieredDictionaryWriter;
