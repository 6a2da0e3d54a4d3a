//! Locating posting lists for range queries.
//!
//! A [`LeafPostingLocator`] takes a `[from, to]` query in the key domain of a
//! [`DecompositionStrategy`], clamps it to the optional [`RangeSummary`] of the
//! indexed data, decomposes it into per-tier dictionary keys or key ranges, looks
//! them up, and resolves every hit into a posting location.

pub mod config;
pub mod locator;
pub mod posting;
pub mod strategy;
pub mod summary;

pub use config::{DateIndexConfig, LocatorOptions, LookupMode, RangeIndexConfig};
pub use locator::LeafPostingLocator;
pub use posting::{
    INLINE_POSTING_FLAG, POSTING_HEADER_SIZE, PostingFileResolver, PostingLocation,
    PostingResolver, ResolvedPosting, encode_posting_header,
};
pub use strategy::{DateStrategy, DecompositionStrategy, KeyQuery, NumericRangeStrategy, TierQuery};
pub use summary::RangeSummary;
