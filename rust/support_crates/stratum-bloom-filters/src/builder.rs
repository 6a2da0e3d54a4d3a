//! Key filter builder.

use ahash::AHashSet;

use crate::{
    config::BloomFilterConfig,
    filter::{KeyFilter, hash_key},
};

/// Computes optimal bitmap size for a bloom filter.
/// Fixed formula: m = -n * ln(p) / (ln(2)^2)
fn compute_bitmap_size(items_count: usize, fp_p: f64) -> usize {
    assert!(items_count > 0);
    assert!(fp_p > 0.0 && fp_p < 1.0);
    let log2 = std::f64::consts::LN_2;
    let log2_2 = log2 * log2;
    (-(items_count as f64) * fp_p.ln() / log2_2).ceil() as usize
}

/// Collects dictionary keys and builds a `KeyFilter` from them.
///
/// Construction is abandoned (and `finish` returns `None`) once the number of
/// distinct keys exceeds `cardinality_threshold`, or when the resulting filter would
/// be larger than `max_filter_size`.
#[derive(Debug)]
pub struct KeyFilterBuilder {
    hashes: Option<AHashSet<u64>>,
    config: BloomFilterConfig,
}

impl KeyFilterBuilder {
    pub fn new(config: BloomFilterConfig) -> Self {
        Self {
            hashes: Some(AHashSet::new()),
            config,
        }
    }

    /// Adds a key. Returns false if filter construction was abandoned.
    pub fn add_key(&mut self, key: u64) -> bool {
        let hash = hash_key(key, self.config.hash_seed);
        self.add_hash(hash)
    }

    /// Adds a pre-computed hash. Returns false if filter construction was abandoned.
    pub fn add_hash(&mut self, hash: u64) -> bool {
        let Some(hashes) = self.hashes.as_mut() else {
            return false;
        };
        if hashes.insert(hash) && hashes.len() > self.config.cardinality_threshold {
            self.hashes = None;
            return false;
        }
        true
    }

    /// Returns the current number of distinct values tracked.
    pub fn distinct_count(&self) -> usize {
        self.hashes.as_ref().map_or(0, |h| h.len())
    }

    pub fn is_abandoned(&self) -> bool {
        self.hashes.is_none()
    }

    /// Builds the final filter.
    /// Returns `None` if there are no values, construction was abandoned, or the
    /// filter would be too large.
    pub fn finish(self) -> Option<KeyFilter> {
        let hashes = self.hashes?;
        if hashes.is_empty() {
            return None;
        }

        let bitmap_size = compute_bitmap_size(hashes.len(), self.config.target_fpp);
        let bits_per_key = (bitmap_size as f64 / hashes.len() as f64).ceil() as usize;
        let mut filter = sbbf_rs_safe::Filter::new(bits_per_key, hashes.len());
        if filter.as_bytes().len() > self.config.max_filter_size {
            return None;
        }

        for hash in &hashes {
            filter.insert_hash(*hash);
        }

        KeyFilter::from_bytes(
            filter.as_bytes(),
            self.config.hash_seed,
            hashes.len() as u64,
        )
        .ok()
    }
}
