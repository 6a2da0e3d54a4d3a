//! Bloom filter configuration.

use serde::{Deserialize, Serialize};

/// XXH3-64 hash algorithm name.
pub const XXH3_64_ALGORITHM: &str = "xxh3_64";

/// Seed value for the XXH3-64 hash function used by key filters.
pub const BLOOM_FILTER_HASH_SEED: u64 = 0x5374_7261_7475_6d42; // "StratumB" in hex

/// Default maximum number of distinct keys a filter is built for. Dictionaries
/// above this cardinality are served without a filter.
pub const CARDINALITY_THRESHOLD: usize = 16 * 1024 * 1024;

/// Configuration for key filter construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomFilterConfig {
    /// Maximum number of distinct keys before abandoning filter construction.
    pub cardinality_threshold: usize,
    /// Target false positive probability.
    pub target_fpp: f64,
    /// Maximum size of the filter in bytes.
    pub max_filter_size: usize,
    /// Hash algorithm to use. Only "xxh3_64" is supported.
    pub hash_algorithm: String,
    /// Hash function seed.
    pub hash_seed: u64,
}

impl Default for BloomFilterConfig {
    fn default() -> Self {
        Self {
            cardinality_threshold: CARDINALITY_THRESHOLD,
            target_fpp: 0.01,
            max_filter_size: 32 * 1024 * 1024,
            hash_algorithm: XXH3_64_ALGORITHM.to_string(),
            hash_seed: BLOOM_FILTER_HASH_SEED,
        }
    }
}

impl BloomFilterConfig {
    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.hash_algorithm != XXH3_64_ALGORITHM {
            return Err(format!(
                "Unsupported hash algorithm: {}. Only xxh3_64 is supported.",
                self.hash_algorithm
            ));
        }

        if self.cardinality_threshold == 0 {
            return Err("cardinality_threshold must be greater than 0".to_string());
        }

        if self.target_fpp < 0.000001 || self.target_fpp > 0.99 {
            return Err("target_fpp must be between 0.000001 and 0.99".to_string());
        }

        if self.max_filter_size == 0 {
            return Err("max_filter_size must be greater than 0".to_string());
        }

        Ok(())
    }
}
