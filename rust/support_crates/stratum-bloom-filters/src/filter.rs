//! Probe side of the key filter.

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// SBBF bucket: 256 bits, 32-byte aligned as required by the probe kernels.
#[derive(Clone, Copy)]
#[repr(C, align(32))]
struct Bucket([u8; 32]);

/// An immutable Split-Block Bloom Filter over 64-bit keys.
///
/// Keys are hashed with XXH3-64 over their little-endian bytes, so a filter built by
/// `KeyFilterBuilder` answers `may_contain` for exactly the keys that were added,
/// plus false positives at the configured rate.
pub struct KeyFilter {
    buckets: Vec<Bucket>,
    filter_fn: sbbf_rs::FilterFn,
    hash_seed: u64,
    num_values: u64,
}

// SAFETY: KeyFilter is safe to send between threads and share references because:
// - the bucket storage is an owned, never-mutated Vec
// - FilterFn is a stateless function wrapper selected at construction
unsafe impl Send for KeyFilter {}
unsafe impl Sync for KeyFilter {}

impl KeyFilter {
    /// Creates a filter from serialized SBBF data (a multiple of 32 bytes).
    pub fn from_bytes(data: &[u8], hash_seed: u64, num_values: u64) -> Result<Self, String> {
        if data.is_empty() || data.len() % 32 != 0 {
            return Err("SBBF data must be non-empty and a multiple of 32-byte blocks".to_string());
        }
        let buckets = data
            .chunks_exact(32)
            .map(|chunk| {
                let mut bucket = [0u8; 32];
                bucket.copy_from_slice(chunk);
                Bucket(bucket)
            })
            .collect();
        Ok(Self {
            buckets,
            filter_fn: sbbf_rs::FilterFn::new(),
            hash_seed,
            num_values,
        })
    }

    /// Tests whether `key` might be present. `false` means definitely absent.
    #[inline]
    pub fn may_contain(&self, key: u64) -> bool {
        self.probe_hash(hash_key(key, self.hash_seed))
    }

    /// Tests whether a value with a pre-computed hash might be present.
    #[inline]
    pub fn probe_hash(&self, hash: u64) -> bool {
        let ptr = self.buckets.as_ptr() as *const u8;
        // SAFETY: the bucket storage is 32-byte aligned by construction and holds
        // exactly `buckets.len()` buckets.
        unsafe { self.filter_fn.contains(ptr, self.buckets.len(), hash) }
    }

    /// Returns the serialized filter data.
    pub fn as_bytes(&self) -> Vec<u8> {
        self.buckets.iter().flat_map(|b| b.0).collect()
    }

    /// Size of the filter in bytes.
    pub fn size(&self) -> usize {
        self.buckets.len() * 32
    }

    /// Number of distinct keys the filter was built from.
    pub fn num_values(&self) -> u64 {
        self.num_values
    }

    pub fn hash_seed(&self) -> u64 {
        self.hash_seed
    }
}

impl std::fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFilter")
            .field("size", &self.size())
            .field("num_values", &self.num_values)
            .finish()
    }
}

#[inline]
pub fn hash_key(key: u64, seed: u64) -> u64 {
    xxh3_64_with_seed(&key.to_le_bytes(), seed)
}
