//! Resolution of dictionary values into posting list locations.
//!
//! A dictionary value is either a byte offset into a posting file or, with bit 63
//! set, a short posting list stored inline in the value itself. A posting file entry
//! starts with an 8-byte header `length: u32, doc_count: u32` (little-endian)
//! followed by `length` bytes of posting data, whose format is opaque here.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratum_common::{Result, error::Error, verify_data};
use stratum_io::{AsyncReadAdapter, ReadAt, read_exact_at, read_exact_at_async};

/// Marks a dictionary value carrying an inline posting list.
pub const INLINE_POSTING_FLAG: u64 = 1 << 63;

pub const POSTING_HEADER_SIZE: u64 = 8;

/// Location of a posting list body within the posting file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostingLocation {
    /// Offset of the first byte after the header.
    pub file_offset: u64,
    pub length: u32,
    pub doc_count_hint: u32,
}

impl PostingLocation {
    pub fn end(&self) -> u64 {
        self.file_offset + self.length as u64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolvedPosting {
    Location(PostingLocation),
    /// Inline payload, with the flag bit cleared.
    Inline(u64),
}

impl ResolvedPosting {
    pub fn is_inline(value: u64) -> bool {
        value & INLINE_POSTING_FLAG != 0
    }
}

pub fn encode_posting_header(length: u32, doc_count: u32) -> [u8; POSTING_HEADER_SIZE as usize] {
    let mut header = [0u8; POSTING_HEADER_SIZE as usize];
    header[..4].copy_from_slice(&length.to_le_bytes());
    header[4..].copy_from_slice(&doc_count.to_le_bytes());
    header
}

/// Turns dictionary values into posting locations.
#[async_trait]
pub trait PostingResolver: Send + Sync {
    fn resolve(&self, value: u64) -> Result<ResolvedPosting>;

    async fn resolve_async(&self, value: u64) -> Result<ResolvedPosting>;
}

/// Resolves offsets by reading posting headers from a posting file.
pub struct PostingFileResolver {
    source: Arc<dyn ReadAt>,
    async_source: AsyncReadAdapter,
}

impl PostingFileResolver {
    pub fn new(source: Arc<dyn ReadAt>) -> PostingFileResolver {
        PostingFileResolver {
            async_source: AsyncReadAdapter::new(source.clone()),
            source,
        }
    }

    fn header_range(offset: u64) -> Result<std::ops::Range<u64>> {
        let end = offset.checked_add(POSTING_HEADER_SIZE).ok_or_else(|| {
            Error::corrupt_format("posting", format!("offset {offset:#x} out of range"))
        })?;
        Ok(offset..end)
    }

    fn decode_header(offset: u64, header: &[u8]) -> Result<PostingLocation> {
        verify_data!(header, header.len() == POSTING_HEADER_SIZE as usize);
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let doc_count = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        Ok(PostingLocation {
            file_offset: offset + POSTING_HEADER_SIZE,
            length,
            doc_count_hint: doc_count,
        })
    }
}

#[async_trait]
impl PostingResolver for PostingFileResolver {
    fn resolve(&self, value: u64) -> Result<ResolvedPosting> {
        if ResolvedPosting::is_inline(value) {
            return Ok(ResolvedPosting::Inline(value & !INLINE_POSTING_FLAG));
        }
        let header = read_exact_at(self.source.as_ref(), Self::header_range(value)?)
            .map_err(|e| Error::io("posting header", e))?;
        Self::decode_header(value, &header).map(ResolvedPosting::Location)
    }

    async fn resolve_async(&self, value: u64) -> Result<ResolvedPosting> {
        if ResolvedPosting::is_inline(value) {
            return Ok(ResolvedPosting::Inline(value & !INLINE_POSTING_FLAG));
        }
        let header = read_exact_at_async(&self.async_source, Self::header_range(value)?)
            .await
            .map_err(|e| Error::io("posting header", e))?;
        Self::decode_header(value, &header).map(ResolvedPosting::Location)
    }
}
