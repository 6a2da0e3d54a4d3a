//! Heap buffers as read sources and sinks.
//!
//! Both buffer types expose `memory_view`, which puts dictionaries opened over them
//! on the integrated access path.

use std::ops::Range;

use bytes::Bytes;

use crate::{ReadAt, SealingWrite, StorageProfile, utils::clip_range};

fn memory_profile() -> StorageProfile {
    StorageProfile {
        min_io_size: 1,
        ..Default::default()
    }
}

fn clip_to_buffer(range: Range<u64>, len: usize) -> std::io::Result<Option<Range<usize>>> {
    Ok(clip_range(range, len as u64)?.map(|r| r.start as usize..r.end as usize))
}

/// Reads copy out of the vector.
impl ReadAt for Vec<u8> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        Ok(clip_to_buffer(range, self.len())?
            .map(|r| Bytes::copy_from_slice(&self[r]))
            .unwrap_or_default())
    }

    fn storage_profile(&self) -> StorageProfile {
        memory_profile()
    }

    fn memory_view(&self) -> Option<&[u8]> {
        Some(self.as_slice())
    }
}

/// Reads are zero-copy slices sharing the buffer.
impl ReadAt for Bytes {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        Ok(clip_to_buffer(range, self.len())?
            .map(|r| self.slice(r))
            .unwrap_or_default())
    }

    fn storage_profile(&self) -> StorageProfile {
        memory_profile()
    }

    fn memory_view(&self) -> Option<&[u8]> {
        Some(self.as_ref())
    }
}

impl SealingWrite for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn storage_profile(&self) -> StorageProfile {
        memory_profile()
    }
}
