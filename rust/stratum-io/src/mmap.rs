//! Memory-mapped file source.

use std::{fs::File, ops::Range, path::Path};

use bytes::Bytes;
use memmap2::Mmap;

use crate::{ReadAt, StorageProfile};

/// A read-only memory mapping of a file, exposed as a `ReadAt`.
///
/// The mapping is owned by a `Bytes` handle, so `read_at` returns zero-copy slices
/// and `memory_view` exposes the whole file. Dictionary readers opened over an
/// `MmapReader` use the integrated (fully memory-resident) access path.
pub struct MmapReader {
    data: Bytes,
}

impl MmapReader {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<MmapReader> {
        let file = File::open(path)?;
        Self::map(&file)
    }

    pub fn map(file: &File) -> std::io::Result<MmapReader> {
        if file.metadata()?.len() == 0 {
            // Zero-length mappings are rejected on some platforms.
            return Ok(MmapReader { data: Bytes::new() });
        }
        // SAFETY: the mapping is read-only and the files mapped here are sealed,
        // immutable index artifacts. Concurrent truncation of the underlying file by
        // another process is outside the contract of this reader.
        let mmap = unsafe { Mmap::map(file)? };
        Ok(MmapReader {
            data: Bytes::from_owner(mmap),
        })
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }
}

impl ReadAt for MmapReader {
    fn size(&self) -> std::io::Result<u64> {
        self.data.size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.data.read_at(range)
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 1,
            max_io_size: StorageProfile::default().max_io_size,
        }
    }

    fn memory_view(&self) -> Option<&[u8]> {
        Some(self.data.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::MmapReader;
    use crate::ReadAt;

    #[test]
    fn test_mmap_reader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello mapped world").unwrap();
        file.flush().unwrap();

        let reader = MmapReader::open(file.path()).unwrap();
        assert_eq!(reader.size().unwrap(), 18);
        assert_eq!(reader.read_at(6..12).unwrap().as_ref(), b"mapped");
        assert_eq!(reader.memory_view().unwrap(), b"hello mapped world");
    }

    #[test]
    fn test_mmap_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let reader = MmapReader::open(file.path()).unwrap();
        assert_eq!(reader.size().unwrap(), 0);
        assert!(reader.read_at(0..4).unwrap().is_empty());
    }
}
