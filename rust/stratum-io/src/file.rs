//! Positional file reader and sealing file writer.

use std::{
    fs::File,
    io::{BufWriter, Write},
    ops::Range,
    path::Path,
    sync::{Arc, OnceLock},
};

use bytes::{Bytes, BytesMut};

use crate::{ReadAt, SealingWrite, StorageProfile, utils::clip_range};

/// A `ReadAt` over a regular file that issues one positional read per request.
///
/// This is the paged access mode of the dictionary readers: nothing is kept in
/// memory beyond the file handle, so every block lookup is a separate read. The file
/// size is queried once and cached; the file is expected to be sealed.
pub struct FileReader {
    file: Arc<File>,
    size: OnceLock<u64>,
}

impl FileReader {
    pub fn new(file: impl Into<Arc<File>>) -> FileReader {
        FileReader {
            file: file.into(),
            size: OnceLock::new(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<FileReader> {
        Ok(FileReader::new(File::open(path)?))
    }

    fn cached_size(&self) -> std::io::Result<u64> {
        if let Some(&size) = self.size.get() {
            return Ok(size);
        }
        let size = self.file.metadata()?.len();
        Ok(*self.size.get_or_init(|| size))
    }
}

impl ReadAt for FileReader {
    fn size(&self) -> std::io::Result<u64> {
        self.cached_size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        let Some(range) = clip_range(range, self.cached_size()?)? else {
            return Ok(Bytes::new());
        };
        let mut buf = BytesMut::zeroed((range.end - range.start) as usize);
        file_read_at_exact(&self.file, range.start, &mut buf)?;
        Ok(buf.freeze())
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 4 * 1024,
            max_io_size: 1024 * 1024,
        }
    }
}

const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// A buffered sequential file sink. Sealing flushes the buffer and syncs the file;
/// writes after the seal fail.
pub struct FileWriter {
    file: Option<BufWriter<File>>,
    position: u64,
}

impl FileWriter {
    pub fn new(file: File) -> FileWriter {
        FileWriter {
            file: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            position: 0,
        }
    }

    /// Creates the file, truncating an existing one.
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<FileWriter> {
        Ok(FileWriter::new(File::create(path)?))
    }

    /// Creates the file, failing if it already exists.
    pub fn create_new<P: AsRef<Path>>(path: P) -> std::io::Result<FileWriter> {
        Ok(FileWriter::new(File::create_new(path)?))
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn sealed_error() -> std::io::Error {
        std::io::Error::other("file writer is sealed")
    }
}

impl SealingWrite for FileWriter {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let file = self.file.as_mut().ok_or_else(Self::sealed_error)?;
        file.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn seal(&mut self) -> std::io::Result<()> {
        let file = self.file.take().ok_or_else(Self::sealed_error)?;
        let file = file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile::default()
    }
}

#[cfg(unix)]
pub fn file_read_at_exact(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, pos)
}

#[cfg(windows)]
pub fn file_read_at_exact(file: &File, mut pos: u64, mut buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, pos) {
            Ok(0) => break,
            Ok(n) => {
                buf = &mut buf[n..];
                pos += n as u64;
            }
            Err(e) => return Err(e),
        }
    }
    if !buf.is_empty() {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}
