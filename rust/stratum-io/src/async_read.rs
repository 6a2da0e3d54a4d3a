//! Suspension-based counterpart of `ReadAt`.

use std::{ops::Range, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{ReadAt, utils::check_read_len};

/// A positional reader whose reads suspend the calling task instead of blocking
/// a worker thread.
///
/// Reads follow the `ReadAt` contract: a read may only come back short when the
/// range extends past the end of the object.
#[async_trait]
pub trait AsyncReadAt: Send + Sync + 'static {
    /// Returns the size of the underlying object.
    async fn size(&self) -> std::io::Result<u64>;

    /// Reads a specified range of bytes from the object.
    async fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes>;
}

/// Bridges a blocking `ReadAt` into the async world.
///
/// Memory-resident sources (those exposing `ReadAt::memory_view`) are served inline,
/// without a suspension point. Everything else is dispatched to the runtime's
/// blocking pool.
#[derive(Clone)]
pub struct AsyncReadAdapter {
    inner: Arc<dyn ReadAt>,
}

impl AsyncReadAdapter {
    pub fn new(inner: Arc<dyn ReadAt>) -> AsyncReadAdapter {
        AsyncReadAdapter { inner }
    }

    pub fn inner(&self) -> &Arc<dyn ReadAt> {
        &self.inner
    }

    fn is_memory_resident(&self) -> bool {
        self.inner.memory_view().is_some()
    }
}

#[async_trait]
impl AsyncReadAt for AsyncReadAdapter {
    async fn size(&self) -> std::io::Result<u64> {
        if self.is_memory_resident() {
            return self.inner.size();
        }
        let inner = self.inner.clone();
        stratum_common::async_runtime::spawn_blocking(move || inner.size())
            .await
            .map_err(std::io::Error::other)?
    }

    async fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        if self.is_memory_resident() {
            return self.inner.read_at(range);
        }
        let inner = self.inner.clone();
        stratum_common::async_runtime::spawn_blocking(move || inner.read_at(range))
            .await
            .map_err(std::io::Error::other)?
    }
}

#[async_trait]
impl<T> AsyncReadAt for Arc<T>
where
    T: AsyncReadAt + ?Sized,
{
    async fn size(&self) -> std::io::Result<u64> {
        self.as_ref().size().await
    }

    async fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.as_ref().read_at(range).await
    }
}

/// Reads exactly `range`, failing with `UnexpectedEof` on a short read.
pub async fn read_exact_at_async<R>(source: &R, range: Range<u64>) -> std::io::Result<Bytes>
where
    R: AsyncReadAt + ?Sized,
{
    let expected = range.end.saturating_sub(range.start);
    let buf = source.read_at(range.clone()).await?;
    check_read_len(&buf, expected, &range)?;
    Ok(buf)
}
