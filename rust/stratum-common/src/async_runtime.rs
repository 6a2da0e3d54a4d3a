//! Blocking-pool bridge for the async read paths.
//! **Note**: at the moment, these are simple functions with baked-in tokio-based
//! implementation.

pub use impls::{JoinHandle, spawn_blocking};

use crate::{Result, error::Error};

/// Runs a blocking closure on the runtime's blocking pool and awaits its result.
///
/// A panic or cancellation of the blocking task is reported as an external error
/// rather than propagated as a panic.
pub async fn run_blocking<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| Error::external("blocking task", e))
}

#[cfg(feature = "tokio")]
mod impls {
    pub type JoinHandle<T> = tokio::task::JoinHandle<T>;

    pub fn spawn_blocking<F, R>(f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
    }
}
