//! Cooperative cancellation.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dsu_shared::{DsuError, DsuResult};

/// Shared, monotonic cancellation flag.
///
/// Clones observe the same flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::info!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return `Err(DsuError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> DsuResult<()> {
        if self.is_cancelled() {
            return Err(DsuError::Cancelled);
        }
        Ok(())
    }
}

/// Reader that reports end-of-stream once its token is cancelled.
///
/// Lets consumers that drain their input on drop (such as zip entry readers)
/// stop promptly instead of reading the rest of a large stream.
pub struct CancellableReader<R> {
    inner: R,
    cancel: CancellationToken,
}

impl<R: Read> CancellableReader<R> {
    pub fn new(inner: R, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Ok(0);
        }
        self.inner.read(buf)
    }
}
