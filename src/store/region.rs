//! Bounded Region
//!
//! Clips a parent store to a fixed window and rejects access outside it.

use tracing::trace;

use crate::error::{DdiError, Result};

use super::{complete, Store};

/// A `[offset, offset + size)` window over a parent store
///
/// Offsets passed to `read_at`/`write_at` are relative to the window start.
/// Transfers that would cross the window end are truncated, performed, and
/// then reported as [`DdiError::EndOfRange`]. Parent errors pass through
/// unchanged.
#[derive(Debug)]
pub struct BoundedRegion<S> {
    parent: S,
    offset: u64,
    size: u64,
}

impl<S: Store> BoundedRegion<S> {
    /// Create a region over `parent` starting at `offset` spanning `size` bytes
    pub fn new(parent: S, offset: u64, size: u64) -> Self {
        Self { parent, offset, size }
    }

    /// Absolute offset of the window in the parent
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Width of the window
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Release the parent store
    pub fn into_inner(self) -> S {
        self.parent
    }

    /// Number of bytes of a `requested` transfer at `rel` that fit the window
    fn clip(&self, rel: u64, requested: usize) -> Result<usize> {
        if rel >= self.size {
            trace!(rel, size = self.size, "access outside region");
            return Err(DdiError::EndOfRange { offset: rel, transferred: 0 });
        }
        Ok(requested.min((self.size - rel) as usize))
    }
}

impl<S: Store> Store for BoundedRegion<S> {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let n = self.clip(offset, buf.len())?;
        self.parent.read_at(&mut buf[..n], self.offset + offset)?;
        complete(offset, n, buf.len())
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        let n = self.clip(offset, data.len())?;
        self.parent.write_at(&data[..n], self.offset + offset)?;
        complete(offset, n, data.len())
    }
}
