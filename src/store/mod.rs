//! Store Module
//!
//! Narrow random-access byte storage that every other layer reads and
//! writes through.
//!
//! ## Responsibilities
//! - Positional reads and writes with no cursor shared between callers
//! - Report the end of the underlying data as `EndOfRange`, never as success
//! - Never grow the underlying data
//!
//! ## Contract
//! ```text
//! read_at(buf, off)  ──► Ok(buf.len())                      full transfer
//!                    ──► Err(EndOfRange { transferred: n }) short transfer
//!                    ──► Err(Io(..))                        real failure
//! ```

mod region;

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::error::{DdiError, Result};

pub use region::BoundedRegion;

/// Random-access byte store
///
/// A successful call always transfers the whole buffer. A transfer that runs
/// past the end of the store moves what it can and then reports
/// [`DdiError::EndOfRange`] carrying the number of bytes moved.
pub trait Store {
    /// Read `buf.len()` bytes starting at `offset`
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Write all of `data` starting at `offset`
    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize>;
}

/// Map a possibly short transfer onto the store contract
pub(crate) fn complete(offset: u64, transferred: usize, requested: usize) -> Result<usize> {
    if transferred < requested {
        return Err(DdiError::EndOfRange {
            offset: offset + transferred as u64,
            transferred,
        });
    }
    Ok(transferred)
}

// =============================================================================
// Raw Stores
// =============================================================================

/// Files are read and written in place; writes are clipped to the current
/// file length so the artifact never changes size.
impl Store for File {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DdiError::Io(e)),
            }
        }

        complete(offset, filled, buf.len())
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        let len = self.metadata()?.len();
        if offset >= len {
            return complete(offset, 0, data.len());
        }

        let writable = data.len().min((len - offset) as usize);
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(&data[..writable])?;

        complete(offset, writable, data.len())
    }
}

/// In-memory store with a fixed length
impl Store for Vec<u8> {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let start = offset.min(self.len() as u64) as usize;
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        complete(offset, n, buf.len())
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        let start = offset.min(self.len() as u64) as usize;
        let n = data.len().min(self.len() - start);
        self[start..start + n].copy_from_slice(&data[..n]);
        complete(offset, n, data.len())
    }
}

// =============================================================================
// Forwarding
// =============================================================================

impl<S: Store + ?Sized> Store for &mut S {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        (**self).write_at(data, offset)
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        (**self).write_at(data, offset)
    }
}
