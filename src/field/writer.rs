//! Field Writer
//!
//! Sequential writer over a store, used for every field mutation.

use crate::error::Result;
use crate::store::Store;

use super::{EQUALS, SPACE};

/// Largest padding run written in one call
const PAD_CHUNK: usize = 512;

/// Write cursor starting at a fixed offset
pub(crate) struct FieldWriter<'a, S> {
    store: &'a mut S,
    offset: u64,
}

impl<'a, S: Store> FieldWriter<'a, S> {
    pub(crate) fn at(store: &'a mut S, offset: u64) -> Self {
        Self { store, offset }
    }

    pub(crate) fn position(&self) -> u64 {
        self.offset
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let n = self.store.write_at(data, self.offset)?;
        self.offset += n as u64;
        Ok(())
    }

    /// Write `key[=value]`
    pub(crate) fn write_pair(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(key)?;
        if !value.is_empty() {
            self.write(&[EQUALS])?;
            self.write(value)?;
        }
        Ok(())
    }

    /// Fill with spaces up to (excluding) `end`
    pub(crate) fn pad_to(&mut self, end: u64) -> Result<()> {
        let pad = [SPACE; PAD_CHUNK];
        while self.offset < end {
            let n = ((end - self.offset) as usize).min(PAD_CHUNK);
            self.write(&pad[..n])?;
        }
        Ok(())
    }
}
