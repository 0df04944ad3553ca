//! Field Module
//!
//! Fixed-capacity key/value text field stored inside a larger artifact.
//!
//! ## Responsibilities
//! - Tokenize the field straight from the store, chunk by chunk
//! - Locate a single token anchored at a key
//! - Rewrite, merge and patch tokens without ever changing the field width
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────── capacity ─────────────────────────────┐
//! │ key=value␣bare␣key2=value2␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣␣ │
//! └───────────────────────────────────────────────────────────────────┘
//!   tokens separated by one space          trailing padding (spaces)
//! ```

mod editor;
mod scanner;
mod writer;

use std::collections::BTreeMap;

use bytes::Bytes;

pub use editor::FieldEditor;
pub use scanner::{KeyScanner, Needle, TokenScanner};

/// The only byte the field treats as a separator or padding
pub(crate) const SPACE: u8 = b' ';

/// Separator between a key and its value
pub(crate) const EQUALS: u8 = b'=';

/// Ephemeral key → value view of the field, ordered by key.
/// An empty value stands for a bare key.
pub type KeyValueView = BTreeMap<Vec<u8>, Vec<u8>>;

// =============================================================================
// Token
// =============================================================================

/// A single space-delimited token and where it sits in the field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    offset: u64,
    bytes: Bytes,
}

impl Token {
    pub(crate) fn new(offset: u64, bytes: Bytes) -> Self {
        Self { offset, bytes }
    }

    /// Offset of the first byte, relative to the field start
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Byte length of the token
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Split on the first `=`; a bare key yields an empty value
    pub fn split_pair(&self) -> (&[u8], &[u8]) {
        match self.bytes.iter().position(|&b| b == EQUALS) {
            Some(i) => (&self.bytes[..i], &self.bytes[i + 1..]),
            None => (&self.bytes[..], &[]),
        }
    }
}

/// Width of `key[=value]` once serialized
pub(crate) fn pair_width(key: &[u8], value: &[u8]) -> u64 {
    let mut width = (key.len() + value.len()) as u64;
    if !value.is_empty() {
        width += 1;
    }
    width
}
