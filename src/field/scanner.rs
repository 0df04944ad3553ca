//! Token Scanner
//!
//! Lazy, chunked tokenization of a field read straight from its store.

use bytes::{Buf, BytesMut};

use crate::error::{DdiError, Result};
use crate::store::Store;

use super::{Token, EQUALS, SPACE};

// =============================================================================
// Generic Mode
// =============================================================================

/// Cursor over the space-delimited tokens of a store
///
/// Reads forward in `chunk_size` pieces, collapsing any run of spaces into a
/// single boundary. The sequence ends at the first `EndOfRange` from the store
/// or after yielding an error. It cannot be restarted.
pub struct TokenScanner<S> {
    store: S,
    /// Bytes read but not yet consumed
    buf: BytesMut,
    /// Field offset of `buf[0]`
    buf_offset: u64,
    /// Prefix of `buf` already searched for the end of the current token
    scanned: usize,
    /// Next store offset to read from
    read_offset: u64,
    chunk_size: usize,
    /// Store has no bytes past `read_offset`
    exhausted: bool,
    /// Sequence has ended
    done: bool,
}

impl<S: Store> TokenScanner<S> {
    /// Scan `store` from offset 0
    pub fn new(store: S, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            store,
            buf: BytesMut::with_capacity(chunk_size),
            buf_offset: 0,
            scanned: 0,
            read_offset: 0,
            chunk_size,
            exhausted: false,
            done: false,
        }
    }

    /// Produce the next token, or `None` once only spaces remain
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.buf.iter().position(|&b| b != SPACE) {
                Some(start) => {
                    if start > 0 {
                        self.consume(start);
                    }
                    let from = self.scanned;
                    if let Some(end) = self.buf[from..].iter().position(|&b| b == SPACE) {
                        return Ok(Some(self.take(from + end)));
                    }
                    self.scanned = self.buf.len();
                    if self.exhausted {
                        let end = self.buf.len();
                        return Ok(Some(self.take(end)));
                    }
                }
                None => {
                    let all = self.buf.len();
                    self.consume(all);
                    if self.exhausted {
                        return Ok(None);
                    }
                }
            }
            self.fill()?;
        }
    }

    fn consume(&mut self, n: usize) {
        self.buf.advance(n);
        self.buf_offset += n as u64;
        self.scanned = 0;
    }

    fn take(&mut self, n: usize) -> Token {
        let offset = self.buf_offset;
        let bytes = self.buf.split_to(n).freeze();
        self.buf_offset += n as u64;
        self.scanned = 0;
        Token::new(offset, bytes)
    }

    /// Append the next chunk of the store to the buffer
    fn fill(&mut self) -> Result<()> {
        let start = self.buf.len();
        self.buf.resize(start + self.chunk_size, 0);

        let got = match self.store.read_at(&mut self.buf[start..], self.read_offset) {
            Ok(n) => n,
            Err(DdiError::EndOfRange { transferred, .. }) => {
                self.exhausted = true;
                transferred
            }
            Err(e) => {
                self.buf.truncate(start);
                return Err(e);
            }
        };

        self.buf.truncate(start + got);
        self.read_offset += got as u64;
        if got == 0 {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl<S: Store> Iterator for TokenScanner<S> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// =============================================================================
// Key-Anchored Mode
// =============================================================================

/// Boundary-safe search pattern for a key
///
/// `key=` when a value is supplied, `key` followed by a space otherwise. A
/// match only counts when it starts a token, so `key` never matches inside
/// `someotherkey`. The end of the field also terminates a bare key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Needle {
    pattern: Vec<u8>,
}

impl Needle {
    pub fn new(key: &[u8], value: &[u8]) -> Self {
        let mut pattern = Vec::with_capacity(key.len() + 1);
        pattern.extend_from_slice(key);
        pattern.push(if value.is_empty() { SPACE } else { EQUALS });
        Self { pattern }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pattern
    }

    /// Whether `token` is anchored at this needle
    pub fn matches(&self, token: &[u8]) -> bool {
        let (key, terminator) = self.pattern.split_at(self.pattern.len() - 1);
        if terminator[0] == SPACE {
            token == key
        } else {
            token.starts_with(&self.pattern)
        }
    }
}

/// Cursor over the tokens anchored at a needle, in field order
pub struct KeyScanner<S> {
    tokens: TokenScanner<S>,
    needle: Needle,
}

impl<S: Store> KeyScanner<S> {
    pub fn new(store: S, chunk_size: usize, needle: Needle) -> Self {
        Self {
            tokens: TokenScanner::new(store, chunk_size),
            needle,
        }
    }

    /// Produce the full span of the next anchored token
    pub fn next_match(&mut self) -> Result<Option<Token>> {
        while let Some(token) = self.tokens.next_token()? {
            if self.needle.matches(token.as_bytes()) {
                return Ok(Some(token));
            }
        }
        Ok(None)
    }
}

impl<S: Store> Iterator for KeyScanner<S> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.tokens.done {
            return None;
        }
        match self.next_match() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.tokens.done = true;
                None
            }
            Err(e) => {
                self.tokens.done = true;
                Some(Err(e))
            }
        }
    }
}
