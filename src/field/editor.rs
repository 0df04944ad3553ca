//! Field Editor
//!
//! Stateful facade over one fixed-capacity field.

use tracing::{debug, warn};

use crate::config::DEFAULT_SCAN_CHUNK_SIZE;
use crate::error::{DdiError, Result};
use crate::store::{BoundedRegion, Store};

use super::scanner::{KeyScanner, Needle, TokenScanner};
use super::writer::FieldWriter;
use super::{pair_width, KeyValueView, Token};

/// Editor bound to a single field of fixed capacity
///
/// Every operation re-scans the store; the editor caches nothing between
/// calls. The field width never changes: each write ends by padding with
/// spaces to the end of the span it touched.
///
/// ## Atomicity
/// - `replace`, `set` and in-place `set_one` validate before writing.
/// - `append` defragments first and does not roll that back when the token
///   then fails to fit.
pub struct FieldEditor<S> {
    region: BoundedRegion<S>,
    capacity: u64,
    chunk_size: usize,
}

impl<S: Store> FieldEditor<S> {
    /// Bind an editor to `capacity` bytes of `store` starting at `offset`
    pub fn new(store: S, offset: u64, capacity: u64) -> Self {
        Self::from_region(BoundedRegion::new(store, offset, capacity))
    }

    /// Bind an editor to an existing region; capacity is the region size
    pub fn from_region(region: BoundedRegion<S>) -> Self {
        let capacity = region.size();
        Self {
            region,
            capacity,
            chunk_size: DEFAULT_SCAN_CHUNK_SIZE,
        }
    }

    /// Override the scanner chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Absolute offset of the field in the backing store
    pub fn offset(&self) -> u64 {
        self.region.offset()
    }

    /// Release the region and its backing store
    pub fn into_inner(self) -> BoundedRegion<S> {
        self.region
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Raw field bytes, padding included
    pub fn read(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.capacity as usize];
        if !buf.is_empty() {
            self.region.read_at(&mut buf, 0)?;
        }
        Ok(buf)
    }

    /// Raw field bytes decoded as text (invalid UTF-8 is replaced)
    pub fn text(&mut self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.read()?).into_owned())
    }

    /// Lazy scan over the tokens currently in the field
    pub fn tokens(&mut self) -> TokenScanner<&mut BoundedRegion<S>> {
        TokenScanner::new(&mut self.region, self.chunk_size)
    }

    /// Current tokens as a key → value view (later duplicates win)
    pub fn key_values(&mut self) -> Result<KeyValueView> {
        let mut view = KeyValueView::new();
        for token in self.tokens() {
            let token = token?;
            let (key, value) = token.split_pair();
            view.insert(key.to_vec(), value.to_vec());
        }
        Ok(view)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Overwrite the whole field with `text`, padded with spaces
    pub fn replace(&mut self, text: impl AsRef<[u8]>) -> Result<()> {
        let text = text.as_ref();
        if text.len() as u64 > self.capacity {
            return Err(DdiError::CapacityExceeded {
                len: text.len() as u64,
                capacity: self.capacity,
            });
        }

        debug!(len = text.len(), capacity = self.capacity, "replacing field");

        let mut writer = FieldWriter::at(&mut self.region, 0);
        writer.write(text)?;
        writer.pad_to(self.capacity)
    }

    /// Add `token` after the last existing token
    ///
    /// The field is defragmented first. If `token` then does not fit, the
    /// defragmented layout stays on disk and `InsufficientSpace` is returned.
    pub fn append(&mut self, token: impl AsRef<[u8]>) -> Result<()> {
        let token = token.as_ref();
        let slack = self.defragment()?;
        if slack < token.len() as u64 {
            warn!(len = token.len(), slack, "append does not fit");
            return Err(DdiError::InsufficientSpace {
                required: token.len() as u64,
                available: slack,
            });
        }

        debug!(len = token.len(), slack, "appending token");

        let mut writer = FieldWriter::at(&mut self.region, self.capacity - slack);
        writer.write(token)
    }

    /// Rewrite the field as the sorted union of `pairs` and, when
    /// `keep_existing`, the tokens already present
    ///
    /// New values win on key collision. Nothing is written when the result
    /// does not fit.
    pub fn set<I, K, V>(&mut self, pairs: I, keep_existing: bool) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut view = if keep_existing {
            self.key_values()?
        } else {
            KeyValueView::new()
        };
        for (key, value) in pairs {
            view.insert(key.as_ref().to_vec(), value.as_ref().to_vec());
        }

        let separators = view.len().saturating_sub(1) as u64;
        let required = view
            .iter()
            .map(|(k, v)| pair_width(k, v))
            .sum::<u64>()
            + separators;
        if required > self.capacity {
            return Err(DdiError::InsufficientSpace {
                required,
                available: self.capacity,
            });
        }

        debug!(entries = view.len(), required, capacity = self.capacity, "setting field");

        let mut writer = FieldWriter::at(&mut self.region, 0);
        for (i, (key, value)) in view.iter().enumerate() {
            if i > 0 {
                writer.write(b" ")?;
            }
            writer.write_pair(key, value)?;
        }
        writer.pad_to(self.capacity)
    }

    /// Set a single key
    ///
    /// With `in_place`, only the span of the existing token anchored at `key`
    /// is rewritten; the new `key[=value]` may shrink that span (the rest is
    /// padded) but never grow it. Without `in_place` this is
    /// `set([(key, value)], true)`.
    pub fn set_one(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        in_place: bool,
    ) -> Result<()> {
        let (key, value) = (key.as_ref(), value.as_ref());
        if !in_place {
            return self.set([(key, value)], true);
        }

        let span = self.find_key(key, value)?.ok_or_else(|| {
            DdiError::KeyNotFound(String::from_utf8_lossy(key).into_owned())
        })?;

        let required = pair_width(key, value);
        if required > span.len() {
            return Err(DdiError::SpanTooSmall {
                required,
                span: span.len(),
            });
        }

        debug!(
            key = %String::from_utf8_lossy(key),
            offset = span.offset(),
            span = span.len(),
            required,
            "patching token in place"
        );

        let mut writer = FieldWriter::at(&mut self.region, span.offset());
        writer.write_pair(key, value)?;
        writer.pad_to(span.offset() + span.len())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// First token anchored at `key`, using the needle for `value`
    fn find_key(&mut self, key: &[u8], value: &[u8]) -> Result<Option<Token>> {
        KeyScanner::new(&mut self.region, self.chunk_size, Needle::new(key, value)).next_match()
    }

    /// Pack all tokens to the front, one space apart, and pad the rest
    ///
    /// Returns the slack: bytes left for an appended token once the separator
    /// before it is accounted for. An empty field has the whole capacity as
    /// slack since no separator is needed.
    pub(crate) fn defragment(&mut self) -> Result<u64> {
        let tokens = self.tokens().collect::<Result<Vec<Token>>>()?;
        if tokens.is_empty() {
            return Ok(self.capacity);
        }

        let mut writer = FieldWriter::at(&mut self.region, 0);
        for (i, token) in tokens.iter().enumerate() {
            if i > 0 {
                writer.write(b" ")?;
            }
            writer.write(token.as_bytes())?;
        }
        let written = writer.position();
        writer.pad_to(self.capacity)?;

        let slack = (self.capacity - written).saturating_sub(1);
        debug!(tokens = tokens.len(), written, slack, "defragmented field");
        Ok(slack)
    }
}
