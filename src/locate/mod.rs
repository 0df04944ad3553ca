//! Locate Module
//!
//! Read-only upstream readers that resolve a name or type to the byte extent
//! of the thing it names. Each reader works on any [`Store`], so readers
//! chain by scoping the next one to a [`BoundedRegion`] over the previous
//! extent.
//!
//! ```text
//! disk image ──► gpt  (ESP type GUID)        ──► partition extent
//!                 └─► fat (/EFI/BOOT/...)    ──► file extent     (+ partition)
//!                      └─► pe (.cmdline)     ──► section extent  (+ file)
//! ```
//!
//! [`Store`]: crate::store::Store
//! [`BoundedRegion`]: crate::store::BoundedRegion

pub mod fat;
pub mod gpt;
pub mod pe;

pub use fat::FatFilesystem;
pub use gpt::{GptPartition, GptTable, ESP_TYPE_GUID};
pub use pe::PeSection;

/// A `(offset, size)` byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub offset: u64,
    pub size: u64,
}

impl Extent {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last byte
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Rebase an extent relative to `parent` onto `parent`'s coordinates.
    /// Returns `None` if it does not fit inside `parent`.
    pub fn within(self, parent: Extent) -> Option<Extent> {
        if self.end() > parent.size {
            return None;
        }
        Some(Extent::new(parent.offset + self.offset, self.size))
    }
}

// =============================================================================
// Little-endian field access (callers guarantee the bounds)
// =============================================================================

pub(crate) fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
