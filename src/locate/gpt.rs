//! GPT Reader
//!
//! Parses the primary GUID partition table and resolves partitions by type.
//!
//! ## Layout
//! ```text
//! LBA 0   protective MBR
//! LBA 1   header   "EFI PART" | rev | hdr size | hdr CRC32 | ... | entries LBA
//!                  | entry count | entry size | entries CRC32
//! LBA n.. entries  type GUID (16) | unique GUID (16) | first LBA | last LBA
//!                  | attributes | name (UTF-16LE, 72 bytes)
//! ```

use tracing::debug;

use crate::error::{DdiError, Result};
use crate::store::Store;

use super::{le_u32, le_u64, Extent};

/// Signature at the start of the GPT header
pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";

/// EFI System Partition type GUID (C12A7328-F81F-11D2-BA4B-00A0C93EC93B),
/// in on-disk byte order
pub const ESP_TYPE_GUID: [u8; 16] = [
    0x28, 0x73, 0x2A, 0xC1, 0x1F, 0xF8, 0xD2, 0x11, 0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E, 0xC9, 0x3B,
];

/// Block sizes probed when learning the block size
const BLOCK_SIZE_CANDIDATES: [u64; 4] = [512, 1024, 2048, 4096];

/// Smallest valid header (revision 1.0)
const HEADER_MIN_SIZE: usize = 92;

/// Smallest valid partition entry
const ENTRY_MIN_SIZE: usize = 128;

/// Upper bound on the partition entry array we are willing to read
const MAX_ENTRY_ARRAY_SIZE: usize = 1024 * 1024;

/// Find the block size at which the GPT header signature sits
pub fn learn_block_size<S: Store>(store: &mut S) -> Result<u64> {
    let mut signature = [0u8; 8];
    for block_size in BLOCK_SIZE_CANDIDATES {
        match store.read_at(&mut signature, block_size) {
            Ok(_) if &signature == GPT_SIGNATURE => {
                debug!(block_size, "learned block size from GPT signature");
                return Ok(block_size);
            }
            Ok(_) => {}
            Err(e) if e.is_end_of_range() => break,
            Err(e) => return Err(e),
        }
    }
    Err(DdiError::Partition(
        "GPT signature not found at any supported block size".to_string(),
    ))
}

/// Format an on-disk GUID in its canonical text form
pub fn format_guid(guid: &[u8; 16]) -> String {
    format!(
        "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        le_u32(guid, 0),
        u16::from_le_bytes([guid[4], guid[5]]),
        u16::from_le_bytes([guid[6], guid[7]]),
        guid[8],
        guid[9],
        guid[10],
        guid[11],
        guid[12],
        guid[13],
        guid[14],
        guid[15]
    )
}

// =============================================================================
// Partition Entries
// =============================================================================

/// A used entry of the partition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GptPartition {
    /// Position in the entry array (1-based, as partition numbers are)
    pub number: u32,
    pub type_guid: [u8; 16],
    pub unique_guid: [u8; 16],
    pub first_lba: u64,
    /// Inclusive
    pub last_lba: u64,
    pub attributes: u64,
    pub name: String,
}

impl GptPartition {
    fn parse(number: u32, entry: &[u8]) -> Result<Option<Self>> {
        let mut type_guid = [0u8; 16];
        type_guid.copy_from_slice(&entry[0..16]);
        if type_guid == [0u8; 16] {
            return Ok(None);
        }

        let mut unique_guid = [0u8; 16];
        unique_guid.copy_from_slice(&entry[16..32]);

        let first_lba = le_u64(entry, 32);
        let last_lba = le_u64(entry, 40);
        if last_lba < first_lba {
            return Err(DdiError::Partition(format!(
                "Partition {} ends (LBA {}) before it starts (LBA {})",
                number, last_lba, first_lba
            )));
        }

        let name_units: Vec<u16> = entry[56..128]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();

        Ok(Some(Self {
            number,
            type_guid,
            unique_guid,
            first_lba,
            last_lba,
            attributes: le_u64(entry, 48),
            name: String::from_utf16_lossy(&name_units),
        }))
    }

    /// Byte extent of the partition for a given block size
    ///
    /// Fails when the LBAs do not fit a 64-bit byte offset.
    pub fn extent(&self, block_size: u64) -> Result<Extent> {
        let offset = self.first_lba.checked_mul(block_size);
        let size = self
            .last_lba
            .checked_sub(self.first_lba)
            .and_then(|span| span.checked_add(1))
            .and_then(|blocks| blocks.checked_mul(block_size));
        match (offset, size) {
            (Some(offset), Some(size)) if offset.checked_add(size).is_some() => {
                Ok(Extent::new(offset, size))
            }
            _ => Err(DdiError::Partition(format!(
                "Partition {} (LBA {}..={}) is out of range at block size {}",
                self.number, self.first_lba, self.last_lba, block_size
            ))),
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// The primary GPT of an image
#[derive(Debug, Clone)]
pub struct GptTable {
    block_size: u64,
    partitions: Vec<GptPartition>,
}

impl GptTable {
    /// Read and verify the primary header and partition entry array
    pub fn read<S: Store>(store: &mut S, block_size: u64) -> Result<Self> {
        let mut header = vec![0u8; block_size as usize];
        store.read_at(&mut header, block_size)?;

        if &header[0..8] != GPT_SIGNATURE {
            return Err(DdiError::Partition(format!(
                "Invalid GPT signature at offset {}: {:?}",
                block_size,
                &header[0..8]
            )));
        }

        let header_size = le_u32(&header, 12) as usize;
        if header_size < HEADER_MIN_SIZE || header_size > header.len() {
            return Err(DdiError::Partition(format!(
                "Invalid GPT header size: {}",
                header_size
            )));
        }

        let stored_crc = le_u32(&header, 16);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header[0..16]);
        hasher.update(&[0u8; 4]);
        hasher.update(&header[20..header_size]);
        let computed_crc = hasher.finalize();
        if stored_crc != computed_crc {
            return Err(DdiError::Partition(format!(
                "GPT header CRC mismatch: stored {:#010x}, computed {:#010x}",
                stored_crc, computed_crc
            )));
        }

        let entries_lba = le_u64(&header, 72);
        let entry_count = le_u32(&header, 80) as usize;
        let entry_size = le_u32(&header, 84) as usize;
        let entries_crc = le_u32(&header, 88);

        if entry_size < ENTRY_MIN_SIZE || entry_size % 8 != 0 {
            return Err(DdiError::Partition(format!(
                "Invalid GPT entry size: {}",
                entry_size
            )));
        }
        let array_size = entry_count
            .checked_mul(entry_size)
            .filter(|&n| n <= MAX_ENTRY_ARRAY_SIZE)
            .ok_or_else(|| {
                DdiError::Partition(format!(
                    "GPT entry array too large: {} entries of {} bytes",
                    entry_count, entry_size
                ))
            })?;

        let entries_offset = entries_lba.checked_mul(block_size).ok_or_else(|| {
            DdiError::Partition(format!("GPT entry array LBA {} is out of range", entries_lba))
        })?;
        let mut entries = vec![0u8; array_size];
        store.read_at(&mut entries, entries_offset)?;

        let computed_crc = crc32fast::hash(&entries);
        if entries_crc != computed_crc {
            return Err(DdiError::Partition(format!(
                "GPT entry array CRC mismatch: stored {:#010x}, computed {:#010x}",
                entries_crc, computed_crc
            )));
        }

        let mut partitions = Vec::new();
        for (i, entry) in entries.chunks_exact(entry_size).enumerate() {
            if let Some(partition) = GptPartition::parse(i as u32 + 1, entry)? {
                partitions.push(partition);
            }
        }

        debug!(block_size, partitions = partitions.len(), "read GPT");

        Ok(Self {
            block_size,
            partitions,
        })
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Used partitions in table order
    pub fn partitions(&self) -> &[GptPartition] {
        &self.partitions
    }

    /// First partition with the given type GUID
    pub fn find_by_type(&self, type_guid: &[u8; 16]) -> Result<&GptPartition> {
        self.partitions
            .iter()
            .find(|p| &p.type_guid == type_guid)
            .ok_or_else(|| {
                DdiError::Partition(format!(
                    "No partition with type {}",
                    format_guid(type_guid)
                ))
            })
    }

    /// Byte extent of the EFI System Partition
    pub fn esp_extent(&self) -> Result<Extent> {
        self.find_by_type(&ESP_TYPE_GUID)?.extent(self.block_size)
    }
}
