//! PE Reader
//!
//! Resolves a named section of a PE/COFF image (such as a unified kernel
//! image) to its byte extent in the file.

use tracing::debug;

use crate::error::{DdiError, Result};
use crate::store::Store;

use super::{le_u16, le_u32, Extent};

const DOS_HEADER_SIZE: usize = 64;
const DOS_MAGIC: &[u8; 2] = b"MZ";
/// Offset of `e_lfanew` in the DOS header
const PE_POINTER_OFFSET: usize = 0x3C;

const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
/// Signature (4) + COFF file header (20)
const PE_HEADERS_SIZE: usize = 24;

const SECTION_HEADER_SIZE: usize = 40;
/// The PE format caps the section count
const MAX_SECTIONS: usize = 96;

/// A section table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeSection {
    pub name: String,
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub raw_size: u32,
    pub raw_offset: u32,
}

impl PeSection {
    /// File extent of the section's meaningful bytes
    pub fn extent(&self) -> Extent {
        Extent::new(self.raw_offset as u64, self.virtual_size as u64)
    }
}

/// Read the section table of the image in `store`
pub fn sections<S: Store>(store: &mut S) -> Result<Vec<PeSection>> {
    let mut dos = [0u8; DOS_HEADER_SIZE];
    store.read_at(&mut dos, 0)?;
    if &dos[0..2] != DOS_MAGIC {
        return Err(DdiError::Executable("Missing MZ signature".to_string()));
    }

    let pe_offset = le_u32(&dos, PE_POINTER_OFFSET) as u64;
    let mut headers = [0u8; PE_HEADERS_SIZE];
    store.read_at(&mut headers, pe_offset)?;
    if &headers[0..4] != PE_SIGNATURE {
        return Err(DdiError::Executable(format!(
            "Missing PE signature at offset {}",
            pe_offset
        )));
    }

    let section_count = le_u16(&headers, 6) as usize;
    let optional_header_size = le_u16(&headers, 20) as u64;
    if section_count > MAX_SECTIONS {
        return Err(DdiError::Executable(format!(
            "Too many sections: {}",
            section_count
        )));
    }

    let table_offset = pe_offset + PE_HEADERS_SIZE as u64 + optional_header_size;
    let mut table = vec![0u8; section_count * SECTION_HEADER_SIZE];
    if !table.is_empty() {
        store.read_at(&mut table, table_offset)?;
    }

    let sections = table
        .chunks_exact(SECTION_HEADER_SIZE)
        .map(|header| {
            let name_len = header[0..8].iter().position(|&b| b == 0).unwrap_or(8);
            PeSection {
                name: String::from_utf8_lossy(&header[..name_len]).into_owned(),
                virtual_size: le_u32(header, 8),
                virtual_address: le_u32(header, 12),
                raw_size: le_u32(header, 16),
                raw_offset: le_u32(header, 20),
            }
        })
        .collect();

    Ok(sections)
}

/// Extent of the section called `name`, relative to the start of the image
pub fn section_extent<S: Store>(store: &mut S, name: &str) -> Result<Extent> {
    let section = sections(store)?
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| DdiError::Executable(format!("Section {} not found", name)))?;

    if section.virtual_size > section.raw_size {
        return Err(DdiError::Executable(format!(
            "Section {} has {} bytes in memory but only {} in the file",
            name, section.virtual_size, section.raw_size
        )));
    }

    let extent = section.extent();
    debug!(section = name, offset = extent.offset, size = extent.size, "resolved section");
    Ok(extent)
}
