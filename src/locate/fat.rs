//! FAT Reader
//!
//! Read-only FAT12/16/32 directory walker that resolves a path to the byte
//! extent of the file's content.
//!
//! Only contiguous files resolve to an extent: the field editor needs one
//! linear byte range, so a fragmented cluster chain is an error.

use tracing::debug;

use crate::error::{DdiError, Result};
use crate::store::Store;

use super::{le_u16, le_u32, Extent};

const BOOT_SECTOR_SIZE: usize = 512;
const DIR_ENTRY_SIZE: usize = 32;

const ATTR_VOLUME_ID: u8 = 0x08;
const ATTR_DIRECTORY: u8 = 0x10;
const ATTR_LONG_NAME: u8 = 0x0F;
const ATTR_LONG_NAME_MASK: u8 = 0x3F;

const ENTRY_END: u8 = 0x00;
const ENTRY_DELETED: u8 = 0xE5;
/// A short name starting with 0xE5 is stored as 0x05
const ENTRY_KANJI_E5: u8 = 0x05;

/// Characters per long-name entry: offsets of the three UTF-16 runs
const LFN_RUNS: [(usize, usize); 3] = [(1, 11), (14, 26), (28, 32)];

/// FAT variant, decided by cluster count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatKind {
    Fat12,
    Fat16,
    Fat32,
}

impl FatKind {
    fn from_cluster_count(count: u64) -> Self {
        if count < 4085 {
            FatKind::Fat12
        } else if count < 65525 {
            FatKind::Fat16
        } else {
            FatKind::Fat32
        }
    }

    /// Smallest FAT value marking the end of a chain
    fn end_of_chain(self) -> u32 {
        match self {
            FatKind::Fat12 => 0xFF8,
            FatKind::Fat16 => 0xFFF8,
            FatKind::Fat32 => 0x0FFF_FFF8,
        }
    }
}

/// Where a directory's entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directory {
    /// FAT12/16 root directory region
    FixedRoot { offset: u64, size: u64 },
    /// Cluster chain starting at the given cluster
    Chain(u32),
}

/// A parsed directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Long name if present, otherwise the short name
    pub name: String,
    /// 8.3 name as `NAME.EXT`
    pub short_name: String,
    pub attributes: u8,
    pub first_cluster: u32,
    pub size: u32,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    fn matches(&self, component: &str) -> bool {
        self.name.eq_ignore_ascii_case(component) || self.short_name.eq_ignore_ascii_case(component)
    }
}

// =============================================================================
// Filesystem
// =============================================================================

/// A FAT filesystem on a store scoped to its partition
pub struct FatFilesystem<S> {
    store: S,
    kind: FatKind,
    cluster_size: u64,
    cluster_count: u64,
    /// Offset of the first FAT
    fat_offset: u64,
    /// Offset of cluster 2
    data_offset: u64,
    root: Directory,
}

impl<S: Store> FatFilesystem<S> {
    /// Parse the BIOS parameter block at the start of `store`
    pub fn open(mut store: S) -> Result<Self> {
        let mut boot = [0u8; BOOT_SECTOR_SIZE];
        store.read_at(&mut boot, 0)?;

        if boot[510] != 0x55 || boot[511] != 0xAA {
            return Err(DdiError::Filesystem("Missing boot sector signature".to_string()));
        }

        let bytes_per_sector = le_u16(&boot, 11) as u64;
        let sectors_per_cluster = boot[13] as u64;
        let reserved_sectors = le_u16(&boot, 14) as u64;
        let fat_count = boot[16] as u64;
        let root_entries = le_u16(&boot, 17) as u64;
        let total_sectors = match le_u16(&boot, 19) {
            0 => le_u32(&boot, 32) as u64,
            n => n as u64,
        };
        let fat_sectors = match le_u16(&boot, 22) {
            0 => le_u32(&boot, 36) as u64,
            n => n as u64,
        };

        if !(512..=4096).contains(&bytes_per_sector) || !bytes_per_sector.is_power_of_two() {
            return Err(DdiError::Filesystem(format!(
                "Invalid bytes per sector: {}",
                bytes_per_sector
            )));
        }
        if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
            return Err(DdiError::Filesystem(format!(
                "Invalid sectors per cluster: {}",
                sectors_per_cluster
            )));
        }
        if fat_count == 0 || fat_sectors == 0 {
            return Err(DdiError::Filesystem("No file allocation table".to_string()));
        }

        let root_dir_sectors =
            (root_entries * DIR_ENTRY_SIZE as u64).div_ceil(bytes_per_sector);
        let first_data_sector = reserved_sectors + fat_count * fat_sectors + root_dir_sectors;
        let data_sectors = total_sectors.checked_sub(first_data_sector).ok_or_else(|| {
            DdiError::Filesystem(format!(
                "Data region starts (sector {}) past end of volume ({} sectors)",
                first_data_sector, total_sectors
            ))
        })?;

        let cluster_count = data_sectors / sectors_per_cluster;
        let kind = FatKind::from_cluster_count(cluster_count);

        let root = match kind {
            FatKind::Fat32 => Directory::Chain(le_u32(&boot, 44)),
            FatKind::Fat12 | FatKind::Fat16 => Directory::FixedRoot {
                offset: (reserved_sectors + fat_count * fat_sectors) * bytes_per_sector,
                size: root_entries * DIR_ENTRY_SIZE as u64,
            },
        };

        debug!(?kind, cluster_count, bytes_per_sector, sectors_per_cluster, "opened FAT filesystem");

        Ok(Self {
            store,
            kind,
            cluster_size: bytes_per_sector * sectors_per_cluster,
            cluster_count,
            fat_offset: reserved_sectors * bytes_per_sector,
            data_offset: first_data_sector * bytes_per_sector,
            root,
        })
    }

    pub fn kind(&self) -> FatKind {
        self.kind
    }

    pub fn cluster_size(&self) -> u64 {
        self.cluster_size
    }

    /// Resolve `path` to the extent of the file's content, relative to the
    /// start of the filesystem
    pub fn file_extent(&mut self, path: &str) -> Result<Extent> {
        let entry = self.lookup(path)?;
        if entry.is_dir() {
            return Err(DdiError::Filesystem(format!("{} is a directory", path)));
        }
        if entry.size == 0 || entry.first_cluster < 2 {
            return Err(DdiError::Filesystem(format!("{} has no content", path)));
        }

        let chain = self.chain(entry.first_cluster)?;
        if chain.windows(2).any(|w| w[1] != w[0] + 1) {
            return Err(DdiError::Filesystem(format!("{} is fragmented", path)));
        }
        if (chain.len() as u64) * self.cluster_size < entry.size as u64 {
            return Err(DdiError::Filesystem(format!(
                "{} is larger than its cluster chain",
                path
            )));
        }

        let extent = Extent::new(self.cluster_offset(entry.first_cluster), entry.size as u64);
        debug!(path, offset = extent.offset, size = extent.size, "resolved file extent");
        Ok(extent)
    }

    /// Find the directory entry for `path` (components separated by `/`)
    pub fn lookup(&mut self, path: &str) -> Result<DirEntry> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let Some((last, parents)) = components.split_last() else {
            return Err(DdiError::Filesystem(format!("Invalid path {:?}", path)));
        };

        let mut dir = self.root;
        for component in parents {
            let entry = self.find_in(dir, component, path)?;
            if !entry.is_dir() {
                return Err(DdiError::Filesystem(format!(
                    "{} in {} is not a directory",
                    component, path
                )));
            }
            dir = if entry.first_cluster == 0 {
                self.root
            } else {
                Directory::Chain(entry.first_cluster)
            };
        }
        self.find_in(dir, last, path)
    }

    /// List the entries of the directory at `path` (`/` for the root)
    pub fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntry>> {
        if path.split('/').all(|c| c.is_empty()) {
            return self.entries(self.root);
        }
        let entry = self.lookup(path)?;
        if !entry.is_dir() {
            return Err(DdiError::Filesystem(format!("{} is not a directory", path)));
        }
        let dir = if entry.first_cluster == 0 {
            self.root
        } else {
            Directory::Chain(entry.first_cluster)
        };
        self.entries(dir)
    }

    fn find_in(&mut self, dir: Directory, component: &str, path: &str) -> Result<DirEntry> {
        self.entries(dir)?
            .into_iter()
            .find(|e| e.matches(component))
            .ok_or_else(|| {
                DdiError::Filesystem(format!("{} not found (looking up {})", component, path))
            })
    }

    // =========================================================================
    // Clusters
    // =========================================================================

    fn cluster_offset(&self, cluster: u32) -> u64 {
        self.data_offset + (cluster as u64 - 2) * self.cluster_size
    }

    /// FAT value for `cluster`
    fn next_cluster(&mut self, cluster: u32) -> Result<u32> {
        let value = match self.kind {
            FatKind::Fat12 => {
                let at = cluster as u64 + cluster as u64 / 2;
                let mut raw = [0u8; 2];
                self.store.read_at(&mut raw, self.fat_offset + at)?;
                let pair = u16::from_le_bytes(raw);
                if cluster & 1 == 1 {
                    (pair >> 4) as u32
                } else {
                    (pair & 0x0FFF) as u32
                }
            }
            FatKind::Fat16 => {
                let mut raw = [0u8; 2];
                self.store.read_at(&mut raw, self.fat_offset + cluster as u64 * 2)?;
                u16::from_le_bytes(raw) as u32
            }
            FatKind::Fat32 => {
                let mut raw = [0u8; 4];
                self.store.read_at(&mut raw, self.fat_offset + cluster as u64 * 4)?;
                u32::from_le_bytes(raw) & 0x0FFF_FFFF
            }
        };
        Ok(value)
    }

    /// Every cluster of the chain starting at `first`, in order
    fn chain(&mut self, first: u32) -> Result<Vec<u32>> {
        let end = self.kind.end_of_chain();
        let mut chain = Vec::new();
        let mut cluster = first;
        loop {
            if cluster < 2 || cluster as u64 >= self.cluster_count + 2 {
                return Err(DdiError::Filesystem(format!(
                    "Cluster chain from {} reaches invalid cluster {}",
                    first, cluster
                )));
            }
            if chain.len() as u64 > self.cluster_count {
                return Err(DdiError::Filesystem(format!(
                    "Cluster chain from {} loops",
                    first
                )));
            }
            chain.push(cluster);

            let next = self.next_cluster(cluster)?;
            if next >= end {
                return Ok(chain);
            }
            cluster = next;
        }
    }

    // =========================================================================
    // Directories
    // =========================================================================

    fn entries(&mut self, dir: Directory) -> Result<Vec<DirEntry>> {
        let raw = match dir {
            Directory::FixedRoot { offset, size } => {
                let mut raw = vec![0u8; size as usize];
                self.store.read_at(&mut raw, offset)?;
                raw
            }
            Directory::Chain(first) => {
                let chain = self.chain(first)?;
                let mut raw = vec![0u8; chain.len() * self.cluster_size as usize];
                for (chunk, &cluster) in raw.chunks_mut(self.cluster_size as usize).zip(&chain) {
                    let offset = self.cluster_offset(cluster);
                    self.store.read_at(chunk, offset)?;
                }
                raw
            }
        };
        Ok(parse_entries(&raw))
    }
}

// =============================================================================
// Directory Entry Parsing
// =============================================================================

/// Long-name fragments collected ahead of the short entry they belong to
#[derive(Default)]
struct LongName {
    checksum: u8,
    parts: Vec<(u8, Vec<u16>)>,
}

impl LongName {
    fn push(&mut self, entry: &[u8]) {
        let checksum = entry[13];
        if self.parts.is_empty() {
            self.checksum = checksum;
        } else if checksum != self.checksum {
            self.parts.clear();
            self.checksum = checksum;
        }

        let mut units = Vec::with_capacity(13);
        for (start, end) in LFN_RUNS {
            units.extend(
                entry[start..end]
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]])),
            );
        }
        self.parts.push((entry[0] & 0x1F, units));
    }

    /// Assemble the name if it belongs to the short name `raw_name`
    fn take(&mut self, raw_name: &[u8]) -> Option<String> {
        if self.parts.is_empty() {
            return None;
        }
        let mut parts = std::mem::take(&mut self.parts);
        if short_name_checksum(raw_name) != self.checksum {
            return None;
        }

        parts.sort_by_key(|(ordinal, _)| *ordinal);
        let units: Vec<u16> = parts
            .into_iter()
            .flat_map(|(_, units)| units)
            .take_while(|&u| u != 0x0000)
            .filter(|&u| u != 0xFFFF)
            .collect();
        Some(String::from_utf16_lossy(&units))
    }
}

fn short_name_checksum(raw_name: &[u8]) -> u8 {
    raw_name
        .iter()
        .fold(0u8, |sum, &b| ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b))
}

fn decode_short_name(raw_name: &[u8]) -> String {
    let mut base = raw_name[0..8].to_vec();
    if base[0] == ENTRY_KANJI_E5 {
        base[0] = ENTRY_DELETED;
    }
    let base = String::from_utf8_lossy(&base).trim_end().to_string();
    let ext = String::from_utf8_lossy(&raw_name[8..11]).trim_end().to_string();
    if ext.is_empty() {
        base
    } else {
        format!("{}.{}", base, ext)
    }
}

fn parse_entries(raw: &[u8]) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    let mut long_name = LongName::default();

    for entry in raw.chunks_exact(DIR_ENTRY_SIZE) {
        match entry[0] {
            ENTRY_END => break,
            ENTRY_DELETED => {
                long_name.parts.clear();
                continue;
            }
            _ => {}
        }

        let attributes = entry[11];
        if attributes & ATTR_LONG_NAME_MASK == ATTR_LONG_NAME {
            long_name.push(entry);
            continue;
        }
        if attributes & ATTR_VOLUME_ID != 0 {
            long_name.parts.clear();
            continue;
        }

        let raw_name = &entry[0..11];
        let short_name = decode_short_name(raw_name);
        let name = long_name.take(raw_name).unwrap_or_else(|| short_name.clone());

        entries.push(DirEntry {
            name,
            short_name,
            attributes,
            first_cluster: ((le_u16(entry, 20) as u32) << 16) | le_u16(entry, 26) as u32,
            size: le_u32(entry, 28),
        });
    }

    entries
}
