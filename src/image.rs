//! Disk Image Module
//!
//! Opens a discoverable disk image and locates the kernel command line of
//! the UKI stored in its EFI System Partition.
//!
//! ## Resolution
//! 1. GPT: EFI System Partition → partition extent
//! 2. FAT: `config.uki_path` inside that partition → file extent
//! 3. PE: `config.section_name` inside that file → section extent
//!
//! The three offsets add up to the absolute position of the field.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{DdiError, Result};
use crate::field::FieldEditor;
use crate::locate::{gpt, pe, Extent, FatFilesystem, GptTable};
use crate::store::BoundedRegion;

/// An image file opened for in-place patching
pub struct DiskImage {
    path: PathBuf,
    file: File,
    config: Config,
    block_size: u64,
}

impl DiskImage {
    /// Open the image read-write
    ///
    /// The block size comes from `config.block_size`, or is learned from the
    /// GPT header position when unset.
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let block_size = match config.block_size {
            Some(size) => size,
            None => gpt::learn_block_size(&mut file)?,
        };

        info!(path = %path.display(), block_size, "opened image");

        Ok(Self {
            path,
            file,
            config,
            block_size,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config: autodetected block size, default UKI path
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, Config::default())
    }

    /// Absolute extent of the command line section
    pub fn locate_cmdline(&mut self) -> Result<Extent> {
        let image = Extent::new(0, self.file.metadata()?.len());

        let esp = GptTable::read(&mut self.file, self.block_size)?
            .esp_extent()?
            .within(image)
            .ok_or_else(|| {
                DdiError::Partition("EFI System Partition extends past end of image".to_string())
            })?;
        debug!(offset = esp.offset, size = esp.size, "found EFI System Partition");

        let uki = {
            let partition = BoundedRegion::new(&mut self.file, esp.offset, esp.size);
            FatFilesystem::open(partition)?.file_extent(&self.config.uki_path)?
        };
        let uki = uki.within(esp).ok_or_else(|| {
            DdiError::Filesystem(format!(
                "{} extends past end of partition",
                self.config.uki_path
            ))
        })?;
        debug!(offset = uki.offset, size = uki.size, path = %self.config.uki_path, "found UKI");

        let section = {
            let mut file = BoundedRegion::new(&mut self.file, uki.offset, uki.size);
            pe::section_extent(&mut file, &self.config.section_name)?
        };
        let section = section.within(uki).ok_or_else(|| {
            DdiError::Executable(format!(
                "Section {} extends past end of {}",
                self.config.section_name, self.config.uki_path
            ))
        })?;

        info!(
            offset = section.offset,
            capacity = section.size,
            section = %self.config.section_name,
            "located command line"
        );
        Ok(section)
    }

    /// Editor over the command line field, writing straight to the image
    pub fn cmdline(&mut self) -> Result<FieldEditor<&mut File>> {
        let extent = self.locate_cmdline()?;
        Ok(FieldEditor::new(&mut self.file, extent.offset, extent.size)
            .with_chunk_size(self.config.scan_chunk_size))
    }

    /// Flush all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
