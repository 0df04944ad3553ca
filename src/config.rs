//! Configuration for ddipatch
//!
//! Centralized configuration with sensible defaults.

use crate::error::{DdiError, Result};

/// Default location of the unified kernel image inside the EFI partition
pub const DEFAULT_UKI_PATH: &str = "/EFI/BOOT/BOOTX64.EFI";

/// Default name of the PE section holding the kernel command line
pub const DEFAULT_SECTION_NAME: &str = ".cmdline";

/// Default number of bytes the token scanner reads per chunk
pub const DEFAULT_SCAN_CHUNK_SIZE: usize = 4096;

/// Main configuration for locating and editing a command line field
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Image Configuration
    // -------------------------------------------------------------------------
    /// Logical block size of the image in bytes.
    /// `None` learns it from the position of the GPT header signature.
    pub block_size: Option<u64>,

    /// Path of the UKI binary inside the EFI partition
    pub uki_path: String,

    /// Name of the PE section holding the field
    pub section_name: String,

    // -------------------------------------------------------------------------
    // Editor Configuration
    // -------------------------------------------------------------------------
    /// Chunk size used when scanning the field for tokens
    pub scan_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: None,
            uki_path: DEFAULT_UKI_PATH.to_string(),
            section_name: DEFAULT_SECTION_NAME.to_string(),
            scan_chunk_size: DEFAULT_SCAN_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings that cannot describe a real image
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.block_size {
            if size < 512 || !size.is_power_of_two() {
                return Err(DdiError::Config(format!(
                    "Block size must be a power of two >= 512, got {}",
                    size
                )));
            }
        }
        if self.scan_chunk_size == 0 {
            return Err(DdiError::Config("Scan chunk size must be non-zero".to_string()));
        }
        if self.section_name.is_empty() || self.section_name.len() > 8 {
            return Err(DdiError::Config(format!(
                "Section name {:?} must be 1 to 8 bytes",
                self.section_name
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the block size; `0` means autodetect
    pub fn block_size(mut self, size: u64) -> Self {
        self.config.block_size = (size != 0).then_some(size);
        self
    }

    /// Set the path of the UKI inside the EFI partition; empty means the
    /// default path
    pub fn uki_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.config.uki_path = if path.is_empty() {
            DEFAULT_UKI_PATH.to_string()
        } else {
            path
        };
        self
    }

    /// Set the PE section name of the field
    pub fn section_name(mut self, name: impl Into<String>) -> Self {
        self.config.section_name = name.into();
        self
    }

    /// Set the scanner chunk size (in bytes)
    pub fn scan_chunk_size(mut self, size: usize) -> Self {
        self.config.scan_chunk_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
