//! # ddipatch
//!
//! In-place patching of the kernel command line embedded in a discoverable
//! disk image, without ever changing the size of anything on disk.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ddipatch finalize                        │
//! │              (repart report → verity hashes)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      DiskImage                              │
//! │            GPT ──► FAT ──► PE (.cmdline extent)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ (offset, capacity)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     FieldEditor                             │
//! │     read / replace / append / set / set_one (in place)      │
//! └──────────┬───────────────────────────────┬──────────────────┘
//!            │                               │
//!            ▼                               ▼
//!   ┌─────────────────┐             ┌─────────────────┐
//!   │  TokenScanner   │             │   FieldWriter   │
//!   │  KeyScanner     │             │  (pad to span)  │
//!   └────────┬────────┘             └────────┬────────┘
//!            └───────────────┬───────────────┘
//!                            ▼
//!                   ┌─────────────────┐
//!                   │  BoundedRegion  │
//!                   │   over Store    │
//!                   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod field;
pub mod image;
pub mod locate;
pub mod report;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{DdiError, Result};
pub use field::FieldEditor;
pub use image::DiskImage;
pub use report::{RepartReport, VerityHashes};
pub use store::{BoundedRegion, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ddipatch
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
