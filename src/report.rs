//! Repart Report
//!
//! Model of the JSON report `systemd-repart --json=pretty` prints, and
//! extraction of the dm-verity root hashes it carries.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One partition of the report. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepartPartition {
    #[serde(rename = "type")]
    pub partition_type: String,
    pub label: String,
    pub uuid: String,
    pub partno: i64,
    pub file: String,
    pub node: String,
    pub offset: u64,
    pub old_size: u64,
    pub raw_size: u64,
    pub old_padding: u64,
    pub raw_padding: u64,
    pub activity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roothash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usrhash: Option<String>,
}

/// The full report: a JSON array of partitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepartReport {
    pub partitions: Vec<RepartPartition>,
}

/// Root hashes to inject into the kernel command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerityHashes {
    pub roothash: Option<String>,
    pub usrhash: Option<String>,
}

impl VerityHashes {
    /// `(key, hash)` pairs in the order they are applied
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [("roothash", &self.roothash), ("usrhash", &self.usrhash)]
            .into_iter()
            .filter_map(|(key, hash)| hash.as_deref().map(|h| (key, h)))
    }

    pub fn is_empty(&self) -> bool {
        self.roothash.is_none() && self.usrhash.is_none()
    }
}

impl RepartReport {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_slice(&fs::read(path)?)
    }

    /// Root hashes of the report; when several partitions carry one, the last
    /// non-empty value wins
    pub fn verity_hashes(&self) -> VerityHashes {
        let mut hashes = VerityHashes::default();
        for partition in &self.partitions {
            if let Some(hash) = partition.roothash.as_ref().filter(|h| !h.is_empty()) {
                hashes.roothash = Some(hash.clone());
            }
            if let Some(hash) = partition.usrhash.as_ref().filter(|h| !h.is_empty()) {
                hashes.usrhash = Some(hash.clone());
            }
        }
        hashes
    }
}
