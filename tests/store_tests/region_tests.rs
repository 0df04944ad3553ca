//! Tests for BoundedRegion
//!
//! These tests verify:
//! - Offsets are translated into the parent window
//! - Accesses at or past the window end signal end-of-range untouched
//! - Transfers crossing the window end are truncated, performed and signaled
//! - Parent errors pass through unchanged

use std::io;

use ddipatch::{BoundedRegion, DdiError, Result, Store};

// =============================================================================
// Helper Functions
// =============================================================================

/// Parent store that records every access it receives
struct RecordingStore {
    data: Vec<u8>,
    accesses: Vec<(u64, usize)>,
}

impl RecordingStore {
    fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            accesses: Vec::new(),
        }
    }
}

impl Store for RecordingStore {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.accesses.push((offset, buf.len()));
        self.data.read_at(buf, offset)
    }

    fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        self.accesses.push((offset, data.len()));
        self.data.write_at(data, offset)
    }
}

/// Parent store whose every access fails
struct FailingStore;

impl Store for FailingStore {
    fn read_at(&mut self, _buf: &mut [u8], _offset: u64) -> Result<usize> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
    }

    fn write_at(&mut self, _data: &[u8], _offset: u64) -> Result<usize> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
    }
}

fn transferred(err: DdiError) -> usize {
    match err {
        DdiError::EndOfRange { transferred, .. } => transferred,
        other => panic!("expected end of range, got {other}"),
    }
}

// =============================================================================
// Translation Tests
// =============================================================================

#[test]
fn test_read_translates_offset() {
    let mut region = BoundedRegion::new(b"xxxxhello worldyyyy".to_vec(), 4, 11);

    let mut buf = [0u8; 5];
    assert_eq!(region.read_at(&mut buf, 6).unwrap(), 5);
    assert_eq!(&buf, b"world");
}

#[test]
fn test_write_translates_offset() {
    let mut region = BoundedRegion::new(b"xxxxhello worldyyyy".to_vec(), 4, 11);

    region.write_at(b"HELLO", 0).unwrap();
    assert_eq!(region.into_inner(), b"xxxxHELLO worldyyyy");
}

#[test]
fn test_region_accessors() {
    let region = BoundedRegion::new(vec![0u8; 10], 3, 5);
    assert_eq!(region.offset(), 3);
    assert_eq!(region.size(), 5);
}

// =============================================================================
// Boundary Tests
// =============================================================================

#[test]
fn test_read_at_end_does_not_touch_parent() {
    let mut region = BoundedRegion::new(RecordingStore::new(b"0123456789"), 2, 4);

    let mut buf = [0u8; 1];
    assert_eq!(transferred(region.read_at(&mut buf, 4).unwrap_err()), 0);
    assert_eq!(transferred(region.read_at(&mut buf, 100).unwrap_err()), 0);
    assert!(region.into_inner().accesses.is_empty());
}

#[test]
fn test_write_past_end_does_not_touch_parent() {
    let mut region = BoundedRegion::new(RecordingStore::new(b"0123456789"), 2, 4);

    assert_eq!(transferred(region.write_at(b"zz", 4).unwrap_err()), 0);

    let parent = region.into_inner();
    assert!(parent.accesses.is_empty());
    assert_eq!(parent.data, b"0123456789");
}

#[test]
fn test_crossing_read_is_truncated_and_signaled() {
    let mut region = BoundedRegion::new(RecordingStore::new(b"0123456789"), 2, 4);

    let mut buf = [b'?'; 4];
    assert_eq!(transferred(region.read_at(&mut buf, 2).unwrap_err()), 2);
    assert_eq!(&buf, b"45??");

    assert_eq!(region.into_inner().accesses, vec![(4, 2)]);
}

#[test]
fn test_crossing_write_is_truncated_and_signaled() {
    let mut region = BoundedRegion::new(RecordingStore::new(b"0123456789"), 2, 4);

    assert_eq!(transferred(region.write_at(b"abcdef", 1).unwrap_err()), 3);

    let parent = region.into_inner();
    assert_eq!(parent.data, b"012abc6789");
    assert_eq!(parent.accesses, vec![(3, 3)]);
}

#[test]
fn test_zero_size_region_rejects_everything() {
    let mut region = BoundedRegion::new(b"abc".to_vec(), 1, 0);
    let mut buf = [0u8; 1];
    assert!(region.read_at(&mut buf, 0).unwrap_err().is_end_of_range());
    assert!(region.write_at(b"x", 0).unwrap_err().is_end_of_range());
    assert_eq!(region.into_inner(), b"abc");
}

#[test]
fn test_nested_regions_compose() {
    let outer = BoundedRegion::new(b"....[inner]....".to_vec(), 4, 7);
    let mut inner = BoundedRegion::new(outer, 1, 5);

    let mut buf = [0u8; 5];
    inner.read_at(&mut buf, 0).unwrap();
    assert_eq!(&buf, b"inner");
}

// =============================================================================
// Error Propagation Tests
// =============================================================================

#[test]
fn test_parent_error_passes_through() {
    let mut region = BoundedRegion::new(FailingStore, 0, 16);

    let mut buf = [0u8; 4];
    match region.read_at(&mut buf, 0) {
        Err(DdiError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
        other => panic!("expected io error, got {other:?}"),
    }
    assert!(matches!(region.write_at(b"x", 0), Err(DdiError::Io(_))));
}

#[test]
fn test_region_over_mutable_reference() {
    let mut data = b"abcdef".to_vec();
    {
        let mut region = BoundedRegion::new(&mut data, 2, 2);
        region.write_at(b"XY", 0).unwrap();
    }
    assert_eq!(data, b"abXYef");
}

#[test]
fn test_region_over_boxed_store() {
    let parent: Box<dyn Store> = Box::new(b"0123456789".to_vec());
    let mut region = BoundedRegion::new(parent, 4, 3);

    let mut buf = [0u8; 3];
    region.read_at(&mut buf, 0).unwrap();
    assert_eq!(&buf, b"456");

    assert!(region.write_at(b"abcd", 0).unwrap_err().is_end_of_range());
    let mut parent = region.into_inner();
    let mut all = [0u8; 10];
    parent.read_at(&mut all, 0).unwrap();
    assert_eq!(&all, b"0123abc789");
}
