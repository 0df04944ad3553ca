//! Repart report parsing tests

use std::fs;

use ddipatch::report::RepartPartition;
use ddipatch::{DdiError, RepartReport, VerityHashes};
use tempfile::TempDir;

const REPORT: &str = r#"[
    {
        "type" : "esp",
        "label" : "esp",
        "uuid" : "6d3b1e5c-4a2f-4b1e-9c3d-2e1f0a9b8c7d",
        "partno" : 0,
        "file" : "/usr/lib/repart.d/10-esp.conf",
        "node" : "image.raw1",
        "offset" : 1048576,
        "old_size" : 0,
        "raw_size" : 104857600,
        "size" : "→ 100M",
        "old_padding" : 0,
        "raw_padding" : 0,
        "padding" : "→ 0B",
        "activity" : "create"
    },
    {
        "type" : "root-x86-64",
        "label" : "root",
        "uuid" : "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f",
        "partno" : 1,
        "file" : "/usr/lib/repart.d/20-root.conf",
        "node" : "image.raw2",
        "offset" : 105906176,
        "old_size" : 0,
        "raw_size" : 536870912,
        "size" : "→ 512M",
        "old_padding" : 0,
        "raw_padding" : 0,
        "padding" : "→ 0B",
        "activity" : "create",
        "roothash" : "1111111111111111111111111111111111111111111111111111111111111111"
    },
    {
        "type" : "root-x86-64-verity",
        "label" : "root-verity",
        "uuid" : "2c3d4e5f-6a7b-4c8d-9e0f-1a2b3c4d5e6f",
        "partno" : 2,
        "file" : "/usr/lib/repart.d/21-root-verity.conf",
        "node" : "image.raw3",
        "offset" : 642777088,
        "old_size" : 0,
        "raw_size" : 4194304,
        "old_padding" : 0,
        "raw_padding" : 0,
        "activity" : "create",
        "roothash" : "2222222222222222222222222222222222222222222222222222222222222222"
    }
]"#;

#[test]
fn test_parse_report() {
    let report = RepartReport::from_slice(REPORT.as_bytes()).unwrap();
    assert_eq!(report.partitions.len(), 3);

    let root = &report.partitions[1];
    assert_eq!(root.partition_type, "root-x86-64");
    assert_eq!(root.label, "root");
    assert_eq!(root.partno, 1);
    assert_eq!(root.offset, 105906176);
    assert_eq!(root.raw_size, 536870912);
    assert_eq!(root.activity, "create");
    assert!(root.usrhash.is_none());

    assert!(report.partitions[0].roothash.is_none());
}

#[test]
fn test_last_hash_wins() {
    let report = RepartReport::from_slice(REPORT.as_bytes()).unwrap();
    let hashes = report.verity_hashes();

    assert_eq!(
        hashes.roothash.as_deref(),
        Some("2222222222222222222222222222222222222222222222222222222222222222")
    );
    assert!(hashes.usrhash.is_none());

    let pairs: Vec<_> = hashes.pairs().collect();
    assert_eq!(
        pairs,
        vec![(
            "roothash",
            "2222222222222222222222222222222222222222222222222222222222222222"
        )]
    );
}

#[test]
fn test_empty_hash_does_not_override() {
    let report = RepartReport::from_slice(
        br#"[
            {"type": "root-x86-64", "roothash": "aaaa"},
            {"type": "usr-x86-64", "usrhash": "bbbb"},
            {"type": "root-x86-64-verity", "roothash": ""},
            {"type": "usr-x86-64-verity", "usrhash": null}
        ]"#,
    )
    .unwrap();

    assert_eq!(
        report.verity_hashes(),
        VerityHashes {
            roothash: Some("aaaa".to_string()),
            usrhash: Some("bbbb".to_string()),
        }
    );
}

#[test]
fn test_pairs_order() {
    let hashes = VerityHashes {
        roothash: Some("r".to_string()),
        usrhash: Some("u".to_string()),
    };
    let pairs: Vec<_> = hashes.pairs().collect();
    assert_eq!(pairs, vec![("roothash", "r"), ("usrhash", "u")]);

    let usr_only = VerityHashes {
        roothash: None,
        usrhash: Some("u".to_string()),
    };
    assert_eq!(usr_only.pairs().collect::<Vec<_>>(), vec![("usrhash", "u")]);
}

#[test]
fn test_report_without_hashes() {
    let report = RepartReport::from_slice(b"[]").unwrap();
    assert!(report.partitions.is_empty());
    assert!(report.verity_hashes().is_empty());

    let report = RepartReport::from_slice(br#"[{"type": "esp", "label": "esp"}]"#).unwrap();
    assert_eq!(report.partitions[0], RepartPartition {
        partition_type: "esp".to_string(),
        label: "esp".to_string(),
        ..Default::default()
    });
    assert!(report.verity_hashes().is_empty());
}

#[test]
fn test_invalid_report() {
    assert!(matches!(
        RepartReport::from_slice(b"{ not json"),
        Err(DdiError::Report(_))
    ));
    // An object, not an array of partitions
    assert!(matches!(
        RepartReport::from_slice(br#"{"type": "esp"}"#),
        Err(DdiError::Report(_))
    ));
    assert!(matches!(
        RepartReport::from_slice(br#"[{"partno": "one"}]"#),
        Err(DdiError::Report(_))
    ));
}

#[test]
fn test_report_from_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repart.json");
    fs::write(&path, REPORT).unwrap();

    let report = RepartReport::from_path(&path).unwrap();
    assert_eq!(report.partitions.len(), 3);

    assert!(matches!(
        RepartReport::from_path(dir.path().join("missing.json")),
        Err(DdiError::Io(_))
    ));
}
