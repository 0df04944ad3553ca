//! Property tests for FieldEditor
//!
//! These tests verify, over generated fields:
//! - Replace then Read yields the text right-padded to capacity
//! - Oversized Replace leaves the field byte-for-byte unchanged
//! - No operation ever writes outside the field
//! - Set output is sorted and fills exactly the capacity

use ddipatch::FieldEditor;
use proptest::prelude::*;

const GUARD: &[u8] = b"####";

/// Field of `capacity` bytes holding `content`, framed by guard bytes
fn framed(content: &[u8], capacity: usize) -> FieldEditor<Vec<u8>> {
    let mut image = GUARD.to_vec();
    image.extend_from_slice(content);
    image.resize(GUARD.len() + capacity, b' ');
    image.extend_from_slice(GUARD);
    FieldEditor::new(image, GUARD.len() as u64, capacity as u64)
}

fn guards_intact(editor: FieldEditor<Vec<u8>>) -> bool {
    let image = editor.into_inner().into_inner();
    image.starts_with(GUARD) && image.ends_with(GUARD)
}

fn token() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(=[a-z0-9]{1,6})?"
}

proptest! {
    #[test]
    fn prop_replace_then_read_pads(text in "[ -~]{0,40}", extra in 0usize..20) {
        let capacity = text.len() + extra;
        let mut editor = framed(b"", capacity);

        editor.replace(&text).unwrap();

        let mut expected = text.clone().into_bytes();
        expected.resize(capacity, b' ');
        prop_assert_eq!(editor.read().unwrap(), expected);
        prop_assert!(guards_intact(editor));
    }

    #[test]
    fn prop_oversized_replace_is_rejected(content in "[ -~]{0,20}", extra in 1usize..10) {
        let capacity = content.len();
        let mut editor = framed(content.as_bytes(), capacity);
        let before = editor.read().unwrap();

        let text = "x".repeat(capacity + extra);
        prop_assert!(editor.replace(&text).is_err());
        prop_assert_eq!(editor.read().unwrap(), before);
    }

    #[test]
    fn prop_append_stays_inside_field(
        tokens in prop::collection::vec(token(), 0..8),
        capacity in 0usize..48,
        chunk_size in 1usize..16,
    ) {
        let mut editor = framed(b"", capacity).with_chunk_size(chunk_size);
        for token in &tokens {
            let _ = editor.append(token);
            prop_assert_eq!(editor.read().unwrap().len(), capacity);
        }
        prop_assert!(guards_intact(editor));
    }

    #[test]
    fn prop_set_is_sorted_and_padded(
        pairs in prop::collection::btree_map("[a-z]{1,5}", "[a-z0-9]{0,5}", 0..6),
        extra in 0usize..10,
    ) {
        let width: usize = pairs
            .iter()
            .map(|(k, v)| k.len() + v.len() + usize::from(!v.is_empty()))
            .sum::<usize>()
            + pairs.len().saturating_sub(1);
        let capacity = width + extra;
        let mut editor = framed(b"", capacity);

        editor.set(pairs.iter().rev(), false).unwrap();

        let text = editor.text().unwrap();
        prop_assert_eq!(text.len(), capacity);
        prop_assert!(text[width..].bytes().all(|b| b == b' '));

        let keys: Vec<String> = text
            .split_whitespace()
            .map(|t| t.split('=').next().unwrap_or_default().to_string())
            .collect();
        let expected: Vec<String> = pairs.keys().cloned().collect();
        prop_assert_eq!(keys, expected);
        prop_assert!(guards_intact(editor));
    }
}
