//! Assertion helpers.

use std::collections::BTreeSet;

use folio_selector::types::PageId;

/// Asserts two id lists hold the same ids, ignoring order.
pub fn assert_same_ids(actual: &[PageId], expected: &[PageId]) {
    let actual_set: BTreeSet<_> = actual.iter().copied().collect();
    let expected_set: BTreeSet<_> = expected.iter().copied().collect();
    assert_eq!(
        actual_set, expected_set,
        "id mismatch: expected {:?}, got {:?}",
        expected, actual
    );
    assert_eq!(actual.len(), actual_set.len(), "duplicate ids in {:?}", actual);
}

/// Asserts an id list contains no duplicates.
pub fn assert_unique(ids: &[PageId]) {
    let set: BTreeSet<_> = ids.iter().copied().collect();
    assert_eq!(set.len(), ids.len(), "duplicate ids in {:?}", ids);
}
