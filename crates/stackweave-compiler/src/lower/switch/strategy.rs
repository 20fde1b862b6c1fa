//! Choice between dense and sparse switch encodings.

use stackweave_core::Node;

/// How an int switch dispatches on its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchEncoding {
    /// `TableSwitch`: one target per key in `[low, high]`.
    Table,
    /// `LookupSwitch`: sorted `(key, target)` pairs.
    Lookup,
}

/// Pick the cheaper encoding for the distinct, ascending `keys`.
///
/// A table costs its header plus one slot per key in the range, gaps
/// included; a lookup costs its header plus a key and a target per case.
/// The lookup is chosen when `3 + 5 * labels < 4 * gaps + 9`.
pub fn select_switch_encoding(keys: &[i32]) -> SwitchEncoding {
    let (Some(&low), Some(&high)) = (keys.first(), keys.last()) else {
        return SwitchEncoding::Lookup;
    };
    let labels = keys.len() as i64;
    let gaps = (i64::from(high) - i64::from(low) + 1) - labels;
    if 3 + 5 * labels < 4 * gaps + 9 {
        SwitchEncoding::Lookup
    } else {
        SwitchEncoding::Table
    }
}

/// Marker body of keys that exist only to fill a dense table.
static GAP: Node = Node::RedirectToEnclosingDefault;

/// Extend ascending `cases` to every key of `[low, high]`. Missing keys get
/// a body that redirects to the default case.
pub(super) fn fill_gaps<'n>(cases: &[(i32, &'n Node)]) -> Vec<(i32, &'n Node)> {
    let mut dense = Vec::with_capacity(cases.len());
    let mut next: Option<i64> = None;
    for &(key, body) in cases {
        if let Some(mut missing) = next {
            while missing < i64::from(key) {
                // The range was checked against i32 bounds by the caller.
                dense.push((missing as i32, &GAP));
                missing += 1;
            }
        }
        dense.push((key, body));
        next = Some(i64::from(key) + 1);
    }
    dense
}

/// Number of keys in the dense range `[low, high]`.
pub(super) fn table_size(low: i32, high: i32) -> i64 {
    i64::from(high) - i64::from(low) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_keys_use_a_table() {
        assert_eq!(select_switch_encoding(&[0, 1, 2, 3]), SwitchEncoding::Table);
        assert_eq!(select_switch_encoding(&[0, 1]), SwitchEncoding::Table);
        assert_eq!(select_switch_encoding(&[10, 11, 13, 14]), SwitchEncoding::Table);
    }

    #[test]
    fn sparse_keys_use_a_lookup() {
        assert_eq!(select_switch_encoding(&[0, 1, 2, 100]), SwitchEncoding::Lookup);
        assert_eq!(select_switch_encoding(&[i32::MIN, i32::MAX]), SwitchEncoding::Lookup);
    }

    #[test]
    fn trivial_switches_use_a_lookup() {
        assert_eq!(select_switch_encoding(&[]), SwitchEncoding::Lookup);
        assert_eq!(select_switch_encoding(&[42]), SwitchEncoding::Lookup);
    }

    #[test]
    fn gaps_are_filled_with_redirects() {
        let body = Node::int(0);
        let dense = fill_gaps(&[(1, &body), (4, &body)]);
        let keys: Vec<i32> = dense.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 2, 3, 4]);
        assert!(!dense[0].1.is_pure_redirect());
        assert!(dense[1].1.is_pure_redirect());
        assert!(dense[2].1.is_pure_redirect());
        assert!(!dense[3].1.is_pure_redirect());
    }

    #[test]
    fn table_size_spans_the_whole_range() {
        assert_eq!(table_size(-2, 2), 5);
        assert_eq!(table_size(i32::MIN, i32::MAX), 1 << 32);
    }
}
