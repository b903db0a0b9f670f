//! Binary search helpers over slices sorted by a projected key, used by the
//! linear metadata to find a suballocation by offset without a linear scan.

/// Returns the index of the first element whose key is not less than `key`,
/// i.e. the standard "lower bound" / insertion point.
pub fn binary_find_first_not_less<T>(slice: &[T], key: u64, mut key_of: impl FnMut(&T) -> u64) -> usize {
    slice.partition_point(|item| key_of(item) < key)
}

/// Binary search for an element whose key equals `key` in a slice known to be
/// sorted ascending by `key_of`. Returns `None` if absent.
pub fn binary_find_sorted<T>(slice: &[T], key: u64, mut key_of: impl FnMut(&T) -> u64) -> Option<usize> {
    let idx = slice.partition_point(|item| key_of(item) < key);
    if idx < slice.len() && key_of(&slice[idx]) == key {
        Some(idx)
    } else {
        None
    }
}

/// Same as `binary_find_sorted` but for a slice sorted *descending* by
/// `key_of` (used for the linear metadata's double-stack mode).
pub fn binary_find_sorted_desc<T>(slice: &[T], key: u64, mut key_of: impl FnMut(&T) -> u64) -> Option<usize> {
    let idx = slice.partition_point(|item| key_of(item) > key);
    if idx < slice.len() && key_of(&slice[idx]) == key {
        Some(idx)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_present_key() {
        let v = vec![(1u64, 'a'), (3, 'b'), (7, 'c')];
        assert_eq!(binary_find_sorted(&v, 3, |x| x.0), Some(1));
        assert_eq!(binary_find_sorted(&v, 4, |x| x.0), None);
    }

    #[test]
    fn finds_present_key_descending() {
        let v = vec![(7u64, 'a'), (3, 'b'), (1, 'c')];
        assert_eq!(binary_find_sorted_desc(&v, 3, |x| x.0), Some(1));
        assert_eq!(binary_find_sorted_desc(&v, 4, |x| x.0), None);
    }

    #[test]
    fn lower_bound_matches_partition_point() {
        let v = vec![1u64, 3, 3, 5];
        assert_eq!(binary_find_first_not_less(&v, 3, |x| *x), 1);
        assert_eq!(binary_find_first_not_less(&v, 6, |x| *x), 4);
    }
}
