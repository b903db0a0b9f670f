//! Bit-scan helpers used to index free space by size class, the same way
//! the original's TLSF-inspired allocator uses `_BitScanForward`/
//! `_BitScanReverse` to find the nearest nonempty free-list bucket.

/// Index of the lowest set bit, or `None` if `mask` is zero.
#[inline]
pub fn bit_scan_forward(mask: u64) -> Option<u32> {
    if mask == 0 {
        None
    } else {
        Some(mask.trailing_zeros())
    }
}

/// Index of the highest set bit, or `None` if `mask` is zero.
#[inline]
pub fn bit_scan_reverse(mask: u64) -> Option<u32> {
    if mask == 0 {
        None
    } else {
        Some(63 - mask.leading_zeros())
    }
}

/// Floor of `log2(size)`, clamped to `[0, 63]` and to `0` for `size == 0`.
/// Used to bucket a free range by size class: a range in class `k` has
/// `2^k <= size < 2^(k+1)`.
#[inline]
pub fn size_class(size: u64) -> u32 {
    bit_scan_reverse(size).unwrap_or(0).min(63)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_finds_lowest_set_bit() {
        assert_eq!(bit_scan_forward(0b1000), Some(3));
        assert_eq!(bit_scan_forward(0b1010), Some(1));
        assert_eq!(bit_scan_forward(0), None);
    }

    #[test]
    fn reverse_finds_highest_set_bit() {
        assert_eq!(bit_scan_reverse(0b1000), Some(3));
        assert_eq!(bit_scan_reverse(0b1010), Some(3));
        assert_eq!(bit_scan_reverse(0), None);
    }

    #[test]
    fn size_class_matches_floor_log2() {
        assert_eq!(size_class(0), 0);
        assert_eq!(size_class(1), 0);
        assert_eq!(size_class(2), 1);
        assert_eq!(size_class(1023), 9);
        assert_eq!(size_class(1024), 10);
    }
}
