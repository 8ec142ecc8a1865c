/// Returns `ceil(log2(n))`, the number of address bits needed to index `n` items.
///
/// Both `0` and `1` need no address bits.
///
/// # Examples
///
/// ```
/// use sram_forge_core::util::ceil_log2;
///
/// assert_eq!(ceil_log2(0), 0);
/// assert_eq!(ceil_log2(1), 0);
/// assert_eq!(ceil_log2(512), 9);
/// assert_eq!(ceil_log2(24576), 15);
/// ```
pub const fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        u64::BITS - (n - 1).leading_zeros()
    }
}

/// Returns a mask with the low `bits` bits set.
pub const fn mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::{ceil_log2, mask};

    #[test]
    fn test_ceil_log2_powers_and_neighbours() {
        for shift in 1..63 {
            let p = 1u64 << shift;
            assert_eq!(ceil_log2(p), shift);
            assert_eq!(ceil_log2(p + 1), shift + 1);
            assert_eq!(ceil_log2(p - 1), if shift == 1 { 0 } else { shift });
        }
        assert_eq!(ceil_log2(u64::MAX), 64);
    }

    #[test]
    fn test_ceil_log2_matches_float() {
        for n in 2..10_000u64 {
            assert_eq!(ceil_log2(n), (n as f64).log2().ceil() as u32, "n = {}", n);
        }
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(0), 0);
        assert_eq!(mask(9), 0x1ff);
        assert_eq!(mask(64), u64::MAX);
    }
}
