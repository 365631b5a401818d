/// Number of bits needed to index into `n` elements, i.e. `ceil(log2(n))`.
/// A single element needs no index bits.
pub fn clog2(n: u64) -> u64 {
    if n <= 1 {
        0
    } else {
        (64 - (n - 1).leading_zeros()) as u64
    }
}

/// Number of 64-bit words needed to hold `bits` bits.
pub fn words_for_bits(bits: u64) -> u64 {
    bits.div_ceil(64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clog2_boundaries() {
        assert_eq!(clog2(0), 0);
        assert_eq!(clog2(1), 0);
        assert_eq!(clog2(2), 1);
        assert_eq!(clog2(3), 2);
        assert_eq!(clog2(64), 6);
        assert_eq!(clog2(65), 7);
        assert_eq!(clog2(192), 8);
    }

    #[test]
    fn words() {
        assert_eq!(words_for_bits(0), 0);
        assert_eq!(words_for_bits(1), 1);
        assert_eq!(words_for_bits(64), 1);
        assert_eq!(words_for_bits(65), 2);
    }
}
