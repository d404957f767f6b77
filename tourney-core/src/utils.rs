pub trait NumExt {
    /// Returns the base 2 logarithm of the number, rounding up to the next integer.
    fn ilog2_ceil(self) -> Self;

    /// Reverses the lowest `bits` bits of the number.
    fn reverse_bits_lower(self, bits: u32) -> Self;
}

impl NumExt for usize {
    #[inline]
    fn ilog2_ceil(self) -> Self {
        match self {
            0 | 1 => 0,
            n => (usize::BITS - (n - 1).leading_zeros()) as usize,
        }
    }

    #[inline]
    fn reverse_bits_lower(self, bits: u32) -> Self {
        if bits == 0 {
            return 0;
        }

        self.reverse_bits() >> (usize::BITS - bits)
    }
}
