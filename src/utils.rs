/// Zero-based index of the lowest set bit in `mask`
///
/// This is the shift that normalizes a field to bit 0. A zero mask has no
/// field position and stands for "the whole register".
#[must_use]
pub const fn lowest_set_bit_position(mask: u8) -> Option<u8> {
    if mask == 0 {
        None
    } else {
        #[allow(clippy::cast_possible_truncation)]
        Some(mask.trailing_zeros() as u8)
    }
}

/// Merge `value` into the bits of `current` selected by `mask`
///
/// The value is shifted up to the field position and truncated to the
/// field width. With a zero mask the whole byte is replaced by `value`.
#[must_use]
pub const fn insert_field(current: u8, mask: u8, value: u8) -> u8 {
    match lowest_set_bit_position(mask) {
        Some(shift) => (current & !mask) | ((value << shift) & mask),
        None => value,
    }
}

/// Extract the bits selected by `mask` from `raw`, normalized to bit 0
///
/// A zero mask returns the raw byte.
#[must_use]
pub const fn extract_field(raw: u8, mask: u8) -> u8 {
    match lowest_set_bit_position(mask) {
        Some(shift) => (raw & mask) >> shift,
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mask_has_no_position() {
        assert_eq!(lowest_set_bit_position(0), None);
    }

    #[test]
    fn position_is_lowest_set_bit() {
        assert_eq!(lowest_set_bit_position(0b0000_0001), Some(0));
        assert_eq!(lowest_set_bit_position(0b0011_0000), Some(4));
        assert_eq!(lowest_set_bit_position(0b0011_1110), Some(1));
        assert_eq!(lowest_set_bit_position(0b1000_0000), Some(7));
        assert_eq!(lowest_set_bit_position(0b1100_0000), Some(6));
    }

    #[test]
    fn insert_preserves_neighbouring_bits() {
        // NF_LEV (0x70) next to WDTH (0x0F)
        assert_eq!(insert_field(0b0010_0010, 0x70, 0b101), 0b0101_0010);
        assert_eq!(insert_field(0xFF, 0x0F, 0), 0xF0);
    }

    #[test]
    fn insert_truncates_oversized_value() {
        // 2-bit field at bits 4-5, bit 6 belongs to CL_STAT
        assert_eq!(insert_field(0b0100_0000, 0x30, 0b111), 0b0111_0000);
        assert_eq!(insert_field(0, 0x30, 4), 0);
    }

    #[test]
    fn zero_mask_is_whole_byte() {
        assert_eq!(insert_field(0xA5, 0, 0x96), 0x96);
        assert_eq!(extract_field(0xA5, 0), 0xA5);
    }

    #[test]
    fn every_contiguous_field_round_trips() {
        for start in 0u8..8 {
            for width in 1u8..=(8 - start) {
                let mask = (((1u16 << width) - 1) << start) as u8;
                for value in 0..(1u16 << width) {
                    let value = value as u8;
                    let raw = insert_field(0x5A, mask, value);
                    assert_eq!(extract_field(raw, mask), value);
                    assert_eq!(raw & !mask, 0x5A & !mask);
                }
            }
        }
    }
}
