//! Z80 flag register bits and flag lookup helpers.

/// Sign: bit 7 of the result.
pub const SF: u8 = 0x80;
/// Zero.
pub const ZF: u8 = 0x40;
/// Undocumented: bit 5 of the result (or of some other internal value).
pub const YF: u8 = 0x20;
/// Half carry out of bit 3 (or 11 for 16-bit ops).
pub const HF: u8 = 0x10;
/// Undocumented: bit 3 of the result.
pub const XF: u8 = 0x08;
/// Parity (logic ops) or overflow (arithmetic).
pub const PF: u8 = 0x04;
/// Set by subtractions.
pub const NF: u8 = 0x02;
/// Carry.
pub const CF: u8 = 0x01;

/// S, Z, Y and X flags for a result byte.
pub(crate) const SZ53: [u8; 256] = build_table(false);

/// S, Z, Y, X and parity flags for a result byte.
pub(crate) const SZ53P: [u8; 256] = build_table(true);

const fn build_table(with_parity: bool) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let v = i as u8;
        let mut f = v & (SF | YF | XF);
        if v == 0 {
            f |= ZF;
        }
        if with_parity && v.count_ones() % 2 == 0 {
            f |= PF;
        }
        table[i] = f;
        i += 1;
    }
    table
}

#[must_use]
pub(crate) fn sz53(value: u8) -> u8 {
    SZ53[value as usize]
}

#[must_use]
pub(crate) fn sz53p(value: u8) -> u8 {
    SZ53P[value as usize]
}

/// True if `value` has an even number of set bits.
#[must_use]
pub(crate) fn parity(value: u8) -> bool {
    SZ53P[value as usize] & PF != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sets_zero_and_parity() {
        assert_eq!(sz53p(0), ZF | PF);
        assert_eq!(sz53(0), ZF);
    }

    #[test]
    fn undocumented_bits_copy_result() {
        assert_eq!(sz53(0x28), YF | XF);
        assert_eq!(sz53p(0x80), SF);
        assert!(parity(0x03));
        assert!(!parity(0x07));
    }
}
