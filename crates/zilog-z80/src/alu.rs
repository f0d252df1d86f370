//! Arithmetic and logic for the Z80.
//!
//! Every function is pure: it takes operands and returns the result with a
//! complete flags byte. Callers merge in any flags the instruction leaves
//! untouched.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

/// Result of an 8-bit ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// `ADD`/`ADC`.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u16::from(carry);
    let wide = u16::from(a) + u16::from(b) + c;
    let value = wide as u8;
    let mut flags = sz53(value);
    if (a & 0x0F) as u16 + (b & 0x0F) as u16 + c > 0x0F {
        flags |= HF;
    }
    if (a ^ b) & 0x80 == 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if wide > 0xFF {
        flags |= CF;
    }
    AluResult { value, flags }
}

/// `SUB`/`SBC`.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u16::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c as u8);
    let mut flags = sz53(value) | NF;
    if ((a & 0x0F) as u16) < (b & 0x0F) as u16 + c {
        flags |= HF;
    }
    if (a ^ b) & 0x80 != 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if u16::from(a) < u16::from(b) + c {
        flags |= CF;
    }
    AluResult { value, flags }
}

/// `CP`: a subtraction whose X/Y flags come from the operand.
#[must_use]
pub fn cp8(a: u8, b: u8) -> AluResult {
    let r = sub8(a, b, false);
    AluResult {
        value: a,
        flags: (r.flags & !(YF | XF)) | (b & (YF | XF)),
    }
}

#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    AluResult {
        value,
        flags: sz53p(value) | HF,
    }
}

#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    AluResult {
        value,
        flags: sz53p(value),
    }
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    AluResult {
        value,
        flags: sz53p(value),
    }
}

/// `INC r`. Carry is not produced; the caller keeps the old one.
#[must_use]
pub fn inc8(a: u8) -> AluResult {
    let value = a.wrapping_add(1);
    let mut flags = sz53(value);
    if a & 0x0F == 0x0F {
        flags |= HF;
    }
    if a == 0x7F {
        flags |= PF;
    }
    AluResult { value, flags }
}

/// `DEC r`. Carry is not produced; the caller keeps the old one.
#[must_use]
pub fn dec8(a: u8) -> AluResult {
    let value = a.wrapping_sub(1);
    let mut flags = sz53(value) | NF;
    if a & 0x0F == 0 {
        flags |= HF;
    }
    if a == 0x80 {
        flags |= PF;
    }
    AluResult { value, flags }
}

/// The eight CB-page rotates and shifts, selected by bits 3–5 of the
/// opcode: RLC, RRC, RL, RR, SLA, SRA, SLL, SRL.
#[must_use]
pub fn rotate_shift(op: u8, a: u8, carry: bool) -> AluResult {
    let (value, out) = match op & 7 {
        0 => (a.rotate_left(1), a & 0x80 != 0),
        1 => (a.rotate_right(1), a & 1 != 0),
        2 => ((a << 1) | u8::from(carry), a & 0x80 != 0),
        3 => ((a >> 1) | (u8::from(carry) << 7), a & 1 != 0),
        4 => (a << 1, a & 0x80 != 0),
        5 => ((a >> 1) | (a & 0x80), a & 1 != 0),
        6 => ((a << 1) | 1, a & 0x80 != 0),
        _ => (a >> 1, a & 1 != 0),
    };
    AluResult {
        value,
        flags: sz53p(value) | if out { CF } else { 0 },
    }
}

/// `ADD HL,rr` (and IX/IY). Only H, C, X and Y are produced.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let value = wide as u16;
    let mut flags = ((value >> 8) as u8) & (YF | XF);
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (value, flags)
}

/// `ADC HL,rr`.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u32::from(carry);
    let wide = u32::from(a) + u32::from(b) + c;
    let value = wide as u16;
    let mut flags = ((value >> 8) as u8) & (SF | YF | XF);
    if value == 0 {
        flags |= ZF;
    }
    if u32::from(a & 0x0FFF) + u32::from(b & 0x0FFF) + c > 0x0FFF {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ value) & 0x8000 != 0 {
        flags |= PF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (value, flags)
}

/// `SBC HL,rr`.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u32::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c as u16);
    let mut flags = (((value >> 8) as u8) & (SF | YF | XF)) | NF;
    if value == 0 {
        flags |= ZF;
    }
    if u32::from(a & 0x0FFF) < u32::from(b & 0x0FFF) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (a ^ value) & 0x8000 != 0 {
        flags |= PF;
    }
    if u32::from(a) < u32::from(b) + c {
        flags |= CF;
    }
    (value, flags)
}

/// `DAA`: decimal-adjust A using the current flags.
#[must_use]
pub fn daa(a: u8, f: u8) -> AluResult {
    let mut correction = 0u8;
    let mut carry = f & CF != 0;
    if f & HF != 0 || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }
    let subtract = f & NF != 0;
    let value = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if subtract {
        f & HF != 0 && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };
    let mut flags = sz53p(value) | (f & NF);
    if half {
        flags |= HF;
    }
    if carry {
        flags |= CF;
    }
    AluResult { value, flags }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overflow_and_half_carry() {
        let r = add8(0x7F, 0x01, false);
        assert_eq!(r.value, 0x80);
        assert_eq!(r.flags & (SF | HF | PF | CF), SF | HF | PF);
    }

    #[test]
    fn sub_borrow_sets_carry() {
        let r = sub8(0x00, 0x01, false);
        assert_eq!(r.value, 0xFF);
        assert_ne!(r.flags & CF, 0);
        assert_ne!(r.flags & NF, 0);
        assert_ne!(r.flags & HF, 0);
    }

    #[test]
    fn cp_takes_undocumented_flags_from_operand() {
        let r = cp8(0x00, 0x28);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags & (YF | XF), YF | XF);
    }

    #[test]
    fn daa_after_bcd_addition() {
        // 0x15 + 0x27 = 0x3C, adjusted to 0x42
        let sum = add8(0x15, 0x27, false);
        let r = daa(sum.value, sum.flags);
        assert_eq!(r.value, 0x42);
        assert_eq!(r.flags & CF, 0);
    }

    #[test]
    fn daa_after_bcd_subtraction() {
        // 0x42 - 0x15 = 0x2D, adjusted to 0x27
        let diff = sub8(0x42, 0x15, false);
        let r = daa(diff.value, diff.flags);
        assert_eq!(r.value, 0x27);
    }

    /// DAA written out as the nibble table from "The Undocumented Z80
    /// Documented": correction and carry from the high and low nibbles,
    /// half carry from the low nibble and N.
    fn daa_table(a: u8, n: bool, h: bool, c: bool) -> (u8, bool, bool) {
        let hi = a >> 4;
        let lo = a & 0x0F;
        let (diff, carry) = match (c, h) {
            (false, _) if hi <= 9 && lo <= 9 => (if h { 0x06 } else { 0x00 }, false),
            (false, _) if hi <= 8 => (0x06, false),
            (false, _) if lo >= 10 => (0x66, true),
            (false, false) => (0x60, true),
            (false, true) => (0x66, true),
            (true, false) if lo <= 9 => (0x60, true),
            (true, _) => (0x66, true),
        };
        let half = if n { h && lo <= 5 } else { lo >= 10 };
        let value = if n {
            a.wrapping_sub(diff)
        } else {
            a.wrapping_add(diff)
        };
        (value, carry, half)
    }

    #[test]
    fn daa_matches_nibble_table_for_every_input() {
        for a in 0..=255u8 {
            for bits in 0..8u8 {
                let (n, h, c) = (bits & 4 != 0, bits & 2 != 0, bits & 1 != 0);
                let f = (if n { NF } else { 0 }) | (if h { HF } else { 0 }) | (if c { CF } else { 0 });
                let (value, carry, half) = daa_table(a, n, h, c);
                let r = daa(a, f);
                assert_eq!(r.value, value, "A={a:02X} N={n} H={h} C={c}");

                let mut expected = sz53p(value);
                if n {
                    expected |= NF;
                }
                if half {
                    expected |= HF;
                }
                if carry {
                    expected |= CF;
                }
                assert_eq!(r.flags, expected, "A={a:02X} N={n} H={h} C={c}");
            }
        }
    }

    #[test]
    fn daa_flags_ignore_undocumented_input_bits() {
        for a in [0x00, 0x09, 0x9A, 0xFF] {
            assert_eq!(daa(a, SF | ZF | YF | XF | PF), daa(a, 0));
        }
    }

    #[test]
    fn sll_sets_bit_zero() {
        let r = rotate_shift(6, 0x80, false);
        assert_eq!(r.value, 0x01);
        assert_ne!(r.flags & CF, 0);
    }

    #[test]
    fn sbc16_zero_result() {
        let (v, f) = sbc16(0x1000, 0x0FFF, true);
        assert_eq!(v, 0);
        assert_ne!(f & ZF, 0);
    }
}
