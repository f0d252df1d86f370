//! CB-prefixed bit operations, plain and indexed (DD CB / FD CB).

use emu_core::Bus;

use super::{Index, Z80};
use crate::alu;
use crate::flags::{CF, HF, PF, SF, XF, YF, ZF};

impl Z80 {
    pub(super) fn execute_cb<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch(bus);
        let y = (op >> 3) & 7;
        let z = op & 7;

        if z == 6 {
            let addr = self.regs.hl();
            let v = bus.read(addr);
            return match op >> 6 {
                0 => {
                    let r = alu::rotate_shift(y, v, self.regs.f & CF != 0);
                    bus.write(addr, r.value);
                    self.set_f(r.flags);
                    15
                }
                1 => {
                    let xy = (self.regs.wz >> 8) as u8;
                    self.bit(y, v, xy);
                    12
                }
                2 => {
                    bus.write(addr, v & !(1 << y));
                    15
                }
                _ => {
                    bus.write(addr, v | (1 << y));
                    15
                }
            };
        }

        let v = self.reg8(z);
        match op >> 6 {
            0 => {
                let r = alu::rotate_shift(y, v, self.regs.f & CF != 0);
                self.set_reg8(z, r.value);
                self.set_f(r.flags);
            }
            1 => self.bit(y, v, v),
            2 => self.set_reg8(z, v & !(1 << y)),
            _ => self.set_reg8(z, v | (1 << y)),
        }
        8
    }

    /// `DD CB d op` / `FD CB d op`. The result of shifts, RES and SET is
    /// also copied into register `z` unless `z` is 6.
    pub(super) fn execute_index_cb<B: Bus>(&mut self, bus: &mut B, index: Index) -> u32 {
        let d = self.imm8(bus) as i8;
        let op = self.imm8(bus);
        let addr = self.index_reg(index).wrapping_add(d as u16);
        self.regs.wz = addr;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let v = bus.read(addr);

        let result = match op >> 6 {
            0 => {
                let r = alu::rotate_shift(y, v, self.regs.f & CF != 0);
                self.set_f(r.flags);
                r.value
            }
            1 => {
                self.bit(y, v, (addr >> 8) as u8);
                return 16;
            }
            2 => v & !(1 << y),
            _ => v | (1 << y),
        };
        bus.write(addr, result);
        if z != 6 {
            self.set_reg8(z, result);
        }
        19
    }

    /// `BIT n`: X and Y come from `xy_source`, which depends on the
    /// addressing mode.
    fn bit(&mut self, n: u8, value: u8, xy_source: u8) {
        let set = value & (1 << n) != 0;
        let mut f = (self.regs.f & CF) | HF | (xy_source & (YF | XF));
        if !set {
            f |= ZF | PF;
        }
        if n == 7 && set {
            f |= SF;
        }
        self.set_f(f);
    }
}

#[cfg(test)]
mod tests {
    use emu_core::SimpleBus;

    use super::super::Z80;
    use crate::flags::{CF, HF, PF, SF, XF, YF, ZF};

    fn cpu(program: &[u8]) -> (Z80, SimpleBus) {
        let mut bus = SimpleBus::new();
        bus.load(0, program);
        (Z80::new(), bus)
    }

    #[test]
    fn rlc_register() {
        let (mut cpu, mut bus) = cpu(&[0xCB, 0x00]);
        cpu.regs.b = 0x81;
        assert_eq!(cpu.step(&mut bus), 8);
        assert_eq!(cpu.regs.b, 0x03);
        assert_ne!(cpu.regs.f & CF, 0);
    }

    #[test]
    fn srl_memory() {
        let (mut cpu, mut bus) = cpu(&[0xCB, 0x3E]);
        bus.load(0x9000, &[0x01]);
        cpu.regs.set_hl(0x9000);
        assert_eq!(cpu.step(&mut bus), 15);
        assert_eq!(bus.peek(0x9000), 0);
        assert_eq!(cpu.regs.f & (ZF | CF | PF), ZF | CF | PF);
    }

    #[test]
    fn bit_7_sets_sign_when_set() {
        let (mut cpu, mut bus) = cpu(&[0xCB, 0x7F]);
        cpu.regs.a = 0x80;
        cpu.regs.f = 0;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.f & (SF | ZF | HF), SF | HF);
    }

    #[test]
    fn bit_hl_takes_xy_from_wz() {
        let (mut cpu, mut bus) = cpu(&[0xCB, 0x46]);
        cpu.regs.set_hl(0x9000);
        cpu.regs.wz = 0x2800;
        assert_eq!(cpu.step(&mut bus), 12);
        assert_eq!(cpu.regs.f & (YF | XF | ZF), YF | XF | ZF);
    }

    #[test]
    fn set_and_res() {
        let (mut cpu, mut bus) = cpu(&[0xCB, 0xC7, 0xCB, 0x87]);
        cpu.regs.a = 0;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.a, 0x01);
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.a, 0x00);
    }

    #[test]
    fn indexed_set_copies_to_register() {
        // SET 0,(IX+2),B
        let (mut cpu, mut bus) = cpu(&[0xDD, 0xCB, 0x02, 0xC0]);
        cpu.regs.ix = 0x9000;
        assert_eq!(cpu.step(&mut bus), 23);
        assert_eq!(bus.peek(0x9002), 0x01);
        assert_eq!(cpu.regs.b, 0x01);
        assert_eq!(cpu.regs.r, 2);
    }

    #[test]
    fn indexed_bit_timing() {
        let (mut cpu, mut bus) = cpu(&[0xFD, 0xCB, 0x00, 0x46]);
        cpu.regs.iy = 0x9000;
        assert_eq!(cpu.step(&mut bus), 20);
        assert_ne!(cpu.regs.f & ZF, 0);
    }
}
