//! ED-prefixed opcodes: 16-bit arithmetic, I/O, interrupt control and the
//! block instructions.

use emu_core::Bus;

use super::{Index, Z80};
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity, sz53, sz53p};

/// Direction of a block instruction.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Step {
    Inc,
    Dec,
}

impl Step {
    fn apply(self, v: u16) -> u16 {
        match self {
            Step::Inc => v.wrapping_add(1),
            Step::Dec => v.wrapping_sub(1),
        }
    }
}

impl Z80 {
    /// `prefix_pc` is the address of the ED byte, for error reporting.
    pub(super) fn execute_ed<B: Bus>(&mut self, bus: &mut B, prefix_pc: u16) -> u32 {
        let op = self.fetch(bus);
        match op {
            // IN r,(C) / IN F,(C)
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let bc = self.regs.bc();
                let v = bus.io_read(bc);
                self.regs.wz = bc.wrapping_add(1);
                let r = (op >> 3) & 7;
                if r != 6 {
                    self.set_reg8(r, v);
                }
                self.set_f((self.regs.f & CF) | sz53p(v));
                12
            }

            // OUT (C),r / OUT (C),0
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let bc = self.regs.bc();
                let r = (op >> 3) & 7;
                let v = if r == 6 { 0 } else { self.reg8(r) };
                bus.io_write(bc, v);
                self.regs.wz = bc.wrapping_add(1);
                12
            }

            // SBC HL,rr
            0x42 | 0x52 | 0x62 | 0x72 => {
                let hl = self.regs.hl();
                let rr = self.reg16(op >> 4, Index::Hl);
                let (v, f) = alu::sbc16(hl, rr, self.regs.f & CF != 0);
                self.regs.wz = hl.wrapping_add(1);
                self.regs.set_hl(v);
                self.set_f(f);
                15
            }

            // ADC HL,rr
            0x4A | 0x5A | 0x6A | 0x7A => {
                let hl = self.regs.hl();
                let rr = self.reg16(op >> 4, Index::Hl);
                let (v, f) = alu::adc16(hl, rr, self.regs.f & CF != 0);
                self.regs.wz = hl.wrapping_add(1);
                self.regs.set_hl(v);
                self.set_f(f);
                15
            }

            // LD (nn),rr
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.imm16(bus);
                let v = self.reg16(op >> 4, Index::Hl);
                self.write16(bus, addr, v);
                self.regs.wz = addr.wrapping_add(1);
                20
            }

            // LD rr,(nn)
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.imm16(bus);
                let v = self.read16(bus, addr);
                self.set_reg16(op >> 4, Index::Hl, v);
                self.regs.wz = addr.wrapping_add(1);
                20
            }

            // NEG
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let r = alu::sub8(0, self.regs.a, false);
                self.regs.a = r.value;
                self.set_f(r.flags);
                8
            }

            // RETN / RETI
            0x45 | 0x4D | 0x55 | 0x5D | 0x65 | 0x6D | 0x75 | 0x7D => {
                self.regs.iff1 = self.regs.iff2;
                self.ret(bus);
                14
            }

            // IM 0 / IM 1 / IM 2
            0x46 | 0x4E | 0x66 | 0x6E => {
                self.regs.im = 0;
                8
            }
            0x56 | 0x76 => {
                self.regs.im = 1;
                8
            }
            0x5E | 0x7E => {
                self.regs.im = 2;
                8
            }

            // LD I,A / LD R,A
            0x47 => {
                self.regs.i = self.regs.a;
                9
            }
            0x4F => {
                self.regs.r = self.regs.a;
                9
            }

            // LD A,I / LD A,R
            0x57 | 0x5F => {
                let v = if op == 0x57 { self.regs.i } else { self.regs.r };
                self.regs.a = v;
                self.set_f(
                    (self.regs.f & CF) | sz53(v) | if self.regs.iff2 { PF } else { 0 },
                );
                9
            }

            // RRD
            0x67 => {
                let hl = self.regs.hl();
                let v = bus.read(hl);
                let a = self.regs.a;
                bus.write(hl, (a << 4) | (v >> 4));
                self.regs.a = (a & 0xF0) | (v & 0x0F);
                self.regs.wz = hl.wrapping_add(1);
                self.set_f((self.regs.f & CF) | sz53p(self.regs.a));
                18
            }

            // RLD
            0x6F => {
                let hl = self.regs.hl();
                let v = bus.read(hl);
                let a = self.regs.a;
                bus.write(hl, (v << 4) | (a & 0x0F));
                self.regs.a = (a & 0xF0) | (v >> 4);
                self.regs.wz = hl.wrapping_add(1);
                self.set_f((self.regs.f & CF) | sz53p(self.regs.a));
                18
            }

            // LDI, LDD, LDIR, LDDR
            0xA0 | 0xA8 | 0xB0 | 0xB8 => self.block_ld(bus, step_of(op), op & 0x10 != 0),

            // CPI, CPD, CPIR, CPDR
            0xA1 | 0xA9 | 0xB1 | 0xB9 => self.block_cp(bus, step_of(op), op & 0x10 != 0),

            // INI, IND, INIR, INDR
            0xA2 | 0xAA | 0xB2 | 0xBA => self.block_in(bus, step_of(op), op & 0x10 != 0),

            // OUTI, OUTD, OTIR, OTDR
            0xA3 | 0xAB | 0xB3 | 0xBB => self.block_out(bus, step_of(op), op & 0x10 != 0),

            _ => {
                self.flag_invalid(0xED, op, prefix_pc);
                8
            }
        }
    }

    /// Rewind PC onto the instruction for another pass. X and Y then
    /// come from the high byte of PC.
    fn repeat(&mut self) -> u32 {
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        self.regs.wz = self.regs.pc.wrapping_add(1);
        let hi = (self.regs.pc >> 8) as u8;
        self.set_f((self.regs.f & !(XF | YF)) | (hi & (XF | YF)));
        21
    }

    /// INIR/INDR/OTIR/OTDR on a repeating pass also rework H and P/V from
    /// the B the next pass will see.
    fn repeat_io(&mut self, value: u8) -> u32 {
        let t = self.repeat();
        let b = self.regs.b;
        let mut f = self.regs.f;
        let adjust = if f & CF == 0 {
            b & 7
        } else if value & 0x80 != 0 {
            f &= !HF;
            if b & 0x0F == 0x00 {
                f |= HF;
            }
            b.wrapping_sub(1) & 7
        } else {
            f &= !HF;
            if b & 0x0F == 0x0F {
                f |= HF;
            }
            b.wrapping_add(1) & 7
        };
        if !parity(adjust) {
            f ^= PF;
        }
        self.set_f(f);
        t
    }

    fn block_ld<B: Bus>(&mut self, bus: &mut B, step: Step, repeat: bool) -> u32 {
        let hl = self.regs.hl();
        let de = self.regs.de();
        let v = bus.read(hl);
        bus.write(de, v);
        self.regs.set_hl(step.apply(hl));
        self.regs.set_de(step.apply(de));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let n = v.wrapping_add(self.regs.a);
        let mut f = (self.regs.f & (SF | ZF | CF)) | (n & XF) | ((n << 4) & YF);
        if bc != 0 {
            f |= PF;
        }
        self.set_f(f);

        if repeat && bc != 0 { self.repeat() } else { 16 }
    }

    fn block_cp<B: Bus>(&mut self, bus: &mut B, step: Step, repeat: bool) -> u32 {
        let hl = self.regs.hl();
        let v = bus.read(hl);
        let a = self.regs.a;
        let result = a.wrapping_sub(v);
        let half = (a & 0x0F) < (v & 0x0F);
        self.regs.set_hl(step.apply(hl));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);
        self.regs.wz = step.apply(self.regs.wz);

        let n = result.wrapping_sub(u8::from(half));
        let mut f = (self.regs.f & CF) | NF | (result & SF) | (n & XF) | ((n << 4) & YF);
        if result == 0 {
            f |= ZF;
        }
        if half {
            f |= HF;
        }
        if bc != 0 {
            f |= PF;
        }
        self.set_f(f);

        if repeat && bc != 0 && result != 0 {
            self.repeat()
        } else {
            16
        }
    }

    fn block_in<B: Bus>(&mut self, bus: &mut B, step: Step, repeat: bool) -> u32 {
        let bc = self.regs.bc();
        let v = bus.io_read(bc);
        self.regs.wz = step.apply(bc);
        let hl = self.regs.hl();
        bus.write(hl, v);
        self.regs.b = self.regs.b.wrapping_sub(1);
        self.regs.set_hl(step.apply(hl));

        let c = step.apply(u16::from(self.regs.c)) as u8;
        self.io_block_flags(v, c);

        if repeat && self.regs.b != 0 { self.repeat_io(v) } else { 16 }
    }

    fn block_out<B: Bus>(&mut self, bus: &mut B, step: Step, repeat: bool) -> u32 {
        let hl = self.regs.hl();
        let v = bus.read(hl);
        self.regs.b = self.regs.b.wrapping_sub(1);
        let bc = self.regs.bc();
        self.regs.wz = step.apply(bc);
        bus.io_write(bc, v);
        self.regs.set_hl(step.apply(hl));

        let l = self.regs.l;
        self.io_block_flags(v, l);

        if repeat && self.regs.b != 0 { self.repeat_io(v) } else { 16 }
    }

    /// Flags shared by INI/IND/OUTI/OUTD. `other` is the byte added to the
    /// transferred value for the carry computation.
    fn io_block_flags(&mut self, value: u8, other: u8) {
        let b = self.regs.b;
        let k = u16::from(value) + u16::from(other);
        let mut f = sz53(b);
        if value & 0x80 != 0 {
            f |= NF;
        }
        if k > 0xFF {
            f |= HF | CF;
        }
        if parity((k as u8 & 7) ^ b) {
            f |= PF;
        }
        self.set_f(f);
    }
}

fn step_of(op: u8) -> Step {
    if op & 0x08 == 0 { Step::Inc } else { Step::Dec }
}
