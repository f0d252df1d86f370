//! Unprefixed opcodes, and their DD/FD-prefixed IX/IY forms.
//!
//! Timings returned here are for the unprefixed instruction plus any
//! displacement cost; the caller adds 4 T-states per prefix byte.

use emu_core::Bus;

use super::{Index, Z80};
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};

impl Z80 {
    pub(super) fn execute_main<B: Bus>(&mut self, bus: &mut B, op: u8, index: Index) -> u32 {
        match op {
            // NOP
            0x00 => 4,

            // LD rr,nn
            0x01 | 0x11 | 0x21 | 0x31 => {
                let v = self.imm16(bus);
                self.set_reg16(op >> 4, index, v);
                10
            }

            // LD (BC),A / LD (DE),A
            0x02 | 0x12 => {
                let addr = if op == 0x02 { self.regs.bc() } else { self.regs.de() };
                bus.write(addr, self.regs.a);
                self.regs.wz = u16::from(self.regs.a) << 8 | (addr.wrapping_add(1) & 0xFF);
                7
            }

            // INC rr
            0x03 | 0x13 | 0x23 | 0x33 => {
                let rp = op >> 4;
                let v = self.reg16(rp, index).wrapping_add(1);
                self.set_reg16(rp, index, v);
                6
            }

            // DEC rr
            0x0B | 0x1B | 0x2B | 0x3B => {
                let rp = op >> 4;
                let v = self.reg16(rp, index).wrapping_sub(1);
                self.set_reg16(rp, index, v);
                6
            }

            // INC (HL)
            0x34 => {
                let (addr, extra) = self.mem_operand(bus, index);
                let r = alu::inc8(bus.read(addr));
                bus.write(addr, r.value);
                self.set_f((self.regs.f & CF) | r.flags);
                11 + extra
            }

            // DEC (HL)
            0x35 => {
                let (addr, extra) = self.mem_operand(bus, index);
                let r = alu::dec8(bus.read(addr));
                bus.write(addr, r.value);
                self.set_f((self.regs.f & CF) | r.flags);
                11 + extra
            }

            // INC r
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
                let r = op >> 3;
                let res = alu::inc8(self.reg8_ix(r, index));
                self.set_reg8_ix(r, index, res.value);
                self.set_f((self.regs.f & CF) | res.flags);
                4
            }

            // DEC r
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
                let r = op >> 3;
                let res = alu::dec8(self.reg8_ix(r, index));
                self.set_reg8_ix(r, index, res.value);
                self.set_f((self.regs.f & CF) | res.flags);
                4
            }

            // LD (HL),n
            0x36 => {
                let (addr, extra) = self.mem_operand(bus, index);
                let n = self.imm8(bus);
                bus.write(addr, n);
                // The displacement fetch overlaps the operand read.
                10 + if extra > 0 { 5 } else { 0 }
            }

            // LD r,n
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let n = self.imm8(bus);
                self.set_reg8_ix(op >> 3, index, n);
                7
            }

            // RLCA, RRCA, RLA, RRA
            0x07 | 0x0F | 0x17 | 0x1F => {
                let a = self.regs.a;
                let carry_in = self.regs.f & CF != 0;
                let (value, carry) = match op {
                    0x07 => (a.rotate_left(1), a & 0x80 != 0),
                    0x0F => (a.rotate_right(1), a & 1 != 0),
                    0x17 => ((a << 1) | u8::from(carry_in), a & 0x80 != 0),
                    _ => ((a >> 1) | (u8::from(carry_in) << 7), a & 1 != 0),
                };
                self.regs.a = value;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF))
                        | (value & (YF | XF))
                        | if carry { CF } else { 0 },
                );
                4
            }

            // EX AF,AF'
            0x08 => {
                self.regs.swap_af();
                4
            }

            // ADD HL,rr
            0x09 | 0x19 | 0x29 | 0x39 => {
                let dst = self.index_reg(index);
                let src = self.reg16(op >> 4, index);
                self.regs.wz = dst.wrapping_add(1);
                let (v, flags) = alu::add16(dst, src);
                self.set_index_reg(index, v);
                self.set_f((self.regs.f & (SF | ZF | PF)) | flags);
                11
            }

            // LD A,(BC) / LD A,(DE)
            0x0A | 0x1A => {
                let addr = if op == 0x0A { self.regs.bc() } else { self.regs.de() };
                self.regs.a = bus.read(addr);
                self.regs.wz = addr.wrapping_add(1);
                7
            }

            // DJNZ e
            0x10 => {
                let e = self.imm8(bus) as i8;
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.regs.pc = self.regs.pc.wrapping_add(e as u16);
                    self.regs.wz = self.regs.pc;
                    13
                } else {
                    8
                }
            }

            // JR e
            0x18 => {
                let e = self.imm8(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add(e as u16);
                self.regs.wz = self.regs.pc;
                12
            }

            // JR cc,e (NZ, Z, NC, C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let e = self.imm8(bus) as i8;
                if self.condition((op >> 3) & 3) {
                    self.regs.pc = self.regs.pc.wrapping_add(e as u16);
                    self.regs.wz = self.regs.pc;
                    12
                } else {
                    7
                }
            }

            // LD (nn),HL
            0x22 => {
                let addr = self.imm16(bus);
                let v = self.index_reg(index);
                self.write16(bus, addr, v);
                self.regs.wz = addr.wrapping_add(1);
                16
            }

            // LD HL,(nn)
            0x2A => {
                let addr = self.imm16(bus);
                let v = self.read16(bus, addr);
                self.set_index_reg(index, v);
                self.regs.wz = addr.wrapping_add(1);
                16
            }

            // DAA
            0x27 => {
                let r = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = r.value;
                self.set_f(r.flags);
                4
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF | CF)) | HF | NF | (self.regs.a & (YF | XF)),
                );
                4
            }

            // LD (nn),A
            0x32 => {
                let addr = self.imm16(bus);
                bus.write(addr, self.regs.a);
                self.regs.wz = u16::from(self.regs.a) << 8 | (addr.wrapping_add(1) & 0xFF);
                13
            }

            // LD A,(nn)
            0x3A => {
                let addr = self.imm16(bus);
                self.regs.a = bus.read(addr);
                self.regs.wz = addr.wrapping_add(1);
                13
            }

            // SCF
            0x37 => {
                let xy = self.scf_ccf_xy();
                self.set_f((self.regs.f & (SF | ZF | PF)) | xy | CF);
                4
            }

            // CCF
            0x3F => {
                let xy = self.scf_ccf_xy();
                let old_carry = self.regs.f & CF != 0;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF))
                        | xy
                        | if old_carry { HF } else { CF },
                );
                4
            }

            // HALT
            0x76 => {
                self.regs.halted = true;
                4
            }

            // LD r,(HL)
            0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x7E => {
                let (addr, extra) = self.mem_operand(bus, index);
                let v = bus.read(addr);
                self.set_reg8(op >> 3, v);
                7 + extra
            }

            // LD (HL),r
            0x70..=0x75 | 0x77 => {
                let (addr, extra) = self.mem_operand(bus, index);
                bus.write(addr, self.reg8(op));
                7 + extra
            }

            // LD r,r'
            0x40..=0x7F => {
                let v = self.reg8_ix(op, index);
                self.set_reg8_ix(op >> 3, index, v);
                4
            }

            // ALU A,(HL)
            0x86 | 0x8E | 0x96 | 0x9E | 0xA6 | 0xAE | 0xB6 | 0xBE => {
                let (addr, extra) = self.mem_operand(bus, index);
                let v = bus.read(addr);
                self.alu_a(op >> 3, v);
                7 + extra
            }

            // ALU A,r
            0x80..=0xBF => {
                let v = self.reg8_ix(op, index);
                self.alu_a(op >> 3, v);
                4
            }

            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition(op >> 3) {
                    self.ret(bus);
                    11
                } else {
                    5
                }
            }

            // POP rr
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let v = self.pop16(bus);
                match (op >> 4) & 3 {
                    0 => self.regs.set_bc(v),
                    1 => self.regs.set_de(v),
                    2 => self.set_index_reg(index, v),
                    _ => self.regs.set_af(v),
                }
                10
            }

            // JP cc,nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let addr = self.imm16(bus);
                self.regs.wz = addr;
                if self.condition(op >> 3) {
                    self.regs.pc = addr;
                }
                10
            }

            // JP nn
            0xC3 => {
                let addr = self.imm16(bus);
                self.regs.pc = addr;
                self.regs.wz = addr;
                10
            }

            // CALL cc,nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let addr = self.imm16(bus);
                self.regs.wz = addr;
                if self.condition(op >> 3) {
                    let pc = self.regs.pc;
                    self.push16(bus, pc);
                    self.regs.pc = addr;
                    17
                } else {
                    10
                }
            }

            // PUSH rr
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let v = match (op >> 4) & 3 {
                    0 => self.regs.bc(),
                    1 => self.regs.de(),
                    2 => self.index_reg(index),
                    _ => self.regs.af(),
                };
                self.push16(bus, v);
                11
            }

            // ALU A,n
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let n = self.imm8(bus);
                self.alu_a(op >> 3, n);
                7
            }

            // RST p
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let pc = self.regs.pc;
                self.push16(bus, pc);
                self.regs.pc = u16::from(op & 0x38);
                self.regs.wz = self.regs.pc;
                11
            }

            // RET
            0xC9 => {
                self.ret(bus);
                10
            }

            // CALL nn
            0xCD => {
                let addr = self.imm16(bus);
                let pc = self.regs.pc;
                self.push16(bus, pc);
                self.regs.pc = addr;
                self.regs.wz = addr;
                17
            }

            // OUT (n),A
            0xD3 => {
                let n = self.imm8(bus);
                let port = u16::from(self.regs.a) << 8 | u16::from(n);
                bus.io_write(port, self.regs.a);
                self.regs.wz = u16::from(self.regs.a) << 8 | u16::from(n.wrapping_add(1));
                11
            }

            // EXX
            0xD9 => {
                self.regs.exx();
                4
            }

            // IN A,(n)
            0xDB => {
                let n = self.imm8(bus);
                let port = u16::from(self.regs.a) << 8 | u16::from(n);
                self.regs.a = bus.io_read(port);
                self.regs.wz = port.wrapping_add(1);
                11
            }

            // EX (SP),HL
            0xE3 => {
                let sp = self.regs.sp;
                let v = self.read16(bus, sp);
                let old = self.index_reg(index);
                self.write16(bus, sp, old);
                self.set_index_reg(index, v);
                self.regs.wz = v;
                19
            }

            // JP (HL)
            0xE9 => {
                self.regs.pc = self.index_reg(index);
                4
            }

            // EX DE,HL (never indexed)
            0xEB => {
                let de = self.regs.de();
                let hl = self.regs.hl();
                self.regs.set_de(hl);
                self.regs.set_hl(de);
                4
            }

            // DI
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
                4
            }

            // LD SP,HL
            0xF9 => {
                self.regs.sp = self.index_reg(index);
                6
            }

            // EI
            0xFB => {
                self.enable_interrupts();
                4
            }

            // Prefixes are consumed by `step`.
            0xCB | 0xDD | 0xED | 0xFD => 4,
        }
    }

    /// The eight accumulator operations, by bits 3–5 of the opcode.
    pub(super) fn alu_a(&mut self, op: u8, value: u8) {
        let a = self.regs.a;
        let carry = self.regs.f & CF != 0;
        let r = match op & 7 {
            0 => alu::add8(a, value, false),
            1 => alu::add8(a, value, carry),
            2 => alu::sub8(a, value, false),
            3 => alu::sub8(a, value, carry),
            4 => alu::and8(a, value),
            5 => alu::xor8(a, value),
            6 => alu::or8(a, value),
            _ => alu::cp8(a, value),
        };
        self.regs.a = r.value;
        self.set_f(r.flags);
    }
}
