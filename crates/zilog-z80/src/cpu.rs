//! The Z80 core: state, stepping, interrupts and operand helpers.
//!
//! Opcode execution lives in the `execute*` submodules, one per opcode page.

mod execute;
mod execute_cb;
mod execute_ed;

use emu_core::{Bus, Cpu, Observable, Value};
use serde::{Deserialize, Serialize};

use crate::flags::{CF, PF, SF, ZF};
use crate::registers::Registers;

/// An opcode with no defined behaviour was fetched.
///
/// This is never fatal: the CPU logs it, executes the opcode as a NOP and
/// keeps the last one around for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid opcode {prefix:02X} {opcode:02X} at {pc:04X}")]
pub struct InvalidOpcode {
    pub prefix: u8,
    pub opcode: u8,
    /// Address of the prefix byte.
    pub pc: u16,
}

/// Which register stands in for HL in the current instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Index {
    Hl,
    Ix,
    Iy,
}

/// Everything needed to resume a Z80 exactly where it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Z80State {
    pub regs: Registers,
    /// An `EI` just executed; interrupts wait one more instruction.
    pub ei_delay: bool,
    /// Flags written by the last instruction (for SCF/CCF X/Y).
    pub q: u8,
    /// Level of the /INT input.
    pub int_line: bool,
}

/// Zilog Z80 CPU.
pub struct Z80 {
    pub(crate) regs: Registers,
    ei_delay: bool,
    /// Flags written by the instruction in flight.
    q: u8,
    /// Flags written by the previous instruction.
    last_q: u8,
    int_line: bool,
    invalid: Option<InvalidOpcode>,
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80 {
    /// A Z80 in its power-on state.
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self {
            regs: Registers::default(),
            ei_delay: false,
            q: 0,
            last_q: 0,
            int_line: false,
            invalid: None,
        };
        cpu.reset();
        cpu
    }

    #[must_use]
    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[must_use]
    pub fn state(&self) -> Z80State {
        Z80State {
            regs: self.regs,
            ei_delay: self.ei_delay,
            q: self.q,
            int_line: self.int_line,
        }
    }

    pub fn restore(&mut self, state: &Z80State) {
        self.regs = state.regs;
        self.ei_delay = state.ei_delay;
        self.q = state.q;
        self.last_q = state.q;
        self.int_line = state.int_line;
        self.invalid = None;
    }

    /// Drive the /INT input. While it is asserted the CPU accepts an
    /// interrupt at the next instruction boundary where IFF1 allows it.
    pub fn set_int_line(&mut self, asserted: bool) {
        self.int_line = asserted;
    }

    /// The most recent invalid opcode, cleared on read.
    pub fn take_invalid_opcode(&mut self) -> Option<InvalidOpcode> {
        self.invalid.take()
    }

    /// Execute one instruction, or accept a pending interrupt.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if self.int_line
            && let Some(t) = self.accept_interrupt(bus)
        {
            return t;
        }
        self.ei_delay = false;
        self.last_q = self.q;
        self.q = 0;

        if self.regs.halted {
            // HALT keeps refreshing memory with internal NOPs.
            self.inc_r();
            return 4;
        }

        let start = self.regs.pc;
        let mut op = self.fetch(bus);
        let mut index = Index::Hl;
        let mut prefix_t = 0;
        if op == 0xDD || op == 0xFD {
            // A prefix followed by another prefix is a NOP on its own, so a
            // long chain stays interruptible.
            if matches!(bus.peek_opcode(self.regs.pc), 0xDD | 0xFD) {
                return 4;
            }
            index = if op == 0xDD { Index::Ix } else { Index::Iy };
            prefix_t = 4;
            op = self.fetch(bus);
        }

        prefix_t
            + match op {
                0xCB if index == Index::Hl => self.execute_cb(bus),
                0xCB => self.execute_index_cb(bus, index),
                0xED => self.execute_ed(bus, start.wrapping_add((prefix_t / 4) as u16)),
                _ => self.execute_main(bus, op, index),
            }
    }

    /// Run whole instructions until at least `cycles` T-states have passed.
    /// Returns the T-states actually used.
    pub fn run_for<B: Bus>(&mut self, bus: &mut B, cycles: u32) -> u32 {
        let mut elapsed = 0;
        while elapsed < cycles {
            elapsed += self.step(bus);
        }
        elapsed
    }

    fn accept_interrupt<B: Bus>(&mut self, bus: &mut B) -> Option<u32> {
        if !self.regs.iff1 || self.ei_delay {
            return None;
        }
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.inc_r();
        self.q = 0;
        let pc = self.regs.pc;
        self.push16(bus, pc);
        let t = if self.regs.im == 2 {
            let vector = u16::from(self.regs.i) << 8 | 0xFF;
            self.regs.pc = self.read16(bus, vector);
            19
        } else {
            // IM 0 sees 0xFF on the idle bus: RST 38h.
            self.regs.pc = 0x0038;
            13
        };
        self.regs.wz = self.regs.pc;
        Some(t)
    }

    // =========================================================================
    // Fetch and memory helpers
    // =========================================================================

    pub(crate) fn inc_r(&mut self) {
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
    }

    /// M1 opcode fetch: advances PC and R.
    pub(crate) fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let op = bus.fetch(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.inc_r();
        op
    }

    pub(crate) fn imm8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let v = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        v
    }

    pub(crate) fn imm16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.imm8(bus);
        let hi = self.imm8(bus);
        u16::from(hi) << 8 | u16::from(lo)
    }

    pub(crate) fn read16<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = bus.read(addr);
        let hi = bus.read(addr.wrapping_add(1));
        u16::from(hi) << 8 | u16::from(lo)
    }

    pub(crate) fn write16<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u16) {
        bus.write(addr, value as u8);
        bus.write(addr.wrapping_add(1), (value >> 8) as u8);
    }

    pub(crate) fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, (value >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, value as u8);
    }

    pub(crate) fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from(hi) << 8 | u16::from(lo)
    }

    /// Return from a subroutine (also used by the ROM tape trap).
    pub fn ret<B: Bus>(&mut self, bus: &mut B) {
        self.regs.pc = self.pop16(bus);
        self.regs.wz = self.regs.pc;
    }

    // =========================================================================
    // Register helpers
    // =========================================================================

    pub(crate) fn set_f(&mut self, value: u8) {
        self.regs.f = value;
        self.q = value;
    }

    /// SCF/CCF read X/Y from A or'ed with the flags, unless the previous
    /// instruction wrote the flags.
    pub(crate) fn scf_ccf_xy(&self) -> u8 {
        ((self.last_q ^ self.regs.f) | self.regs.a) & (crate::YF | crate::XF)
    }

    /// 8-bit register by its 3-bit opcode field. Field 6 is never passed.
    pub(crate) fn reg8(&self, r: u8) -> u8 {
        match r & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            _ => self.regs.a,
        }
    }

    pub(crate) fn set_reg8(&mut self, r: u8, value: u8) {
        match r & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            _ => self.regs.a = value,
        }
    }

    /// 8-bit register where H and L are replaced by the index halves.
    pub(crate) fn reg8_ix(&self, r: u8, index: Index) -> u8 {
        match (r & 7, index) {
            (4, Index::Ix) => (self.regs.ix >> 8) as u8,
            (5, Index::Ix) => self.regs.ix as u8,
            (4, Index::Iy) => (self.regs.iy >> 8) as u8,
            (5, Index::Iy) => self.regs.iy as u8,
            _ => self.reg8(r),
        }
    }

    pub(crate) fn set_reg8_ix(&mut self, r: u8, index: Index, value: u8) {
        match (r & 7, index) {
            (4, Index::Ix) => self.regs.ix = (self.regs.ix & 0x00FF) | u16::from(value) << 8,
            (5, Index::Ix) => self.regs.ix = (self.regs.ix & 0xFF00) | u16::from(value),
            (4, Index::Iy) => self.regs.iy = (self.regs.iy & 0x00FF) | u16::from(value) << 8,
            (5, Index::Iy) => self.regs.iy = (self.regs.iy & 0xFF00) | u16::from(value),
            _ => self.set_reg8(r, value),
        }
    }

    pub(crate) fn index_reg(&self, index: Index) -> u16 {
        match index {
            Index::Hl => self.regs.hl(),
            Index::Ix => self.regs.ix,
            Index::Iy => self.regs.iy,
        }
    }

    pub(crate) fn set_index_reg(&mut self, index: Index, value: u16) {
        match index {
            Index::Hl => self.regs.set_hl(value),
            Index::Ix => self.regs.ix = value,
            Index::Iy => self.regs.iy = value,
        }
    }

    /// BC, DE, HL (or index), SP by the 2-bit opcode field.
    pub(crate) fn reg16(&self, rp: u8, index: Index) -> u16 {
        match rp & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.index_reg(index),
            _ => self.regs.sp,
        }
    }

    pub(crate) fn set_reg16(&mut self, rp: u8, index: Index, value: u16) {
        match rp & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.set_index_reg(index, value),
            _ => self.regs.sp = value,
        }
    }

    /// The `(HL)` operand address. For IX/IY this reads the displacement
    /// and sets WZ. Returns the extra T-states the indexed form costs.
    pub(crate) fn mem_operand<B: Bus>(&mut self, bus: &mut B, index: Index) -> (u16, u32) {
        match index {
            Index::Hl => (self.regs.hl(), 0),
            _ => {
                let d = self.imm8(bus) as i8;
                let addr = self.index_reg(index).wrapping_add(d as u16);
                self.regs.wz = addr;
                (addr, 8)
            }
        }
    }

    /// Condition code by its 3-bit opcode field: NZ Z NC C PO PE P M.
    pub(crate) fn condition(&self, cc: u8) -> bool {
        let f = self.regs.f;
        match cc & 7 {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CF == 0,
            3 => f & CF != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }

    pub(crate) fn flag_invalid(&mut self, prefix: u8, opcode: u8, pc: u16) {
        let err = InvalidOpcode { prefix, opcode, pc };
        log::warn!("{err}, executing as NOP");
        self.invalid = Some(err);
    }

    pub(crate) fn enable_interrupts(&mut self) {
        self.regs.iff1 = true;
        self.regs.iff2 = true;
        self.ei_delay = true;
    }
}

impl Cpu for Z80 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        Z80::step(self, bus)
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.regs.halted
    }

    fn interrupt<B: Bus>(&mut self, bus: &mut B) -> Option<u32> {
        self.accept_interrupt(bus)
    }

    fn nmi<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.inc_r();
        let pc = self.regs.pc;
        self.push16(bus, pc);
        self.regs.pc = 0x0066;
        self.regs.wz = 0x0066;
        11
    }

    fn reset(&mut self) {
        self.regs = Registers {
            a: 0xFF,
            f: 0xFF,
            sp: 0xFFFF,
            ..Registers::default()
        };
        self.ei_delay = false;
        self.q = 0;
        self.last_q = 0;
        self.int_line = false;
        self.invalid = None;
    }
}

const QUERY_PATHS: &[&str] = &[
    "pc", "sp", "af", "bc", "de", "hl", "ix", "iy", "a", "f", "b", "c", "d", "e", "h", "l", "i",
    "r", "wz", "iff1", "iff2", "im", "halted",
];

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        Some(match path {
            "pc" => r.pc.into(),
            "sp" => r.sp.into(),
            "af" => r.af().into(),
            "bc" => r.bc().into(),
            "de" => r.de().into(),
            "hl" => r.hl().into(),
            "ix" => r.ix.into(),
            "iy" => r.iy.into(),
            "a" => r.a.into(),
            "f" => r.f.into(),
            "b" => r.b.into(),
            "c" => r.c.into(),
            "d" => r.d.into(),
            "e" => r.e.into(),
            "h" => r.h.into(),
            "l" => r.l.into(),
            "i" => r.i.into(),
            "r" => r.r.into(),
            "wz" => r.wz.into(),
            "iff1" => r.iff1.into(),
            "iff2" => r.iff2.into(),
            "im" => r.im.into(),
            "halted" => r.halted.into(),
            _ => return None,
        })
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    fn cpu_with(program: &[u8]) -> (Z80, SimpleBus) {
        let mut bus = SimpleBus::new();
        bus.load(0x0000, program);
        let mut cpu = Z80::new();
        cpu.regs.pc = 0;
        (cpu, bus)
    }

    #[test]
    fn reset_state() {
        let cpu = Z80::new();
        assert_eq!(cpu.regs.pc, 0);
        assert_eq!(cpu.regs.sp, 0xFFFF);
        assert_eq!(cpu.regs.af(), 0xFFFF);
        assert!(!cpu.regs.iff1);
    }

    #[test]
    fn nop_takes_4_cycles_and_bumps_r() {
        let (mut cpu, mut bus) = cpu_with(&[0x00]);
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.regs.pc, 1);
        assert_eq!(cpu.regs.r, 1);
    }

    #[test]
    fn r_keeps_bit_7() {
        let (mut cpu, mut bus) = cpu_with(&[0x00]);
        cpu.regs.r = 0xFF;
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.r, 0x80);
    }

    #[test]
    fn interrupt_ignored_right_after_ei() {
        // EI; NOP
        let (mut cpu, mut bus) = cpu_with(&[0xFB, 0x00, 0x00]);
        cpu.regs.im = 1;
        cpu.set_int_line(true);
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(cpu.step(&mut bus), 13);
        assert_eq!(cpu.regs.pc, 0x0038);
        assert!(!cpu.regs.iff1);
    }

    #[test]
    fn halt_waits_for_interrupt() {
        // HALT at 0
        let (mut cpu, mut bus) = cpu_with(&[0x76]);
        cpu.regs.iff1 = true;
        cpu.regs.im = 1;
        cpu.regs.sp = 0x8000;
        cpu.step(&mut bus);
        assert!(cpu.regs.halted);
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.regs.pc, 1);
        cpu.set_int_line(true);
        assert_eq!(cpu.step(&mut bus), 13);
        assert!(!cpu.regs.halted);
        assert_eq!(cpu.regs.pc, 0x38);
        // Return address is the instruction after HALT.
        assert_eq!(bus.peek(0x7FFE), 0x01);
    }

    #[test]
    fn im2_reads_vector_from_i_register() {
        let (mut cpu, mut bus) = cpu_with(&[0x00]);
        bus.load(0x80FF, &[0x34, 0x12]);
        cpu.regs.i = 0x80;
        cpu.regs.im = 2;
        cpu.regs.iff1 = true;
        cpu.regs.sp = 0xC000;
        cpu.set_int_line(true);
        assert_eq!(cpu.step(&mut bus), 19);
        assert_eq!(cpu.regs.pc, 0x1234);
    }

    #[test]
    fn nmi_jumps_to_0066_and_keeps_iff2() {
        let (mut cpu, mut bus) = cpu_with(&[0x00]);
        cpu.regs.iff1 = true;
        cpu.regs.iff2 = true;
        cpu.regs.sp = 0x8000;
        assert_eq!(Cpu::nmi(&mut cpu, &mut bus), 11);
        assert_eq!(cpu.regs.pc, 0x0066);
        assert!(!cpu.regs.iff1);
        assert!(cpu.regs.iff2);
    }

    #[test]
    fn run_for_overshoots_to_instruction_boundary() {
        // LD BC,nn is 10 T: three of them cover 25 T.
        let (mut cpu, mut bus) = cpu_with(&[0x01, 0, 0, 0x01, 0, 0, 0x01, 0, 0]);
        assert_eq!(cpu.run_for(&mut bus, 25), 30);
        assert_eq!(cpu.regs.pc, 9);
    }

    #[test]
    fn chained_prefixes_step_one_at_a_time() {
        // DD FD DD 21 34 12: LD IX,0x1234 behind two dead prefixes.
        let (mut cpu, mut bus) = cpu_with(&[0xDD, 0xFD, 0xDD, 0x21, 0x34, 0x12]);
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.regs.pc, 1);
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.regs.pc, 2);
        assert_eq!(cpu.step(&mut bus), 14);
        assert_eq!(cpu.regs.pc, 6);
        assert_eq!(cpu.regs.ix, 0x1234);
        assert_eq!(cpu.regs.iy, 0);
        assert_eq!(cpu.regs.r, 4);
    }

    #[test]
    fn interrupt_splits_a_prefix_chain() {
        let mut program = vec![0xFD; 100];
        program.push(0x00);
        let (mut cpu, mut bus) = cpu_with(&program);
        cpu.regs.iff1 = true;
        cpu.regs.im = 1;
        cpu.regs.sp = 0x8000;
        assert_eq!(cpu.step(&mut bus), 4);
        cpu.set_int_line(true);
        assert_eq!(cpu.step(&mut bus), 13);
        assert_eq!(cpu.regs.pc, 0x0038);
        assert_eq!(bus.peek(0x7FFE), 0x01);
    }

    #[test]
    fn invalid_ed_opcode_is_a_nop() {
        let (mut cpu, mut bus) = cpu_with(&[0xED, 0x00, 0x00]);
        assert_eq!(cpu.step(&mut bus), 8);
        assert_eq!(cpu.regs.pc, 2);
        let err = cpu.take_invalid_opcode();
        assert_eq!(
            err,
            Some(InvalidOpcode {
                prefix: 0xED,
                opcode: 0x00,
                pc: 0
            })
        );
        assert_eq!(cpu.take_invalid_opcode(), None);
    }

    #[test]
    fn state_round_trip() {
        let (mut cpu, mut bus) = cpu_with(&[0xFB, 0x00]);
        cpu.step(&mut bus);
        let state = cpu.state();
        let mut other = Z80::new();
        other.restore(&state);
        assert_eq!(other.state(), state);
        assert!(other.state().ei_delay);
    }

    #[test]
    fn observable_paths_resolve() {
        let cpu = Z80::new();
        for path in cpu.query_paths() {
            assert!(cpu.query(path).is_some(), "{path}");
        }
        assert_eq!(cpu.query("sp"), Some(Value::U16(0xFFFF)));
        assert_eq!(cpu.query("nope"), None);
    }
}
