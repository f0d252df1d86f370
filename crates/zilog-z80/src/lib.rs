//! Instruction-stepped Zilog Z80 interpreter.
//!
//! Each call to [`Z80::step`] executes one whole instruction against a
//! [`emu_core::Bus`] and returns the T-states it took. Memory contention is
//! left to the bus; the CPU reports uncontended timings.
//!
//! The full instruction set is covered, undocumented opcodes and flags
//! included. The few opcodes with no defined behaviour (the holes in the
//! ED page) are reported as [`InvalidOpcode`] and executed as NOPs.

mod alu;
mod cpu;
mod flags;
mod registers;

pub use cpu::{InvalidOpcode, Z80, Z80State};
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use registers::Registers;
