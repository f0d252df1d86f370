//! CPU core trait.

use crate::Bus;

/// An instruction-stepped CPU core.
///
/// The bus is passed in rather than owned so the machine can keep its
/// peripherals next to memory and still hand them to the CPU.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction (or one interrupt acknowledge) and return
    /// the T-states it took.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Current program counter.
    fn pc(&self) -> u16;

    /// Copy of all registers.
    fn registers(&self) -> Self::Registers;

    /// True while the CPU is halted waiting for an interrupt.
    fn is_halted(&self) -> bool;

    /// Raise a maskable interrupt. Returns the T-states spent accepting it,
    /// or `None` if interrupts are disabled.
    fn interrupt<B: Bus>(&mut self, bus: &mut B) -> Option<u32>;

    /// Raise a non-maskable interrupt and return the T-states it took.
    fn nmi<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Reset to the power-on state.
    fn reset(&mut self);
}
