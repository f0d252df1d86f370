//! Core traits and types shared by the emulator crates.
//!
//! CPUs are instruction-stepped: each step reports the T-states it took and
//! the owning machine advances its peripherals by that amount. Components
//! talk to each other only through the [`Bus`] trait.

mod bus;
mod cpu;
mod observable;

pub use bus::{Bus, SimpleBus};
pub use cpu::Cpu;
pub use observable::{Observable, Value};
