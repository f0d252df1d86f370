//! ZX Spectrum snapshot images.
//!
//! [`SnapshotImage`] is the machine-independent picture of a Spectrum that
//! every snapshot format decodes into: registers, RAM, paging latch, border
//! and AY registers. This crate also reads the SNA format; `.Z80` lives in
//! `format-z80` and reuses the image type.

mod image;
mod sna;

pub use image::{AyImage, BANK_SIZE, SnapshotImage, SnapshotModel, SnapshotRegisters};
pub use sna::{SNA_48K_SIZE, SNA_128K_SIZE, SNA_128K_SIZE_DUP, SnaError, parse_sna};
