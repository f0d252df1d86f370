//! Cycle-counted ZX Spectrum 48K / 128K emulator.
//!
//! A [`Host`] owns any number of machines, addressed by [`Handle`]. The
//! front end drives each one a frame at a time with
//! [`Host::advance_frame`] and gets back [`Event`]s: the finished picture,
//! the frame's audio and tape position changes.
//!
//! ROMs are not bundled; the front end supplies them in a [`RomSet`].
//! Tapes and snapshots may arrive ZIP-wrapped when the `zip` feature is
//! on.

pub mod archive;
mod audio;
mod bus;
#[cfg(feature = "native")]
pub mod capture;
mod config;
mod error;
mod event;
mod host;
pub mod keyboard;
mod memory;
pub mod snapshot;
mod spectrum;
pub mod tape;

pub use audio::{TSTATES_PER_SAMPLE, sample_rate};
pub use bus::SpectrumBus;
pub use config::{ROM_SIZE, RomSet, SpectrumConfig, SpectrumModel};
pub use error::{ArchiveError, ContainerError, SnapshotError, SpectrumError};
pub use event::{AudioBuffer, Event, Frame};
pub use host::{Handle, Host};
pub use keyboard::{InputState, SpectrumKey, chord};
pub use memory::{BANK_SIZE, Memory};
pub use spectrum::Spectrum;
pub use tape::{Tape, TapeBlock, TapeDeck};
