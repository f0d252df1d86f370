//! Spectrum model configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use sinclair_ula::{TIMING_48K, TIMING_128K, UlaTiming};

use crate::error::SpectrumError;

/// ROM bank size.
pub const ROM_SIZE: usize = 0x4000;

/// Supported Spectrum models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectrumModel {
    Spectrum48K,
    Spectrum128K,
}

impl SpectrumModel {
    #[must_use]
    pub fn timing(self) -> UlaTiming {
        match self {
            Self::Spectrum48K => TIMING_48K,
            Self::Spectrum128K => TIMING_128K,
        }
    }

    /// Total ROM size: one 16K bank on the 48K, two on the 128K.
    #[must_use]
    pub fn rom_size(self) -> usize {
        match self {
            Self::Spectrum48K => ROM_SIZE,
            Self::Spectrum128K => 2 * ROM_SIZE,
        }
    }

    /// RAM banks fitted.
    #[must_use]
    pub fn ram_banks(self) -> usize {
        match self {
            Self::Spectrum48K => 3,
            Self::Spectrum128K => 8,
        }
    }

    #[must_use]
    pub fn is_128k(self) -> bool {
        self == Self::Spectrum128K
    }

    /// Byte used for this model in the native snapshot header.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Self::Spectrum48K => 0,
            Self::Spectrum128K => 1,
        }
    }

    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Spectrum48K),
            1 => Some(Self::Spectrum128K),
            _ => None,
        }
    }
}

impl fmt::Display for SpectrumModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Spectrum48K => "48K",
            Self::Spectrum128K => "128K",
        })
    }
}

/// Behaviour switches shared by every machine a host creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumConfig {
    /// Model powered on when none is named.
    pub model: SpectrumModel,
    /// Trap the ROM's LD-BYTES routine and copy standard blocks directly.
    pub fast_load: bool,
    /// Frames run by one turbo `advance_frame`.
    pub turbo_frames: u32,
    /// Decode port `$1FFD` as the +2A paging latch on 128K machines. Off,
    /// it mirrors `$7FFD` as on the original 128.
    pub plus2a_paging: bool,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            model: SpectrumModel::Spectrum48K,
            fast_load: true,
            turbo_frames: 100,
            plus2a_paging: false,
        }
    }
}

/// ROM images supplied by the host. Neither is bundled.
///
/// The 128K image is ROM 0 (128 editor) followed by ROM 1 (48 BASIC).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RomSet {
    pub rom_48k: Option<Vec<u8>>,
    pub rom_128k: Option<Vec<u8>>,
}

impl RomSet {
    /// The ROM for `model`, checked for size.
    pub fn for_model(&self, model: SpectrumModel) -> Result<&[u8], SpectrumError> {
        let rom = match model {
            SpectrumModel::Spectrum48K => self.rom_48k.as_deref(),
            SpectrumModel::Spectrum128K => self.rom_128k.as_deref(),
        }
        .unwrap_or(&[]);
        if rom.len() == model.rom_size() {
            Ok(rom)
        } else {
            Err(SpectrumError::InvalidRom {
                model,
                expected: model.rom_size(),
                actual: rom.len(),
            })
        }
    }
}
