//! Spectrum memory: ROM, RAM banks and the 128K paging latch.
//!
//! RAM is stored bank by bank. The 48K has three banks, the pages at
//! `$4000`, `$8000` and `$C000` in that order. The 128K has banks 0-7:
//!
//! - `$0000-$3FFF`: ROM 0 (128 editor) or ROM 1 (48 BASIC), bit 4 of `$7FFD`
//! - `$4000-$7FFF`: bank 5 (contended)
//! - `$8000-$BFFF`: bank 2
//! - `$C000-$FFFF`: bank 0-7, bits 0-2 of `$7FFD`
//!
//! Bit 3 of `$7FFD` shows bank 7 instead of bank 5 on screen and bit 5
//! locks the latch until reset.
//!
//! The +2A `$1FFD` latch is honoured when the bus decodes it. With bit 0
//! set, all four slots hold RAM, chosen by bits 1-2:
//!
//! | bits 2-1 | `$0000` | `$4000` | `$8000` | `$C000` |
//! |----------|---------|---------|---------|---------|
//! | 00       | 0       | 1       | 2       | 3       |
//! | 01       | 4       | 5       | 6       | 7       |
//! | 10       | 4       | 5       | 6       | 3       |
//! | 11       | 4       | 7       | 6       | 3       |
//!
//! With bit 0 clear the `$7FFD` mapping applies again.

#![allow(clippy::cast_possible_truncation)]

use serde::{Deserialize, Serialize};
use sinclair_ula::SCREEN_BYTES;

use crate::config::{ROM_SIZE, SpectrumModel};

pub const BANK_SIZE: usize = 0x4000;

/// Banks in slots 0-3 for each all-RAM configuration.
const SPECIAL_BANKS: [[usize; 4]; 4] = [[0, 1, 2, 3], [4, 5, 6, 7], [4, 5, 6, 3], [4, 7, 6, 3]];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    model: SpectrumModel,
    /// Supplied by the host on every power-on, never stored in snapshots.
    #[serde(skip)]
    rom: Vec<u8>,
    ram: Vec<u8>,
    port_7ffd: u8,
    port_1ffd: u8,
    locked: bool,
}

impl Memory {
    /// Memory for `model` with `rom` (already checked for size by
    /// [`crate::RomSet::for_model`]).
    #[must_use]
    pub fn new(model: SpectrumModel, rom: &[u8]) -> Self {
        Self {
            model,
            rom: rom.to_vec(),
            ram: vec![0; model.ram_banks() * BANK_SIZE],
            port_7ffd: 0,
            port_1ffd: 0,
            locked: false,
        }
    }

    /// Reattach the ROM after deserializing.
    pub(crate) fn set_rom(&mut self, rom: &[u8]) {
        self.rom = rom.to_vec();
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.model
    }

    /// True while `$1FFD` maps RAM into all four slots.
    #[must_use]
    pub fn all_ram(&self) -> bool {
        self.model.is_128k() && self.port_1ffd & 0x01 != 0
    }

    /// RAM bank in `slot` (0-3), or `None` where ROM is paged.
    fn slot_bank(&self, slot: usize) -> Option<usize> {
        if self.all_ram() {
            let mode = usize::from((self.port_1ffd >> 1) & 0x03);
            return Some(SPECIAL_BANKS[mode][slot]);
        }
        match (self.model, slot) {
            (_, 0) => None,
            (SpectrumModel::Spectrum48K, _) => Some(slot - 1),
            (SpectrumModel::Spectrum128K, 1) => Some(5),
            (SpectrumModel::Spectrum128K, 2) => Some(2),
            (SpectrumModel::Spectrum128K, _) => Some(self.paged_bank()),
        }
    }

    fn ram_index(bank: usize, addr: u16) -> usize {
        bank * BANK_SIZE + usize::from(addr & 0x3FFF)
    }

    fn rom_index(&self, addr: u16) -> usize {
        self.rom_page() * ROM_SIZE + usize::from(addr)
    }

    #[must_use]
    pub fn read(&self, addr: u16) -> u8 {
        match self.slot_bank(usize::from(addr >> 14)) {
            Some(bank) => self.ram[Self::ram_index(bank, addr)],
            None => self.rom.get(self.rom_index(addr)).copied().unwrap_or(0xFF),
        }
    }

    /// Write a byte. ROM writes are ignored, as on hardware.
    pub fn write(&mut self, addr: u16, value: u8) {
        if let Some(bank) = self.slot_bank(usize::from(addr >> 14)) {
            self.ram[Self::ram_index(bank, addr)] = value;
        }
    }

    /// Is `addr` in memory the ULA shares with the CPU?
    ///
    /// `$4000-$7FFF` on the 48K; on the 128K every odd bank wherever it is
    /// paged.
    #[must_use]
    pub fn contended(&self, addr: u16) -> bool {
        let slot = usize::from(addr >> 14);
        if !self.model.is_128k() {
            return slot == 1;
        }
        self.slot_bank(slot).is_some_and(|bank| bank % 2 == 1)
    }

    /// Write the `$7FFD` latch. Ignored (with a warning) once locked, and
    /// always on the 48K.
    pub fn write_7ffd(&mut self, value: u8) {
        if !self.model.is_128k() {
            return;
        }
        if self.locked {
            log::warn!("write {value:02X} to $7FFD ignored: paging is locked");
            return;
        }
        self.port_7ffd = value;
        self.locked = value & 0x20 != 0;
    }

    /// Write the +2A `$1FFD` latch. Shares the `$7FFD` lock.
    pub fn write_1ffd(&mut self, value: u8) {
        if !self.model.is_128k() {
            return;
        }
        if self.locked {
            log::warn!("write {value:02X} to $1FFD ignored: paging is locked");
            return;
        }
        self.port_1ffd = value;
    }

    #[must_use]
    pub fn port_7ffd(&self) -> u8 {
        self.port_7ffd
    }

    #[must_use]
    pub fn port_1ffd(&self) -> u8 {
        self.port_1ffd
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Bank at `$C000`.
    #[must_use]
    pub fn paged_bank(&self) -> usize {
        usize::from(self.port_7ffd & 0x07)
    }

    /// Selected ROM page: always 0 on the 48K.
    #[must_use]
    pub fn rom_page(&self) -> usize {
        if self.model.is_128k() {
            usize::from((self.port_7ffd >> 4) & 1)
        } else {
            0
        }
    }

    /// True when the 48 BASIC ROM (with the tape routines) is paged in.
    #[must_use]
    pub fn basic_rom_paged(&self) -> bool {
        !self.model.is_128k() || (!self.all_ram() && self.rom_page() == 1)
    }

    /// Bank the ULA displays.
    #[must_use]
    pub fn screen_bank(&self) -> usize {
        match self.model {
            SpectrumModel::Spectrum48K => 0,
            SpectrumModel::Spectrum128K if self.port_7ffd & 0x08 != 0 => 7,
            SpectrumModel::Spectrum128K => 5,
        }
    }

    /// Bitmap and attributes of the displayed screen.
    #[must_use]
    pub fn screen(&self) -> &[u8] {
        let start = self.screen_bank() * BANK_SIZE;
        &self.ram[start..start + SCREEN_BYTES]
    }

    #[must_use]
    pub fn bank(&self, n: usize) -> &[u8] {
        &self.ram[n * BANK_SIZE..(n + 1) * BANK_SIZE]
    }

    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Replace all RAM and both paging latches, as a snapshot load does.
    /// `ram` must hold every bank of this model.
    pub(crate) fn load(&mut self, ram: &[u8], port_7ffd: u8, port_1ffd: u8) {
        self.ram.copy_from_slice(ram);
        let is_128k = self.model.is_128k();
        self.port_7ffd = if is_128k { port_7ffd } else { 0 };
        self.port_1ffd = if is_128k { port_1ffd } else { 0 };
        self.locked = self.port_7ffd & 0x20 != 0;
    }

    /// False for restored state that doesn't match its model: wrong RAM
    /// size, paging latches on a 48K, or a lock flag that disagrees with
    /// the latch.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let paging_ok = self.model.is_128k() || (self.port_7ffd == 0 && self.port_1ffd == 0);
        self.ram.len() == self.model.ram_banks() * BANK_SIZE
            && paging_ok
            && self.locked == (self.port_7ffd & 0x20 != 0)
    }
}
