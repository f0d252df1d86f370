//! Host arena: owns machines and hands out handles to them.
//!
//! A [`Handle`] is an index plus the generation of its slot. Dropping a
//! machine bumps the slot's generation, so a stale handle can never reach
//! a machine created later in the same slot.

use crate::config::{RomSet, SpectrumConfig, SpectrumModel};
use crate::error::SpectrumError;
use crate::event::Event;
use crate::spectrum::Spectrum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u32,
}

struct Slot {
    generation: u32,
    machine: Option<Spectrum>,
}

/// Every machine a front end is running.
pub struct Host {
    roms: RomSet,
    config: SpectrumConfig,
    slots: Vec<Slot>,
}

impl Host {
    #[must_use]
    pub fn new(roms: RomSet, config: SpectrumConfig) -> Self {
        Self {
            roms,
            config,
            slots: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// Create a machine. Fails only when the model's ROM is missing or the
    /// wrong size.
    pub fn power_on(&mut self, model: SpectrumModel) -> Result<Handle, SpectrumError> {
        let machine = Spectrum::new(model, &self.roms, self.config.clone())?;
        let index = match self.slots.iter().position(|s| s.machine.is_none()) {
            Some(i) => i,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    machine: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.machine = Some(machine);
        Ok(Handle {
            index,
            generation: slot.generation,
        })
    }

    /// Destroy a machine. Its handle (and every copy) is dead afterwards.
    pub fn drop(&mut self, handle: Handle) -> Result<(), SpectrumError> {
        let slot = self.slot(handle)?;
        slot.machine = None;
        slot.generation = slot.generation.wrapping_add(1);
        Ok(())
    }

    /// Power-cycle: a fresh machine of the same model, tape ejected.
    pub fn reset(&mut self, handle: Handle) -> Result<(), SpectrumError> {
        let model = self.machine(handle)?.model();
        let fresh = Spectrum::new(model, &self.roms, self.config.clone())?;
        *self.machine_mut(handle)? = fresh;
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.machine(handle).is_ok()
    }

    fn slot(&mut self, handle: Handle) -> Result<&mut Slot, SpectrumError> {
        self.slots
            .get_mut(handle.index)
            .filter(|s| s.generation == handle.generation && s.machine.is_some())
            .ok_or(SpectrumError::UnknownHandle)
    }

    pub fn machine(&self, handle: Handle) -> Result<&Spectrum, SpectrumError> {
        self.slots
            .get(handle.index)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.machine.as_ref())
            .ok_or(SpectrumError::UnknownHandle)
    }

    pub fn machine_mut(&mut self, handle: Handle) -> Result<&mut Spectrum, SpectrumError> {
        self.slot(handle)?
            .machine
            .as_mut()
            .ok_or(SpectrumError::UnknownHandle)
    }

    pub fn advance_frame(
        &mut self,
        handle: Handle,
        turbo: bool,
    ) -> Result<Vec<Event>, SpectrumError> {
        Ok(self.machine_mut(handle)?.advance_frame(turbo))
    }

    pub fn key_down(&mut self, handle: Handle, code: u32) -> Result<(), SpectrumError> {
        self.machine_mut(handle)?.key_down(code);
        Ok(())
    }

    pub fn key_up(&mut self, handle: Handle, code: u32) -> Result<(), SpectrumError> {
        self.machine_mut(handle)?.key_up(code);
        Ok(())
    }

    pub fn reset_input(&mut self, handle: Handle) -> Result<(), SpectrumError> {
        self.machine_mut(handle)?.reset_input();
        Ok(())
    }

    /// Insert a tape; returns its block count.
    pub fn load_tape(&mut self, handle: Handle, data: &[u8]) -> Result<usize, SpectrumError> {
        self.machine_mut(handle)?.load_tape(data)
    }

    pub fn tape_block_name(&self, handle: Handle, index: usize) -> Result<String, SpectrumError> {
        Ok(self.machine(handle)?.tape_block_name(index)?.to_owned())
    }

    pub fn tape_block_selectable(
        &self,
        handle: Handle,
        index: usize,
    ) -> Result<bool, SpectrumError> {
        self.machine(handle)?.tape_block_selectable(index)
    }

    pub fn tape_seek(&mut self, handle: Handle, index: usize) -> Result<(), SpectrumError> {
        self.machine_mut(handle)?.tape_seek(index)
    }

    pub fn tape_stop(&mut self, handle: Handle) -> Result<(), SpectrumError> {
        self.machine_mut(handle)?.tape_stop();
        Ok(())
    }

    /// Load any supported snapshot; returns the model now running.
    pub fn load_snapshot(
        &mut self,
        handle: Handle,
        data: &[u8],
    ) -> Result<SpectrumModel, SpectrumError> {
        let machine = self
            .slots
            .get_mut(handle.index)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.machine.as_mut())
            .ok_or(SpectrumError::UnknownHandle)?;
        machine.load_snapshot(data, &self.roms)
    }

    pub fn snapshot(&self, handle: Handle) -> Result<Vec<u8>, SpectrumError> {
        self.machine(handle)?.snapshot()
    }

    pub fn snapshot_z80(&self, handle: Handle) -> Result<Vec<u8>, SpectrumError> {
        Ok(self.machine(handle)?.snapshot_z80())
    }

    pub fn peek(&self, handle: Handle, addr: u16) -> Result<u8, SpectrumError> {
        Ok(self.machine(handle)?.peek(addr))
    }

    pub fn poke(&mut self, handle: Handle, addr: u16, value: u8) -> Result<(), SpectrumError> {
        self.machine_mut(handle)?.poke(addr, value);
        Ok(())
    }
}
