//! Top-level Spectrum system.
//!
//! # Frame loop
//!
//! A frame is a fixed budget of T-states (69,888 on the 48K, 70,908 on the
//! 128K). The CPU runs instruction by instruction; after each one the tape,
//! AY and speaker are clocked by the T-states it took (including
//! contention) and the ULA draws every scanline the beam has finished.
//!
//! INT is held for the first 32 T-states of the frame. The last
//! instruction may overrun the budget; the excess is carried into the next
//! frame.

#![allow(clippy::cast_possible_truncation)]

use emu_core::{Observable, Value};
use format_sna::SnapshotImage;
use format_z80::write_z80;
use gi_ay_3_8910::Ay3_8910;
use sinclair_ula::{FB_HEIGHT, FB_WIDTH, Ula};
use zilog_z80::{CF, Z80};

use crate::audio::{AY_LEVEL, BEEPER_LEVEL, MIC_LEVEL, Speaker, TAPE_LEVEL, sample_rate};
use crate::bus::SpectrumBus;
use crate::config::{RomSet, SpectrumConfig, SpectrumModel};
use crate::error::SpectrumError;
use crate::event::{AudioBuffer, Event, Frame};
use crate::memory::Memory;
use crate::snapshot::{
    MachineState, Snapshot, ay_image, image_model, registers_from_image, registers_to_image,
};
use crate::tape::{BlockChange, Tape, TapeDeck};

/// ROM address of the LD-BYTES routine (tape loading entry point).
const LD_BYTES_ADDR: u16 = 0x0556;

/// T-states the ULA holds INT low at the start of a frame.
const INT_LENGTH: u32 = 32;

/// T-states charged for a trapped LD-BYTES call: the RET it ends with.
const TRAP_TSTATES: u32 = 10;

/// ZX Spectrum system.
pub struct Spectrum {
    model: SpectrumModel,
    config: SpectrumConfig,
    cpu: Z80,
    bus: SpectrumBus,
    tape: TapeDeck,
    speaker: Speaker,
    /// T-state within the current frame.
    frame_t: u32,
    /// CPU T-state left over from clocking the AY at half rate.
    ay_phase: u32,
    /// Events waiting for the next `advance_frame`.
    events: Vec<Event>,
}

impl Spectrum {
    /// Power on a `model` with its ROM from `roms`.
    pub fn new(
        model: SpectrumModel,
        roms: &RomSet,
        config: SpectrumConfig,
    ) -> Result<Self, SpectrumError> {
        let rom = roms.for_model(model)?;
        let mut bus = SpectrumBus::new(
            Memory::new(model, rom),
            Ula::new(model.timing()),
            model.is_128k().then(Ay3_8910::new),
        );
        bus.plus2a_paging = config.plus2a_paging;
        log::info!("powered on Spectrum {model}");
        Ok(Self {
            model,
            config,
            cpu: Z80::new(),
            bus,
            tape: TapeDeck::new(),
            speaker: Speaker::new(),
            frame_t: 0,
            ay_phase: 0,
            events: Vec::new(),
        })
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.model
    }

    #[must_use]
    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    #[must_use]
    pub fn tape(&self) -> &TapeDeck {
        &self.tape
    }

    /// Output sample rate of this model.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        sample_rate(self.bus.ula.timing().cpu_clock)
    }

    /// Run one frame, or `turbo_frames` frames without audio, and hand back
    /// every event raised since the last call.
    pub fn advance_frame(&mut self, turbo: bool) -> Vec<Event> {
        let audio = if turbo {
            for _ in 0..self.config.turbo_frames.max(1) {
                self.run_frame(false);
            }
            None
        } else {
            self.run_frame(true)
        };
        self.events.push(Event::FrameReady(self.frame()));
        if let Some(samples) = audio {
            self.events.push(Event::AudioReady(AudioBuffer {
                sample_rate: self.sample_rate(),
                samples,
            }));
        }
        std::mem::take(&mut self.events)
    }

    /// The picture as last drawn.
    #[must_use]
    pub fn frame(&self) -> Frame {
        Frame {
            width: FB_WIDTH,
            height: FB_HEIGHT,
            pixels: self.bus.ula.framebuffer().to_vec(),
        }
    }

    fn run_frame(&mut self, audio: bool) -> Option<Vec<f32>> {
        let frame_len = self.bus.ula.timing().frame_tstates();
        self.cpu.set_int_line(true);

        while self.frame_t < frame_len {
            if self.frame_t >= INT_LENGTH {
                self.cpu.set_int_line(false);
            }
            let tstates = if self.trap_ld_bytes() {
                TRAP_TSTATES
            } else {
                self.bus.begin_instruction(self.frame_t);
                self.cpu.step(&mut self.bus) + self.bus.take_wait()
            };
            self.frame_t += tstates;
            self.clock_peripherals(tstates, audio);
            self.bus.ula.render_until(self.frame_t, self.bus.memory.screen());
        }

        self.cpu.set_int_line(false);
        self.bus.ula.end_frame(self.bus.memory.screen());
        self.frame_t -= frame_len;

        if audio {
            Some(self.speaker.complete_frame(frame_len, self.output_level()))
        } else {
            self.speaker.discard();
            None
        }
    }

    fn clock_peripherals(&mut self, tstates: u32, audio: bool) {
        if let Some(BlockChange(block)) = self.tape.advance(tstates, !self.model.is_128k()) {
            self.events.push(Event::TapeBlockChanged(block));
        }
        self.bus.tape_ear = self.tape.is_playing().then(|| self.tape.level());

        if let Some(ay) = &mut self.bus.ay {
            let cycles = tstates + self.ay_phase;
            ay.clock(cycles / 2);
            self.ay_phase = cycles % 2;
        }

        if audio {
            self.speaker.push(self.output_level(), tstates);
        }
    }

    /// Mixed speaker level: beeper, MIC, tape and AY.
    fn output_level(&self) -> f32 {
        let mut level = 0.0;
        if self.bus.ear_out() {
            level += BEEPER_LEVEL;
        }
        if self.bus.mic_out() {
            level += MIC_LEVEL;
        }
        if self.tape.is_playing() && self.tape.level() {
            level += TAPE_LEVEL;
        }
        if let Some(ay) = &self.bus.ay {
            level += ay.output() * AY_LEVEL;
        }
        level
    }

    /// Handle the ROM tape-loading trap.
    ///
    /// Register conventions on entry to LD-BYTES:
    ///   A  = expected flag byte ($00 for header, $FF for data)
    ///   DE = number of bytes expected
    ///   IX = destination address in memory
    ///   Carry flag = set for LOAD, clear for VERIFY
    ///
    /// Returns true when the call was served from the tape.
    fn trap_ld_bytes(&mut self) -> bool {
        if !self.config.fast_load
            || self.cpu.regs().pc != LD_BYTES_ADDR
            || !self.bus.memory.basic_rom_paged()
        {
            return false;
        }
        let Some((index, block)) = self.tape.loadable_block() else {
            return false;
        };
        let block = block.to_vec();
        let ok = self.load_block(&block);
        log::debug!(
            "fast load of block {index} ({} bytes) {}",
            block.len(),
            if ok { "succeeded" } else { "failed" }
        );

        self.bus.begin_instruction(self.frame_t);
        self.cpu.ret(&mut self.bus);
        self.bus.take_wait();

        if let Some(BlockChange(current)) = self.tape.skip_to(index + 1) {
            self.events.push(Event::TapeBlockChanged(current));
        }
        true
    }

    /// Copy or verify `block` (flag byte, data, checksum) as LD-BYTES
    /// would, leaving IX, DE and carry as the ROM does.
    fn load_block(&mut self, block: &[u8]) -> bool {
        let regs = *self.cpu.regs();
        let loading = regs.f & CF != 0;
        let wanted = regs.de();

        let Some((&flag, rest)) = block.split_first() else {
            return false;
        };
        if flag != regs.a {
            self.cpu.regs_mut().f &= !CF;
            return false;
        }

        let count = usize::from(wanted).min(rest.len());
        let mut parity = flag;
        let mut ok = true;
        for (i, &byte) in rest[..count].iter().enumerate() {
            let addr = regs.ix.wrapping_add(i as u16);
            if loading {
                self.bus.memory.write(addr, byte);
            } else if self.bus.memory.read(addr) != byte {
                ok = false;
            }
            parity ^= byte;
        }
        // The byte after the data is the checksum.
        ok &= rest.get(count).is_some_and(|&checksum| parity == checksum);

        let regs = self.cpu.regs_mut();
        regs.ix = regs.ix.wrapping_add(count as u16);
        regs.set_de(wanted - count as u16);
        if ok {
            regs.f |= CF;
        } else {
            regs.f &= !CF;
        }
        ok
    }

    // =========================================================================
    // Input
    // =========================================================================

    pub fn key_down(&mut self, code: u32) {
        self.bus.input.apply(code, true);
    }

    pub fn key_up(&mut self, code: u32) {
        self.bus.input.apply(code, false);
    }

    /// Release every key and the joystick.
    pub fn reset_input(&mut self) {
        self.bus.input.clear();
    }

    // =========================================================================
    // Tape
    // =========================================================================

    /// Insert a TAP or TZX image and start playing it. The old tape stays
    /// if the new one is corrupt.
    pub fn load_tape(&mut self, data: &[u8]) -> Result<usize, SpectrumError> {
        let tape = Tape::parse(data)?;
        let count = tape.len();
        log::info!("tape inserted: {count} blocks");
        self.tape.insert(tape);
        self.events
            .push(Event::TapeBlockChanged(self.tape.current_block()));
        Ok(count)
    }

    pub fn tape_block_name(&self, index: usize) -> Result<&str, SpectrumError> {
        self.tape.block_name(index)
    }

    pub fn tape_block_selectable(&self, index: usize) -> Result<bool, SpectrumError> {
        self.tape.block_selectable(index)
    }

    pub fn tape_seek(&mut self, index: usize) -> Result<(), SpectrumError> {
        self.tape.seek(index)?;
        self.events.push(Event::TapeBlockChanged(Some(index)));
        Ok(())
    }

    pub fn tape_stop(&mut self) {
        self.tape.stop();
        self.bus.tape_ear = None;
    }

    // =========================================================================
    // Memory
    // =========================================================================

    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.bus.memory.read(addr)
    }

    /// Write through the current paging. ROM ignores it.
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.bus.memory.write(addr, value);
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Capture the machine in the native snapshot format.
    pub fn snapshot(&self) -> Result<Vec<u8>, SpectrumError> {
        let state = MachineState {
            model: self.model,
            cpu: self.cpu.state(),
            memory: self.bus.memory.clone(),
            ula: self.bus.ula.clone(),
            ay: self.bus.ay.clone(),
            input: self.bus.input.clone(),
            speaker: self.speaker.clone(),
            fe_latch: self.bus.fe_latch,
            frame_t: self.frame_t,
            ay_phase: self.ay_phase,
        };
        Ok(state.encode()?)
    }

    /// Export as a .Z80 (version 3) file.
    #[must_use]
    pub fn snapshot_z80(&self) -> Vec<u8> {
        write_z80(&SnapshotImage {
            model: image_model(self.model),
            regs: registers_to_image(self.cpu.regs()),
            border: self.bus.ula.border(),
            ram: self.bus.memory.ram().to_vec(),
            port_7ffd: self.bus.memory.port_7ffd(),
            port_1ffd: self.bus.memory.port_1ffd(),
            ay: self.bus.ay.as_ref().map(ay_image),
        })
    }

    /// Replace the machine with a native, .SNA or .Z80 snapshot, switching
    /// model if it asks for one. Nothing changes unless the snapshot is
    /// valid and its ROM is available. The tape and pending events carry
    /// over.
    pub fn load_snapshot(
        &mut self,
        data: &[u8],
        roms: &RomSet,
    ) -> Result<SpectrumModel, SpectrumError> {
        let snapshot = Snapshot::parse(data)?;
        let model = snapshot.model();
        let rom = roms.for_model(model)?;
        let mut next = Self::new(model, roms, self.config.clone())?;
        match snapshot {
            Snapshot::Native(state) => next.restore(*state, rom),
            Snapshot::Image(image) => next.apply_image(&image),
        }
        next.tape = std::mem::take(&mut self.tape);
        next.events = std::mem::take(&mut self.events);
        *self = next;
        log::info!("snapshot loaded: Spectrum {model}");
        Ok(model)
    }

    fn restore(&mut self, state: MachineState, rom: &[u8]) {
        let MachineState {
            cpu,
            mut memory,
            mut ula,
            ay,
            input,
            speaker,
            fe_latch,
            frame_t,
            ay_phase,
            ..
        } = state;
        memory.set_rom(rom);
        ula.redraw(memory.screen());
        self.cpu.restore(&cpu);
        self.bus.memory = memory;
        self.bus.ula = ula;
        self.bus.ay = ay;
        self.bus.input = input;
        self.bus.fe_latch = fe_latch;
        self.speaker = speaker;
        self.frame_t = frame_t;
        self.ay_phase = ay_phase;
    }

    fn apply_image(&mut self, image: &SnapshotImage) {
        self.bus.memory.load(&image.ram, image.port_7ffd, image.port_1ffd);
        *self.cpu.regs_mut() = registers_from_image(&image.regs);
        self.bus.ula.set_border(image.border);
        self.bus.fe_latch = image.border & 0x07;
        if let (Some(ay), Some(saved)) = (&mut self.bus.ay, &image.ay) {
            ay.load_registers(saved.selected, &saved.registers);
        }
        self.bus.ula.redraw(self.bus.memory.screen());
    }
}

fn parse_address(s: &str) -> Option<u16> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = s.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

impl Observable for Spectrum {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("ula.") {
            match rest {
                "border" => Some(self.bus.ula.border().into()),
                "frame" => Some(self.bus.ula.frame_count().into()),
                "tstate" => Some(self.frame_t.into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest).map(|addr| self.peek(addr).into())
        } else if let Some(rest) = path.strip_prefix("paging.") {
            match rest {
                "7ffd" => Some(self.bus.memory.port_7ffd().into()),
                "1ffd" => Some(self.bus.memory.port_1ffd().into()),
                "locked" => Some(self.bus.memory.is_locked().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("tape.") {
            match rest {
                "playing" => Some(self.tape.is_playing().into()),
                "level" => Some(self.tape.level().into()),
                "block" => self.tape.current_block().map(|b| (b as u64).into()),
                "blocks" => self.tape.tape().map(|t| (t.len() as u64).into()),
                _ => None,
            }
        } else {
            match path {
                "model" => Some(self.model.to_string().into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<z80_paths>",
            "ula.border",
            "ula.frame",
            "ula.tstate",
            "memory.<address>",
            "paging.7ffd",
            "paging.1ffd",
            "paging.locked",
            "tape.playing",
            "tape.level",
            "tape.block",
            "tape.blocks",
            "model",
        ]
    }
}
