//! Spectrum bus: memory and I/O routing.
//!
//! The bus connects the Z80 to memory, the ULA, the keyboard and the AY.
//!
//! | Port              | Decode                 | Device                     |
//! |-------------------|------------------------|----------------------------|
//! | `$FE`             | A0 = 0                 | ULA: keyboard, EAR, border |
//! | `$1F`             | A5 = 0                 | Kempston joystick          |
//! | `$1FFD`           | A15-12 = 0001, A1 = 0  | +2A paging (when enabled)  |
//! | `$7FFD`           | A15 = 0, A1 = 0        | 128K paging                |
//! | `$FFFD`           | A15-14 = 11, A1 = 0    | AY register select / read  |
//! | `$BFFD`           | A15-14 = 10, A1 = 0    | AY data write              |
//! | anything else     |                        | floating bus               |
//!
//! # Contention
//!
//! The CPU reports uncontended instruction timings, so the bus keeps its
//! own clock through each instruction: an opcode fetch advances it 4
//! T-states, other memory cycles 3 and I/O cycles 4. Each contended cycle
//! adds the ULA's wait states for the T-state it starts on. The machine
//! collects the total with [`SpectrumBus::take_wait`].

use emu_core::Bus;
use gi_ay_3_8910::Ay3_8910;
use sinclair_ula::{Ula, floating_bus};

use crate::keyboard::InputState;
use crate::memory::Memory;

pub struct SpectrumBus {
    pub memory: Memory,
    pub ula: Ula,
    pub input: InputState,
    /// Present on the 128K.
    pub ay: Option<Ay3_8910>,
    /// Last value written to port $FE.
    pub fe_latch: u8,
    /// EAR input while a tape plays; `None` falls back to the EAR output.
    pub tape_ear: Option<bool>,
    /// Decode `$1FFD` as the +2A paging port instead of a `$7FFD` mirror.
    pub plus2a_paging: bool,
    /// Frame T-state of the bus cycle in progress.
    now: u32,
    wait: u32,
}

impl SpectrumBus {
    #[must_use]
    pub fn new(memory: Memory, ula: Ula, ay: Option<Ay3_8910>) -> Self {
        Self {
            memory,
            ula,
            input: InputState::new(),
            ay,
            fe_latch: 0,
            tape_ear: None,
            plus2a_paging: false,
            now: 0,
            wait: 0,
        }
    }

    /// Start timing an instruction at frame T-state `t`.
    pub fn begin_instruction(&mut self, t: u32) {
        self.now = t;
        self.wait = 0;
    }

    /// Wait states added since [`SpectrumBus::begin_instruction`].
    pub fn take_wait(&mut self) -> u32 {
        std::mem::take(&mut self.wait)
    }

    /// EAR output (bit 4 of $FE), driving the beeper.
    #[must_use]
    pub fn ear_out(&self) -> bool {
        self.fe_latch & 0x10 != 0
    }

    /// MIC output (bit 3 of $FE).
    #[must_use]
    pub fn mic_out(&self) -> bool {
        self.fe_latch & 0x08 != 0
    }

    /// Bring the ULA's picture up to the current bus time.
    fn catch_up_video(&mut self) {
        self.ula.render_until(self.now, self.memory.screen());
    }

    fn memory_cycle(&mut self, addr: u16, length: u32) {
        let delay = if self.memory.contended(addr) {
            self.ula.timing().contention(self.now)
        } else {
            0
        };
        self.wait += delay;
        self.now += delay + length;
    }

    fn io_cycle(&mut self, port: u16) {
        let ula_port = port & 0x0001 == 0;
        let high_contended = self.memory.contended(port);
        let delay = self
            .ula
            .timing()
            .io_contention(self.now, ula_port, high_contended);
        self.wait += delay;
        self.now += delay + 4;
    }
}

impl Bus for SpectrumBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.memory_cycle(addr, 3);
        self.memory.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.memory_cycle(addr, 3);
        self.memory.write(addr, value);
    }

    fn fetch(&mut self, addr: u16) -> u8 {
        self.memory_cycle(addr, 4);
        self.memory.read(addr)
    }

    fn peek_opcode(&mut self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.io_cycle(port);
        if port & 0x0001 == 0 {
            let keys = self.input.read((port >> 8) as u8);
            let ear = self.tape_ear.unwrap_or_else(|| self.ear_out());
            return if ear { keys | 0x40 } else { keys & !0x40 };
        }
        if port & 0x0020 == 0 {
            return self.input.kempston();
        }
        if port & 0xC002 == 0xC000
            && let Some(ay) = &self.ay
        {
            return ay.read_data();
        }
        floating_bus(self.ula.timing(), self.now, self.memory.screen())
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.io_cycle(port);
        let ula_port = port & 0x0001 == 0;

        if ula_port {
            if value & 0x07 != self.ula.border() {
                self.catch_up_video();
            }
            self.ula.set_border(value);
            self.fe_latch = value;
            return;
        }

        if port & 0xF002 == 0x1000 && self.plus2a_paging && self.memory.model().is_128k() {
            self.memory.write_1ffd(value);
            return;
        }

        if port & 0x8002 == 0 && self.memory.model().is_128k() {
            if (value ^ self.memory.port_7ffd()) & 0x08 != 0 && !self.memory.is_locked() {
                self.catch_up_video();
            }
            self.memory.write_7ffd(value);
        }

        if let Some(ay) = &mut self.ay {
            match port & 0xC002 {
                0xC000 => ay.select_register(value),
                0x8000 => ay.write_data(value),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sinclair_ula::{TIMING_48K, TIMING_128K};

    use super::*;
    use crate::config::SpectrumModel;
    use crate::keyboard::SpectrumKey;

    fn make_bus(model: SpectrumModel) -> SpectrumBus {
        let rom = vec![0u8; model.rom_size()];
        let memory = Memory::new(model, &rom);
        let ula = Ula::new(model.timing());
        let ay = model.is_128k().then(Ay3_8910::new);
        SpectrumBus::new(memory, ula, ay)
    }

    #[test]
    fn memory_read_write() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        bus.write(0x8000, 0xAB);
        assert_eq!(bus.read(0x8000), 0xAB);
    }

    #[test]
    fn rom_write_ignored() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        bus.write(0x0000, 0xFF);
        assert_eq!(bus.read(0x0000), 0x00);
    }

    #[test]
    fn keyboard_read_via_io() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        assert_eq!(bus.io_read(0xFEFE) & 0x1F, 0x1F);
        bus.input.apply(SpectrumKey::CapsShift.code(), true);
        assert_eq!(bus.io_read(0xFEFE) & 0x01, 0x00);
        assert_eq!(bus.io_read(0x7FFE) & 0x01, 0x01);
    }

    #[test]
    fn ear_bit_follows_tape_then_output() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        assert_eq!(bus.io_read(0xFFFE) & 0x40, 0);
        bus.io_write(0x00FE, 0x10);
        assert_eq!(bus.io_read(0xFFFE) & 0x40, 0x40);
        bus.tape_ear = Some(false);
        assert_eq!(bus.io_read(0xFFFE) & 0x40, 0);
        bus.tape_ear = Some(true);
        assert_eq!(bus.io_read(0xFFFE) & 0xE0, 0xE0);
    }

    #[test]
    fn border_and_beeper_via_io() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        bus.io_write(0x00FE, 0x1A);
        assert_eq!(bus.ula.border(), 2);
        assert!(bus.ear_out());
        assert!(bus.mic_out());
    }

    #[test]
    fn kempston_port() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        bus.input.apply(SpectrumKey::JoyFire.code(), true);
        assert_eq!(bus.io_read(0x001F), 0x10);
    }

    #[test]
    fn unattached_port_floats_outside_paper() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        bus.begin_instruction(0);
        assert_eq!(bus.io_read(0x00FF), 0xFF);
    }

    #[test]
    fn unattached_port_reads_attribute_during_fetch() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        bus.write(0x5800, 0x47);
        // The read cycle samples the bus four T-states after it starts.
        bus.begin_instruction(64 * 224 + 1 - 4);
        assert_eq!(bus.io_read(0x00FF), 0x47);
    }

    #[test]
    fn contended_read_adds_wait_states() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        let start = TIMING_48K.first_paper_line * TIMING_48K.tstates_per_line;
        bus.begin_instruction(start);
        bus.read(0x4000);
        assert_eq!(bus.take_wait(), 6);
        bus.begin_instruction(start);
        bus.read(0x8000);
        assert_eq!(bus.take_wait(), 0);
    }

    #[test]
    fn paging_port_only_on_128k() {
        let mut bus = make_bus(SpectrumModel::Spectrum128K);
        bus.io_write(0x7FFD, 0x04);
        bus.write(0xC000, 0x44);
        assert_eq!(bus.memory.bank(4)[0], 0x44);
        // A contended bank at $C000 is timed like $4000.
        bus.io_write(0x7FFD, 0x01);
        let start = TIMING_128K.first_paper_line * TIMING_128K.tstates_per_line;
        bus.begin_instruction(start);
        bus.read(0xC000);
        assert_eq!(bus.take_wait(), 6);

        let mut bus48 = make_bus(SpectrumModel::Spectrum48K);
        bus48.io_write(0x7FFD, 0x04);
        assert_eq!(bus48.memory.port_7ffd(), 0);
    }

    #[test]
    fn port_1ffd_mirrors_7ffd_unless_plus2a_paging() {
        let mut bus = make_bus(SpectrumModel::Spectrum128K);
        bus.io_write(0x1FFD, 0x03);
        assert_eq!(bus.memory.port_7ffd(), 0x03);
        assert_eq!(bus.memory.port_1ffd(), 0);

        let mut bus = make_bus(SpectrumModel::Spectrum128K);
        bus.plus2a_paging = true;
        bus.io_write(0x1FFD, 0x03);
        assert_eq!(bus.memory.port_7ffd(), 0);
        assert_eq!(bus.memory.port_1ffd(), 0x03);
        assert!(bus.memory.all_ram());
        bus.write(0x0000, 0x5A);
        assert_eq!(bus.read(0x0000), 0x5A);
        assert_eq!(bus.memory.bank(4)[0], 0x5A);
        // $7FFD still decodes.
        bus.io_write(0x7FFD, 0x07);
        assert_eq!(bus.memory.port_7ffd(), 0x07);
    }

    #[test]
    fn ay_select_write_read() {
        let mut bus = make_bus(SpectrumModel::Spectrum128K);
        bus.io_write(0xFFFD, 7);
        bus.io_write(0xBFFD, 0x38);
        assert_eq!(bus.io_read(0xFFFD), 0x38);
    }

    #[test]
    fn border_change_renders_earlier_lines() {
        let mut bus = make_bus(SpectrumModel::Spectrum48K);
        bus.io_write(0x00FE, 0x01);
        bus.begin_instruction(200 * 224);
        bus.io_write(0x00FE, 0x04);
        bus.ula.end_frame(bus.memory.screen());
        let fb = bus.ula.framebuffer();
        let row = |y: usize| fb[y * 320];
        assert_eq!(row(0), sinclair_ula::PALETTE[1]);
        assert_eq!(row(255), sinclair_ula::PALETTE[4]);
    }
}
