//! General Instrument AY-3-8910 Programmable Sound Generator.
//!
//! Three square-wave tone generators, a shared noise generator, a shared
//! envelope generator and a per-channel mixer. The chip is clocked in input
//! cycles (half the CPU clock on the Spectrum 128) and sampled on demand:
//! the owning machine decides when and how often to read [`Ay3_8910::output`].
//!
//! # Register map
//!
//! | Reg | Name      | Bits |
//! |-----|-----------|------|
//! | R0  | A fine    | 7-0  |
//! | R1  | A coarse  | 3-0  |
//! | R2  | B fine    | 7-0  |
//! | R3  | B coarse  | 3-0  |
//! | R4  | C fine    | 7-0  |
//! | R5  | C coarse  | 3-0  |
//! | R6  | Noise     | 4-0  |
//! | R7  | Mixer     | 7-0  |
//! | R8  | A volume  | 4-0  |
//! | R9  | B volume  | 4-0  |
//! | R10 | C volume  | 4-0  |
//! | R11 | Env fine  | 7-0  |
//! | R12 | Env coarse| 7-0  |
//! | R13 | Env shape | 3-0  |
//! | R14 | Port A    | 7-0  |
//! | R15 | Port B    | 7-0  |

use serde::{Deserialize, Serialize};

/// Logarithmic DAC levels, normalised to 0.0–1.0.
const VOLUME_TABLE: [f32; 16] = [
    0.0000, 0.0137, 0.0205, 0.0291,
    0.0423, 0.0618, 0.0847, 0.1369,
    0.1691, 0.2647, 0.3527, 0.4499,
    0.5765, 0.7258, 0.8819, 1.0000,
];

/// Bits that exist in each register; the rest read back as zero.
const REGISTER_MASK: [u8; 16] = [
    0xFF, 0x0F, 0xFF, 0x0F, 0xFF, 0x0F, 0x1F, 0xFF,
    0x1F, 0x1F, 0x1F, 0xFF, 0xFF, 0x0F, 0xFF, 0xFF,
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Tone {
    period: u16,
    counter: u16,
    output: bool,
}

impl Tone {
    /// One tick at input / 8. A zero period behaves as one.
    fn clock(&mut self) {
        self.counter += 1;
        if self.counter >= self.period.max(1) {
            self.counter = 0;
            self.output = !self.output;
        }
    }
}

/// 17-bit LFSR with a 5-bit period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Noise {
    period: u8,
    counter: u8,
    lfsr: u32,
    output: bool,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            period: 0,
            counter: 0,
            lfsr: 1,
            output: false,
        }
    }
}

impl Noise {
    fn clock(&mut self) {
        self.counter += 1;
        // The noise counter runs at half the tone rate.
        if self.counter >= self.period.max(1) * 2 {
            self.counter = 0;
            let feedback = (self.lfsr ^ (self.lfsr >> 3)) & 1;
            self.lfsr = (self.lfsr >> 1) | (feedback << 16);
            self.output = self.lfsr & 1 != 0;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Envelope {
    period: u16,
    counter: u16,
    step: u8,
    holding: bool,
    attack: bool,
    shape: u8,
}

impl Envelope {
    /// One tick at input / 16.
    fn clock(&mut self) {
        if self.holding {
            return;
        }
        self.counter += 1;
        if self.counter >= self.period.max(1) {
            self.counter = 0;
            self.step_envelope();
        }
    }

    fn step_envelope(&mut self) {
        self.step += 1;
        if self.step < 16 {
            return;
        }

        let cont = self.shape & 0x08 != 0;
        let alt = self.shape & 0x02 != 0;
        let hold = self.shape & 0x01 != 0;

        if !cont {
            // Shapes 0-7 fall to zero and stay there.
            self.holding = true;
            self.step = 15;
            self.attack = false;
        } else if hold {
            self.holding = true;
            self.step = 15;
            if alt {
                self.attack = !self.attack;
            }
        } else {
            self.step = 0;
            if alt {
                self.attack = !self.attack;
            }
        }
    }

    /// Writing R13 restarts the envelope.
    fn restart(&mut self, shape: u8) {
        self.shape = shape & 0x0F;
        self.step = 0;
        self.counter = 0;
        self.holding = false;
        self.attack = shape & 0x04 != 0;
    }

    fn level(&self) -> u8 {
        if self.holding && self.shape & 0x08 == 0 {
            return 0;
        }
        if self.attack { self.step } else { 15 - self.step }
    }
}

/// AY-3-8910 Programmable Sound Generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ay3_8910 {
    regs: [u8; 16],
    selected: u8,
    tone: [Tone; 3],
    noise: Noise,
    envelope: Envelope,
    /// Input cycles since the last /8 tick.
    divider: u8,
    /// Alternates /8 ticks so the envelope runs at /16.
    envelope_phase: bool,
}

impl Default for Ay3_8910 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ay3_8910 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: [0; 16],
            selected: 0,
            tone: Default::default(),
            noise: Noise::default(),
            envelope: Envelope::default(),
            divider: 0,
            envelope_phase: false,
        }
    }

    /// Power-on state: all registers cleared.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Select a register by index. Only the low four bits are decoded.
    pub fn select_register(&mut self, reg: u8) {
        self.selected = reg & 0x0F;
    }

    #[must_use]
    pub fn selected_register(&self) -> u8 {
        self.selected
    }

    /// Write to the selected register.
    pub fn write_data(&mut self, value: u8) {
        let reg = usize::from(self.selected);
        let value = value & REGISTER_MASK[reg];
        self.regs[reg] = value;

        match reg {
            0..=5 => {
                let ch = reg / 2;
                self.tone[ch].period =
                    u16::from(self.regs[ch * 2]) | (u16::from(self.regs[ch * 2 + 1]) << 8);
            }
            6 => self.noise.period = value,
            11 | 12 => {
                self.envelope.period = u16::from(self.regs[11]) | (u16::from(self.regs[12]) << 8);
            }
            13 => self.envelope.restart(value),
            _ => {}
        }
    }

    /// Read the selected register.
    #[must_use]
    pub fn read_data(&self) -> u8 {
        self.regs[usize::from(self.selected)]
    }

    /// The full register file, for snapshots.
    #[must_use]
    pub fn registers(&self) -> [u8; 16] {
        self.regs
    }

    /// Load a register file as if each register were written in turn, then
    /// reselect `selected`.
    pub fn load_registers(&mut self, selected: u8, regs: &[u8; 16]) {
        for (reg, &value) in (0u8..).zip(regs.iter()) {
            self.select_register(reg);
            self.write_data(value);
        }
        self.select_register(selected);
    }

    /// True when every latch is in a range the chip can reach: registers
    /// inside their masks, generator periods matching the registers and
    /// counters short of overflow. Restored state is checked with this
    /// before it replaces a running chip.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let regs_masked = self.regs.iter().zip(REGISTER_MASK).all(|(&r, m)| r & !m == 0);
        let tones = self.tone.iter().enumerate().all(|(ch, tone)| {
            let period = u16::from(self.regs[ch * 2]) | (u16::from(self.regs[ch * 2 + 1]) << 8);
            tone.period == period && tone.counter <= 0x0FFF
        });
        let envelope_period = u16::from(self.regs[11]) | (u16::from(self.regs[12]) << 8);
        regs_masked
            && usize::from(self.selected) < self.regs.len()
            && tones
            && self.noise.period == self.regs[6]
            && self.noise.counter < 0x40
            && self.noise.lfsr < 1 << 17
            && self.envelope.period == envelope_period
            && self.envelope.counter < u16::MAX
            && self.envelope.step < 16
            && self.envelope.shape == self.regs[13]
            && self.divider < 8
    }

    /// Advance by `cycles` input clock cycles.
    pub fn clock(&mut self, cycles: u32) {
        let mut remaining = cycles + u32::from(self.divider);
        while remaining >= 8 {
            remaining -= 8;
            for tone in &mut self.tone {
                tone.clock();
            }
            self.noise.clock();
            self.envelope_phase = !self.envelope_phase;
            if !self.envelope_phase {
                self.envelope.clock();
            }
        }
        self.divider = remaining as u8;
    }

    /// Current mixed output level, 0.0–1.0.
    #[must_use]
    pub fn output(&self) -> f32 {
        let mixer = self.regs[7];
        let mut sum = 0.0;
        for ch in 0..3 {
            let tone_off = mixer & (1 << ch) != 0;
            let noise_off = mixer & (1 << (ch + 3)) != 0;
            if (self.tone[ch].output || tone_off) && (self.noise.output || noise_off) {
                sum += VOLUME_TABLE[usize::from(self.channel_level(ch))];
            }
        }
        sum / 3.0
    }

    fn channel_level(&self, ch: usize) -> u8 {
        let vol = self.regs[8 + ch];
        if vol & 0x10 != 0 {
            self.envelope.level()
        } else {
            vol & 0x0F
        }
    }
}
