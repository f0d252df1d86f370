//! Mono audio output: level integration and low-pass resampling.
//!
//! The machine reports its mixed output level for every stretch of
//! T-states. Levels are averaged into intermediate samples of 42 T-states
//! (4x the output rate), passed through a 64-tap windowless sinc low-pass
//! filter and decimated by 4, giving one output sample per 168 T-states.

#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};

/// T-states per output sample.
pub const TSTATES_PER_SAMPLE: u32 = 168;

const OVERSAMPLE: u32 = 4;
const TSTATES_PER_STEP: u32 = TSTATES_PER_SAMPLE / OVERSAMPLE;
const FILTER_TAPS: usize = 64;

/// Output levels of each source, summed into the speaker level.
pub const BEEPER_LEVEL: f32 = 0.5;
pub const MIC_LEVEL: f32 = 0.05;
pub const TAPE_LEVEL: f32 = 0.15;
pub const AY_LEVEL: f32 = 0.3;

/// Output sample rate for a CPU clock.
#[must_use]
pub fn sample_rate(cpu_clock: u32) -> u32 {
    cpu_clock / TSTATES_PER_SAMPLE
}

/// Normalized sinc kernel with its cut-off at the output Nyquist rate.
fn kernel() -> Vec<f32> {
    let step = std::f32::consts::PI / 2.0 / OVERSAMPLE as f32;
    let mut taps: Vec<f32> = (0..FILTER_TAPS)
        .map(|i| {
            let x = (2.0 * i as f32 + 1.0 - FILTER_TAPS as f32) * (step / 2.0);
            if x == 0.0 { 1.0 } else { x.sin() / x }
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    for tap in &mut taps {
        *tap /= sum;
    }
    taps
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    #[serde(skip, default = "kernel")]
    kernel: Vec<f32>,
    /// Ring of the last 64 intermediate samples.
    history: Vec<f32>,
    head: usize,
    /// T-states and level-weighted sum of the intermediate sample in
    /// progress.
    pending_t: u32,
    pending_sum: f32,
    /// Filtered samples not yet handed out.
    output: Vec<f32>,
}

impl Default for Speaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Speaker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            kernel: kernel(),
            history: vec![0.0; FILTER_TAPS],
            head: 0,
            pending_t: 0,
            pending_sum: 0.0,
            output: Vec::new(),
        }
    }

    /// Hold `level` for `tstates`.
    pub fn push(&mut self, level: f32, tstates: u32) {
        let mut remaining = tstates;
        while remaining > 0 {
            let take = remaining.min(TSTATES_PER_STEP - self.pending_t);
            self.pending_t += take;
            self.pending_sum += level * take as f32;
            remaining -= take;
            if self.pending_t == TSTATES_PER_STEP {
                let sample = self.pending_sum / TSTATES_PER_STEP as f32;
                self.pending_t = 0;
                self.pending_sum = 0.0;
                self.push_intermediate(sample);
            }
        }
    }

    fn push_intermediate(&mut self, sample: f32) {
        self.history[self.head] = sample;
        self.head = (self.head + 1) % FILTER_TAPS;
        if self.head % OVERSAMPLE as usize == 0 {
            // Oldest sample first, against the start of the kernel.
            let filtered = self
                .kernel
                .iter()
                .zip(self.history.iter().cycle().skip(self.head))
                .map(|(k, s)| k * s)
                .sum();
            self.output.push(filtered);
        }
    }

    /// Hand out exactly `frame_tstates / 168` samples for the frame just
    /// run, topping up with `level` if the frame fell short. Samples beyond
    /// the count stay queued for the next frame.
    pub fn complete_frame(&mut self, frame_tstates: u32, level: f32) -> Vec<f32> {
        let count = (frame_tstates / TSTATES_PER_SAMPLE) as usize;
        while self.output.len() < count {
            let fill = TSTATES_PER_STEP - self.pending_t;
            self.push(level, fill);
        }
        self.output.drain(..count).collect()
    }

    /// False for restored state whose ring position or partial step would
    /// index past the filter history.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.history.len() == FILTER_TAPS
            && self.head < FILTER_TAPS
            && self.pending_t < TSTATES_PER_STEP
            && self.output.len() <= FILTER_TAPS
            && self.pending_sum.is_finite()
            && self.history.iter().chain(&self.output).all(|s| s.is_finite())
    }

    /// Throw away queued output, as a turbo frame does.
    pub fn discard(&mut self) {
        self.output.clear();
        self.pending_t = 0;
        self.pending_sum = 0.0;
    }
}
