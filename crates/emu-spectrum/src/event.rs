//! Events a machine hands back to its host.

/// A finished frame: `width` x `height` ARGB pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Frame {
    /// Pixels as RGBA bytes, the layout canvas APIs expect.
    #[must_use]
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&argb| sinclair_ula::argb_to_rgba(argb))
            .collect()
    }
}

/// Mono samples for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    FrameReady(Frame),
    AudioReady(AudioBuffer),
    /// The selectable block under the tape head changed; `None` when the
    /// tape ran out.
    TapeBlockChanged(Option<usize>),
}
