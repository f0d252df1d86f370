//! Sinclair ULA (Uncommitted Logic Array).
//!
//! The ULA generates the video signal, contends memory and I/O with the
//! CPU, and leaves its data-bus traffic visible on unattached ports. This
//! crate covers those three jobs; keyboard, beeper and paging are decoded
//! by the machine's bus.
//!
//! # Standalone IC
//!
//! The ULA never owns memory. The renderer reads the 6912-byte screen
//! area (bitmap then attributes) from a slice the caller passes in, so the
//! same code serves the 48K screen at `$4000` and the 128K shadow screen.
//!
//! # Frame timing
//!
//! | model | T-states/line | lines | T-states/frame | first paper line |
//! |-------|---------------|-------|----------------|------------------|
//! | 48K   | 224           | 312   | 69,888         | 64               |
//! | 128K  | 228           | 311   | 70,908         | 63               |
//!
//! # Framebuffer
//!
//! 320x256 ARGB32: the 256x192 paper with a 32-pixel border on each side.
//! Rows are drawn as the beam finishes each scanline, so a border change
//! mid-frame shows up at the right height.
//!
//! # Screen memory layout
//!
//! Bitmap offset: `0 Y7 Y6 Y2 Y1 Y0 Y5 Y4 Y3 X4 X3 X2 X1 X0`
//! Attribute offset: `0110 Y7 Y6 Y5 Y4 Y3 X4 X3 X2 X1 X0` (from `$1800`)

#![allow(clippy::cast_possible_truncation)]

mod palette;
mod timing;

pub use palette::{PALETTE, argb_to_rgba};
pub use timing::{
    PAPER_LINES, TIMING_48K, TIMING_128K, UlaTiming, attribute_offset, bitmap_offset,
};

use serde::{Deserialize, Serialize};

/// Framebuffer dimensions.
pub const FB_WIDTH: u32 = 320;
pub const FB_HEIGHT: u32 = 256;

/// Border width on every side.
const BORDER: u32 = 32;
const PAPER_WIDTH: u32 = 256;

/// Bitmap plus attributes.
pub const SCREEN_BYTES: usize = 6912;

/// Frames per flash phase.
const FLASH_FRAMES: u32 = 16;

/// Video half of the ULA: border latch, flash counter and the scanline
/// renderer.
///
/// The framebuffer is derived state and is not serialized; every frame
/// redraws all 256 rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ula {
    timing: UlaTiming,
    border: u8,
    frame_count: u32,
    /// Next framebuffer row to draw this frame.
    next_row: u32,
    #[serde(skip, default = "blank_framebuffer")]
    framebuffer: Vec<u32>,
}

fn blank_framebuffer() -> Vec<u32> {
    vec![PALETTE[0]; (FB_WIDTH * FB_HEIGHT) as usize]
}

impl Ula {
    #[must_use]
    pub fn new(timing: UlaTiming) -> Self {
        Self {
            timing,
            border: 7,
            frame_count: 0,
            next_row: 0,
            framebuffer: blank_framebuffer(),
        }
    }

    #[must_use]
    pub fn timing(&self) -> &UlaTiming {
        &self.timing
    }

    #[must_use]
    pub fn border(&self) -> u8 {
        self.border
    }

    /// Latch a new border colour (bits 0-2 of a ULA port write).
    ///
    /// Rows already drawn keep their colour, so callers bring the renderer
    /// up to date with [`Ula::render_until`] first.
    pub fn set_border(&mut self, colour: u8) {
        self.border = colour & 7;
    }

    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// True while FLASH attributes show ink and paper swapped.
    #[must_use]
    pub fn flash_inverted(&self) -> bool {
        (self.frame_count / FLASH_FRAMES) % 2 == 1
    }

    /// False when restored state holds a border colour or row position the
    /// renderer can't index.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.border < 8 && self.next_row <= FB_HEIGHT
    }

    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    /// Frame line shown on framebuffer row 0.
    fn top_line(&self) -> u32 {
        self.timing.first_paper_line - BORDER
    }

    /// Draw every row whose scanline has ended by frame T-state `t`.
    pub fn render_until(&mut self, t: u32, screen: &[u8]) {
        let tpl = self.timing.tstates_per_line;
        while self.next_row < FB_HEIGHT {
            let line = self.top_line() + self.next_row;
            if (line + 1) * tpl > t {
                break;
            }
            self.draw_row(self.next_row, screen);
            self.next_row += 1;
        }
    }

    /// Draw the rows not yet drawn and move on to the next frame.
    pub fn end_frame(&mut self, screen: &[u8]) {
        while self.next_row < FB_HEIGHT {
            self.draw_row(self.next_row, screen);
            self.next_row += 1;
        }
        self.next_row = 0;
        self.frame_count = self.frame_count.wrapping_add(1);
    }

    /// Redraw the whole framebuffer from `screen` without touching the
    /// frame position. Used after fast-forwarding without video.
    pub fn redraw(&mut self, screen: &[u8]) {
        for row in 0..FB_HEIGHT {
            self.draw_row(row, screen);
        }
    }

    fn draw_row(&mut self, row: u32, screen: &[u8]) {
        let start = (row * FB_WIDTH) as usize;
        let border = PALETTE[(self.border & 7) as usize];
        let flash = self.flash_inverted();
        let out = &mut self.framebuffer[start..start + FB_WIDTH as usize];

        let paper_row = row.checked_sub(BORDER).filter(|&y| y < PAPER_LINES);
        let Some(y) = paper_row else {
            out.fill(border);
            return;
        };

        out[..BORDER as usize].fill(border);
        out[(BORDER + PAPER_WIDTH) as usize..].fill(border);

        let y = y as u8;
        for col in 0..32u8 {
            let bits = screen_byte(screen, bitmap_offset(y, col));
            let attr = screen_byte(screen, attribute_offset(y, col));
            let (ink, paper) = attr_colours(attr, flash);
            let x = (BORDER + u32::from(col) * 8) as usize;
            for bit in 0..8 {
                out[x + bit] = if bits & (0x80 >> bit) != 0 { ink } else { paper };
            }
        }
    }
}

fn screen_byte(screen: &[u8], offset: u16) -> u8 {
    screen.get(offset as usize).copied().unwrap_or(0)
}

/// Ink and paper colours for an attribute byte.
#[must_use]
pub fn attr_colours(attr: u8, flash_inverted: bool) -> (u32, u32) {
    let bright = if attr & 0x40 != 0 { 8 } else { 0 };
    let ink = PALETTE[(attr & 0x07) as usize + bright];
    let paper = PALETTE[((attr >> 3) & 0x07) as usize + bright];
    if attr & 0x80 != 0 && flash_inverted {
        (paper, ink)
    } else {
        (ink, paper)
    }
}

/// Value an unattached port reads at frame T-state `t`: whatever the ULA
/// is fetching from `screen`, or `0xFF` when it is not fetching.
#[must_use]
pub fn floating_bus(timing: &UlaTiming, t: u32, screen: &[u8]) -> u8 {
    timing
        .fetch_address(t)
        .map_or(0xFF, |offset| screen_byte(screen, offset))
}
