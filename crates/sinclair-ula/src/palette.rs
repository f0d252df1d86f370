//! ZX Spectrum 16-colour palette.
//!
//! Three RGB bits plus BRIGHT. Normal colours use a reduced intensity and
//! bright colours full intensity; black is the same in both halves.

/// ARGB32 palette, indexed by `bright << 3 | colour`.
pub const PALETTE: [u32; 16] = [
    0xFF00_0000, // black
    0xFF00_00D7, // blue
    0xFFD7_0000, // red
    0xFFD7_00D7, // magenta
    0xFF00_D700, // green
    0xFF00_D7D7, // cyan
    0xFFD7_D700, // yellow
    0xFFD7_D7D7, // white
    0xFF00_0000,
    0xFF00_00FF,
    0xFFFF_0000,
    0xFFFF_00FF,
    0xFF00_FF00,
    0xFF00_FFFF,
    0xFFFF_FF00,
    0xFFFF_FFFF,
];

/// Convert an ARGB32 colour to RGBA bytes.
#[must_use]
pub fn argb_to_rgba(argb: u32) -> [u8; 4] {
    let [a, r, g, b] = argb.to_be_bytes();
    [r, g, b, a]
}
