//! ZX Spectrum keyboard and Kempston joystick.
//!
//! The keyboard is an 8x5 matrix of half-rows, read via port $FE. The high
//! byte of the port address selects which half-rows to scan: each cleared
//! bit (A8-A15) enables one half-row, and the selected rows are ANDed.
//!
//! | Addr bit | Row | Keys (bit 0-4)                |
//! |----------|-----|-------------------------------|
//! | A8       | 0   | Shift, Z, X, C, V             |
//! | A9       | 1   | A, S, D, F, G                 |
//! | A10      | 2   | Q, W, E, R, T                 |
//! | A11      | 3   | 1, 2, 3, 4, 5                 |
//! | A12      | 4   | 0, 9, 8, 7, 6                 |
//! | A13      | 5   | P, O, I, U, Y                 |
//! | A14      | 6   | Enter, L, K, J, H             |
//! | A15      | 7   | Space, Sym, M, N, B           |
//!
//! # Key codes
//!
//! Hosts name keys with packed codes. Each non-zero byte of a code is one
//! key: bits 0-2 select the bit within the row and bits 4-7 the row, with
//! row 8 standing for the Kempston joystick. Bit 3 is ignored, which lets
//! row 0 bit 0 (Caps Shift) be written `0x08`. Up to four keys fit in one
//! code, so shifted keys can be sent as a single event.

use serde::{Deserialize, Serialize};

/// Row number used for the Kempston joystick in key codes.
const KEMPSTON_ROW: u32 = 8;

/// Logical key: the 40 keyboard keys plus the five Kempston directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumKey {
    CapsShift,
    Z,
    X,
    C,
    V,
    A,
    S,
    D,
    F,
    G,
    Q,
    W,
    E,
    R,
    T,
    N1,
    N2,
    N3,
    N4,
    N5,
    N0,
    N9,
    N8,
    N7,
    N6,
    P,
    O,
    I,
    U,
    Y,
    Enter,
    L,
    K,
    J,
    H,
    Space,
    SymShift,
    M,
    N,
    B,
    JoyRight,
    JoyLeft,
    JoyDown,
    JoyUp,
    JoyFire,
}

impl SpectrumKey {
    /// (row, bit) in the matrix; row 8 is the joystick.
    #[must_use]
    pub const fn matrix(self) -> (u8, u8) {
        match self {
            Self::CapsShift => (0, 0),
            Self::Z => (0, 1),
            Self::X => (0, 2),
            Self::C => (0, 3),
            Self::V => (0, 4),

            Self::A => (1, 0),
            Self::S => (1, 1),
            Self::D => (1, 2),
            Self::F => (1, 3),
            Self::G => (1, 4),

            Self::Q => (2, 0),
            Self::W => (2, 1),
            Self::E => (2, 2),
            Self::R => (2, 3),
            Self::T => (2, 4),

            Self::N1 => (3, 0),
            Self::N2 => (3, 1),
            Self::N3 => (3, 2),
            Self::N4 => (3, 3),
            Self::N5 => (3, 4),

            Self::N0 => (4, 0),
            Self::N9 => (4, 1),
            Self::N8 => (4, 2),
            Self::N7 => (4, 3),
            Self::N6 => (4, 4),

            Self::P => (5, 0),
            Self::O => (5, 1),
            Self::I => (5, 2),
            Self::U => (5, 3),
            Self::Y => (5, 4),

            Self::Enter => (6, 0),
            Self::L => (6, 1),
            Self::K => (6, 2),
            Self::J => (6, 3),
            Self::H => (6, 4),

            Self::Space => (7, 0),
            Self::SymShift => (7, 1),
            Self::M => (7, 2),
            Self::N => (7, 3),
            Self::B => (7, 4),

            Self::JoyRight => (8, 0),
            Self::JoyLeft => (8, 1),
            Self::JoyDown => (8, 2),
            Self::JoyUp => (8, 3),
            Self::JoyFire => (8, 4),
        }
    }

    /// Packed key code for this key.
    #[must_use]
    pub const fn code(self) -> u32 {
        let (row, bit) = self.matrix();
        let code = (row as u32) << 4 | bit as u32;
        if code == 0 { 0x08 } else { code }
    }
}

/// Combine keys into one code, first key in the low byte.
#[must_use]
pub fn chord(keys: &[SpectrumKey]) -> u32 {
    keys.iter()
        .take(4)
        .enumerate()
        .fold(0, |acc, (i, key)| acc | key.code() << (8 * i))
}

/// Keyboard half-rows and joystick byte.
///
/// Stored active-high (1 = pressed); `read` inverts for port $FE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    rows: [u8; 8],
    kempston: u8,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Press or release every key named by a packed code.
    pub fn apply(&mut self, code: u32, pressed: bool) {
        let mut keys = code;
        while keys != 0 {
            let byte = keys & 0xFF;
            keys >>= 8;
            if byte == 0 {
                continue;
            }
            let row = byte >> 4;
            let bit = (byte & 0x07) as u8;
            let target = match row {
                KEMPSTON_ROW => &mut self.kempston,
                r if r < KEMPSTON_ROW && bit < 5 => &mut self.rows[r as usize],
                _ => continue,
            };
            if pressed {
                *target |= 1 << bit;
            } else {
                *target &= !(1 << bit);
            }
        }
    }

    /// Keyboard bits for a port $FE read with high address byte `addr_high`:
    /// bits 0-4 active low, bits 5-7 set.
    #[must_use]
    pub fn read(&self, addr_high: u8) -> u8 {
        let mut result = 0xFF;
        for (i, &row) in self.rows.iter().enumerate() {
            if addr_high & (1 << i) == 0 {
                result &= !row;
            }
        }
        result | 0xE0
    }

    /// Kempston port value, active high.
    #[must_use]
    pub fn kempston(&self) -> u8 {
        self.kempston
    }

    /// Release every key and centre the joystick.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
