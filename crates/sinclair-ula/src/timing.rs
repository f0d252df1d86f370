//! Frame geometry and contention for each ULA revision.
//!
//! All positions are CPU T-states from the start of the frame (the moment
//! INT is raised). A line is `tstates_per_line` long and the first 128
//! T-states of each paper line are when the ULA fetches screen memory.

use serde::{Deserialize, Serialize};

/// Paper lines per frame.
pub const PAPER_LINES: u32 = 192;

/// T-states of each line spent fetching screen data.
const FETCH_TSTATES: u32 = 128;

/// Wait states by position within an 8 T-state fetch group.
const CONTENTION_PATTERN: [u32; 8] = [6, 5, 4, 3, 2, 1, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UlaTiming {
    pub cpu_clock: u32,
    pub tstates_per_line: u32,
    pub lines_per_frame: u32,
    pub first_paper_line: u32,
}

/// 48K: 3.5 MHz, 224 T-states x 312 lines.
pub const TIMING_48K: UlaTiming = UlaTiming {
    cpu_clock: 3_500_000,
    tstates_per_line: 224,
    lines_per_frame: 312,
    first_paper_line: 64,
};

/// 128K: 3.5469 MHz, 228 T-states x 311 lines.
pub const TIMING_128K: UlaTiming = UlaTiming {
    cpu_clock: 3_546_900,
    tstates_per_line: 228,
    lines_per_frame: 311,
    first_paper_line: 63,
};

impl UlaTiming {
    #[must_use]
    pub const fn frame_tstates(&self) -> u32 {
        self.tstates_per_line * self.lines_per_frame
    }

    /// (paper row, T-state within the line) if `t` falls in a fetch window.
    fn fetch_position(&self, t: u32) -> Option<(u32, u32)> {
        let line = t / self.tstates_per_line;
        let col = t % self.tstates_per_line;
        let row = line.checked_sub(self.first_paper_line)?;
        (row < PAPER_LINES && col < FETCH_TSTATES).then_some((row, col))
    }

    /// Wait states for a contended memory access at frame T-state `t`.
    #[must_use]
    pub fn contention(&self, t: u32) -> u32 {
        self.fetch_position(t)
            .map_or(0, |(_, col)| CONTENTION_PATTERN[(col % 8) as usize])
    }

    /// Wait states for a 4 T-state I/O cycle starting at `t`.
    ///
    /// `ula_port` is an even port; `high_contended` means the high byte of
    /// the port address selects contended memory.
    ///
    /// | high contended | ULA port | pattern         |
    /// |----------------|----------|-----------------|
    /// | no             | no       | N:4             |
    /// | no             | yes      | N:1, C:3        |
    /// | yes            | yes      | C:1, C:3        |
    /// | yes            | no       | C:1, C:1, C:1, C:1 |
    #[must_use]
    pub fn io_contention(&self, t: u32, ula_port: bool, high_contended: bool) -> u32 {
        match (high_contended, ula_port) {
            (false, false) => 0,
            (false, true) => self.contention(t + 1),
            (true, true) => {
                let d0 = self.contention(t);
                d0 + self.contention(t + 1 + d0)
            }
            (true, false) => {
                let mut now = t;
                let mut total = 0;
                for _ in 0..4 {
                    let d = self.contention(now);
                    total += d;
                    now += d + 1;
                }
                total
            }
        }
    }

    /// Offset into the screen area (bitmap at 0, attributes at `$1800`)
    /// the ULA is reading at `t`, or `None` when the data bus is idle.
    ///
    /// Each 8 T-state group reads bitmap, attribute, bitmap+1, attribute+1
    /// and then leaves the bus idle for four T-states.
    #[must_use]
    pub fn fetch_address(&self, t: u32) -> Option<u16> {
        let (row, col) = self.fetch_position(t)?;
        let column = (col / 8) * 2 + (col % 8) / 2;
        let row = row as u8;
        match col % 8 {
            0 | 2 => Some(bitmap_offset(row, column as u8)),
            1 | 3 => Some(attribute_offset(row, column as u8)),
            _ => None,
        }
    }
}

/// Bitmap offset for pixel row `y`, character column `col`:
/// `0 Y7 Y6 Y2 Y1 Y0 Y5 Y4 Y3 X4..X0`.
#[must_use]
pub fn bitmap_offset(y: u8, col: u8) -> u16 {
    let y = u16::from(y);
    ((y & 0xC0) << 5) | ((y & 0x07) << 8) | ((y & 0x38) << 2) | u16::from(col & 0x1F)
}

/// Attribute offset for pixel row `y`, character column `col`.
#[must_use]
pub fn attribute_offset(y: u8, col: u8) -> u16 {
    0x1800 | ((u16::from(y) >> 3) << 5) | u16::from(col & 0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_lengths() {
        assert_eq!(TIMING_48K.frame_tstates(), 69_888);
        assert_eq!(TIMING_128K.frame_tstates(), 70_908);
    }

    #[test]
    fn contention_pattern_on_first_paper_line() {
        let start = 64 * 224;
        let delays: Vec<u32> = (0..9).map(|i| TIMING_48K.contention(start + i)).collect();
        assert_eq!(delays, [6, 5, 4, 3, 2, 1, 0, 0, 6]);
    }

    #[test]
    fn no_contention_in_border_or_retrace() {
        assert_eq!(TIMING_48K.contention(0), 0);
        assert_eq!(TIMING_48K.contention(64 * 224 - 1), 0);
        assert_eq!(TIMING_48K.contention(64 * 224 + 128), 0);
        assert_eq!(TIMING_48K.contention(256 * 224), 0);
        assert_eq!(TIMING_128K.contention(63 * 228), 6);
    }

    #[test]
    fn io_contention_patterns() {
        let t = 64 * 224 + 1;
        assert_eq!(TIMING_48K.io_contention(t, false, false), 0);
        assert_eq!(TIMING_48K.io_contention(t, true, false), 4);
        // 5 at t, then t+6 sits at pattern index 7
        assert_eq!(TIMING_48K.io_contention(t, true, true), 5);
        // 5, then 0 at +6, 6 at +8, 0 at +15
        assert_eq!(TIMING_48K.io_contention(t, false, true), 11);
    }

    #[test]
    fn fetch_addresses_follow_the_group() {
        let start = 64 * 224 + 8;
        assert_eq!(TIMING_48K.fetch_address(start), Some(0x0002));
        assert_eq!(TIMING_48K.fetch_address(start + 1), Some(0x1802));
        assert_eq!(TIMING_48K.fetch_address(start + 2), Some(0x0003));
        assert_eq!(TIMING_48K.fetch_address(start + 3), Some(0x1803));
        assert_eq!(TIMING_48K.fetch_address(start + 4), None);
        assert_eq!(TIMING_48K.fetch_address(0), None);
    }

    #[test]
    fn screen_address_interleave() {
        assert_eq!(bitmap_offset(0, 0), 0x0000);
        assert_eq!(bitmap_offset(1, 0), 0x0100);
        assert_eq!(bitmap_offset(8, 0), 0x0020);
        assert_eq!(bitmap_offset(64, 31), 0x081F);
        assert_eq!(bitmap_offset(191, 31), 0x17FF);
        assert_eq!(attribute_offset(191, 31), 0x1AFF);
    }
}
