//! The grid's LED frame buffer.

use crate::gesture::{GRID_HEIGHT, GRID_WIDTH};

/// Number of cells in a [`Frame`].
pub const FRAME_LEN: usize = GRID_WIDTH as usize * GRID_HEIGHT as usize;

/// Brightness levels used by the renderer. Grids without varibright treat any nonzero level as on.
pub mod level {
    /// Unlit.
    pub const OFF: u8 = 0;
    /// Background marks: bars, breadcrumbs, empty slots.
    pub const DIM: u8 = 4;
    /// Secondary marks.
    pub const MEDIUM: u8 = 7;
    /// Active marks.
    pub const BRIGHT: u8 = 11;
    /// Full brightness.
    pub const FULL: u8 = 15;
}

/// Bitmaps for the three edge modes on the edge screen, four rows of four columns each (bit 0 is the leftmost).
pub const EDGE_GLYPH: [[u8; 4]; 3] = [[7, 5, 5, 13], [15, 9, 9, 9], [15, 0, 0, 0]];

/// Ticks in one blink cycle; lit for the first half.
const BLINK_PERIOD: u8 = 48;

/// One brightness level (0–15) per grid cell, row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    cells: [u8; FRAME_LEN],
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            cells: [level::OFF; FRAME_LEN],
        }
    }
}

impl Frame {
    /// Unlights every cell.
    pub fn clear(&mut self) {
        self.cells = [level::OFF; FRAME_LEN];
    }

    /// Sets a cell; positions off the grid are ignored.
    pub fn set(&mut self, x: u8, y: u8, level: u8) {
        if x < GRID_WIDTH && y < GRID_HEIGHT {
            self.cells[usize::from(y) * usize::from(GRID_WIDTH) + usize::from(x)] = level.min(level::FULL);
        }
    }

    /// Sets the cell at an offset from `origin`; positions off the grid are ignored.
    pub fn set_relative(&mut self, origin: (u8, u8), dx: i8, dy: i8, level: u8) {
        if let (Some(x), Some(y)) = (origin.0.checked_add_signed(dx), origin.1.checked_add_signed(dy)) {
            self.set(x, y, level);
        }
    }

    /// Returns a cell's level, or 0 off the grid.
    pub fn get(&self, x: u8, y: u8) -> u8 {
        if x < GRID_WIDTH && y < GRID_HEIGHT {
            self.cells[usize::from(y) * usize::from(GRID_WIDTH) + usize::from(x)]
        } else {
            level::OFF
        }
    }

    /// The frame as row-major levels.
    pub fn cells(&self) -> &[u8; FRAME_LEN] {
        &self.cells
    }

    /// Packs one 8×8 quadrant into a bitmap (byte per row, bit 0 leftmost) for grids without varibright.
    pub fn quadrant_bitmap(&self, quadrant: u8) -> [u8; 8] {
        let x0 = (quadrant % 2) * 8;
        core::array::from_fn(|row| {
            (0..8).fold(0, |bits, col| {
                if self.get(x0 + col, row as u8) > 0 {
                    bits | 1 << col
                } else {
                    bits
                }
            })
        })
    }
}

/// A slow square wave for blinking cells, advanced by the sequencer tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Blinker {
    phase: u8,
}

impl Blinker {
    /// Advances one tick. Returns `true` when the blink state flips.
    pub fn advance(&mut self) -> bool {
        self.phase = (self.phase + 1) % BLINK_PERIOD;
        self.phase == 0 || self.phase == BLINK_PERIOD / 2
    }

    /// Returns `true` during the lit half of the cycle.
    pub fn is_lit(&self) -> bool {
        self.phase < BLINK_PERIOD / 2
    }

    /// Picks `on` while lit and `off` otherwise.
    pub fn pick(&self, on: u8, off: u8) -> u8 {
        if self.is_lit() { on } else { off }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_grid_writes_are_ignored() {
        let mut frame = Frame::default();
        frame.set(16, 0, level::FULL);
        frame.set(0, 8, level::FULL);
        frame.set_relative((0, 0), -1, 0, level::FULL);
        frame.set_relative((15, 7), 1, 1, level::FULL);
        assert_eq!(Frame::default(), frame);
    }

    #[test]
    fn relative_writes() {
        let mut frame = Frame::default();
        frame.set_relative((5, 5), 2, -2, level::BRIGHT);
        assert_eq!(level::BRIGHT, frame.get(7, 3), "Expected left but got right");
        assert_eq!(level::BRIGHT, frame.cells()[3 * 16 + 7]);
    }

    #[test]
    fn levels_clamp() {
        let mut frame = Frame::default();
        frame.set(1, 1, 200);
        assert_eq!(level::FULL, frame.get(1, 1));
    }

    #[test]
    fn quadrant_bitmaps() {
        let mut frame = Frame::default();
        frame.set(0, 0, level::DIM);
        frame.set(9, 2, level::FULL);
        assert_eq!([1, 0, 0, 0, 0, 0, 0, 0], frame.quadrant_bitmap(0));
        assert_eq!([0, 0, 2, 0, 0, 0, 0, 0], frame.quadrant_bitmap(1));
    }

    #[test]
    fn blinker_flips_twice_per_cycle() {
        let mut blinker = Blinker::default();
        let flips = (0..BLINK_PERIOD).filter(|_| blinker.advance()).count();
        assert_eq!(2, flips);
        assert!(blinker.is_lit());
    }
}
