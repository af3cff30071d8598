//! Draws the engine's state onto the grid.
//!
//! Varibright grids get layered levels; on/off grids get the same layout at full brightness, with blinking standing
//! in for the levels that mark a selection.

use super::{Engine, Mode, PortamentoToggle, SLEW_CV_OFF_THRESHOLD};
use crate::{
    configuration::EdgeMode,
    display::{EDGE_GLYPH, Frame, level},
    gesture::{GRID_HEIGHT, GRID_WIDTH},
    pattern::PATTERN_COUNT,
    preset::{CV_CHANNELS, PresetStorage},
    sequencer::RecordStatus,
};

/// Cells lit beside the root key to show the most recent shape, per shape row.
const SHAPE_TRAIL: [&[(i8, i8)]; 8] = [
    &[(0, -1)],
    &[(1, -1)],
    &[(1, 0)],
    &[(1, 1)],
    &[(0, -1), (0, -2)],
    &[(1, -1), (2, -2)],
    &[(1, 0), (2, 0)],
    &[(1, 1), (2, 2)],
];

/// Cells that blink around the root key while editing all rows.
const EDIT_ALL_CELLS: [(i8, i8); 4] = [(0, 0), (0, -1), (1, -1), (1, 0)];

const EDGE_MODES: [EdgeMode; 3] = [EdgeMode::Standard, EdgeMode::Fixed, EdgeMode::Drone];

/// Top-left corner of the edge glyphs and the pattern block.
const BLOCK_ORIGIN: u8 = 2;

/// First of the three rows showing CV or slew bars.
const BAR_ROW: u8 = 5;

impl<S: PresetStorage> Engine<S> {
    pub(super) fn render(&self, frame: &mut Frame) {
        frame.clear();
        if self.browse.active {
            self.render_presets(frame);
        } else {
            self.render_performance(frame);
        }
    }

    /// `varibright` on grids that have levels, full brightness otherwise.
    fn shade(&self, varibright: u8) -> u8 {
        if self.varibright { varibright } else { level::FULL }
    }

    /// Blinks on grids without levels, `varibright` otherwise.
    fn blink_or(&self, varibright: u8) -> u8 {
        if self.varibright {
            varibright
        } else {
            self.blinker.pick(level::FULL, level::OFF)
        }
    }

    fn render_presets(&self, frame: &mut Frame) {
        frame.set(0, self.browse.index, level::BRIGHT);
        for y in 0..8 {
            for x in 0..8 {
                if self.browse.glyph.is_set(x, y) {
                    frame.set(8 + x, y, level::BRIGHT);
                }
            }
        }
    }

    fn render_performance(&self, frame: &mut Frame) {
        if self.varibright {
            for x in 0..GRID_WIDTH {
                for y in 0..GRID_HEIGHT {
                    if self.preset.help(x, y) {
                        frame.set(x, y, level::DIM);
                    }
                }
            }
        }

        self.render_function_column(frame);

        match self.mode {
            Mode::Edge => self.render_edge(frame),
            Mode::Select | Mode::Bank => self.render_pattern_block(frame),
            Mode::Normal | Mode::Slew => self.render_state(frame),
        }

        match self.mode {
            Mode::Edge => frame.set(0, 5, level::FULL),
            Mode::Slew => frame.set(0, 6, level::FULL),
            _ => {}
        }
    }

    fn render_function_column(&self, frame: &mut Frame) {
        let pattern = self.preset.current_pattern();

        match self.sequencer.status() {
            RecordStatus::Armed => frame.set(0, 2, self.shade(level::MEDIUM)),
            RecordStatus::Recording if self.varibright => frame.set(0, 2, self.blinker.pick(level::FULL, level::BRIGHT)),
            RecordStatus::Recording => frame.set(0, 2, self.blinker.pick(level::FULL, level::OFF)),
            RecordStatus::Off => {}
        }
        if pattern.looping {
            frame.set(0, 3, self.shade(level::BRIGHT));
        }
        if self.preset.arp {
            frame.set(0, 4, self.shade(level::BRIGHT));
        }
        if self.mode == Mode::Bank {
            frame.set(0, 1, self.shade(level::BRIGHT));
        }

        if self.sequencer.is_playing() {
            for x in 0..self.progress() {
                frame.set(x, 0, self.shade(level::DIM));
            }
            if self.varibright {
                frame.set(0, 0, level::FULL);
            }
        } else if !pattern.is_empty() {
            frame.set(0, 0, self.shade(level::DIM));
        }

        match self.portamento.toggle {
            PortamentoToggle::Off => {}
            PortamentoToggle::Latched => frame.set(0, 7, self.shade(level::MEDIUM)),
            PortamentoToggle::Held => frame.set(0, 7, self.shade(level::BRIGHT)),
        }
    }

    /// Number of progress bar cells to light for the playing pattern.
    fn progress(&self) -> u8 {
        let total = self.preset.current_pattern().total_time();
        let cells = self
            .sequencer
            .elapsed()
            .saturating_mul(u32::from(GRID_WIDTH))
            .checked_div(total)
            .unwrap_or(0);
        cells.min(u32::from(GRID_WIDTH)) as u8
    }

    fn render_edge(&self, frame: &mut Frame) {
        for (band, (&mode, glyph)) in EDGE_MODES.iter().zip(EDGE_GLYPH.iter()).enumerate() {
            let level = if mode == self.preset.edge {
                self.blink_or(level::BRIGHT)
            } else {
                self.shade(level::MEDIUM)
            };
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..4 {
                    if bits >> col & 1 != 0 {
                        frame.set(BLOCK_ORIGIN + band as u8 * 5 + col, BLOCK_ORIGIN + row as u8, level);
                    }
                }
            }
        }

        if self.preset.edge == EdgeMode::Fixed {
            let bottom = GRID_HEIGHT - 1;
            if self.varibright {
                for x in 0..GRID_WIDTH {
                    frame.set(x, bottom, level::DIM);
                }
            }
            frame.set(self.preset.edge_fixed_time >> 4, bottom, self.shade(level::BRIGHT));
        }
    }

    fn render_pattern_block(&self, frame: &mut Frame) {
        for (index, pattern) in self.preset.patterns.iter().enumerate().take(PATTERN_COUNT) {
            let level = if pattern.is_empty() {
                self.shade(level::DIM)
            } else {
                self.shade(level::MEDIUM)
            };
            frame.set(BLOCK_ORIGIN + index as u8 % 4, BLOCK_ORIGIN + index as u8 / 4, level);
        }
        let selected = self.preset.pattern;
        frame.set(
            BLOCK_ORIGIN + selected % 4,
            BLOCK_ORIGIN + selected / 4,
            self.blink_or(level::FULL),
        );
    }

    fn render_state(&self, frame: &mut Frame) {
        let pattern = self.preset.current_pattern();
        let row = usize::from(self.preset.shape) % self.preset.slew.len();

        if self.preset.arp && !pattern.is_empty() {
            let (x, y) = pattern.anchor();
            if (0..i16::from(GRID_WIDTH)).contains(&x) && (0..i16::from(GRID_HEIGHT)).contains(&y) {
                frame.set(x as u8, y as u8, self.shade(level::MEDIUM));
            }
        }

        if self.portamento.active {
            for x in 0..=(self.preset.port_time >> 4) {
                frame.set(x, 1, self.shade(level::DIM));
            }
        }

        for channel in 0..CV_CHANNELS {
            let y = BAR_ROW + channel as u8;
            let output = self.ramps.channel(channel);
            let enabled = self.preset.slew[row][channel] < SLEW_CV_OFF_THRESHOLD;

            if self.mode == Mode::Slew {
                if !enabled {
                    continue;
                }
                let length = bar_cell(output.slew());
                if self.varibright {
                    for x in 0..length {
                        frame.set(x, y, level::DIM);
                    }
                }
                frame.set(length, y, self.shade(level::BRIGHT));
            } else {
                let (now, target) = (bar_cell(output.now()), bar_cell(output.target()));
                if self.varibright {
                    for x in now.min(target)..=now.max(target) {
                        frame.set(x, y, level::DIM);
                    }
                }
                let marker = if enabled { level::MEDIUM } else { level::DIM };
                frame.set(now, y, self.shade(marker));
            }
        }

        let root_level = if self.gate.is_high() {
            level::FULL
        } else {
            self.shade(level::BRIGHT)
        };
        frame.set(self.root.0, self.root.1, root_level);

        if self.edit_all {
            let level = if self.varibright {
                self.blinker.pick(level::BRIGHT, level::MEDIUM)
            } else {
                self.blinker.pick(level::FULL, level::OFF)
            };
            for (dx, dy) in EDIT_ALL_CELLS {
                frame.set_relative(self.root, dx, dy, level);
            }
        } else if !self.singled {
            let level = self.shade(level::BRIGHT);
            for &(dx, dy) in SHAPE_TRAIL[row] {
                frame.set_relative(self.root, dx, dy, level);
            }
        }
    }
}

/// Column showing a 12-bit value on a 16-cell bar.
fn bar_cell(value: u16) -> u8 {
    (value >> 8).min(u16::from(GRID_WIDTH - 1)) as u8
}
