//! Grid key handling: the function column, the mode state machine, shape keys and the preset browse screen, plus the
//! pot mapping used while the grid drives the engine.

use super::{Engine, Mode, PortamentoToggle};
use crate::{
    configuration::EdgeMode,
    gesture::{GRID_HEIGHT, GRID_WIDTH, Release},
    keys::{PORTAMENTO_KEY, Press},
    pattern::Step,
    pots::POT_COUNT,
    preset::{PresetStorage, SHAPE_ROWS},
    ramp::PITCH,
    sequencer::RecordStatus,
    tables::EXP,
};

/// Ramp length, in ramp periods, used to smooth CV edits from the pots.
const POT_SMOOTHING_STEPS: u16 = 5;

/// Function column rows.
mod function {
    pub const PLAY: u8 = 0;
    pub const SELECT: u8 = 1;
    pub const RECORD: u8 = 2;
    pub const LOOP: u8 = 3;
    pub const ARP: u8 = 4;
    pub const EDGE: u8 = 5;
    pub const SLEW: u8 = 6;
    pub const PORTAMENTO: u8 = 7;
}

/// Whether a cell lies in the 4×4 pattern-select block, and which pattern it picks.
fn pattern_cell(x: u8, y: u8) -> Option<u8> {
    ((2..6).contains(&x) && (2..6).contains(&y)).then(|| (y - 2) * 4 + (x - 2))
}

impl<S: PresetStorage> Engine<S> {
    pub(super) fn grid_key(&mut self, x: u8, y: u8, pressed: bool) {
        if x >= GRID_WIDTH || y >= GRID_HEIGHT {
            warn!("Ignoring key outside the grid at ({}, {})", x, y);
            return;
        }
        if self.is_midi() {
            debug!("Ignoring grid key while a MIDI controller is connected");
            return;
        }

        let press = if pressed {
            self.keys.press(x, y);
            None
        } else {
            Some(self.keys.release(x, y))
        };

        if press == Some(Press::Tap) {
            if self.browse.active {
                self.browse_tap(x, y);
            } else if (x, y) == PORTAMENTO_KEY && self.portamento.toggle != PortamentoToggle::Off {
                self.portamento.toggle = PortamentoToggle::Latched;
            }
        }

        if self.browse.active {
            if pressed && x >= 8 {
                self.browse.glyph.toggle(x - 8, y);
                self.dirty = true;
            }
        } else if x == 0 {
            self.function_key(y, pressed);
            self.dirty = true;
        } else if pressed {
            self.shape_key_down(x, y);
        } else {
            self.shape_key_up(x, y);
        }
    }

    fn browse_tap(&mut self, x: u8, y: u8) {
        if x != 0 {
            return;
        }
        if y != self.browse.index {
            self.browse.index = y;
            match self.storage.glyph(y) {
                Ok(glyph) => self.browse.glyph = glyph,
                Err(error) => error!("Could not read glyph {}: {}", y, error),
            }
        } else {
            if let Err(error) = self.load_preset(y) {
                error!("Could not load preset {}: {}", y, error);
            }
            self.restore_outputs();
            self.browse.active = false;
        }
        self.dirty = true;
    }

    fn function_key(&mut self, y: u8, pressed: bool) {
        match y {
            function::PLAY if pressed => self.play_key(),
            function::SELECT => self.select_key(pressed),
            function::RECORD => self.record_key(pressed),
            function::LOOP if pressed => {
                let pattern = self.preset.current_pattern_mut();
                pattern.looping = !pattern.looping;
            }
            function::ARP if pressed => self.preset.arp = !self.preset.arp,
            function::EDGE => {
                self.pots.reset();
                self.mode = if pressed { Mode::Edge } else { Mode::Normal };
            }
            function::SLEW => {
                self.pots.reset();
                self.mode = if pressed { Mode::Slew } else { Mode::Normal };
            }
            function::PORTAMENTO => self.portamento_key(pressed),
            _ => {}
        }
    }

    fn play_key(&mut self) {
        match self.sequencer.status() {
            RecordStatus::Recording => {
                self.sequencer.finish(self.preset.current_pattern_mut());
                self.preset.current_pattern_mut().looping = true;
                self.play();
            }
            RecordStatus::Armed => {
                self.sequencer.abandon();
                self.play();
            }
            RecordStatus::Off if self.arm_key => {
                self.play();
                self.selected = true;
            }
            RecordStatus::Off if self.mode == Mode::Select => self.mode = Mode::Bank,
            RecordStatus::Off if self.sequencer.is_playing() => self.stop(),
            RecordStatus::Off => self.play(),
        }
    }

    fn select_key(&mut self, pressed: bool) {
        match (pressed, self.mode == Mode::Bank) {
            (true, false) => {
                self.sequencer.abandon();
                self.mode = Mode::Select;
            }
            (true, true) | (false, false) => self.mode = Mode::Normal,
            // releasing the key leaves Bank mode latched
            (false, true) => {}
        }
    }

    /// Press cancels an armed or running recording; a release that cancelled nothing arms one.
    fn record_key(&mut self, pressed: bool) {
        self.arm_key = pressed;
        if pressed {
            match self.sequencer.status() {
                RecordStatus::Off => self.selected = false,
                RecordStatus::Armed => {
                    self.sequencer.abandon();
                    self.selected = true;
                }
                RecordStatus::Recording => {
                    self.sequencer.finish(self.preset.current_pattern_mut());
                    self.selected = true;
                }
            }
        } else if self.sequencer.status() == RecordStatus::Off && !self.selected {
            self.stop();
            self.sequencer.arm();
            if self.mode == Mode::Bank {
                self.mode = Mode::Normal;
            }
        }
    }

    /// Holding the key enables portamento and lets the first pot set its time; a tap latches it on until the next
    /// press.
    fn portamento_key(&mut self, pressed: bool) {
        self.pots.reset();

        if self.mode == Mode::Edge {
            self.preset.edge_fixed_time = 0;
            return;
        }

        if pressed {
            if self.portamento.toggle == PortamentoToggle::Latched {
                self.disable_portamento();
            } else {
                self.portamento.toggle = PortamentoToggle::Held;
                self.portamento.active = true;
                self.portamento.editing = true;
                self.ramps
                    .set_slew(PITCH, EXP[usize::from(self.preset.port_time)]);
            }
        } else {
            self.portamento.editing = false;
            if self.portamento.toggle == PortamentoToggle::Held {
                self.disable_portamento();
            }
        }
    }

    fn disable_portamento(&mut self) {
        self.portamento.active = false;
        self.portamento.toggle = PortamentoToggle::Off;
        self.ramps.set_slew(PITCH, 0);
    }

    fn shape_key_down(&mut self, x: u8, y: u8) {
        self.recognizer.press(x, y);

        if self.edit_all {
            self.pots.reset();
            self.edit_all = false;
        }

        if self.mode == Mode::Slew {
            self.preset.toggle_help(x, y);
        }

        match self.mode {
            Mode::Edge => {
                self.recognizer.cancel();
                self.pots.reset();
                if y == GRID_HEIGHT - 1 {
                    self.preset.edge_fixed_time = x.saturating_mul(16);
                } else {
                    self.preset.edge = EdgeMode::from_column(x);
                }
            }
            Mode::Select | Mode::Bank => {
                if let Some(pattern) = pattern_cell(x, y) {
                    self.stop();
                    self.preset.pattern = pattern;
                    if self.mode == Mode::Bank {
                        self.play();
                    }
                }
            }
            Mode::Normal | Mode::Slew => {
                if let Some(gesture) = self.recognizer.detect(x, y, self.keys.count()) {
                    self.gesture(gesture);
                }
            }
        }
        self.dirty = true;
    }

    fn shape_key_up(&mut self, x: u8, y: u8) {
        let Release::AllReleased { pending } = self.recognizer.release(x, y) else {
            return;
        };

        if let Some(gesture) = pending {
            self.gesture(gesture);
        }

        if self.preset.edge == EdgeMode::Standard {
            if self.sequencer.status() == RecordStatus::Recording {
                self.sequencer
                    .capture(self.preset.current_pattern_mut(), Step::Release, x, y);
            }
            self.gate.lower();
        }
        self.dirty = true;
    }

    /// Applies pot moves while the grid drives the engine.
    pub(super) fn grid_pots(&mut self, values: [Option<u16>; POT_COUNT]) {
        for (pot, value) in values.into_iter().enumerate() {
            let Some(value) = value else {
                continue;
            };

            if self.portamento.editing {
                if pot == 0 {
                    self.set_portamento_time(value);
                }
            } else if self.edit_all {
                match self.mode {
                    Mode::Normal => {
                        for row in 0..SHAPE_ROWS {
                            self.preset.cv[row][pot] = value;
                        }
                        self.ramps.retarget(pot, value, POT_SMOOTHING_STEPS);
                    }
                    Mode::Slew => {
                        for row in 0..SHAPE_ROWS {
                            self.preset.slew[row][pot] = value;
                        }
                        self.ramps.set_slew(pot, value);
                    }
                    _ => {}
                }
            } else {
                let row = usize::from(self.preset.shape) % SHAPE_ROWS;
                match self.mode {
                    Mode::Normal => {
                        self.preset.cv[row][pot] = value;
                        self.ramps.retarget(pot, value, POT_SMOOTHING_STEPS);
                    }
                    Mode::Slew => {
                        self.preset.slew[row][pot] = value;
                        self.ramps.set_slew(pot, value);
                    }
                    Mode::Edge if pot == 0 => self.preset.edge_fixed_time = (value >> 4).min(255) as u8,
                    _ => {}
                }
            }
            self.dirty = true;
        }
    }

    /// Sets the portamento time code from a pot value and applies it to the pitch output.
    pub(super) fn set_portamento_time(&mut self, value: u16) {
        self.preset.port_time = (value >> 4).min(255) as u8;
        self.ramps
            .set_slew(PITCH, EXP[usize::from(self.preset.port_time)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_block_corners() {
        assert_eq!(Some(0), pattern_cell(2, 2), "Expected left but got right");
        assert_eq!(Some(3), pattern_cell(5, 2), "Expected left but got right");
        assert_eq!(Some(12), pattern_cell(2, 5), "Expected left but got right");
        assert_eq!(Some(15), pattern_cell(5, 5), "Expected left but got right");
    }

    #[test]
    fn pattern_block_excludes_surroundings() {
        assert_eq!(None, pattern_cell(1, 2), "Expected left but got right");
        assert_eq!(None, pattern_cell(6, 3), "Expected left but got right");
        assert_eq!(None, pattern_cell(3, 6), "Expected left but got right");
    }
}
