//! Turns recognized gestures and pattern cues into output changes.

use super::{Engine, SLEW_CV_OFF_THRESHOLD};
use crate::{
    configuration::EdgeMode,
    gesture::{GRID_HEIGHT, Gesture, MetaGesture, Shape},
    pattern::{PATTERN_COUNT, Step},
    preset::{CV_CHANNELS, PresetStorage},
    ramp::PITCH,
    sequencer::{Cue, RecordStatus},
    tables::{EXP, SEMI, SEMI_LEN},
};

/// Semitone table index of a grid cell: five semitones per row, rising toward the top of the grid.
fn pitch_index(x: u8, y: u8) -> usize {
    let rows_up = usize::from(GRID_HEIGHT - 1 - y.min(GRID_HEIGHT - 1));
    (usize::from(x) + rows_up * 5).saturating_sub(1).min(SEMI_LEN - 1)
}

impl<S: PresetStorage> Engine<S> {
    /// Applies a gesture from the recognizer, recording it if a recording is armed or running.
    pub(super) fn gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::Shape { shape, x, y } => {
                debug!("Shape {} at ({}, {})", shape.index(), x, y);
                self.sequencer
                    .capture(self.preset.current_pattern_mut(), Step::Shape(shape), x, y);
                self.play_shape(shape, x, y);
            }
            Gesture::Meta(meta) => self.meta_gesture(meta),
        }
    }

    fn meta_gesture(&mut self, meta: MetaGesture) {
        debug!("Meta gesture {}", meta);
        match meta {
            MetaGesture::EditAll => self.edit_all = true,
            MetaGesture::Linearize => self.preset.current_pattern_mut().linearize(),
            MetaGesture::HalveTime => self.preset.current_pattern_mut().halve_time(),
            MetaGesture::DoubleTime => self.preset.current_pattern_mut().double_time(),
            MetaGesture::NextPattern => {
                self.preset.pattern = (self.preset.pattern + 1) % PATTERN_COUNT as u8;
                self.play();
            }
            MetaGesture::PreviousPattern => {
                self.preset.pattern = (self.preset.pattern + PATTERN_COUNT as u8 - 1) % PATTERN_COUNT as u8;
                self.play();
            }
        }
        self.dirty = true;
    }

    /// Plays a shape the performer drew.
    ///
    /// With the arpeggiator on and no recording in progress, the short shapes transpose the current pattern so its
    /// first event lands on the anchor instead of sounding a pitch.
    pub(super) fn play_shape(&mut self, shape: Shape, x: u8, y: u8) {
        let idle = self.sequencer.status() == RecordStatus::Off;

        if self.preset.arp && idle && shape.index() < 4 {
            let pattern = self.preset.current_pattern_mut();
            let (first_x, first_y) = pattern.event(0).map(|event| (event.x, event.y)).unwrap_or_default();
            pattern.set_transpose(x as i8 - first_x as i8, y as i8 - first_y as i8);
        } else if shape.is_melodic() {
            self.set_grid_pitch(x, y);
        }

        if !self.preset.arp && idle && !self.portamento.active {
            self.urgent = true;
        }

        self.select_shape(shape);
        self.edge(shape, x, y);

        if self.preset.arp && idle && shape.is_melodic() && !self.recognizer.is_legato() {
            self.play();
        }

        self.root = (x, y);
        self.dirty = true;
    }

    /// Plays an event from the current pattern (or a remote triple), already placed on the grid.
    pub(super) fn play_cue(&mut self, cue: Cue) {
        match cue.step {
            Step::Release => {
                if self.preset.edge == EdgeMode::Standard {
                    self.gate.lower();
                }
            }
            Step::Shape(shape) => {
                self.set_grid_pitch(cue.x, cue.y);
                if !self.portamento.active {
                    self.urgent = true;
                }
                self.select_shape(shape);
                self.edge(shape, cue.x, cue.y);
                self.root = (cue.x, cue.y);
            }
        }
        self.dirty = true;
    }

    fn set_grid_pitch(&mut self, x: u8, y: u8) {
        self.retarget_pitch(SEMI[pitch_index(x, y)]);
    }

    /// Moves the pitch output, gliding over the portamento time when portamento is on.
    pub(super) fn retarget_pitch(&mut self, target: u16) {
        if self.portamento.active {
            let steps = (self.ramps.channel(PITCH).slew() >> 2) + 1;
            self.ramps.retarget(PITCH, target, steps);
        } else {
            self.ramps.set_immediate(PITCH, target);
        }
    }

    /// Makes a shape's row current, sending each CV output toward that row's value unless its slew disables it.
    fn select_shape(&mut self, shape: Shape) {
        let Some(row) = shape.row() else {
            self.singled = true;
            return;
        };

        if usize::from(self.preset.shape) != row {
            self.preset.shape = row as u8;
            let (cv, slew) = (self.preset.cv[row], self.preset.slew[row]);
            self.ramps.suspended(|ramps| {
                for channel in 0..CV_CHANNELS {
                    if slew[channel] < SLEW_CV_OFF_THRESHOLD {
                        ramps.set_slew(channel, slew[channel]);
                        ramps.retarget(channel, cv[channel], EXP[usize::from(slew[channel] >> 4)] + 1);
                    }
                }
            });
            self.pots.reset();
        }
        self.singled = false;
    }

    fn edge(&mut self, shape: Shape, x: u8, y: u8) {
        match self.preset.edge {
            EdgeMode::Drone => {
                if self.root == (x, y) && self.gate.is_high() {
                    self.gate.lower();
                } else {
                    self.gate.raise();
                }
            }
            edge if shape.is_melodic() => {
                self.gate.raise();
                if edge == EdgeMode::Fixed {
                    self.gate.start_pulse(self.preset.edge_fixed_time);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_rises_by_fourths_up_the_grid() {
        assert_eq!(0, pitch_index(1, 7), "Expected left but got right");
        assert_eq!(4, pitch_index(0, 6), "Expected left but got right");
        assert_eq!(9, pitch_index(5, 6), "Expected left but got right");
        assert_eq!(49, pitch_index(15, 0), "Expected left but got right");
    }

    #[test]
    fn bottom_left_cell_does_not_underflow() {
        assert_eq!(0, pitch_index(0, 7), "Expected left but got right");
    }
}
