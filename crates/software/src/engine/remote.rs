use num_traits::FromPrimitive;

use super::Engine;
use crate::{
    configuration::ClockSource,
    gesture::Shape,
    pattern::{PATTERN_COUNT, Step},
    preset::{PRESET_COUNT, PresetStorage},
    remote::Opcode,
    sequencer::{Cue, RecordStatus},
};

/// Columns per row in a remote transpose offset.
const TRANSPOSE_ROW: i16 = 5;

/// Splits a remote transpose offset into grid columns and rows; positive offsets move up the grid.
fn transpose_offset(payload: u16) -> (i8, i8) {
    let offset = payload as i16;
    let x = (offset % TRANSPOSE_ROW) as i8;
    let y = (-(offset / TRANSPOSE_ROW)).clamp(i16::from(i8::MIN), i16::from(i8::MAX)) as i8;
    (x, y)
}

impl<S: PresetStorage> Engine<S> {
    pub(super) fn remote_command(&mut self, slot: u8) {
        let Some(command) = self.remote.take(slot) else {
            warn!("Remote slot {} was empty", slot);
            return;
        };
        let payload = command.payload;
        trace!("Remote command {}", command);

        match Opcode::from_u8(command.opcode) {
            Some(Opcode::Preset) => {
                if usize::from(payload) < PRESET_COUNT {
                    if let Err(error) = self.load_preset(payload as u8) {
                        error!("Could not load preset {}: {}", payload, error);
                    }
                }
            }
            Some(Opcode::ClockMode) => {
                let clock = if payload != 0 {
                    ClockSource::External
                } else {
                    ClockSource::Internal
                };
                self.sequencer.set_clock(clock);
            }
            Some(Opcode::Clock) => {
                if payload != 0 {
                    let cue = self
                        .sequencer
                        .external_step(self.preset.current_pattern());
                    if let Some(cue) = cue {
                        self.play_cue(cue);
                    }
                }
            }
            Some(Opcode::Reset) => {
                if payload != 0 {
                    self.end_recording();
                    self.play();
                }
            }
            Some(Opcode::Pattern) => {
                if usize::from(payload) < PATTERN_COUNT {
                    let was_playing = self.sequencer.is_playing();
                    self.stop();
                    self.preset.pattern = payload as u8;
                    if was_playing {
                        self.play();
                    }
                }
            }
            Some(Opcode::Transpose) => {
                let (x, y) = transpose_offset(payload);
                self.preset.current_pattern_mut().set_transpose(x, y);
            }
            Some(Opcode::Stop) => {
                if payload != 0 {
                    self.end_recording();
                    self.stop();
                }
            }
            Some(Opcode::Triple) => {
                if let Some(shape) = (1..=4).contains(&payload).then(|| Shape::new(payload as u8 + 4)).flatten() {
                    let (x, y) = self.root;
                    self.play_cue(Cue {
                        step: Step::Shape(shape),
                        x,
                        y,
                    });
                }
            }
            Some(Opcode::Magic) => {
                let pattern = self.preset.current_pattern_mut();
                match payload {
                    1 => pattern.double_time(),
                    2 => pattern.halve_time(),
                    3 => pattern.linearize(),
                    _ => debug!("Ignoring unknown pattern transform {}", payload),
                }
            }
            None => debug!("Ignoring unknown remote opcode {}", command.opcode),
        }
        self.dirty = true;
    }

    /// Closes a recording in progress. An armed recorder stays armed.
    fn end_recording(&mut self) {
        if self.sequencer.status() == RecordStatus::Recording {
            self.sequencer.finish(self.preset.current_pattern_mut());
        }
    }
}
