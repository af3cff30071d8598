use wmidi::{MidiMessage, Note};

use crate::{
    ramp::MAX_CODE,
    tables::{BEND, SEMI},
};

mod note_stack;
pub use note_stack::*;

/// Notes above this are out of the outputs' range and are ignored.
pub const MIDI_NOTE_MAX: u8 = 120;

/// Pitch bend value meaning "no bend".
pub const BEND_CENTER: u16 = 0x2000;

/// Portamento time code used when a pitch bend moves the sounding note.
pub const BEND_SLEW: usize = 15;

/// The MIDI performance state the engine keeps while a controller is connected.
///
/// Switched controllers (sustain, legato) are stored as booleans; pitch bend is stored already converted to an offset
/// in output codes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MidiState {
    /// Notes currently held, most recent on top.
    pub notes: NoteStack,
    /// While `true`, note-offs leave the stack and the gate alone.
    pub sustain: bool,
    /// While `true`, releasing the sounding note falls back to the previous held note instead of closing the gate.
    pub legato: bool,
    /// Curve applied to velocity; see [`blend`](crate::tables::blend).
    pub velocity_shape: u8,
    /// Curve applied to key tracking; see [`blend`](crate::tables::blend).
    pub tracking_shape: u8,
    pitch_offset: i16,
}

impl MidiState {
    /// Clears held notes, sustain and pitch bend, ready for a newly connected controller.
    pub fn reset(&mut self) {
        self.notes.clear();
        self.sustain = false;
        self.pitch_offset = 0;
    }

    /// Current pitch bend, in output codes.
    pub fn pitch_offset(&self) -> i16 {
        self.pitch_offset
    }

    /// Records a 14-bit pitch bend value and returns the resulting offset.
    pub fn bend(&mut self, bend: u16) -> i16 {
        self.pitch_offset = pitch_offset(bend);
        self.pitch_offset
    }

    /// Output code for `note` with the current pitch bend applied, clamped to the DAC's range.
    pub fn pitch_target(&self, note: Note) -> u16 {
        let semitone = SEMI.get(note as usize).copied().unwrap_or(MAX_CODE);
        (i32::from(semitone) + i32::from(self.pitch_offset)).clamp(0, i32::from(MAX_CODE)) as u16
    }
}

/// Converts a 14-bit pitch bend value into an offset in output codes: up to an octave either side of center.
pub fn pitch_offset(bend: u16) -> i16 {
    let step = |distance: u16| BEND[usize::from(distance >> 4).min(BEND.len() - 1)] as i16;
    match bend {
        BEND_CENTER => 0,
        up if up > BEND_CENTER => step(up - BEND_CENTER),
        down => -step(BEND_CENTER - down - 1),
    }
}

/// Extracts the MIDI message carried by a USB-MIDI Event Packet.
///
/// The zeroth byte is the packet header and is ignored; the remaining three bytes contain the actual MIDI event.
pub fn parse(packet: &[u8; 4]) -> Option<MidiMessage<'_>> {
    match MidiMessage::from_bytes(&packet[1..]) {
        Ok(message) => Some(message),
        Err(_) => {
            warn!("Discarding malformed USB-MIDI Event Packet: {}", packet);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmidi::{Channel, ControlFunction, U7};

    #[test]
    fn bend_center_is_zero() {
        assert_eq!(0, pitch_offset(BEND_CENTER));
    }

    #[test]
    fn bend_extremes_span_an_octave() {
        assert_eq!(408, pitch_offset(0x3FFF), "Expected left but got right");
        assert_eq!(-408, pitch_offset(0), "Expected left but got right");
    }

    #[test]
    fn bend_is_symmetric_near_center() {
        assert_eq!(0, pitch_offset(BEND_CENTER + 1));
        assert_eq!(0, pitch_offset(BEND_CENTER - 1));
        assert_eq!(BEND[1] as i16, pitch_offset(BEND_CENTER + 16));
        assert_eq!(-(BEND[1] as i16), pitch_offset(BEND_CENTER - 17));
    }

    #[test]
    fn pitch_target_applies_bend_and_clamps() {
        let mut state = MidiState::default();
        assert_eq!(SEMI[60], state.pitch_target(Note::C4));

        state.bend(0x3FFF);
        assert_eq!(SEMI[60] + 408, state.pitch_target(Note::C4));
        assert_eq!(MAX_CODE, state.pitch_target(Note::C9), "Should clamp at the top of the range");

        state.bend(0);
        assert_eq!(0, state.pitch_target(Note::CMinus1), "Should clamp at the bottom of the range");
    }

    #[test]
    fn reset_clears_performance_state() {
        let mut state = MidiState::default();
        state.notes.hold(Note::C4, U7::from_u8_lossy(64));
        state.sustain = true;
        state.legato = true;
        state.bend(0);

        state.reset();
        assert!(state.notes.is_empty());
        assert!(!state.sustain);
        assert_eq!(0, state.pitch_offset());
        assert!(state.legato, "Legato is a connection setting and survives a reset");
    }

    #[test]
    fn parse_skips_packet_header() {
        let message = parse(&[0x09, 0x90, 60, 100]);
        assert_eq!(
            Some(MidiMessage::NoteOn(
                Channel::Ch1,
                Note::C4,
                U7::from_u8_lossy(100)
            )),
            message,
            "Expected left but got right"
        );
    }

    #[test]
    fn parse_control_change() {
        let message = parse(&[0x0B, 0xB0, 64, 127]);
        assert_eq!(
            Some(MidiMessage::ControlChange(
                Channel::Ch1,
                ControlFunction::DAMPER_PEDAL,
                U7::from_u8_lossy(127)
            )),
            message
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(None, parse(&[0x00, 0x12, 0x34, 0x56]));
    }
}
