//! The engine's behavior while a MIDI controller is connected: monophonic note handling with a last-note-priority
//! stack, pitch bend, sustain, mod wheel, and the pot mapping for portamento and response curves.

use wmidi::{ControlFunction, MidiMessage, Note, U7, Velocity};

use super::{Engine, Stash};
use crate::{
    midi_state::{self, BEND_SLEW, MIDI_NOTE_MAX},
    pots::{POT_COUNT, PotMapping},
    preset::PresetStorage,
    ramp::{MODULATION, PITCH, TRACKING, VELOCITY},
    tables::{EXP, blend},
};

/// Divides a smoothed pot reading into a response curve shape.
const SHAPE_DIVISOR: u16 = 40;

/// Sustain pedal values below this release it.
const SUSTAIN_THRESHOLD: u8 = 64;

impl<S: PresetStorage> Engine<S> {
    /// Puts the grid performance aside and hands the outputs to the controller.
    pub(super) fn midi_connect(&mut self) {
        info!("MIDI controller connected");
        if self.stash.is_none() {
            self.stash = Some(Stash {
                portamento_active: self.portamento.active,
                channels: self.ramps.snapshot(),
            });
        }

        self.midi.reset();
        self.midi.legato = true;
        self.portamento.active = true;

        self.ramps.suspended(|ramps| ramps.clear());
        self.urgent = true;
        self.gate.lower();

        self.pot_mapping = PotMapping::Midi;
        self.pots.reset();
        self.dirty = true;
    }

    /// Silences the outputs and brings back the grid performance as it was before the controller connected.
    pub(super) fn midi_disconnect(&mut self) {
        if !self.is_midi() {
            debug!("Ignoring disconnect without a connected MIDI controller");
            return;
        }
        info!("MIDI controller disconnected");

        self.ramps.suspended(|ramps| ramps.clear());
        self.urgent = true;
        self.gate.lower();

        self.pots.reset();
        self.pot_mapping = PotMapping::Grid;

        if let Some(stash) = self.stash.take() {
            self.portamento.active = stash.portamento_active;
            self.ramps.restore(stash.channels);
        }
        self.dirty = true;
    }

    pub(super) fn midi_packet(&mut self, packet: [u8; 4]) {
        let Some(message) = midi_state::parse(&packet) else {
            return;
        };

        match message {
            MidiMessage::NoteOn(_, note, velocity) if u8::from(velocity) == 0 => self.note_off(note),
            MidiMessage::NoteOn(channel, note, velocity) => {
                debug!("Note on: {} ({}) on channel {}", note as u8, u8::from(velocity), channel.number());
                self.note_on(note, velocity);
            }
            MidiMessage::NoteOff(_, note, _) => self.note_off(note),
            MidiMessage::PitchBendChange(_, bend) => self.pitch_bend(u16::from(bend)),
            MidiMessage::ControlChange(_, ControlFunction::MODULATION_WHEEL, value) => self.mod_wheel(value),
            MidiMessage::ControlChange(_, ControlFunction::DAMPER_PEDAL, value) => self.sustain(value),
            MidiMessage::ChannelPressure(_, pressure) => {
                trace!("Ignoring channel pressure {}", u8::from(pressure));
            }
            _ => trace!("Ignoring unsupported MIDI message"),
        }
    }

    fn note_on(&mut self, note: Note, velocity: Velocity) {
        if note as u8 > MIDI_NOTE_MAX {
            debug!("Dropping note {} above the output range", note as u8);
            return;
        }

        self.midi.notes.hold(note, velocity);
        self.sound(note, velocity);
        self.gate.raise();
        self.pots.reset();
    }

    fn note_off(&mut self, note: Note) {
        if note as u8 > MIDI_NOTE_MAX || self.midi.sustain {
            return;
        }

        self.midi.notes.release(note);
        match self.midi.notes.last() {
            Some(prior) if self.midi.legato => self.sound(prior.note(), prior.velocity()),
            _ => self.gate.lower(),
        }
    }

    /// Sets pitch, velocity and key tracking for a note in one step.
    fn sound(&mut self, note: Note, velocity: Velocity) {
        let pitch = self.midi.pitch_target(note);
        let velocity = blend(u8::from(velocity), self.midi.velocity_shape);
        let tracking = blend(note as u8, self.midi.tracking_shape);
        let portamento = self.portamento.active;

        self.ramps.suspended(|ramps| {
            if portamento {
                let steps = (ramps.channel(PITCH).slew() >> 2) + 1;
                ramps.retarget(PITCH, pitch, steps);
            } else {
                ramps.set_immediate(PITCH, pitch);
            }
            ramps.set_immediate(VELOCITY, velocity);
            ramps.set_immediate(TRACKING, tracking);
        });
        self.urgent = true;
    }

    fn pitch_bend(&mut self, bend: u16) {
        let offset = self.midi.bend(bend);
        trace!("Pitch bend offset {}", offset);

        let Some(active) = self.midi.notes.last() else {
            return;
        };
        let target = self.midi.pitch_target(active.note());
        let steps = (EXP[BEND_SLEW] >> 2) + 1;
        self.ramps.suspended(|ramps| ramps.retarget(PITCH, target, steps));
        self.urgent = true;
    }

    fn sustain(&mut self, value: U7) {
        if u8::from(value) < SUSTAIN_THRESHOLD {
            self.midi.notes.clear();
            self.gate.lower();
            self.midi.sustain = false;
        } else {
            self.midi.sustain = true;
        }
    }

    fn mod_wheel(&mut self, value: U7) {
        let code = u16::from(u8::from(value)) << 5;
        self.ramps
            .suspended(|ramps| ramps.set_immediate(MODULATION, code));
        self.urgent = true;
    }

    /// Applies pot moves while a MIDI controller drives the engine.
    pub(super) fn midi_pots(&mut self, values: [Option<u16>; POT_COUNT]) {
        if let Some(value) = values[0] {
            self.set_portamento_time(value);
        }
        if let Some(value) = values[1] {
            self.midi.tracking_shape = (value / SHAPE_DIVISOR).min(u16::from(u8::MAX)) as u8;
        }
        if let Some(value) = values[2] {
            self.midi.velocity_shape = (value / SHAPE_DIVISOR).min(u16::from(u8::MAX)) as u8;
        }
    }
}
