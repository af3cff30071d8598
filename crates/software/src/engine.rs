//! Provides [`Engine`], which owns every piece of performance state and reacts to [`Event`]s one at a time.
//!
//! Producers (timers, the grid, the pots, MIDI and the remote bus) only [`post`](Engine::post) events. The foreground
//! loop drains them with [`process_next`](Engine::process_next); each handler runs to completion. The ramp task
//! calls [`advance_ramps`](Engine::advance_ramps) on its own, faster period, under the same lock as the handlers;
//! handlers that move several outputs at once do so inside [`Ramps::suspended`].

use embassy_time::Duration;

use crate::{
    configuration::{EdgeMode, timing},
    display::{Blinker, Frame},
    error::Error,
    events::{Event, EventQueue},
    gate::Gate,
    gesture::{Gesture, Recognizer},
    keys::HeldKeys,
    midi_state::MidiState,
    pots::{POT_COUNT, PotMapping, Pots},
    preset::{CV_CHANNELS, Glyph, PRESET_BLOB_LEN, PRESET_COUNT, Preset, PresetStorage},
    ramp::{CHANNEL_COUNT, OutputChannel, Ramps},
    remote::{RemoteCommand, RemoteQueue},
    sequencer::{RecordStatus, Sequencer},
};

mod grid;
mod midi;
mod preset;
mod remote;
mod shape;
mod view;

/// Slew values at or above this leave an output alone when a shape selects its row.
pub const SLEW_CV_OFF_THRESHOLD: u16 = 4000;

/// Key timer firings the front button must be held to save the live preset.
pub const FRONT_HOLD_TICKS: u8 = 15;

/// How grid presses outside the function column are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Presses draw shapes; pots edit the current shape's CV.
    #[default]
    Normal,
    /// Presses draw shapes and toggle breadcrumbs; pots edit the current shape's slew.
    Slew,
    /// Presses choose the gate behavior and fixed pulse time.
    Edge,
    /// Presses in the 4×4 block select a pattern.
    Select,
    /// Presses in the 4×4 block select a pattern and play it.
    Bank,
}

/// State of the portamento key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortamentoToggle {
    /// Portamento is off.
    #[default]
    Off,
    /// The key was tapped; portamento stays on until the next tap.
    Latched,
    /// The key is held; portamento stays on until release.
    Held,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Portamento {
    active: bool,
    /// The first pot sets portamento time while this is set.
    editing: bool,
    toggle: PortamentoToggle,
}

/// Grid performance state put aside while a MIDI controller is connected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Stash {
    portamento_active: bool,
    channels: [OutputChannel; CHANNEL_COUNT],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Browse {
    active: bool,
    /// Preset slot that saves and loads target.
    index: u8,
    glyph: Glyph,
    /// Key timer firings until a held front button saves.
    front_timer: u8,
}

/// The performance engine.
pub struct Engine<S: PresetStorage> {
    storage: S,
    events: EventQueue,
    remote: RemoteQueue,
    preset: Preset,
    ramps: Ramps,
    gate: Gate,
    recognizer: Recognizer,
    sequencer: Sequencer,
    keys: HeldKeys,
    pots: Pots,
    pot_mapping: PotMapping,
    midi: MidiState,
    stash: Option<Stash>,
    mode: Mode,
    /// The record key is down.
    arm_key: bool,
    /// Latches a record-key press that already did something, so its release doesn't arm.
    selected: bool,
    /// Anchor of the most recent shape.
    root: (u8, u8),
    /// The most recent shape was a point.
    singled: bool,
    edit_all: bool,
    portamento: Portamento,
    browse: Browse,
    varibright: bool,
    blinker: Blinker,
    dirty: bool,
    /// Outputs changed in a way that must reach the DAC before the next ramp period.
    urgent: bool,
    blob: [u8; PRESET_BLOB_LEN],
}

impl<S: PresetStorage> Engine<S> {
    /// Constructs the engine around a storage medium.
    ///
    /// On first run every preset slot is initialized with defaults and a staircase glyph, and slot 0 is selected.
    /// Otherwise the previously selected preset is recalled; if it cannot be read the engine starts from defaults.
    pub fn new(storage: S) -> Result<Self, Error> {
        let mut engine = Self {
            storage,
            events: EventQueue::default(),
            remote: RemoteQueue::default(),
            preset: Preset::default(),
            ramps: Ramps::new(),
            gate: Gate::default(),
            recognizer: Recognizer::new(),
            sequencer: Sequencer::default(),
            keys: HeldKeys::default(),
            pots: Pots::default(),
            pot_mapping: PotMapping::Grid,
            midi: MidiState::default(),
            stash: None,
            mode: Mode::Normal,
            arm_key: false,
            selected: false,
            root: (15, 0),
            singled: true,
            edit_all: false,
            portamento: Portamento::default(),
            browse: Browse {
                active: false,
                index: 0,
                glyph: Glyph::staircase(0),
                front_timer: 0,
            },
            varibright: true,
            blinker: Blinker::default(),
            dirty: true,
            urgent: false,
            blob: [0; PRESET_BLOB_LEN],
        };

        if engine.storage.is_fresh() {
            info!("First run; writing default presets");
            engine.preset.encode(&mut engine.blob);
            // written in reverse so that slot 0 ends up selected
            for index in (0..PRESET_COUNT).rev() {
                engine
                    .storage
                    .store(index as u8, &engine.blob, &Glyph::staircase(index))?;
            }
            engine.storage.mark_initialized()?;
        } else {
            let index = engine.storage.selected();
            if let Err(error) = engine.recall(index) {
                error!("Could not recall preset {}: {}; starting from defaults", index, error);
            }
        }

        Ok(engine)
    }

    /// Queues an event for the foreground loop.
    pub fn post(&mut self, event: Event) -> Result<(), Error> {
        self.events.push(event)
    }

    /// Handles the oldest waiting event. Returns `false` if there was none.
    pub fn process_next(&mut self) -> bool {
        match self.events.pop() {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// Handles an event immediately, bypassing the queue.
    pub fn dispatch(&mut self, event: Event) {
        trace!("Dispatching {}", event);
        match event {
            Event::Tick => self.tick(),
            Event::KeyTimer => self.key_timer(),
            Event::GridKey { x, y, pressed } => self.grid_key(x, y, pressed),
            Event::Front { pressed } => self.front(pressed),
            Event::Pots(readings) => self.poll_pots(readings),
            Event::MidiPacket(packet) => self.midi_packet(packet),
            Event::MidiConnected => self.midi_connect(),
            Event::MidiDisconnected => self.midi_disconnect(),
            Event::GridConnected { varibright } => self.grid_connect(varibright),
            Event::Remote(slot) => self.remote_command(slot),
            Event::SavePreset => self.save(),
        }
    }

    /// Accepts a 3-byte frame from the remote bus, claiming a queue slot and posting an event for it.
    ///
    /// Frames are ignored while a MIDI controller is connected. Fails with [`Error::RemoteQueueFull`] when every
    /// slot is occupied; the sender must retry.
    pub fn remote_frame(&mut self, frame: [u8; 3]) -> Result<(), Error> {
        if self.is_midi() {
            debug!("Ignoring remote frame while a MIDI controller is connected");
            return Ok(());
        }
        let slot = self.remote.enqueue(RemoteCommand::from_frame(frame))?;
        if let Err(error) = self.events.push(Event::Remote(slot)) {
            self.remote.take(slot);
            return Err(error);
        }
        Ok(())
    }

    /// Advances every output ramp by one ramp period and returns the codes to write to the DAC.
    ///
    /// Handlers and the advancer are kept apart by whoever owns the engine (the firmware's mutex); handlers that move
    /// several outputs at once mark that with [`Ramps::suspended`].
    pub fn advance_ramps(&mut self) -> [u16; CHANNEL_COUNT] {
        if self.ramps.advance_all() {
            self.dirty = true;
        }
        self.ramps.codes()
    }

    /// Returns the output codes if a handler changed them in a way that must reach the DAC right away (note-on,
    /// pitch bend, unslewed pitch changes), then clears the request.
    pub fn take_urgent_write(&mut self) -> Option<[u16; CHANNEL_COUNT]> {
        core::mem::take(&mut self.urgent).then(|| self.ramps.codes())
    }

    /// Getter.
    pub fn gate_is_high(&self) -> bool {
        self.gate.is_high()
    }

    /// Redraws `frame` if anything changed since the last call. Returns `true` if it did.
    pub fn take_frame(&mut self, frame: &mut Frame) -> bool {
        if !core::mem::take(&mut self.dirty) {
            return false;
        }
        self.render(frame);
        true
    }

    /// Returns `true` if the grid in use shows levels rather than on/off.
    pub fn is_varibright(&self) -> bool {
        self.varibright
    }

    /// How often the pots should be read in the current performance mode.
    pub fn pot_poll_period(&self) -> Duration {
        match self.pot_mapping {
            PotMapping::Grid => timing::GRID_POT_PERIOD,
            PotMapping::Midi => timing::MIDI_POT_PERIOD,
        }
    }

    /// Returns `true` while a MIDI controller drives the engine.
    pub fn is_midi(&self) -> bool {
        self.pot_mapping == PotMapping::Midi
    }

    /// Getter.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Getter.
    pub fn record_status(&self) -> RecordStatus {
        self.sequencer.status()
    }

    /// Returns `true` while a pattern is playing.
    pub fn is_playing(&self) -> bool {
        self.sequencer.is_playing()
    }

    /// The live preset.
    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    /// Getter.
    pub fn ramps(&self) -> &Ramps {
        &self.ramps
    }

    /// Getter.
    pub fn midi(&self) -> &MidiState {
        &self.midi
    }

    /// Returns `true` while portamento is applied to pitch changes.
    pub fn portamento_active(&self) -> bool {
        self.portamento.active
    }

    /// Returns `true` while the preset browse screen is shown.
    pub fn is_browsing(&self) -> bool {
        self.browse.active
    }

    /// Preset slot that saves and loads target.
    pub fn selected_preset(&self) -> u8 {
        self.browse.index
    }

    /// Getter.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Tears the engine down, returning its storage.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Number of events waiting.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Number of remote commands waiting.
    pub fn pending_remote_commands(&self) -> usize {
        self.remote.waiting_count()
    }

    fn tick(&mut self) {
        if self.is_midi() {
            return;
        }

        if let Some(gesture) = self.recognizer.tick() {
            self.gesture(gesture);
            if matches!(gesture, Gesture::Shape { .. }) {
                self.recognizer.hold_legato();
            }
        }

        if self.gate.tick() {
            self.dirty = true;
        }

        let cue = self.sequencer.tick(self.preset.current_pattern());
        if let Some(cue) = cue {
            self.play_cue(cue);
        }
        if self.sequencer.is_playing() {
            self.dirty = true;
        }

        let blinking = self.sequencer.status() == RecordStatus::Recording || self.edit_all || !self.varibright;
        if blinking && self.blinker.advance() {
            self.dirty = true;
        }
    }

    fn key_timer(&mut self) {
        if self.browse.front_timer > 0 {
            self.browse.front_timer -= 1;
            if self.browse.front_timer == 0 {
                self.request_save();
                self.browse.active = false;
                self.dirty = true;
            }
        }

        for (x, y) in self.keys.tick() {
            if self.browse.active && x == 0 {
                self.browse.index = y;
                self.request_save();
                self.browse.active = false;
                self.dirty = true;
            }
        }
    }

    fn front(&mut self, pressed: bool) {
        if pressed {
            self.browse.front_timer = FRONT_HOLD_TICKS;
            self.browse.active = !self.browse.active;
        } else {
            self.browse.front_timer = 0;
        }
        self.dirty = true;
    }

    fn grid_connect(&mut self, varibright: bool) {
        info!("Grid connected (varibright: {})", varibright);
        self.varibright = varibright;
        self.keys.clear();
        self.recognizer.reset();
        self.pots.reset();
        self.dirty = true;
    }

    fn poll_pots(&mut self, readings: [u16; POT_COUNT]) {
        let values = self.pots.poll(readings);
        match self.pot_mapping {
            PotMapping::Grid => self.grid_pots(values),
            PotMapping::Midi => self.midi_pots(values),
        }
    }

    fn request_save(&mut self) {
        if self.events.push(Event::SavePreset).is_err() {
            error!("Could not queue preset save");
        }
    }

    fn play(&mut self) {
        self.sequencer.play();
    }

    /// Stops playback; in Standard edge mode the gate falls with it.
    fn stop(&mut self) {
        self.sequencer.halt();
        if self.preset.edge == EdgeMode::Standard {
            self.gate.lower();
        }
    }

    /// Jumps the CV outputs to the current shape row, as after a preset recall.
    fn restore_outputs(&mut self) {
        self.pots.reset();
        let row = usize::from(self.preset.shape) % self.preset.cv.len();
        let (cv, slew) = (self.preset.cv[row], self.preset.slew[row]);
        self.ramps.suspended(|ramps| {
            for channel in 0..CV_CHANNELS {
                ramps.set_immediate(channel, cv[channel]);
                ramps.set_slew(channel, slew[channel]);
            }
        });
    }
}
