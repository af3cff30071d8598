//! The pattern recorder and player.
//!
//! Recording captures steps into a [`Pattern`] with the number of sequencer ticks between them. Playback walks a
//! cursor over the pattern, either on the engine's own tick ([`Sequencer::tick`]) or one event per external clock
//! pulse ([`Sequencer::external_step`]).

use crate::{
    configuration::ClockSource,
    pattern::{EVENTS_PER_PATTERN, Pattern, Step},
};

/// Recorder state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordStatus {
    /// Not recording.
    #[default]
    Off,
    /// Waiting for the first shape, which starts the recording.
    Armed,
    /// Capturing shapes.
    Recording,
}

/// A pattern event due to be played, already transposed and clamped to the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cue {
    /// What to play.
    pub step: Step,
    /// Column to play at.
    pub x: u8,
    /// Row to play at.
    pub y: u8,
}

/// Playback cursor and recorder for the selected pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sequencer {
    playing: bool,
    position: u8,
    /// Ticks until the event under the cursor fires.
    countdown: u16,
    /// Ticks since playback (re)started from the top; drives the progress display.
    elapsed: u32,
    status: RecordStatus,
    record_position: u8,
    /// Ticks since the last captured step.
    record_timer: u16,
    clock: ClockSource,
}

impl Sequencer {
    /// Getter.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Index of the next event to fire.
    pub fn position(&self) -> usize {
        usize::from(self.position)
    }

    /// Ticks since the start of the current cycle (or the sum of stepped intervals under an external clock).
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Getter.
    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Getter.
    pub fn clock(&self) -> ClockSource {
        self.clock
    }

    /// Setter.
    pub fn set_clock(&mut self, clock: ClockSource) {
        self.clock = clock;
    }

    /// Starts playback from the first event; the first event fires on the next tick.
    pub fn play(&mut self) {
        self.countdown = 0;
        self.position = 0;
        self.elapsed = 0;
        self.playing = true;
        debug!("Pattern playback started");
    }

    /// Stops playback, leaving the cursor where it is.
    pub fn halt(&mut self) {
        self.playing = false;
    }

    /// Waits for the next captured step to begin a recording.
    pub fn arm(&mut self) {
        self.status = RecordStatus::Armed;
    }

    /// Leaves the recorder off without finalizing anything captured so far.
    pub fn abandon(&mut self) {
        self.status = RecordStatus::Off;
    }

    /// Captures a step. The first step after [`arm`](Self::arm) starts the recording; each later one closes the
    /// previous event with the ticks elapsed since it, minus one. A full pattern stops the recording.
    pub fn capture(&mut self, pattern: &mut Pattern, step: Step, x: u8, y: u8) {
        match self.status {
            RecordStatus::Off => {}
            RecordStatus::Armed => {
                pattern.write(0, step, x, y);
                self.record_position = 1;
                self.record_timer = 0;
                self.status = RecordStatus::Recording;
                info!("Recording started");
            }
            RecordStatus::Recording => {
                let position = usize::from(self.record_position);
                pattern.write(position, step, x, y);
                pattern.set_interval(position - 1, self.recorded_interval());
                self.record_position += 1;
                self.record_timer = 0;
                if usize::from(self.record_position) == EVENTS_PER_PATTERN {
                    warn!("Pattern is full; recording stopped");
                    self.finish(pattern);
                }
            }
        }
    }

    /// Turns the recorder off. If a recording was in progress, its last interval is closed and the pattern's length
    /// and total time are set. Returns `true` in that case.
    pub fn finish(&mut self, pattern: &mut Pattern) -> bool {
        let was_recording = self.status == RecordStatus::Recording;
        if was_recording {
            let length = usize::from(self.record_position);
            pattern.set_interval(length - 1, self.recorded_interval());
            pattern.finish(length);
            info!(
                "Recording stopped: {} events over {} ticks",
                length,
                pattern.total_time()
            );
        }
        self.status = RecordStatus::Off;
        was_recording
    }

    fn recorded_interval(&self) -> u16 {
        self.record_timer.saturating_sub(1).max(1)
    }

    /// Advances one sequencer tick: counts recording time and, under the internal clock, steps playback.
    pub fn tick(&mut self, pattern: &Pattern) -> Option<Cue> {
        if self.status == RecordStatus::Recording {
            self.record_timer = self.record_timer.saturating_add(1);
        }

        if !self.playing || self.clock == ClockSource::External {
            return None;
        }

        let mut cue = None;
        if self.countdown == 0 {
            if let Some(index) = self.next_index(pattern) {
                if index == 0 {
                    self.elapsed = 0;
                }
                let event = pattern.events()[index];
                self.countdown = event.interval.saturating_sub(1);
                cue = self.cue(pattern, index);
            }
        } else {
            self.countdown -= 1;
        }
        self.elapsed = self.elapsed.saturating_add(1);
        cue
    }

    /// Steps playback by one event in response to an external clock pulse.
    pub fn external_step(&mut self, pattern: &Pattern) -> Option<Cue> {
        if !self.playing || self.clock != ClockSource::External {
            return None;
        }
        let index = self.next_index(pattern)?;
        if index == 0 {
            self.elapsed = 0;
        }
        self.elapsed = self
            .elapsed
            .saturating_add(u32::from(pattern.events()[index].interval));
        self.cue(pattern, index)
    }

    /// Moves the cursor past the next event and returns its index, wrapping or stopping at the end.
    fn next_index(&mut self, pattern: &Pattern) -> Option<usize> {
        if pattern.is_empty() {
            self.playing = false;
            return None;
        }
        if self.position() >= pattern.len() {
            if !pattern.looping {
                debug!("Pattern done");
                self.playing = false;
                return None;
            }
            self.position = 0;
        }
        let index = self.position();
        self.position += 1;
        Some(index)
    }

    fn cue(&self, pattern: &Pattern, index: usize) -> Option<Cue> {
        let (x, y) = pattern.placement(index)?;
        Some(Cue {
            step: pattern.events()[index].step,
            x,
            y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::Shape;

    fn shape(index: u8) -> Step {
        Step::Shape(Shape::new(index).unwrap_or_default())
    }

    /// Records one step per entry, waiting the given number of ticks after each.
    fn record(sequencer: &mut Sequencer, pattern: &mut Pattern, gaps: &[u16]) {
        sequencer.arm();
        for (i, &gap) in gaps.iter().enumerate() {
            sequencer.capture(pattern, shape(1), i as u8 + 1, 3);
            for _ in 0..gap {
                sequencer.tick(pattern);
            }
        }
        sequencer.finish(pattern);
    }

    fn play_for(sequencer: &mut Sequencer, pattern: &Pattern, ticks: u32) -> usize {
        (0..ticks).filter(|_| sequencer.tick(pattern).is_some()).count()
    }

    #[test]
    fn recording_measures_intervals() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        record(&mut sequencer, &mut pattern, &[5, 9, 3]);

        assert_eq!(RecordStatus::Off, sequencer.status());
        assert_eq!(3, pattern.len());
        let intervals: [u16; 3] = [0, 1, 2].map(|i| pattern.events()[i].interval);
        assert_eq!([4, 8, 2], intervals, "Expected left but got right");
        assert_eq!(14, pattern.total_time());
    }

    #[test]
    fn interval_floors_at_one() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        record(&mut sequencer, &mut pattern, &[0, 1]);
        assert_eq!(1, pattern.events()[0].interval);
        assert_eq!(1, pattern.events()[1].interval);
    }

    #[test]
    fn capture_while_off_is_ignored() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        sequencer.capture(&mut pattern, shape(2), 4, 4);
        assert_eq!(Pattern::default(), pattern);
        assert!(!sequencer.finish(&mut pattern), "Nothing was being recorded");
    }

    #[test]
    fn recording_stops_when_full() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        sequencer.arm();
        for _ in 0..EVENTS_PER_PATTERN {
            sequencer.capture(&mut pattern, shape(0), 2, 2);
            sequencer.tick(&pattern);
            sequencer.tick(&pattern);
        }
        assert_eq!(RecordStatus::Off, sequencer.status());
        assert_eq!(EVENTS_PER_PATTERN, pattern.len());

        sequencer.capture(&mut pattern, shape(3), 9, 9);
        assert_eq!(EVENTS_PER_PATTERN, pattern.len(), "Full pattern should be left untouched");
    }

    #[test]
    fn recording_round_trips_through_halve_and_double() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        record(&mut sequencer, &mut pattern, &[7, 13, 5, 9]);
        let recorded = pattern;

        pattern.halve_time();
        pattern.double_time();
        assert_eq!(recorded, pattern, "Expected left but got right");
    }

    #[test]
    fn events_fire_interval_ticks_apart() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        record(&mut sequencer, &mut pattern, &[4, 3]);

        sequencer.play();
        let fired: [bool; 8] = core::array::from_fn(|_| sequencer.tick(&pattern).is_some());
        // intervals are 3 and 2
        assert_eq!(
            [true, false, false, true, false, false, false, false],
            fired,
            "Expected left but got right"
        );
        assert!(!sequencer.is_playing(), "Unlooped pattern should stop at the end");
    }

    #[test]
    fn looped_pattern_fires_twice_per_two_cycles() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        record(&mut sequencer, &mut pattern, &[6, 2, 11, 4, 3]);
        pattern.looping = true;

        sequencer.play();
        let fired = play_for(&mut sequencer, &pattern, 2 * pattern.total_time());
        assert_eq!(2 * pattern.len(), fired, "Expected left but got right");
        assert_eq!(0, sequencer.position() % pattern.len(), "Cursor should be at a cycle boundary");
        assert!(sequencer.is_playing());
    }

    #[test]
    fn playback_applies_transpose() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        record(&mut sequencer, &mut pattern, &[2]);
        pattern.set_transpose(2, -1);

        sequencer.play();
        assert_eq!(
            Some(Cue {
                step: shape(1),
                x: 3,
                y: 2
            }),
            sequencer.tick(&pattern)
        );
    }

    #[test]
    fn empty_pattern_stops_playback() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        pattern.looping = true;
        sequencer.play();
        assert_eq!(None, sequencer.tick(&pattern));
        assert!(!sequencer.is_playing());
    }

    #[test]
    fn external_clock_steps_one_event_per_pulse() {
        let mut sequencer = Sequencer::default();
        let mut pattern = Pattern::default();
        record(&mut sequencer, &mut pattern, &[10, 10]);
        pattern.looping = true;
        sequencer.set_clock(ClockSource::External);
        sequencer.play();

        assert_eq!(None, sequencer.tick(&pattern), "Internal ticks should not advance playback");
        assert!(sequencer.external_step(&pattern).is_some());
        assert_eq!(9, sequencer.elapsed());
        assert!(sequencer.external_step(&pattern).is_some());
        assert_eq!(18, sequencer.elapsed());
        assert!(sequencer.external_step(&pattern).is_some());
        assert_eq!(9, sequencer.elapsed(), "Wrapping should restart the running total");
        assert_eq!(1, sequencer.position());
    }
}
