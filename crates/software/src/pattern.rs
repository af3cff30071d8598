//! Recorded performances: a [`Pattern`] is a sequence of up to [`EVENTS_PER_PATTERN`] [`PatternEvent`]s, each
//! holding the gap (in sequencer ticks) until the next.

use crate::gesture::{GRID_HEIGHT, GRID_WIDTH, Shape};

/// Capacity of a pattern.
pub const EVENTS_PER_PATTERN: usize = 128;

/// Number of patterns in a preset.
pub const PATTERN_COUNT: usize = 16;

/// Byte used in persisted patterns to mark a full release of the keys.
pub(crate) const RELEASE_MARKER: u8 = 100;

/// What happens when a pattern event fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Replay a shape.
    Shape(Shape),
    /// Every key was released; in Standard edge mode the gate falls.
    Release,
}

impl Default for Step {
    fn default() -> Self {
        Self::Shape(Shape::POINT)
    }
}

impl Step {
    /// Encodes the step as a single byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Shape(shape) => shape.index(),
            Self::Release => RELEASE_MARKER,
        }
    }

    /// Decodes a byte written by [`to_byte`](Self::to_byte).
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            RELEASE_MARKER => Some(Self::Release),
            _ => Shape::new(byte).map(Self::Shape),
        }
    }
}

/// One recorded step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PatternEvent {
    /// What to play.
    pub step: Step,
    /// Column the step was performed at.
    pub x: u8,
    /// Row the step was performed at.
    pub y: u8,
    /// Ticks until the next event; never 0.
    pub interval: u16,
}

impl Default for PatternEvent {
    fn default() -> Self {
        Self {
            step: Step::default(),
            x: 0,
            y: 0,
            interval: 1,
        }
    }
}

/// A recorded sequence of steps and how to play it back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pattern {
    events: [PatternEvent; EVENTS_PER_PATTERN],
    length: u8,
    total_time: u32,
    /// Whether playback wraps to the start.
    pub looping: bool,
    transpose: (i8, i8),
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            events: [PatternEvent::default(); EVENTS_PER_PATTERN],
            length: 0,
            total_time: 0,
            looping: false,
            transpose: (0, 0),
        }
    }
}

impl Pattern {
    /// Number of recorded events.
    pub fn len(&self) -> usize {
        usize::from(self.length)
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Sum of every recorded interval: the length of one loop, in ticks.
    pub fn total_time(&self) -> u32 {
        self.total_time
    }

    /// The recorded events, in order.
    pub fn events(&self) -> &[PatternEvent] {
        &self.events[..self.len()]
    }

    /// Returns the event at `index` regardless of the recorded length.
    pub fn event(&self, index: usize) -> Option<&PatternEvent> {
        self.events.get(index)
    }

    /// The `(x, y)` shift applied to every event during playback.
    pub fn transpose(&self) -> (i8, i8) {
        self.transpose
    }

    /// Setter.
    pub fn set_transpose(&mut self, x: i8, y: i8) {
        self.transpose = (x, y);
    }

    /// Returns where the event at `index` plays, after transposition, clamped to the grid.
    pub fn placement(&self, index: usize) -> Option<(u8, u8)> {
        let event = self.events.get(index)?;
        let x = (i16::from(event.x) + i16::from(self.transpose.0)).clamp(0, i16::from(GRID_WIDTH - 1));
        let y = (i16::from(event.y) + i16::from(self.transpose.1)).clamp(0, i16::from(GRID_HEIGHT - 1));
        Some((x as u8, y as u8))
    }

    /// Where the first event plays; the arpeggiator's anchor. Not clamped, so it may lie off the grid.
    pub fn anchor(&self) -> (i16, i16) {
        let first = self.events[0];
        (
            i16::from(first.x) + i16::from(self.transpose.0),
            i16::from(first.y) + i16::from(self.transpose.1),
        )
    }

    /// Forces an even rhythm: every even event takes the first event's interval and every odd event the second's.
    ///
    /// Patterns shorter than two events are left alone.
    pub fn linearize(&mut self) {
        if self.length < 2 {
            return;
        }
        let note = self.events[0].interval;
        let rest = self.events[1].interval;
        let length = self.len();
        for (i, event) in self.events[..length].iter_mut().enumerate() {
            event.interval = if i % 2 == 1 { rest } else { note };
        }
        self.recompute_total();
    }

    /// Halves every interval, never going below one tick.
    pub fn halve_time(&mut self) {
        let length = self.len();
        for event in self.events[..length].iter_mut() {
            event.interval = (event.interval >> 1).max(1);
        }
        self.recompute_total();
    }

    /// Doubles every interval.
    pub fn double_time(&mut self) {
        let length = self.len();
        for event in self.events[..length].iter_mut() {
            event.interval = event.interval.saturating_mul(2);
        }
        self.recompute_total();
    }

    pub(crate) fn write(&mut self, index: usize, step: Step, x: u8, y: u8) {
        if let Some(event) = self.events.get_mut(index) {
            event.step = step;
            event.x = x;
            event.y = y;
        }
    }

    pub(crate) fn set_interval(&mut self, index: usize, interval: u16) {
        if let Some(event) = self.events.get_mut(index) {
            event.interval = interval.max(1);
        }
    }

    /// Closes a recording of `length` events: playback starts untransposed.
    pub(crate) fn finish(&mut self, length: usize) {
        self.length = length.min(EVENTS_PER_PATTERN) as u8;
        self.transpose = (0, 0);
        self.recompute_total();
    }

    /// Restores a pattern from persisted parts. `total_time` is recomputed rather than trusted.
    pub(crate) fn restore(
        events: [PatternEvent; EVENTS_PER_PATTERN],
        length: usize,
        looping: bool,
        transpose: (i8, i8),
    ) -> Self {
        let mut pattern = Self {
            events,
            length: length.min(EVENTS_PER_PATTERN) as u8,
            total_time: 0,
            looping,
            transpose,
        };
        pattern.recompute_total();
        pattern
    }

    pub(crate) fn all_events(&self) -> &[PatternEvent; EVENTS_PER_PATTERN] {
        &self.events
    }

    fn recompute_total(&mut self) {
        self.total_time = self
            .events()
            .iter()
            .map(|event| u32::from(event.interval))
            .sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(intervals: &[u16]) -> Pattern {
        let mut pattern = Pattern::default();
        for (i, &interval) in intervals.iter().enumerate() {
            pattern.write(i, Step::Shape(Shape::POINT), i as u8, 0);
            pattern.set_interval(i, interval);
        }
        pattern.finish(intervals.len());
        pattern
    }

    fn intervals(pattern: &Pattern) -> impl Iterator<Item = u16> + '_ {
        pattern.events().iter().map(|event| event.interval)
    }

    #[test]
    fn total_time_is_sum_of_intervals() {
        let pattern = pattern(&[4, 9, 2]);
        assert_eq!(15, pattern.total_time(), "Expected left but got right");
        assert_eq!(3, pattern.len());
    }

    #[test]
    fn linearize() {
        let mut pattern = pattern(&[4, 9, 2, 7, 1]);
        pattern.linearize();
        assert!(intervals(&pattern).eq([4, 9, 4, 9, 4]), "Expected alternating note and rest");
        assert_eq!(30, pattern.total_time());
    }

    #[test]
    fn linearize_ignores_single_event() {
        let mut pattern = pattern(&[6]);
        pattern.linearize();
        assert!(intervals(&pattern).eq([6]));
    }

    #[test]
    fn halve_floors_at_one_tick() {
        let mut pattern = pattern(&[8, 3, 1]);
        pattern.halve_time();
        assert!(intervals(&pattern).eq([4, 1, 1]));
        assert_eq!(6, pattern.total_time());
    }

    #[test]
    fn halve_then_double_round_trips_even_intervals() {
        let original = pattern(&[12, 4, 30, 2]);
        let mut pattern = original;
        pattern.halve_time();
        pattern.double_time();
        assert_eq!(original, pattern, "Expected left but got right");
    }

    #[test]
    fn double_saturates() {
        let mut pattern = pattern(&[u16::MAX - 1]);
        pattern.double_time();
        assert!(intervals(&pattern).eq([u16::MAX]));
    }

    #[test]
    fn placement_clamps_to_grid() {
        let mut pattern = pattern(&[1, 1]);
        pattern.write(1, Step::Release, 14, 6);
        pattern.set_transpose(3, -9);
        assert_eq!(Some((15, 0)), pattern.placement(1), "Expected left but got right");
        assert_eq!(Some((3, 0)), pattern.placement(0));
        assert_eq!(None, pattern.placement(EVENTS_PER_PATTERN));
    }

    #[test]
    fn finish_resets_transpose() {
        let mut pattern = pattern(&[2]);
        pattern.set_transpose(1, 1);
        pattern.finish(1);
        assert_eq!((0, 0), pattern.transpose());
    }

    #[test]
    fn step_bytes() {
        assert_eq!(RELEASE_MARKER, Step::Release.to_byte());
        assert_eq!(Some(Step::Release), Step::from_byte(RELEASE_MARKER));
        assert_eq!(Some(Step::Shape(Shape::POINT)), Step::from_byte(0));
        assert_eq!(None, Step::from_byte(9));
    }
}
