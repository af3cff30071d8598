//! Provides [`NoteStack`], which tracks the MIDI notes currently held so that releasing the sounding note can fall
//! back to the one held before it.

use tinyvec::{ArrayVec, array_vec};
use wmidi::{Note, U7, Velocity};

/// Number of held notes remembered. When exceeded, the oldest note is forgotten.
pub const NOTE_STACK_CAPACITY: usize = 16;

/// A held note and the velocity it was struck with.
///
/// Stored as [`U7`]s because [`tinyvec`] requires that items implement [`Default`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeldNote {
    note: U7,
    velocity: U7,
}

impl HeldNote {
    /// Constructs a held note.
    pub fn new(note: Note, velocity: Velocity) -> Self {
        Self {
            note: U7::from_u8_lossy(note as u8),
            velocity,
        }
    }

    /// Getter.
    pub fn note(&self) -> Note {
        Note::from(self.note)
    }

    /// Getter.
    pub fn velocity(&self) -> Velocity {
        self.velocity
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HeldNote {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "{} ({}) @ {}",
            self.note().to_str(),
            u8::from(self.note),
            u8::from(self.velocity)
        );
    }
}

/// Held notes in the order they were struck; the most recent is on top.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteStack {
    data: ArrayVec<[HeldNote; NOTE_STACK_CAPACITY]>,
}

impl Default for NoteStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for NoteStack {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "NoteStack {{ data: [");
        for (i, note) in self.data.iter().enumerate() {
            if i == 0 {
                defmt::write!(fmt, " ");
            } else {
                defmt::write!(fmt, ", ");
            }
            defmt::write!(fmt, "{}", note);
        }
        defmt::write!(fmt, " ] }}");
    }
}

impl NoteStack {
    /// Construct an empty `NoteStack`.
    pub fn new() -> Self {
        Self { data: array_vec!() }
    }

    /// Puts a note on top of the stack. A note already held is moved to the top with its new velocity; when the
    /// stack is full, the oldest note is dropped to make room.
    pub fn hold(&mut self, note: Note, velocity: Velocity) {
        let held = HeldNote::new(note, velocity);
        self.data.retain(|n| n.note != held.note);
        if self.data.len() == self.data.capacity() {
            self.data.remove(0);
        }
        self.data.push(held);
    }

    /// Removes a note wherever it is in the stack.
    pub fn release(&mut self, note: Note) {
        let u7 = U7::from_u8_lossy(note as u8);
        self.data.retain(|n| n.note != u7);
    }

    /// Forgets every note.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// The most recently struck note still held.
    pub fn last(&self) -> Option<HeldNote> {
        self.data.last().copied()
    }

    /// Determine if any notes are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Getter.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns an [`Iterator`] over the held notes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = HeldNote> + '_ {
        self.data.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOUD: Velocity = U7::from_u8_lossy(100);
    const SOFT: Velocity = U7::from_u8_lossy(20);

    fn chord() -> NoteStack {
        let mut stack = NoteStack::new();
        stack.hold(Note::E4, LOUD);
        stack.hold(Note::C4, LOUD);
        stack.hold(Note::G4, LOUD);
        stack
    }

    #[test]
    fn new() {
        let expected = NoteStack { data: array_vec!() };
        let actual = NoteStack::new();
        assert_eq!(expected, actual, "Expected left but got right");
    }

    #[test]
    fn hold_pushes_on_top() {
        let mut stack = chord();
        stack.hold(Note::D4, SOFT);
        assert_eq!(Some(HeldNote::new(Note::D4, SOFT)), stack.last());
        assert_eq!(4, stack.len());
    }

    #[test]
    fn repeated_hold_moves_note_to_top() {
        let mut stack = chord();
        stack.hold(Note::E4, SOFT);

        let mut iter = stack.iter().map(|held| held.note());
        assert_eq!(Some(Note::C4), iter.next());
        assert_eq!(Some(Note::G4), iter.next());
        assert_eq!(Some(Note::E4), iter.next());
        assert_eq!(None, iter.next());
        assert_eq!(SOFT, stack.last().map(|held| held.velocity()).unwrap_or(LOUD));
    }

    #[test]
    fn full_stack_evicts_oldest() {
        let mut stack = NoteStack::new();
        for n in 0..=NOTE_STACK_CAPACITY as u8 {
            stack.hold(Note::from(U7::from_u8_lossy(40 + n)), LOUD);
        }
        assert_eq!(NOTE_STACK_CAPACITY, stack.len());
        assert_eq!(
            Some(Note::from(U7::from_u8_lossy(41))),
            stack.iter().next().map(|held| held.note()),
            "Oldest note should have been dropped"
        );
        assert_eq!(
            Some(Note::from(U7::from_u8_lossy(56))),
            stack.last().map(|held| held.note())
        );
    }

    #[test]
    fn release_falls_back_to_previous() {
        let mut stack = chord();
        stack.release(Note::G4);
        assert_eq!(Some(Note::C4), stack.last().map(|held| held.note()));

        stack.release(Note::E4);
        assert_eq!(Some(Note::C4), stack.last().map(|held| held.note()), "Releasing a buried note keeps the top");
    }

    #[test]
    fn release_of_unheld_note_is_ignored() {
        let mut stack = chord();
        stack.release(Note::A0);
        assert_eq!(chord(), stack);
    }

    #[test]
    fn clear() {
        let mut stack = chord();
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(None, stack.last());
    }
}
