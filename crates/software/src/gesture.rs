//! Provides the [`Recognizer`], which turns key presses on the grid into [`Shape`]s and [`MetaGesture`]s.
//!
//! A gesture is read from the 3×3 neighborhood anchored at the top-left corner of the held keys. Recognition waits a
//! few sequencer ticks after the first key goes down so that the rest of a chord can land; isolated presses and
//! presses made while another shape is sustained are recognized immediately as points.

/// Number of columns on the grid.
pub const GRID_WIDTH: u8 = 16;

/// Number of rows on the grid.
pub const GRID_HEIGHT: u8 = 8;

/// Ticks to wait after the first key of a gesture before reading the neighborhood.
pub const RECOGNITION_TICKS: u8 = 5;

/// A press further than this many cells (in either axis) from the previous key starts a new, isolated point.
const ISOLATION_DISTANCE: u8 = 2;

/// Neighborhood masks, three bits per row, most significant row and column first. Indices 0–8 are shapes, 9–14 are
/// meta-gestures. The first match wins.
const SHAPE_PATTERN: [u16; 15] = [
    256, 288, 160, 384, 272, 292, 84, 448, 273, 432, 325, 168, 336, 276, 162,
];

/// Row correction applied to the anchor of each shape, so that the anchor is the shape's first key.
const SHAPE_OFF_Y: [u8; Shape::COUNT as usize] = [0, 1, 1, 0, 0, 2, 2, 0, 0];

/// One of the nine glyphs a performer can draw: a point (0) or one of eight lines and diagonals (1–8).
///
/// Every shape other than the point selects a row of the preset's CV and slew tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Shape(u8);

impl Shape {
    /// A single key.
    pub const POINT: Self = Self(0);

    /// Number of distinct shapes.
    pub const COUNT: u8 = 9;

    /// Returns the shape with the given index, if there is one.
    pub fn new(index: u8) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index))
    }

    /// Getter.
    pub fn index(self) -> u8 {
        self.0
    }

    /// Returns `true` for the single-key shape.
    pub fn is_point(self) -> bool {
        self.0 == 0
    }

    /// The row of the preset's CV and slew tables this shape selects; `None` for a point.
    pub fn row(self) -> Option<usize> {
        usize::from(self.0).checked_sub(1)
    }

    /// Shapes 0–4 set pitch and trigger the gate when drawn by hand; the longer lines only change CV.
    pub fn is_melodic(self) -> bool {
        self.0 < 5
    }
}

/// Gestures which manipulate the engine rather than its outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MetaGesture {
    /// Subsequent pot moves write to every shape row at once.
    EditAll,
    /// Force the current pattern into an even note/rest rhythm.
    Linearize,
    /// Halve every interval of the current pattern.
    HalveTime,
    /// Double every interval of the current pattern.
    DoubleTime,
    /// Select and play the next pattern.
    NextPattern,
    /// Select and play the previous pattern.
    PreviousPattern,
}

impl MetaGesture {
    fn from_index(index: usize) -> Option<Self> {
        match index {
            9 => Some(Self::EditAll),
            10 => Some(Self::Linearize),
            11 => Some(Self::HalveTime),
            12 => Some(Self::DoubleTime),
            13 => Some(Self::NextPattern),
            14 => Some(Self::PreviousPattern),
            _ => None,
        }
    }
}

/// What the recognizer concluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    /// A shape anchored at a grid cell.
    Shape {
        /// The recognized glyph.
        shape: Shape,
        /// Anchor column.
        x: u8,
        /// Anchor row.
        y: u8,
    },
    /// A control gesture.
    Meta(MetaGesture),
}

impl Gesture {
    fn point(x: u8, y: u8) -> Self {
        Self::Shape {
            shape: Shape::POINT,
            x,
            y,
        }
    }
}

/// Outcome of releasing a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Release {
    /// Other shape keys are still down.
    StillHeld,
    /// The last shape key came up. If recognition was still pending, it resolved as a point at the last key pressed.
    AllReleased {
        /// The point the pending recognition resolved to, if any.
        pending: Option<Gesture>,
    },
}

/// Tracks held shape keys and the recognition countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Recognizer {
    /// One bit per column, one word per row.
    key_map: [u16; GRID_HEIGHT as usize],
    shape_keys: u8,
    min_x: u8,
    min_y: u8,
    last_x: u8,
    last_y: u8,
    countdown: u8,
    legato: bool,
}

impl Default for Recognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer {
    /// Constructs a recognizer with no keys held.
    pub fn new() -> Self {
        Self {
            key_map: [0; GRID_HEIGHT as usize],
            shape_keys: 0,
            min_x: GRID_WIDTH - 1,
            min_y: GRID_HEIGHT - 1,
            last_x: 0,
            last_y: 0,
            countdown: 0,
            legato: false,
        }
    }

    /// Forgets every held key, e.g. when a grid is (re)connected.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Returns `true` while a shape is being sustained; further presses become immediate points.
    pub fn is_legato(&self) -> bool {
        self.legato
    }

    /// Marks the current shape as sustained until every shape key is released.
    pub fn hold_legato(&mut self) {
        self.legato = true;
    }

    /// Returns `true` if a recognition is waiting on the countdown.
    pub fn is_pending(&self) -> bool {
        self.countdown > 0
    }

    /// Number of keys held outside the function column.
    pub fn shape_keys(&self) -> u8 {
        self.shape_keys
    }

    /// Abandons any pending recognition without emitting anything.
    pub fn cancel(&mut self) {
        self.countdown = 0;
    }

    /// Registers a key-down outside the function column. Must precede [`detect`](Self::detect); is also called in
    /// modes that don't recognize shapes so that the held-key map stays accurate.
    pub fn press(&mut self, x: u8, y: u8) {
        if x >= GRID_WIDTH || y >= GRID_HEIGHT {
            return;
        }
        self.key_map[usize::from(y)] |= 1 << x;
        self.shape_keys = self.shape_keys.saturating_add(1);
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
    }

    /// Runs recognition for a key just registered with [`press`](Self::press).
    ///
    /// `keys_held` counts every key held on the grid, function column included. Returns a point immediately when the
    /// press is isolated from the previous key or made during legato; otherwise (re)starts the countdown.
    pub fn detect(&mut self, x: u8, y: u8, keys_held: usize) -> Option<Gesture> {
        if self.legato {
            return Some(Gesture::point(x, y));
        }

        let gesture = if keys_held == 1 {
            self.countdown = RECOGNITION_TICKS;
            None
        } else if x.abs_diff(self.last_x) > ISOLATION_DISTANCE || y.abs_diff(self.last_y) > ISOLATION_DISTANCE {
            self.countdown = 0;
            Some(Gesture::point(x, y))
        } else {
            self.countdown = RECOGNITION_TICKS;
            None
        };

        self.last_x = x;
        self.last_y = y;
        gesture
    }

    /// Registers a key-up outside the function column.
    pub fn release(&mut self, x: u8, y: u8) -> Release {
        if x < GRID_WIDTH && y < GRID_HEIGHT {
            self.key_map[usize::from(y)] &= !(1 << x);
        }
        let was_pending = self.is_pending();
        self.countdown = 0;
        self.shape_keys = self.shape_keys.saturating_sub(1);

        if self.shape_keys > 0 {
            return Release::StillHeld;
        }

        self.min_x = GRID_WIDTH - 1;
        self.min_y = GRID_HEIGHT - 1;
        self.legato = false;
        Release::AllReleased {
            pending: was_pending.then(|| Gesture::point(self.last_x, self.last_y)),
        }
    }

    /// Advances the countdown by one sequencer tick, returning the gesture once it resolves.
    pub fn tick(&mut self) -> Option<Gesture> {
        if self.countdown == 0 {
            return None;
        }
        self.countdown -= 1;
        if self.countdown > 0 {
            return None;
        }

        let mask = self.mask();
        let gesture = match SHAPE_PATTERN.iter().position(|&pattern| pattern == mask) {
            Some(index) if index < usize::from(Shape::COUNT) => Gesture::Shape {
                shape: Shape(index as u8),
                x: self.min_x,
                y: self.min_y + SHAPE_OFF_Y[index],
            },
            Some(index) => MetaGesture::from_index(index)
                .map(Gesture::Meta)
                .unwrap_or(Gesture::point(self.last_x, self.last_y)),
            None => Gesture::point(self.last_x, self.last_y),
        };
        debug!("Resolved gesture from mask {}", mask);
        Some(gesture)
    }

    /// Samples the 3×3 neighborhood at the top-left of the held keys.
    fn mask(&self) -> u16 {
        let mut mask = 0;
        for dy in 0..3 {
            let row = self
                .key_map
                .get(usize::from(self.min_y + dy))
                .copied()
                .unwrap_or(0);
            for dx in 0..3 {
                mask <<= 1;
                let x = self.min_x + dx;
                if x < GRID_WIDTH && row & (1 << x) != 0 {
                    mask |= 1;
                }
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(recognizer: &mut Recognizer, x: u8, y: u8, keys_held: usize) -> Option<Gesture> {
        recognizer.press(x, y);
        recognizer.detect(x, y, keys_held)
    }

    fn resolve(recognizer: &mut Recognizer) -> Option<Gesture> {
        (0..RECOGNITION_TICKS).find_map(|_| recognizer.tick())
    }

    #[test]
    fn single_key_is_a_point_after_countdown() {
        let mut recognizer = Recognizer::new();
        assert_eq!(None, press(&mut recognizer, 4, 3, 1));
        for _ in 1..RECOGNITION_TICKS {
            assert_eq!(None, recognizer.tick(), "Should still be waiting");
        }
        assert_eq!(
            Some(Gesture::point(4, 3)),
            recognizer.tick(),
            "Expected left but got right"
        );
        assert_eq!(None, recognizer.tick(), "Countdown should not fire twice");
    }

    #[test]
    fn horizontal_pair() {
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 3, 2, 1);
        recognizer.tick();
        assert_eq!(None, press(&mut recognizer, 4, 2, 2), "Nearby key should restart the countdown");
        let expected = Gesture::Shape {
            shape: Shape(3),
            x: 3,
            y: 2,
        };
        assert_eq!(Some(expected), resolve(&mut recognizer), "Expected left but got right");
    }

    #[test]
    fn row_offset_is_applied() {
        // shape 1 is a vertical pair anchored at its lower key
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 6, 4, 1);
        press(&mut recognizer, 6, 5, 2);
        let expected = Gesture::Shape {
            shape: Shape(1),
            x: 6,
            y: 5,
        };
        assert_eq!(Some(expected), resolve(&mut recognizer), "Expected left but got right");
    }

    #[test]
    fn meta_gesture() {
        // 325 == 101 000 101: four corners
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 2, 2, 1);
        press(&mut recognizer, 4, 2, 2);
        press(&mut recognizer, 2, 4, 3);
        press(&mut recognizer, 4, 4, 4);
        assert_eq!(
            Some(Gesture::Meta(MetaGesture::Linearize)),
            resolve(&mut recognizer),
            "Expected left but got right"
        );
    }

    #[test]
    fn unmatched_mask_falls_back_to_point_at_last_key() {
        // 100 000 001 is not in the table
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 5, 1, 1);
        press(&mut recognizer, 7, 3, 2);
        assert_eq!(Some(Gesture::point(7, 3)), resolve(&mut recognizer));
    }

    #[test]
    fn isolated_key_is_an_immediate_point() {
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 1, 1, 1);
        assert_eq!(
            Some(Gesture::point(9, 1)),
            press(&mut recognizer, 9, 1, 2),
            "Expected left but got right"
        );
        assert!(!recognizer.is_pending(), "Immediate point should cancel the countdown");
    }

    #[test]
    fn legato_makes_every_press_a_point() {
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 5, 5, 1);
        resolve(&mut recognizer);
        recognizer.hold_legato();

        assert_eq!(Some(Gesture::point(6, 5)), press(&mut recognizer, 6, 5, 2));
        assert!(!recognizer.is_pending());
    }

    #[test]
    fn release_before_resolution_emits_point() {
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 8, 6, 1);
        recognizer.tick();
        assert_eq!(
            Release::AllReleased {
                pending: Some(Gesture::point(8, 6))
            },
            recognizer.release(8, 6),
            "Expected left but got right"
        );
        assert_eq!(None, resolve(&mut recognizer), "Nothing should be left to resolve");
    }

    #[test]
    fn release_with_keys_still_held_cancels() {
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 8, 6, 1);
        press(&mut recognizer, 9, 6, 2);
        assert_eq!(Release::StillHeld, recognizer.release(9, 6));
        assert!(!recognizer.is_pending());
    }

    #[test]
    fn full_release_resets_legato_and_bounds() {
        let mut recognizer = Recognizer::new();
        press(&mut recognizer, 2, 2, 1);
        resolve(&mut recognizer);
        recognizer.hold_legato();
        assert_eq!(
            Release::AllReleased { pending: None },
            recognizer.release(2, 2)
        );
        assert!(!recognizer.is_legato());

        // bounding box must have reset, or this would anchor at (2, 2)
        press(&mut recognizer, 12, 6, 1);
        assert_eq!(Some(Gesture::point(12, 6)), resolve(&mut recognizer));
    }

    #[test]
    fn shape_rows() {
        assert_eq!(None, Shape::POINT.row());
        assert_eq!(Some(7), Shape(8).row());
        assert_eq!(None, Shape::new(9));
        assert!(Shape(4).is_melodic());
        assert!(!Shape(5).is_melodic());
    }
}
