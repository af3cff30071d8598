//! Presets: the complete saved state of a performance, and the storage they persist to.
//!
//! A [`Preset`] is persisted as a fixed-size little-endian blob of [`PRESET_BLOB_LEN`] bytes. The storage medium
//! itself is a collaborator, abstracted as [`PresetStorage`]; [`RamStorage`] keeps presets in memory for hosts and
//! tests.

use num_traits::{FromPrimitive, ToPrimitive};

use crate::{
    configuration::EdgeMode,
    error::Error,
    gesture::{GRID_HEIGHT, GRID_WIDTH},
    pattern::{EVENTS_PER_PATTERN, PATTERN_COUNT, Pattern, PatternEvent, Step},
};

/// Number of preset slots.
pub const PRESET_COUNT: usize = 8;

/// Number of shape rows in the CV and slew tables (one per non-point shape).
pub const SHAPE_ROWS: usize = 8;

/// Number of CV outputs a shape row controls.
pub const CV_CHANNELS: usize = 3;

const HEADER_LEN: usize = 6 + 2 * 2 * SHAPE_ROWS * CV_CHANNELS + GRID_WIDTH as usize;
const EVENT_LEN: usize = 5;
const PATTERN_LEN: usize = 4 + EVENT_LEN * EVENTS_PER_PATTERN;

/// Size of an encoded [`Preset`].
pub const PRESET_BLOB_LEN: usize = HEADER_LEN + PATTERN_LEN * PATTERN_COUNT;

/// An 8×8 bitmap drawn by the performer to identify a preset on the browse screen. Byte `n` is row `n`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Glyph(pub [u8; 8]);

impl Glyph {
    /// The glyph a slot is given on first run: a diagonal staircase as long as the slot's number.
    pub fn staircase(index: usize) -> Self {
        let mut rows = [0; 8];
        for (row, bits) in rows.iter_mut().enumerate().take(index + 1) {
            *bits = 1 << row;
        }
        Self(rows)
    }

    /// Flips one cell.
    pub fn toggle(&mut self, x: u8, y: u8) {
        if let Some(row) = self.0.get_mut(usize::from(y)) {
            *row ^= 1_u8.checked_shl(u32::from(x)).unwrap_or(0);
        }
    }

    /// Returns `true` if the cell is lit.
    pub fn is_set(&self, x: u8, y: u8) -> bool {
        self.0
            .get(usize::from(y))
            .is_some_and(|row| x < 8 && row & (1 << x) != 0)
    }
}

/// Everything a performer saves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Preset {
    /// Gate behavior.
    pub edge: EdgeMode,
    /// Time code for [`EdgeMode::Fixed`] pulses.
    pub edge_fixed_time: u8,
    /// Selected pattern.
    pub pattern: u8,
    /// Most recently selected shape row.
    pub shape: u8,
    /// Whether live shapes transpose the pattern rather than play.
    pub arp: bool,
    /// Portamento time code.
    pub port_time: u8,
    /// CV targets per shape row and output.
    pub cv: [[u16; CV_CHANNELS]; SHAPE_ROWS],
    /// Slew per shape row and output. Values at or above the slew-off threshold leave the output alone.
    pub slew: [[u16; CV_CHANNELS]; SHAPE_ROWS],
    /// Breadcrumb cells lit by the performer in Slew mode; byte `x` is column `x`, bit `y` is row `y`.
    pub help: [u8; GRID_WIDTH as usize],
    /// Recorded patterns.
    pub patterns: [Pattern; PATTERN_COUNT],
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            edge: EdgeMode::Standard,
            edge_fixed_time: 10,
            pattern: 0,
            shape: 0,
            arp: false,
            port_time: 20,
            cv: [[0; CV_CHANNELS]; SHAPE_ROWS],
            slew: [[0; CV_CHANNELS]; SHAPE_ROWS],
            help: [0; GRID_WIDTH as usize],
            patterns: [Pattern::default(); PATTERN_COUNT],
        }
    }
}

impl Preset {
    /// The selected pattern.
    pub fn current_pattern(&self) -> &Pattern {
        &self.patterns[usize::from(self.pattern) % PATTERN_COUNT]
    }

    /// The selected pattern, mutably.
    pub fn current_pattern_mut(&mut self) -> &mut Pattern {
        &mut self.patterns[usize::from(self.pattern) % PATTERN_COUNT]
    }

    /// Returns `true` if the breadcrumb at the cell is lit.
    pub fn help(&self, x: u8, y: u8) -> bool {
        self.help
            .get(usize::from(x))
            .is_some_and(|column| y < GRID_HEIGHT && column & (1 << y) != 0)
    }

    /// Flips the breadcrumb at the cell.
    pub fn toggle_help(&mut self, x: u8, y: u8) {
        if let Some(column) = self.help.get_mut(usize::from(x)) {
            if y < GRID_HEIGHT {
                *column ^= 1 << y;
            }
        }
    }

    /// Writes the preset into `blob`.
    pub fn encode(&self, blob: &mut [u8; PRESET_BLOB_LEN]) {
        let mut writer = Writer { blob, position: 0 };
        writer.u8(self.edge.to_u8().unwrap_or_default());
        writer.u8(self.edge_fixed_time);
        writer.u8(self.pattern);
        writer.u8(self.shape);
        writer.u8(u8::from(self.arp));
        writer.u8(self.port_time);
        for table in [&self.cv, &self.slew] {
            for value in table.iter().flatten() {
                writer.u16(*value);
            }
        }
        for column in self.help {
            writer.u8(column);
        }
        for pattern in self.patterns.iter() {
            let (tx, ty) = pattern.transpose();
            writer.u8(pattern.len() as u8);
            writer.u8(u8::from(pattern.looping));
            writer.u8(tx as u8);
            writer.u8(ty as u8);
            for event in pattern.all_events() {
                writer.u8(event.step.to_byte());
                writer.u8(event.x);
                writer.u8(event.y);
                writer.u16(event.interval);
            }
        }
    }

    /// Reads a preset written by [`encode`](Self::encode).
    ///
    /// Every field is range-checked; a blob that fails any check is rejected whole with [`Error::CorruptPreset`].
    pub fn decode(blob: &[u8; PRESET_BLOB_LEN]) -> Result<Self, Error> {
        let mut reader = Reader { blob, position: 0 };
        let mut preset = Self {
            edge: EdgeMode::from_u8(reader.u8()).ok_or(Error::CorruptPreset)?,
            edge_fixed_time: reader.u8(),
            pattern: reader.bounded(PATTERN_COUNT)?,
            shape: reader.bounded(SHAPE_ROWS)?,
            arp: reader.u8() != 0,
            port_time: reader.u8(),
            ..Self::default()
        };
        for table in [&mut preset.cv, &mut preset.slew] {
            for value in table.iter_mut().flatten() {
                *value = reader.u16();
            }
        }
        for column in preset.help.iter_mut() {
            *column = reader.u8();
        }
        for pattern in preset.patterns.iter_mut() {
            let length = usize::from(reader.bounded(EVENTS_PER_PATTERN + 1)?);
            let looping = reader.u8() != 0;
            let transpose = (reader.u8() as i8, reader.u8() as i8);
            let mut events = [PatternEvent::default(); EVENTS_PER_PATTERN];
            for event in events.iter_mut() {
                *event = PatternEvent {
                    step: Step::from_byte(reader.u8()).ok_or(Error::CorruptPreset)?,
                    x: reader.bounded(usize::from(GRID_WIDTH))?,
                    y: reader.bounded(usize::from(GRID_HEIGHT))?,
                    interval: reader.u16().max(1),
                };
            }
            *pattern = Pattern::restore(events, length, looping, transpose);
        }
        Ok(preset)
    }
}

struct Writer<'a> {
    blob: &'a mut [u8; PRESET_BLOB_LEN],
    position: usize,
}

impl Writer<'_> {
    fn u8(&mut self, value: u8) {
        self.blob[self.position] = value;
        self.position += 1;
    }

    fn u16(&mut self, value: u16) {
        for byte in value.to_le_bytes() {
            self.u8(byte);
        }
    }
}

struct Reader<'a> {
    blob: &'a [u8; PRESET_BLOB_LEN],
    position: usize,
}

impl Reader<'_> {
    fn u8(&mut self) -> u8 {
        let value = self.blob[self.position];
        self.position += 1;
        value
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes([self.u8(), self.u8()])
    }

    /// Reads a byte which must be less than `limit`.
    fn bounded(&mut self, limit: usize) -> Result<u8, Error> {
        let value = self.u8();
        if usize::from(value) < limit {
            Ok(value)
        } else {
            Err(Error::CorruptPreset)
        }
    }
}

/// Non-volatile storage for preset blobs and their glyphs.
pub trait PresetStorage {
    /// Returns `true` if the medium has never been initialized, i.e. this is the instrument's first run.
    fn is_fresh(&self) -> bool;

    /// Records that the medium has been initialized, so that [`is_fresh`](Self::is_fresh) returns `false` from now
    /// on.
    fn mark_initialized(&mut self) -> Result<(), Error>;

    /// Index of the most recently stored preset.
    fn selected(&self) -> u8;

    /// Reads a preset blob.
    fn load(&mut self, index: u8, blob: &mut [u8; PRESET_BLOB_LEN]) -> Result<(), Error>;

    /// Writes a preset blob and its glyph, and marks the preset as selected.
    fn store(&mut self, index: u8, blob: &[u8; PRESET_BLOB_LEN], glyph: &Glyph) -> Result<(), Error>;

    /// Reads a preset's glyph.
    fn glyph(&mut self, index: u8) -> Result<Glyph, Error>;
}

/// Volatile [`PresetStorage`] held in memory.
#[derive(Clone, Debug)]
pub struct RamStorage {
    initialized: bool,
    selected: u8,
    blobs: [[u8; PRESET_BLOB_LEN]; PRESET_COUNT],
    glyphs: [Glyph; PRESET_COUNT],
}

impl Default for RamStorage {
    fn default() -> Self {
        Self {
            initialized: false,
            selected: 0,
            blobs: [[0; PRESET_BLOB_LEN]; PRESET_COUNT],
            glyphs: [Glyph::default(); PRESET_COUNT],
        }
    }
}

impl RamStorage {
    fn slot(index: u8) -> Result<usize, Error> {
        let index = usize::from(index);
        if index < PRESET_COUNT {
            Ok(index)
        } else {
            Err(Error::PresetOutOfRange)
        }
    }
}

impl PresetStorage for RamStorage {
    fn is_fresh(&self) -> bool {
        !self.initialized
    }

    fn mark_initialized(&mut self) -> Result<(), Error> {
        self.initialized = true;
        Ok(())
    }

    fn selected(&self) -> u8 {
        self.selected
    }

    fn load(&mut self, index: u8, blob: &mut [u8; PRESET_BLOB_LEN]) -> Result<(), Error> {
        blob.copy_from_slice(&self.blobs[Self::slot(index)?]);
        Ok(())
    }

    fn store(&mut self, index: u8, blob: &[u8; PRESET_BLOB_LEN], glyph: &Glyph) -> Result<(), Error> {
        let slot = Self::slot(index)?;
        self.blobs[slot].copy_from_slice(blob);
        self.glyphs[slot] = *glyph;
        self.selected = index;
        Ok(())
    }

    fn glyph(&mut self, index: u8) -> Result<Glyph, Error> {
        Ok(self.glyphs[Self::slot(index)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::Shape;

    fn performed() -> Preset {
        let mut preset = Preset {
            edge: EdgeMode::Drone,
            edge_fixed_time: 200,
            pattern: 3,
            shape: 5,
            arp: true,
            port_time: 77,
            ..Preset::default()
        };
        preset.cv[5] = [4095, 12, 2048];
        preset.slew[7] = [4000, 0, 300];
        preset.toggle_help(15, 7);
        let pattern = &mut preset.patterns[3];
        pattern.write(0, Step::Shape(Shape::POINT), 4, 4);
        pattern.set_interval(0, 700);
        pattern.write(1, Step::Release, 4, 4);
        pattern.finish(2);
        pattern.looping = true;
        pattern.set_transpose(-3, 2);
        preset
    }

    #[test]
    fn blob_round_trip() {
        let preset = performed();
        let mut blob = [0; PRESET_BLOB_LEN];
        preset.encode(&mut blob);
        assert_eq!(Ok(preset), Preset::decode(&blob), "Expected left but got right");
    }

    #[test]
    fn corrupt_blobs_are_rejected() {
        let mut blob = [0; PRESET_BLOB_LEN];
        Preset::default().encode(&mut blob);

        let mut bad_edge = blob;
        bad_edge[0] = 3;
        assert_eq!(Err(Error::CorruptPreset), Preset::decode(&bad_edge));

        let mut bad_pattern = blob;
        bad_pattern[2] = PATTERN_COUNT as u8;
        assert_eq!(Err(Error::CorruptPreset), Preset::decode(&bad_pattern));

        let mut bad_length = blob;
        bad_length[HEADER_LEN] = EVENTS_PER_PATTERN as u8 + 1;
        assert_eq!(Err(Error::CorruptPreset), Preset::decode(&bad_length));

        let mut bad_step = blob;
        bad_step[HEADER_LEN + 4] = 42;
        assert_eq!(Err(Error::CorruptPreset), Preset::decode(&bad_step));
    }

    #[test]
    fn defaults() {
        let preset = Preset::default();
        assert_eq!(EdgeMode::Standard, preset.edge);
        assert_eq!(10, preset.edge_fixed_time);
        assert_eq!(20, preset.port_time);
        assert!(preset.patterns.iter().all(Pattern::is_empty));
    }

    #[test]
    fn help_bits() {
        let mut preset = Preset::default();
        preset.toggle_help(3, 6);
        assert!(preset.help(3, 6));
        assert_eq!(1 << 6, preset.help[3]);
        preset.toggle_help(3, 6);
        assert!(!preset.help(3, 6));
        preset.toggle_help(16, 0);
        preset.toggle_help(0, 8);
        assert_eq!([0; GRID_WIDTH as usize], preset.help, "Off-grid cells should be ignored");
    }

    #[test]
    fn staircase_glyphs() {
        assert_eq!(Glyph([1, 0, 0, 0, 0, 0, 0, 0]), Glyph::staircase(0));
        assert_eq!(Glyph([1, 2, 4, 0, 0, 0, 0, 0]), Glyph::staircase(2));
        assert_eq!(Glyph([1, 2, 4, 8, 16, 32, 64, 128]), Glyph::staircase(7));
    }

    #[test]
    fn glyph_toggle() {
        let mut glyph = Glyph::default();
        glyph.toggle(7, 7);
        assert!(glyph.is_set(7, 7));
        assert_eq!(128, glyph.0[7]);
        glyph.toggle(8, 0);
        assert!(!glyph.is_set(8, 0));
    }

    #[test]
    fn ram_storage() {
        let mut storage = RamStorage::default();
        assert!(storage.is_fresh());
        storage.mark_initialized().unwrap();
        assert!(!storage.is_fresh());

        let mut blob = [0; PRESET_BLOB_LEN];
        performed().encode(&mut blob);
        storage.store(5, &blob, &Glyph::staircase(1)).unwrap();
        assert_eq!(5, storage.selected(), "Storing should select the preset");
        assert_eq!(Ok(Glyph::staircase(1)), storage.glyph(5));

        let mut loaded = [0; PRESET_BLOB_LEN];
        storage.load(5, &mut loaded).unwrap();
        assert_eq!(Ok(performed()), Preset::decode(&loaded));

        assert_eq!(Err(Error::PresetOutOfRange), storage.load(8, &mut loaded));
    }
}
