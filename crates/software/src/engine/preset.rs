use super::Engine;
use crate::{
    error::Error,
    preset::{Preset, PresetStorage},
};

impl<S: PresetStorage> Engine<S> {
    /// Replaces the live preset with a stored one and makes it the save target. Outputs are left where they are.
    pub(super) fn load_preset(&mut self, index: u8) -> Result<(), Error> {
        self.storage.load(index, &mut self.blob)?;
        self.preset = Preset::decode(&self.blob)?;
        self.browse.index = index;
        self.dirty = true;
        info!("Loaded preset {}", index);
        Ok(())
    }

    /// Loads a stored preset along with its glyph and jumps the outputs to it.
    pub(super) fn recall(&mut self, index: u8) -> Result<(), Error> {
        self.load_preset(index)?;
        self.browse.glyph = self.storage.glyph(index)?;
        self.restore_outputs();
        Ok(())
    }

    /// Writes the live preset and the browse glyph to the selected slot.
    pub(super) fn save(&mut self) {
        let index = self.browse.index;
        self.preset.encode(&mut self.blob);
        match self.storage.store(index, &self.blob, &self.browse.glyph) {
            Ok(()) => info!("Saved preset {}", index),
            Err(error) => error!("Could not save preset {}: {}", index, error),
        }
        self.dirty = true;
    }
}
