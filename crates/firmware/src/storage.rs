//! Preset storage in the microcontroller's internal flash.
//!
//! Each preset owns one of the large sectors above the firmware, so that saving one never disturbs another. A record
//! is a header (the first-run key, a sequence number and the preset's glyph) followed by the preset blob. The preset
//! written most recently carries the highest sequence number, which is how the selection survives a power cycle
//! without a separate sector for it.

use defmt::*;
use embassy_stm32::{flash::Flash, mode::Blocking};
use lattice_lib::{
    Error,
    preset::{Glyph, PRESET_BLOB_LEN, PRESET_COUNT, PresetStorage},
};

/// Offset from the start of flash and size of sectors 4 through 11, one per preset.
const SECTORS: [(u32, u32); PRESET_COUNT] = [
    (0x20000, 0x20000),
    (0x40000, 0x40000),
    (0x80000, 0x40000),
    (0xC0000, 0x40000),
    (0x100000, 0x40000),
    (0x140000, 0x40000),
    (0x180000, 0x40000),
    (0x1C0000, 0x40000),
];

/// Marks a sector as holding a preset record; erased flash reads `0xFF`.
const FIRST_RUN_KEY: u8 = 0x22;

const HEADER_LEN: usize = 32;
const CHUNK_LEN: usize = 32;

pub struct FlashStorage {
    flash: Flash<'static, Blocking>,
    /// Sequence number of each slot's record, if it has one.
    sequences: [Option<u32>; PRESET_COUNT],
}

impl FlashStorage {
    pub fn new(mut flash: Flash<'static, Blocking>) -> Self {
        let sequences = core::array::from_fn(|slot| {
            let mut header = [0; HEADER_LEN];
            if let Err(e) = flash.blocking_read(SECTORS[slot].0, &mut header) {
                error!("Unable to read preset {} header: {}", slot, e);
                return None;
            }
            (header[0] == FIRST_RUN_KEY).then(|| u32::from_le_bytes([header[4], header[5], header[6], header[7]]))
        });
        Self { flash, sequences }
    }

    fn sector(index: u8) -> Result<(u32, u32), Error> {
        SECTORS.get(usize::from(index)).copied().ok_or(Error::PresetOutOfRange)
    }

    fn header(&mut self, index: u8) -> Result<[u8; HEADER_LEN], Error> {
        let (offset, _) = Self::sector(index)?;
        let mut header = [0; HEADER_LEN];
        self.flash.blocking_read(offset, &mut header).map_err(|e| {
            error!("Flash read failed: {}", e);
            Error::Storage
        })?;
        if header[0] != FIRST_RUN_KEY {
            return Err(Error::CorruptPreset);
        }
        Ok(header)
    }
}

impl PresetStorage for FlashStorage {
    fn is_fresh(&self) -> bool {
        self.sequences.iter().all(Option::is_none)
    }

    // every record carries the key, so writing the first preset is what initializes the medium
    fn mark_initialized(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn selected(&self) -> u8 {
        self.sequences
            .iter()
            .enumerate()
            .filter_map(|(slot, sequence)| sequence.map(|s| (s, slot as u8)))
            .max()
            .map_or(0, |(_, slot)| slot)
    }

    fn load(&mut self, index: u8, blob: &mut [u8; PRESET_BLOB_LEN]) -> Result<(), Error> {
        let (offset, _) = Self::sector(index)?;
        self.header(index)?;
        self.flash
            .blocking_read(offset + HEADER_LEN as u32, blob)
            .map_err(|e| {
                error!("Flash read failed: {}", e);
                Error::Storage
            })
    }

    fn store(&mut self, index: u8, blob: &[u8; PRESET_BLOB_LEN], glyph: &Glyph) -> Result<(), Error> {
        let (offset, size) = Self::sector(index)?;
        let sequence = self.sequences.iter().flatten().max().map_or(0, |s| s.wrapping_add(1));

        let mut header = [0xFF; HEADER_LEN];
        header[0] = FIRST_RUN_KEY;
        header[4..8].copy_from_slice(&sequence.to_le_bytes());
        header[8..16].copy_from_slice(&glyph.0);

        let storage_error = |e| {
            error!("Flash write failed: {}", e);
            Error::Storage
        };
        self.flash.blocking_erase(offset, offset + size).map_err(storage_error)?;
        self.flash.blocking_write(offset, &header).map_err(storage_error)?;

        // the flash takes whole, aligned chunks; pad the tail as if erased
        for (i, chunk) in blob.chunks(CHUNK_LEN).enumerate() {
            let mut padded = [0xFF; CHUNK_LEN];
            padded[..chunk.len()].copy_from_slice(chunk);
            let position = offset + (HEADER_LEN + i * CHUNK_LEN) as u32;
            self.flash.blocking_write(position, &padded).map_err(storage_error)?;
        }

        self.sequences[usize::from(index)] = Some(sequence);
        info!("Stored preset {} (sequence {})", index, sequence);
        Ok(())
    }

    fn glyph(&mut self, index: u8) -> Result<Glyph, Error> {
        let header = self.header(index)?;
        let mut rows = [0; 8];
        rows.copy_from_slice(&header[8..16]);
        Ok(Glyph(rows))
    }
}
