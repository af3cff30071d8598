//! Potentiometer input with hysteresis.
//!
//! Each pot is latched at its reading whenever the context it controls changes (mode switches, shape changes). A pot
//! stays inactive until its smoothed reading wanders more than [`POT_HYSTERESIS`] codes from the latch, after which
//! every reading is passed through. This keeps a pot left at one position from stomping a freshly recalled value.

/// Number of pots.
pub const POT_COUNT: usize = 3;

/// Distance, in ADC codes, a pot must travel from its latch before it takes effect.
pub const POT_HYSTERESIS: u16 = 48;

/// How pot readings are applied; chosen by whichever controller is driving the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PotMapping {
    /// Pots edit CV, slew, portamento and fixed gate time for the grid.
    #[default]
    Grid,
    /// Pots set portamento time and the tracking and velocity curves for MIDI.
    Midi,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Latch {
    value: u16,
    active: bool,
}

/// Hysteresis latches for every pot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pots {
    latches: [Latch; POT_COUNT],
    /// Previous raw reading, for smoothing.
    last: [u16; POT_COUNT],
    /// Most recent raw reading.
    current: [u16; POT_COUNT],
}

impl Pots {
    /// Re-latches every pot at its most recent reading and deactivates it.
    pub fn reset(&mut self) {
        for (i, latch) in self.latches.iter_mut().enumerate() {
            latch.value = self.current[i];
            latch.active = false;
            self.last[i] = self.current[i];
        }
    }

    /// Returns `true` if the pot has left its latch.
    pub fn is_active(&self, pot: usize) -> bool {
        self.latches.get(pot).is_some_and(|latch| latch.active)
    }

    /// Feeds one reading per pot. Returns the smoothed value of every active pot.
    ///
    /// A pot that crosses the threshold on this poll becomes active but reports from the next poll on.
    pub fn poll(&mut self, readings: [u16; POT_COUNT]) -> [Option<u16>; POT_COUNT] {
        let mut values = [None; POT_COUNT];
        for (i, &reading) in readings.iter().enumerate() {
            let smoothed = ((u32::from(reading) + u32::from(self.last[i])) / 2) as u16;
            let latch = &mut self.latches[i];
            if latch.active {
                values[i] = Some(smoothed);
            } else if smoothed.abs_diff(latch.value) > POT_HYSTERESIS {
                trace!("Pot {} left its latch at {}", i, smoothed);
                latch.active = true;
            }
            self.last[i] = reading;
        }
        self.current = readings;
        values
    }
}
