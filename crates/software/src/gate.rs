//! The gate output and its fixed-length pulse timer.

use crate::tables::EXP;

/// State of the gate output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Gate {
    high: bool,
    /// Sequencer ticks until a fixed-length pulse ends; 0 when no pulse is timing.
    pulse: u16,
}

impl Gate {
    /// Getter.
    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Asserts the gate.
    pub fn raise(&mut self) {
        self.high = true;
    }

    /// De-asserts the gate. A pulse in progress keeps timing but has nothing left to do.
    pub fn lower(&mut self) {
        self.high = false;
    }

    /// Starts (or restarts) a pulse that lowers the gate after a length derived from an 8-bit time code.
    pub fn start_pulse(&mut self, time: u8) {
        self.pulse = (EXP[usize::from(time)] >> 2) + 2;
    }

    /// Counts down a pulse by one sequencer tick. Returns `true` when the pulse ends and lowers the gate.
    pub fn tick(&mut self) -> bool {
        match self.pulse {
            0 => false,
            1 => {
                self.pulse = 0;
                self.high = false;
                true
            }
            _ => {
                self.pulse -= 1;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_length_follows_time_code() {
        let mut gate = Gate::default();
        gate.raise();
        gate.start_pulse(0);

        // EXP[0] == 0, so the shortest pulse lasts two ticks
        assert!(!gate.tick());
        assert!(gate.is_high());
        assert!(gate.tick(), "Pulse should end on the second tick");
        assert!(!gate.is_high());
        assert!(!gate.tick(), "A finished pulse should stay finished");
    }

    #[test]
    fn longer_time_codes_give_longer_pulses() {
        let mut gate = Gate::default();
        gate.raise();
        gate.start_pulse(255);
        let expected = usize::from(EXP[255] >> 2) + 2;
        let ticks = (1..).find(|_| gate.tick()).unwrap_or(0);
        assert_eq!(expected, ticks, "Expected left but got right");
    }
}
