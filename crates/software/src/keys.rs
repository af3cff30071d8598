//! Tracks every key held on the grid so that long presses can be told from taps.

use tinyvec::{ArrayVec, array_vec};

/// Key timer firings before a held key counts as a long press.
pub const LONG_PRESS_TICKS: u8 = 10;

/// Long-press threshold for the portamento key, which distinguishes a tap from a hold much sooner.
pub const PORTAMENTO_LONG_PRESS_TICKS: u8 = 3;

/// Maximum number of keys tracked at once; further presses are not timed.
pub const MAX_HELD_KEYS: usize = 32;

/// Grid position of the portamento key.
pub const PORTAMENTO_KEY: (u8, u8) = (0, 7);

/// How a key was released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Press {
    /// Released before its long-press timer ran out.
    Tap,
    /// Released after its long-press timer ran out (or was never timed).
    Long,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct HeldKey {
    x: u8,
    y: u8,
    /// Key timer firings until the press becomes long; 0 once it has.
    remaining: u8,
}

/// Keys currently held, in the order they were pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeldKeys {
    keys: ArrayVec<[HeldKey; MAX_HELD_KEYS]>,
}

impl Default for HeldKeys {
    fn default() -> Self {
        Self { keys: array_vec!() }
    }
}

impl HeldKeys {
    /// Starts timing a key.
    pub fn press(&mut self, x: u8, y: u8) {
        self.keys.retain(|key| (key.x, key.y) != (x, y));
        let remaining = if (x, y) == PORTAMENTO_KEY {
            PORTAMENTO_LONG_PRESS_TICKS
        } else {
            LONG_PRESS_TICKS
        };
        if self.keys.try_push(HeldKey { x, y, remaining }).is_some() {
            warn!("Too many keys held; ({}, {}) will not be timed", x, y);
        }
    }

    /// Stops timing a key and reports whether it was a tap.
    pub fn release(&mut self, x: u8, y: u8) -> Press {
        let Some(index) = self.keys.iter().position(|key| (key.x, key.y) == (x, y)) else {
            return Press::Long;
        };
        let key = self.keys.remove(index);
        if key.remaining > 0 {
            Press::Tap
        } else {
            Press::Long
        }
    }

    /// Number of keys held.
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// Forgets every key, e.g. when a grid is (re)connected.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Advances every key's timer by one key-timer firing and returns the keys whose press just became long.
    pub fn tick(&mut self) -> ArrayVec<[(u8, u8); MAX_HELD_KEYS]> {
        let mut expired = ArrayVec::new();
        for key in self.keys.iter_mut().filter(|key| key.remaining > 0) {
            key.remaining -= 1;
            if key.remaining == 0 {
                trace!("Long press at ({}, {})", key.x, key.y);
                expired.push((key.x, key.y));
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_release_is_a_tap() {
        let mut keys = HeldKeys::default();
        keys.press(4, 4);
        keys.tick();
        assert_eq!(1, keys.count());
        assert_eq!(Press::Tap, keys.release(4, 4), "Expected left but got right");
        assert_eq!(0, keys.count());
    }

    #[test]
    fn held_key_becomes_long_once() {
        let mut keys = HeldKeys::default();
        keys.press(0, 3);
        for _ in 1..LONG_PRESS_TICKS {
            assert!(keys.tick().is_empty());
        }
        assert_eq!(&[(0, 3)], keys.tick().as_slice(), "Expected left but got right");
        assert!(keys.tick().is_empty(), "Long press should be reported once");
        assert_eq!(Press::Long, keys.release(0, 3));
    }

    #[test]
    fn portamento_key_has_short_threshold() {
        let mut keys = HeldKeys::default();
        let (x, y) = PORTAMENTO_KEY;
        keys.press(x, y);
        keys.tick();
        keys.tick();
        assert_eq!(&[PORTAMENTO_KEY], keys.tick().as_slice());
    }

    #[test]
    fn unknown_release_is_not_a_tap() {
        let mut keys = HeldKeys::default();
        assert_eq!(Press::Long, keys.release(9, 1));
    }

    #[test]
    fn release_keeps_other_keys() {
        let mut keys = HeldKeys::default();
        keys.press(1, 1);
        keys.press(2, 2);
        keys.press(3, 3);
        keys.release(2, 2);
        assert_eq!(2, keys.count());
        keys.clear();
        assert_eq!(0, keys.count());
    }
}
