//! Provides [`Ramps`], the four fixed-point slew generators behind the instrument's control-voltage outputs.
//!
//! A ramp is linear: retargeting computes a 16.16 per-tick increment once, and every call to
//! [`Ramps::advance_all`] adds it to an accumulator until the step count runs out, at which point the output snaps
//! to its target. The periodic advancer and the foreground handlers that retarget channels share this state; see
//! [`Ramps::suspended`] for how they stay out of each other's way.

use measurements::Voltage;

/// Number of control-voltage outputs.
pub const CHANNEL_COUNT: usize = 4;

/// Highest code the 12-bit DAC can express.
pub const MAX_CODE: u16 = 4095;

/// Output driven by the first pot in grid mode and by the mod wheel in MIDI mode.
pub const MODULATION: usize = 0;
/// Output driven by the second pot in grid mode and by key tracking in MIDI mode.
pub const TRACKING: usize = 1;
/// Output driven by the third pot in grid mode and by note velocity in MIDI mode.
pub const VELOCITY: usize = 2;
/// Pitch output (1 V/oct).
pub const PITCH: usize = 3;

/// One output's ramp state.
///
/// Invariant: `step == 0` implies `now == target`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputChannel {
    now: u16,
    target: u16,
    /// Slew time code; interpreted by whoever retargets the channel.
    slew: u16,
    /// Ticks remaining in the current ramp.
    step: u16,
    /// Per-tick increment, 16.16 fixed point.
    delta: i32,
    /// Current position, 16.16 fixed point.
    accumulator: i32,
}

impl OutputChannel {
    /// The code currently being output.
    pub fn now(&self) -> u16 {
        self.now
    }

    /// The code the channel is heading toward.
    pub fn target(&self) -> u16 {
        self.target
    }

    /// Getter.
    pub fn slew(&self) -> u16 {
        self.slew
    }

    /// Ticks remaining in the current ramp.
    pub fn remaining(&self) -> u16 {
        self.step
    }

    fn retarget(&mut self, target: u16, steps: u16) {
        if steps == 0 {
            self.set_immediate(target);
            return;
        }
        self.target = target;
        self.step = steps;
        self.delta = ((i32::from(target) - i32::from(self.now)) << 16) / i32::from(steps);
        self.accumulator = i32::from(self.now) << 16;
    }

    fn set_immediate(&mut self, value: u16) {
        self.now = value;
        self.target = value;
        self.step = 0;
    }

    fn advance(&mut self) -> bool {
        if self.step == 0 {
            return false;
        }
        self.step -= 1;
        if self.step == 0 {
            self.now = self.target;
        } else {
            self.accumulator += self.delta;
            self.now = (self.accumulator >> 16) as u16;
        }
        true
    }
}

/// The four output channels plus the gate that lets the periodic advancer run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ramps {
    channels: [OutputChannel; CHANNEL_COUNT],
    /// When low, [`advance_all`](Self::advance_all) does nothing.
    running: bool,
}

impl Default for Ramps {
    fn default() -> Self {
        Self::new()
    }
}

impl Ramps {
    /// Constructs four idle channels at code 0, with the advancer running.
    pub fn new() -> Self {
        Self {
            channels: [OutputChannel::default(); CHANNEL_COUNT],
            running: true,
        }
    }

    /// Getter.
    pub fn channel(&self, channel: usize) -> &OutputChannel {
        &self.channels[channel]
    }

    /// Starts a linear ramp from the channel's current output to `target`, arriving after exactly `steps` calls to
    /// [`advance_all`](Self::advance_all). A step count of 0 jumps immediately.
    pub fn retarget(&mut self, channel: usize, target: u16, steps: u16) {
        self.channels[channel].retarget(target, steps);
    }

    /// Jumps the channel to `value`, abandoning any ramp in progress.
    pub fn set_immediate(&mut self, channel: usize, value: u16) {
        self.channels[channel].set_immediate(value);
    }

    /// Setter.
    pub fn set_slew(&mut self, channel: usize, slew: u16) {
        self.channels[channel].slew = slew;
    }

    /// Advances every ramping channel by one tick. Returns `true` if any output moved (i.e., the display is stale).
    ///
    /// Does nothing while [suspended](Self::suspended).
    pub fn advance_all(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.channels
            .iter_mut()
            .fold(false, |moved, channel| channel.advance() | moved)
    }

    /// Returns `true` while a caller is reconfiguring channels inside [`suspended`](Self::suspended).
    pub fn is_suspended(&self) -> bool {
        !self.running
    }

    /// Runs `f` with the periodic advancer held off, so that several channels can be retargeted as a unit and the
    /// advancer never observes a half-written ramp.
    pub fn suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.running = false;
        let result = f(self);
        self.running = true;
        result
    }

    /// Drops every channel to code 0 with no ramp in progress. Slew settings are kept.
    pub fn clear(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.set_immediate(0);
        }
    }

    /// Returns a copy of every channel, e.g. to restore later with [`restore`](Self::restore).
    pub fn snapshot(&self) -> [OutputChannel; CHANNEL_COUNT] {
        self.channels
    }

    /// Overwrites every channel with previously captured state.
    pub fn restore(&mut self, channels: [OutputChannel; CHANNEL_COUNT]) {
        self.channels = channels;
    }

    /// The codes currently being output, clamped to the DAC's range.
    pub fn codes(&self) -> [u16; CHANNEL_COUNT] {
        self.channels.map(|channel| channel.now.min(MAX_CODE))
    }

    /// Returns the [`Voltage`] currently present at an output.
    pub fn voltage(&self, channel: usize) -> Voltage {
        code_to_voltage(self.channels[channel].now)
    }
}

/// Packs a 12-bit code into the two bytes the DAC expects: the upper eight bits, then the lower four bits in the high
/// nibble.
pub fn encode_code(code: u16) -> [u8; 2] {
    let code = code.min(MAX_CODE);
    [(code >> 4) as u8, (code << 4) as u8]
}

/// Command byte addressing the first output of each dual DAC.
pub const DAC_SELECT_A: u8 = 0x31;
/// Command byte addressing the second output of each dual DAC.
pub const DAC_SELECT_B: u8 = 0x38;

/// Builds the two SPI transfers that update all four outputs of the daisy-chained dual DACs.
///
/// Each transfer carries one command and code for the far DAC followed by one for the near DAC; the first sets
/// velocity and modulation, the second pitch and tracking.
pub fn dac_frames(codes: [u16; CHANNEL_COUNT]) -> [[u8; 6]; 2] {
    let frame = |command: u8, far: u16, near: u16| {
        let (far, near) = (encode_code(far), encode_code(near));
        [command, far[0], far[1], command, near[0], near[1]]
    };
    [
        frame(DAC_SELECT_A, codes[VELOCITY], codes[MODULATION]),
        frame(DAC_SELECT_B, codes[PITCH], codes[TRACKING]),
    ]
}

/// Converts an output code to the voltage it produces; the outputs span 10 V over 4096 codes.
pub fn code_to_voltage(code: u16) -> Voltage {
    Voltage::from_volts(f64::from(code.min(MAX_CODE)) * 10.0 / 4096.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converges(start: u16, target: u16, steps: u16) {
        let mut ramps = Ramps::new();
        ramps.set_immediate(PITCH, start);
        ramps.retarget(PITCH, target, steps);

        let mut previous = start;
        for tick in 1..=steps {
            assert!(ramps.advance_all(), "Tick {} should move the channel", tick);
            let now = ramps.channel(PITCH).now();
            if target >= start {
                assert!(now >= previous && now <= target, "Should rise monotonically");
            } else {
                assert!(now <= previous && now >= target, "Should fall monotonically");
            }
            previous = now;
        }
        assert_eq!(target, ramps.channel(PITCH).now(), "Expected left but got right");
        assert_eq!(0, ramps.channel(PITCH).remaining());
        assert!(!ramps.advance_all(), "A finished ramp should stay put");
    }

    #[test]
    fn ramp_converges_upward() {
        converges(0, 4095, 1);
        converges(100, 2048, 7);
        converges(0, 3, 200);
    }

    #[test]
    fn ramp_converges_downward() {
        converges(4095, 0, 13);
        converges(2048, 2047, 5);
        converges(3000, 1000, 1019);
    }

    #[test]
    fn dac_frames_route_channels() {
        let frames = dac_frames([0x123, 0x456, 0x789, 0xABC]);
        assert_eq!(
            [0x31, 0x78, 0x90, 0x31, 0x12, 0x30],
            frames[0],
            "Expected left but got right"
        );
        assert_eq!(
            [0x38, 0xAB, 0xC0, 0x38, 0x45, 0x60],
            frames[1],
            "Expected left but got right"
        );
    }

    #[test]
    fn zero_steps_is_immediate() {
        let mut ramps = Ramps::new();
        ramps.retarget(MODULATION, 1234, 0);
        assert_eq!(1234, ramps.channel(MODULATION).now());
        assert!(!ramps.advance_all());
    }

    #[test]
    fn retarget_starts_from_current_position() {
        let mut ramps = Ramps::new();
        ramps.retarget(TRACKING, 1000, 4);
        ramps.advance_all();
        ramps.advance_all();
        assert_eq!(500, ramps.channel(TRACKING).now());

        ramps.retarget(TRACKING, 0, 5);
        ramps.advance_all();
        assert_eq!(400, ramps.channel(TRACKING).now(), "Should ramp down from the midpoint");
    }

    #[test]
    fn suspended_ramps_hold_still() {
        let mut ramps = Ramps::new();
        ramps.retarget(VELOCITY, 800, 8);

        let moved = ramps.suspended(|ramps| {
            assert!(ramps.is_suspended());
            ramps.retarget(PITCH, 400, 4);
            ramps.advance_all()
        });

        assert!(!moved, "Advancer should not run while suspended");
        assert!(!ramps.is_suspended(), "Gate should be raised again afterwards");
        assert_eq!(0, ramps.channel(VELOCITY).now());
        assert!(ramps.advance_all());
        assert_eq!(100, ramps.channel(VELOCITY).now());
        assert_eq!(100, ramps.channel(PITCH).now());
    }

    #[test]
    fn clear_keeps_slew() {
        let mut ramps = Ramps::new();
        ramps.set_slew(PITCH, 42);
        ramps.retarget(PITCH, 4000, 10);
        ramps.advance_all();
        ramps.clear();
        assert_eq!(0, ramps.channel(PITCH).now());
        assert_eq!(0, ramps.channel(PITCH).remaining());
        assert_eq!(42, ramps.channel(PITCH).slew());
    }

    #[test]
    fn codes_clamp_to_dac_range() {
        let mut ramps = Ramps::new();
        ramps.set_immediate(PITCH, 4334);
        assert_eq!([0, 0, 0, MAX_CODE], ramps.codes());
    }

    #[test]
    fn encode() {
        assert_eq!([0xAB, 0xC0], encode_code(0xABC));
        assert_eq!([0xFF, 0xF0], encode_code(0x1000), "Codes past 12 bits should clamp");
    }

    #[test]
    fn voltage() {
        assert_eq!(5.0, code_to_voltage(2048).as_volts());
        assert_eq!(0.0, code_to_voltage(0).as_volts());
    }
}
