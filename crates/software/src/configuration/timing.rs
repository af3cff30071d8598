//! The rates at which the firmware must drive the engine.
//!
//! Every countdown inside the engine (gesture recognition, pattern playback, fixed-length gate pulses, long presses)
//! is counted in firings of one of these periodic sources rather than measured against a clock.

use embassy_time::Duration;

/// Period of [`Engine::advance_ramps`](crate::engine::Engine::advance_ramps), which also writes the DAC.
pub const RAMP_PERIOD: Duration = Duration::from_millis(5);

/// Period of [`Event::Tick`](crate::events::Event::Tick): one sequencer tick.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

/// Period of [`Event::KeyTimer`](crate::events::Event::KeyTimer), used for long-press detection.
pub const KEY_TIMER_PERIOD: Duration = Duration::from_millis(51);

/// Pot polling period while a grid drives the engine.
pub const GRID_POT_PERIOD: Duration = Duration::from_millis(61);

/// Pot polling period while a MIDI controller drives the engine.
pub const MIDI_POT_PERIOD: Duration = Duration::from_millis(27);

/// Minimum time between grid redraws (roughly 33 Hz).
pub const REFRESH_PERIOD: Duration = Duration::from_millis(30);
