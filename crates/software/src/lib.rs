//! This crate contains architecture-agnostic logic for Lattice, a performance controller which turns gestures drawn
//! on a [monome grid](https://monome.org/docs/grid/) (or notes from a [MIDI](https://midi.org/midi-1-0) keyboard) into
//! four slewed [control voltages](https://en.wikipedia.org/wiki/CV/gate) and a gate, and which records and loops
//! those gestures as patterns.
//!
//! Everything here is driven through [`engine::Engine`]; the firmware crate supplies timers, the DAC, the grid and
//! MIDI transports and flash storage.

#![deny(missing_docs)]
#![no_std]

mod fmt;

pub mod configuration;
pub mod display;
pub mod engine;
pub mod events;
pub mod gate;
pub mod gesture;
pub mod keys;
/// Data structures for tracking MIDI messages the device has received.
pub mod midi_state;
pub mod pattern;
pub mod pots;
pub mod preset;
pub mod ramp;
pub mod remote;
pub mod sequencer;
pub mod tables;

mod error;
pub use error::Error;
