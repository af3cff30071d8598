//! Error types for the performance engine.

use core::fmt;

/// Errors that can occur while feeding or persisting the engine.
///
/// None of these are fatal. Capacity errors drop the newest input and leave existing state untouched; storage errors
/// leave the live preset as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The event FIFO is at capacity; the event was dropped.
    EventQueueFull,
    /// All remote command slots are occupied; the command was dropped and must be re-sent.
    RemoteQueueFull,
    /// Preset index is out of bounds (must be < [`PRESET_COUNT`](crate::preset::PRESET_COUNT)).
    PresetOutOfRange,
    /// A stored preset blob could not be decoded.
    CorruptPreset,
    /// The storage medium reported a failure.
    Storage,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EventQueueFull => write!(f, "Event queue full"),
            Error::RemoteQueueFull => write!(f, "Remote command queue full"),
            Error::PresetOutOfRange => write!(f, "Preset index out of range (must be 0-7)"),
            Error::CorruptPreset => write!(f, "Stored preset could not be decoded"),
            Error::Storage => write!(f, "Preset storage failure"),
        }
    }
}
