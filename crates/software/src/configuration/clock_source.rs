use num_derive::{FromPrimitive, ToPrimitive};

/// Determines what advances pattern playback.
#[derive(Debug, Default, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Playback advances on the engine's own sequencer tick.
    #[default]
    Internal,
    /// Playback advances one event per clock command received over the remote bus.
    External,
}
