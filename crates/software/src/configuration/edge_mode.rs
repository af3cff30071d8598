use num_derive::{FromPrimitive, ToPrimitive};

/// Determines how the gate output responds to shapes.
#[derive(Debug, Default, Clone, Copy, ToPrimitive, FromPrimitive, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeMode {
    /// The gate follows the keys: it rises with a shape and falls when every key has been released.
    #[default]
    Standard,
    /// Each shape produces a pulse whose length is set by the preset's fixed-time parameter.
    Fixed,
    /// The gate rises with a shape and stays up; striking the same cell again lets it fall.
    Drone,
}

impl EdgeMode {
    /// Returns the mode selected by a press in the given grid column while in Edge mode.
    ///
    /// The grid is split into three bands: columns 1–5, 6–10 and 11–15.
    pub fn from_column(x: u8) -> Self {
        match x {
            0..6 => Self::Standard,
            6..11 => Self::Fixed,
            _ => Self::Drone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{FromPrimitive, ToPrimitive};

    #[test]
    fn column_bands() {
        assert_eq!(EdgeMode::Standard, EdgeMode::from_column(5));
        assert_eq!(EdgeMode::Fixed, EdgeMode::from_column(6));
        assert_eq!(EdgeMode::Fixed, EdgeMode::from_column(10));
        assert_eq!(EdgeMode::Drone, EdgeMode::from_column(11));
        assert_eq!(EdgeMode::Drone, EdgeMode::from_column(15));
    }

    #[test]
    fn primitive_round_trip() {
        assert_eq!(Some(2), EdgeMode::Drone.to_u8());
        assert_eq!(Some(EdgeMode::Fixed), EdgeMode::from_u8(1));
        assert_eq!(None, EdgeMode::from_u8(3), "Out-of-range values should not decode");
    }
}
