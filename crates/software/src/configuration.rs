//! This module contains both user-configurable settings (implemented as enums) and the fixed rates at which the
//! engine expects to be driven.

mod clock_source;
pub use clock_source::*;

mod edge_mode;
pub use edge_mode::*;

pub mod timing;
