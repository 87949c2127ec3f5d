//! Local signal-quality measurement
//!
//! Measuring is the radio's business (scan for the reference access point,
//! read its signal strength). The core only needs one number at start-up.

use crate::types::NO_SIGNAL;

/// Source of this node's fitness score. Higher is better.
pub trait QualitySource {
    fn measure_local_quality(&self) -> i8;
}

/// A quality known ahead of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedQuality(pub i8);

impl QualitySource for FixedQuality {
    fn measure_local_quality(&self) -> i8 {
        self.0
    }
}

/// Reference access point was not found
impl Default for FixedQuality {
    fn default() -> Self {
        FixedQuality(NO_SIGNAL)
    }
}

impl<F> QualitySource for F
where
    F: Fn() -> i8,
{
    fn measure_local_quality(&self) -> i8 {
        self()
    }
}
