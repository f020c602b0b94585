//! Pattern detector: flags coordinated hostile activity ("gatecamps") at
//! fixed chokepoints, including area-effect chain attacks.

pub mod detector;
pub mod rule;

pub use detector::Detector;
pub use rule::{evaluate, DetectorConfig};
