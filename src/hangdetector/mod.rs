pub mod detector;

pub use detector::{DeviceIndicatorValues, HangDetector};
