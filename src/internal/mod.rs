//! Internal modules ported from external libraries.
//!
//! These modules contain code adapted from:
//! - scipy: Savitzky-Golay smoothing and peak finding
//! - filterpy: Kalman filtering
//! - numpy: interpolation, percentiles and convolution

pub mod scipy;
pub mod filterpy;
pub mod numpy;
