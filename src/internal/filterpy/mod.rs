//! filterpy port.
//!
//! Ported from:
//! - filterpy.kalman.KalmanFilter

mod kalman;

pub use kalman::KalmanFilter;
