//! SciPy functions port.
//!
//! Ported from:
//! - scipy.signal.savgol_filter
//! - scipy.signal.find_peaks

mod signal;

pub use signal::*;
