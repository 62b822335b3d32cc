//! Gap filling and Savitzky-Golay smoothing of per-frame series.

use crate::internal::numpy::interp_nans;
use crate::internal::scipy::savgol_filter;

/// Fill gaps, then smooth with a Savitzky-Golay filter.
///
/// Gaps are linearly interpolated when at least two valid samples exist and
/// zero-filled otherwise. The window is made odd and shrunk below the series
/// length; when that leaves fewer than 3 samples, or the series itself has
/// fewer than 3 points, the gap-filled series is returned unsmoothed. The
/// polynomial order is clamped below the window.
pub fn smooth_series(x: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    let x = interp_nans(x);
    let n = x.len();
    if n < 3 {
        return x;
    }

    let mut window = if window % 2 == 0 { window + 1 } else { window };
    if window >= n {
        window = if (n - 1) % 2 == 1 { n - 1 } else { n - 2 };
    }
    if window < 3 {
        return x;
    }
    let polyorder = polyorder.min(window - 1);

    savgol_filter(&x, window, polyorder)
}
