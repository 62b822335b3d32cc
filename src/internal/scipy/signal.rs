//! Signal-processing helpers following `scipy.signal` semantics.
//!
//! - [`savgol_filter`]: Savitzky-Golay smoothing with `mode="interp"` edges
//! - [`find_peaks`]: local maxima filtered by height, distance and prominence

use nalgebra::{DMatrix, DVector};

/// Least-squares polynomial fit operator for `window` samples.
///
/// Sample positions are centered on the window so `t = 0` is the middle
/// sample. Returns the `(polyorder + 1) x window` pseudo-inverse of the
/// Vandermonde matrix, or `None` if it cannot be computed.
fn polyfit_operator(window: usize, polyorder: usize) -> Option<DMatrix<f64>> {
    let half = (window / 2) as f64;
    let vander = DMatrix::from_fn(window, polyorder + 1, |row, col| {
        (row as f64 - half).powi(col as i32)
    });
    vander.pseudo_inverse(1e-12).ok()
}

fn polyval(coeffs: &DVector<f64>, t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

/// Savitzky-Golay filter.
///
/// Interior samples are the value at the center of a least-squares
/// polynomial fitted to the surrounding `window` samples. The first and last
/// `window / 2` samples are evaluated on a polynomial fitted to the first or
/// last full window (scipy's `mode="interp"`).
///
/// Requires an odd `window` no longer than the input and `polyorder < window`;
/// otherwise the input is returned unchanged.
pub fn savgol_filter(x: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    let n = x.len();
    if window % 2 == 0 || window > n || polyorder >= window {
        return x.to_vec();
    }
    let Some(op) = polyfit_operator(window, polyorder) else {
        return x.to_vec();
    };

    let half = window / 2;
    let mut out = vec![0.0; n];

    // Interior: the constant term of the centered fit is a fixed convolution
    let center = op.row(0);
    for i in half..n - half {
        out[i] = center
            .iter()
            .zip(&x[i - half..=i + half])
            .map(|(c, v)| c * v)
            .sum();
    }

    let head = &op * DVector::from_column_slice(&x[..window]);
    for (i, slot) in out.iter_mut().enumerate().take(half) {
        *slot = polyval(&head, i as f64 - half as f64);
    }

    let tail = &op * DVector::from_column_slice(&x[n - window..]);
    for i in n - half..n {
        let t = (i - (n - window)) as f64 - half as f64;
        out[i] = polyval(&tail, t);
    }

    out
}

/// Peak selection criteria for [`find_peaks`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeakOptions {
    /// Minimum peak value.
    pub height: Option<f64>,
    /// Minimum horizontal distance in samples between neighbouring peaks.
    pub distance: Option<usize>,
    /// Minimum peak prominence.
    pub prominence: Option<f64>,
}

/// Indices of strict local maxima. Flat peaks report their (floored) midpoint.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    let i_max = n - 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let right = ahead - 1;
                peaks.push((i + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` to a higher peak.
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Prominence of each peak: its height above the higher of the two lowest
/// points reached before meeting a higher sample on either side.
pub fn peak_prominences(x: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let top = x[peak];

            let mut left_min = top;
            let mut i = peak;
            loop {
                if x[i] > top {
                    break;
                }
                left_min = left_min.min(x[i]);
                if i == 0 {
                    break;
                }
                i -= 1;
            }

            let mut right_min = top;
            for &v in &x[peak..] {
                if v > top {
                    break;
                }
                right_min = right_min.min(v);
            }

            top - left_min.max(right_min)
        })
        .collect()
}

/// Find peaks in a 1-D signal.
///
/// Filters are applied in scipy's order: height, then distance (higher peaks
/// win), then prominence. Returned indices are ascending.
pub fn find_peaks(x: &[f64], options: &PeakOptions) -> Vec<usize> {
    let mut peaks = local_maxima(x);

    if let Some(height) = options.height {
        peaks.retain(|&p| x[p] >= height);
    }

    if let Some(distance) = options.distance {
        if distance > 1 && peaks.len() > 1 {
            peaks = select_by_distance(x, &peaks, distance);
        }
    }

    if let Some(min_prominence) = options.prominence {
        let prominences = peak_prominences(x, &peaks);
        peaks = peaks
            .into_iter()
            .zip(prominences)
            .filter_map(|(p, prom)| (prom >= min_prominence).then_some(p))
            .collect();
    }

    peaks
}
