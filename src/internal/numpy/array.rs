//! NumPy-like array operations.
//!
//! Series are plain `f64` slices where NaN marks a missing sample.

/// Fill NaN gaps by linear interpolation between valid neighbours.
///
/// Gaps before the first or after the last valid sample take the nearest
/// valid value (`np.interp` edge behaviour). With fewer than two valid
/// samples, NaNs are replaced by zero (`np.nan_to_num`).
pub fn interp_nans(values: &[f64]) -> Vec<f64> {
    let valid: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    if valid.len() == values.len() {
        return values.to_vec();
    }
    if valid.len() < 2 {
        return nan_to_num(values);
    }

    let mut out = values.to_vec();
    let first = valid[0];
    let last = valid[valid.len() - 1];

    for value in out.iter_mut().take(first) {
        *value = values[first];
    }
    for value in out.iter_mut().skip(last + 1) {
        *value = values[last];
    }
    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let (ya, yb) = (values[a], values[b]);
        let span = (b - a) as f64;
        for (offset, value) in out[a + 1..b].iter_mut().enumerate() {
            let t = (offset + 1) as f64 / span;
            *value = ya + (yb - ya) * t;
        }
    }
    out
}

/// Replace NaN with 0 and infinities with the largest finite values.
pub fn nan_to_num(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                0.0
            } else if v == f64::INFINITY {
                f64::MAX
            } else if v == f64::NEG_INFINITY {
                f64::MIN
            } else {
                v
            }
        })
        .collect()
}

/// Percentile with linear interpolation between closest ranks, ignoring NaN.
///
/// `q` is in [0, 100]. Returns `None` when no finite sample exists.
pub fn nanpercentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Centered moving average with zero padding (`np.convolve(.., mode="same")`).
///
/// Series shorter than the window are returned unchanged.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if window == 0 || n < window {
        return values.to_vec();
    }

    // Output i averages i - w/2 ..= i + w/2 - 1 for even windows, as numpy does
    let left = window / 2;
    let mut out = vec![0.0; n];
    for (i, slot) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        for k in 0..window {
            let j = i as isize + k as isize - left as isize;
            if j >= 0 && (j as usize) < n {
                sum += values[j as usize];
            }
        }
        *slot = sum / window as f64;
    }
    out
}

/// Consecutive differences `out[i] = values[i + 1] - values[i]`.
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Running sum.
pub fn cumsum(values: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    values
        .iter()
        .map(|v| {
            acc += v;
            acc
        })
        .collect()
}

/// Mean of the non-NaN samples.
pub fn nanmean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Maximum of the non-NaN samples.
pub fn nanmax(values: &[f64]) -> Option<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).reduce(f64::max)
}

/// Minimum of the non-NaN samples.
pub fn nanmin(values: &[f64]) -> Option<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).reduce(f64::min)
}

/// Index of the first smallest sample.
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
