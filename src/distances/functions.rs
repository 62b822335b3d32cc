//! Built-in candidate scoring functions.

use crate::geometry::{BBox, Point};

/// Intersection over union of two boxes.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    a.iou(b)
}

/// Cosine similarity of two vectors, clipped to [-1, 1].
///
/// Returns `None` for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    let denom = na * nb;
    if denom.is_nan() || denom <= 0.0 || !dot.is_finite() {
        return None;
    }
    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Motion coherence `exp(-d / scale)` of a candidate center against an
/// expected position. 1 at the expected position, ~0.37 at `scale` pixels.
pub fn motion_coherence(center: &Point, expected: &Point, scale: f64) -> f64 {
    if scale.is_nan() || scale <= 0.0 {
        return 0.0;
    }
    (-center.distance(expected) / scale).exp()
}

/// Index of the first maximum, ignoring NaN.
pub fn first_argmax<I: IntoIterator<Item = f64>>(values: I) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best
}

/// Index of the first minimum, ignoring NaN.
pub fn first_argmin<I: IntoIterator<Item = f64>>(values: I) -> Option<(usize, f64)> {
    first_argmax(values.into_iter().map(|v| -v)).map(|(i, v)| (i, -v))
}
