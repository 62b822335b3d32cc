//! Jump detection on the vertical hip trajectory.
//!
//! Image y grows downward, so the apex is the global minimum of smoothed hip
//! y. The baseline is a high percentile of the same series, which stays at
//! standing height for runs where the athlete is airborne only briefly.

use serde::Serialize;

use super::smoothing::smooth_series;
use super::MetricsConfig;
use crate::internal::numpy::{argmin, nanpercentile};

/// Minimum frames needed to look for a jump.
pub const MIN_JUMP_FRAMES: usize = 10;

/// Jump result. Every field but `has_jump` is `None` when it was not reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JumpSummary {
    pub has_jump: bool,
    pub jump_height_m: Option<f64>,
    pub jump_distance_m: Option<f64>,
    pub jump_start_distance_m: Option<f64>,
    pub jump_end_distance_m: Option<f64>,
    pub jump_apex_frame: Option<usize>,
    pub jump_takeoff_frame: Option<usize>,
    pub jump_landing_frame: Option<usize>,
    pub jump_duration_s: Option<f64>,
}

impl JumpSummary {
    /// Frames `[takeoff, landing]` of a valid jump.
    pub fn airborne(&self) -> Option<(usize, usize)> {
        match (self.has_jump, self.jump_takeoff_frame, self.jump_landing_frame) {
            (true, Some(t), Some(l)) => Some((t, l)),
            _ => None,
        }
    }

    fn rejected(height_m: f64, apex: usize) -> Self {
        Self {
            jump_height_m: Some(height_m),
            jump_apex_frame: Some(apex),
            ..Self::default()
        }
    }
}

/// Detect a single jump from raw hip y.
///
/// `hip_x` is used for the horizontal distance only when `distance_cum`
/// is missing or misaligned with `hip_y`.
pub fn detect_jump(
    hip_y: &[f64],
    hip_x: Option<&[f64]>,
    distance_cum: Option<&[f64]>,
    m_per_px: f64,
    fps: f64,
    config: &MetricsConfig,
) -> JumpSummary {
    if hip_y.len() < MIN_JUMP_FRAMES {
        return JumpSummary::default();
    }

    let window = config.smoothing_window.min(9);
    let ys = smooth_series(hip_y, window, config.smoothing_polyorder);

    let (apex, baseline) = match (argmin(&ys), nanpercentile(&ys, config.jump_baseline_percentile)) {
        (Some(a), Some(b)) => (a, b),
        _ => return JumpSummary::default(),
    };
    let height_px = baseline - ys[apex];
    if height_px <= 0.0 {
        // Flat trace: the apex sits on the baseline
        return JumpSummary {
            jump_height_m: Some(0.0),
            ..JumpSummary::default()
        };
    }

    let height_m = height_px * m_per_px;
    if height_m < config.min_jump_height_m {
        log::debug!(
            "hip rise of {:.3} m at frame {} below jump threshold {:.3} m",
            height_m, apex, config.min_jump_height_m
        );
        return JumpSummary::rejected(height_m, apex);
    }

    let tol = config.jump_tolerance_px.max(config.jump_tolerance_ratio * height_px);
    let near_baseline = |i: &usize| (ys[*i] - baseline).abs() < tol;
    let takeoff = (0..apex).rev().find(near_baseline);
    let landing = (apex + 1..ys.len()).find(near_baseline);

    let (takeoff, landing) = match (takeoff, landing) {
        (Some(t), Some(l)) => (t, l),
        _ => {
            log::debug!("jump apex at frame {} never returns to baseline", apex);
            return JumpSummary::rejected(height_m, apex);
        }
    };

    let mut summary = JumpSummary {
        has_jump: true,
        jump_height_m: Some(height_m),
        jump_apex_frame: Some(apex),
        jump_takeoff_frame: Some(takeoff),
        jump_landing_frame: Some(landing),
        jump_duration_s: Some((landing - takeoff) as f64 / fps),
        ..JumpSummary::default()
    };

    match (distance_cum, hip_x) {
        (Some(cum), _) if cum.len() == hip_y.len() => {
            summary.jump_start_distance_m = Some(cum[takeoff]);
            summary.jump_end_distance_m = Some(cum[landing]);
            summary.jump_distance_m = Some(cum[landing] - cum[takeoff]);
        }
        (_, Some(x)) => {
            let xs = smooth_series(x, window, config.smoothing_polyorder);
            if xs.len() == ys.len() {
                summary.jump_distance_m = Some((xs[landing] - xs[takeoff]).abs() * m_per_px);
            }
        }
        _ => {}
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Flat hip at `base` with a raised-cosine rise of `depth` px centered on `center`.
    fn dip(n: usize, base: f64, depth: f64, center: usize, width: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let d = i as f64 - center as f64;
                if d.abs() < width as f64 {
                    let w = 0.5 * (1.0 + (std::f64::consts::PI * d / width as f64).cos());
                    base - depth * w
                } else {
                    base
                }
            })
            .collect()
    }

    #[test]
    fn test_short_series_no_jump() {
        let s = detect_jump(&[300.0; 9], None, None, 0.01, 30.0, &MetricsConfig::default());
        assert!(!s.has_jump);
        assert_eq!(s.jump_height_m, None);
    }

    #[test]
    fn test_flat_trace_no_jump() {
        let s = detect_jump(&[300.0; 30], None, None, 0.002, 30.0, &MetricsConfig::default());
        assert!(!s.has_jump);
        assert_relative_eq!(s.jump_height_m.unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_valid_jump_with_cumulative_distance() {
        let y = dip(60, 300.0, 100.0, 30, 12);
        let cum: Vec<f64> = (0..60).map(|i| 0.05 * i as f64).collect();
        let s = detect_jump(&y, None, Some(cum.as_slice()), 0.002, 30.0, &MetricsConfig::default());

        assert!(s.has_jump);
        let (takeoff, landing) = s.airborne().unwrap();
        assert!(takeoff < 30 && landing > 30);
        assert_eq!(s.jump_apex_frame, Some(30));
        assert_relative_eq!(s.jump_height_m.unwrap(), 0.2, epsilon = 0.005);
        assert_relative_eq!(s.jump_duration_s.unwrap(), (landing - takeoff) as f64 / 30.0);
        assert_relative_eq!(s.jump_start_distance_m.unwrap(), cum[takeoff]);
        assert_relative_eq!(s.jump_distance_m.unwrap(), cum[landing] - cum[takeoff], epsilon = 1e-12);
    }

    #[test]
    fn test_horizontal_distance_from_hip_x() {
        let y = dip(60, 300.0, 100.0, 30, 12);
        let x: Vec<f64> = (0..60).map(|i| 10.0 * i as f64).collect();
        let s = detect_jump(&y, Some(x.as_slice()), None, 0.002, 30.0, &MetricsConfig::default());

        let (takeoff, landing) = s.airborne().unwrap();
        let expected = 10.0 * (landing - takeoff) as f64 * 0.002;
        assert_relative_eq!(s.jump_distance_m.unwrap(), expected, epsilon = 1e-6);
        assert_eq!(s.jump_start_distance_m, None);
    }

    #[test]
    fn test_small_rise_reports_height_only() {
        let y = dip(60, 300.0, 40.0, 30, 12);
        let s = detect_jump(&y, None, None, 0.002, 30.0, &MetricsConfig::default());
        assert!(!s.has_jump);
        assert_relative_eq!(s.jump_height_m.unwrap(), 0.08, epsilon = 0.005);
        assert_eq!(s.jump_apex_frame, Some(30));
        assert_eq!(s.airborne(), None);
    }

    #[test]
    fn test_no_return_to_baseline_invalidates() {
        // Hip keeps rising until the end of the clip
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 300.0 } else { 300.0 - 10.0 * (i - 19) as f64 }).collect();
        let s = detect_jump(&y, None, None, 0.002, 30.0, &MetricsConfig::default());
        assert!(!s.has_jump);
        assert!(s.jump_height_m.unwrap() > 0.15);
    }
}
