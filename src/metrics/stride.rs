//! Step and stride detection.
//!
//! Primary method: ankle scissoring. The signed horizontal separation of
//! the ankles (left minus right) peaks in one polarity when the left foot
//! leads and in the other when the right foot leads; each qualifying peak
//! is a step. Fallback, only when no ankle data exists: valleys of the
//! hip's vertical oscillation.
//!
//! Both methods report `stride_length_mean_m` as twice a mean step length,
//! but the step lengths differ: ankle separation at the step versus hip
//! displacement between valleys.

use serde::Serialize;

use super::smoothing::smooth_series;
use super::MetricsConfig;
use crate::internal::numpy::{interp_nans, nanmax, nanmin};
use crate::internal::scipy::{find_peaks, PeakOptions};
use crate::trajectory::Trajectory;

/// Minimum number of frames with ankle or hip data to look for steps.
pub const MIN_STRIDE_FRAMES: usize = 10;

/// Which signal the stride result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrideMethod {
    AnkleScissoring,
    HipOscillation,
    None,
}

/// Stride result. Lengths and cadence are `None` when there was not enough signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrideSummary {
    pub stride_length_mean_m: Option<f64>,
    pub stride_cadence_hz: Option<f64>,
    pub stride_count: usize,
    /// Frame indices of detected steps.
    pub step_events: Vec<usize>,
    pub method: StrideMethod,
}

impl StrideSummary {
    /// "No stride": a legitimate insufficient-signal result.
    pub fn none() -> Self {
        Self {
            stride_length_mean_m: None,
            stride_cadence_hz: None,
            stride_count: 0,
            step_events: Vec::new(),
            method: StrideMethod::None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.stride_length_mean_m.is_none()
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Minimum spacing between steps, in frames (at least 1).
pub fn min_step_frames(fps: f64, min_step_interval_s: f64) -> usize {
    (fps * min_step_interval_s).max(1.0) as usize
}

/// Drop events closer than `min_gap` frames to the previously kept event.
fn enforce_spacing(sorted_events: &[usize], min_gap: usize) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(sorted_events.len());
    for &ev in sorted_events {
        match kept.last() {
            Some(&last) if ev - last < min_gap => {}
            _ => kept.push(ev),
        }
    }
    kept
}

/// Steps from the signed ankle separation.
///
/// Requires at least [`MIN_STRIDE_FRAMES`] frames with both ankles and two
/// step events; otherwise "no stride".
pub fn stride_from_ankles(
    trajectory: &Trajectory,
    m_per_px: f64,
    fps: f64,
    config: &MetricsConfig,
) -> StrideSummary {
    if trajectory.ankle_frames() < MIN_STRIDE_FRAMES {
        return StrideSummary::none();
    }

    let window = (config.smoothing_window + 2).min(11);
    let left = smooth_series(&interp_nans(&trajectory.left_ankle_x()), window, config.smoothing_polyorder);
    let right = smooth_series(&interp_nans(&trajectory.right_ankle_x()), window, config.smoothing_polyorder);

    let separation_m: Vec<f64> = left.iter().zip(&right).map(|(l, r)| (l - r) * m_per_px).collect();
    let reversed: Vec<f64> = separation_m.iter().map(|v| -v).collect();

    let min_gap = min_step_frames(fps, config.min_step_interval_s);
    let options = PeakOptions {
        height: Some(config.min_stride_width_m),
        distance: Some(min_gap),
        prominence: None,
    };

    // Left foot leading, then right foot leading
    let mut events = find_peaks(&separation_m, &options);
    events.extend(find_peaks(&reversed, &options));
    events.sort_unstable();
    let events = enforce_spacing(&events, min_gap);

    if events.len() < 2 {
        return StrideSummary::none();
    }

    let step_lengths: Vec<f64> = events.iter().map(|&i| separation_m[i].abs()).collect();
    let intervals: Vec<f64> = events.windows(2).map(|w| (w[1] - w[0]) as f64 / fps).collect();

    StrideSummary {
        stride_length_mean_m: mean(&step_lengths).map(|m| 2.0 * m),
        stride_cadence_hz: mean(&intervals).filter(|&t| t > 0.0).map(|t| 1.0 / t),
        stride_count: events.len(),
        step_events: events,
        method: StrideMethod::AnkleScissoring,
    }
}

/// Steps from valleys of the hip's vertical oscillation.
pub fn stride_from_hip(
    trajectory: &Trajectory,
    m_per_px: f64,
    fps: f64,
    config: &MetricsConfig,
) -> StrideSummary {
    if trajectory.len() < MIN_STRIDE_FRAMES {
        return StrideSummary::none();
    }

    let window = config.smoothing_window.min(7);
    let hip_x = smooth_series(&trajectory.hip_raw_x(), window, config.smoothing_polyorder);
    let hip_y = smooth_series(&trajectory.hip_raw_y(), window, config.smoothing_polyorder);

    // Peaks of -y are minima of image-space hip y
    let signal: Vec<f64> = hip_y.iter().map(|v| -v).collect();
    let range = match (nanmax(&signal), nanmin(&signal)) {
        (Some(hi), Some(lo)) => hi - lo,
        _ => 0.0,
    };
    // A still hip only carries smoothing round-off
    if range < 1e-6 {
        return StrideSummary {
            method: StrideMethod::HipOscillation,
            ..StrideSummary::none()
        };
    }
    let options = PeakOptions {
        height: None,
        distance: Some((fps * config.min_step_interval_s) as usize),
        prominence: Some(range * config.hip_prominence_ratio),
    };
    let peaks = find_peaks(&signal, &options);

    if peaks.len() < 2 {
        return StrideSummary {
            stride_count: peaks.len(),
            step_events: peaks,
            method: StrideMethod::HipOscillation,
            ..StrideSummary::none()
        };
    }

    let steps: Vec<f64> = peaks
        .windows(2)
        .map(|w| ((hip_x[w[1]] - hip_x[w[0]]) * m_per_px).abs())
        .collect();
    let gaps: Vec<f64> = peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect();

    StrideSummary {
        stride_length_mean_m: mean(&steps).map(|m| 2.0 * m),
        stride_cadence_hz: mean(&gaps).filter(|&g| g > 0.0).map(|g| fps / g),
        stride_count: peaks.len(),
        step_events: peaks,
        method: StrideMethod::HipOscillation,
    }
}

/// Ankle scissoring when any ankle data exists, hip oscillation otherwise.
pub fn compute_stride(
    trajectory: &Trajectory,
    m_per_px: f64,
    fps: f64,
    config: &MetricsConfig,
) -> StrideSummary {
    if trajectory.has_ankle_data() {
        stride_from_ankles(trajectory, m_per_px, fps, config)
    } else {
        stride_from_hip(trajectory, m_per_px, fps, config)
    }
}
