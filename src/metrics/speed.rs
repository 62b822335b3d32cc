//! Speed and distance from the filtered hip trajectory.

use serde::Serialize;

use super::smoothing::smooth_series;
use super::MetricsConfig;
use crate::internal::numpy::{cumsum, diff, interp_nans, moving_average, nanmax, nanmean};

/// Speed and distance summary plus per-frame series.
///
/// Distances are unsmoothed displacement so the total stays accurate;
/// speeds are cleaned of implausible values and averaged for stability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedSummary {
    pub distance_m: f64,
    pub velocity_mean_m_s: f64,
    pub velocity_max_m_s: f64,
    pub speed_series_m_s: Vec<f64>,
    pub distance_series_cum_m: Vec<f64>,
    pub distance_per_frame_m: Vec<f64>,
}

impl SpeedSummary {
    fn zeros(n: usize) -> Self {
        Self {
            distance_m: 0.0,
            velocity_mean_m_s: 0.0,
            velocity_max_m_s: 0.0,
            speed_series_m_s: vec![0.0; n],
            distance_series_cum_m: vec![0.0; n],
            distance_per_frame_m: vec![0.0; n],
        }
    }
}

/// Replace negative and above-`max_speed` values with NaN.
fn remove_outliers(speed: &[f64], max_speed: f64) -> Vec<f64> {
    speed
        .iter()
        .map(|&v| if v < 0.0 || v > max_speed { f64::NAN } else { v })
        .collect()
}

/// Per-frame speed and distance of the hip point.
///
/// Every output series has one entry per input frame; the first frame has
/// zero speed and zero displacement.
pub fn compute_speed_distance(
    hip_x: &[f64],
    hip_y: &[f64],
    m_per_px: f64,
    fps: f64,
    config: &MetricsConfig,
) -> SpeedSummary {
    let n = hip_x.len();
    if n < 2 {
        return SpeedSummary::zeros(n);
    }

    let xs = smooth_series(hip_x, config.smoothing_window, config.smoothing_polyorder);
    let ys = smooth_series(hip_y, config.smoothing_window, config.smoothing_polyorder);

    let dist_m: Vec<f64> = diff(&xs)
        .iter()
        .zip(diff(&ys))
        .map(|(dx, dy)| dx.hypot(dy) * m_per_px)
        .collect();

    let raw_speed: Vec<f64> = dist_m.iter().map(|d| d * fps).collect();
    let clean = interp_nans(&remove_outliers(&raw_speed, config.max_speed_m_s));
    let clean = moving_average(&clean, config.speed_average_window);

    let mut speed_series = Vec::with_capacity(n);
    speed_series.push(0.0);
    speed_series.extend_from_slice(&clean);

    let mut distance_per_frame = Vec::with_capacity(n);
    distance_per_frame.push(0.0);
    distance_per_frame.extend_from_slice(&dist_m);

    let mut distance_cum = Vec::with_capacity(n);
    distance_cum.push(0.0);
    distance_cum.extend(cumsum(&dist_m));

    SpeedSummary {
        distance_m: dist_m.iter().sum(),
        velocity_mean_m_s: nanmean(&clean).unwrap_or(0.0),
        velocity_max_m_s: nanmax(&clean).unwrap_or(0.0),
        speed_series_m_s: speed_series,
        distance_series_cum_m: distance_cum,
        distance_per_frame_m: distance_per_frame,
    }
}
