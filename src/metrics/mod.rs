//! Trajectory-to-metrics engine.
//!
//! Runs once over a completed [`Trajectory`]:
//!
//! - `smoothing` - gap interpolation and Savitzky-Golay smoothing
//! - `speed` - per-frame speed and cumulative distance of the filtered hip
//! - `stride` - ankle scissoring steps, hip oscillation fallback
//! - `jump` - apex, takeoff and landing from raw hip y
//! - `segmentation` - running/jumping speed split and step counting
//!
//! Every per-frame series in the [`MetricsResult`] has exactly one entry
//! per trajectory frame.

mod jump;
mod result;
mod segmentation;
mod smoothing;
mod speed;
mod stride;

pub use jump::{detect_jump, JumpSummary, MIN_JUMP_FRAMES};
pub use result::{MetricSeries, MetricsResult};
pub use segmentation::{separate_run_and_jump, Segmentation};
pub use smoothing::smooth_series;
pub use speed::{compute_speed_distance, SpeedSummary};
pub use stride::{
    compute_stride, min_step_frames, stride_from_ankles, stride_from_hip, StrideMethod,
    StrideSummary, MIN_STRIDE_FRAMES,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationScale;
use crate::trajectory::Trajectory;
use crate::{Error, Result};

fn default_kpt_score_thr() -> f64 { 0.4 }
fn default_ankle_score_thr() -> f64 { 0.2 }
fn default_smoothing_window() -> usize { 9 }
fn default_smoothing_polyorder() -> usize { 2 }
fn default_min_jump_height_m() -> f64 { 0.15 }
fn default_max_speed_m_s() -> f64 { 12.5 }
fn default_speed_average_window() -> usize { 5 }
fn default_min_stride_width_m() -> f64 { 0.15 }
fn default_min_step_interval_s() -> f64 { 0.25 }
fn default_hip_prominence_ratio() -> f64 { 0.15 }
fn default_jump_baseline_percentile() -> f64 { 70.0 }
fn default_jump_tolerance_px() -> f64 { 5.0 }
fn default_jump_tolerance_ratio() -> f64 { 0.25 }

/// Thresholds for pose-derived points and the metrics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Minimum hip keypoint score to use the hip midpoint over the box center.
    #[serde(default = "default_kpt_score_thr")]
    pub kpt_score_thr: f64,

    /// Minimum ankle keypoint score; below it the last ankle is held.
    #[serde(default = "default_ankle_score_thr")]
    pub ankle_score_thr: f64,

    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,

    #[serde(default = "default_smoothing_polyorder")]
    pub smoothing_polyorder: usize,

    /// Hip rises below this are reported as "no jump".
    #[serde(default = "default_min_jump_height_m")]
    pub min_jump_height_m: f64,

    /// Speeds above this are treated as tracking glitches.
    #[serde(default = "default_max_speed_m_s")]
    pub max_speed_m_s: f64,

    #[serde(default = "default_speed_average_window")]
    pub speed_average_window: usize,

    /// Minimum ankle separation at a step.
    #[serde(default = "default_min_stride_width_m")]
    pub min_stride_width_m: f64,

    /// Minimum time between consecutive steps.
    #[serde(default = "default_min_step_interval_s")]
    pub min_step_interval_s: f64,

    /// Hip valley prominence as a fraction of the hip y range.
    #[serde(default = "default_hip_prominence_ratio")]
    pub hip_prominence_ratio: f64,

    /// Percentile of hip y taken as standing height.
    #[serde(default = "default_jump_baseline_percentile")]
    pub jump_baseline_percentile: f64,

    #[serde(default = "default_jump_tolerance_px")]
    pub jump_tolerance_px: f64,

    #[serde(default = "default_jump_tolerance_ratio")]
    pub jump_tolerance_ratio: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            kpt_score_thr: default_kpt_score_thr(),
            ankle_score_thr: default_ankle_score_thr(),
            smoothing_window: default_smoothing_window(),
            smoothing_polyorder: default_smoothing_polyorder(),
            min_jump_height_m: default_min_jump_height_m(),
            max_speed_m_s: default_max_speed_m_s(),
            speed_average_window: default_speed_average_window(),
            min_stride_width_m: default_min_stride_width_m(),
            min_step_interval_s: default_min_step_interval_s(),
            hip_prominence_ratio: default_hip_prominence_ratio(),
            jump_baseline_percentile: default_jump_baseline_percentile(),
            jump_tolerance_px: default_jump_tolerance_px(),
            jump_tolerance_ratio: default_jump_tolerance_ratio(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("kpt_score_thr", self.kpt_score_thr),
            ("ankle_score_thr", self.ankle_score_thr),
            ("min_jump_height_m", self.min_jump_height_m),
            ("min_stride_width_m", self.min_stride_width_m),
            ("min_step_interval_s", self.min_step_interval_s),
            ("hip_prominence_ratio", self.hip_prominence_ratio),
            ("jump_tolerance_px", self.jump_tolerance_px),
            ("jump_tolerance_ratio", self.jump_tolerance_ratio),
        ];
        for (name, v) in non_negative {
            if !(v.is_finite() && v >= 0.0) {
                return Err(Error::InvalidConfig(format!("{name} must be a non-negative number, got {v}")));
            }
        }
        if !(self.max_speed_m_s.is_finite() && self.max_speed_m_s > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_speed_m_s must be positive, got {}",
                self.max_speed_m_s
            )));
        }
        if !(0.0..=100.0).contains(&self.jump_baseline_percentile) {
            return Err(Error::InvalidConfig(format!(
                "jump_baseline_percentile must be in [0, 100], got {}",
                self.jump_baseline_percentile
            )));
        }
        if self.smoothing_window < 3 {
            return Err(Error::InvalidConfig("smoothing_window must be at least 3".to_string()));
        }
        if self.speed_average_window == 0 {
            return Err(Error::InvalidConfig("speed_average_window must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Computes a [`MetricsResult`] from a completed trajectory.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: MetricsConfig,
}

impl MetricsEngine {
    pub fn new(config: MetricsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Speed, stride, jump and the aligned per-frame series.
    ///
    /// Short or empty trajectories are not errors: they produce zero speeds
    /// and "no stride" / "no jump".
    pub fn compute(&self, trajectory: &Trajectory, scale: &CalibrationScale, fps: f64) -> Result<MetricsResult> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::InvalidConfig(format!("fps must be positive, got {fps}")));
        }
        let m_per_px = scale.m_per_px();
        let cfg = &self.config;

        let speed = compute_speed_distance(
            &trajectory.hip_filtered_x(),
            &trajectory.hip_filtered_y(),
            m_per_px,
            fps,
            cfg,
        );

        let mut stride = compute_stride(trajectory, m_per_px, fps, cfg);

        let hip_raw_x = trajectory.hip_raw_x();
        let jump = detect_jump(
            &trajectory.hip_raw_y(),
            Some(hip_raw_x.as_slice()),
            Some(speed.distance_series_cum_m.as_slice()),
            m_per_px,
            fps,
            cfg,
        );

        let seg = separate_run_and_jump(&speed.speed_series_m_s, &stride.step_events, &jump);
        stride.step_events = seg.step_events.clone();
        stride.stride_count = seg.step_events.len();

        debug!(
            "metrics over {} frames: distance {:.2} m, {} steps ({:?}), jump {}",
            trajectory.len(),
            speed.distance_m,
            stride.stride_count,
            stride.method,
            jump.has_jump
        );

        let mut series = MetricSeries::from_trajectory(trajectory);
        series.jump_speed_m_s = seg.jump_speed.clone();
        series.speed_m_s = seg.run_speed.clone();
        series.distance_cum_m = speed.distance_series_cum_m.clone();
        series.distance_per_frame_m = speed.distance_per_frame_m.clone();
        series.step_count = seg.step_count.clone();
        series.step_events = seg.step_events.clone();

        Ok(MetricsResult {
            fps,
            frame_count: trajectory.len(),
            scale_m_per_px: m_per_px,
            step_count_total: seg.step_count_total(),
            speed,
            stride,
            jump,
            series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use approx::assert_relative_eq;

    fn scale(m_per_px: f64) -> CalibrationScale {
        CalibrationScale::from_m_per_px(m_per_px).unwrap()
    }

    #[test]
    fn test_default_config_valid() {
        assert!(MetricsConfig::default().validate().is_ok());
        assert!(MetricsEngine::new(MetricsConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut c = MetricsConfig::default();
        c.max_speed_m_s = 0.0;
        assert!(matches!(MetricsEngine::new(c), Err(Error::InvalidConfig(_))));

        let mut c = MetricsConfig::default();
        c.jump_baseline_percentile = 120.0;
        assert!(c.validate().is_err());

        let mut c = MetricsConfig::default();
        c.smoothing_window = 1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let c: MetricsConfig = serde_json::from_str(r#"{"min_jump_height_m": 0.1}"#).unwrap();
        assert_relative_eq!(c.min_jump_height_m, 0.1);
        assert_eq!(c.smoothing_window, 9);
        assert_relative_eq!(c.max_speed_m_s, 12.5);
    }

    #[test]
    fn test_empty_trajectory() {
        let engine = MetricsEngine::default();
        let r = engine.compute(&Trajectory::default(), &scale(0.01), 30.0).unwrap();
        assert_eq!(r.frame_count, 0);
        assert_eq!(r.step_count_total, 0);
        assert!(r.series.is_empty());
        assert!(!r.jump.has_jump);
        assert!(r.stride.is_none());
    }

    #[test]
    fn test_bad_fps_rejected() {
        let engine = MetricsEngine::default();
        assert!(engine.compute(&Trajectory::default(), &scale(0.01), 0.0).is_err());
    }

    #[test]
    fn test_series_aligned_with_gaps() {
        let hip: Vec<Option<Point>> = (0..45)
            .map(|i| (i % 7 != 3).then(|| Point::new(4.0 * i as f64, 300.0)))
            .collect();
        let r = MetricsEngine::default().compute(&Trajectory::from_hip(hip), &scale(0.01), 30.0).unwrap();

        assert_eq!(r.frame_count, 45);
        for len in r.series.per_frame_lengths() {
            assert_eq!(len, 45);
        }
        assert_eq!(r.series.hip_x[3], None);
        let json = r.to_json().unwrap();
        assert!(json.contains("\"LA_x\""));
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn test_jump_stops_step_count() {
        // Hip bobbing while running, then one 100 px rise centered on frame 70
        let n = 100;
        let hip: Vec<Option<Point>> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * i as f64 / 15.0;
                let mut y = 300.0 - 3.0 * phase.cos();
                let d = i as f64 - 70.0;
                if d.abs() < 12.0 {
                    y -= 100.0 * 0.5 * (1.0 + (std::f64::consts::PI * d / 12.0).cos());
                }
                Some(Point::new(3.0 * i as f64, y))
            })
            .collect();
        let r = MetricsEngine::default().compute(&Trajectory::from_hip(hip), &scale(0.002), 30.0).unwrap();

        assert!(r.jump.has_jump);
        let (takeoff, landing) = r.jump.airborne().unwrap();
        assert!(r.series.step_events.iter().all(|&ev| ev <= takeoff));
        assert_eq!(r.stride.stride_count, r.series.step_events.len());
        assert_eq!(r.step_count_total, r.series.step_events.len());
        for i in takeoff..=landing {
            assert_eq!(r.series.speed_m_s[i], 0.0);
        }
        assert!(r.series.jump_speed_m_s[..takeoff].iter().all(|&v| v == 0.0));
    }
}
