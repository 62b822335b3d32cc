//! Serializable metrics record.

use serde::Serialize;

use super::jump::JumpSummary;
use super::speed::SpeedSummary;
use super::stride::StrideSummary;
use crate::geometry::{BBox, Point};
use crate::perception::Pose;
use crate::trajectory::Trajectory;

/// Per-frame series, every one aligned with the frame index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub frames: Vec<usize>,
    /// Filtered hip.
    pub hip_x: Vec<Option<f64>>,
    pub hip_y: Vec<Option<f64>>,
    pub hip_x_raw: Vec<Option<f64>>,
    pub hip_y_raw: Vec<Option<f64>>,
    #[serde(rename = "LA_x")]
    pub left_ankle_x: Vec<Option<f64>>,
    #[serde(rename = "LA_y")]
    pub left_ankle_y: Vec<Option<f64>>,
    #[serde(rename = "RA_x")]
    pub right_ankle_x: Vec<Option<f64>>,
    #[serde(rename = "RA_y")]
    pub right_ankle_y: Vec<Option<f64>>,
    pub bbox: Vec<Option<BBox>>,
    /// Running speed, zero while airborne.
    pub speed_m_s: Vec<f64>,
    /// Speed while airborne, zero elsewhere.
    pub jump_speed_m_s: Vec<f64>,
    pub distance_cum_m: Vec<f64>,
    pub distance_per_frame_m: Vec<f64>,
    pub step_count: Vec<usize>,
    pub step_events: Vec<usize>,
    pub skeleton: Vec<Option<Pose>>,
}

fn column(points: &[Option<Point>], pick: fn(&Point) -> f64) -> Vec<Option<f64>> {
    points.iter().map(|p| p.as_ref().map(pick)).collect()
}

impl MetricSeries {
    pub(crate) fn from_trajectory(trajectory: &Trajectory) -> Self {
        Self {
            frames: (0..trajectory.len()).collect(),
            hip_x: column(trajectory.hip_filtered(), |p| p.x),
            hip_y: column(trajectory.hip_filtered(), |p| p.y),
            hip_x_raw: column(trajectory.hip_raw(), |p| p.x),
            hip_y_raw: column(trajectory.hip_raw(), |p| p.y),
            left_ankle_x: column(trajectory.left_ankle(), |p| p.x),
            left_ankle_y: column(trajectory.left_ankle(), |p| p.y),
            right_ankle_x: column(trajectory.right_ankle(), |p| p.x),
            right_ankle_y: column(trajectory.right_ankle(), |p| p.y),
            bbox: trajectory.bbox().to_vec(),
            speed_m_s: Vec::new(),
            jump_speed_m_s: Vec::new(),
            distance_cum_m: Vec::new(),
            distance_per_frame_m: Vec::new(),
            step_count: Vec::new(),
            step_events: Vec::new(),
            skeleton: trajectory.skeleton().to_vec(),
        }
    }

    /// Number of frames covered.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Lengths of every per-frame series, for alignment checks.
    pub fn per_frame_lengths(&self) -> [usize; 16] {
        [
            self.frames.len(),
            self.hip_x.len(),
            self.hip_y.len(),
            self.hip_x_raw.len(),
            self.hip_y_raw.len(),
            self.left_ankle_x.len(),
            self.left_ankle_y.len(),
            self.right_ankle_x.len(),
            self.right_ankle_y.len(),
            self.bbox.len(),
            self.speed_m_s.len(),
            self.jump_speed_m_s.len(),
            self.distance_cum_m.len(),
            self.distance_per_frame_m.len(),
            self.step_count.len(),
            self.skeleton.len(),
        ]
    }
}

/// Everything the metrics engine derives from one trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsResult {
    pub fps: f64,
    pub frame_count: usize,
    pub scale_m_per_px: f64,
    pub step_count_total: usize,
    pub speed: SpeedSummary,
    pub stride: StrideSummary,
    pub jump: JumpSummary,
    pub series: MetricSeries,
}

impl MetricsResult {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
