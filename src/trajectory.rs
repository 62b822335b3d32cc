//! Per-frame trajectory columns.
//!
//! The accumulator owns append-only columns, one entry per processed frame,
//! so every series stays aligned with the frame index whether or not the
//! athlete was found. Finishing it yields an immutable [`Trajectory`].

use serde::Serialize;

use crate::geometry::{BBox, Point};
use crate::perception::Pose;

/// Everything recorded for one frame. `None` marks a missing value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSample {
    pub hip_raw: Option<Point>,
    pub hip_filtered: Option<Point>,
    pub left_ankle: Option<Point>,
    pub right_ankle: Option<Point>,
    pub bbox: Option<BBox>,
    pub skeleton: Option<Pose>,
}

/// Append-only trajectory under construction.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryAccumulator {
    inner: Trajectory,
}

impl TrajectoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next frame.
    pub fn push(&mut self, sample: FrameSample) {
        let t = &mut self.inner;
        t.hip_raw.push(sample.hip_raw);
        t.hip_filtered.push(sample.hip_filtered);
        t.left_ankle.push(sample.left_ankle);
        t.right_ankle.push(sample.right_ankle);
        t.bbox.push(sample.bbox);
        t.skeleton.push(sample.skeleton);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Read-only view of what has been recorded so far.
    pub fn view(&self) -> &Trajectory {
        &self.inner
    }

    pub fn finish(self) -> Trajectory {
        self.inner
    }
}

/// Completed trajectory of the tracked athlete.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trajectory {
    hip_raw: Vec<Option<Point>>,
    hip_filtered: Vec<Option<Point>>,
    left_ankle: Vec<Option<Point>>,
    right_ankle: Vec<Option<Point>>,
    bbox: Vec<Option<BBox>>,
    skeleton: Vec<Option<Pose>>,
}

fn xs(column: &[Option<Point>]) -> Vec<f64> {
    column.iter().map(|p| p.map_or(f64::NAN, |p| p.x)).collect()
}

fn ys(column: &[Option<Point>]) -> Vec<f64> {
    column.iter().map(|p| p.map_or(f64::NAN, |p| p.y)).collect()
}

impl Trajectory {
    /// Build a trajectory from hip positions only (filtered equals raw).
    pub fn from_hip(hip: Vec<Option<Point>>) -> Self {
        let mut acc = TrajectoryAccumulator::new();
        for p in hip {
            acc.push(FrameSample {
                hip_raw: p,
                hip_filtered: p,
                ..FrameSample::default()
            });
        }
        acc.finish()
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.hip_raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hip_raw.is_empty()
    }

    pub fn hip_raw(&self) -> &[Option<Point>] {
        &self.hip_raw
    }

    pub fn hip_filtered(&self) -> &[Option<Point>] {
        &self.hip_filtered
    }

    pub fn left_ankle(&self) -> &[Option<Point>] {
        &self.left_ankle
    }

    pub fn right_ankle(&self) -> &[Option<Point>] {
        &self.right_ankle
    }

    pub fn bbox(&self) -> &[Option<BBox>] {
        &self.bbox
    }

    pub fn skeleton(&self) -> &[Option<Pose>] {
        &self.skeleton
    }

    /// Raw hip x with NaN for missing frames.
    pub fn hip_raw_x(&self) -> Vec<f64> {
        xs(&self.hip_raw)
    }

    pub fn hip_raw_y(&self) -> Vec<f64> {
        ys(&self.hip_raw)
    }

    pub fn hip_filtered_x(&self) -> Vec<f64> {
        xs(&self.hip_filtered)
    }

    pub fn hip_filtered_y(&self) -> Vec<f64> {
        ys(&self.hip_filtered)
    }

    pub fn left_ankle_x(&self) -> Vec<f64> {
        xs(&self.left_ankle)
    }

    pub fn right_ankle_x(&self) -> Vec<f64> {
        xs(&self.right_ankle)
    }

    /// Frames where both ankles are known.
    pub fn ankle_frames(&self) -> usize {
        self.left_ankle
            .iter()
            .zip(&self.right_ankle)
            .filter(|(l, r)| l.is_some() && r.is_some())
            .count()
    }

    /// Whether both ankles were seen at least once.
    pub fn has_ankle_data(&self) -> bool {
        self.left_ankle.iter().any(Option::is_some) && self.right_ankle.iter().any(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_keeps_columns_aligned() {
        let mut acc = TrajectoryAccumulator::new();
        acc.push(FrameSample {
            hip_raw: Some(Point::new(1.0, 2.0)),
            bbox: Some(BBox::new(0.0, 0.0, 2.0, 4.0).unwrap()),
            ..FrameSample::default()
        });
        acc.push(FrameSample::default());
        acc.push(FrameSample {
            left_ankle: Some(Point::new(5.0, 6.0)),
            right_ankle: Some(Point::new(7.0, 6.0)),
            ..FrameSample::default()
        });

        let t = acc.finish();
        assert_eq!(t.len(), 3);
        assert_eq!(t.bbox().len(), 3);
        assert_eq!(t.skeleton().len(), 3);
        assert_eq!(t.hip_filtered().len(), 3);
        assert_eq!(t.ankle_frames(), 1);
        assert!(t.has_ankle_data());
    }

    #[test]
    fn test_ankle_data_needs_both_ankles() {
        let mut acc = TrajectoryAccumulator::new();
        acc.push(FrameSample {
            left_ankle: Some(Point::new(5.0, 6.0)),
            ..FrameSample::default()
        });
        let t = acc.finish();
        assert!(!t.has_ankle_data());
        assert_eq!(t.ankle_frames(), 0);
    }

    #[test]
    fn test_missing_values_become_nan() {
        let t = Trajectory::from_hip(vec![Some(Point::new(1.0, 2.0)), None]);
        let x = t.hip_raw_x();
        assert_eq!(x[0], 1.0);
        assert!(x[1].is_nan());
        assert!(t.hip_filtered_y()[1].is_nan());
        assert!(!t.has_ankle_data());
    }
}
