//! Per-video frame loop.
//!
//! [`AthleteAnalyzer`] owns everything mutable for one video: the tracker,
//! the hip filter and the trajectory. Frames must be fed in order; once the
//! last frame is in, [`AthleteAnalyzer::finish`] runs the metrics engine.

use log::{debug, trace, warn};

use crate::calibration::{Calibration, CalibrationScale};
use crate::config::AnalysisConfig;
use crate::filter::{ConstantVelocityFilterFactory, Filter, FilterFactory};
use crate::geometry::{BBox, Point};
use crate::metrics::{MetricsEngine, MetricsResult};
use crate::perception::{
    validate_detections, CandidateEmbeddings, Detector, FeatureEncoder, Frame, Keypoint, Pose,
    PoseEstimator,
};
use crate::selector::SelectionStats;
use crate::tracker::{SingleTargetTracker, TrackOutcome, TrackPhase};
use crate::trajectory::{FrameSample, Trajectory, TrajectoryAccumulator};
use crate::{Error, Result};

/// What happened in one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: usize,
    /// Valid candidates after detector output validation.
    pub candidates: usize,
    pub outcome: TrackOutcome,
    /// Detected box of the athlete when a candidate was accepted.
    pub bbox: Option<BBox>,
    pub hip_raw: Option<Point>,
    pub hip_filtered: Option<Point>,
    /// Whether a valid pose was recorded.
    pub pose: bool,
    pub encoder_calls: usize,
}

/// Single-athlete analysis of one video.
pub struct AthleteAnalyzer {
    config: AnalysisConfig,
    scale: CalibrationScale,
    fps: f64,

    tracker: SingleTargetTracker,
    engine: MetricsEngine,
    hip_factory: ConstantVelocityFilterFactory,
    hip_filter: Option<Box<dyn Filter>>,

    last_hip: Option<Point>,
    last_left_ankle: Option<Point>,
    last_right_ankle: Option<Point>,

    trajectory: TrajectoryAccumulator,
    frames_accepted: usize,
    encoder_calls: usize,
}

impl AthleteAnalyzer {
    /// Create an analyzer, validating every input before any frame is seen.
    ///
    /// # Arguments
    /// * `config` - Tracker, metrics and filter configuration
    /// * `calibration` - Two pixel points a known distance apart
    /// * `reference_point` - Optional point near the athlete at the start
    /// * `fps` - Frame rate of the video
    pub fn new(
        config: AnalysisConfig,
        calibration: &Calibration,
        reference_point: Option<Point>,
        fps: f64,
    ) -> Result<Self> {
        let scale = CalibrationScale::try_from(calibration)?;
        Self::with_scale(config, scale, reference_point, fps)
    }

    /// Create an analyzer from an already validated scale.
    pub fn with_scale(
        config: AnalysisConfig,
        scale: CalibrationScale,
        reference_point: Option<Point>,
        fps: f64,
    ) -> Result<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(Error::InvalidConfig(format!("fps must be positive, got {fps}")));
        }
        config.validate()?;

        let tracker = SingleTargetTracker::new(
            config.tracker.clone(),
            config.bbox_filter,
            fps,
            reference_point,
        )?;
        let engine = MetricsEngine::new(config.metrics.clone())?;
        let hip_factory = ConstantVelocityFilterFactory::new(fps, config.hip_filter);

        Ok(Self {
            config,
            scale,
            fps,
            tracker,
            engine,
            hip_factory,
            hip_filter: None,
            last_hip: None,
            last_left_ankle: None,
            last_right_ankle: None,
            trajectory: TrajectoryAccumulator::new(),
            frames_accepted: 0,
            encoder_calls: 0,
        })
    }

    /// Process the next frame.
    ///
    /// Collaborator failures degrade the frame (missing pose, missing
    /// embedding, no detections) but never abort the run.
    pub fn process_frame<F, D, P, E>(
        &mut self,
        frame: &F,
        detector: &mut D,
        pose_estimator: &mut P,
        encoder: &mut E,
    ) -> FrameReport
    where
        F: Frame + ?Sized,
        D: Detector<F> + ?Sized,
        P: PoseEstimator<F> + ?Sized,
        E: FeatureEncoder<F> + ?Sized,
    {
        let frame_index = self.trajectory.len();
        let candidates = validate_detections(&detector.detect(frame));

        let (update, encoder_calls) = {
            let mut embeddings = CandidateEmbeddings::new(frame, encoder, &candidates);
            let update = self.tracker.update(&candidates, &mut embeddings);
            (update, embeddings.encoder_calls())
        };
        self.encoder_calls += encoder_calls;

        let sample = match update.accepted() {
            Some(index) => {
                self.frames_accepted += 1;
                self.accepted_sample(frame, pose_estimator, candidates[index].bbox)
            }
            None => self.missed_sample(),
        };
        trace!(
            "frame {frame_index}: {} candidates, {:?}, hip {:?}",
            candidates.len(),
            update.outcome,
            sample.hip_raw
        );

        let report = FrameReport {
            frame_index,
            candidates: candidates.len(),
            outcome: update.outcome,
            bbox: sample.bbox,
            hip_raw: sample.hip_raw,
            hip_filtered: sample.hip_filtered,
            pose: sample.skeleton.is_some(),
            encoder_calls,
        };
        self.trajectory.push(sample);
        report
    }

    fn accepted_sample<F, P>(&mut self, frame: &F, pose_estimator: &mut P, bbox: BBox) -> FrameSample
    where
        F: Frame + ?Sized,
        P: PoseEstimator<F> + ?Sized,
    {
        let (w, h) = frame.dimensions();
        let pose = bbox
            .expand_for_pose(w, h)
            .and_then(|crop| pose_estimator.estimate(frame, &crop).map(|raw| (raw, crop)))
            .and_then(|(raw, crop)| match Pose::from_raw(&raw, &crop) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("frame {}: dropping pose: {e}", self.trajectory.len());
                    None
                }
            });

        let metrics = &self.config.metrics;
        let hip = pose
            .as_ref()
            .and_then(|p| p.hip_center(metrics.kpt_score_thr))
            .unwrap_or_else(|| bbox.center());

        if let Some(p) = &pose {
            if let Some(a) = p.confident(Keypoint::LeftAnkle, metrics.ankle_score_thr) {
                self.last_left_ankle = Some(a);
            }
            if let Some(a) = p.confident(Keypoint::RightAnkle, metrics.ankle_score_thr) {
                self.last_right_ankle = Some(a);
            }
        }

        let filtered = match self.hip_filter.as_mut() {
            None => {
                debug!("hip filter initialized at ({:.1}, {:.1})", hip.x, hip.y);
                self.hip_filter = Some(self.hip_factory.create_filter(hip));
                hip
            }
            Some(filter) => match filter.update(hip) {
                Ok(p) => p,
                Err(e) => {
                    warn!("hip filter: {e}; using prediction");
                    filter.position()
                }
            },
        };
        self.last_hip = Some(hip);

        FrameSample {
            hip_raw: Some(hip),
            hip_filtered: Some(filtered),
            left_ankle: self.last_left_ankle,
            right_ankle: self.last_right_ankle,
            bbox: Some(bbox),
            skeleton: pose,
        }
    }

    fn missed_sample(&mut self) -> FrameSample {
        let filtered = match (self.hip_filter.as_mut(), self.last_hip) {
            (Some(filter), Some(_)) => Some(filter.predict()),
            (_, held) => held,
        };
        FrameSample {
            hip_raw: self.last_hip,
            hip_filtered: filtered,
            left_ankle: self.last_left_ankle,
            right_ankle: self.last_right_ankle,
            bbox: None,
            skeleton: None,
        }
    }

    /// Process every frame of an iterator, then compute the metrics.
    pub fn run<I, F, D, P, E>(
        mut self,
        frames: I,
        detector: &mut D,
        pose_estimator: &mut P,
        encoder: &mut E,
    ) -> Result<MetricsResult>
    where
        I: IntoIterator<Item = F>,
        F: Frame,
        D: Detector<F> + ?Sized,
        P: PoseEstimator<F> + ?Sized,
        E: FeatureEncoder<F> + ?Sized,
    {
        for frame in frames {
            self.process_frame(&frame, detector, pose_estimator, encoder);
        }
        self.finish()
    }

    /// Compute the metrics over all processed frames.
    ///
    /// Fails with `NoTargetTracked` when no frame ever accepted a candidate.
    pub fn finish(self) -> Result<MetricsResult> {
        let trajectory = self.trajectory.finish();
        if self.frames_accepted == 0 {
            return Err(Error::NoTargetTracked);
        }
        debug!(
            "{} of {} frames tracked, {} tracks started",
            self.frames_accepted,
            trajectory.len(),
            self.tracker.tracks_started()
        );
        self.engine.compute(&trajectory, &self.scale, self.fps)
    }

    /// Trajectory recorded so far.
    pub fn trajectory(&self) -> &Trajectory {
        self.trajectory.view()
    }

    pub fn frames_processed(&self) -> usize {
        self.trajectory.len()
    }

    pub fn frames_accepted(&self) -> usize {
        self.frames_accepted
    }

    /// Total encoder invocations across all frames.
    pub fn encoder_calls(&self) -> usize {
        self.encoder_calls
    }

    pub fn selection_stats(&self) -> &SelectionStats {
        self.tracker.stats()
    }

    pub fn phase(&self) -> TrackPhase {
        self.tracker.phase()
    }

    pub fn tracker(&self) -> &SingleTargetTracker {
        &self.tracker
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn scale(&self) -> &CalibrationScale {
        &self.scale
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}
