//! Single-target track lifecycle.
//!
//! States: uninitialized (no track yet), tracked, and lost (a track existed
//! and was dropped after too many misses). Only one track exists at a time.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::detection::Candidate;
use crate::filter::{ConstantVelocityFilterFactory, FilterFactory, KalmanNoise};
use crate::geometry::{BBox, Point};
use crate::perception::EmbeddingLookup;
use crate::selector::{selector_from_config, Selection, SelectionContext, SelectionStats, TargetSelector};
use crate::tracked_object::TrackState;
use crate::{Error, Result};

/// Target selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Overlap, then re-identification, then reference point, then score.
    #[default]
    Cascade,
    /// Weighted appearance/motion/overlap score with a margin rule.
    WeightedFusion,
}

fn default_max_misses() -> u32 { 20 }
fn default_strong_iou() -> f64 { 0.5 }
fn default_reid_threshold() -> f64 { 0.55 }
fn default_reid_update_min() -> f64 { 0.40 }
fn default_embedding_history() -> usize { 10 }
fn default_short_weight() -> f64 { 0.55 }
fn default_long_weight() -> f64 { 0.25 }
fn default_motion_weight() -> f64 { 0.10 }
fn default_iou_weight() -> f64 { 0.10 }
fn default_fusion_threshold() -> f64 { 0.28 }
fn default_fusion_margin() -> f64 { 0.05 }
fn default_ema_momentum() -> f64 { 0.85 }
fn default_motion_scale_px() -> f64 { 80.0 }

/// Configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Target selection policy.
    #[serde(default)]
    pub selector: SelectorKind,

    /// Consecutive misses tolerated before the track is dropped.
    #[serde(default = "default_max_misses")]
    pub max_misses: u32,

    /// IOU with the previous box that accepts a candidate outright.
    #[serde(default = "default_strong_iou")]
    pub strong_iou: f64,

    /// Minimum similarity to the reference centroid for re-identification.
    #[serde(default = "default_reid_threshold")]
    pub reid_threshold: f64,

    /// Minimum similarity for an accepted embedding to enter the centroid buffer.
    #[serde(default = "default_reid_update_min")]
    pub reid_update_min: f64,

    /// Number of embeddings kept in the centroid buffer.
    #[serde(default = "default_embedding_history")]
    pub embedding_history: usize,

    #[serde(default = "default_short_weight")]
    pub short_weight: f64,

    #[serde(default = "default_long_weight")]
    pub long_weight: f64,

    #[serde(default = "default_motion_weight")]
    pub motion_weight: f64,

    #[serde(default = "default_iou_weight")]
    pub iou_weight: f64,

    /// Minimum fused score to accept a candidate.
    #[serde(default = "default_fusion_threshold")]
    pub fusion_threshold: f64,

    /// Minimum lead of the best fused score over the second best.
    #[serde(default = "default_fusion_margin")]
    pub fusion_margin: f64,

    /// Weight kept on history when updating the long embedding anchor.
    #[serde(default = "default_ema_momentum")]
    pub ema_momentum: f64,

    /// Distance in pixels at which motion coherence decays to 1/e.
    #[serde(default = "default_motion_scale_px")]
    pub motion_scale_px: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            selector: SelectorKind::default(),
            max_misses: default_max_misses(),
            strong_iou: default_strong_iou(),
            reid_threshold: default_reid_threshold(),
            reid_update_min: default_reid_update_min(),
            embedding_history: default_embedding_history(),
            short_weight: default_short_weight(),
            long_weight: default_long_weight(),
            motion_weight: default_motion_weight(),
            iou_weight: default_iou_weight(),
            fusion_threshold: default_fusion_threshold(),
            fusion_margin: default_fusion_margin(),
            ema_momentum: default_ema_momentum(),
            motion_scale_px: default_motion_scale_px(),
        }
    }
}

impl TrackerConfig {
    /// Default configuration with the given selection policy.
    pub fn new(selector: SelectorKind) -> Self {
        Self {
            selector,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("strong_iou", self.strong_iou),
            ("reid_threshold", self.reid_threshold.abs()),
            ("reid_update_min", self.reid_update_min.abs()),
            ("ema_momentum", self.ema_momentum),
        ];
        for (name, v) in unit {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::InvalidConfig(format!("{name} must be in [0, 1]")));
            }
        }

        let weights = [self.short_weight, self.long_weight, self.motion_weight, self.iou_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidConfig(
                "fusion weights must be finite and non-negative".to_string(),
            ));
        }
        if !self.fusion_threshold.is_finite() || !self.fusion_margin.is_finite() || self.fusion_margin < 0.0 {
            return Err(Error::InvalidConfig(
                "fusion_threshold and fusion_margin must be finite, margin non-negative".to_string(),
            ));
        }
        if self.embedding_history == 0 {
            return Err(Error::InvalidConfig(
                "embedding_history must be at least 1".to_string(),
            ));
        }
        if !(self.motion_scale_px > 0.0 && self.motion_scale_px.is_finite()) {
            return Err(Error::InvalidConfig(
                "motion_scale_px must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPhase {
    Uninitialized,
    Tracked,
    Lost,
}

/// What happened to the track in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackOutcome {
    /// Candidate `index` was accepted. `initialized` is set on the first
    /// frame of a new track.
    Hit {
        index: usize,
        initialized: bool,
        selection: Selection,
    },
    /// The track coasted on its prediction.
    Miss { miss_count: u32 },
    /// The track exceeded the miss ceiling and was discarded.
    Lost,
    /// No track exists and none was started.
    NoTrack,
}

/// Result of [`SingleTargetTracker::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackUpdate {
    pub outcome: TrackOutcome,
    /// Filtered (hit) or predicted (miss) box of the track, if one exists.
    pub estimate: Option<BBox>,
}

impl TrackUpdate {
    pub fn accepted(&self) -> Option<usize> {
        match self.outcome {
            TrackOutcome::Hit { index, .. } => Some(index),
            _ => None,
        }
    }
}

/// Single-target tracker.
///
/// Keeps at most one [`TrackState`], fed by a [`TargetSelector`] and a
/// constant-velocity filter over the box center.
pub struct SingleTargetTracker {
    /// Tracker configuration.
    pub config: TrackerConfig,

    selector: Box<dyn TargetSelector>,
    filter_factory: Box<dyn FilterFactory>,
    track: Option<TrackState>,

    /// User-supplied point used before any track has existed.
    reference_point: Option<Point>,
    /// Center of the last accepted box of a dropped track.
    last_known_center: Option<Point>,

    tracks_started: u32,
}

impl SingleTargetTracker {
    /// Create a tracker.
    ///
    /// # Arguments
    /// * `config` - Tracker configuration, validated here
    /// * `bbox_noise` - Noise of the box-center filter
    /// * `fps` - Frame rate of the video
    /// * `reference_point` - Optional point near the athlete in the first frames
    pub fn new(
        config: TrackerConfig,
        bbox_noise: KalmanNoise,
        fps: f64,
        reference_point: Option<Point>,
    ) -> Result<Self> {
        config.validate()?;
        bbox_noise.validate()?;
        if let Some(p) = reference_point {
            if !p.is_finite() {
                return Err(Error::InvalidReferencePoint(format!(
                    "reference point must be finite, got ({}, {})",
                    p.x, p.y
                )));
            }
        }
        let selector = selector_from_config(&config);
        Ok(Self::with_parts(
            config,
            selector,
            Box::new(ConstantVelocityFilterFactory::new(fps, bbox_noise)),
            reference_point,
        ))
    }

    /// Create a tracker from an explicit selector and filter factory.
    pub fn with_parts(
        config: TrackerConfig,
        selector: Box<dyn TargetSelector>,
        filter_factory: Box<dyn FilterFactory>,
        reference_point: Option<Point>,
    ) -> Self {
        Self {
            config,
            selector,
            filter_factory,
            track: None,
            reference_point,
            last_known_center: None,
            tracks_started: 0,
        }
    }

    /// Process one frame of candidates.
    ///
    /// With a track, the motion model is advanced first so selection can use
    /// the predicted box; an accepted candidate then corrects it.
    pub fn update(
        &mut self,
        candidates: &[Candidate],
        embeddings: &mut dyn EmbeddingLookup,
    ) -> TrackUpdate {
        let predicted = self.track.as_mut().map(|t| t.predict());

        let selection = if candidates.is_empty() {
            None
        } else {
            let ctx = SelectionContext {
                previous_bbox: self.track.as_ref().map(|t| t.last_accepted_bbox),
                predicted_bbox: predicted,
                reference: self.track.as_ref().map(|t| &t.reference),
                anchor: self.anchor(),
            };
            self.selector.select(candidates, &ctx, embeddings)
        };

        match (selection, predicted) {
            (Some(selection), Some(predicted)) => self.hit(candidates, selection, predicted, embeddings),
            (Some(selection), None) => self.start_track(candidates, selection, embeddings),
            (None, Some(predicted)) => self.miss(predicted),
            (None, None) => TrackUpdate {
                outcome: TrackOutcome::NoTrack,
                estimate: None,
            },
        }
    }

    /// Current lifecycle state.
    pub fn phase(&self) -> TrackPhase {
        match (&self.track, self.tracks_started) {
            (Some(_), _) => TrackPhase::Tracked,
            (None, 0) => TrackPhase::Uninitialized,
            (None, _) => TrackPhase::Lost,
        }
    }

    pub fn track(&self) -> Option<&TrackState> {
        self.track.as_ref()
    }

    pub fn stats(&self) -> &SelectionStats {
        self.selector.stats()
    }

    /// Number of tracks started so far (re-acquisitions included).
    pub fn tracks_started(&self) -> u32 {
        self.tracks_started
    }

    /// Discard the current track, if any.
    pub fn reset(&mut self) {
        if let Some(track) = self.track.take() {
            self.last_known_center = Some(track.last_accepted_bbox.center());
            debug!(
                "track {} dropped after {} misses (age {}, hits {})",
                track.id, track.miss_count, track.age, track.hits
            );
        }
    }

    fn anchor(&self) -> Option<Point> {
        match self.track {
            Some(_) => None,
            None => self.last_known_center.or(self.reference_point),
        }
    }

    fn start_track(
        &mut self,
        candidates: &[Candidate],
        selection: Selection,
        embeddings: &mut dyn EmbeddingLookup,
    ) -> TrackUpdate {
        let bbox = candidates[selection.index].bbox;
        let filter = self.filter_factory.create_filter(bbox.center());
        let mut reference = self.selector.new_reference();
        if let Some(e) = embeddings.embedding(selection.index) {
            reference.observe(e);
        }

        self.tracks_started += 1;
        let track = TrackState::new(self.tracks_started, bbox, filter, reference);
        debug!("track {} started by {:?} at {:?}", track.id, selection.rule, bbox);
        self.track = Some(track);

        TrackUpdate {
            outcome: TrackOutcome::Hit {
                index: selection.index,
                initialized: true,
                selection,
            },
            estimate: Some(bbox),
        }
    }

    fn hit(
        &mut self,
        candidates: &[Candidate],
        selection: Selection,
        predicted: BBox,
        embeddings: &mut dyn EmbeddingLookup,
    ) -> TrackUpdate {
        let detected = candidates[selection.index].bbox;
        let Some(track) = self.track.as_mut() else {
            return self.start_track(candidates, selection, embeddings);
        };

        let center = match track.filter.correct(detected.center()) {
            Ok(c) => c,
            Err(e) => {
                warn!("track {}: {e}; keeping prediction", track.id);
                predicted.center()
            }
        };
        track.bbox = BBox::from_center_size(center, detected.width(), detected.height());
        track.last_accepted_bbox = detected;
        track.miss_count = 0;
        track.hits += 1;
        track.age += 1;
        if let Some(e) = embeddings.embedding(selection.index) {
            track.reference.observe(e);
        }
        trace!("track {} hit candidate {}", track.id, selection.index);

        TrackUpdate {
            outcome: TrackOutcome::Hit {
                index: selection.index,
                initialized: false,
                selection,
            },
            estimate: Some(track.bbox),
        }
    }

    fn miss(&mut self, predicted: BBox) -> TrackUpdate {
        let max_misses = self.config.max_misses;
        let Some(track) = self.track.as_mut() else {
            return TrackUpdate {
                outcome: TrackOutcome::NoTrack,
                estimate: None,
            };
        };

        track.miss_count += 1;
        track.age += 1;
        track.bbox = predicted;
        trace!("track {} missed ({} in a row)", track.id, track.miss_count);

        if track.miss_count > max_misses {
            self.reset();
            return TrackUpdate {
                outcome: TrackOutcome::Lost,
                estimate: None,
            };
        }

        TrackUpdate {
            outcome: TrackOutcome::Miss {
                miss_count: track.miss_count,
            },
            estimate: Some(predicted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{Embedding, PrecomputedEmbeddings};
    use crate::selector::SelectionRule;
    use approx::assert_relative_eq;

    fn cand(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> Candidate {
        Candidate::new(BBox::new(x1, y1, x2, y2).unwrap(), score).unwrap()
    }

    fn tracker(config: TrackerConfig, reference_point: Option<Point>) -> SingleTargetTracker {
        SingleTargetTracker::new(config, KalmanNoise::bbox_center(), 30.0, reference_point).unwrap()
    }

    fn none() -> PrecomputedEmbeddings {
        PrecomputedEmbeddings::default()
    }

    // ===== Construction tests =====

    #[test]
    fn test_tracker_new() {
        let t = tracker(TrackerConfig::default(), None);
        assert_eq!(t.phase(), TrackPhase::Uninitialized);
        assert!(t.track().is_none());
        assert_eq!(t.tracks_started(), 0);
    }

    #[test]
    fn test_tracker_invalid_config() {
        let config = TrackerConfig {
            strong_iou: 1.5,
            ..TrackerConfig::default()
        };
        let result = SingleTargetTracker::new(config, KalmanNoise::bbox_center(), 30.0, None);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let config = TrackerConfig {
            embedding_history: 0,
            ..TrackerConfig::default()
        };
        assert!(SingleTargetTracker::new(config, KalmanNoise::bbox_center(), 30.0, None).is_err());
    }

    #[test]
    fn test_tracker_invalid_reference_point() {
        let result = SingleTargetTracker::new(
            TrackerConfig::default(),
            KalmanNoise::bbox_center(),
            30.0,
            Some(Point::new(f64::NAN, 0.0)),
        );
        assert!(matches!(result, Err(Error::InvalidReferencePoint(_))));
    }

    // ===== Lifecycle tests =====

    #[test]
    fn test_tracker_no_candidates_no_track() {
        let mut t = tracker(TrackerConfig::default(), None);
        let update = t.update(&[], &mut none());
        assert_eq!(update.outcome, TrackOutcome::NoTrack);
        assert_eq!(update.estimate, None);
    }

    #[test]
    fn test_tracker_initializes_on_first_candidate() {
        let mut t = tracker(TrackerConfig::default(), None);
        let update = t.update(&[cand(0.0, 0.0, 20.0, 40.0, 0.9)], &mut none());

        assert_eq!(update.accepted(), Some(0));
        assert!(matches!(update.outcome, TrackOutcome::Hit { initialized: true, .. }));
        assert_eq!(t.phase(), TrackPhase::Tracked);
        assert_eq!(t.track().unwrap().id, 1);
    }

    #[test]
    fn test_tracker_hit_resets_misses_and_counts() {
        let mut t = tracker(TrackerConfig::default(), None);
        let c = [cand(0.0, 0.0, 20.0, 40.0, 0.9)];
        t.update(&c, &mut none());
        t.update(&[], &mut none());
        t.update(&[], &mut none());
        assert_eq!(t.track().unwrap().miss_count, 2);

        let update = t.update(&c, &mut none());
        assert!(matches!(update.outcome, TrackOutcome::Hit { initialized: false, .. }));
        let track = t.track().unwrap();
        assert_eq!(track.miss_count, 0);
        assert_eq!(track.hits, 2);
        assert_eq!(track.age, 4);
    }

    #[test]
    fn test_tracker_miss_reports_prediction() {
        let mut t = tracker(TrackerConfig::default(), None);
        t.update(&[cand(0.0, 0.0, 20.0, 40.0, 0.9)], &mut none());
        let update = t.update(&[], &mut none());

        assert_eq!(update.outcome, TrackOutcome::Miss { miss_count: 1 });
        let estimate = update.estimate.unwrap();
        assert_relative_eq!(estimate.center().x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(estimate.width(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tracker_lost_after_max_misses() {
        let config = TrackerConfig {
            max_misses: 3,
            ..TrackerConfig::default()
        };
        let mut t = tracker(config, None);
        t.update(&[cand(0.0, 0.0, 20.0, 40.0, 0.9)], &mut none());

        for i in 1..=3 {
            assert_eq!(t.update(&[], &mut none()).outcome, TrackOutcome::Miss { miss_count: i });
        }
        assert_eq!(t.update(&[], &mut none()).outcome, TrackOutcome::Lost);
        assert_eq!(t.phase(), TrackPhase::Lost);
        assert!(t.track().is_none());
        assert_eq!(t.update(&[], &mut none()).outcome, TrackOutcome::NoTrack);
    }

    #[test]
    fn test_tracker_reacquires_near_last_known_center() {
        let config = TrackerConfig {
            max_misses: 0,
            ..TrackerConfig::default()
        };
        let mut t = tracker(config, Some(Point::new(1000.0, 1000.0)));
        t.update(&[cand(0.0, 0.0, 20.0, 40.0, 0.9)], &mut none());
        assert_eq!(t.update(&[], &mut none()).outcome, TrackOutcome::Lost);

        // Far box has the higher score, near box sits on the last center
        let candidates = [cand(500.0, 500.0, 520.0, 540.0, 0.99), cand(2.0, 0.0, 22.0, 40.0, 0.5)];
        let update = t.update(&candidates, &mut none());
        assert_eq!(update.accepted(), Some(1));
        assert_eq!(t.tracks_started(), 2);
        assert_eq!(t.track().unwrap().id, 2);
    }

    #[test]
    fn test_tracker_reference_point_picks_first_target() {
        let mut t = tracker(TrackerConfig::default(), Some(Point::new(310.0, 20.0)));
        let candidates = [cand(0.0, 0.0, 20.0, 40.0, 0.99), cand(300.0, 0.0, 320.0, 40.0, 0.5)];
        let update = t.update(&candidates, &mut none());
        match update.outcome {
            TrackOutcome::Hit { index, selection, .. } => {
                assert_eq!(index, 1);
                assert_eq!(selection.rule, SelectionRule::ReferencePoint);
            }
            other => panic!("expected a hit, got {other:?}"),
        }
        assert_eq!(t.stats().reference_point, 1);
    }

    #[test]
    fn test_tracker_updates_reference_on_hits() {
        let mut t = tracker(TrackerConfig::new(SelectorKind::WeightedFusion), None);
        let mut lookup = PrecomputedEmbeddings(vec![Some(Embedding::new(vec![1.0, 0.0]).unwrap())]);
        t.update(&[cand(0.0, 0.0, 20.0, 40.0, 0.9)], &mut lookup);
        assert!(!t.track().unwrap().reference.is_empty());

        let update = t.update(&[cand(1.0, 0.0, 21.0, 40.0, 0.9)], &mut lookup);
        assert!(matches!(
            update.outcome,
            TrackOutcome::Hit { selection: Selection { rule: SelectionRule::Fusion, .. }, .. }
        ));
    }

    #[test]
    fn test_fusion_tracker_misses_on_ambiguity() {
        let mut t = tracker(TrackerConfig::new(SelectorKind::WeightedFusion), None);
        let e = Embedding::new(vec![1.0, 0.0]).unwrap();
        let mut single = PrecomputedEmbeddings(vec![Some(e.clone())]);
        t.update(&[cand(100.0, 0.0, 120.0, 40.0, 0.9)], &mut single);

        // Twins on both sides of the track
        let twins = [cand(60.0, 0.0, 80.0, 40.0, 0.9), cand(140.0, 0.0, 160.0, 40.0, 0.9)];
        let mut both = PrecomputedEmbeddings(vec![Some(e.clone()), Some(e)]);
        let update = t.update(&twins, &mut both);
        assert_eq!(update.outcome, TrackOutcome::Miss { miss_count: 1 });
        assert_eq!(t.stats().rejected, 1);
    }
}
