//! Boundary to the external perception models.
//!
//! The detector, pose estimator and feature encoder are opaque collaborators
//! injected by the caller. Their outputs are validated here into fixed-shape
//! values ([`Candidate`], [`Pose`], [`Embedding`]) before anything downstream
//! sees them; malformed outputs are dropped with a warning, never propagated.

use log::warn;
use serde::Serialize;

use crate::detection::{Candidate, RawDetection};
use crate::distances::cosine_similarity;
use crate::geometry::{BBox, Point};
use crate::{Error, Result};

/// Number of body keypoints produced by the pose estimator.
pub const NUM_KEYPOINTS: usize = 17;

/// 17-point body layout (COCO order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keypoint {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl Keypoint {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A decoded video frame. Only its size is needed by the core.
pub trait Frame {
    /// `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);
}

/// Person detector.
pub trait Detector<F: ?Sized> {
    fn detect(&mut self, frame: &F) -> Vec<RawDetection>;
}

/// Pose estimator run on a crop of the frame.
pub trait PoseEstimator<F: ?Sized> {
    /// Keypoints are relative to the crop's top-left corner. `None` on failure.
    fn estimate(&mut self, frame: &F, crop: &BBox) -> Option<RawPose>;
}

/// Appearance encoder run on a crop of the frame.
pub trait FeatureEncoder<F: ?Sized> {
    /// Fixed-length appearance vector, or `None` on failure.
    fn encode(&mut self, frame: &F, crop: &BBox) -> Option<Vec<f64>>;
}

/// Unvalidated pose estimator output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPose {
    pub keypoints: Vec<[f64; 2]>,
    pub scores: Vec<f64>,
}

/// Validated 17-point pose in global frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pose {
    keypoints: [Point; NUM_KEYPOINTS],
    scores: [f64; NUM_KEYPOINTS],
}

impl Pose {
    /// Validate a crop-relative pose and shift it into frame coordinates.
    pub fn from_raw(raw: &RawPose, crop: &BBox) -> Result<Self> {
        if raw.keypoints.len() != NUM_KEYPOINTS || raw.scores.len() != NUM_KEYPOINTS {
            return Err(Error::InvalidPose(format!(
                "expected {NUM_KEYPOINTS} keypoints and scores, got {} and {}",
                raw.keypoints.len(),
                raw.scores.len()
            )));
        }

        let mut keypoints = [Point::new(0.0, 0.0); NUM_KEYPOINTS];
        let mut scores = [0.0; NUM_KEYPOINTS];
        for (i, ([x, y], &s)) in raw.keypoints.iter().zip(&raw.scores).enumerate() {
            if !(x.is_finite() && y.is_finite() && s.is_finite()) {
                return Err(Error::InvalidPose(format!("keypoint {i} is not finite")));
            }
            keypoints[i] = Point::new(x + crop.x1, y + crop.y1);
            scores[i] = s;
        }

        Ok(Self { keypoints, scores })
    }

    pub fn keypoint(&self, kp: Keypoint) -> Point {
        self.keypoints[kp.index()]
    }

    pub fn score(&self, kp: Keypoint) -> f64 {
        self.scores[kp.index()]
    }

    pub fn keypoints(&self) -> &[Point; NUM_KEYPOINTS] {
        &self.keypoints
    }

    /// Keypoint position if its confidence reaches `min_score`.
    pub fn confident(&self, kp: Keypoint, min_score: f64) -> Option<Point> {
        (self.score(kp) >= min_score).then(|| self.keypoint(kp))
    }

    /// Midpoint of the hips when both reach `min_score`.
    pub fn hip_center(&self, min_score: f64) -> Option<Point> {
        let left = self.confident(Keypoint::LeftHip, min_score)?;
        let right = self.confident(Keypoint::RightHip, min_score)?;
        Some(left.midpoint(&right))
    }
}

/// L2-normalized appearance embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f64>);

impl Embedding {
    /// Validate and normalize an encoder output.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidEmbedding("embedding is empty".to_string()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidEmbedding("embedding is not finite".to_string()));
        }
        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= 0.0 || !norm.is_finite() {
            return Err(Error::InvalidEmbedding("embedding has zero norm".to_string()));
        }
        Ok(Self(values.into_iter().map(|v| v / norm).collect()))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Cosine similarity, `None` when dimensions differ.
    pub fn similarity(&self, other: &[f64]) -> Option<f64> {
        cosine_similarity(&self.0, other)
    }
}

/// Validate detector output, dropping malformed detections.
pub fn validate_detections(raw: &[RawDetection]) -> Vec<Candidate> {
    raw.iter()
        .filter_map(|d| match Candidate::from_raw(d) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("dropping detection: {e}");
                None
            }
        })
        .collect()
}

/// Per-candidate embedding source for the target selectors.
pub trait EmbeddingLookup {
    /// Embedding of candidate `index`, or `None` if unavailable.
    fn embedding(&mut self, index: usize) -> Option<&Embedding>;
}

/// Embeddings computed lazily from the encoder and cached for one frame.
///
/// The encoder runs at most once per candidate, and only for candidates
/// whose embedding is actually requested.
pub struct CandidateEmbeddings<'a, F: ?Sized, E: ?Sized> {
    frame: &'a F,
    encoder: &'a mut E,
    crops: Vec<Option<BBox>>,
    cache: Vec<Option<Option<Embedding>>>,
    encoder_calls: usize,
}

impl<'a, F, E> CandidateEmbeddings<'a, F, E>
where
    F: Frame + ?Sized,
    E: FeatureEncoder<F> + ?Sized,
{
    pub fn new(frame: &'a F, encoder: &'a mut E, candidates: &[Candidate]) -> Self {
        let (w, h) = frame.dimensions();
        let crops: Vec<Option<BBox>> = candidates.iter().map(|c| c.bbox.clamp_to(w, h)).collect();
        let cache = vec![None; crops.len()];
        Self {
            frame,
            encoder,
            crops,
            cache,
            encoder_calls: 0,
        }
    }

    /// Number of encoder invocations so far.
    pub fn encoder_calls(&self) -> usize {
        self.encoder_calls
    }

    fn compute(&mut self, index: usize) -> Option<Embedding> {
        let crop = self.crops[index]?;
        self.encoder_calls += 1;
        let values = self.encoder.encode(self.frame, &crop)?;
        match Embedding::new(values) {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("dropping embedding for candidate {index}: {e}");
                None
            }
        }
    }
}

impl<'a, F, E> EmbeddingLookup for CandidateEmbeddings<'a, F, E>
where
    F: Frame + ?Sized,
    E: FeatureEncoder<F> + ?Sized,
{
    fn embedding(&mut self, index: usize) -> Option<&Embedding> {
        if index >= self.cache.len() {
            return None;
        }
        if self.cache[index].is_none() {
            let computed = self.compute(index);
            self.cache[index] = Some(computed);
        }
        self.cache[index].as_ref().and_then(Option::as_ref)
    }
}

/// Embeddings already known for every candidate.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedEmbeddings(pub Vec<Option<Embedding>>);

impl EmbeddingLookup for PrecomputedEmbeddings {
    fn embedding(&mut self, index: usize) -> Option<&Embedding> {
        self.0.get(index).and_then(Option::as_ref)
    }
}
