//! Per-frame person candidates.

use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, Point};
use crate::{Error, Result};

/// Detector output before validation: `[x1, y1, x2, y2]` and a confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub bbox: [f64; 4],
    pub score: f64,
}

impl RawDetection {
    pub fn new(bbox: [f64; 4], score: f64) -> Self {
        Self { bbox, score }
    }
}

/// A validated person detection in one frame.
///
/// Candidates live for a single frame. Their appearance embeddings are
/// computed on demand through
/// [`CandidateEmbeddings`](crate::perception::CandidateEmbeddings).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Bounding box in frame pixels.
    pub bbox: BBox,
    /// Detection confidence.
    pub score: f64,
}

impl Candidate {
    /// Create a candidate, rejecting malformed boxes and non-finite scores.
    pub fn new(bbox: BBox, score: f64) -> Result<Self> {
        if !score.is_finite() {
            return Err(Error::InvalidDetection(format!(
                "detection score must be finite, got {score}"
            )));
        }
        Ok(Self { bbox, score })
    }

    /// Validate a raw detector output.
    pub fn from_raw(raw: &RawDetection) -> Result<Self> {
        let [x1, y1, x2, y2] = raw.bbox;
        Self::new(BBox::new(x1, y1, x2, y2)?, raw.score)
    }

    pub fn center(&self) -> Point {
        self.bbox.center()
    }
}
