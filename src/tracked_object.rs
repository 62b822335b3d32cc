//! The single tracked athlete.

use crate::filter::Filter;
use crate::geometry::{BBox, Point};
use crate::reid::EmbeddingReference;

/// Persistent state of the one track the tracker owns.
///
/// Created on the first accepted candidate and discarded once the miss
/// count exceeds the configured ceiling.
pub struct TrackState {
    /// Track identifier, increasing with each (re)initialization.
    pub id: u32,
    /// Last accepted or predicted bounding box.
    pub bbox: BBox,
    /// Last accepted detection box.
    pub last_accepted_bbox: BBox,
    /// Constant-velocity filter over the box center.
    pub filter: Box<dyn Filter>,
    /// Appearance memory.
    pub reference: EmbeddingReference,
    /// Consecutive frames without an accepted candidate.
    pub miss_count: u32,
    /// Frames since initialization.
    pub age: u32,
    /// Frames with an accepted candidate.
    pub hits: u32,
}

impl TrackState {
    pub fn new(id: u32, bbox: BBox, filter: Box<dyn Filter>, reference: EmbeddingReference) -> Self {
        Self {
            id,
            bbox,
            last_accepted_bbox: bbox,
            filter,
            reference,
            miss_count: 0,
            age: 1,
            hits: 1,
        }
    }

    /// Box of the last accepted size centered on the predicted position.
    ///
    /// Advances the filter by one frame.
    pub fn predict(&mut self) -> BBox {
        let center = self.filter.predict();
        BBox::from_center_size(
            center,
            self.last_accepted_bbox.width(),
            self.last_accepted_bbox.height(),
        )
    }

    /// Center of the current estimate.
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    /// Velocity of the box center, in pixels per second.
    pub fn velocity(&self) -> (f64, f64) {
        self.filter.velocity()
    }
}

impl std::fmt::Debug for TrackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackState")
            .field("id", &self.id)
            .field("bbox", &self.bbox)
            .field("last_accepted_bbox", &self.last_accepted_bbox)
            .field("state", self.filter.state_vector())
            .field("miss_count", &self.miss_count)
            .field("age", &self.age)
            .field("hits", &self.hits)
            .finish()
    }
}
