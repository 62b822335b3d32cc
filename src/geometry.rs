//! Pixel-space geometry: points, bounding boxes, overlap and crop regions.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A 2-D point in pixel coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new(0.5 * (self.x + other.x), 0.5 * (self.y + other.y))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Point::new(p[0], p[1])
    }
}

/// Axis-aligned bounding box `(x1, y1, x2, y2)`.
///
/// Constructed through [`BBox::new`], which guarantees finite corners with
/// `x2 >= x1` and `y2 >= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    /// Create a validated bounding box.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidDetection(format!(
                "bounding box has non-finite corners ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        if x2 < x1 || y2 < y1 {
            return Err(Error::InvalidDetection(format!(
                "bounding box is inverted ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Box of the given size centered on `center`. Negative sizes are clamped to zero.
    pub fn from_center_size(center: Point, width: f64, height: f64) -> Self {
        let hw = 0.5 * width.max(0.0);
        let hh = 0.5 * height.max(0.0);
        Self {
            x1: center.x - hw,
            y1: center.y - hh,
            x2: center.x + hw,
            y2: center.y + hh,
        }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new(0.5 * (self.x1 + self.x2), 0.5 * (self.y1 + self.y2))
    }

    /// Intersection over union with another box, in [0, 1].
    pub fn iou(&self, other: &BBox) -> f64 {
        let iw = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let ih = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = iw * ih;
        if inter <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Clamp to integer pixel bounds of a `width x height` frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BBox> {
        let max_x = width.saturating_sub(1) as f64;
        let max_y = height.saturating_sub(1) as f64;
        let x1 = self.x1.trunc().clamp(0.0, max_x);
        let x2 = self.x2.trunc().clamp(0.0, max_x);
        let y1 = self.y1.trunc().clamp(0.0, max_y);
        let y2 = self.y2.trunc().clamp(0.0, max_y);
        (x2 > x1 && y2 > y1).then_some(BBox { x1, y1, x2, y2 })
    }

    /// Crop region handed to the pose estimator.
    ///
    /// Small athletes get a larger zoom-out so the crop still spans head to
    /// feet. The crop is at least 1.2 times taller than wide and clamped to
    /// the frame. Returns `None` when no part of it lies inside the frame.
    pub fn expand_for_pose(&self, frame_width: u32, frame_height: u32) -> Option<BBox> {
        let scale = pose_expansion_factor(self.height());
        let width = self.width() * scale;
        let height = (self.height() * scale).max(width * 1.2);
        let center = self.center();

        let max_x = frame_width.saturating_sub(1) as f64;
        let max_y = frame_height.saturating_sub(1) as f64;
        let x1 = (center.x - width / 2.0).clamp(0.0, max_x).trunc();
        let y1 = (center.y - height / 2.0).clamp(0.0, max_y).trunc();
        let x2 = (center.x + width / 2.0).clamp(0.0, max_x).trunc();
        let y2 = (center.y + height / 2.0).clamp(0.0, max_y).trunc();
        (x2 > x1 && y2 > y1).then_some(BBox { x1, y1, x2, y2 })
    }
}

/// Zoom factor applied around a detection before pose estimation.
pub fn pose_expansion_factor(box_height: f64) -> f64 {
    if box_height < 80.0 {
        2.8
    } else if box_height < 140.0 {
        2.2
    } else if box_height < 220.0 {
        1.8
    } else {
        1.6
    }
}
