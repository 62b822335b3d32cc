//! Pixel-to-meter calibration.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::{Error, Result};

/// Two reference pixel points a known real-world distance apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub point1: [f64; 2],
    pub point2: [f64; 2],
    pub real_distance_m: f64,
}

/// Validated meters-per-pixel scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationScale {
    point1: Point,
    point2: Point,
    real_distance_m: f64,
    m_per_px: f64,
}

impl CalibrationScale {
    /// Build the scale from two pixel points and the distance between them in meters.
    ///
    /// Fails with `InvalidCalibration` when the points coincide (pixel
    /// distance is not positive) or the real distance is not a positive
    /// finite number.
    pub fn new(point1: Point, point2: Point, real_distance_m: f64) -> Result<Self> {
        if !point1.is_finite() || !point2.is_finite() {
            return Err(Error::InvalidCalibration(
                "calibration points must be finite".to_string(),
            ));
        }
        let px = point1.distance(&point2);
        if px <= 0.0 {
            return Err(Error::InvalidCalibration(format!(
                "pixel distance between calibration points must be > 0, got {px}"
            )));
        }
        if !(real_distance_m.is_finite() && real_distance_m > 0.0) {
            return Err(Error::InvalidCalibration(format!(
                "real distance must be a positive number of meters, got {real_distance_m}"
            )));
        }
        Ok(Self {
            point1,
            point2,
            real_distance_m,
            m_per_px: real_distance_m / px,
        })
    }

    /// Scale given directly in meters per pixel.
    pub fn from_m_per_px(m_per_px: f64) -> Result<Self> {
        Self::new(Point::new(0.0, 0.0), Point::new(1.0, 0.0), m_per_px)
    }

    pub fn m_per_px(&self) -> f64 {
        self.m_per_px
    }

    pub fn to_meters(&self, pixels: f64) -> f64 {
        pixels * self.m_per_px
    }

    pub fn points(&self) -> (Point, Point) {
        (self.point1, self.point2)
    }

    pub fn real_distance_m(&self) -> f64 {
        self.real_distance_m
    }
}

impl TryFrom<&Calibration> for CalibrationScale {
    type Error = Error;

    fn try_from(c: &Calibration) -> Result<Self> {
        CalibrationScale::new(c.point1.into(), c.point2.into(), c.real_distance_m)
    }
}
