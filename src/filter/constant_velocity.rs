//! Constant-velocity Kalman filter over a single 2-D point.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::traits::{Filter, FilterFactory};
use crate::geometry::Point;
use crate::internal::filterpy::KalmanFilter;
use crate::{Error, Result};

/// Diagonal noise parameters of a [`ConstantVelocityFilter`].
///
/// State order is `[x, y, vx, vy]`, measurement order `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanNoise {
    /// Process noise variances (diagonal of Q).
    pub process: [f64; 4],
    /// Measurement noise variances (diagonal of R).
    pub measurement: [f64; 2],
    /// Initial state variances (diagonal of P0).
    pub initial: [f64; 4],
}

impl KalmanNoise {
    /// Noise tuned for the hip point used in speed and distance.
    pub const fn hip() -> Self {
        Self {
            process: [5.0; 4],
            measurement: [25.0; 2],
            initial: [10.0; 4],
        }
    }

    /// Noise tuned for bounding-box centers: loose position, tight velocity.
    pub const fn bbox_center() -> Self {
        Self {
            process: [50.0, 50.0, 5.0, 5.0],
            measurement: [30.0, 30.0],
            initial: [1000.0, 1000.0, 100.0, 100.0],
        }
    }

    pub fn validate(&self) -> Result<()> {
        let all = self.process.iter().chain(&self.measurement).chain(&self.initial);
        for v in all {
            if !v.is_finite() || *v < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "Kalman noise variances must be finite and non-negative, got {v}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for KalmanNoise {
    fn default() -> Self {
        Self::hip()
    }
}

/// Constant-velocity model: `x' = x + vx*dt`, `y' = y + vy*dt`.
#[derive(Clone, Debug)]
pub struct ConstantVelocityFilter {
    kf: KalmanFilter,
}

impl ConstantVelocityFilter {
    /// Create a filter at `initial` with zero velocity.
    ///
    /// # Arguments
    /// * `initial` - Starting position
    /// * `dt` - Time step (one frame period, in seconds)
    /// * `noise` - Diagonal Q, R and P0
    pub fn new(initial: Point, dt: f64, noise: &KalmanNoise) -> Self {
        let mut kf = KalmanFilter::new(4, 2);

        kf.x = DVector::from_vec(vec![initial.x, initial.y, 0.0, 0.0]);
        kf.f = DMatrix::from_row_slice(4, 4, &[
            1.0, 0.0, dt, 0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]);
        kf.q = DMatrix::from_diagonal(&DVector::from_column_slice(&noise.process));
        kf.r = DMatrix::from_diagonal(&DVector::from_column_slice(&noise.measurement));
        kf.p = DMatrix::from_diagonal(&DVector::from_column_slice(&noise.initial));

        Self { kf }
    }
}

impl Filter for ConstantVelocityFilter {
    fn predict(&mut self) -> Point {
        self.kf.predict();
        self.position()
    }

    fn correct(&mut self, measurement: Point) -> Result<Point> {
        let z = DVector::from_vec(vec![measurement.x, measurement.y]);
        self.kf.correct(&z)?;
        Ok(self.position())
    }

    fn position(&self) -> Point {
        let x = self.kf.get_state();
        Point::new(x[0], x[1])
    }

    fn velocity(&self) -> (f64, f64) {
        let x = self.kf.get_state();
        (x[2], x[3])
    }

    fn state_vector(&self) -> &DVector<f64> {
        self.kf.get_state()
    }

    fn covariance(&self) -> &DMatrix<f64> {
        self.kf.get_covariance()
    }
}

/// Factory for [`ConstantVelocityFilter`].
#[derive(Debug, Clone)]
pub struct ConstantVelocityFilterFactory {
    dt: f64,
    noise: KalmanNoise,
}

impl ConstantVelocityFilterFactory {
    /// # Arguments
    /// * `fps` - Frame rate; one step advances `1 / fps` seconds
    /// * `noise` - Noise parameters applied to every created filter
    pub fn new(fps: f64, noise: KalmanNoise) -> Self {
        let dt = if fps.is_finite() && fps > 0.0 { 1.0 / fps } else { 1.0 / 30.0 };
        Self { dt, noise }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }
}

impl FilterFactory for ConstantVelocityFilterFactory {
    fn create_filter(&self, initial: Point) -> Box<dyn Filter> {
        Box::new(ConstantVelocityFilter::new(initial, self.dt, &self.noise))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_filter_starts_at_initial_position() {
        let f = ConstantVelocityFilter::new(Point::new(3.0, 4.0), 0.1, &KalmanNoise::hip());
        assert_eq!(f.position(), Point::new(3.0, 4.0));
        assert_eq!(f.velocity(), (0.0, 0.0));
        assert_relative_eq!(f.covariance()[(0, 0)], 10.0);
        assert_relative_eq!(f.covariance()[(2, 2)], 10.0);
    }

    #[test]
    fn test_bbox_center_noise_preset() {
        let f = ConstantVelocityFilter::new(Point::new(0.0, 0.0), 0.1, &KalmanNoise::bbox_center());
        assert_relative_eq!(f.covariance()[(0, 0)], 1000.0);
        assert_relative_eq!(f.covariance()[(3, 3)], 100.0);
    }

    #[test]
    fn test_predict_moves_by_velocity() {
        let mut f = ConstantVelocityFilter::new(Point::new(0.0, 0.0), 0.5, &KalmanNoise::hip());
        f.kf.x[2] = 10.0;
        f.kf.x[3] = -4.0;

        let p = f.predict();
        assert_relative_eq!(p.x, 5.0);
        assert_relative_eq!(p.y, -2.0);
    }

    #[test]
    fn test_update_tracks_linear_motion() {
        let factory = ConstantVelocityFilterFactory::new(30.0, KalmanNoise::hip());
        let mut f = factory.create_filter(Point::new(0.0, 100.0));

        // 3 px per frame = 90 px/s
        let mut last = Point::new(0.0, 0.0);
        for i in 1..=60 {
            last = f.update(Point::new(3.0 * i as f64, 100.0)).unwrap();
        }
        assert!((last.x - 180.0).abs() < 3.0, "x = {}", last.x);
        assert_relative_eq!(last.y, 100.0, epsilon = 1e-6);
        // Tight initial velocity variance makes vx converge slowly toward 90
        let vx = f.velocity().0;
        assert!(vx > 30.0 && vx < 90.0, "vx = {}", vx);
    }

    #[test]
    fn test_update_stays_between_prediction_and_measurement() {
        let mut f = ConstantVelocityFilter::new(Point::new(0.0, 0.0), 1.0 / 30.0, &KalmanNoise::hip());
        let p = f.update(Point::new(10.0, -10.0)).unwrap();
        assert!(p.x > 0.0 && p.x < 10.0);
        assert!(p.y < 0.0 && p.y > -10.0);
    }

    #[test]
    fn test_noise_validation() {
        assert!(KalmanNoise::hip().validate().is_ok());
        let bad = KalmanNoise { measurement: [-1.0, 1.0], ..KalmanNoise::hip() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_factory_dt_from_fps() {
        assert_relative_eq!(ConstantVelocityFilterFactory::new(25.0, KalmanNoise::hip()).dt(), 0.04);
        assert_relative_eq!(ConstantVelocityFilterFactory::new(0.0, KalmanNoise::hip()).dt(), 1.0 / 30.0);
    }
}
