//! Filter traits for the state estimator.

use nalgebra::{DMatrix, DVector};

use crate::geometry::Point;
use crate::Result;

/// A 2-D point estimator with position and velocity state.
///
/// `predict` and `correct` are separate so the tracker can score candidates
/// against the predicted position before deciding whether a measurement is
/// accepted at all.
pub trait Filter: Send + Sync {
    /// Advance one frame without a measurement and return the predicted position.
    fn predict(&mut self) -> Point;

    /// Correct the predicted state with a measured position.
    ///
    /// On numerical failure the predicted state is kept and an error returned.
    fn correct(&mut self, measurement: Point) -> Result<Point>;

    /// Predict, then correct. Returns the corrected position.
    fn update(&mut self, measurement: Point) -> Result<Point> {
        self.predict();
        self.correct(measurement)
    }

    /// Current position estimate.
    fn position(&self) -> Point;

    /// Current velocity estimate in pixels per second.
    fn velocity(&self) -> (f64, f64);

    /// Full state vector `[x, y, vx, vy]`.
    fn state_vector(&self) -> &DVector<f64>;

    /// State covariance.
    fn covariance(&self) -> &DMatrix<f64>;
}

/// Factory for creating filter instances.
///
/// The tracker and the analyzer create a fresh filter whenever a track is
/// (re)initialized, without knowing the concrete filter type.
pub trait FilterFactory: Send + Sync {
    /// Create a filter at `initial` with zero velocity.
    fn create_filter(&self, initial: Point) -> Box<dyn Filter>;
}
