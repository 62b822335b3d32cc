//! Linear Kalman filter in the style of filterpy.
//!
//! Holds the full state covariance and exposes separate predict and correct
//! steps so callers can score candidates against the predicted state before
//! deciding whether a measurement is accepted.

use nalgebra::{DMatrix, DVector};

use crate::{Error, Result};

/// Standard linear Kalman filter.
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    /// State dimension
    pub dim_x: usize,
    /// Measurement dimension
    pub dim_z: usize,
    /// State vector
    pub x: DVector<f64>,
    /// State covariance matrix
    pub p: DMatrix<f64>,
    /// State transition matrix
    pub f: DMatrix<f64>,
    /// Measurement matrix
    pub h: DMatrix<f64>,
    /// Measurement noise covariance
    pub r: DMatrix<f64>,
    /// Process noise covariance
    pub q: DMatrix<f64>,
}

impl KalmanFilter {
    /// Create a new Kalman filter with identity matrices.
    ///
    /// # Arguments
    /// * `dim_x` - State dimension
    /// * `dim_z` - Measurement dimension
    pub fn new(dim_x: usize, dim_z: usize) -> Self {
        let mut h = DMatrix::zeros(dim_z, dim_x);
        for i in 0..dim_z.min(dim_x) {
            h[(i, i)] = 1.0;
        }

        Self {
            dim_x,
            dim_z,
            x: DVector::zeros(dim_x),
            p: DMatrix::identity(dim_x, dim_x),
            f: DMatrix::identity(dim_x, dim_x),
            h,
            r: DMatrix::identity(dim_z, dim_z),
            q: DMatrix::identity(dim_x, dim_x),
        }
    }

    /// Advance state and covariance one step without a measurement.
    pub fn predict(&mut self) {
        // x = F @ x
        self.x = &self.f * &self.x;
        // P = F @ P @ F.T + Q
        self.p = &self.f * &self.p * self.f.transpose() + &self.q;
    }

    /// Correct the (already predicted) state with a measurement.
    ///
    /// The innovation covariance is inverted through a Cholesky factorization.
    /// When it is not positive definite the state is left untouched and a
    /// `FilterError` is returned, so the caller keeps the predicted state.
    pub fn correct(&mut self, z: &DVector<f64>) -> Result<()> {
        if z.len() != self.dim_z {
            return Err(Error::FilterError(format!(
                "measurement has {} components, expected {}",
                z.len(),
                self.dim_z
            )));
        }
        if z.iter().any(|v| !v.is_finite()) {
            return Err(Error::FilterError("measurement is not finite".to_string()));
        }

        // y = z - H @ x (innovation)
        let y = z - &self.h * &self.x;

        // S = H @ P @ H.T + R (innovation covariance)
        let s = &self.h * &self.p * self.h.transpose() + &self.r;
        let si = s
            .cholesky()
            .map(|c| c.inverse())
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .ok_or_else(|| {
                Error::FilterError("innovation covariance is not invertible".to_string())
            })?;

        // K = P @ H.T @ S^-1 (Kalman gain)
        let k = &self.p * self.h.transpose() * si;

        // x = x + K @ y
        self.x += &k * y;

        // P = (I - K @ H) @ P
        let i = DMatrix::identity(self.dim_x, self.dim_x);
        self.p = (i - &k * &self.h) * &self.p;

        Ok(())
    }

    /// Predict, then correct with a measurement.
    pub fn update(&mut self, z: &DVector<f64>) -> Result<()> {
        self.predict();
        self.correct(z)
    }

    /// Get the current state estimate.
    pub fn get_state(&self) -> &DVector<f64> {
        &self.x
    }

    /// Get the state covariance.
    pub fn get_covariance(&self) -> &DMatrix<f64> {
        &self.p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ===== Initialization tests =====

    #[test]
    fn test_kalman_filter_create() {
        let kf = KalmanFilter::new(4, 2);

        assert_eq!(kf.dim_x, 4);
        assert_eq!(kf.dim_z, 2);
        assert_eq!(kf.x.len(), 4);
        assert_eq!(kf.p.nrows(), 4);

        // H observes the first dim_z state components
        for i in 0..2 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(kf.h[(i, j)], expected, epsilon = 1e-10);
            }
        }
    }

    // ===== Predict tests =====

    #[test]
    fn test_kalman_filter_predict() {
        let mut kf = KalmanFilter::new(2, 1);
        kf.x = DVector::from_vec(vec![1.0, 2.0]);
        kf.f = DMatrix::from_row_slice(2, 2, &[
            1.0, 1.0,
            0.0, 1.0,
        ]);
        kf.q = DMatrix::from_row_slice(2, 2, &[
            0.1, 0.0,
            0.0, 0.1,
        ]);

        kf.predict();

        // x = [1 + 2, 2]
        assert_relative_eq!(kf.x[0], 3.0, epsilon = 1e-10);
        assert_relative_eq!(kf.x[1], 2.0, epsilon = 1e-10);

        // P = F P F' + Q = [2.1, 1; 1, 1.1]
        assert_relative_eq!(kf.p[(0, 0)], 2.1, epsilon = 1e-10);
        assert_relative_eq!(kf.p[(0, 1)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(kf.p[(1, 1)], 1.1, epsilon = 1e-10);
    }

    // ===== Correct tests =====

    #[test]
    fn test_kalman_filter_correct() {
        let mut kf = KalmanFilter::new(2, 1);
        kf.h = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        kf.r = DMatrix::from_row_slice(1, 1, &[1.0]);
        kf.p = DMatrix::from_row_slice(2, 2, &[
            10.0, 0.0,
            0.0, 10.0,
        ]);

        kf.correct(&DVector::from_vec(vec![5.0])).unwrap();

        // K = 10 / 11, x = 5 * 10 / 11
        assert_relative_eq!(kf.x[0], 4.545454545, epsilon = 1e-6);
        assert_relative_eq!(kf.x[1], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_kalman_filter_singular_innovation_keeps_state() {
        let mut kf = KalmanFilter::new(2, 1);
        kf.x = DVector::from_vec(vec![3.0, 1.0]);
        kf.h = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        kf.p = DMatrix::zeros(2, 2);
        kf.r = DMatrix::zeros(1, 1);

        let result = kf.correct(&DVector::from_vec(vec![10.0]));

        assert!(matches!(result, Err(Error::FilterError(_))));
        assert_relative_eq!(kf.x[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(kf.x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kalman_filter_rejects_non_finite_measurement() {
        let mut kf = KalmanFilter::new(4, 2);
        let result = kf.correct(&DVector::from_vec(vec![f64::NAN, 1.0]));
        assert!(result.is_err());
    }

    // ===== Predict-Update cycle tests =====

    #[test]
    fn test_kalman_filter_predict_update_cycle() {
        let mut kf = KalmanFilter::new(2, 1);
        kf.x = DVector::from_vec(vec![0.0, 1.0]);
        kf.f = DMatrix::from_row_slice(2, 2, &[
            1.0, 1.0,
            0.0, 1.0,
        ]);
        kf.h = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        kf.q = DMatrix::from_row_slice(2, 2, &[
            0.01, 0.0,
            0.0, 0.01,
        ]);
        kf.r = DMatrix::from_row_slice(1, 1, &[0.1]);

        let measurements = [1.0, 2.0, 3.0, 4.0, 5.0];
        for (i, &z_val) in measurements.iter().enumerate() {
            kf.update(&DVector::from_vec(vec![z_val])).unwrap();

            if i >= 2 {
                assert!((kf.x[0] - z_val).abs() < 0.5, "step {}: position {}", i + 1, kf.x[0]);
                assert!((kf.x[1] - 1.0).abs() < 0.5, "step {}: velocity {}", i + 1, kf.x[1]);
            }
        }
    }
}
