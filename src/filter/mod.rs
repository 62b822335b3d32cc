//! Kalman state estimation for tracked points.
//!
//! One parameterized constant-velocity filter is instantiated twice with
//! different noise presets:
//! - the hip point, smoothed for speed and distance ([`KalmanNoise::hip`])
//! - the bounding-box center of the tracked athlete ([`KalmanNoise::bbox_center`])

mod traits;
mod constant_velocity;

pub use traits::{Filter, FilterFactory};
pub use constant_velocity::{ConstantVelocityFilter, ConstantVelocityFilterFactory, KalmanNoise};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use approx::assert_relative_eq;

    // ===== Preset comparison tests =====

    #[test]
    fn test_presets_agree_on_static_target() {
        let hip = ConstantVelocityFilterFactory::new(30.0, KalmanNoise::hip());
        let bbox = ConstantVelocityFilterFactory::new(30.0, KalmanNoise::bbox_center());

        let mut a = hip.create_filter(Point::new(1.0, 1.0));
        let mut b = bbox.create_filter(Point::new(1.0, 1.0));

        for _ in 0..10 {
            a.update(Point::new(1.0, 1.0)).unwrap();
            b.update(Point::new(1.0, 1.0)).unwrap();
        }

        assert_relative_eq!(a.position().x, b.position().x, epsilon = 0.01);
        assert_relative_eq!(a.position().y, b.position().y, epsilon = 0.01);
    }

    #[test]
    fn test_bbox_preset_follows_jumps_faster() {
        // Looser position noise trusts the measurement more
        let hip = ConstantVelocityFilterFactory::new(30.0, KalmanNoise::hip());
        let bbox = ConstantVelocityFilterFactory::new(30.0, KalmanNoise::bbox_center());

        let mut a = hip.create_filter(Point::new(0.0, 0.0));
        let mut b = bbox.create_filter(Point::new(0.0, 0.0));

        let pa = a.update(Point::new(100.0, 0.0)).unwrap();
        let pb = b.update(Point::new(100.0, 0.0)).unwrap();
        assert!(pb.x > pa.x);
    }

    // ===== Independence tests =====

    #[test]
    fn test_instances_do_not_share_state() {
        let factory = ConstantVelocityFilterFactory::new(30.0, KalmanNoise::hip());
        let mut a = factory.create_filter(Point::new(0.0, 0.0));
        let b = factory.create_filter(Point::new(0.0, 0.0));

        for i in 1..5 {
            a.update(Point::new(10.0 * i as f64, 0.0)).unwrap();
        }
        assert_eq!(b.position(), Point::new(0.0, 0.0));
        assert!(a.position().x > 0.0);
    }
}
