//! # Athlete Kinematics
//!
//! Single-athlete tracking and biomechanical metrics from video.
//!
//! Perception (person detection, pose estimation, appearance encoding) is
//! injected through the traits in [`perception`]. This crate keeps exactly
//! one athlete tracked across frames and turns the resulting trajectory
//! into speed, distance, stride and jump metrics.
//!
//! ## Features
//!
//! - Target selection by overlap, re-identification and a reference point
//!   ([`CascadeSelector`]) or by a weighted fusion score ([`WeightedFusionSelector`])
//! - Constant-velocity Kalman filters for the box center and the hip point
//! - Savitzky-Golay smoothing, outlier-rejected speed, ankle-scissoring
//!   stride detection, jump detection
//!
//! ## Example
//!
//! ```rust,ignore
//! use athlete_kinematics::{AnalysisConfig, AthleteAnalyzer, Calibration};
//!
//! let calibration = Calibration { point1: [100.0, 600.0], point2: [1100.0, 600.0], real_distance_m: 10.0 };
//! let mut analyzer = AthleteAnalyzer::new(AnalysisConfig::default(), &calibration, None, 30.0)?;
//!
//! for frame in &frames {
//!     analyzer.process_frame(frame, &mut detector, &mut pose, &mut encoder);
//! }
//! let metrics = analyzer.finish()?;
//! println!("{}", metrics.to_json_pretty()?);
//! ```

// Internal modules (ports of numpy, scipy.signal, filterpy)
pub(crate) mod internal;

// Public modules
pub mod analyzer;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod distances;
pub mod filter;
pub mod geometry;
pub mod metrics;
pub mod perception;
pub mod reid;
pub mod selector;
pub mod tracked_object;
pub mod tracker;
pub mod trajectory;

// Re-exports for convenience
pub use analyzer::{AthleteAnalyzer, FrameReport};
pub use calibration::{Calibration, CalibrationScale};
pub use config::AnalysisConfig;
pub use detection::{Candidate, RawDetection};
pub use filter::{ConstantVelocityFilter, ConstantVelocityFilterFactory, Filter, FilterFactory, KalmanNoise};
pub use geometry::{BBox, Point};
pub use metrics::{MetricsConfig, MetricsEngine, MetricsResult};
pub use perception::{Detector, FeatureEncoder, Frame, Keypoint, PoseEstimator, RawPose};
pub use selector::{CascadeSelector, SelectionRule, SelectionStats, TargetSelector, WeightedFusionSelector};
pub use tracker::{SelectorKind, SingleTargetTracker, TrackOutcome, TrackPhase, TrackerConfig};
pub use trajectory::Trajectory;

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur during an analysis run
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid calibration: {0}")]
        InvalidCalibration(String),

        #[error("Invalid reference point: {0}")]
        InvalidReferencePoint(String),

        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid detection: {0}")]
        InvalidDetection(String),

        #[error("Invalid pose: {0}")]
        InvalidPose(String),

        #[error("Invalid embedding: {0}")]
        InvalidEmbedding(String),

        #[error("Filter error: {0}")]
        FilterError(String),

        #[error("No athlete was tracked in any frame")]
        NoTargetTracked,

        #[error("Config parse error: {0}")]
        ConfigParse(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for analysis operations
    pub type Result<T> = std::result::Result<T, Error>;
}
