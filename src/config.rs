//! Analysis configuration loaded from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::filter::KalmanNoise;
use crate::metrics::MetricsConfig;
use crate::tracker::TrackerConfig;
use crate::Result;

fn default_hip_filter() -> KalmanNoise { KalmanNoise::hip() }
fn default_bbox_filter() -> KalmanNoise { KalmanNoise::bbox_center() }

/// Complete configuration of one analysis run.
///
/// Every section may be omitted from the JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Noise of the hip-point filter.
    #[serde(default = "default_hip_filter")]
    pub hip_filter: KalmanNoise,

    /// Noise of the bounding-box-center filter.
    #[serde(default = "default_bbox_filter")]
    pub bbox_filter: KalmanNoise,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            metrics: MetricsConfig::default(),
            hip_filter: default_hip_filter(),
            bbox_filter: default_bbox_filter(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        self.metrics.validate()?;
        self.hip_filter.validate()?;
        self.bbox_filter.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::SelectorKind;
    use crate::Error;

    #[test]
    fn test_empty_document_is_default() {
        let c = AnalysisConfig::from_json_str("{}").unwrap();
        assert_eq!(c, AnalysisConfig::default());
        assert_eq!(c.bbox_filter, KalmanNoise::bbox_center());
        assert_eq!(c.hip_filter, KalmanNoise::hip());
    }

    #[test]
    fn test_partial_sections() {
        let c = AnalysisConfig::from_json_str(
            r#"{"tracker": {"selector": "weighted_fusion", "max_misses": 5},
                "metrics": {"smoothing_window": 11}}"#,
        )
        .unwrap();
        assert_eq!(c.tracker.selector, SelectorKind::WeightedFusion);
        assert_eq!(c.tracker.max_misses, 5);
        assert_eq!(c.tracker.embedding_history, 10);
        assert_eq!(c.metrics.smoothing_window, 11);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            AnalysisConfig::from_json_str("{not json"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let r = AnalysisConfig::from_json_str(r#"{"tracker": {"strong_iou": 1.5}}"#);
        assert!(matches!(r, Err(Error::InvalidConfig(_))));

        let r = AnalysisConfig::from_json_str(
            r#"{"hip_filter": {"process": [1, 1, 1, 1], "measurement": [-1, 1], "initial": [1, 1, 1, 1]}}"#,
        );
        assert!(matches!(r, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AnalysisConfig::from_path("/nonexistent/analysis.json"),
            Err(Error::IoError(_))
        ));
    }
}
