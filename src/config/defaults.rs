//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde::{Deserialize, Serialize};

use crate::host::RetryPolicy;
use crate::job::JobKind;
use crate::timeout::PollConfig;

/// Layers the check submits jobs against
pub const DEFAULT_LAYERS: [&str; 2] = [
    "/layers/en/terrestrial/climate/global/worldclim/present/bioclim/10arc-minutes/f6e850a0-04d9-11e1-be50-0800200c9a66",
    "/layers/en/terrestrial/climate/global/worldclim/present/bioclim/10arc-minutes/3ed05d93-04da-11e1-be50-0800200c9a66",
];

/// Algorithm the catalogue check requires
pub const DEFAULT_REQUIRED_ALGORITHM: &str = "BIOCLIM";

/// Presence point used in job parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePoint {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

impl PresencePoint {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self { id: id.into(), x, y }
    }
}

/// Built-in default configuration values
#[derive(Debug, Clone)]
pub struct BuiltinDefaults {
    pub verbosity: u8,
    pub retry: RetryPolicy,
    pub poll: PollConfig,

    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_seconds: u64,

    /// Whole-request timeout in seconds (default: 120)
    pub request_timeout_seconds: u64,

    /// Jobs the check runs (default: experiment only)
    pub jobs: Vec<JobKind>,

    pub required_algorithm: String,
    pub verify_layers: bool,
    pub layers: Vec<String>,
    /// Presence points used to create models
    pub points: Vec<PresencePoint>,
    /// Independent points used to test and evaluate models
    pub test_points: Vec<PresencePoint>,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            verbosity: 0,
            retry: RetryPolicy::default(),
            poll: PollConfig::default(),
            connect_timeout_seconds: 30,
            request_timeout_seconds: 120,
            jobs: vec![JobKind::Experiment],
            required_algorithm: DEFAULT_REQUIRED_ALGORITHM.to_string(),
            verify_layers: false,
            layers: DEFAULT_LAYERS.iter().map(|l| l.to_string()).collect(),
            points: vec![
                PresencePoint::new("1", -68.85, -11.15),
                PresencePoint::new("2", -64.70, -15.97),
            ],
            test_points: vec![
                PresencePoint::new("3", -72.83, -12.33),
                PresencePoint::new("4", -69.62, -13.37),
            ],
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "verbosity": self.verbosity,
            "retry": self.retry,
            "poll": self.poll,
            "http": {
                "connect_timeout_seconds": self.connect_timeout_seconds,
                "request_timeout_seconds": self.request_timeout_seconds
            },
            "check": {
                "jobs": self.jobs,
                "required_algorithm": self.required_algorithm,
                "verify_layers": self.verify_layers,
                "layers": self.layers,
                "points": self.points,
                "test_points": self.test_points
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.retry.max_attempts, 3);
        assert_eq!(defaults.poll.interval_seconds, 5);
        assert_eq!(defaults.poll.timeout_seconds, 1200);
        assert_eq!(defaults.jobs, vec![JobKind::Experiment]);
        assert_eq!(defaults.required_algorithm, "BIOCLIM");
        assert!(!defaults.verify_layers);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["retry"]["max_attempts"], 3);
        assert_eq!(value["retry"]["backoff_initial_ms"], 0);
        assert_eq!(value["poll"]["interval_seconds"], 5);
        assert_eq!(value["http"]["connect_timeout_seconds"], 30);
        assert_eq!(value["check"]["jobs"][0], "experiment");
        assert_eq!(value["check"]["points"][0]["X"], -68.85);
    }
}
