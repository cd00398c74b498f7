use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentsError};
use crate::snapper::SnapConfig;

/// Every knob of the segment pipeline. Missing fields in a config file fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many nearby shape vertices to consider per stop on the first snapping attempt
    pub k_neighbors: usize,
    /// Never consider more than this many vertices per stop
    pub max_neighbors: usize,
    /// How many more vertices to consider on each retry
    pub widen_step: usize,
    /// Snapping scores candidates by `index_gap ^ index_gap_exponent * distance ^
    /// distance_exponent`. These were tuned empirically.
    pub index_gap_exponent: f64,
    pub distance_exponent: f64,
    /// Insert shape vertices so no two are further apart than this many meters. `None` uses the
    /// raw shapes.
    pub densify_spacing: Option<f64>,
    /// Canonical segments traversed fewer times than this are dropped as noise
    pub min_traversals: usize,
    /// Drop segments longer than this many meters
    pub max_spacing: Option<f64>,
    /// Snap trips on all cores
    pub parallel: bool,
    /// Drop a first stop without pickup and a last stop without drop off
    pub trim_deadheads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            max_neighbors: 9,
            widen_step: 2,
            index_gap_exponent: 3.0,
            distance_exponent: 1.0,
            densify_spacing: Some(5.0),
            min_traversals: 1,
            max_spacing: None,
            parallel: true,
            trim_deadheads: true,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs_err::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|err| anyhow::anyhow!("{}: {err}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SegmentsError::InvalidConfig(msg));
        if self.k_neighbors == 0 {
            return invalid("k_neighbors must be at least 1".to_string());
        }
        if self.max_neighbors < self.k_neighbors {
            return invalid(format!(
                "max_neighbors {} is below k_neighbors {}",
                self.max_neighbors, self.k_neighbors
            ));
        }
        if self.widen_step == 0 && self.max_neighbors > self.k_neighbors {
            return invalid("widen_step must be at least 1".to_string());
        }
        if !(self.index_gap_exponent >= 0.0) || !(self.distance_exponent >= 0.0) {
            return invalid("snapping exponents must be non-negative".to_string());
        }
        if let Some(spacing) = self.densify_spacing {
            if !(spacing > 0.0) {
                return invalid(format!("densify_spacing {spacing} must be positive"));
            }
        }
        if let Some(max) = self.max_spacing {
            if !(max >= 0.0) {
                return invalid(format!("max_spacing {max} must be non-negative"));
            }
        }
        Ok(())
    }

    pub fn snap_config(&self) -> SnapConfig {
        SnapConfig {
            k_neighbors: self.k_neighbors,
            max_neighbors: self.max_neighbors,
            widen_step: self.widen_step,
            index_gap_exponent: self.index_gap_exponent,
            distance_exponent: self.distance_exponent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"max_spacing": 3000, "parallel": false}"#)
            .unwrap();
        assert_eq!(config.max_spacing, Some(3000.0));
        assert!(!config.parallel);
        assert_eq!(config.k_neighbors, 5);
        assert_eq!(config.densify_spacing, Some(5.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_errors_name_the_file() {
        let err = Config::load("/nonexistent/segments.json").unwrap_err();
        assert!(err.to_string().contains("segments.json"), "{err}");
    }

    #[test]
    fn rejects_nonsense() {
        let mut config = Config::default();
        config.k_neighbors = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_neighbors = 2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.densify_spacing = Some(0.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.index_gap_exponent = f64::NAN;
        assert!(config.validate().is_err());
    }
}
