//! Configuration structures for the CBBA engine

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Scoring metric for bundle construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Metric {
    /// Reward Per Time: minimize total completion time
    #[default]
    Rpt,
    /// Time-Discounted Reward: maximize lambda^t reward
    Tdr,
}

/// Bundle building mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BundleMode {
    /// Add at most one task per tick, interleaving with consensus
    #[default]
    Add,
    /// Fill the bundle to capacity in one tick (baseline CBBA)
    Full,
}

/// Configuration for a CBBA engine instance.
///
/// All values have working defaults; use the chainable `with_*` methods to
/// override individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CBBAConfig {
    /// Bundle capacity (Lt in the paper)
    pub max_bundle_size: usize,

    /// Radius in metres for the spatial candidate pre-filter
    pub spatial_query_radius: f64,

    /// Bundle building mode
    pub bundle_mode: BundleMode,

    /// Scoring metric
    pub metric: Metric,

    /// Discount factor for the TDR metric, in (0, 1)
    pub lambda: f64,

    /// Compare the winners table against the previous tick's snapshot
    pub enable_convergence_detection: bool,
}

impl Default for CBBAConfig {
    fn default() -> Self {
        Self {
            max_bundle_size: 10,
            spatial_query_radius: 100.0,
            bundle_mode: BundleMode::Add,
            metric: Metric::Rpt,
            lambda: 0.95,
            enable_convergence_detection: true,
        }
    }
}

impl CBBAConfig {
    pub fn with_max_bundle_size(mut self, size: usize) -> Self {
        self.max_bundle_size = size;
        self
    }

    pub fn with_spatial_query_radius(mut self, radius: f64) -> Self {
        self.spatial_query_radius = radius;
        self
    }

    pub fn with_bundle_mode(mut self, mode: BundleMode) -> Self {
        self.bundle_mode = mode;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_convergence_detection(mut self, enabled: bool) -> Self {
        self.enable_convergence_detection = enabled;
        self
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_bundle_size == 0 {
            return Err(Error::InvalidConfig("max_bundle_size must be positive".into()));
        }
        if self.spatial_query_radius <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "spatial_query_radius must be positive, got {}",
                self.spatial_query_radius
            )));
        }
        if !(self.lambda > 0.0 && self.lambda < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "lambda must be in (0, 1), got {}",
                self.lambda
            )));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::Io(e.to_string()))?;
        let config: Self = serde_json::from_str(&data).map_err(|e| Error::Io(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
