//! BVH construction parameters.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Default number of SAH buckets along the split axis.
pub const DEFAULT_SAH_BUCKETS: usize = 12;

/// Errors from an invalid [`BvhConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_prims_in_node must be at least 1")]
    ZeroLeafSize,

    #[error("SAH needs at least 2 buckets, got {0}")]
    TooFewBuckets(usize),

    #[error("unknown split method: {0:?} (expected \"naive\" or \"sah\")")]
    UnknownSplitMethod(String),
}

/// How an interior node partitions its primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMethod {
    /// Median split on the axis of largest centroid spread. Depth is
    /// `ceil(log2 n)` regardless of how the primitives are distributed.
    #[default]
    Naive,
    /// Bucketed surface area heuristic; may stop early with a multi-primitive leaf.
    Sah,
}

impl FromStr for SplitMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" | "middle" | "median" => Ok(SplitMethod::Naive),
            "sah" => Ok(SplitMethod::Sah),
            _ => Err(ConfigError::UnknownSplitMethod(s.to_string())),
        }
    }
}

impl fmt::Display for SplitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitMethod::Naive => f.write_str("naive"),
            SplitMethod::Sah => f.write_str("sah"),
        }
    }
}

/// BVH build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhConfig {
    /// Leaves never hold more primitives than this
    pub max_prims_in_node: usize,
    /// Partitioning strategy for interior nodes
    pub split_method: SplitMethod,
    /// Number of equal-width cells the SAH sweeps over
    pub sah_buckets: usize,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            max_prims_in_node: 1,
            split_method: SplitMethod::Naive,
            sah_buckets: DEFAULT_SAH_BUCKETS,
        }
    }
}

impl BvhConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the split method.
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    /// Set the leaf size cap.
    pub fn with_max_prims_in_node(mut self, max_prims_in_node: usize) -> Self {
        self.max_prims_in_node = max_prims_in_node;
        self
    }

    /// Set the SAH bucket count.
    pub fn with_sah_buckets(mut self, sah_buckets: usize) -> Self {
        self.sah_buckets = sah_buckets;
        self
    }

    /// Check the settings before a build.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_prims_in_node == 0 {
            return Err(ConfigError::ZeroLeafSize);
        }
        if self.sah_buckets < 2 {
            return Err(ConfigError::TooFewBuckets(self.sah_buckets));
        }
        Ok(())
    }
}
