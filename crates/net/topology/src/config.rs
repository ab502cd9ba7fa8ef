use serde::{Deserialize, Serialize};

/// Connection thresholds reported by a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub min: usize,
    pub max: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            min: 0,
            max: usize::MAX,
        }
    }
}
