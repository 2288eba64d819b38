//! `x/epochs` records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serde_num;

/// Definition and current state of one epoch.
///
/// The definition (`start_time`, `duration`) is written once; the state
/// columns only move forward in `current_epoch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    /// Epoch identifier, e.g. `hour`.
    pub identifier: String,
    /// When epoch counting was scheduled to start.
    pub start_time: DateTime<Utc>,
    /// Epoch length as rendered by the chain, e.g. `3600s`.
    pub duration: String,
    /// Current epoch number.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub current_epoch: i64,
    /// Start time of the current epoch.
    pub current_epoch_start_time: DateTime<Utc>,
    /// Whether counting has started.
    #[serde(default)]
    pub epoch_counting_started: bool,
    /// Height at which the current epoch started.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub current_epoch_start_height: i64,
}

/// The `epochs` section of the genesis app state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpochsGenesis {
    /// Epoch definitions with their initial state.
    #[serde(default)]
    pub epochs: Vec<EpochInfo>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn decodes_chain_json() {
        let json = r#"{"epochs":[{
            "identifier": "day",
            "start_time": "2024-01-01T00:00:00Z",
            "duration": "86400s",
            "current_epoch": "4",
            "current_epoch_start_time": "2024-01-04T00:00:00Z",
            "epoch_counting_started": true,
            "current_epoch_start_height": "1200"
        }]}"#;
        let genesis: EpochsGenesis = serde_json::from_str(json).unwrap();
        assert_eq!(genesis.epochs[0].current_epoch, 4);
        assert_eq!(genesis.epochs[0].current_epoch_start_height, 1200);
        assert_eq!(genesis.epochs[0].duration, "86400s");
    }
}
