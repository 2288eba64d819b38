//! `x/exomint` records.

use serde::{Deserialize, Serialize};

use crate::numeric::Int;

/// One mint at an epoch boundary. Keyed by `(epoch_id, epoch_number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintHistory {
    /// Height of the minting block.
    pub block_height: i64,
    /// Amount minted.
    pub quantity_minted: Int,
    /// Epoch identifier.
    pub epoch_id: String,
    /// Epoch number.
    pub epoch_number: i64,
    /// Minted denomination.
    pub denom: String,
}

/// The `exomint` section of the genesis app state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExomintGenesis {
    /// Module parameters, stored verbatim.
    #[serde(default)]
    pub params: serde_json::Value,
}
