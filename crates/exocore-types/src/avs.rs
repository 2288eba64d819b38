//! `x/avs` genesis records.

use serde::Deserialize;

/// The `avs` section of the genesis app state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvsGenesis {
    /// Registered AVSs.
    #[serde(default)]
    pub avs_infos: Vec<GenesisAvsInfo>,
    /// Chain id to AVS mappings for chain AVSs.
    #[serde(default)]
    pub chain_id_infos: Vec<GenesisChainIdInfo>,
}

/// An AVS as it appears in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisAvsInfo {
    /// AVS address, any case.
    pub avs_address: String,
}

/// A chain AVS mapping as it appears in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisChainIdInfo {
    /// Chain id without revision.
    pub chain_id: String,
    /// AVS address, any case.
    pub avs_address: String,
}
