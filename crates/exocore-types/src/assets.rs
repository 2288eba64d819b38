//! `x/assets` records: client chains, tokens, staker and operator balances.

use serde::{Deserialize, Serialize};

use crate::numeric::{Dec, Int};
use crate::serde_num;

/// A client chain bridged into Exocore. Keyed by `layer_zero_chain_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientChain {
    /// Human-readable name.
    pub name: String,
    /// Free-form metadata.
    #[serde(default)]
    pub meta_info: String,
    /// Native chain id of the client chain.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub chain_id: i64,
    /// Index of the chain inside Exocore.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub exocore_chain_index: i64,
    /// Blocks until finality.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub finalization_blocks: i64,
    /// `LayerZero` chain id, the natural key.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub layer_zero_chain_id: i64,
    /// Signature scheme.
    #[serde(default)]
    pub signature_type: String,
    /// Address length in bytes.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub address_length: i64,
}

/// A registered staking token. Keyed by `asset_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetToken {
    /// Asset id (`address_0xlzid`).
    pub asset_id: String,
    /// Token name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Contract address on the client chain.
    pub address: String,
    /// Token decimals.
    pub decimals: i64,
    /// `LayerZero` chain id of the client chain.
    pub layer_zero_chain_id: i64,
    /// Index of the client chain inside Exocore.
    pub exocore_chain_index: i64,
    /// Free-form metadata.
    pub meta_info: String,
    /// Total amount staked across all stakers.
    pub staking_total_amount: Int,
}

/// Incoming staker balance for one asset.
///
/// `delegated` is never supplied; it is derived by the store as
/// `deposited - withdrawable - pending_undelegation - lifetime_slashed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerAsset {
    /// Staker id.
    pub staker_id: String,
    /// Asset id.
    pub asset_id: String,
    /// Total deposited.
    pub deposited: Int,
    /// Free (withdrawable) balance.
    pub withdrawable: Int,
    /// Balance pending undelegation.
    pub pending_undelegation: Int,
}

/// A persisted staker balance including derived and accumulated columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerAssetRow {
    /// Staker id.
    pub staker_id: String,
    /// Asset id.
    pub asset_id: String,
    /// Total deposited.
    pub deposited: Int,
    /// Free (withdrawable) balance.
    pub withdrawable: Int,
    /// Balance pending undelegation.
    pub pending_undelegation: Int,
    /// Derived delegated balance.
    pub delegated: Int,
    /// Cumulative amount lost to slashing. Never decreases.
    pub lifetime_slashed: Int,
}

/// Incoming operator balance for one asset.
///
/// `other_share` is derived by the store as `total_share - self_share`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorAsset {
    /// Operator address.
    pub operator_addr: String,
    /// Asset id.
    pub asset_id: String,
    /// Total delegated amount.
    pub total_amount: Int,
    /// Amount pending undelegation.
    pub pending_undelegation: Int,
    /// Total shares issued.
    pub total_share: Dec,
    /// Shares held by the operator itself.
    pub self_share: Dec,
}

/// A persisted operator balance including the derived share column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorAssetRow {
    /// Operator address.
    pub operator_addr: String,
    /// Asset id.
    pub asset_id: String,
    /// Total delegated amount.
    pub total_amount: Int,
    /// Amount pending undelegation.
    pub pending_undelegation: Int,
    /// Total shares issued.
    pub total_share: Dec,
    /// Shares held by the operator itself.
    pub self_share: Dec,
    /// Derived shares held by delegators.
    pub other_share: Dec,
}

// =============================================================================
// Genesis
// =============================================================================

/// The `assets` section of the genesis app state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsGenesis {
    /// Module parameters, stored verbatim.
    #[serde(default)]
    pub params: serde_json::Value,
    /// Registered client chains.
    #[serde(default)]
    pub client_chains: Vec<ClientChain>,
    /// Registered tokens.
    #[serde(default)]
    pub tokens: Vec<GenesisToken>,
    /// Deposits grouped by staker.
    #[serde(default)]
    pub deposits: Vec<GenesisDeposits>,
    /// Operator balances grouped by operator.
    #[serde(default)]
    pub operator_assets: Vec<GenesisOperatorAssets>,
}

/// Basic token information as it appears in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisAssetInfo {
    /// Token name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Contract address.
    pub address: String,
    /// Token decimals.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub decimals: i64,
    /// `LayerZero` chain id.
    #[serde(deserialize_with = "serde_num::u64_str")]
    pub layer_zero_chain_id: u64,
    /// Index of the client chain inside Exocore.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub exocore_chain_index: i64,
    /// Free-form metadata.
    #[serde(default)]
    pub meta_info: String,
}

/// A token with its staking total, as it appears in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisToken {
    /// Basic token information.
    pub asset_basic_info: GenesisAssetInfo,
    /// Total staked amount.
    #[serde(default)]
    pub staking_total_amount: Int,
}

impl GenesisToken {
    /// Convert to a token record, deriving the asset id.
    pub fn to_token(&self) -> AssetToken {
        let info = &self.asset_basic_info;
        AssetToken {
            asset_id: crate::keys::asset_id(&info.address, info.layer_zero_chain_id),
            name: info.name.clone(),
            symbol: info.symbol.clone(),
            address: info.address.clone(),
            decimals: info.decimals,
            layer_zero_chain_id: i64::try_from(info.layer_zero_chain_id).unwrap_or(i64::MAX),
            exocore_chain_index: info.exocore_chain_index,
            meta_info: info.meta_info.clone(),
            staking_total_amount: self.staking_total_amount,
        }
    }
}

/// Deposits of one staker.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisDeposits {
    /// Staker id.
    pub staker_id: String,
    /// Per-asset deposits.
    #[serde(default)]
    pub deposits: Vec<GenesisDeposit>,
}

/// One staker's balance for one asset.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisDeposit {
    /// Asset id.
    pub asset_id: String,
    /// Balance details.
    pub info: GenesisStakerAssetInfo,
}

/// Staker balance fields as they appear in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisStakerAssetInfo {
    /// Total deposited.
    pub total_deposit_amount: Int,
    /// Withdrawable balance.
    pub withdrawable_amount: Int,
    /// Balance pending undelegation.
    pub pending_undelegation_amount: Int,
}

/// Balances of one operator.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOperatorAssets {
    /// Operator address.
    pub operator: String,
    /// Per-asset balances.
    #[serde(default)]
    pub assets_state: Vec<GenesisOperatorAsset>,
}

/// One operator's balance for one asset.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOperatorAsset {
    /// Asset id.
    pub asset_id: String,
    /// Balance details.
    pub info: GenesisOperatorAssetInfo,
}

/// Operator balance fields as they appear in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOperatorAssetInfo {
    /// Total delegated amount.
    pub total_amount: Int,
    /// Amount pending undelegation.
    pub pending_undelegation_amount: Int,
    /// Total shares issued.
    pub total_share: Dec,
    /// Shares held by the operator.
    pub operator_share: Dec,
}
