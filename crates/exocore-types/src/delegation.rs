//! `x/delegation` records: delegation states, undelegations, native-asset
//! delegations.

use serde::{Deserialize, Serialize};

use crate::numeric::{Dec, Int};
use crate::serde_num;

/// Delegation amounts of one `(staker, asset, operator)` triple.
///
/// Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationState {
    /// Staker id.
    pub staker_id: String,
    /// Asset id.
    pub asset_id: String,
    /// Operator address.
    pub operator_addr: String,
    /// Shares that can still be undelegated.
    pub undelegatable_share: Dec,
    /// Amount waiting for undelegation to complete.
    pub wait_undelegation_amount: Int,
}

/// A pending or completed undelegation. Keyed by `record_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndelegationRecord {
    /// Record key.
    pub record_id: String,
    /// Staker id.
    pub staker_id: String,
    /// Asset id.
    pub asset_id: String,
    /// Operator address.
    pub operator_addr: String,
    /// Hash of the originating transaction.
    pub tx_hash: String,
    /// Height of the originating transaction.
    pub block_number: i64,
    /// Epoch identifier at which the record completes.
    pub completed_epoch_identifier: String,
    /// Epoch number at which the record completes.
    pub completed_epoch_number: i64,
    /// Chain-wide undelegation sequence number.
    pub undelegation_id: i64,
    /// Amount requested.
    pub amount: Int,
    /// Amount that will actually be returned, reduced by slashing.
    pub actual_completed_amount: Int,
    /// Number of AVSs currently holding the record.
    pub hold_count: i64,
    /// Height at which the record matured, once it has.
    pub maturity_height: Option<i64>,
}

/// Native-asset delegation of one `(staker, operator)` pair.
///
/// Columns accumulate: callers pass deltas, not absolutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExoAssetDelegation {
    /// Staker id.
    pub staker_id: String,
    /// Operator address.
    pub operator_addr: String,
    /// Delegated amount.
    pub delegated: Int,
    /// Amount pending undelegation.
    pub pending_undelegation: Int,
    /// Cumulative amount lost to slashing.
    pub slashed: Int,
}

impl ExoAssetDelegation {
    /// A delta that only touches the delegated column.
    pub fn delegated_delta(staker_id: &str, operator_addr: &str, delegated: Int) -> Self {
        Self {
            staker_id: staker_id.to_owned(),
            operator_addr: operator_addr.to_owned(),
            delegated,
            pending_undelegation: Int::ZERO,
            slashed: Int::ZERO,
        }
    }
}

// =============================================================================
// Genesis
// =============================================================================

/// The `delegation` section of the genesis app state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DelegationGenesis {
    /// Staker to operator associations.
    #[serde(default)]
    pub associations: Vec<GenesisAssociation>,
    /// Delegation states keyed by `staker/asset/operator`.
    #[serde(default)]
    pub delegation_states: Vec<GenesisDelegationState>,
    /// Stakers keyed by `operator/asset`.
    #[serde(default)]
    pub stakers_by_operator: Vec<GenesisStakersByOperator>,
    /// Pending undelegations.
    #[serde(default)]
    pub undelegations: Vec<GenesisUndelegation>,
}

/// A staker associated with an operator.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisAssociation {
    /// Staker id.
    pub staker_id: String,
    /// Operator address.
    pub operator: String,
}

/// Delegation amounts under a joined key.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisDelegationState {
    /// `staker/asset/operator`.
    pub key: String,
    /// The amounts.
    pub states: GenesisDelegationAmounts,
}

/// Delegation amounts as they appear in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisDelegationAmounts {
    /// Shares that can still be undelegated.
    pub undelegatable_share: Dec,
    /// Amount waiting for undelegation.
    pub wait_undelegation_amount: Int,
}

/// Stakers of one `operator/asset` pair.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisStakersByOperator {
    /// `operator/asset`.
    pub key: String,
    /// Staker ids.
    #[serde(default)]
    pub stakers: Vec<String>,
}

/// An undelegation record as it appears in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisUndelegation {
    /// Staker id.
    pub staker_id: String,
    /// Asset id.
    pub asset_id: String,
    /// Operator address.
    pub operator_addr: String,
    /// Originating transaction hash.
    #[serde(default)]
    pub tx_hash: String,
    /// Originating height.
    #[serde(deserialize_with = "serde_num::u64_str")]
    pub block_number: u64,
    /// Completion epoch identifier.
    #[serde(default)]
    pub completed_epoch_identifier: String,
    /// Completion epoch number.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub completed_epoch_number: i64,
    /// Sequence number.
    #[serde(deserialize_with = "serde_num::u64_str")]
    pub undelegation_id: u64,
    /// Requested amount.
    pub amount: Int,
    /// Amount after slashing.
    pub actual_completed_amount: Int,
}

impl GenesisUndelegation {
    /// Convert to a record with a zero hold count.
    pub fn to_record(&self) -> UndelegationRecord {
        UndelegationRecord {
            record_id: crate::keys::undelegation_record_id(self.block_number, self.undelegation_id),
            staker_id: self.staker_id.clone(),
            asset_id: self.asset_id.clone(),
            operator_addr: self.operator_addr.clone(),
            tx_hash: self.tx_hash.clone(),
            block_number: i64::try_from(self.block_number).unwrap_or(i64::MAX),
            completed_epoch_identifier: self.completed_epoch_identifier.clone(),
            completed_epoch_number: self.completed_epoch_number,
            undelegation_id: i64::try_from(self.undelegation_id).unwrap_or(i64::MAX),
            amount: self.amount,
            actual_completed_amount: self.actual_completed_amount,
            hold_count: 0,
            maturity_height: None,
        }
    }
}
