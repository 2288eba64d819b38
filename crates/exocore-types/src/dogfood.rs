//! `x/dogfood` records: the chain's own validator set and its schedules.

use serde::{Deserialize, Serialize};

use crate::block::Vote;
use crate::numeric::Int;
use crate::serde_num;

/// Module parameters. Singleton, replaced on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DogfoodParams {
    /// Epochs an operator waits before being unbonded.
    #[serde(deserialize_with = "serde_num::u32_str")]
    pub epochs_until_unbonded: u32,
    /// Epoch identifier driving the module's schedules.
    pub epoch_identifier: String,
    /// Maximum number of validators.
    #[serde(deserialize_with = "serde_num::u32_str")]
    pub max_validators: u32,
    /// Historical entries kept by the chain.
    #[serde(deserialize_with = "serde_num::u32_str")]
    pub historical_entries: u32,
    /// Minimum self delegation of a validator.
    #[serde(default)]
    pub min_self_delegation: Int,
    /// Assets counted toward voting power.
    #[serde(default)]
    pub asset_ids: Vec<String>,
}

/// An operator's scheduled opt-out, keyed by operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptOutExpiry {
    /// Epoch at which the opt-out completes.
    pub epoch_number: i64,
    /// Operator account address.
    pub operator_addr: String,
    /// Height at which the opt-out was observed complete.
    pub completion_height: Option<i64>,
}

/// A consensus address scheduled for pruning, keyed by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusAddrToPrune {
    /// Epoch at which the address is pruned.
    pub epoch_number: i64,
    /// Consensus address.
    pub consensus_addr: String,
    /// Height at which pruning was observed complete.
    pub completion_height: Option<i64>,
}

/// An undelegation scheduled to mature at an epoch, keyed by record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndelegationMaturity {
    /// Epoch at which the undelegation matures.
    pub epoch_number: i64,
    /// Undelegation record key.
    pub record_key: String,
    /// Height at which maturity was observed.
    pub completion_height: Option<i64>,
}

/// A validator known to the indexer. Validators are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Hex consensus address.
    pub consensus_address: String,
    /// `0x`-prefixed hex consensus public key.
    pub consensus_pubkey: String,
}

/// Voting power of a validator at one height. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorVotingPower {
    /// Hex consensus address.
    pub consensus_address: String,
    /// Voting power.
    pub voting_power: i64,
    /// Height at which the power applies.
    pub height: i64,
}

/// Duplicate-vote evidence committed at a height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleSignEvidence {
    /// Height of the including block.
    pub height: i64,
    /// First vote.
    pub vote_a: Vote,
    /// Conflicting vote.
    pub vote_b: Vote,
}

/// A validator as reported by a chain source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceValidator {
    /// Hex consensus public key.
    pub public_key: String,
    /// Voting power.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub power: i64,
}

impl SourceValidator {
    /// Build the validator record and its power at `height`.
    pub fn to_records(
        &self,
        height: i64,
    ) -> Result<(Validator, ValidatorVotingPower), crate::keys::KeyError> {
        let consensus_address = crate::keys::consensus_address(&self.public_key)?;
        Ok((
            Validator {
                consensus_address: consensus_address.clone(),
                consensus_pubkey: crate::keys::normalize_pubkey_hex(&self.public_key),
            },
            ValidatorVotingPower {
                consensus_address,
                voting_power: self.power,
                height,
            },
        ))
    }
}

// =============================================================================
// Genesis
// =============================================================================

/// The `dogfood` section of the genesis app state.
#[derive(Debug, Clone, Deserialize)]
pub struct DogfoodGenesis {
    /// Module parameters.
    pub params: DogfoodParams,
    /// Initial validator set. May be empty.
    #[serde(default)]
    pub val_set: Vec<SourceValidator>,
    /// Scheduled opt-outs grouped by epoch.
    #[serde(default)]
    pub opt_out_expiries: Vec<GenesisEpochOptOuts>,
    /// Scheduled prunings grouped by epoch.
    #[serde(default)]
    pub consensus_addrs_to_prune: Vec<GenesisEpochPrunes>,
    /// Scheduled maturities grouped by epoch.
    #[serde(default)]
    pub undelegation_maturities: Vec<GenesisEpochMaturities>,
    /// Total voting power after the genesis block.
    #[serde(default)]
    pub last_total_power: Int,
}

/// Operators whose opt-out completes at one epoch.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisEpochOptOuts {
    /// Epoch number.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub epoch: i64,
    /// Operator account addresses.
    #[serde(default)]
    pub operator_acc_addrs: Vec<String>,
}

/// Consensus addresses pruned at one epoch.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisEpochPrunes {
    /// Epoch number.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub epoch: i64,
    /// Consensus addresses.
    #[serde(default)]
    pub cons_addrs: Vec<String>,
}

/// Undelegation records maturing at one epoch.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisEpochMaturities {
    /// Epoch number.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub epoch: i64,
    /// Undelegation record keys.
    #[serde(default)]
    pub undelegation_record_keys: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn genesis_accepts_string_numbers() {
        let json = r#"{
            "params": {
                "epochs_until_unbonded": "7",
                "epoch_identifier": "hour",
                "max_validators": 100,
                "historical_entries": "10000",
                "min_self_delegation": "100",
                "asset_ids": ["0xdeaddeaddeaddeaddeaddeaddeaddeaddeaddead_0x0"]
            },
            "val_set": [{"public_key": "0x1111111111111111111111111111111111111111111111111111111111111111", "power": "5"}],
            "opt_out_expiries": [{"epoch": "3", "operator_acc_addrs": ["op1", "op2"]}],
            "last_total_power": "5"
        }"#;
        let genesis: DogfoodGenesis = serde_json::from_str(json).unwrap();
        assert_eq!(genesis.params.epochs_until_unbonded, 7);
        assert_eq!(genesis.params.max_validators, 100);
        assert_eq!(genesis.val_set.len(), 1);
        assert_eq!(genesis.opt_out_expiries[0].operator_acc_addrs.len(), 2);
        assert!(genesis.consensus_addrs_to_prune.is_empty());

        let (validator, power) = genesis.val_set[0].to_records(1).unwrap();
        assert_eq!(validator.consensus_address, power.consensus_address);
        assert_eq!(power.voting_power, 5);
    }
}
