//! `x/operator` records: operator details, consensus keys, opt-in state and
//! USD valuations.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::numeric::Dec;
use crate::serde_num;

/// Registered operator details. Keyed by `earnings_addr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Earnings address, the natural key.
    pub earnings_addr: String,
    /// Approval address.
    pub approve_addr: String,
    /// Free-form metadata.
    pub meta_info: String,
    /// Current commission rate.
    pub commission_rate: Dec,
    /// Maximum commission rate.
    pub max_commission_rate: Dec,
    /// Maximum daily commission change.
    pub max_change_rate: Dec,
    /// When the commission last changed.
    pub commission_update_time: DateTime<Utc>,
}

/// Parse a chain timestamp.
///
/// Events carry either RFC 3339 or the chain's `2006-01-02 15:04:05.999 +0000 UTC`
/// rendering; both are accepted.
pub fn parse_chain_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let without_zone = raw.strip_suffix(" UTC").unwrap_or(raw);
    if let Ok(parsed) = DateTime::parse_from_str(without_zone, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(without_zone, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Consensus key of an operator on one chain. Keyed by `(operator_addr, chain_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConsKey {
    /// Operator address.
    pub operator_addr: String,
    /// Chain id the key is used on.
    pub chain_id: String,
    /// Current public key, hex.
    pub pubkey_hex: String,
    /// Current consensus address.
    pub consensus_address: String,
    /// Key being rotated away from, while the rotation is in its grace window.
    pub prev_pubkey_hex: Option<String>,
    /// Address of the key being rotated away from.
    pub prev_consensus_address: Option<String>,
    /// Set once removal has been initiated.
    pub is_removing: bool,
}

/// Opt-in state of an operator for an AVS. Keyed by `(operator_addr, avs_addr)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptedState {
    /// Operator address.
    pub operator_addr: String,
    /// AVS address.
    pub avs_addr: String,
    /// Slashing contract of the AVS.
    pub slash_contract: String,
    /// Height of the opt-in.
    pub opt_in_height: i64,
    /// Height of the opt-out, if the operator has opted out.
    pub opt_out_height: Option<i64>,
    /// Whether the operator is jailed for this AVS.
    pub jailed: bool,
}

/// Parse an opt-out height. The chain encodes "not opted out" as an empty
/// string or `u64::MAX`.
pub fn parse_opt_out_height(raw: &str) -> Result<Option<i64>, std::num::ParseIntError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let height: u64 = raw.parse()?;
    Ok(i64::try_from(height).ok())
}

/// USD valuation of an operator within one AVS.
///
/// `other` is derived by the store as `total - self`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorUsdValue {
    /// Operator address.
    pub operator_addr: String,
    /// AVS address.
    pub avs_addr: String,
    /// Value of the operator's own stake.
    pub self_usd_value: Dec,
    /// Total delegated value.
    pub total_usd_value: Dec,
    /// Value counted toward voting power.
    pub active_usd_value: Dec,
}

/// A persisted operator valuation including the derived column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorUsdValueRow {
    /// Operator address.
    pub operator_addr: String,
    /// AVS address.
    pub avs_addr: String,
    /// Value of the operator's own stake.
    pub self_usd_value: Dec,
    /// Total delegated value.
    pub total_usd_value: Dec,
    /// Value counted toward voting power.
    pub active_usd_value: Dec,
    /// Value delegated by others.
    pub other_usd_value: Dec,
}

/// Total USD valuation of an AVS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvsUsdValue {
    /// AVS address.
    pub avs_addr: String,
    /// Total value.
    pub usd_value: Dec,
}

// =============================================================================
// Genesis
// =============================================================================

/// The `operator` section of the genesis app state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperatorGenesis {
    /// Registered operators.
    #[serde(default)]
    pub operators: Vec<GenesisOperator>,
    /// Consensus keys per operator.
    #[serde(default)]
    pub operator_records: Vec<GenesisOperatorRecord>,
    /// Opt-in states keyed by `operator/avs`.
    #[serde(default)]
    pub opt_states: Vec<GenesisOptState>,
    /// Operator valuations keyed by `avs/operator`.
    #[serde(default, rename = "operator_usd_values")]
    pub operator_usd_values: Vec<GenesisOperatorUsdValue>,
    /// AVS valuations.
    #[serde(default, rename = "avs_usd_values")]
    pub avs_usd_values: Vec<GenesisAvsUsdValue>,
    /// Previous consensus keys keyed by `chain_id/operator`.
    #[serde(default)]
    pub pre_cons_keys: Vec<GenesisPrevConsKey>,
    /// Pending key removals keyed by `operator/chain_id`.
    #[serde(default)]
    pub operator_key_removals: Vec<GenesisKeyRemoval>,
}

/// An operator as it appears in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOperator {
    /// Operator address.
    pub operator_address: String,
    /// Operator details.
    pub operator_info: GenesisOperatorInfo,
}

/// Operator details as they appear in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOperatorInfo {
    /// Earnings address.
    pub earnings_addr: String,
    /// Approval address.
    #[serde(default)]
    pub approve_addr: String,
    /// Free-form metadata.
    #[serde(default)]
    pub operator_meta_info: String,
    /// Commission settings.
    pub commission: GenesisCommission,
}

/// Commission settings as they appear in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisCommission {
    /// Rates.
    pub commission_rates: GenesisCommissionRates,
    /// Last change.
    pub update_time: DateTime<Utc>,
}

/// Commission rates as they appear in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisCommissionRates {
    /// Current rate.
    pub rate: Dec,
    /// Maximum rate.
    pub max_rate: Dec,
    /// Maximum change rate.
    pub max_change_rate: Dec,
}

impl GenesisOperatorInfo {
    /// Convert to an operator record.
    pub fn to_operator(&self) -> Operator {
        let rates = &self.commission.commission_rates;
        Operator {
            earnings_addr: self.earnings_addr.clone(),
            approve_addr: self.approve_addr.clone(),
            meta_info: self.operator_meta_info.clone(),
            commission_rate: rates.rate,
            max_commission_rate: rates.max_rate,
            max_change_rate: rates.max_change_rate,
            commission_update_time: self.commission.update_time,
        }
    }
}

/// Consensus keys of one operator.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOperatorRecord {
    /// Operator address.
    pub operator_address: String,
    /// One entry per chain.
    #[serde(default)]
    pub chains: Vec<GenesisChainKey>,
}

/// A consensus key on one chain.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisChainKey {
    /// Chain id.
    pub chain_id: String,
    /// Hex public key.
    pub consensus_key: String,
}

/// An opt-in state under a joined key.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOptState {
    /// `operator/avs`.
    pub key: String,
    /// The state.
    pub opt_info: GenesisOptInfo,
}

/// Opt-in state fields as they appear in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOptInfo {
    /// Slashing contract.
    #[serde(default)]
    pub slash_contract: String,
    /// Opt-in height.
    #[serde(deserialize_with = "serde_num::u64_str")]
    pub opted_in_height: u64,
    /// Opt-out height, `u64::MAX` when still opted in.
    #[serde(deserialize_with = "serde_num::u64_str")]
    pub opted_out_height: u64,
    /// Jailed flag.
    #[serde(default)]
    pub jailed: bool,
}

/// An operator valuation under a joined key.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOperatorUsdValue {
    /// `avs/operator`.
    pub key: String,
    /// The valuation.
    pub opted_usd_value: GenesisOptedUsdValue,
}

/// Valuation fields as they appear in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisOptedUsdValue {
    /// Self stake value.
    pub self_usd_value: Dec,
    /// Total value.
    pub total_usd_value: Dec,
    /// Active value.
    pub active_usd_value: Dec,
}

/// An AVS valuation as it appears in genesis.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisAvsUsdValue {
    /// AVS address.
    pub avs_addr: String,
    /// Wrapped value.
    pub value: GenesisDecValue,
}

/// A wrapped decimal.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisDecValue {
    /// The amount.
    pub amount: Dec,
}

/// A previous consensus key under a joined key.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisPrevConsKey {
    /// `chain_id/operator`.
    pub key: String,
    /// Hex public key.
    pub consensus_key: String,
}

/// A pending key removal under a joined key.
#[derive(Debug, Clone, Deserialize)]
pub struct GenesisKeyRemoval {
    /// `operator/chain_id`.
    pub key: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn chain_time_formats() {
        let a = parse_chain_time("2024-05-01T10:00:00Z").unwrap();
        let b = parse_chain_time("2024-05-01 10:00:00 +0000 UTC").unwrap();
        let c = parse_chain_time("2024-05-01 10:00:00.5 +0000 UTC").unwrap();
        assert_eq!(a, b);
        assert!(c > b);
        assert!(parse_chain_time("yesterday").is_none());
    }

    #[test]
    fn opt_out_sentinels() {
        assert_eq!(parse_opt_out_height("").unwrap(), None);
        assert_eq!(parse_opt_out_height("18446744073709551615").unwrap(), None);
        assert_eq!(parse_opt_out_height("42").unwrap(), Some(42));
        assert!(parse_opt_out_height("x").is_err());
    }
}
