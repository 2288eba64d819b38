//! In-memory store.
//!
//! [`MemoryStore`] implements every store trait over ordered maps behind a
//! single [`tokio::sync::Mutex`]. It mirrors the conflict rules of the
//! `PostgreSQL` statements (height guards, additive accumulators, derived
//! columns, do-nothing inserts) and is used for dry-run replays and tests.
//!
//! Composite writes validate everything they touch before mutating, so a
//! failed call leaves the state unchanged, like a rolled back transaction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use exocore_types::{
    AssetToken, AvsUsdValue, ClientChain, ConsensusAddrToPrune, DelegationState, DogfoodParams,
    DoubleSignEvidence, EXOCORE_ASSET_ID, EpochInfo, ExoAssetDelegation, Int, MintHistory,
    Operator, OperatorAsset, OperatorAssetRow, OperatorConsKey, OperatorUsdValue,
    OperatorUsdValueRow, OptOutExpiry, OptedState, StakerAsset, StakerAssetRow,
    UndelegationMaturity, UndelegationRecord, Validator, ValidatorVotingPower,
};
use tokio::sync::Mutex;

use crate::assets_store::AssetsStore;
use crate::avs_store::AvsStore;
use crate::delegation_store::DelegationStore;
use crate::dogfood_store::DogfoodStore;
use crate::epochs_store::EpochsStore;
use crate::error::DbError;
use crate::exomint_store::ExomintStore;
use crate::operator_store::OperatorStore;

type Pair = (String, String);
type Triple = (String, String, String);

fn pair(a: &str, b: &str) -> Pair {
    (a.to_owned(), b.to_owned())
}

fn triple(a: &str, b: &str, c: &str) -> Triple {
    (a.to_owned(), b.to_owned(), c.to_owned())
}

/// `deposited - free - pending - lifetime_slashed`.
fn staker_delegated(
    deposited: Int,
    free: Int,
    pending: Int,
    lifetime_slashed: Int,
) -> Result<Int, DbError> {
    Ok(deposited
        .checked_sub(free)?
        .checked_sub(pending)?
        .checked_sub(lifetime_slashed)?)
}

#[derive(Default)]
struct Inner {
    // x/assets
    assets_params: Option<(serde_json::Value, i64)>,
    client_chains: BTreeMap<i64, ClientChain>,
    tokens: BTreeMap<String, AssetToken>,
    staker_assets: BTreeMap<Pair, StakerAssetRow>,
    staker_assets_history: BTreeMap<(String, String, i64), StakerAssetRow>,
    operator_assets: BTreeMap<Pair, OperatorAssetRow>,
    operator_assets_history: BTreeMap<(String, String, i64), OperatorAssetRow>,

    // x/delegation
    associations: BTreeMap<String, String>,
    delegation_states: BTreeMap<Triple, DelegationState>,
    operator_asset_stakers: BTreeSet<Triple>,
    undelegations: BTreeMap<String, UndelegationRecord>,
    exo_delegations: BTreeMap<Pair, ExoAssetDelegation>,

    // x/dogfood
    dogfood_params: Option<DogfoodParams>,
    opt_out_expiries: BTreeMap<String, OptOutExpiry>,
    consensus_addrs_to_prune: BTreeMap<String, ConsensusAddrToPrune>,
    undelegation_maturities: BTreeMap<String, UndelegationMaturity>,
    last_total_power: Option<Int>,
    validators: BTreeMap<String, Validator>,
    voting_powers: BTreeMap<(String, i64), ValidatorVotingPower>,
    double_sign_evidences: BTreeMap<Pair, DoubleSignEvidence>,

    // x/operator
    operators: BTreeMap<String, Operator>,
    cons_keys: BTreeMap<Pair, OperatorConsKey>,
    opted_states: BTreeMap<Pair, OptedState>,
    operator_usd_values: BTreeMap<Pair, OperatorUsdValueRow>,
    avs_usd_values: BTreeMap<String, AvsUsdValue>,

    // x/avs
    avs: BTreeSet<String>,
    chain_avs: BTreeMap<String, String>,

    // x/epochs
    epoch_definitions: BTreeMap<String, EpochInfo>,
    epoch_states: BTreeMap<String, EpochInfo>,

    // x/exomint
    exomint_params: Option<(serde_json::Value, i64)>,
    mint_history: BTreeMap<(String, i64), MintHistory>,
}

/// Store holding all state in memory. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn mark_completed<K: Ord, V>(
    rows: &mut BTreeMap<K, V>,
    epoch: i64,
    height: i64,
    fields: impl Fn(&mut V) -> (i64, &mut Option<i64>),
) -> u64 {
    let mut marked = 0_u64;
    for row in rows.values_mut() {
        let (row_epoch, completion) = fields(row);
        if row_epoch == epoch && completion.is_none() {
            *completion = Some(height);
            marked = marked.saturating_add(1);
        }
    }
    marked
}

// =============================================================================
// x/assets
// =============================================================================

#[async_trait]
impl AssetsStore for MemoryStore {
    async fn save_assets_params(
        &self,
        params: &serde_json::Value,
        height: i64,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        if inner
            .assets_params
            .as_ref()
            .is_none_or(|(_, stored)| *stored <= height)
        {
            inner.assets_params = Some((params.clone(), height));
        }
        Ok(())
    }

    async fn get_assets_params(&self) -> Result<Option<(serde_json::Value, i64)>, DbError> {
        Ok(self.inner.lock().await.assets_params.clone())
    }

    async fn save_client_chain(&self, chain: &ClientChain) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        inner
            .client_chains
            .entry(chain.layer_zero_chain_id)
            .and_modify(|stored| {
                stored.name.clone_from(&chain.name);
                stored.meta_info.clone_from(&chain.meta_info);
            })
            .or_insert_with(|| chain.clone());
        Ok(())
    }

    async fn get_client_chain(
        &self,
        layer_zero_chain_id: i64,
    ) -> Result<Option<ClientChain>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .client_chains
            .get(&layer_zero_chain_id)
            .cloned())
    }

    async fn save_token(&self, token: &AssetToken) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .tokens
            .insert(token.asset_id.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, asset_id: &str) -> Result<Option<AssetToken>, DbError> {
        Ok(self.inner.lock().await.tokens.get(asset_id).cloned())
    }

    async fn update_token_meta_info(&self, asset_id: &str, meta_info: &str) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let token = inner
            .tokens
            .get_mut(asset_id)
            .ok_or_else(|| DbError::not_found("token", asset_id))?;
        meta_info.clone_into(&mut token.meta_info);
        Ok(())
    }

    async fn update_token_staking_total(&self, asset_id: &str, total: Int) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let token = inner
            .tokens
            .get_mut(asset_id)
            .ok_or_else(|| DbError::not_found("token", asset_id))?;
        token.staking_total_amount = total;
        Ok(())
    }

    async fn save_staker_asset(&self, asset: &StakerAsset, height: i64) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let key = pair(&asset.staker_id, &asset.asset_id);
        let lifetime_slashed = inner
            .staker_assets
            .get(&key)
            .map_or(Int::ZERO, |row| row.lifetime_slashed);
        let row = StakerAssetRow {
            staker_id: asset.staker_id.clone(),
            asset_id: asset.asset_id.clone(),
            deposited: asset.deposited,
            withdrawable: asset.withdrawable,
            pending_undelegation: asset.pending_undelegation,
            delegated: staker_delegated(
                asset.deposited,
                asset.withdrawable,
                asset.pending_undelegation,
                lifetime_slashed,
            )?,
            lifetime_slashed,
        };
        inner.staker_assets_history.insert(
            (asset.staker_id.clone(), asset.asset_id.clone(), height),
            row.clone(),
        );
        inner.staker_assets.insert(key, row);
        Ok(())
    }

    async fn get_staker_asset(
        &self,
        staker_id: &str,
        asset_id: &str,
    ) -> Result<Option<StakerAssetRow>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .staker_assets
            .get(&pair(staker_id, asset_id))
            .cloned())
    }

    async fn save_operator_asset(&self, asset: &OperatorAsset, height: i64) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let row = OperatorAssetRow {
            operator_addr: asset.operator_addr.clone(),
            asset_id: asset.asset_id.clone(),
            total_amount: asset.total_amount,
            pending_undelegation: asset.pending_undelegation,
            total_share: asset.total_share,
            self_share: asset.self_share,
            other_share: asset.total_share.checked_sub(asset.self_share)?,
        };
        inner.operator_assets_history.insert(
            (asset.operator_addr.clone(), asset.asset_id.clone(), height),
            row.clone(),
        );
        inner
            .operator_assets
            .insert(pair(&asset.operator_addr, &asset.asset_id), row);
        Ok(())
    }

    async fn get_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<Option<OperatorAssetRow>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .operator_assets
            .get(&pair(operator_addr, asset_id))
            .cloned())
    }
}

// =============================================================================
// x/delegation
// =============================================================================

#[async_trait]
impl DelegationStore for MemoryStore {
    async fn save_staker_operator_association(
        &self,
        staker_id: &str,
        operator_addr: &str,
    ) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .associations
            .insert(staker_id.to_owned(), operator_addr.to_owned());
        Ok(())
    }

    async fn delete_staker_operator_association(&self, staker_id: &str) -> Result<(), DbError> {
        self.inner.lock().await.associations.remove(staker_id);
        Ok(())
    }

    async fn get_staker_operator_association(
        &self,
        staker_id: &str,
    ) -> Result<Option<String>, DbError> {
        Ok(self.inner.lock().await.associations.get(staker_id).cloned())
    }

    async fn save_delegation_state(&self, state: &DelegationState) -> Result<(), DbError> {
        self.inner.lock().await.delegation_states.insert(
            triple(&state.staker_id, &state.asset_id, &state.operator_addr),
            state.clone(),
        );
        Ok(())
    }

    async fn get_delegation_state(
        &self,
        staker_id: &str,
        asset_id: &str,
        operator_addr: &str,
    ) -> Result<Option<DelegationState>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .delegation_states
            .get(&triple(staker_id, asset_id, operator_addr))
            .cloned())
    }

    async fn append_staker_to_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
        staker_id: &str,
    ) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .operator_asset_stakers
            .insert(triple(operator_addr, asset_id, staker_id));
        Ok(())
    }

    async fn remove_staker_from_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
        staker_id: &str,
    ) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .operator_asset_stakers
            .remove(&triple(operator_addr, asset_id, staker_id));
        Ok(())
    }

    async fn delete_all_stakers_from_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .operator_asset_stakers
            .retain(|(operator, asset, _)| operator != operator_addr || asset != asset_id);
        Ok(())
    }

    async fn get_stakers_by_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<Vec<String>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .operator_asset_stakers
            .iter()
            .filter(|(operator, asset, _)| operator == operator_addr && asset == asset_id)
            .map(|(_, _, staker)| staker.clone())
            .collect())
    }

    async fn save_undelegation_record(&self, record: &UndelegationRecord) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        inner
            .undelegations
            .entry(record.record_id.clone())
            .and_modify(|stored| {
                stored.actual_completed_amount = record.actual_completed_amount;
                stored.hold_count = record.hold_count;
            })
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn update_undelegation_hold_count(
        &self,
        record_id: &str,
        hold_count: i64,
    ) -> Result<(), DbError> {
        if hold_count < 0 {
            return Err(DbError::InvalidState(format!(
                "negative hold count {hold_count} for undelegation {record_id}"
            )));
        }
        let mut inner = self.inner.lock().await;
        let record = inner
            .undelegations
            .get_mut(record_id)
            .ok_or_else(|| DbError::not_found("undelegation record", record_id))?;
        record.hold_count = hold_count;
        Ok(())
    }

    async fn get_undelegation_record(
        &self,
        record_id: &str,
    ) -> Result<Option<UndelegationRecord>, DbError> {
        Ok(self.inner.lock().await.undelegations.get(record_id).cloned())
    }

    async fn slash_undelegation_record(
        &self,
        record_id: &str,
        post_slash_amount: Int,
        slashed: Int,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .undelegations
            .get(record_id)
            .ok_or_else(|| DbError::not_found("undelegation record", record_id))?;
        let staker_id = record.staker_id.clone();
        let asset_id = record.asset_id.clone();
        let operator_addr = record.operator_addr.clone();

        if asset_id == EXOCORE_ASSET_ID {
            let key = pair(&staker_id, &operator_addr);
            let row = inner.exo_delegations.get(&key).ok_or_else(|| {
                DbError::not_found("staker balance", format!("{staker_id}/{asset_id}/{operator_addr}"))
            })?;
            let pending = row.pending_undelegation.checked_sub(slashed)?;
            let total_slashed = row.slashed.checked_add(slashed)?;
            if let Some(row) = inner.exo_delegations.get_mut(&key) {
                row.pending_undelegation = pending;
                row.slashed = total_slashed;
            }
        } else {
            let key = pair(&staker_id, &asset_id);
            let row = inner.staker_assets.get(&key).ok_or_else(|| {
                DbError::not_found("staker balance", format!("{staker_id}/{asset_id}/{operator_addr}"))
            })?;
            let pending = row.pending_undelegation.checked_sub(slashed)?;
            let lifetime = row.lifetime_slashed.checked_add(slashed)?;
            let delegated = staker_delegated(row.deposited, row.withdrawable, pending, lifetime)?;
            if let Some(row) = inner.staker_assets.get_mut(&key) {
                row.pending_undelegation = pending;
                row.lifetime_slashed = lifetime;
                row.delegated = delegated;
            }
        }

        if let Some(record) = inner.undelegations.get_mut(record_id) {
            record.actual_completed_amount = post_slash_amount;
        }
        Ok(())
    }

    async fn mature_undelegation_record(
        &self,
        record_id: &str,
        completed_amount: Int,
        height: i64,
    ) -> Result<bool, DbError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .undelegations
            .get(record_id)
            .ok_or_else(|| DbError::not_found("undelegation record", record_id))?;
        if record.maturity_height.is_some() {
            return Ok(false);
        }

        if record.asset_id == EXOCORE_ASSET_ID {
            let key = pair(&record.staker_id, &record.operator_addr);
            let row = inner.exo_delegations.get(&key).ok_or_else(|| {
                DbError::not_found("exo asset delegation", format!("{}/{}", key.0, key.1))
            })?;
            let pending = row.pending_undelegation.checked_sub(completed_amount)?;
            if let Some(row) = inner.exo_delegations.get_mut(&key) {
                row.pending_undelegation = pending;
            }
        }

        if let Some(record) = inner.undelegations.get_mut(record_id) {
            record.maturity_height = Some(height);
            record.actual_completed_amount = completed_amount;
        }
        Ok(true)
    }

    async fn accumulate_exo_asset_delegation(
        &self,
        delta: &ExoAssetDelegation,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let key = pair(&delta.staker_id, &delta.operator_addr);
        let next = match inner.exo_delegations.get(&key) {
            Some(row) => ExoAssetDelegation {
                staker_id: row.staker_id.clone(),
                operator_addr: row.operator_addr.clone(),
                delegated: row.delegated.checked_add(delta.delegated)?,
                pending_undelegation: row
                    .pending_undelegation
                    .checked_add(delta.pending_undelegation)?,
                slashed: row.slashed.checked_add(delta.slashed)?,
            },
            None => delta.clone(),
        };
        inner.exo_delegations.insert(key, next);
        Ok(())
    }

    async fn undelegate_exo_asset(
        &self,
        staker_id: &str,
        operator_addr: &str,
        amount: Int,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .exo_delegations
            .get_mut(&pair(staker_id, operator_addr))
            .ok_or_else(|| {
                DbError::not_found("exo asset delegation", format!("{staker_id}/{operator_addr}"))
            })?;
        let pending = row.pending_undelegation.checked_add(amount)?;
        let delegated = row.delegated.checked_sub(amount)?;
        row.pending_undelegation = pending;
        row.delegated = delegated;
        Ok(())
    }

    async fn slash_staker_delegation(
        &self,
        staker_id: &str,
        asset_id: &str,
        slashed: Int,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .staker_assets
            .get_mut(&pair(staker_id, asset_id))
            .ok_or_else(|| DbError::not_found("staker balance", format!("{staker_id}/{asset_id}")))?;
        let lifetime = row.lifetime_slashed.checked_add(slashed)?;
        let delegated = staker_delegated(
            row.deposited,
            row.withdrawable,
            row.pending_undelegation,
            lifetime,
        )?;
        row.lifetime_slashed = lifetime;
        row.delegated = delegated;
        Ok(())
    }

    async fn slash_exo_asset_delegation(
        &self,
        staker_id: &str,
        operator_addr: &str,
        slashed: Int,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .exo_delegations
            .get_mut(&pair(staker_id, operator_addr))
            .ok_or_else(|| {
                DbError::not_found("exo asset delegation", format!("{staker_id}/{operator_addr}"))
            })?;
        let delegated = row.delegated.checked_sub(slashed)?;
        let total_slashed = row.slashed.checked_add(slashed)?;
        row.delegated = delegated;
        row.slashed = total_slashed;
        Ok(())
    }

    async fn get_exo_asset_delegation(
        &self,
        staker_id: &str,
        operator_addr: &str,
    ) -> Result<Option<ExoAssetDelegation>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .exo_delegations
            .get(&pair(staker_id, operator_addr))
            .cloned())
    }
}

// =============================================================================
// x/dogfood
// =============================================================================

#[async_trait]
impl DogfoodStore for MemoryStore {
    async fn save_dogfood_params(
        &self,
        params: &DogfoodParams,
        _height: i64,
    ) -> Result<(), DbError> {
        self.inner.lock().await.dogfood_params = Some(params.clone());
        Ok(())
    }

    async fn get_dogfood_params(&self) -> Result<Option<DogfoodParams>, DbError> {
        Ok(self.inner.lock().await.dogfood_params.clone())
    }

    async fn save_opt_out_expiry(&self, epoch: i64, operator_addr: &str) -> Result<(), DbError> {
        self.inner.lock().await.opt_out_expiries.insert(
            operator_addr.to_owned(),
            OptOutExpiry {
                epoch_number: epoch,
                operator_addr: operator_addr.to_owned(),
                completion_height: None,
            },
        );
        Ok(())
    }

    async fn complete_opt_outs(&self, epoch: i64, height: i64) -> Result<u64, DbError> {
        let mut inner = self.inner.lock().await;
        Ok(mark_completed(&mut inner.opt_out_expiries, epoch, height, |row| {
            (row.epoch_number, &mut row.completion_height)
        }))
    }

    async fn get_opt_out_expiry(
        &self,
        operator_addr: &str,
    ) -> Result<Option<OptOutExpiry>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .opt_out_expiries
            .get(operator_addr)
            .cloned())
    }

    async fn save_consensus_addr_to_prune(
        &self,
        epoch: i64,
        consensus_addr: &str,
    ) -> Result<(), DbError> {
        self.inner.lock().await.consensus_addrs_to_prune.insert(
            consensus_addr.to_owned(),
            ConsensusAddrToPrune {
                epoch_number: epoch,
                consensus_addr: consensus_addr.to_owned(),
                completion_height: None,
            },
        );
        Ok(())
    }

    async fn complete_consensus_addrs_pruning(
        &self,
        epoch: i64,
        height: i64,
    ) -> Result<u64, DbError> {
        let mut inner = self.inner.lock().await;
        Ok(mark_completed(
            &mut inner.consensus_addrs_to_prune,
            epoch,
            height,
            |row| (row.epoch_number, &mut row.completion_height),
        ))
    }

    async fn get_consensus_addr_to_prune(
        &self,
        consensus_addr: &str,
    ) -> Result<Option<ConsensusAddrToPrune>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .consensus_addrs_to_prune
            .get(consensus_addr)
            .cloned())
    }

    async fn save_undelegation_maturity(
        &self,
        epoch: i64,
        record_key: &str,
    ) -> Result<(), DbError> {
        self.inner.lock().await.undelegation_maturities.insert(
            record_key.to_owned(),
            UndelegationMaturity {
                epoch_number: epoch,
                record_key: record_key.to_owned(),
                completion_height: None,
            },
        );
        Ok(())
    }

    async fn mature_undelegations(&self, epoch: i64, height: i64) -> Result<u64, DbError> {
        let mut inner = self.inner.lock().await;
        Ok(mark_completed(
            &mut inner.undelegation_maturities,
            epoch,
            height,
            |row| (row.epoch_number, &mut row.completion_height),
        ))
    }

    async fn get_undelegation_maturity(
        &self,
        record_key: &str,
    ) -> Result<Option<UndelegationMaturity>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .undelegation_maturities
            .get(record_key)
            .cloned())
    }

    async fn save_last_total_power(&self, total_power: Int) -> Result<(), DbError> {
        self.inner.lock().await.last_total_power = Some(total_power);
        Ok(())
    }

    async fn get_last_total_power(&self) -> Result<Option<Int>, DbError> {
        Ok(self.inner.lock().await.last_total_power)
    }

    async fn save_validators(&self, validators: &[Validator]) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        for validator in validators {
            inner
                .validators
                .insert(validator.consensus_address.clone(), validator.clone());
        }
        Ok(())
    }

    async fn get_validator(&self, consensus_address: &str) -> Result<Option<Validator>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .validators
            .get(consensus_address)
            .cloned())
    }

    async fn save_validator_voting_powers(
        &self,
        powers: &[ValidatorVotingPower],
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        if let Some(unknown) = powers
            .iter()
            .find(|power| !inner.validators.contains_key(&power.consensus_address))
        {
            return Err(DbError::not_found(
                "validator",
                unknown.consensus_address.clone(),
            ));
        }
        for power in powers {
            inner
                .voting_powers
                .entry((power.consensus_address.clone(), power.height))
                .or_insert_with(|| power.clone());
        }
        Ok(())
    }

    async fn get_validator_voting_powers(
        &self,
        consensus_address: &str,
    ) -> Result<Vec<ValidatorVotingPower>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .voting_powers
            .values()
            .filter(|power| power.consensus_address == consensus_address)
            .cloned()
            .collect())
    }

    async fn save_double_sign_evidences(
        &self,
        evidences: &[DoubleSignEvidence],
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        for evidence in evidences {
            inner
                .double_sign_evidences
                .entry(pair(&evidence.vote_a.signature, &evidence.vote_b.signature))
                .or_insert_with(|| evidence.clone());
        }
        Ok(())
    }

    async fn get_double_sign_evidences(
        &self,
        height: i64,
    ) -> Result<Vec<DoubleSignEvidence>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .double_sign_evidences
            .values()
            .filter(|evidence| evidence.height == height)
            .cloned()
            .collect())
    }
}

// =============================================================================
// x/operator
// =============================================================================

#[async_trait]
impl OperatorStore for MemoryStore {
    async fn save_operator_detail(&self, operator: &Operator) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .operators
            .insert(operator.earnings_addr.clone(), operator.clone());
        Ok(())
    }

    async fn get_operator(&self, earnings_addr: &str) -> Result<Option<Operator>, DbError> {
        Ok(self.inner.lock().await.operators.get(earnings_addr).cloned())
    }

    async fn save_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
        pubkey_hex: &str,
        consensus_address: &str,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        inner
            .cons_keys
            .entry(pair(operator_addr, chain_id))
            .and_modify(|key| {
                pubkey_hex.clone_into(&mut key.pubkey_hex);
                consensus_address.clone_into(&mut key.consensus_address);
            })
            .or_insert_with(|| OperatorConsKey {
                operator_addr: operator_addr.to_owned(),
                chain_id: chain_id.to_owned(),
                pubkey_hex: pubkey_hex.to_owned(),
                consensus_address: consensus_address.to_owned(),
                prev_pubkey_hex: None,
                prev_consensus_address: None,
                is_removing: false,
            });
        Ok(())
    }

    async fn save_operator_prev_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
        prev_pubkey_hex: &str,
        prev_consensus_address: &str,
    ) -> Result<(), DbError> {
        if let Some(key) = self
            .inner
            .lock()
            .await
            .cons_keys
            .get_mut(&pair(operator_addr, chain_id))
        {
            key.prev_pubkey_hex = Some(prev_pubkey_hex.to_owned());
            key.prev_consensus_address = Some(prev_consensus_address.to_owned());
        }
        Ok(())
    }

    async fn clear_operator_prev_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError> {
        if let Some(key) = self
            .inner
            .lock()
            .await
            .cons_keys
            .get_mut(&pair(operator_addr, chain_id))
        {
            key.prev_pubkey_hex = None;
            key.prev_consensus_address = None;
        }
        Ok(())
    }

    async fn mark_operator_key_removal(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError> {
        if let Some(key) = self
            .inner
            .lock()
            .await
            .cons_keys
            .get_mut(&pair(operator_addr, chain_id))
        {
            key.is_removing = true;
        }
        Ok(())
    }

    async fn remove_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .cons_keys
            .remove(&pair(operator_addr, chain_id));
        Ok(())
    }

    async fn get_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<Option<OperatorConsKey>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .cons_keys
            .get(&pair(operator_addr, chain_id))
            .cloned())
    }

    async fn save_opted_state(&self, state: &OptedState) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .opted_states
            .insert(pair(&state.operator_addr, &state.avs_addr), state.clone());
        Ok(())
    }

    async fn get_opted_state(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<Option<OptedState>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .opted_states
            .get(&pair(operator_addr, avs_addr))
            .cloned())
    }

    async fn save_operator_usd_value(&self, value: &OperatorUsdValue) -> Result<(), DbError> {
        let row = OperatorUsdValueRow {
            operator_addr: value.operator_addr.clone(),
            avs_addr: value.avs_addr.clone(),
            self_usd_value: value.self_usd_value,
            total_usd_value: value.total_usd_value,
            active_usd_value: value.active_usd_value,
            other_usd_value: value.total_usd_value.checked_sub(value.self_usd_value)?,
        };
        self.inner
            .lock()
            .await
            .operator_usd_values
            .insert(pair(&value.operator_addr, &value.avs_addr), row);
        Ok(())
    }

    async fn get_operator_usd_value(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<Option<OperatorUsdValueRow>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .operator_usd_values
            .get(&pair(operator_addr, avs_addr))
            .cloned())
    }

    async fn delete_operator_usd_value(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .operator_usd_values
            .remove(&pair(operator_addr, avs_addr));
        Ok(())
    }

    async fn save_avs_usd_value(&self, value: &AvsUsdValue) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .avs_usd_values
            .insert(value.avs_addr.clone(), value.clone());
        Ok(())
    }

    async fn get_avs_usd_value(&self, avs_addr: &str) -> Result<Option<AvsUsdValue>, DbError> {
        Ok(self.inner.lock().await.avs_usd_values.get(avs_addr).cloned())
    }

    async fn delete_avs_usd_value(&self, avs_addr: &str) -> Result<(), DbError> {
        self.inner.lock().await.avs_usd_values.remove(avs_addr);
        Ok(())
    }
}

// =============================================================================
// x/avs
// =============================================================================

#[async_trait]
impl AvsStore for MemoryStore {
    async fn save_avs(&self, avs_addr: &str) -> Result<(), DbError> {
        self.inner.lock().await.avs.insert(avs_addr.to_owned());
        Ok(())
    }

    async fn save_chain_id_to_avs(&self, chain_id: &str, avs_addr: &str) -> Result<(), DbError> {
        self.inner
            .lock()
            .await
            .chain_avs
            .insert(chain_id.to_owned(), avs_addr.to_owned());
        Ok(())
    }

    async fn has_avs(&self, avs_addr: &str) -> Result<bool, DbError> {
        Ok(self.inner.lock().await.avs.contains(avs_addr))
    }

    async fn get_chain_avs(&self, chain_id: &str) -> Result<Option<String>, DbError> {
        Ok(self.inner.lock().await.chain_avs.get(chain_id).cloned())
    }
}

// =============================================================================
// x/epochs
// =============================================================================

#[async_trait]
impl EpochsStore for MemoryStore {
    async fn save_epoch_definitions(&self, epochs: &[EpochInfo]) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        for epoch in epochs {
            inner
                .epoch_definitions
                .entry(epoch.identifier.clone())
                .or_insert_with(|| epoch.clone());
        }
        Ok(())
    }

    async fn save_epoch_state(&self, epoch: &EpochInfo) -> Result<bool, DbError> {
        let mut inner = self.inner.lock().await;
        inner
            .epoch_definitions
            .entry(epoch.identifier.clone())
            .or_insert_with(|| epoch.clone());
        let newer = inner
            .epoch_states
            .get(&epoch.identifier)
            .is_none_or(|stored| epoch.current_epoch > stored.current_epoch);
        if newer {
            inner
                .epoch_states
                .insert(epoch.identifier.clone(), epoch.clone());
        }
        Ok(newer)
    }

    async fn get_epoch_state(&self, identifier: &str) -> Result<Option<EpochInfo>, DbError> {
        let inner = self.inner.lock().await;
        let (Some(state), Some(definition)) = (
            inner.epoch_states.get(identifier),
            inner.epoch_definitions.get(identifier),
        ) else {
            return Ok(None);
        };
        Ok(Some(EpochInfo {
            start_time: definition.start_time,
            duration: definition.duration.clone(),
            ..state.clone()
        }))
    }
}

// =============================================================================
// x/exomint
// =============================================================================

#[async_trait]
impl ExomintStore for MemoryStore {
    async fn save_exomint_params(
        &self,
        params: &serde_json::Value,
        height: i64,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        if inner
            .exomint_params
            .as_ref()
            .is_none_or(|(_, stored)| *stored <= height)
        {
            inner.exomint_params = Some((params.clone(), height));
        }
        Ok(())
    }

    async fn get_exomint_params(&self) -> Result<Option<(serde_json::Value, i64)>, DbError> {
        Ok(self.inner.lock().await.exomint_params.clone())
    }

    async fn append_mint_history(&self, history: &MintHistory) -> Result<(), DbError> {
        self.inner.lock().await.mint_history.insert(
            (history.epoch_id.clone(), history.epoch_number),
            history.clone(),
        );
        Ok(())
    }

    async fn get_mint_history(
        &self,
        epoch_id: &str,
        epoch_number: i64,
    ) -> Result<Option<MintHistory>, DbError> {
        Ok(self
            .inner
            .lock()
            .await
            .mint_history
            .get(&(epoch_id.to_owned(), epoch_number))
            .cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};
    use exocore_types::Dec;

    use super::*;

    const ASSET: &str = "0xabc_0x1";

    fn int(v: u64) -> Int {
        Int::from(v)
    }

    fn staker_asset(deposited: u64, free: u64, pending: u64) -> StakerAsset {
        StakerAsset {
            staker_id: "s1".to_owned(),
            asset_id: ASSET.to_owned(),
            deposited: int(deposited),
            withdrawable: int(free),
            pending_undelegation: int(pending),
        }
    }

    fn record(asset_id: &str, amount: u64) -> UndelegationRecord {
        UndelegationRecord {
            record_id: "r1".to_owned(),
            staker_id: "s1".to_owned(),
            asset_id: asset_id.to_owned(),
            operator_addr: "op1".to_owned(),
            tx_hash: "0xhash".to_owned(),
            block_number: 10,
            completed_epoch_identifier: "hour".to_owned(),
            completed_epoch_number: 5,
            undelegation_id: 1,
            amount: int(amount),
            actual_completed_amount: int(amount),
            hold_count: 0,
            maturity_height: None,
        }
    }

    fn epoch(current: i64, height: i64) -> EpochInfo {
        EpochInfo {
            identifier: "hour".to_owned(),
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            duration: "3600s".to_owned(),
            current_epoch: current,
            current_epoch_start_time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            epoch_counting_started: true,
            current_epoch_start_height: height,
        }
    }

    #[tokio::test]
    async fn staker_delegated_is_derived_and_keeps_lifetime_slashed() {
        let store = MemoryStore::new();
        store.save_staker_asset(&staker_asset(1000, 1000, 0), 1).await.unwrap();
        let row = store.get_staker_asset("s1", ASSET).await.unwrap().unwrap();
        assert_eq!(row.delegated, Int::ZERO);

        store.save_staker_asset(&staker_asset(1000, 400, 200), 2).await.unwrap();
        store.slash_staker_delegation("s1", ASSET, int(50)).await.unwrap();
        let row = store.get_staker_asset("s1", ASSET).await.unwrap().unwrap();
        assert_eq!(row.lifetime_slashed, int(50));
        assert_eq!(row.delegated, int(350));

        // A later balance update keeps the accumulated slash.
        store.save_staker_asset(&staker_asset(1000, 500, 200), 3).await.unwrap();
        let row = store.get_staker_asset("s1", ASSET).await.unwrap().unwrap();
        assert_eq!(row.lifetime_slashed, int(50));
        assert_eq!(row.delegated, int(250));
    }

    #[tokio::test]
    async fn staker_delegated_holds_across_balances_and_prior_slashes() {
        // (deposited, free, pending, slash, later free, later pending)
        let cases: [(u64, u64, u64, u64, u64, u64); 6] = [
            (1000, 0, 0, 0, 0, 0),
            (1000, 400, 200, 50, 500, 200),
            (750, 100, 150, 500, 0, 250),
            (1, 0, 0, 1, 0, 0),
            (90, 30, 30, 0, 90, 0),
            (5_000_000_000_000_000_000, 1, 2, 3, 4, 5),
        ];

        for (deposited, free, pending, slash, later_free, later_pending) in cases {
            let store = MemoryStore::new();
            store
                .save_staker_asset(&staker_asset(deposited, free, pending), 1)
                .await
                .unwrap();
            if slash > 0 {
                store.slash_staker_delegation("s1", ASSET, int(slash)).await.unwrap();
            }
            let row = store.get_staker_asset("s1", ASSET).await.unwrap().unwrap();
            let expected = deposited
                .checked_sub(free)
                .and_then(|v| v.checked_sub(pending))
                .and_then(|v| v.checked_sub(slash))
                .unwrap();
            assert_eq!(row.lifetime_slashed, int(slash), "case {deposited}/{free}/{pending}");
            assert_eq!(row.delegated, int(expected), "case {deposited}/{free}/{pending}");

            store
                .save_staker_asset(&staker_asset(deposited, later_free, later_pending), 2)
                .await
                .unwrap();
            let row = store.get_staker_asset("s1", ASSET).await.unwrap().unwrap();
            let expected = deposited
                .checked_sub(later_free)
                .and_then(|v| v.checked_sub(later_pending))
                .and_then(|v| v.checked_sub(slash))
                .unwrap();
            assert_eq!(row.lifetime_slashed, int(slash));
            assert_eq!(row.delegated, int(expected), "later balance for {deposited}");
        }
    }

    #[tokio::test]
    async fn operator_other_share_is_derived() {
        let store = MemoryStore::new();
        let asset = OperatorAsset {
            operator_addr: "op1".to_owned(),
            asset_id: ASSET.to_owned(),
            total_amount: int(900),
            pending_undelegation: Int::ZERO,
            total_share: Dec::parse("900").unwrap(),
            self_share: Dec::parse("100.5").unwrap(),
        };
        store.save_operator_asset(&asset, 7).await.unwrap();
        let row = store.get_operator_asset("op1", ASSET).await.unwrap().unwrap();
        assert_eq!(row.other_share, Dec::parse("799.5").unwrap());
    }

    #[tokio::test]
    async fn undelegation_slash_then_mature() {
        let store = MemoryStore::new();
        store.save_staker_asset(&staker_asset(1000, 300, 200), 1).await.unwrap();
        store.save_undelegation_record(&record(ASSET, 200)).await.unwrap();

        store
            .slash_undelegation_record("r1", int(180), int(20))
            .await
            .unwrap();
        let row = store.get_staker_asset("s1", ASSET).await.unwrap().unwrap();
        assert_eq!(row.lifetime_slashed, int(20));
        assert_eq!(row.pending_undelegation, int(180));
        assert_eq!(row.delegated, int(500));

        assert!(store.mature_undelegation_record("r1", int(180), 42).await.unwrap());
        assert!(!store.mature_undelegation_record("r1", int(0), 43).await.unwrap());
        let stored = store.get_undelegation_record("r1").await.unwrap().unwrap();
        assert_eq!(stored.maturity_height, Some(42));
        assert_eq!(stored.actual_completed_amount, int(180));
    }

    #[tokio::test]
    async fn native_maturity_debits_exo_delegation_once() {
        let store = MemoryStore::new();
        store
            .accumulate_exo_asset_delegation(&ExoAssetDelegation::delegated_delta("s1", "op1", int(500)))
            .await
            .unwrap();
        store.undelegate_exo_asset("s1", "op1", int(200)).await.unwrap();
        store
            .save_undelegation_record(&record(EXOCORE_ASSET_ID, 200))
            .await
            .unwrap();

        store.mature_undelegation_record("r1", int(200), 9).await.unwrap();
        store.mature_undelegation_record("r1", int(200), 9).await.unwrap();
        let exo = store.get_exo_asset_delegation("s1", "op1").await.unwrap().unwrap();
        assert_eq!(exo.delegated, int(300));
        assert_eq!(exo.pending_undelegation, Int::ZERO);
    }

    #[tokio::test]
    async fn failed_slash_leaves_record_untouched() {
        let store = MemoryStore::new();
        store.save_undelegation_record(&record(ASSET, 200)).await.unwrap();
        let err = store
            .slash_undelegation_record("r1", int(180), int(20))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        let stored = store.get_undelegation_record("r1").await.unwrap().unwrap();
        assert_eq!(stored.actual_completed_amount, int(200));
    }

    #[tokio::test]
    async fn hold_count_cannot_go_negative() {
        let store = MemoryStore::new();
        store.save_undelegation_record(&record(ASSET, 1)).await.unwrap();
        store.update_undelegation_hold_count("r1", 2).await.unwrap();
        assert!(store.update_undelegation_hold_count("r1", -1).await.is_err());
        let stored = store.get_undelegation_record("r1").await.unwrap().unwrap();
        assert_eq!(stored.hold_count, 2);
        assert!(store.update_undelegation_hold_count("missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn epoch_state_only_moves_forward() {
        let store = MemoryStore::new();
        assert!(store.save_epoch_state(&epoch(3, 100)).await.unwrap());
        assert!(!store.save_epoch_state(&epoch(3, 999)).await.unwrap());
        assert!(!store.save_epoch_state(&epoch(2, 50)).await.unwrap());
        assert_eq!(
            store.get_epoch_state("hour").await.unwrap().unwrap().current_epoch_start_height,
            100
        );
        assert!(store.save_epoch_state(&epoch(4, 160)).await.unwrap());
        let stored = store.get_epoch_state("hour").await.unwrap().unwrap();
        assert_eq!(stored.current_epoch, 4);
        assert_eq!(stored.current_epoch_start_height, 160);
    }

    #[tokio::test]
    async fn params_height_guard() {
        let store = MemoryStore::new();
        let newer = serde_json::json!({"v": 2});
        store.save_assets_params(&newer, 10).await.unwrap();
        store.save_assets_params(&serde_json::json!({"v": 1}), 5).await.unwrap();
        assert_eq!(store.get_assets_params().await.unwrap(), Some((newer, 10)));
    }

    #[tokio::test]
    async fn schedules_complete_once() {
        let store = MemoryStore::new();
        store.save_opt_out_expiry(3, "op1").await.unwrap();
        store.save_opt_out_expiry(4, "op2").await.unwrap();
        assert_eq!(store.complete_opt_outs(3, 77).await.unwrap(), 1);
        assert_eq!(store.complete_opt_outs(3, 78).await.unwrap(), 0);
        let expiry = store.get_opt_out_expiry("op1").await.unwrap().unwrap();
        assert_eq!(expiry.completion_height, Some(77));
        assert!(store.get_opt_out_expiry("op2").await.unwrap().unwrap().completion_height.is_none());
    }

    #[tokio::test]
    async fn voting_power_history_is_append_only() {
        let store = MemoryStore::new();
        let validator = Validator {
            consensus_address: "aa".to_owned(),
            consensus_pubkey: "0x01".to_owned(),
        };
        let power = |voting_power| ValidatorVotingPower {
            consensus_address: "aa".to_owned(),
            voting_power,
            height: 5,
        };
        assert!(store.save_validator_voting_powers(&[power(1)]).await.is_err());
        store.save_validators(&[validator]).await.unwrap();
        store.save_validator_voting_powers(&[power(1)]).await.unwrap();
        store.save_validator_voting_powers(&[power(9)]).await.unwrap();
        let history = store.get_validator_voting_powers("aa").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].voting_power, 1);
    }

    #[tokio::test]
    async fn prev_cons_key_cleared_independently() {
        let store = MemoryStore::new();
        store.save_operator_cons_key("op1", "exo", "0x02", "bb").await.unwrap();
        store.save_operator_prev_cons_key("op1", "exo", "0x01", "aa").await.unwrap();
        store.mark_operator_key_removal("op1", "exo").await.unwrap();
        store.clear_operator_prev_cons_key("op1", "exo").await.unwrap();
        let key = store.get_operator_cons_key("op1", "exo").await.unwrap().unwrap();
        assert_eq!(key.pubkey_hex, "0x02");
        assert!(key.prev_pubkey_hex.is_none());
        assert!(key.is_removing);
        store.remove_operator_cons_key("op1", "exo").await.unwrap();
        assert!(store.get_operator_cons_key("op1", "exo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mint_history_overwrites_same_epoch() {
        let store = MemoryStore::new();
        let mint = |height, amount| MintHistory {
            block_height: height,
            quantity_minted: int(amount),
            epoch_id: "day".to_owned(),
            epoch_number: 2,
            denom: "hua".to_owned(),
        };
        store.append_mint_history(&mint(10, 5)).await.unwrap();
        store.append_mint_history(&mint(11, 6)).await.unwrap();
        let stored = store.get_mint_history("day", 2).await.unwrap().unwrap();
        assert_eq!(stored.block_height, 11);
        assert_eq!(stored.quantity_minted, int(6));
    }
}
