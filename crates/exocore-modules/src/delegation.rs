//! `x/delegation` projector.
//!
//! Tracks associations, per-triple delegation states, operator membership
//! sets, the undelegation lifecycle and the native asset's delegation
//! accumulator.
//!
//! # Undelegation lifecycle
//!
//! ```text
//! Started --> HoldCountChanged* --> Slashed* --> Matured
//! ```
//!
//! Slashing events are emitted by `x/operator` but only touch delegation
//! records, so they are handled here. An operator-level slash is fanned out
//! to every staker of the slashed `(operator, asset)` pair by diffing the
//! staker's delegated amount on chain just before and at the slash height.

use exocore_db::Store;
use exocore_source::DelegationSource;
use exocore_types::delegation::DelegationGenesis;
use exocore_types::event_types::{delegation as ev, operator as op_ev};
use exocore_types::keys::{split_pair, split_triple};
use exocore_types::{
    Block, BlockResults, DelegationState, EXOCORE_ASSET_ID, Event, ExoAssetDelegation,
    GenesisDoc, Tx, UndelegationRecord, find_events_by_type,
};

use crate::error::ModuleError;
use crate::genesis_section;

/// Projector for `x/delegation`.
#[derive(Debug, Clone)]
pub struct DelegationModule<S> {
    store: S,
    source: DelegationSource,
}

impl<S: Store> DelegationModule<S> {
    /// Module name, also the genesis app-state key.
    pub const NAME: &'static str = "delegation";

    /// Build the projector.
    pub const fn new(store: S, source: DelegationSource) -> Self {
        Self { store, source }
    }

    /// Module name.
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Load associations, delegation states, membership sets and pending
    /// undelegations.
    ///
    /// The native asset has no per-asset staker balance, so its delegation
    /// states also seed the exo delegation accumulator with the amount the
    /// chain reports at the initial height.
    pub async fn handle_genesis(&self, doc: &GenesisDoc) -> Result<(), ModuleError> {
        tracing::debug!(module = Self::NAME, "Parsing genesis");
        let Some(genesis) = genesis_section::<DelegationGenesis>(doc, Self::NAME)? else {
            return Ok(());
        };

        for association in &genesis.associations {
            self.store
                .save_staker_operator_association(&association.staker_id, &association.operator)
                .await?;
        }

        for entry in &genesis.delegation_states {
            let (staker_id, asset_id, operator_addr) = split_triple(&entry.key)?;
            let state = DelegationState {
                staker_id,
                asset_id,
                operator_addr,
                undelegatable_share: entry.states.undelegatable_share,
                wait_undelegation_amount: entry.states.wait_undelegation_amount,
            };
            self.store.save_delegation_state(&state).await?;

            if state.asset_id == EXOCORE_ASSET_ID {
                let delegated = self
                    .source
                    .get_delegated_amount(
                        doc.initial_height,
                        &state.staker_id,
                        &state.asset_id,
                        &state.operator_addr,
                    )
                    .await?;
                let seed = ExoAssetDelegation {
                    pending_undelegation: state.wait_undelegation_amount,
                    ..ExoAssetDelegation::delegated_delta(
                        &state.staker_id,
                        &state.operator_addr,
                        delegated,
                    )
                };
                self.store.accumulate_exo_asset_delegation(&seed).await?;
            }
        }

        for entry in &genesis.stakers_by_operator {
            let (operator_addr, asset_id) = split_pair(&entry.key)?;
            for staker_id in &entry.stakers {
                self.store
                    .append_staker_to_operator_asset(&operator_addr, &asset_id, staker_id)
                    .await?;
            }
        }

        for undelegation in &genesis.undelegations {
            self.store
                .save_undelegation_record(&undelegation.to_record())
                .await?;
        }

        tracing::info!(
            module = Self::NAME,
            associations = genesis.associations.len(),
            delegation_states = genesis.delegation_states.len(),
            undelegations = genesis.undelegations.len(),
            "Genesis loaded"
        );
        Ok(())
    }

    /// Apply begin-block events: slashing and its side effects.
    pub async fn handle_begin_block(&self, block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        self.handle_delegation_states(events).await?;
        self.handle_undelegation_slashings(events).await?;
        self.handle_delegation_slashings(block.height, events).await?;
        // Membership is cleared last: a slash in the same block still needs it.
        self.handle_all_stakers_removed(events).await
    }

    /// Apply end-block events: hold releases and undelegation maturity.
    pub async fn handle_end_block(&self, block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        self.handle_delegation_states(events).await?;
        self.handle_hold_count_changes(events).await?;
        self.handle_undelegation_maturities(block.height, events).await
    }

    /// Apply a block's begin- then end-block events.
    pub async fn handle_block(&self, block: &Block, results: &BlockResults) -> Result<(), ModuleError> {
        self.handle_begin_block(block, &results.begin_block_events).await?;
        self.handle_end_block(block, &results.end_block_events).await
    }

    /// Apply a transaction's events.
    pub async fn handle_tx(&self, tx: &Tx) -> Result<(), ModuleError> {
        let events = &tx.events;
        self.handle_delegation_states(events).await?;
        self.handle_associations(events).await?;
        self.handle_disassociations(events).await?;
        self.handle_stakers_appended(events).await?;
        self.handle_stakers_removed(events).await?;
        self.handle_all_stakers_removed(events).await?;
        self.handle_exo_asset_delegations(events).await?;
        self.handle_undelegation_starts(events).await?;
        self.handle_hold_count_changes(events).await?;
        self.handle_undelegation_slashings(events).await
    }

    // =========================================================================
    // Delegation state and membership
    // =========================================================================

    /// Emitted by delegate/undelegate txs, by `BeginBlock` slashing and by
    /// `EndBlock` maturity. Every trigger overwrites the same row.
    async fn handle_delegation_states(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::DELEGATION_STATE_UPDATED) {
            let state = DelegationState {
                staker_id: event.attribute(ev::ATTR_STAKER_ID)?.to_owned(),
                asset_id: event.attribute(ev::ATTR_ASSET_ID)?.to_owned(),
                operator_addr: event.attribute(ev::ATTR_OPERATOR_ADDR)?.to_owned(),
                undelegatable_share: event.dec(ev::ATTR_UNDELEGATABLE_SHARE)?,
                wait_undelegation_amount: event.int(ev::ATTR_WAIT_UNDELEGATION_AMOUNT)?,
            };
            self.store.save_delegation_state(&state).await?;
        }
        Ok(())
    }

    async fn handle_associations(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::OPERATOR_ASSOCIATED) {
            let staker_id = event.attribute(ev::ATTR_STAKER_ID)?;
            let operator_addr = event.attribute(ev::ATTR_OPERATOR_ADDR)?;
            self.store
                .save_staker_operator_association(staker_id, operator_addr)
                .await?;
        }
        Ok(())
    }

    async fn handle_disassociations(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::OPERATOR_DISASSOCIATED) {
            let staker_id = event.attribute(ev::ATTR_STAKER_ID)?;
            self.store.delete_staker_operator_association(staker_id).await?;
        }
        Ok(())
    }

    async fn handle_stakers_appended(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::STAKER_APPENDED) {
            let staker_id = event.attribute(ev::ATTR_STAKER_ID)?;
            let operator_addr = event.attribute(ev::ATTR_OPERATOR_ADDR)?;
            let asset_id = event.attribute(ev::ATTR_ASSET_ID)?;
            self.store
                .append_staker_to_operator_asset(operator_addr, asset_id, staker_id)
                .await?;
        }
        Ok(())
    }

    async fn handle_stakers_removed(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::STAKER_REMOVED) {
            let staker_id = event.attribute(ev::ATTR_STAKER_ID)?;
            let operator_addr = event.attribute(ev::ATTR_OPERATOR_ADDR)?;
            let asset_id = event.attribute(ev::ATTR_ASSET_ID)?;
            self.store
                .remove_staker_from_operator_asset(operator_addr, asset_id, staker_id)
                .await?;
        }
        Ok(())
    }

    async fn handle_all_stakers_removed(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::ALL_STAKERS_REMOVED) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR_ADDR)?;
            let asset_id = event.attribute(ev::ATTR_ASSET_ID)?;
            self.store
                .delete_all_stakers_from_operator_asset(operator_addr, asset_id)
                .await?;
        }
        Ok(())
    }

    async fn handle_exo_asset_delegations(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::EXO_ASSET_DELEGATION) {
            let delta = ExoAssetDelegation::delegated_delta(
                event.attribute(ev::ATTR_STAKER_ID)?,
                event.attribute(ev::ATTR_OPERATOR_ADDR)?,
                event.int(ev::ATTR_AMOUNT)?,
            );
            self.store.accumulate_exo_asset_delegation(&delta).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Undelegation lifecycle
    // =========================================================================

    async fn handle_undelegation_starts(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UNDELEGATION_STARTED) {
            let amount = event.int(ev::ATTR_AMOUNT)?;
            let record = UndelegationRecord {
                record_id: event.attribute(ev::ATTR_RECORD_ID)?.to_owned(),
                staker_id: event.attribute(ev::ATTR_STAKER_ID)?.to_owned(),
                asset_id: event.attribute(ev::ATTR_ASSET_ID)?.to_owned(),
                operator_addr: event.attribute(ev::ATTR_OPERATOR_ADDR)?.to_owned(),
                tx_hash: event.attribute(ev::ATTR_TX_HASH)?.to_owned(),
                block_number: event.i64(ev::ATTR_BLOCK_NUMBER)?,
                completed_epoch_identifier: event.attribute(ev::ATTR_COMPLETED_EPOCH_ID)?.to_owned(),
                completed_epoch_number: event.i64(ev::ATTR_COMPLETED_EPOCH_NUMBER)?,
                undelegation_id: event.i64(ev::ATTR_UNDELEGATION_ID)?,
                amount,
                actual_completed_amount: amount,
                hold_count: 0,
                maturity_height: None,
            };
            self.store.save_undelegation_record(&record).await?;

            if record.asset_id == EXOCORE_ASSET_ID {
                self.store
                    .undelegate_exo_asset(&record.staker_id, &record.operator_addr, amount)
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_hold_count_changes(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UNDELEGATION_HOLD_COUNT_CHANGED) {
            let record_id = event.attribute(ev::ATTR_RECORD_ID)?;
            let hold_count = event.i64(ev::ATTR_HOLD_COUNT)?;
            if hold_count < 0 {
                return Err(ModuleError::HoldCountUnderflow {
                    record_id: record_id.to_owned(),
                    hold_count,
                });
            }
            self.store
                .update_undelegation_hold_count(record_id, hold_count)
                .await?;
        }
        Ok(())
    }

    async fn handle_undelegation_maturities(&self, height: i64, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UNDELEGATION_MATURED) {
            let record_id = event.attribute(ev::ATTR_RECORD_ID)?;
            let amount = event.int(ev::ATTR_AMOUNT)?;
            let matured = self
                .store
                .mature_undelegation_record(record_id, amount, height)
                .await?;
            if !matured {
                tracing::debug!(record_id, height, "Undelegation already matured, skipping");
            }
        }
        Ok(())
    }

    async fn handle_undelegation_slashings(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, op_ev::UNDELEGATION_SLASHED) {
            let record_id = event.attribute(op_ev::ATTR_RECORD_ID)?;
            let post_slash = event.int(op_ev::ATTR_AMOUNT)?;
            let slashed = event.int(op_ev::ATTR_SLASH_AMOUNT)?;
            self.store
                .slash_undelegation_record(record_id, post_slash, slashed)
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Operator slash fan-out
    // =========================================================================

    async fn handle_delegation_slashings(&self, height: i64, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, op_ev::OPERATOR_ASSET_SLASHED) {
            let operator_addr = event.attribute(op_ev::ATTR_OPERATOR)?;
            let asset_id = event.attribute(op_ev::ATTR_ASSET_ID)?;
            let stakers = self
                .store
                .get_stakers_by_operator_asset(operator_addr, asset_id)
                .await?;

            tracing::info!(
                operator = operator_addr,
                asset_id,
                height,
                stakers = stakers.len(),
                "Fanning out operator slash"
            );

            for staker_id in &stakers {
                self.slash_staker(height, staker_id, asset_id, operator_addr)
                    .await
                    .map_err(|source| ModuleError::SlashFanOut {
                        operator: operator_addr.to_owned(),
                        asset_id: asset_id.to_owned(),
                        staker_id: staker_id.clone(),
                        source: Box::new(source),
                    })?;
            }
        }
        Ok(())
    }

    /// Record one staker's share of an operator slash.
    async fn slash_staker(
        &self,
        height: i64,
        staker_id: &str,
        asset_id: &str,
        operator_addr: &str,
    ) -> Result<(), ModuleError> {
        let before = self
            .source
            .get_delegated_amount(height.saturating_sub(1), staker_id, asset_id, operator_addr)
            .await?;
        let after = self
            .source
            .get_delegated_amount(height, staker_id, asset_id, operator_addr)
            .await?;
        let slashed = before.checked_sub(after)?;

        if slashed.is_negative() {
            return Err(ModuleError::NegativeSlash { before, after });
        }
        if slashed.is_zero() {
            return Ok(());
        }

        if asset_id == EXOCORE_ASSET_ID {
            self.store
                .slash_exo_asset_delegation(staker_id, operator_addr, slashed)
                .await?;
        } else {
            self.store
                .slash_staker_delegation(staker_id, asset_id, slashed)
                .await?;
        }
        tracing::debug!(staker_id, asset_id, %slashed, "Staker slashed");
        Ok(())
    }
}
