//! `x/dogfood` projector: the chain's own validator set.
//!
//! The validator set and voting powers only change at the end of a block,
//! signalled by a last-total-power update. Epoch hooks finalise opt-outs,
//! consensus address pruning and undelegation maturities in `BeginBlock`.
//!
//! Double-sign evidence is captured off the block path: the block handler
//! spawns a task per block carrying evidence and never waits for it.

use exocore_db::Store;
use exocore_source::DogfoodSource;
use exocore_types::dogfood::DogfoodGenesis;
use exocore_types::event_types::dogfood as ev;
use exocore_types::{
    Block, BlockResults, DoubleSignEvidence, Event, Evidence, GenesisDoc, Int, Msg,
    SourceValidator, Tx, Validator, ValidatorVotingPower, find_events_by_type,
};

use crate::error::ModuleError;
use crate::genesis_section;

/// Projector for `x/dogfood`.
#[derive(Debug, Clone)]
pub struct DogfoodModule<S> {
    store: S,
    source: DogfoodSource,
}

impl<S: Store + Clone + 'static> DogfoodModule<S> {
    /// Module name, also the genesis app-state key.
    pub const NAME: &'static str = "dogfood";

    /// Build the projector.
    pub const fn new(store: S, source: DogfoodSource) -> Self {
        Self { store, source }
    }

    /// Module name.
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Load params, the validator set, pending schedules and the last total
    /// power. An empty validator set is valid.
    pub async fn handle_genesis(&self, doc: &GenesisDoc) -> Result<(), ModuleError> {
        tracing::debug!(module = Self::NAME, "Parsing genesis");
        let Some(genesis) = genesis_section::<DogfoodGenesis>(doc, Self::NAME)? else {
            return Ok(());
        };
        let height = doc.initial_height;

        self.store
            .save_dogfood_params(&genesis.params, height)
            .await?;
        self.save_validator_set(&genesis.val_set, height).await?;

        for entry in &genesis.opt_out_expiries {
            for operator_addr in &entry.operator_acc_addrs {
                self.store
                    .save_opt_out_expiry(entry.epoch, operator_addr)
                    .await?;
            }
        }
        for entry in &genesis.consensus_addrs_to_prune {
            for cons_addr in &entry.cons_addrs {
                self.store
                    .save_consensus_addr_to_prune(entry.epoch, cons_addr)
                    .await?;
            }
        }
        for entry in &genesis.undelegation_maturities {
            for record_key in &entry.undelegation_record_keys {
                self.store
                    .save_undelegation_maturity(entry.epoch, record_key)
                    .await?;
            }
        }

        self.store
            .save_last_total_power(genesis.last_total_power)
            .await?;

        tracing::info!(
            module = Self::NAME,
            validators = genesis.val_set.len(),
            last_total_power = %genesis.last_total_power,
            "Genesis loaded"
        );
        Ok(())
    }

    /// Apply begin-block events and start evidence capture.
    pub async fn handle_begin_block(&self, block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        self.handle_opt_outs_finished(block.height, events).await?;
        self.handle_cons_addrs_pruned(block.height, events).await?;
        self.handle_undelegations_matured(block.height, events).await?;
        self.spawn_evidence_capture(block);
        Ok(())
    }

    /// Apply end-block events: total power and the validator set.
    pub async fn handle_end_block(&self, block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        let updates = find_events_by_type(events, ev::LAST_TOTAL_POWER_UPDATED);
        if updates.is_empty() {
            return Ok(());
        }
        for event in &updates {
            // Single-attribute event; the key is not stable across versions.
            let power = Int::parse(event.first_attribute()?)?;
            self.store.save_last_total_power(power).await?;
        }
        self.refresh_validators(block.height).await?;
        Ok(())
    }

    /// Apply a block's begin- then end-block events.
    pub async fn handle_block(&self, block: &Block, results: &BlockResults) -> Result<(), ModuleError> {
        self.handle_begin_block(block, &results.begin_block_events).await?;
        self.handle_end_block(block, &results.end_block_events).await
    }

    /// Apply a transaction's events: schedules created by opt-outs and
    /// undelegations.
    pub async fn handle_tx(&self, tx: &Tx) -> Result<(), ModuleError> {
        for event in find_events_by_type(&tx.events, ev::OPT_OUT_BEGAN) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR)?;
            let epoch = event.i64(ev::ATTR_EPOCH)?;
            self.store.save_opt_out_expiry(epoch, operator_addr).await?;
        }
        for event in find_events_by_type(&tx.events, ev::CONS_ADDR_PRUNING_SCHEDULED) {
            let cons_addr = event.attribute(ev::ATTR_CONS_ADDR)?;
            let epoch = event.i64(ev::ATTR_EPOCH)?;
            self.store
                .save_consensus_addr_to_prune(epoch, cons_addr)
                .await?;
        }
        for event in find_events_by_type(&tx.events, ev::UNDELEGATION_MATURITY_SCHEDULED) {
            let record_key = event.attribute(ev::ATTR_RECORD_ID)?;
            let epoch = event.i64(ev::ATTR_EPOCH)?;
            self.store
                .save_undelegation_maturity(epoch, record_key)
                .await?;
        }
        Ok(())
    }

    /// React to a message. A params update is re-read from the chain.
    pub async fn handle_msg(&self, msg: &Msg, tx: &Tx) -> Result<(), ModuleError> {
        if matches!(msg, Msg::DogfoodUpdateParams) {
            let params = self.source.get_params(tx.height).await?;
            self.store.save_dogfood_params(&params, tx.height).await?;
            tracing::info!(module = Self::NAME, height = tx.height, "Params updated");
        }
        Ok(())
    }

    /// Fetch the validator set at `height` and save it with its voting
    /// powers. Returns the number of validators.
    pub async fn refresh_validators(&self, height: i64) -> Result<usize, ModuleError> {
        let validators = self.source.get_validators(height).await?;
        self.save_validator_set(&validators, height).await?;
        tracing::debug!(height, validators = validators.len(), "Validator set refreshed");
        Ok(validators.len())
    }

    async fn save_validator_set(
        &self,
        validators: &[SourceValidator],
        height: i64,
    ) -> Result<(), ModuleError> {
        let (records, powers): (Vec<Validator>, Vec<ValidatorVotingPower>) = validators
            .iter()
            .map(|validator| validator.to_records(height))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unzip();
        self.store.save_validators(&records).await?;
        self.store.save_validator_voting_powers(&powers).await?;
        Ok(())
    }

    // =========================================================================
    // Epoch hooks
    // =========================================================================

    async fn handle_opt_outs_finished(&self, height: i64, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::OPT_OUTS_FINISHED) {
            let epoch = event.i64(ev::ATTR_EPOCH)?;
            let completed = self.store.complete_opt_outs(epoch, height).await?;
            tracing::debug!(epoch, height, completed, "Opt-outs finished");
        }
        Ok(())
    }

    async fn handle_cons_addrs_pruned(&self, height: i64, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::CONS_ADDRS_PRUNED) {
            let epoch = event.i64(ev::ATTR_EPOCH)?;
            let pruned = self
                .store
                .complete_consensus_addrs_pruning(epoch, height)
                .await?;
            tracing::debug!(epoch, height, pruned, "Consensus addresses pruned");
        }
        Ok(())
    }

    async fn handle_undelegations_matured(&self, height: i64, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UNDELEGATIONS_MATURED) {
            let epoch = event.i64(ev::ATTR_EPOCH)?;
            let matured = self.store.mature_undelegations(epoch, height).await?;
            tracing::debug!(epoch, height, matured, "Undelegations matured");
        }
        Ok(())
    }

    // =========================================================================
    // Double-sign evidence
    // =========================================================================

    /// Detach a task saving the block's duplicate-vote evidence. Failures are
    /// logged and never reach the block path.
    fn spawn_evidence_capture(&self, block: &Block) {
        if !block
            .evidence
            .iter()
            .any(|evidence| matches!(evidence, Evidence::DuplicateVote { .. }))
        {
            return;
        }
        let store = self.store.clone();
        let module = Self::NAME;
        let height = block.height;
        let evidence = block.evidence.clone();
        drop(tokio::spawn(async move {
            if let Err(err) = record_double_sign_evidence(&store, height, &evidence).await {
                tracing::error!(
                    module,
                    height,
                    error = %err,
                    "Failed to save double sign evidence"
                );
            }
        }));
    }
}

/// Save every duplicate-vote evidence of a block. Other evidence kinds are
/// ignored. Returns the number of evidences saved.
pub async fn record_double_sign_evidence<S: Store>(
    store: &S,
    height: i64,
    evidence: &[Evidence],
) -> Result<usize, ModuleError> {
    tracing::debug!(module = "dogfood", height, "Updating double sign evidence");
    let evidences: Vec<DoubleSignEvidence> = evidence
        .iter()
        .filter_map(|item| match item {
            Evidence::DuplicateVote { vote_a, vote_b } => Some(DoubleSignEvidence {
                height,
                vote_a: vote_a.clone(),
                vote_b: vote_b.clone(),
            }),
            Evidence::Other => None,
        })
        .collect();
    if !evidences.is_empty() {
        store.save_double_sign_evidences(&evidences).await?;
    }
    Ok(evidences.len())
}
