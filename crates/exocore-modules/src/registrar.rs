//! Registrar: the seven projectors driven in a fixed order.
//!
//! Each block runs in three phases:
//!
//! 1. **Begin block** -- every projector's `BeginBlock` handler, in
//!    registration order. Slashing, opt-out finalisation, epoch ends and
//!    mints land here.
//! 2. **Transactions** -- for each tx in block order, every projector's tx
//!    handler, then every projector's message handler for each message.
//! 3. **End block** -- every projector's `EndBlock` handler, in registration
//!    order. Voting powers, validator sets and maturities land here.
//!
//! The first failure stops the block and is returned with the projector,
//! phase and height it came from.

use exocore_db::Store;
use exocore_source::Sources;
use exocore_types::{Block, BlockResults, GenesisDoc, Msg, Tx};

use crate::assets::AssetsModule;
use crate::avs::AvsModule;
use crate::delegation::DelegationModule;
use crate::dogfood::DogfoodModule;
use crate::epochs::EpochsModule;
use crate::error::{ModuleError, Phase, RegistrarError};
use crate::exomint::ExomintModule;
use crate::operator::OperatorModule;

/// Every projector, in registration order.
#[derive(Debug, Clone)]
pub struct Registrar<S> {
    assets: AssetsModule<S>,
    delegation: DelegationModule<S>,
    dogfood: DogfoodModule<S>,
    operator: OperatorModule<S>,
    avs: AvsModule<S>,
    epochs: EpochsModule<S>,
    exomint: ExomintModule<S>,
}

/// Build an error tagger for one handler call.
fn failed_in(
    module: &'static str,
    phase: Phase,
    height: i64,
) -> impl FnOnce(ModuleError) -> RegistrarError {
    move |source| RegistrarError {
        module,
        phase,
        height,
        source: Box::new(source),
    }
}

impl<S: Store + Clone + 'static> Registrar<S> {
    /// Build every projector over one store and one set of chain sources.
    pub fn new(store: S, sources: &Sources) -> Self {
        Self {
            assets: AssetsModule::new(store.clone(), sources.assets.clone()),
            delegation: DelegationModule::new(store.clone(), sources.delegation.clone()),
            dogfood: DogfoodModule::new(store.clone(), sources.dogfood.clone()),
            operator: OperatorModule::new(store.clone()),
            avs: AvsModule::new(store.clone()),
            epochs: EpochsModule::new(store.clone(), sources.epochs.clone()),
            exomint: ExomintModule::new(store, sources.exomint.clone()),
        }
    }

    /// Projector names in registration order.
    pub const fn module_names(&self) -> [&'static str; 7] {
        [
            self.assets.name(),
            self.delegation.name(),
            self.dogfood.name(),
            self.operator.name(),
            self.avs.name(),
            self.epochs.name(),
            self.exomint.name(),
        ]
    }

    /// The `x/dogfood` projector, for out-of-band validator refreshes.
    pub const fn dogfood(&self) -> &DogfoodModule<S> {
        &self.dogfood
    }

    /// Load every projector's genesis section, in registration order.
    pub async fn handle_genesis(&self, doc: &GenesisDoc) -> Result<(), RegistrarError> {
        let height = doc.initial_height;
        tracing::info!(chain_id = %doc.chain_id, height, "Loading genesis");

        self.assets
            .handle_genesis(doc)
            .await
            .map_err(failed_in(self.assets.name(), Phase::Genesis, height))?;
        self.delegation
            .handle_genesis(doc)
            .await
            .map_err(failed_in(self.delegation.name(), Phase::Genesis, height))?;
        self.dogfood
            .handle_genesis(doc)
            .await
            .map_err(failed_in(self.dogfood.name(), Phase::Genesis, height))?;
        self.operator
            .handle_genesis(doc)
            .await
            .map_err(failed_in(self.operator.name(), Phase::Genesis, height))?;
        self.avs
            .handle_genesis(doc)
            .await
            .map_err(failed_in(self.avs.name(), Phase::Genesis, height))?;
        self.epochs
            .handle_genesis(doc)
            .await
            .map_err(failed_in(self.epochs.name(), Phase::Genesis, height))?;
        self.exomint
            .handle_genesis(doc)
            .await
            .map_err(failed_in(self.exomint.name(), Phase::Genesis, height))?;
        Ok(())
    }

    /// Process one block: begin-block events, its transactions, then
    /// end-block events.
    pub async fn handle_block(
        &self,
        block: &Block,
        results: &BlockResults,
        txs: &[Tx],
    ) -> Result<(), RegistrarError> {
        tracing::debug!(height = block.height, txs = txs.len(), "Processing block");
        self.run_begin_block(block, results).await?;
        for tx in txs {
            self.handle_tx(tx).await?;
        }
        self.run_end_block(block, results).await
    }

    /// Process one transaction: events first, then messages.
    pub async fn handle_tx(&self, tx: &Tx) -> Result<(), RegistrarError> {
        let height = tx.height;
        self.assets
            .handle_tx(tx)
            .await
            .map_err(failed_in(self.assets.name(), Phase::Tx, height))?;
        self.delegation
            .handle_tx(tx)
            .await
            .map_err(failed_in(self.delegation.name(), Phase::Tx, height))?;
        self.dogfood
            .handle_tx(tx)
            .await
            .map_err(failed_in(self.dogfood.name(), Phase::Tx, height))?;
        self.operator
            .handle_tx(tx)
            .await
            .map_err(failed_in(self.operator.name(), Phase::Tx, height))?;
        self.avs
            .handle_tx(tx)
            .await
            .map_err(failed_in(self.avs.name(), Phase::Tx, height))?;

        for msg in &tx.messages {
            self.handle_msg(msg, tx).await?;
        }
        Ok(())
    }

    async fn handle_msg(&self, msg: &Msg, tx: &Tx) -> Result<(), RegistrarError> {
        let height = tx.height;
        self.assets
            .handle_msg(msg, tx)
            .await
            .map_err(failed_in(self.assets.name(), Phase::Msg, height))?;
        self.dogfood
            .handle_msg(msg, tx)
            .await
            .map_err(failed_in(self.dogfood.name(), Phase::Msg, height))?;
        self.exomint
            .handle_msg(msg, tx)
            .await
            .map_err(failed_in(self.exomint.name(), Phase::Msg, height))?;
        Ok(())
    }

    async fn run_begin_block(&self, block: &Block, results: &BlockResults) -> Result<(), RegistrarError> {
        let events = &results.begin_block_events;
        let height = block.height;
        self.delegation
            .handle_begin_block(block, events)
            .await
            .map_err(failed_in(self.delegation.name(), Phase::BeginBlock, height))?;
        self.dogfood
            .handle_begin_block(block, events)
            .await
            .map_err(failed_in(self.dogfood.name(), Phase::BeginBlock, height))?;
        self.operator
            .handle_begin_block(block, events)
            .await
            .map_err(failed_in(self.operator.name(), Phase::BeginBlock, height))?;
        self.avs
            .handle_begin_block(block, events)
            .await
            .map_err(failed_in(self.avs.name(), Phase::BeginBlock, height))?;
        self.epochs
            .handle_begin_block(block, events)
            .await
            .map_err(failed_in(self.epochs.name(), Phase::BeginBlock, height))?;
        self.exomint
            .handle_begin_block(block, events)
            .await
            .map_err(failed_in(self.exomint.name(), Phase::BeginBlock, height))?;
        Ok(())
    }

    async fn run_end_block(&self, block: &Block, results: &BlockResults) -> Result<(), RegistrarError> {
        let events = &results.end_block_events;
        let height = block.height;
        self.assets
            .handle_end_block(block, events)
            .await
            .map_err(failed_in(self.assets.name(), Phase::EndBlock, height))?;
        self.delegation
            .handle_end_block(block, events)
            .await
            .map_err(failed_in(self.delegation.name(), Phase::EndBlock, height))?;
        self.dogfood
            .handle_end_block(block, events)
            .await
            .map_err(failed_in(self.dogfood.name(), Phase::EndBlock, height))?;
        self.operator
            .handle_end_block(block, events)
            .await
            .map_err(failed_in(self.operator.name(), Phase::EndBlock, height))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::testing::{block, genesis, sources, tx};
    use exocore_db::{DelegationStore, MemoryStore};
    use exocore_types::Event;
    use exocore_types::event_types::{delegation as dev, epochs as eev};

    fn registrar(store: &MemoryStore) -> Registrar<MemoryStore> {
        Registrar::new(store.clone(), &sources(Vec::new()))
    }

    #[test]
    fn modules_register_in_order() {
        let names = registrar(&MemoryStore::new()).module_names();
        assert_eq!(
            names,
            ["assets", "delegation", "dogfood", "operator", "avs", "epochs", "exomint"]
        );
    }

    #[tokio::test]
    async fn failures_name_module_phase_and_height() {
        let store = MemoryStore::new();
        let results = BlockResults {
            begin_block_events: vec![Event::new(
                eev::EPOCH_END,
                [(eev::ATTR_EPOCH_IDENTIFIER, "hour")],
            )],
            end_block_events: Vec::new(),
        };
        let err = registrar(&store)
            .handle_block(&block(77), &results, &[])
            .await
            .unwrap_err();
        assert_eq!(err.module, "epochs");
        assert_eq!(err.phase, Phase::BeginBlock);
        assert_eq!(err.height, 77);
        assert!(err.to_string().contains("epochs begin block handler failed at height 77"));
    }

    #[tokio::test]
    async fn transactions_run_between_begin_and_end() {
        let store = MemoryStore::new();
        let started = Event::new(
            dev::UNDELEGATION_STARTED,
            [
                (dev::ATTR_STAKER_ID, "s1"),
                (dev::ATTR_ASSET_ID, "0xabc_0x1"),
                (dev::ATTR_OPERATOR_ADDR, "op1"),
                (dev::ATTR_RECORD_ID, "r1"),
                (dev::ATTR_AMOUNT, "10"),
                (dev::ATTR_COMPLETED_EPOCH_ID, "hour"),
                (dev::ATTR_COMPLETED_EPOCH_NUMBER, "3"),
                (dev::ATTR_UNDELEGATION_ID, "1"),
                (dev::ATTR_TX_HASH, "0xtx9"),
                (dev::ATTR_BLOCK_NUMBER, "9"),
            ],
        );
        // The record only exists once the tx has run, so the end-block
        // maturity can only succeed if it is applied after the tx.
        let results = BlockResults {
            begin_block_events: Vec::new(),
            end_block_events: vec![Event::new(
                dev::UNDELEGATION_MATURED,
                [(dev::ATTR_RECORD_ID, "r1"), (dev::ATTR_AMOUNT, "10")],
            )],
        };
        registrar(&store)
            .handle_block(&block(9), &results, &[tx(9, vec![started])])
            .await
            .unwrap();

        let record = store.get_undelegation_record("r1").await.unwrap().unwrap();
        assert_eq!(record.maturity_height, Some(9));
    }

    #[tokio::test]
    async fn empty_genesis_loads_nothing() {
        let store = MemoryStore::new();
        registrar(&store)
            .handle_genesis(&genesis(serde_json::json!({})))
            .await
            .unwrap();
    }
}
