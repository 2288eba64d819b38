//! `x/exomint` projector: params and per-epoch mint history.

use exocore_db::Store;
use exocore_source::ExomintSource;
use exocore_types::event_types::exomint as ev;
use exocore_types::exomint::ExomintGenesis;
use exocore_types::{Block, BlockResults, Event, GenesisDoc, MintHistory, Msg, Tx, find_events_by_type};

use crate::error::ModuleError;
use crate::genesis_section;

/// Projector for `x/exomint`.
#[derive(Debug, Clone)]
pub struct ExomintModule<S> {
    store: S,
    source: ExomintSource,
}

impl<S: Store> ExomintModule<S> {
    /// Module name, also the genesis app-state key.
    pub const NAME: &'static str = "exomint";

    /// Build the projector.
    pub const fn new(store: S, source: ExomintSource) -> Self {
        Self { store, source }
    }

    /// Module name.
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Save the genesis params at the initial height.
    pub async fn handle_genesis(&self, doc: &GenesisDoc) -> Result<(), ModuleError> {
        tracing::debug!(module = Self::NAME, "Parsing genesis");
        let Some(genesis) = genesis_section::<ExomintGenesis>(doc, Self::NAME)? else {
            return Ok(());
        };
        self.store
            .save_exomint_params(&genesis.params, doc.initial_height)
            .await?;
        tracing::info!(module = Self::NAME, "Genesis loaded");
        Ok(())
    }

    /// Apply begin-block events: one history row per mint.
    pub async fn handle_begin_block(&self, block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::MINT) {
            let history = MintHistory {
                block_height: block.height,
                quantity_minted: event.int(ev::ATTR_AMOUNT)?,
                epoch_id: event.attribute(ev::ATTR_EPOCH_IDENTIFIER)?.to_owned(),
                epoch_number: event.i64(ev::ATTR_EPOCH_NUMBER)?,
                denom: event.attribute(ev::ATTR_DENOM)?.to_owned(),
            };
            self.store.append_mint_history(&history).await?;
            tracing::debug!(
                height = block.height,
                epoch_id = %history.epoch_id,
                epoch_number = history.epoch_number,
                amount = %history.quantity_minted,
                "Mint recorded"
            );
        }
        Ok(())
    }

    /// Apply a block's events. `x/exomint` tracks nothing from `EndBlock`.
    pub async fn handle_block(&self, block: &Block, results: &BlockResults) -> Result<(), ModuleError> {
        self.handle_begin_block(block, &results.begin_block_events).await
    }

    /// React to a message. A params update is re-read from the chain.
    pub async fn handle_msg(&self, msg: &Msg, tx: &Tx) -> Result<(), ModuleError> {
        if matches!(msg, Msg::ExomintUpdateParams) {
            let params = self.source.get_params(tx.height).await?;
            self.store.save_exomint_params(&params, tx.height).await?;
            tracing::info!(module = Self::NAME, height = tx.height, "Params updated");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{block, genesis, snapshot, sources, tx};
    use exocore_db::{ExomintStore, MemoryStore};
    use exocore_types::Int;

    fn mint(amount: &str, epoch_number: &str) -> Event {
        Event::new(
            ev::MINT,
            [
                (ev::ATTR_AMOUNT, amount),
                (ev::ATTR_EPOCH_IDENTIFIER, "day"),
                (ev::ATTR_EPOCH_NUMBER, epoch_number),
                (ev::ATTR_DENOM, "hua"),
            ],
        )
    }

    #[tokio::test]
    async fn replayed_mint_overwrites_the_same_epoch() {
        let store = MemoryStore::new();
        let exomint = ExomintModule::new(store.clone(), sources(Vec::new()).exomint);
        let results = BlockResults {
            begin_block_events: vec![mint("100", "3")],
            end_block_events: Vec::new(),
        };
        exomint.handle_block(&block(30), &results).await.unwrap();
        exomint.handle_block(&block(30), &results).await.unwrap();

        let history = store.get_mint_history("day", 3).await.unwrap().unwrap();
        assert_eq!(history.block_height, 30);
        assert_eq!(history.quantity_minted, Int::from(100_u64));
        assert_eq!(history.denom, "hua");
    }

    #[tokio::test]
    async fn non_numeric_epoch_number_is_rejected() {
        let store = MemoryStore::new();
        let results = BlockResults {
            begin_block_events: vec![mint("100", "three")],
            end_block_events: Vec::new(),
        };
        let err = ExomintModule::new(store.clone(), sources(Vec::new()).exomint)
            .handle_block(&block(30), &results)
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::Event(_)));
    }

    #[tokio::test]
    async fn params_follow_genesis_then_updates() {
        let store = MemoryStore::new();
        let mut at = snapshot(50);
        at.exomint_params = Some(serde_json::json!({ "mint_denom": "hua", "epoch_reward": "5" }));
        let exomint = ExomintModule::new(store.clone(), sources(vec![at]).exomint);

        let doc = genesis(serde_json::json!({
            "exomint": { "params": { "mint_denom": "hua", "epoch_reward": "1" } }
        }));
        exomint.handle_genesis(&doc).await.unwrap();
        let (params, height) = store.get_exomint_params().await.unwrap().unwrap();
        assert_eq!(params["epoch_reward"], "1");
        assert_eq!(height, 1);

        let update = tx(50, Vec::new());
        exomint
            .handle_msg(&Msg::ExomintUpdateParams, &update)
            .await
            .unwrap();
        let (params, height) = store.get_exomint_params().await.unwrap().unwrap();
        assert_eq!(params["epoch_reward"], "5");
        assert_eq!(height, 50);
    }
}
