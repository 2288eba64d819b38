//! `x/avs` projector: registered AVSs and the chain id to AVS mapping.
//!
//! The chain's own AVS is created by `x/dogfood` in `BeginBlock`; every
//! other AVS is created by a transaction.

use exocore_db::Store;
use exocore_types::avs::AvsGenesis;
use exocore_types::event_types::{avs as ev, dogfood as dogfood_ev};
use exocore_types::{Block, BlockResults, Event, GenesisDoc, Tx, find_events_by_type};

use crate::error::ModuleError;
use crate::genesis_section;

/// Projector for `x/avs`.
#[derive(Debug, Clone)]
pub struct AvsModule<S> {
    store: S,
}

impl<S: Store> AvsModule<S> {
    /// Module name, also the genesis app-state key.
    pub const NAME: &'static str = "avs";

    /// Build the projector.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Module name.
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Load AVS addresses and chain mappings. Addresses are lower-cased.
    pub async fn handle_genesis(&self, doc: &GenesisDoc) -> Result<(), ModuleError> {
        tracing::debug!(module = Self::NAME, "Parsing genesis");
        let Some(genesis) = genesis_section::<AvsGenesis>(doc, Self::NAME)? else {
            return Ok(());
        };

        for info in &genesis.avs_infos {
            self.store
                .save_avs(&info.avs_address.to_lowercase())
                .await?;
        }
        for info in &genesis.chain_id_infos {
            self.store
                .save_chain_id_to_avs(&info.chain_id, &info.avs_address.to_lowercase())
                .await?;
        }

        tracing::info!(
            module = Self::NAME,
            avs = genesis.avs_infos.len(),
            chain_avs = genesis.chain_id_infos.len(),
            "Genesis loaded"
        );
        Ok(())
    }

    /// Apply begin-block events: creation of the chain's own AVS.
    pub async fn handle_begin_block(&self, _block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, dogfood_ev::DOGFOOD_AVS_CREATED) {
            let avs_addr = event.attribute(dogfood_ev::ATTR_AVS_ADDRESS)?;
            let chain_id = event.attribute(dogfood_ev::ATTR_CHAIN_ID_WITHOUT_REV)?;
            self.store.save_avs(avs_addr).await?;
            self.store.save_chain_id_to_avs(chain_id, avs_addr).await?;
            tracing::info!(avs = avs_addr, chain_id, "Dogfood AVS created");
        }
        Ok(())
    }

    /// Apply a block's events. `x/avs` tracks nothing from `EndBlock`.
    pub async fn handle_block(&self, block: &Block, results: &BlockResults) -> Result<(), ModuleError> {
        self.handle_begin_block(block, &results.begin_block_events).await
    }

    /// Apply a transaction's events.
    pub async fn handle_tx(&self, tx: &Tx) -> Result<(), ModuleError> {
        for event in find_events_by_type(&tx.events, ev::AVS_CREATED) {
            self.store
                .save_avs(event.attribute(ev::ATTR_AVS_ADDRESS)?)
                .await?;
        }
        for event in find_events_by_type(&tx.events, ev::CHAIN_AVS_CREATED) {
            let chain_id = event.attribute(ev::ATTR_CHAIN_ID)?;
            let avs_addr = event.attribute(ev::ATTR_AVS_ADDRESS)?;
            self.store.save_chain_id_to_avs(chain_id, avs_addr).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{block, genesis, tx};
    use exocore_db::{AvsStore, MemoryStore};

    #[tokio::test]
    async fn dogfood_avs_is_saved_with_its_chain() {
        let store = MemoryStore::new();
        let results = BlockResults {
            begin_block_events: vec![Event::new(
                dogfood_ev::DOGFOOD_AVS_CREATED,
                [
                    (dogfood_ev::ATTR_AVS_ADDRESS, "0xdog"),
                    (dogfood_ev::ATTR_CHAIN_ID_WITHOUT_REV, "exocoretestnet"),
                ],
            )],
            end_block_events: Vec::new(),
        };
        AvsModule::new(store.clone())
            .handle_block(&block(1), &results)
            .await
            .unwrap();

        assert!(store.has_avs("0xdog").await.unwrap());
        assert_eq!(
            store.get_chain_avs("exocoretestnet").await.unwrap().as_deref(),
            Some("0xdog")
        );
    }

    #[tokio::test]
    async fn chain_avs_event_maps_without_registering() {
        let store = MemoryStore::new();
        let events = vec![Event::new(
            ev::CHAIN_AVS_CREATED,
            [(ev::ATTR_CHAIN_ID, "c1"), (ev::ATTR_AVS_ADDRESS, "0xabc")],
        )];
        AvsModule::new(store.clone())
            .handle_tx(&tx(2, events))
            .await
            .unwrap();

        assert_eq!(store.get_chain_avs("c1").await.unwrap().as_deref(), Some("0xabc"));
        assert!(!store.has_avs("0xabc").await.unwrap());
    }

    #[tokio::test]
    async fn genesis_lowercases_addresses() {
        let store = MemoryStore::new();
        let doc = genesis(serde_json::json!({
            "avs": {
                "avs_infos": [{ "avs_address": "0xABCD" }],
                "chain_id_infos": [{ "chain_id": "c1", "avs_address": "0xABCD" }]
            }
        }));
        AvsModule::new(store.clone()).handle_genesis(&doc).await.unwrap();

        assert!(store.has_avs("0xabcd").await.unwrap());
        assert_eq!(store.get_chain_avs("c1").await.unwrap().as_deref(), Some("0xabcd"));
    }
}
