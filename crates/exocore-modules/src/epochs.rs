//! `x/epochs` projector.
//!
//! Epoch end events only name the epoch; the new state is read from the
//! chain at the block height and saved behind the store's monotonic guard.

use exocore_db::Store;
use exocore_source::EpochsSource;
use exocore_types::epochs::EpochsGenesis;
use exocore_types::event_types::epochs as ev;
use exocore_types::{Block, BlockResults, Event, GenesisDoc, find_events_by_type};

use crate::error::ModuleError;
use crate::genesis_section;

/// Projector for `x/epochs`.
#[derive(Debug, Clone)]
pub struct EpochsModule<S> {
    store: S,
    source: EpochsSource,
}

impl<S: Store> EpochsModule<S> {
    /// Module name, also the genesis app-state key.
    pub const NAME: &'static str = "epochs";

    /// Build the projector.
    pub const fn new(store: S, source: EpochsSource) -> Self {
        Self { store, source }
    }

    /// Module name.
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Save epoch definitions, then each epoch's initial state.
    pub async fn handle_genesis(&self, doc: &GenesisDoc) -> Result<(), ModuleError> {
        tracing::debug!(module = Self::NAME, "Parsing genesis");
        let Some(genesis) = genesis_section::<EpochsGenesis>(doc, Self::NAME)? else {
            return Ok(());
        };

        self.store.save_epoch_definitions(&genesis.epochs).await?;
        for epoch in &genesis.epochs {
            self.store.save_epoch_state(epoch).await?;
        }

        tracing::info!(module = Self::NAME, epochs = genesis.epochs.len(), "Genesis loaded");
        Ok(())
    }

    /// Apply begin-block events: refresh every epoch that just ended.
    pub async fn handle_begin_block(&self, block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        let ended = find_events_by_type(events, ev::EPOCH_END);
        if ended.is_empty() {
            return Ok(());
        }
        tracing::debug!(module = Self::NAME, height = block.height, "Updating epoch states");
        for event in ended {
            let identifier = event.attribute(ev::ATTR_EPOCH_IDENTIFIER)?;
            let epoch = self.source.get_epoch_info(block.height, identifier).await?;
            let advanced = self.store.save_epoch_state(&epoch).await?;
            if advanced {
                tracing::info!(
                    identifier,
                    current_epoch = epoch.current_epoch,
                    "Epoch advanced"
                );
            } else {
                tracing::debug!(
                    identifier,
                    current_epoch = epoch.current_epoch,
                    "Stale epoch state ignored"
                );
            }
        }
        Ok(())
    }

    /// Apply a block's events. `x/epochs` tracks nothing from `EndBlock`.
    pub async fn handle_block(&self, block: &Block, results: &BlockResults) -> Result<(), ModuleError> {
        self.handle_begin_block(block, &results.begin_block_events).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{block, genesis, snapshot, sources};
    use chrono::{TimeZone, Utc};
    use exocore_db::{EpochsStore, MemoryStore};
    use exocore_source::{ChainSnapshot, SourceError};
    use exocore_types::EpochInfo;

    fn hour(current_epoch: i64, start_height: i64) -> EpochInfo {
        EpochInfo {
            identifier: String::from("hour"),
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            duration: String::from("3600s"),
            current_epoch,
            current_epoch_start_time: Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap(),
            epoch_counting_started: true,
            current_epoch_start_height: start_height,
        }
    }

    fn module(store: &MemoryStore, snapshots: Vec<ChainSnapshot>) -> EpochsModule<MemoryStore> {
        EpochsModule::new(store.clone(), sources(snapshots).epochs)
    }

    fn epoch_end() -> BlockResults {
        BlockResults {
            begin_block_events: vec![Event::new(
                ev::EPOCH_END,
                [(ev::ATTR_EPOCH_IDENTIFIER, "hour")],
            )],
            end_block_events: Vec::new(),
        }
    }

    #[tokio::test]
    async fn epoch_end_reads_state_at_the_block_height() {
        let store = MemoryStore::new();
        let mut at = snapshot(300);
        at.epochs = vec![hour(6, 300)];
        module(&store, vec![at])
            .handle_block(&block(300), &epoch_end())
            .await
            .unwrap();

        let state = store.get_epoch_state("hour").await.unwrap().unwrap();
        assert_eq!(state.current_epoch, 6);
        assert_eq!(state.current_epoch_start_height, 300);
    }

    #[tokio::test]
    async fn replayed_epoch_end_does_not_regress() {
        let store = MemoryStore::new();
        store.save_epoch_state(&hour(9, 900)).await.unwrap();

        let mut at = snapshot(300);
        at.epochs = vec![hour(6, 300)];
        module(&store, vec![at])
            .handle_block(&block(300), &epoch_end())
            .await
            .unwrap();

        let state = store.get_epoch_state("hour").await.unwrap().unwrap();
        assert_eq!(state.current_epoch, 9);
    }

    #[tokio::test]
    async fn unknown_epoch_is_a_source_error() {
        let store = MemoryStore::new();
        let err = module(&store, vec![snapshot(300)])
            .handle_block(&block(300), &epoch_end())
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::Source(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn genesis_saves_definitions_and_states() {
        let store = MemoryStore::new();
        let doc = genesis(serde_json::json!({
            "epochs": { "epochs": [{
                "identifier": "day",
                "start_time": "2024-01-01T00:00:00Z",
                "duration": "86400s",
                "current_epoch": "2",
                "current_epoch_start_time": "2024-01-02T00:00:00Z",
                "epoch_counting_started": true,
                "current_epoch_start_height": "40"
            }]}
        }));
        module(&store, Vec::new()).handle_genesis(&doc).await.unwrap();

        let state = store.get_epoch_state("day").await.unwrap().unwrap();
        assert_eq!(state.duration, "86400s");
        assert_eq!(state.current_epoch, 2);
    }
}
