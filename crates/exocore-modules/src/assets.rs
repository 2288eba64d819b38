//! `x/assets` projector: client chains, tokens, staker and operator balances.
//!
//! Client chain and token registrations only happen in transactions. Staker
//! and operator balance events are emitted both by transactions and by
//! `EndBlock` (undelegation maturity), so the same handlers serve both.

use exocore_db::Store;
use exocore_source::AssetsSource;
use exocore_types::assets::AssetsGenesis;
use exocore_types::event_types::assets as ev;
use exocore_types::{
    AssetToken, Block, BlockResults, ClientChain, Event, GenesisDoc, Msg, OperatorAsset,
    StakerAsset, Tx, find_events_by_type,
};

use crate::error::ModuleError;
use crate::genesis_section;

/// Projector for `x/assets`.
#[derive(Debug, Clone)]
pub struct AssetsModule<S> {
    store: S,
    source: AssetsSource,
}

impl<S: Store> AssetsModule<S> {
    /// Module name, also the genesis app-state key.
    pub const NAME: &'static str = "assets";

    /// Build the projector.
    pub const fn new(store: S, source: AssetsSource) -> Self {
        Self { store, source }
    }

    /// Module name.
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Load params, client chains, tokens, deposits and operator balances.
    pub async fn handle_genesis(&self, doc: &GenesisDoc) -> Result<(), ModuleError> {
        tracing::debug!(module = Self::NAME, "Parsing genesis");
        let Some(genesis) = genesis_section::<AssetsGenesis>(doc, Self::NAME)? else {
            return Ok(());
        };
        let height = doc.initial_height;

        self.store
            .save_assets_params(&genesis.params, height)
            .await?;

        for chain in &genesis.client_chains {
            self.store.save_client_chain(chain).await?;
        }

        for token in &genesis.tokens {
            self.store.save_token(&token.to_token()).await?;
        }

        for staker in &genesis.deposits {
            for deposit in &staker.deposits {
                let asset = StakerAsset {
                    staker_id: staker.staker_id.clone(),
                    asset_id: deposit.asset_id.clone(),
                    deposited: deposit.info.total_deposit_amount,
                    withdrawable: deposit.info.withdrawable_amount,
                    pending_undelegation: deposit.info.pending_undelegation_amount,
                };
                self.store.save_staker_asset(&asset, height).await?;
            }
        }

        for operator in &genesis.operator_assets {
            for state in &operator.assets_state {
                let asset = OperatorAsset {
                    operator_addr: operator.operator.clone(),
                    asset_id: state.asset_id.clone(),
                    total_amount: state.info.total_amount,
                    pending_undelegation: state.info.pending_undelegation_amount,
                    total_share: state.info.total_share,
                    self_share: state.info.operator_share,
                };
                self.store.save_operator_asset(&asset, height).await?;
            }
        }

        tracing::info!(
            module = Self::NAME,
            client_chains = genesis.client_chains.len(),
            tokens = genesis.tokens.len(),
            stakers = genesis.deposits.len(),
            operators = genesis.operator_assets.len(),
            "Genesis loaded"
        );
        Ok(())
    }

    /// Apply end-block events: balances changed by undelegation maturity.
    pub async fn handle_end_block(&self, block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        self.handle_staker_assets(block.height, events).await?;
        self.handle_operator_assets(block.height, events).await
    }

    /// Apply a block's events. `x/assets` tracks nothing from `BeginBlock`.
    pub async fn handle_block(&self, block: &Block, results: &BlockResults) -> Result<(), ModuleError> {
        self.handle_end_block(block, &results.end_block_events).await
    }

    /// Apply a transaction's events.
    pub async fn handle_tx(&self, tx: &Tx) -> Result<(), ModuleError> {
        self.handle_client_chains(&tx.events, ev::NEW_CLIENT_CHAIN).await?;
        self.handle_client_chains(&tx.events, ev::UPDATED_CLIENT_CHAIN).await?;
        self.handle_new_tokens(&tx.events).await?;
        self.handle_updated_tokens(&tx.events).await?;
        self.handle_staking_totals(&tx.events).await?;
        self.handle_staker_assets(tx.height, &tx.events).await?;
        self.handle_operator_assets(tx.height, &tx.events).await
    }

    /// React to a message. A params update is re-read from the chain.
    pub async fn handle_msg(&self, msg: &Msg, tx: &Tx) -> Result<(), ModuleError> {
        if matches!(msg, Msg::AssetsUpdateParams) {
            let params = self.source.get_params(tx.height).await?;
            self.store.save_assets_params(&params, tx.height).await?;
            tracing::info!(module = Self::NAME, height = tx.height, "Params updated");
        }
        Ok(())
    }

    // =========================================================================
    // Event handlers
    // =========================================================================

    async fn handle_client_chains(&self, events: &[Event], kind: &str) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, kind) {
            let chain = ClientChain {
                name: event.attribute(ev::ATTR_NAME)?.to_owned(),
                meta_info: event.attribute(ev::ATTR_META_INFO)?.to_owned(),
                chain_id: event.i64(ev::ATTR_CHAIN_ID)?,
                exocore_chain_index: event.i64(ev::ATTR_EXOCORE_CHAIN_INDEX)?,
                finalization_blocks: event.i64(ev::ATTR_FINALIZATION_BLOCKS)?,
                layer_zero_chain_id: event.i64(ev::ATTR_LZ_ID)?,
                signature_type: event.attribute(ev::ATTR_SIG_TYPE)?.to_owned(),
                address_length: event.i64(ev::ATTR_ADDR_LENGTH)?,
            };
            self.store.save_client_chain(&chain).await?;
        }
        Ok(())
    }

    async fn handle_new_tokens(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::NEW_TOKEN) {
            let token = AssetToken {
                asset_id: event.attribute(ev::ATTR_ASSET_ID)?.to_owned(),
                name: event.attribute(ev::ATTR_NAME)?.to_owned(),
                symbol: event.attribute(ev::ATTR_SYMBOL)?.to_owned(),
                address: event.attribute(ev::ATTR_ADDRESS)?.to_owned(),
                decimals: event.i64(ev::ATTR_DECIMALS)?,
                layer_zero_chain_id: event.i64(ev::ATTR_LZ_ID)?,
                exocore_chain_index: event.i64(ev::ATTR_EXOCORE_CHAIN_INDEX)?,
                meta_info: event.attribute(ev::ATTR_META_INFO)?.to_owned(),
                staking_total_amount: event.int(ev::ATTR_TOTAL_AMOUNT)?,
            };
            self.store.save_token(&token).await?;
        }
        Ok(())
    }

    /// Only the metadata of a registered token can change.
    async fn handle_updated_tokens(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UPDATED_TOKEN) {
            let asset_id = event.attribute(ev::ATTR_ASSET_ID)?;
            let meta_info = event.attribute(ev::ATTR_META_INFO)?;
            self.store.update_token_meta_info(asset_id, meta_info).await?;
        }
        Ok(())
    }

    async fn handle_staking_totals(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UPDATED_STAKING_TOTAL_AMOUNT) {
            let total = event.int(ev::ATTR_TOTAL_AMOUNT)?;
            let asset_id = event.attribute(ev::ATTR_ASSET_ID)?;
            self.store.update_token_staking_total(asset_id, total).await?;
        }
        Ok(())
    }

    async fn handle_staker_assets(&self, height: i64, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UPDATED_STAKER_ASSET) {
            let asset = StakerAsset {
                staker_id: event.attribute(ev::ATTR_STAKER_ID)?.to_owned(),
                asset_id: event.attribute(ev::ATTR_ASSET_ID)?.to_owned(),
                deposited: event.int(ev::ATTR_DEPOSIT_AMOUNT)?,
                withdrawable: event.int(ev::ATTR_WITHDRAWABLE_AMOUNT)?,
                pending_undelegation: event.int(ev::ATTR_PENDING_UNDELEGATION_AMOUNT)?,
            };
            self.store.save_staker_asset(&asset, height).await?;
        }
        Ok(())
    }

    async fn handle_operator_assets(&self, height: i64, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UPDATED_OPERATOR_ASSET) {
            let asset = OperatorAsset {
                operator_addr: event.attribute(ev::ATTR_OPERATOR_ADDRESS)?.to_owned(),
                asset_id: event.attribute(ev::ATTR_ASSET_ID)?.to_owned(),
                total_amount: event.int(ev::ATTR_TOTAL_AMOUNT)?,
                pending_undelegation: event.int(ev::ATTR_PENDING_UNDELEGATION_AMOUNT)?,
                total_share: event.dec(ev::ATTR_TOTAL_SHARE)?,
                self_share: event.dec(ev::ATTR_OPERATOR_SHARE)?,
            };
            self.store.save_operator_asset(&asset, height).await?;
        }
        Ok(())
    }
}
