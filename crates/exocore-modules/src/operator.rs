//! `x/operator` projector: registrations, consensus keys, AVS opt-ins and
//! USD valuations.
//!
//! Opt-info and valuation events come from both transactions and
//! `BeginBlock` (jailing, epoch changes), so one set of shared handlers
//! serves both. Consensus key removal completes in `EndBlock`, driven by
//! `x/dogfood`.

use exocore_db::Store;
use exocore_types::event_types::operator as ev;
use exocore_types::keys::{consensus_address, normalize_pubkey_hex, split_pair};
use exocore_types::operator::{OperatorGenesis, parse_chain_time, parse_opt_out_height};
use exocore_types::{
    AvsUsdValue, Block, BlockResults, Event, GenesisDoc, Operator, OperatorUsdValue, OptedState,
    Tx, find_events_by_type,
};

use crate::error::ModuleError;
use crate::genesis_section;

/// Projector for `x/operator`.
#[derive(Debug, Clone)]
pub struct OperatorModule<S> {
    store: S,
}

impl<S: Store> OperatorModule<S> {
    /// Module name, also the genesis app-state key.
    pub const NAME: &'static str = "operator";

    /// Build the projector.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Module name.
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Load operators, consensus keys, opt-in states, valuations, previous
    /// keys and pending key removals, in that order.
    pub async fn handle_genesis(&self, doc: &GenesisDoc) -> Result<(), ModuleError> {
        tracing::debug!(module = Self::NAME, "Parsing genesis");
        let Some(genesis) = genesis_section::<OperatorGenesis>(doc, Self::NAME)? else {
            return Ok(());
        };

        for operator in &genesis.operators {
            self.store
                .save_operator_detail(&operator.operator_info.to_operator())
                .await?;
        }

        for record in &genesis.operator_records {
            for chain in &record.chains {
                let cons_addr = consensus_address(&chain.consensus_key)?;
                self.store
                    .save_operator_cons_key(
                        &record.operator_address,
                        &chain.chain_id,
                        &normalize_pubkey_hex(&chain.consensus_key),
                        &cons_addr,
                    )
                    .await?;
            }
        }

        for state in &genesis.opt_states {
            let (operator_addr, avs_addr) = split_pair(&state.key)?;
            let info = &state.opt_info;
            let opt_in_height = i64::try_from(info.opted_in_height).map_err(|e| {
                ModuleError::InvalidAttribute {
                    field: "opted_in_height",
                    value: info.opted_in_height.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let opted = OptedState {
                operator_addr,
                avs_addr,
                slash_contract: info.slash_contract.clone(),
                opt_in_height,
                // u64::MAX means still opted in and does not fit.
                opt_out_height: i64::try_from(info.opted_out_height).ok(),
                jailed: info.jailed,
            };
            self.store.save_opted_state(&opted).await?;
        }

        for value in &genesis.operator_usd_values {
            let (avs_addr, operator_addr) = split_pair(&value.key)?;
            let usd = &value.opted_usd_value;
            self.store
                .save_operator_usd_value(&OperatorUsdValue {
                    operator_addr,
                    avs_addr,
                    self_usd_value: usd.self_usd_value,
                    total_usd_value: usd.total_usd_value,
                    active_usd_value: usd.active_usd_value,
                })
                .await?;
        }

        for value in &genesis.avs_usd_values {
            self.store
                .save_avs_usd_value(&AvsUsdValue {
                    avs_addr: value.avs_addr.clone(),
                    usd_value: value.value.amount,
                })
                .await?;
        }

        for prev in &genesis.pre_cons_keys {
            let (chain_id, operator_addr) = split_pair(&prev.key)?;
            let cons_addr = consensus_address(&prev.consensus_key)?;
            self.store
                .save_operator_prev_cons_key(
                    &operator_addr,
                    &chain_id,
                    &normalize_pubkey_hex(&prev.consensus_key),
                    &cons_addr,
                )
                .await?;
        }

        for removal in &genesis.operator_key_removals {
            let (operator_addr, chain_id) = split_pair(&removal.key)?;
            self.store
                .mark_operator_key_removal(&operator_addr, &chain_id)
                .await?;
        }

        tracing::info!(
            module = Self::NAME,
            operators = genesis.operators.len(),
            opt_states = genesis.opt_states.len(),
            key_removals = genesis.operator_key_removals.len(),
            "Genesis loaded"
        );
        Ok(())
    }

    /// Apply begin-block events: jailing and valuation changes.
    pub async fn handle_begin_block(&self, _block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        self.handle_shared_events(events).await
    }

    /// Apply end-block events: completed key removals and cleared previous
    /// keys.
    pub async fn handle_end_block(&self, _block: &Block, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::END_REMOVE_CONS_KEY) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR)?;
            let chain_id = event.attribute(ev::ATTR_CHAIN_ID)?;
            self.store
                .remove_operator_cons_key(operator_addr, chain_id)
                .await?;
            tracing::debug!(operator = operator_addr, chain_id, "Consensus key removed");
        }
        for event in find_events_by_type(events, ev::REMOVE_PREV_CONS_KEY) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR)?;
            let chain_id = event.attribute(ev::ATTR_CHAIN_ID)?;
            self.store
                .clear_operator_prev_cons_key(operator_addr, chain_id)
                .await?;
        }
        Ok(())
    }

    /// Apply a block's begin- then end-block events.
    pub async fn handle_block(&self, block: &Block, results: &BlockResults) -> Result<(), ModuleError> {
        self.handle_begin_block(block, &results.begin_block_events).await?;
        self.handle_end_block(block, &results.end_block_events).await
    }

    /// Apply a transaction's events. Key removal is marked last so that an
    /// opt-out in the same transaction is already recorded.
    pub async fn handle_tx(&self, tx: &Tx) -> Result<(), ModuleError> {
        self.handle_registrations(&tx.events).await?;
        self.handle_opt_ins(&tx.events).await?;
        self.handle_set_cons_keys(&tx.events).await?;
        self.handle_set_prev_cons_keys(&tx.events).await?;
        self.handle_shared_events(&tx.events).await?;
        self.handle_init_key_removals(&tx.events).await
    }

    // =========================================================================
    // Transaction-only events
    // =========================================================================

    async fn handle_registrations(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::REGISTER_OPERATOR) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR)?;
            let raw_time = event.attribute(ev::ATTR_COMMISSION_UPDATE_TIME)?;
            let commission_update_time =
                parse_chain_time(raw_time).ok_or_else(|| ModuleError::InvalidAttribute {
                    field: "commission_update_time",
                    value: raw_time.to_owned(),
                    reason: String::from("not a chain timestamp"),
                })?;
            // Registration through the CLI sets both addresses to the sender.
            let operator = Operator {
                earnings_addr: operator_addr.to_owned(),
                approve_addr: operator_addr.to_owned(),
                meta_info: event.attribute(ev::ATTR_META_INFO)?.to_owned(),
                commission_rate: event.dec(ev::ATTR_COMMISSION_RATE)?,
                max_commission_rate: event.dec(ev::ATTR_MAX_COMMISSION_RATE)?,
                max_change_rate: event.dec(ev::ATTR_MAX_CHANGE_RATE)?,
                commission_update_time,
            };
            self.store.save_operator_detail(&operator).await?;
            tracing::info!(operator = operator_addr, "Operator registered");
        }
        Ok(())
    }

    /// An opt-in carries no opt-out height and is never jailed.
    async fn handle_opt_ins(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::OPT_IN) {
            let opted = OptedState {
                operator_addr: event.attribute(ev::ATTR_OPERATOR)?.to_owned(),
                avs_addr: event.attribute(ev::ATTR_AVS_ADDR)?.to_owned(),
                slash_contract: event.attribute(ev::ATTR_SLASH_CONTRACT)?.to_owned(),
                opt_in_height: event.i64(ev::ATTR_OPT_IN_HEIGHT)?,
                opt_out_height: None,
                jailed: false,
            };
            self.store.save_opted_state(&opted).await?;
        }
        Ok(())
    }

    async fn handle_set_cons_keys(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::SET_CONS_KEY) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR)?;
            let chain_id = event.attribute(ev::ATTR_CHAIN_ID)?;
            let cons_addr = event.attribute(ev::ATTR_CONSENSUS_ADDRESS)?;
            let key_hex = normalize_pubkey_hex(event.attribute(ev::ATTR_CONS_KEY_HEX)?);
            self.store
                .save_operator_cons_key(operator_addr, chain_id, &key_hex, cons_addr)
                .await?;
        }
        Ok(())
    }

    async fn handle_set_prev_cons_keys(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::SET_PREV_CONS_KEY) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR)?;
            let chain_id = event.attribute(ev::ATTR_CHAIN_ID)?;
            let cons_addr = event.attribute(ev::ATTR_CONSENSUS_ADDRESS)?;
            let key_hex = normalize_pubkey_hex(event.attribute(ev::ATTR_CONS_KEY_HEX)?);
            self.store
                .save_operator_prev_cons_key(operator_addr, chain_id, &key_hex, cons_addr)
                .await?;
        }
        Ok(())
    }

    async fn handle_init_key_removals(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::INIT_REMOVE_CONS_KEY) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR)?;
            let chain_id = event.attribute(ev::ATTR_CHAIN_ID)?;
            self.store
                .mark_operator_key_removal(operator_addr, chain_id)
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Events emitted by transactions and BeginBlock alike
    // =========================================================================

    async fn handle_shared_events(&self, events: &[Event]) -> Result<(), ModuleError> {
        self.handle_opt_info_updates(events).await?;
        self.handle_operator_usd_values(events).await?;
        self.handle_avs_usd_values(events).await
    }

    async fn handle_opt_info_updates(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::OPT_INFO_UPDATED) {
            let raw_opt_out = event.attribute(ev::ATTR_OPT_OUT_HEIGHT)?;
            let opt_out_height =
                parse_opt_out_height(raw_opt_out).map_err(|e| ModuleError::InvalidAttribute {
                    field: ev::ATTR_OPT_OUT_HEIGHT,
                    value: raw_opt_out.to_owned(),
                    reason: e.to_string(),
                })?;
            let opted = OptedState {
                operator_addr: event.attribute(ev::ATTR_OPERATOR)?.to_owned(),
                avs_addr: event.attribute(ev::ATTR_AVS_ADDR)?.to_owned(),
                slash_contract: event.attribute(ev::ATTR_SLASH_CONTRACT)?.to_owned(),
                opt_in_height: event.i64(ev::ATTR_OPT_IN_HEIGHT)?,
                opt_out_height,
                jailed: event.flag(ev::ATTR_JAILED)?,
            };
            if opted.jailed {
                tracing::info!(
                    operator = %opted.operator_addr,
                    avs = %opted.avs_addr,
                    "Operator jailed"
                );
            }
            self.store.save_opted_state(&opted).await?;
        }
        Ok(())
    }

    async fn handle_operator_usd_values(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UPDATE_OPERATOR_USD_VALUE) {
            let value = OperatorUsdValue {
                operator_addr: event.attribute(ev::ATTR_OPERATOR)?.to_owned(),
                avs_addr: event.attribute(ev::ATTR_AVS_ADDR)?.to_owned(),
                self_usd_value: event.dec(ev::ATTR_SELF_USD_VALUE)?,
                total_usd_value: event.dec(ev::ATTR_TOTAL_USD_VALUE)?,
                active_usd_value: event.dec(ev::ATTR_ACTIVE_USD_VALUE)?,
            };
            self.store.save_operator_usd_value(&value).await?;
        }
        for event in find_events_by_type(events, ev::DELETE_OPERATOR_USD_VALUE) {
            let operator_addr = event.attribute(ev::ATTR_OPERATOR)?;
            let avs_addr = event.attribute(ev::ATTR_AVS_ADDR)?;
            self.store
                .delete_operator_usd_value(operator_addr, avs_addr)
                .await?;
        }
        Ok(())
    }

    async fn handle_avs_usd_values(&self, events: &[Event]) -> Result<(), ModuleError> {
        for event in find_events_by_type(events, ev::UPDATE_AVS_USD_VALUE) {
            let value = AvsUsdValue {
                avs_addr: event.attribute(ev::ATTR_AVS_ADDR)?.to_owned(),
                usd_value: event.dec(ev::ATTR_TOTAL_USD_VALUE)?,
            };
            self.store.save_avs_usd_value(&value).await?;
        }
        for event in find_events_by_type(events, ev::DELETE_AVS_USD_VALUE) {
            let avs_addr = event.attribute(ev::ATTR_AVS_ADDR)?;
            self.store.delete_avs_usd_value(avs_addr).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::testing::{block, genesis, tx};
    use exocore_db::{MemoryStore, OperatorStore};
    use exocore_types::Dec;

    fn module(store: &MemoryStore) -> OperatorModule<MemoryStore> {
        OperatorModule::new(store.clone())
    }

    fn key_event(kind: &str, key_hex: &str) -> Event {
        Event::new(
            kind,
            [
                (ev::ATTR_OPERATOR, "op1"),
                (ev::ATTR_CHAIN_ID, "exocoretestnet_233"),
                (ev::ATTR_CONSENSUS_ADDRESS, "cafe"),
                (ev::ATTR_CONS_KEY_HEX, key_hex),
            ],
        )
    }

    fn pair_event(kind: &str) -> Event {
        Event::new(
            kind,
            [(ev::ATTR_OPERATOR, "op1"), (ev::ATTR_CHAIN_ID, "exocoretestnet_233")],
        )
    }

    fn opt_info(opt_out: &str, jailed: &str) -> Event {
        Event::new(
            ev::OPT_INFO_UPDATED,
            [
                (ev::ATTR_OPERATOR, "op1"),
                (ev::ATTR_AVS_ADDR, "0xavs"),
                (ev::ATTR_SLASH_CONTRACT, "0xslash"),
                (ev::ATTR_OPT_IN_HEIGHT, "10"),
                (ev::ATTR_OPT_OUT_HEIGHT, opt_out),
                (ev::ATTR_JAILED, jailed),
            ],
        )
    }

    #[tokio::test]
    async fn registration_uses_operator_as_both_addresses() {
        let store = MemoryStore::new();
        let event = Event::new(
            ev::REGISTER_OPERATOR,
            [
                (ev::ATTR_OPERATOR, "op1"),
                (ev::ATTR_META_INFO, "node"),
                (ev::ATTR_COMMISSION_RATE, "0.1"),
                (ev::ATTR_MAX_COMMISSION_RATE, "0.2"),
                (ev::ATTR_MAX_CHANGE_RATE, "0.01"),
                (ev::ATTR_COMMISSION_UPDATE_TIME, "2024-05-01 10:00:00 +0000 UTC"),
            ],
        );
        module(&store).handle_tx(&tx(4, vec![event])).await.unwrap();

        let operator = store.get_operator("op1").await.unwrap().unwrap();
        assert_eq!(operator.approve_addr, "op1");
        assert_eq!(operator.commission_rate, Dec::parse("0.1").unwrap());
    }

    #[tokio::test]
    async fn bad_commission_time_is_rejected() {
        let store = MemoryStore::new();
        let event = Event::new(
            ev::REGISTER_OPERATOR,
            [
                (ev::ATTR_OPERATOR, "op1"),
                (ev::ATTR_META_INFO, ""),
                (ev::ATTR_COMMISSION_RATE, "0"),
                (ev::ATTR_MAX_COMMISSION_RATE, "0"),
                (ev::ATTR_MAX_CHANGE_RATE, "0"),
                (ev::ATTR_COMMISSION_UPDATE_TIME, "soon"),
            ],
        );
        let err = module(&store).handle_tx(&tx(4, vec![event])).await.unwrap_err();
        assert!(matches!(
            err,
            ModuleError::InvalidAttribute { field: "commission_update_time", .. }
        ));
    }

    #[tokio::test]
    async fn key_rotation_and_removal_lifecycle() {
        let store = MemoryStore::new();
        let operator = module(&store);
        operator
            .handle_tx(&tx(5, vec![key_event(ev::SET_CONS_KEY, "0xAA")]))
            .await
            .unwrap();
        operator
            .handle_tx(&tx(6, vec![key_event(ev::SET_PREV_CONS_KEY, "BB")]))
            .await
            .unwrap();

        let key = store
            .get_operator_cons_key("op1", "exocoretestnet_233")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key.pubkey_hex, "0xaa");
        assert_eq!(key.prev_pubkey_hex.as_deref(), Some("0xbb"));

        let results = BlockResults {
            begin_block_events: Vec::new(),
            end_block_events: vec![pair_event(ev::REMOVE_PREV_CONS_KEY)],
        };
        operator.handle_block(&block(7), &results).await.unwrap();
        let key = store
            .get_operator_cons_key("op1", "exocoretestnet_233")
            .await
            .unwrap()
            .unwrap();
        assert!(key.prev_pubkey_hex.is_none());

        operator
            .handle_tx(&tx(8, vec![pair_event(ev::INIT_REMOVE_CONS_KEY)]))
            .await
            .unwrap();
        let key = store
            .get_operator_cons_key("op1", "exocoretestnet_233")
            .await
            .unwrap()
            .unwrap();
        assert!(key.is_removing);

        let results = BlockResults {
            begin_block_events: Vec::new(),
            end_block_events: vec![pair_event(ev::END_REMOVE_CONS_KEY)],
        };
        operator.handle_block(&block(9), &results).await.unwrap();
        assert!(store
            .get_operator_cons_key("op1", "exocoretestnet_233")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn begin_block_jailing_updates_opt_state() {
        let store = MemoryStore::new();
        let results = BlockResults {
            begin_block_events: vec![opt_info("18446744073709551615", "true")],
            end_block_events: Vec::new(),
        };
        module(&store).handle_block(&block(12), &results).await.unwrap();

        let state = store.get_opted_state("op1", "0xavs").await.unwrap().unwrap();
        assert!(state.jailed);
        assert_eq!(state.opt_in_height, 10);
        assert!(state.opt_out_height.is_none());
    }

    #[tokio::test]
    async fn malformed_opt_out_height_is_rejected() {
        let store = MemoryStore::new();
        let err = module(&store)
            .handle_tx(&tx(12, vec![opt_info("later", "false")]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModuleError::InvalidAttribute { field: ev::ATTR_OPT_OUT_HEIGHT, .. }
        ));
    }

    #[tokio::test]
    async fn usd_values_are_upserted_and_deleted() {
        let store = MemoryStore::new();
        let operator = module(&store);
        let update = Event::new(
            ev::UPDATE_OPERATOR_USD_VALUE,
            [
                (ev::ATTR_OPERATOR, "op1"),
                (ev::ATTR_AVS_ADDR, "0xavs"),
                (ev::ATTR_SELF_USD_VALUE, "10"),
                (ev::ATTR_TOTAL_USD_VALUE, "25.5"),
                (ev::ATTR_ACTIVE_USD_VALUE, "25.5"),
            ],
        );
        let avs = Event::new(
            ev::UPDATE_AVS_USD_VALUE,
            [(ev::ATTR_AVS_ADDR, "0xavs"), (ev::ATTR_TOTAL_USD_VALUE, "99")],
        );
        operator.handle_tx(&tx(3, vec![update, avs])).await.unwrap();

        let row = store.get_operator_usd_value("op1", "0xavs").await.unwrap().unwrap();
        assert_eq!(row.other_usd_value, Dec::parse("15.5").unwrap());
        let total = store.get_avs_usd_value("0xavs").await.unwrap().unwrap();
        assert_eq!(total.usd_value, Dec::parse("99").unwrap());

        let results = BlockResults {
            begin_block_events: vec![
                Event::new(
                    ev::DELETE_OPERATOR_USD_VALUE,
                    [(ev::ATTR_OPERATOR, "op1"), (ev::ATTR_AVS_ADDR, "0xavs")],
                ),
                Event::new(ev::DELETE_AVS_USD_VALUE, [(ev::ATTR_AVS_ADDR, "0xavs")]),
            ],
            end_block_events: Vec::new(),
        };
        operator.handle_block(&block(4), &results).await.unwrap();
        assert!(store.get_operator_usd_value("op1", "0xavs").await.unwrap().is_none());
        assert!(store.get_avs_usd_value("0xavs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn genesis_derives_addresses_and_pending_removals() {
        let store = MemoryStore::new();
        let key = format!("0x{}", "11".repeat(32));
        let prev = format!("0x{}", "22".repeat(32));
        let doc = genesis(serde_json::json!({
            "operator": {
                "operators": [{
                    "operator_address": "op1",
                    "operator_info": {
                        "earnings_addr": "op1",
                        "approve_addr": "op1",
                        "operator_meta_info": "node",
                        "commission": {
                            "commission_rates": { "rate": "0.1", "max_rate": "0.2", "max_change_rate": "0.01" },
                            "update_time": "2024-05-01T10:00:00Z"
                        }
                    }
                }],
                "operator_records": [{
                    "operator_address": "op1",
                    "chains": [{ "chain_id": "c1", "consensus_key": key }]
                }],
                "opt_states": [{
                    "key": "op1/0xavs",
                    "opt_info": {
                        "slash_contract": "0xslash",
                        "opted_in_height": "3",
                        "opted_out_height": "18446744073709551615",
                        "jailed": false
                    }
                }],
                "operator_usd_values": [{
                    "key": "0xavs/op1",
                    "opted_usd_value": { "self_usd_value": "1", "total_usd_value": "3", "active_usd_value": "3" }
                }],
                "pre_cons_keys": [{ "key": "c1/op1", "consensus_key": prev }],
                "operator_key_removals": [{ "key": "op1/c1" }]
            }
        }));
        module(&store).handle_genesis(&doc).await.unwrap();

        assert!(store.get_operator("op1").await.unwrap().is_some());
        let cons = store.get_operator_cons_key("op1", "c1").await.unwrap().unwrap();
        assert_eq!(cons.consensus_address, consensus_address(&key).unwrap());
        assert_eq!(
            cons.prev_consensus_address,
            Some(consensus_address(&prev).unwrap())
        );
        assert!(cons.is_removing);

        let opted = store.get_opted_state("op1", "0xavs").await.unwrap().unwrap();
        assert_eq!(opted.opt_in_height, 3);
        assert!(opted.opt_out_height.is_none());

        let usd = store.get_operator_usd_value("op1", "0xavs").await.unwrap().unwrap();
        assert_eq!(usd.other_usd_value, Dec::parse("2").unwrap());
    }
}
