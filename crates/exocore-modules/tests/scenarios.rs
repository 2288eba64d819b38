//! End-to-end projector scenarios.
//!
//! Every scenario drives the [`Registrar`] over an in-memory store and a
//! snapshot source, so no database or node is needed.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::too_many_lines)]

use chrono::{TimeZone, Utc};
use exocore_db::{AssetsStore, DelegationStore, MemoryStore};
use exocore_modules::Registrar;
use exocore_source::{ChainSnapshot, ChainSource, LocalSource, SnapshotDelegation, Sources};
use exocore_types::event_types::{assets as aev, delegation as dev, operator as oev};
use exocore_types::{Block, BlockResults, Dec, Event, GenesisDoc, Int, Tx};

const ASSET: &str = "0xabc0000000000000000000000000000000000000_0x1";

fn registrar(store: &MemoryStore, snapshots: Vec<ChainSnapshot>) -> Registrar<MemoryStore> {
    let sources = Sources::new(&ChainSource::Local(LocalSource::new(snapshots)));
    Registrar::new(store.clone(), &sources)
}

fn block(height: i64) -> Block {
    Block {
        height,
        time: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        evidence: Vec::new(),
    }
}

fn tx(height: i64, events: Vec<Event>) -> Tx {
    Tx {
        hash: format!("0xtx{height}"),
        height,
        events,
        messages: Vec::new(),
    }
}

fn begin(events: Vec<Event>) -> BlockResults {
    BlockResults {
        begin_block_events: events,
        end_block_events: Vec::new(),
    }
}

fn end(events: Vec<Event>) -> BlockResults {
    BlockResults {
        begin_block_events: Vec::new(),
        end_block_events: events,
    }
}

fn staker_asset(staker: &str, deposit: &str, free: &str, pending: &str) -> Event {
    Event::new(
        aev::UPDATED_STAKER_ASSET,
        [
            (aev::ATTR_STAKER_ID, staker),
            (aev::ATTR_ASSET_ID, ASSET),
            (aev::ATTR_DEPOSIT_AMOUNT, deposit),
            (aev::ATTR_WITHDRAWABLE_AMOUNT, free),
            (aev::ATTR_PENDING_UNDELEGATION_AMOUNT, pending),
        ],
    )
}

fn undelegation_started(amount: &str) -> Event {
    Event::new(
        dev::UNDELEGATION_STARTED,
        [
            (dev::ATTR_STAKER_ID, "s1"),
            (dev::ATTR_ASSET_ID, ASSET),
            (dev::ATTR_OPERATOR_ADDR, "op1"),
            (dev::ATTR_RECORD_ID, "0x01"),
            (dev::ATTR_AMOUNT, amount),
            (dev::ATTR_COMPLETED_EPOCH_ID, "hour"),
            (dev::ATTR_COMPLETED_EPOCH_NUMBER, "12"),
            (dev::ATTR_UNDELEGATION_ID, "1"),
            (dev::ATTR_TX_HASH, "0xtx20"),
            (dev::ATTR_BLOCK_NUMBER, "20"),
        ],
    )
}

/// Delegate, start an undelegation, slash it, then mature it.
async fn run_undelegation_lifecycle(registrar: &Registrar<MemoryStore>) {
    let delegated = Event::new(
        dev::DELEGATION_STATE_UPDATED,
        [
            (dev::ATTR_STAKER_ID, "s1"),
            (dev::ATTR_ASSET_ID, ASSET),
            (dev::ATTR_OPERATOR_ADDR, "op1"),
            (dev::ATTR_UNDELEGATABLE_SHARE, "500"),
            (dev::ATTR_WAIT_UNDELEGATION_AMOUNT, "0"),
        ],
    );
    registrar
        .handle_block(
            &block(10),
            &BlockResults::default(),
            &[tx(10, vec![staker_asset("s1", "1000", "500", "0"), delegated])],
        )
        .await
        .unwrap();

    registrar
        .handle_block(
            &block(20),
            &BlockResults::default(),
            &[tx(
                20,
                vec![
                    staker_asset("s1", "1000", "500", "200"),
                    undelegation_started("200"),
                ],
            )],
        )
        .await
        .unwrap();

    let slashed = Event::new(
        oev::UNDELEGATION_SLASHED,
        [
            (oev::ATTR_RECORD_ID, "0x01"),
            (oev::ATTR_AMOUNT, "180"),
            (oev::ATTR_SLASH_AMOUNT, "20"),
        ],
    );
    registrar
        .handle_block(&block(30), &begin(vec![slashed]), &[])
        .await
        .unwrap();
}

fn matured() -> Event {
    Event::new(
        dev::UNDELEGATION_MATURED,
        [(dev::ATTR_RECORD_ID, "0x01"), (dev::ATTR_AMOUNT, "180")],
    )
}

#[tokio::test]
async fn genesis_deposit_has_nothing_delegated() {
    let store = MemoryStore::new();
    let doc: GenesisDoc = serde_json::from_value(serde_json::json!({
        "chain_id": "exocoretestnet_233-1",
        "initial_height": "1",
        "genesis_time": "2024-06-01T00:00:00Z",
        "app_state": {
            "assets": {
                "params": { "gateways": [] },
                "client_chains": [{
                    "name": "ethereum", "meta_info": "", "chain_id": "1",
                    "exocore_chain_index": "0", "finalization_blocks": "10",
                    "layer_zero_chain_id": "1", "signature_type": "secp256k1",
                    "address_length": "20"
                }],
                "tokens": [{
                    "asset_basic_info": {
                        "name": "Token", "symbol": "TKN",
                        "address": "0xabc0000000000000000000000000000000000000",
                        "decimals": "18", "layer_zero_chain_id": "1",
                        "exocore_chain_index": "0"
                    },
                    "staking_total_amount": "1000"
                }],
                "deposits": [{
                    "staker_id": "s1",
                    "deposits": [{
                        "asset_id": ASSET,
                        "info": {
                            "total_deposit_amount": "1000",
                            "withdrawable_amount": "1000",
                            "pending_undelegation_amount": "0"
                        }
                    }]
                }]
            }
        }
    }))
    .unwrap();

    registrar(&store, Vec::new()).handle_genesis(&doc).await.unwrap();

    assert_eq!(store.get_client_chain(1).await.unwrap().unwrap().name, "ethereum");
    assert_eq!(store.get_token(ASSET).await.unwrap().unwrap().decimals, 18);
    let row = store.get_staker_asset("s1", ASSET).await.unwrap().unwrap();
    assert_eq!(row.deposited, Int::from(1000_u64));
    assert_eq!(row.delegated, Int::ZERO);
}

#[tokio::test]
async fn undelegation_leaves_delegation_state_alone() {
    let store = MemoryStore::new();
    run_undelegation_lifecycle(&registrar(&store, Vec::new())).await;

    let state = store
        .get_delegation_state("s1", ASSET, "op1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.undelegatable_share, Dec::parse("500").unwrap());

    let record = store.get_undelegation_record("0x01").await.unwrap().unwrap();
    assert_eq!(record.amount, Int::from(200_u64));
    assert_eq!(record.hold_count, 0);
}

#[tokio::test]
async fn undelegation_slash_moves_pending_into_lifetime_slashed() {
    let store = MemoryStore::new();
    run_undelegation_lifecycle(&registrar(&store, Vec::new())).await;

    let record = store.get_undelegation_record("0x01").await.unwrap().unwrap();
    assert_eq!(record.actual_completed_amount, Int::from(180_u64));

    let row = store.get_staker_asset("s1", ASSET).await.unwrap().unwrap();
    assert_eq!(row.lifetime_slashed, Int::from(20_u64));
    assert_eq!(row.pending_undelegation, Int::from(180_u64));
    // 1000 - 500 - 180 - 20
    assert_eq!(row.delegated, Int::from(300_u64));
}

#[tokio::test]
async fn maturity_keeps_the_slashed_amount_and_is_idempotent() {
    let store = MemoryStore::new();
    let registrar = registrar(&store, Vec::new());
    run_undelegation_lifecycle(&registrar).await;

    registrar
        .handle_block(&block(40), &end(vec![matured()]), &[])
        .await
        .unwrap();
    let first = store.get_undelegation_record("0x01").await.unwrap().unwrap();
    assert_eq!(first.maturity_height, Some(40));
    assert_eq!(first.actual_completed_amount, Int::from(180_u64));

    registrar
        .handle_block(&block(41), &end(vec![matured()]), &[])
        .await
        .unwrap();
    let replayed = store.get_undelegation_record("0x01").await.unwrap().unwrap();
    assert_eq!(replayed, first);
}

#[tokio::test]
async fn negative_hold_count_halts_the_block() {
    let store = MemoryStore::new();
    let registrar = registrar(&store, Vec::new());
    run_undelegation_lifecycle(&registrar).await;

    let released = Event::new(
        dev::UNDELEGATION_HOLD_COUNT_CHANGED,
        [(dev::ATTR_RECORD_ID, "0x01"), (dev::ATTR_HOLD_COUNT, "-1")],
    );
    let err = registrar
        .handle_block(&block(35), &end(vec![released]), &[])
        .await
        .unwrap_err();
    assert_eq!(err.module, "delegation");
    assert_eq!(err.height, 35);

    let record = store.get_undelegation_record("0x01").await.unwrap().unwrap();
    assert_eq!(record.hold_count, 0);
}

#[tokio::test]
async fn operator_slash_is_conserved_across_stakers() {
    let stakers = [("s1", 600_u64, 540_u64), ("s2", 300, 270), ("s3", 100, 90)];
    let before = ChainSnapshot {
        height: 49,
        assets_params: None,
        dogfood_params: None,
        exomint_params: None,
        validators: Vec::new(),
        epochs: Vec::new(),
        delegations: stakers
            .iter()
            .map(|(staker, amount, _)| SnapshotDelegation {
                staker_id: (*staker).to_owned(),
                asset_id: ASSET.to_owned(),
                operator_addr: "op1".to_owned(),
                amount: Int::from(*amount),
            })
            .collect(),
    };
    let mut after = before.clone();
    after.height = 50;
    for (delegation, (_, _, amount)) in after.delegations.iter_mut().zip(stakers) {
        delegation.amount = Int::from(amount);
    }

    let store = MemoryStore::new();
    let registrar = registrar(&store, vec![before, after]);

    let mut setup = Vec::new();
    for (staker, amount, _) in stakers {
        setup.push(staker_asset(staker, &amount.to_string(), "0", "0"));
        setup.push(Event::new(
            dev::STAKER_APPENDED,
            [
                (dev::ATTR_STAKER_ID, staker),
                (dev::ATTR_OPERATOR_ADDR, "op1"),
                (dev::ATTR_ASSET_ID, ASSET),
            ],
        ));
    }
    registrar
        .handle_block(&block(48), &BlockResults::default(), &[tx(48, setup)])
        .await
        .unwrap();

    let slash = Event::new(
        oev::OPERATOR_ASSET_SLASHED,
        [(oev::ATTR_OPERATOR, "op1"), (oev::ATTR_ASSET_ID, ASSET)],
    );
    registrar
        .handle_block(&block(50), &begin(vec![slash]), &[])
        .await
        .unwrap();

    let mut slashed = Vec::new();
    for (staker, _, _) in stakers {
        let row = store.get_staker_asset(staker, ASSET).await.unwrap().unwrap();
        slashed.push(row.lifetime_slashed);
    }
    assert_eq!(
        slashed,
        vec![Int::from(60_u64), Int::from(30_u64), Int::from(10_u64)]
    );
    assert_eq!(Int::checked_sum(slashed).unwrap(), Int::from(100_u64));
}
