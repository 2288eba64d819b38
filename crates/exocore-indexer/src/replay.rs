//! Replay driver: genesis, then a newline-delimited JSON block feed.
//!
//! Each line of the feed is one [`BlockRecord`] (`{block, results, txs}`).
//! Records are applied strictly one at a time, in file order, through
//! [`Registrar::handle_block`]. The first failure stops the replay; every
//! block before it stays applied and nothing after it is touched.

use std::path::Path;

use exocore_db::Store;
use exocore_modules::Registrar;
use exocore_types::{BlockRecord, GenesisDoc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::ReplayError;

/// Counters reported when a replay finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Blocks handed to the registrar.
    pub applied: u64,
    /// Blocks below the start height.
    pub skipped: u64,
    /// Height of the last applied block.
    pub last_height: Option<i64>,
}

/// Read and decode a genesis document.
pub async fn load_genesis(path: &Path) -> Result<GenesisDoc, ReplayError> {
    let raw = tokio::fs::read(path).await?;
    serde_json::from_slice(&raw).map_err(|source| ReplayError::GenesisDecode {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a genesis document through every projector.
pub async fn apply_genesis<S: Store + Clone + 'static>(
    registrar: &Registrar<S>,
    doc: &GenesisDoc,
) -> Result<(), ReplayError> {
    Box::pin(registrar.handle_genesis(doc))
        .await
        .map_err(|source| ReplayError::Genesis { source })
}

/// Apply every record of `feed` at or above `from`.
pub async fn replay_blocks<S, R>(
    registrar: &Registrar<S>,
    feed: R,
    from: Option<i64>,
) -> Result<ReplaySummary, ReplayError>
where
    S: Store + Clone + 'static,
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReplaySummary::default();
    let mut lines = feed.lines();
    let mut line = 0_usize;

    while let Some(raw) = lines.next_line().await? {
        line = line.saturating_add(1);
        if raw.trim().is_empty() {
            continue;
        }
        let record: BlockRecord = serde_json::from_str(&raw)
            .map_err(|source| ReplayError::RecordDecode { line, source })?;
        let height = record.block.height;

        if from.is_some_and(|start| height < start) {
            summary.skipped = summary.skipped.saturating_add(1);
            continue;
        }
        if let Some(previous) = summary.last_height.filter(|&previous| height < previous) {
            return Err(ReplayError::OutOfOrder { previous, height });
        }

        Box::pin(registrar.handle_block(&record.block, &record.results, &record.txs))
            .await
            .map_err(|source| ReplayError::Block { height, source })?;

        summary.applied = summary.applied.saturating_add(1);
        summary.last_height = Some(height);
        if summary.applied % 1000 == 0 {
            tracing::info!(height, applied = summary.applied, "Replay progress");
        }
    }

    tracing::info!(
        applied = summary.applied,
        skipped = summary.skipped,
        last_height = ?summary.last_height,
        "Replay finished"
    );
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use exocore_db::{ExomintStore, MemoryStore};
    use exocore_source::{ChainSource, LocalSource, Sources};
    use exocore_types::event_types::{epochs as eev, exomint as mev};
    use exocore_types::{Block, BlockResults, Event};

    fn registrar(store: &MemoryStore) -> Registrar<MemoryStore> {
        let sources = Sources::new(&ChainSource::Local(LocalSource::new(Vec::new())));
        Registrar::new(store.clone(), &sources)
    }

    fn record(height: i64, begin_block_events: Vec<Event>) -> String {
        let record = BlockRecord {
            block: Block {
                height,
                time: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                evidence: Vec::new(),
            },
            results: BlockResults {
                begin_block_events,
                end_block_events: Vec::new(),
            },
            txs: Vec::new(),
        };
        serde_json::to_string(&record).unwrap()
    }

    fn mint(epoch_number: &str) -> Event {
        Event::new(
            mev::MINT,
            [
                (mev::ATTR_AMOUNT, "100"),
                (mev::ATTR_EPOCH_IDENTIFIER, "day"),
                (mev::ATTR_EPOCH_NUMBER, epoch_number),
                (mev::ATTR_DENOM, "hua"),
            ],
        )
    }

    fn feed(lines: &[String]) -> String {
        lines.join("\n")
    }

    #[tokio::test]
    async fn applies_records_in_order_and_skips_blank_lines() {
        let store = MemoryStore::new();
        let input = feed(&[
            record(1, vec![mint("1")]),
            String::new(),
            record(2, vec![mint("2")]),
        ]);
        let summary = replay_blocks(&registrar(&store), input.as_bytes(), None)
            .await
            .unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.last_height, Some(2));
        let second = store.get_mint_history("day", 2).await.unwrap().unwrap();
        assert_eq!(second.block_height, 2);
    }

    #[tokio::test]
    async fn records_below_start_height_are_skipped() {
        let store = MemoryStore::new();
        let input = feed(&[record(5, vec![mint("5")]), record(6, vec![mint("6")])]);
        let summary = replay_blocks(&registrar(&store), input.as_bytes(), Some(6))
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.applied, 1);
        assert!(store.get_mint_history("day", 5).await.unwrap().is_none());
        assert!(store.get_mint_history("day", 6).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_record_reports_its_line() {
        let store = MemoryStore::new();
        let input = feed(&[record(1, Vec::new()), "{\"block\":".to_owned()]);
        let err = replay_blocks(&registrar(&store), input.as_bytes(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReplayError::RecordDecode { line: 2, .. }));
    }

    #[tokio::test]
    async fn first_failing_block_halts_the_replay() {
        let store = MemoryStore::new();
        // No snapshot answers the epoch query, so block 3 fails.
        let epoch_end = Event::new(eev::EPOCH_END, [(eev::ATTR_EPOCH_IDENTIFIER, "day")]);
        let input = feed(&[
            record(2, vec![mint("2")]),
            record(3, vec![epoch_end]),
            record(4, vec![mint("4")]),
        ]);
        let err = replay_blocks(&registrar(&store), input.as_bytes(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ReplayError::Block { height: 3, .. }));
        assert!(err.to_string().starts_with("replay halted at height 3"));
        assert!(store.get_mint_history("day", 2).await.unwrap().is_some());
        assert!(store.get_mint_history("day", 4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn heights_must_not_go_backwards() {
        let store = MemoryStore::new();
        let input = feed(&[record(8, Vec::new()), record(7, Vec::new())]);
        let err = replay_blocks(&registrar(&store), input.as_bytes(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReplayError::OutOfOrder {
                previous: 8,
                height: 7
            }
        ));
    }

    #[tokio::test]
    async fn genesis_file_decodes_and_loads() {
        let path = std::env::temp_dir().join(format!("exocore-genesis-{}.json", std::process::id()));
        let doc = serde_json::json!({
            "chain_id": "exocoretestnet_233-1",
            "initial_height": "1",
            "genesis_time": "2024-06-01T00:00:00Z",
            "app_state": {
                "exomint": { "params": { "mint_denom": "hua", "epoch_reward": "1" } }
            }
        });
        tokio::fs::write(&path, doc.to_string()).await.unwrap();

        let store = MemoryStore::new();
        let genesis = load_genesis(&path).await.unwrap();
        apply_genesis(&registrar(&store), &genesis).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        let (params, height) = store.get_exomint_params().await.unwrap().unwrap();
        assert_eq!(params["mint_denom"], "hua");
        assert_eq!(height, 1);
    }

    #[tokio::test]
    async fn malformed_genesis_names_the_file() {
        let path = std::env::temp_dir().join(format!("exocore-bad-genesis-{}.json", std::process::id()));
        tokio::fs::write(&path, "not json").await.unwrap();
        let err = load_genesis(&path).await.unwrap_err();
        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(err, ReplayError::GenesisDecode { .. }));
    }
}
