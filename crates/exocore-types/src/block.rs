//! Block, block-result and transaction shapes delivered by the chain feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::msg::Msg;
use crate::serde_num;

/// A committed block header with its evidence list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub height: i64,
    /// Block time.
    pub time: DateTime<Utc>,
    /// Misbehaviour evidence committed in this block.
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

/// Events emitted outside transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResults {
    /// Events emitted by `BeginBlock`.
    #[serde(default)]
    pub begin_block_events: Vec<Event>,
    /// Events emitted by `EndBlock`.
    #[serde(default)]
    pub end_block_events: Vec<Event>,
}

/// A transaction with its emitted events and decoded messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    /// Transaction hash.
    pub hash: String,
    /// Height of the including block.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub height: i64,
    /// Events emitted by the transaction.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Messages carried by the transaction.
    #[serde(default)]
    pub messages: Vec<Msg>,
}

/// A single vote inside duplicate-vote evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Vote type (prevote = 1, precommit = 2).
    #[serde(rename = "type")]
    pub vote_type: i32,
    /// Height voted on.
    #[serde(deserialize_with = "serde_num::i64_str")]
    pub height: i64,
    /// Consensus round.
    pub round: i32,
    /// Block id the vote was cast for.
    pub block_id: String,
    /// Hex-encoded validator address.
    pub validator_address: String,
    /// Index of the validator in the set.
    pub validator_index: i32,
    /// Hex-encoded signature.
    pub signature: String,
}

/// Evidence committed in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// A validator signed two conflicting votes.
    DuplicateVote {
        /// First vote.
        vote_a: Vote,
        /// Second, conflicting vote.
        vote_b: Vote,
    },
    /// Any other evidence kind; ignored by the indexer.
    #[serde(other)]
    Other,
}

/// One record of a replay feed: a block with its results and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// The block header.
    pub block: Block,
    /// Begin/end block events.
    #[serde(default)]
    pub results: BlockResults,
    /// Transactions in block order.
    #[serde(default)]
    pub txs: Vec<Tx>,
}
