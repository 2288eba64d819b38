//! Error types for the projectors.
//!
//! Every handler returns [`ModuleError`]. Nothing is retried or defaulted
//! here: the replay driver decides what to do with a failed block.

use exocore_db::DbError;
use exocore_source::SourceError;
use exocore_types::{EventError, Int, KeyError, NumericError};

/// Errors raised while projecting chain data into the store.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// An event attribute is missing or unparseable.
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// The store rejected a read or write.
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// A point-in-time chain query failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// A joined key or consensus key could not be decoded.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Amount arithmetic overflowed or a number did not parse.
    #[error("numeric error: {0}")]
    Numeric(#[from] NumericError),

    /// A module's genesis section is malformed.
    #[error("malformed {module} genesis: {source}")]
    Decode {
        /// Module whose section failed to decode.
        module: &'static str,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// An undelegation's hold count went below zero.
    #[error("hold count of undelegation {record_id} would become {hold_count}")]
    HoldCountUnderflow {
        /// Undelegation record key.
        record_id: String,
        /// The negative hold count reported by the chain.
        hold_count: i64,
    },

    /// A value decoded from an event or genesis is out of range or malformed.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidAttribute {
        /// Attribute or genesis field name.
        field: &'static str,
        /// The raw value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A staker's delegated amount grew across a slash.
    #[error("delegated amount rose from {before} to {after} across a slash")]
    NegativeSlash {
        /// Amount before the slash.
        before: Int,
        /// Amount after the slash.
        after: Int,
    },

    /// The per-staker fan-out of an operator slash stopped part way.
    #[error("slash fan-out for {operator}/{asset_id} failed at staker {staker_id}: {source}")]
    SlashFanOut {
        /// Slashed operator.
        operator: String,
        /// Slashed asset.
        asset_id: String,
        /// Staker whose update failed.
        staker_id: String,
        /// What went wrong for that staker.
        source: Box<ModuleError>,
    },
}

/// The step of block processing a handler ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Genesis load.
    Genesis,
    /// `BeginBlock` events.
    BeginBlock,
    /// Transaction events.
    Tx,
    /// Transaction messages.
    Msg,
    /// `EndBlock` events.
    EndBlock,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Genesis => "genesis",
            Self::BeginBlock => "begin block",
            Self::Tx => "tx",
            Self::Msg => "msg",
            Self::EndBlock => "end block",
        };
        f.write_str(name)
    }
}

/// A projector failure, tagged with where it happened.
#[derive(Debug, thiserror::Error)]
#[error("{module} {phase} handler failed at height {height}: {source}")]
pub struct RegistrarError {
    /// Projector that failed.
    pub module: &'static str,
    /// Step that failed.
    pub phase: Phase,
    /// Height being processed.
    pub height: i64,
    /// The projector's error.
    pub source: Box<ModuleError>,
}
