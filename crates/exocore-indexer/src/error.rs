//! Error types for the indexer binary.
//!
//! [`ReplayError`] covers everything that can stop a replay: reading the
//! inputs, decoding them, and the first projector failure. `main` wraps it
//! (and every other failure) in `anyhow` with context.

use std::path::PathBuf;

use exocore_modules::RegistrarError;

/// Why a replay stopped.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Reading an input failed.
    #[error("failed to read replay input: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The genesis document is not valid JSON for a genesis.
    #[error("failed to decode genesis document {}: {source}", path.display())]
    GenesisDecode {
        /// File the document was read from.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A line of the block feed is not a block record.
    #[error("failed to decode block record on line {line}: {source}")]
    RecordDecode {
        /// One-based line number in the feed.
        line: usize,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The feed went backwards.
    #[error("block {height} follows block {previous}; the feed must be in height order")]
    OutOfOrder {
        /// Height of the last applied block.
        previous: i64,
        /// Height of the offending record.
        height: i64,
    },

    /// Loading the genesis document failed.
    #[error("genesis failed: {source}")]
    Genesis {
        /// The projector failure.
        source: RegistrarError,
    },

    /// A block failed. Nothing after it was applied.
    #[error("replay halted at height {height}: {source}")]
    Block {
        /// Height of the failing block.
        height: i64,
        /// The projector failure.
        source: RegistrarError,
    },
}
