//! Shared types for the Exocore state indexer.
//!
//! Everything that crosses a crate boundary lives here: the chain feed
//! shapes, the per-module records written to the store, the genesis
//! sections, and the two arbitrary-precision numeric types.
//!
//! # Modules
//!
//! - [`numeric`] -- `Int` and `Dec`, string-encoded 256-bit quantities
//! - [`event`] -- Event model and attribute extraction
//! - [`event_types`] -- Event type and attribute key constants per module
//! - [`block`] -- Blocks, block results, transactions, evidence
//! - [`msg`] -- Decoded transaction messages
//! - [`keys`] -- Joined store keys, asset ids, consensus addresses
//! - [`genesis`] -- Genesis document
//! - [`assets`], [`delegation`], [`dogfood`], [`operator`], [`avs`],
//!   [`epochs`], [`exomint`] -- Records and genesis sections per module

pub mod assets;
pub mod avs;
pub mod block;
pub mod delegation;
pub mod dogfood;
pub mod epochs;
pub mod event;
pub mod event_types;
pub mod exomint;
pub mod genesis;
pub mod keys;
pub mod msg;
pub mod numeric;
pub mod operator;
pub mod serde_num;

pub use assets::{AssetToken, ClientChain, OperatorAsset, OperatorAssetRow, StakerAsset, StakerAssetRow};
pub use block::{Block, BlockRecord, BlockResults, Evidence, Tx, Vote};
pub use delegation::{DelegationState, ExoAssetDelegation, UndelegationRecord};
pub use dogfood::{
    ConsensusAddrToPrune, DogfoodParams, DoubleSignEvidence, OptOutExpiry, SourceValidator,
    UndelegationMaturity, Validator, ValidatorVotingPower,
};
pub use epochs::EpochInfo;
pub use event::{Event, EventAttribute, EventError, find_events_by_type};
pub use exomint::MintHistory;
pub use genesis::GenesisDoc;
pub use keys::{EXOCORE_ASSET_ID, KeyError};
pub use msg::Msg;
pub use numeric::{Dec, Int, NumericError};
pub use operator::{AvsUsdValue, Operator, OperatorConsKey, OperatorUsdValue, OperatorUsdValueRow, OptedState};
