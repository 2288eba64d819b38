//! Point-in-time chain queries for the Exocore state indexer.
//!
//! Projectors sometimes need chain state that events do not carry: params
//! after an update, the validator set after a power change, a staker's
//! delegated amount before and after a slash. Every such question is a
//! [`QueryRequest`] answered at a height by a [`ChainSource`].
//!
//! # Modules
//!
//! - [`query`] -- Requests, responses and pagination
//! - [`local`] -- Snapshot-backed source
//! - [`remote`] -- REST gateway source
//! - [`source`] -- [`ChainSource`], the dispatching enum
//! - [`adapters`] -- Typed per-module views and the [`Sources`] bundle
//! - [`error`] -- Error types

pub mod adapters;
pub mod error;
pub mod local;
pub mod query;
pub mod remote;
pub mod source;

pub use adapters::{
    AssetsSource, DelegationSource, DogfoodSource, EpochsSource, ExomintSource, Sources,
};
pub use error::SourceError;
pub use local::{ChainSnapshot, LocalSource, SnapshotDelegation};
pub use query::{DEFAULT_PAGE_LIMIT, PageRequest, QueryRequest, QueryResponse};
pub use remote::{RemoteConfig, RemoteSource};
pub use source::ChainSource;
