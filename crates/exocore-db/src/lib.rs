//! Persistence layer for the Exocore state indexer.
//!
//! Every projector write goes through one of the per-module store traits.
//! Each trait encodes its table's conflict policy (overwrite, do-nothing,
//! additive accumulation, height or epoch guard) and recomputes derived
//! columns itself, so callers never supply them.
//!
//! # Architecture
//!
//! ```text
//! Projector (exocore-modules)
//!     |
//!     +-- S: Store -----+-- PgStore     (PostgreSQL via sqlx, migrations/)
//!                       +-- MemoryStore (ordered maps, dry runs and tests)
//!
//! Store = AssetsStore + DelegationStore + DogfoodStore + OperatorStore
//!       + AvsStore + EpochsStore + ExomintStore
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`pg_store`] -- [`PgStore`], the `PostgreSQL` implementation
//! - [`memory`] -- [`MemoryStore`], the in-memory implementation
//! - [`assets_store`], [`delegation_store`], [`dogfood_store`],
//!   [`operator_store`], [`avs_store`], [`epochs_store`],
//!   [`exomint_store`] -- Store traits with their `PostgreSQL` statements
//! - [`error`] -- Shared error types

pub mod assets_store;
pub mod avs_store;
pub mod delegation_store;
pub mod dogfood_store;
pub mod epochs_store;
pub mod error;
pub mod exomint_store;
pub mod memory;
pub mod operator_store;
pub mod pg_store;
pub mod postgres;

// Re-export primary types for convenience.
pub use assets_store::AssetsStore;
pub use avs_store::AvsStore;
pub use delegation_store::DelegationStore;
pub use dogfood_store::DogfoodStore;
pub use epochs_store::EpochsStore;
pub use error::DbError;
pub use exomint_store::ExomintStore;
pub use memory::MemoryStore;
pub use operator_store::OperatorStore;
pub use pg_store::PgStore;
pub use postgres::{PostgresConfig, PostgresPool};

/// Every store trait. Implemented for any type that implements them all.
pub trait Store:
    AssetsStore
    + DelegationStore
    + DogfoodStore
    + OperatorStore
    + AvsStore
    + EpochsStore
    + ExomintStore
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: AssetsStore
        + DelegationStore
        + DogfoodStore
        + OperatorStore
        + AvsStore
        + EpochsStore
        + ExomintStore
        + Send
        + Sync
{
}
