//! [`PgStore`]: the `PostgreSQL` implementation of every store trait.
//!
//! The trait impls live next to their traits (`assets_store.rs`,
//! `delegation_store.rs`, ...). Quantities are bound as canonical strings
//! and cast with `$n::NUMERIC`; they are read back with `::TEXT` and
//! re-parsed, so no precision is lost on either side.

use exocore_types::{Dec, Int};
use sqlx::PgPool;

use crate::error::DbError;

/// Store backed by a `PostgreSQL` pool. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Parse a `NUMERIC::TEXT` column holding an integer.
pub(crate) fn int(raw: &str) -> Result<Int, DbError> {
    Ok(Int::parse(raw)?)
}

/// Parse a `NUMERIC::TEXT` column holding a decimal.
pub(crate) fn dec(raw: &str) -> Result<Dec, DbError> {
    Ok(Dec::parse(raw)?)
}
