//! `x/avs` persistence.

use async_trait::async_trait;

use crate::error::DbError;
use crate::pg_store::PgStore;

/// Operations on `x/avs` records.
#[async_trait]
pub trait AvsStore: Send + Sync {
    /// Register an AVS. Already known is a no-op.
    async fn save_avs(&self, avs_addr: &str) -> Result<(), DbError>;

    /// Map a chain id to the AVS securing it.
    async fn save_chain_id_to_avs(&self, chain_id: &str, avs_addr: &str) -> Result<(), DbError>;

    /// Whether an AVS is known.
    async fn has_avs(&self, avs_addr: &str) -> Result<bool, DbError>;

    /// AVS securing a chain id.
    async fn get_chain_avs(&self, chain_id: &str) -> Result<Option<String>, DbError>;
}

#[async_trait]
impl AvsStore for PgStore {
    async fn save_avs(&self, avs_addr: &str) -> Result<(), DbError> {
        sqlx::query("INSERT INTO avs (avs_addr) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(avs_addr)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn save_chain_id_to_avs(&self, chain_id: &str, avs_addr: &str) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO chain_id_to_avs (chain_id, avs_addr)
              VALUES ($1, $2)
              ON CONFLICT (chain_id) DO UPDATE SET avs_addr = EXCLUDED.avs_addr",
        )
        .bind(chain_id)
        .bind(avs_addr)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn has_avs(&self, avs_addr: &str) -> Result<bool, DbError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM avs WHERE avs_addr = $1)")
                .bind(avs_addr)
                .fetch_one(self.pool())
                .await?;
        Ok(exists)
    }

    async fn get_chain_avs(&self, chain_id: &str) -> Result<Option<String>, DbError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT avs_addr FROM chain_id_to_avs WHERE chain_id = $1")
                .bind(chain_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(avs,)| avs))
    }
}
