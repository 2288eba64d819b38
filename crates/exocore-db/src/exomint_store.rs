//! `x/exomint` persistence.

use async_trait::async_trait;
use exocore_types::MintHistory;

use crate::error::DbError;
use crate::pg_store::{PgStore, int};

/// Operations on `x/exomint` records.
#[async_trait]
pub trait ExomintStore: Send + Sync {
    /// Save module params if `height` is not older than the stored height.
    async fn save_exomint_params(&self, params: &serde_json::Value, height: i64)
    -> Result<(), DbError>;

    /// Stored params and the height they were saved at.
    async fn get_exomint_params(&self) -> Result<Option<(serde_json::Value, i64)>, DbError>;

    /// Record a mint. A second mint for the same epoch replaces the first.
    async fn append_mint_history(&self, history: &MintHistory) -> Result<(), DbError>;

    /// Mint recorded for an epoch.
    async fn get_mint_history(
        &self,
        epoch_id: &str,
        epoch_number: i64,
    ) -> Result<Option<MintHistory>, DbError>;
}

#[derive(sqlx::FromRow)]
struct MintRow {
    block_height: i64,
    quantity_minted: String,
    epoch_id: String,
    epoch_number: i64,
    denom: String,
}

#[async_trait]
impl ExomintStore for PgStore {
    async fn save_exomint_params(
        &self,
        params: &serde_json::Value,
        height: i64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO exomint_params (one_row_id, params, height)
              VALUES (TRUE, $1::JSONB, $2)
              ON CONFLICT (one_row_id) DO UPDATE
              SET params = EXCLUDED.params, height = EXCLUDED.height
              WHERE exomint_params.height <= EXCLUDED.height",
        )
        .bind(params.to_string())
        .bind(height)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_exomint_params(&self) -> Result<Option<(serde_json::Value, i64)>, DbError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT params::TEXT, height FROM exomint_params")
                .fetch_optional(self.pool())
                .await?;
        row.map(|(raw, height)| Ok((serde_json::from_str(&raw)?, height)))
            .transpose()
    }

    async fn append_mint_history(&self, history: &MintHistory) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO exomint_history (block_height, quantity_minted, epoch_id, epoch_number, denom)
              VALUES ($1, $2::NUMERIC, $3, $4, $5)
              ON CONFLICT (epoch_id, epoch_number) DO UPDATE
              SET block_height = EXCLUDED.block_height,
                  quantity_minted = EXCLUDED.quantity_minted,
                  denom = EXCLUDED.denom",
        )
        .bind(history.block_height)
        .bind(history.quantity_minted.to_string())
        .bind(&history.epoch_id)
        .bind(history.epoch_number)
        .bind(&history.denom)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_mint_history(
        &self,
        epoch_id: &str,
        epoch_number: i64,
    ) -> Result<Option<MintHistory>, DbError> {
        let row = sqlx::query_as::<_, MintRow>(
            r"SELECT block_height, quantity_minted::TEXT AS quantity_minted, epoch_id, epoch_number, denom
              FROM exomint_history WHERE epoch_id = $1 AND epoch_number = $2",
        )
        .bind(epoch_id)
        .bind(epoch_number)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(MintHistory {
                block_height: r.block_height,
                quantity_minted: int(&r.quantity_minted)?,
                epoch_id: r.epoch_id,
                epoch_number: r.epoch_number,
                denom: r.denom,
            })
        })
        .transpose()
    }
}
