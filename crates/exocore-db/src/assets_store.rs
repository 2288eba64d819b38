//! `x/assets` persistence: params, client chains, tokens, staker and
//! operator balances.
//!
//! Staker and operator balances keep a current row plus a history row per
//! height. Derived columns are computed in the statement itself:
//!
//! ```text
//! staker_assets.delegated   = deposited - free - pending_undelegation - lifetime_slashed
//! operator_assets.other_share = total_share - self_share
//! ```

use async_trait::async_trait;
use exocore_types::{
    AssetToken, ClientChain, OperatorAsset, OperatorAssetRow, StakerAsset, StakerAssetRow,
};

use crate::error::DbError;
use crate::pg_store::{PgStore, dec, int};

/// Operations on `x/assets` records.
#[async_trait]
pub trait AssetsStore: Send + Sync {
    /// Save module params if `height` is not older than the stored height.
    async fn save_assets_params(&self, params: &serde_json::Value, height: i64)
    -> Result<(), DbError>;

    /// Stored module params and the height they were saved at.
    async fn get_assets_params(&self) -> Result<Option<(serde_json::Value, i64)>, DbError>;

    /// Insert a client chain, or refresh its name and metadata.
    async fn save_client_chain(&self, chain: &ClientChain) -> Result<(), DbError>;

    /// Look up a client chain by `LayerZero` id.
    async fn get_client_chain(&self, layer_zero_chain_id: i64)
    -> Result<Option<ClientChain>, DbError>;

    /// Insert or overwrite a token.
    async fn save_token(&self, token: &AssetToken) -> Result<(), DbError>;

    /// Look up a token.
    async fn get_token(&self, asset_id: &str) -> Result<Option<AssetToken>, DbError>;

    /// Replace a token's metadata.
    async fn update_token_meta_info(&self, asset_id: &str, meta_info: &str)
    -> Result<(), DbError>;

    /// Replace a token's staking total.
    async fn update_token_staking_total(
        &self,
        asset_id: &str,
        total: exocore_types::Int,
    ) -> Result<(), DbError>;

    /// Upsert a staker balance and append its history row at `height`.
    ///
    /// `lifetime_slashed` is left untouched; `delegated` is recomputed.
    async fn save_staker_asset(&self, asset: &StakerAsset, height: i64) -> Result<(), DbError>;

    /// Current staker balance.
    async fn get_staker_asset(
        &self,
        staker_id: &str,
        asset_id: &str,
    ) -> Result<Option<StakerAssetRow>, DbError>;

    /// Upsert an operator balance and append its history row at `height`.
    async fn save_operator_asset(&self, asset: &OperatorAsset, height: i64)
    -> Result<(), DbError>;

    /// Current operator balance.
    async fn get_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<Option<OperatorAssetRow>, DbError>;
}

#[derive(sqlx::FromRow)]
struct ClientChainRow {
    layer_zero_chain_id: i64,
    name: String,
    meta_info: String,
    chain_id: i64,
    exocore_chain_index: i64,
    finalization_blocks: i64,
    signature_type: String,
    address_length: i64,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    asset_id: String,
    name: String,
    symbol: String,
    address: String,
    decimals: i64,
    layer_zero_chain_id: i64,
    exocore_chain_index: i64,
    meta_info: String,
    staking_total_amount: String,
}

#[derive(sqlx::FromRow)]
struct StakerRow {
    staker_id: String,
    asset_id: String,
    deposited: String,
    free: String,
    pending_undelegation: String,
    delegated: String,
    lifetime_slashed: String,
}

#[derive(sqlx::FromRow)]
struct OperatorRow {
    operator_addr: String,
    asset_id: String,
    total_amount: String,
    pending_undelegation: String,
    total_share: String,
    self_share: String,
    other_share: String,
}

#[async_trait]
impl AssetsStore for PgStore {
    async fn save_assets_params(
        &self,
        params: &serde_json::Value,
        height: i64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO assets_params (one_row_id, params, height)
              VALUES (TRUE, $1::JSONB, $2)
              ON CONFLICT (one_row_id) DO UPDATE
              SET params = EXCLUDED.params, height = EXCLUDED.height
              WHERE assets_params.height <= EXCLUDED.height",
        )
        .bind(params.to_string())
        .bind(height)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_assets_params(&self) -> Result<Option<(serde_json::Value, i64)>, DbError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT params::TEXT, height FROM assets_params")
                .fetch_optional(self.pool())
                .await?;
        row.map(|(raw, height)| Ok((serde_json::from_str(&raw)?, height)))
            .transpose()
    }

    async fn save_client_chain(&self, chain: &ClientChain) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO client_chains (layer_zero_chain_id, name, meta_info, chain_id, exocore_chain_index, finalization_blocks, signature_type, address_length)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
              ON CONFLICT (layer_zero_chain_id) DO UPDATE
              SET name = EXCLUDED.name, meta_info = EXCLUDED.meta_info",
        )
        .bind(chain.layer_zero_chain_id)
        .bind(&chain.name)
        .bind(&chain.meta_info)
        .bind(chain.chain_id)
        .bind(chain.exocore_chain_index)
        .bind(chain.finalization_blocks)
        .bind(&chain.signature_type)
        .bind(chain.address_length)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_client_chain(
        &self,
        layer_zero_chain_id: i64,
    ) -> Result<Option<ClientChain>, DbError> {
        let row = sqlx::query_as::<_, ClientChainRow>(
            r"SELECT layer_zero_chain_id, name, meta_info, chain_id, exocore_chain_index, finalization_blocks, signature_type, address_length
              FROM client_chains WHERE layer_zero_chain_id = $1",
        )
        .bind(layer_zero_chain_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| ClientChain {
            name: r.name,
            meta_info: r.meta_info,
            chain_id: r.chain_id,
            exocore_chain_index: r.exocore_chain_index,
            finalization_blocks: r.finalization_blocks,
            layer_zero_chain_id: r.layer_zero_chain_id,
            signature_type: r.signature_type,
            address_length: r.address_length,
        }))
    }

    async fn save_token(&self, token: &AssetToken) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO tokens (asset_id, name, symbol, address, decimals, layer_zero_chain_id, exocore_chain_index, meta_info, staking_total_amount)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::NUMERIC)
              ON CONFLICT (asset_id) DO UPDATE
              SET name = EXCLUDED.name,
                  symbol = EXCLUDED.symbol,
                  address = EXCLUDED.address,
                  decimals = EXCLUDED.decimals,
                  layer_zero_chain_id = EXCLUDED.layer_zero_chain_id,
                  exocore_chain_index = EXCLUDED.exocore_chain_index,
                  meta_info = EXCLUDED.meta_info,
                  staking_total_amount = EXCLUDED.staking_total_amount",
        )
        .bind(&token.asset_id)
        .bind(&token.name)
        .bind(&token.symbol)
        .bind(&token.address)
        .bind(token.decimals)
        .bind(token.layer_zero_chain_id)
        .bind(token.exocore_chain_index)
        .bind(&token.meta_info)
        .bind(token.staking_total_amount.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_token(&self, asset_id: &str) -> Result<Option<AssetToken>, DbError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r"SELECT asset_id, name, symbol, address, decimals, layer_zero_chain_id, exocore_chain_index, meta_info, staking_total_amount::TEXT AS staking_total_amount
              FROM tokens WHERE asset_id = $1",
        )
        .bind(asset_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(AssetToken {
                staking_total_amount: int(&r.staking_total_amount)?,
                asset_id: r.asset_id,
                name: r.name,
                symbol: r.symbol,
                address: r.address,
                decimals: r.decimals,
                layer_zero_chain_id: r.layer_zero_chain_id,
                exocore_chain_index: r.exocore_chain_index,
                meta_info: r.meta_info,
            })
        })
        .transpose()
    }

    async fn update_token_meta_info(&self, asset_id: &str, meta_info: &str) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE tokens SET meta_info = $2 WHERE asset_id = $1")
            .bind(asset_id)
            .bind(meta_info)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("token", asset_id));
        }
        Ok(())
    }

    async fn update_token_staking_total(
        &self,
        asset_id: &str,
        total: exocore_types::Int,
    ) -> Result<(), DbError> {
        let result =
            sqlx::query("UPDATE tokens SET staking_total_amount = $2::NUMERIC WHERE asset_id = $1")
                .bind(asset_id)
                .bind(total.to_string())
                .execute(self.pool())
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("token", asset_id));
        }
        Ok(())
    }

    async fn save_staker_asset(&self, asset: &StakerAsset, height: i64) -> Result<(), DbError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r"INSERT INTO staker_assets (staker_id, asset_id, deposited, free, pending_undelegation, lifetime_slashed, delegated)
              VALUES ($1, $2, $3::NUMERIC, $4::NUMERIC, $5::NUMERIC, 0, $3::NUMERIC - $4::NUMERIC - $5::NUMERIC)
              ON CONFLICT (staker_id, asset_id) DO UPDATE
              SET deposited = EXCLUDED.deposited,
                  free = EXCLUDED.free,
                  pending_undelegation = EXCLUDED.pending_undelegation,
                  delegated = EXCLUDED.deposited - EXCLUDED.free - EXCLUDED.pending_undelegation - staker_assets.lifetime_slashed",
        )
        .bind(&asset.staker_id)
        .bind(&asset.asset_id)
        .bind(asset.deposited.to_string())
        .bind(asset.withdrawable.to_string())
        .bind(asset.pending_undelegation.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"INSERT INTO staker_assets_history (staker_id, asset_id, deposited, free, pending_undelegation, delegated, lifetime_slashed, block_height)
              SELECT staker_id, asset_id, deposited, free, pending_undelegation, delegated, lifetime_slashed, $3
              FROM staker_assets WHERE staker_id = $1 AND asset_id = $2
              ON CONFLICT (staker_id, asset_id, block_height) DO UPDATE
              SET deposited = EXCLUDED.deposited,
                  free = EXCLUDED.free,
                  pending_undelegation = EXCLUDED.pending_undelegation,
                  delegated = EXCLUDED.delegated,
                  lifetime_slashed = EXCLUDED.lifetime_slashed",
        )
        .bind(&asset.staker_id)
        .bind(&asset.asset_id)
        .bind(height)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_staker_asset(
        &self,
        staker_id: &str,
        asset_id: &str,
    ) -> Result<Option<StakerAssetRow>, DbError> {
        let row = sqlx::query_as::<_, StakerRow>(
            r"SELECT staker_id, asset_id, deposited::TEXT AS deposited, free::TEXT AS free,
                     pending_undelegation::TEXT AS pending_undelegation, delegated::TEXT AS delegated,
                     lifetime_slashed::TEXT AS lifetime_slashed
              FROM staker_assets WHERE staker_id = $1 AND asset_id = $2",
        )
        .bind(staker_id)
        .bind(asset_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(StakerAssetRow {
                deposited: int(&r.deposited)?,
                withdrawable: int(&r.free)?,
                pending_undelegation: int(&r.pending_undelegation)?,
                delegated: int(&r.delegated)?,
                lifetime_slashed: int(&r.lifetime_slashed)?,
                staker_id: r.staker_id,
                asset_id: r.asset_id,
            })
        })
        .transpose()
    }

    async fn save_operator_asset(&self, asset: &OperatorAsset, height: i64) -> Result<(), DbError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r"INSERT INTO operator_assets (operator_addr, asset_id, total_amount, pending_undelegation, total_share, self_share, other_share)
              VALUES ($1, $2, $3::NUMERIC, $4::NUMERIC, $5::NUMERIC, $6::NUMERIC, $5::NUMERIC - $6::NUMERIC)
              ON CONFLICT (operator_addr, asset_id) DO UPDATE
              SET total_amount = EXCLUDED.total_amount,
                  pending_undelegation = EXCLUDED.pending_undelegation,
                  total_share = EXCLUDED.total_share,
                  self_share = EXCLUDED.self_share,
                  other_share = EXCLUDED.total_share - EXCLUDED.self_share",
        )
        .bind(&asset.operator_addr)
        .bind(&asset.asset_id)
        .bind(asset.total_amount.to_string())
        .bind(asset.pending_undelegation.to_string())
        .bind(asset.total_share.to_string())
        .bind(asset.self_share.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"INSERT INTO operator_assets_history (operator_addr, asset_id, total_amount, pending_undelegation, total_share, self_share, other_share, block_height)
              SELECT operator_addr, asset_id, total_amount, pending_undelegation, total_share, self_share, other_share, $3
              FROM operator_assets WHERE operator_addr = $1 AND asset_id = $2
              ON CONFLICT (operator_addr, asset_id, block_height) DO UPDATE
              SET total_amount = EXCLUDED.total_amount,
                  pending_undelegation = EXCLUDED.pending_undelegation,
                  total_share = EXCLUDED.total_share,
                  self_share = EXCLUDED.self_share,
                  other_share = EXCLUDED.other_share",
        )
        .bind(&asset.operator_addr)
        .bind(&asset.asset_id)
        .bind(height)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<Option<OperatorAssetRow>, DbError> {
        let row = sqlx::query_as::<_, OperatorRow>(
            r"SELECT operator_addr, asset_id, total_amount::TEXT AS total_amount,
                     pending_undelegation::TEXT AS pending_undelegation, total_share::TEXT AS total_share,
                     self_share::TEXT AS self_share, other_share::TEXT AS other_share
              FROM operator_assets WHERE operator_addr = $1 AND asset_id = $2",
        )
        .bind(operator_addr)
        .bind(asset_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(OperatorAssetRow {
                total_amount: int(&r.total_amount)?,
                pending_undelegation: int(&r.pending_undelegation)?,
                total_share: dec(&r.total_share)?,
                self_share: dec(&r.self_share)?,
                other_share: dec(&r.other_share)?,
                operator_addr: r.operator_addr,
                asset_id: r.asset_id,
            })
        })
        .transpose()
    }
}
