//! `x/operator` persistence: operator details, consensus keys, opt-in
//! states and USD valuations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exocore_types::{
    AvsUsdValue, Operator, OperatorConsKey, OperatorUsdValue, OperatorUsdValueRow, OptedState,
};

use crate::error::DbError;
use crate::pg_store::{PgStore, dec};

/// Operations on `x/operator` records.
#[async_trait]
pub trait OperatorStore: Send + Sync {
    /// Insert or overwrite an operator. Commission fields change together.
    async fn save_operator_detail(&self, operator: &Operator) -> Result<(), DbError>;

    /// Look up an operator by earnings address.
    async fn get_operator(&self, earnings_addr: &str) -> Result<Option<Operator>, DbError>;

    /// Set the current consensus key of an operator on a chain.
    async fn save_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
        pubkey_hex: &str,
        consensus_address: &str,
    ) -> Result<(), DbError>;

    /// Record the key an operator is rotating away from. Only an existing
    /// key row is updated.
    async fn save_operator_prev_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
        prev_pubkey_hex: &str,
        prev_consensus_address: &str,
    ) -> Result<(), DbError>;

    /// Forget the previous key. The current key is untouched.
    async fn clear_operator_prev_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError>;

    /// Flag a consensus key as being removed.
    async fn mark_operator_key_removal(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError>;

    /// Delete a consensus key once removal completes.
    async fn remove_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError>;

    /// Consensus key of an operator on a chain.
    async fn get_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<Option<OperatorConsKey>, DbError>;

    /// Overwrite an opt-in state.
    async fn save_opted_state(&self, state: &OptedState) -> Result<(), DbError>;

    /// Opt-in state of an operator for an AVS.
    async fn get_opted_state(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<Option<OptedState>, DbError>;

    /// Upsert an operator valuation; the `other` column is derived.
    async fn save_operator_usd_value(&self, value: &OperatorUsdValue) -> Result<(), DbError>;

    /// Operator valuation within an AVS.
    async fn get_operator_usd_value(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<Option<OperatorUsdValueRow>, DbError>;

    /// Delete an operator valuation.
    async fn delete_operator_usd_value(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<(), DbError>;

    /// Upsert an AVS valuation.
    async fn save_avs_usd_value(&self, value: &AvsUsdValue) -> Result<(), DbError>;

    /// Valuation of an AVS.
    async fn get_avs_usd_value(&self, avs_addr: &str) -> Result<Option<AvsUsdValue>, DbError>;

    /// Delete an AVS valuation.
    async fn delete_avs_usd_value(&self, avs_addr: &str) -> Result<(), DbError>;
}

#[derive(sqlx::FromRow)]
struct OperatorRow {
    earnings_addr: String,
    approve_addr: String,
    meta_info: String,
    commission_rate: String,
    max_commission_rate: String,
    max_change_rate: String,
    commission_update_time: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ConsKeyRow {
    operator_addr: String,
    chain_id: String,
    pubkey_hex: String,
    consensus_address: String,
    prev_pubkey_hex: Option<String>,
    prev_cons_addr: Option<String>,
    is_removing: bool,
}

#[derive(sqlx::FromRow)]
struct OptedRow {
    operator_addr: String,
    avs_addr: String,
    slash_contract: String,
    opt_in_height: i64,
    opt_out_height: Option<i64>,
    jailed: bool,
}

#[derive(sqlx::FromRow)]
struct UsdValueRow {
    operator_addr: String,
    avs_addr: String,
    self_usd_value: String,
    total_usd_value: String,
    active_usd_value: String,
    other_usd_value: String,
}

#[async_trait]
impl OperatorStore for PgStore {
    async fn save_operator_detail(&self, operator: &Operator) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO operators (earnings_addr, approve_addr, meta_info, commission_rate, max_commission_rate, max_change_rate, commission_update_time)
              VALUES ($1, $2, $3, $4::NUMERIC, $5::NUMERIC, $6::NUMERIC, $7)
              ON CONFLICT (earnings_addr) DO UPDATE
              SET approve_addr = EXCLUDED.approve_addr,
                  meta_info = EXCLUDED.meta_info,
                  commission_rate = EXCLUDED.commission_rate,
                  max_commission_rate = EXCLUDED.max_commission_rate,
                  max_change_rate = EXCLUDED.max_change_rate,
                  commission_update_time = EXCLUDED.commission_update_time",
        )
        .bind(&operator.earnings_addr)
        .bind(&operator.approve_addr)
        .bind(&operator.meta_info)
        .bind(operator.commission_rate.to_string())
        .bind(operator.max_commission_rate.to_string())
        .bind(operator.max_change_rate.to_string())
        .bind(operator.commission_update_time)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_operator(&self, earnings_addr: &str) -> Result<Option<Operator>, DbError> {
        let row = sqlx::query_as::<_, OperatorRow>(
            r"SELECT earnings_addr, approve_addr, meta_info,
                     commission_rate::TEXT AS commission_rate,
                     max_commission_rate::TEXT AS max_commission_rate,
                     max_change_rate::TEXT AS max_change_rate,
                     commission_update_time
              FROM operators WHERE earnings_addr = $1",
        )
        .bind(earnings_addr)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(Operator {
                commission_rate: dec(&r.commission_rate)?,
                max_commission_rate: dec(&r.max_commission_rate)?,
                max_change_rate: dec(&r.max_change_rate)?,
                earnings_addr: r.earnings_addr,
                approve_addr: r.approve_addr,
                meta_info: r.meta_info,
                commission_update_time: r.commission_update_time,
            })
        })
        .transpose()
    }

    async fn save_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
        pubkey_hex: &str,
        consensus_address: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO consensus_keys (operator_addr, chain_id, pubkey_hex, consensus_address)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (operator_addr, chain_id) DO UPDATE
              SET pubkey_hex = EXCLUDED.pubkey_hex,
                  consensus_address = EXCLUDED.consensus_address",
        )
        .bind(operator_addr)
        .bind(chain_id)
        .bind(pubkey_hex)
        .bind(consensus_address)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn save_operator_prev_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
        prev_pubkey_hex: &str,
        prev_consensus_address: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE consensus_keys SET prev_pubkey_hex = $3, prev_cons_addr = $4
              WHERE operator_addr = $1 AND chain_id = $2",
        )
        .bind(operator_addr)
        .bind(chain_id)
        .bind(prev_pubkey_hex)
        .bind(prev_consensus_address)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn clear_operator_prev_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE consensus_keys SET prev_pubkey_hex = NULL, prev_cons_addr = NULL
              WHERE operator_addr = $1 AND chain_id = $2",
        )
        .bind(operator_addr)
        .bind(chain_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn mark_operator_key_removal(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"UPDATE consensus_keys SET is_removing = TRUE
              WHERE operator_addr = $1 AND chain_id = $2",
        )
        .bind(operator_addr)
        .bind(chain_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn remove_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<(), DbError> {
        sqlx::query("DELETE FROM consensus_keys WHERE operator_addr = $1 AND chain_id = $2")
            .bind(operator_addr)
            .bind(chain_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn get_operator_cons_key(
        &self,
        operator_addr: &str,
        chain_id: &str,
    ) -> Result<Option<OperatorConsKey>, DbError> {
        let row = sqlx::query_as::<_, ConsKeyRow>(
            r"SELECT operator_addr, chain_id, pubkey_hex, consensus_address,
                     prev_pubkey_hex, prev_cons_addr, is_removing
              FROM consensus_keys WHERE operator_addr = $1 AND chain_id = $2",
        )
        .bind(operator_addr)
        .bind(chain_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| OperatorConsKey {
            operator_addr: r.operator_addr,
            chain_id: r.chain_id,
            pubkey_hex: r.pubkey_hex,
            consensus_address: r.consensus_address,
            prev_pubkey_hex: r.prev_pubkey_hex,
            prev_consensus_address: r.prev_cons_addr,
            is_removing: r.is_removing,
        }))
    }

    async fn save_opted_state(&self, state: &OptedState) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO avs_opt_ins (operator_addr, avs_addr, slash_contract, opt_in_height, opt_out_height, jailed)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (operator_addr, avs_addr) DO UPDATE
              SET slash_contract = EXCLUDED.slash_contract,
                  opt_in_height = EXCLUDED.opt_in_height,
                  opt_out_height = EXCLUDED.opt_out_height,
                  jailed = EXCLUDED.jailed",
        )
        .bind(&state.operator_addr)
        .bind(&state.avs_addr)
        .bind(&state.slash_contract)
        .bind(state.opt_in_height)
        .bind(state.opt_out_height)
        .bind(state.jailed)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_opted_state(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<Option<OptedState>, DbError> {
        let row = sqlx::query_as::<_, OptedRow>(
            r"SELECT operator_addr, avs_addr, slash_contract, opt_in_height, opt_out_height, jailed
              FROM avs_opt_ins WHERE operator_addr = $1 AND avs_addr = $2",
        )
        .bind(operator_addr)
        .bind(avs_addr)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| OptedState {
            operator_addr: r.operator_addr,
            avs_addr: r.avs_addr,
            slash_contract: r.slash_contract,
            opt_in_height: r.opt_in_height,
            opt_out_height: r.opt_out_height,
            jailed: r.jailed,
        }))
    }

    async fn save_operator_usd_value(&self, value: &OperatorUsdValue) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO operator_usd_values (operator_addr, avs_addr, self_usd_value, total_usd_value, active_usd_value, other_usd_value)
              VALUES ($1, $2, $3::NUMERIC, $4::NUMERIC, $5::NUMERIC, $4::NUMERIC - $3::NUMERIC)
              ON CONFLICT (operator_addr, avs_addr) DO UPDATE
              SET self_usd_value = EXCLUDED.self_usd_value,
                  total_usd_value = EXCLUDED.total_usd_value,
                  active_usd_value = EXCLUDED.active_usd_value,
                  other_usd_value = EXCLUDED.total_usd_value - EXCLUDED.self_usd_value",
        )
        .bind(&value.operator_addr)
        .bind(&value.avs_addr)
        .bind(value.self_usd_value.to_string())
        .bind(value.total_usd_value.to_string())
        .bind(value.active_usd_value.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_operator_usd_value(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<Option<OperatorUsdValueRow>, DbError> {
        let row = sqlx::query_as::<_, UsdValueRow>(
            r"SELECT operator_addr, avs_addr,
                     self_usd_value::TEXT AS self_usd_value,
                     total_usd_value::TEXT AS total_usd_value,
                     active_usd_value::TEXT AS active_usd_value,
                     other_usd_value::TEXT AS other_usd_value
              FROM operator_usd_values WHERE operator_addr = $1 AND avs_addr = $2",
        )
        .bind(operator_addr)
        .bind(avs_addr)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(OperatorUsdValueRow {
                self_usd_value: dec(&r.self_usd_value)?,
                total_usd_value: dec(&r.total_usd_value)?,
                active_usd_value: dec(&r.active_usd_value)?,
                other_usd_value: dec(&r.other_usd_value)?,
                operator_addr: r.operator_addr,
                avs_addr: r.avs_addr,
            })
        })
        .transpose()
    }

    async fn delete_operator_usd_value(
        &self,
        operator_addr: &str,
        avs_addr: &str,
    ) -> Result<(), DbError> {
        sqlx::query("DELETE FROM operator_usd_values WHERE operator_addr = $1 AND avs_addr = $2")
            .bind(operator_addr)
            .bind(avs_addr)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn save_avs_usd_value(&self, value: &AvsUsdValue) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO avs_usd_values (avs_addr, usd_value)
              VALUES ($1, $2::NUMERIC)
              ON CONFLICT (avs_addr) DO UPDATE SET usd_value = EXCLUDED.usd_value",
        )
        .bind(&value.avs_addr)
        .bind(value.usd_value.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_avs_usd_value(&self, avs_addr: &str) -> Result<Option<AvsUsdValue>, DbError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT avs_addr, usd_value::TEXT FROM avs_usd_values WHERE avs_addr = $1",
        )
        .bind(avs_addr)
        .fetch_optional(self.pool())
        .await?;
        row.map(|(avs_addr, raw)| {
            Ok(AvsUsdValue {
                avs_addr,
                usd_value: dec(&raw)?,
            })
        })
        .transpose()
    }

    async fn delete_avs_usd_value(&self, avs_addr: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM avs_usd_values WHERE avs_addr = $1")
            .bind(avs_addr)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
