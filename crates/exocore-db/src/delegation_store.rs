//! `x/delegation` persistence.
//!
//! Covers staker/operator associations, per-triple delegation states,
//! operator membership sets, undelegation records and the native asset's
//! delegation accumulator. Slashing and maturity touch more than one table
//! and always run inside a single transaction.

use async_trait::async_trait;
use exocore_types::{
    DelegationState, EXOCORE_ASSET_ID, ExoAssetDelegation, Int, UndelegationRecord,
};

use crate::error::DbError;
use crate::pg_store::{PgStore, dec, int};

/// Operations on `x/delegation` records.
#[async_trait]
pub trait DelegationStore: Send + Sync {
    /// Associate a staker with an operator, replacing any previous association.
    async fn save_staker_operator_association(
        &self,
        staker_id: &str,
        operator_addr: &str,
    ) -> Result<(), DbError>;

    /// Remove a staker's association. Missing rows are not an error.
    async fn delete_staker_operator_association(&self, staker_id: &str) -> Result<(), DbError>;

    /// Operator a staker is associated with.
    async fn get_staker_operator_association(
        &self,
        staker_id: &str,
    ) -> Result<Option<String>, DbError>;

    /// Overwrite the delegation state of a `(staker, asset, operator)` triple.
    async fn save_delegation_state(&self, state: &DelegationState) -> Result<(), DbError>;

    /// Delegation state of a triple.
    async fn get_delegation_state(
        &self,
        staker_id: &str,
        asset_id: &str,
        operator_addr: &str,
    ) -> Result<Option<DelegationState>, DbError>;

    /// Add a staker to an operator's set for an asset. Already present is a no-op.
    async fn append_staker_to_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
        staker_id: &str,
    ) -> Result<(), DbError>;

    /// Remove one staker from an operator's set for an asset.
    async fn remove_staker_from_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
        staker_id: &str,
    ) -> Result<(), DbError>;

    /// Empty an operator's set for an asset.
    async fn delete_all_stakers_from_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<(), DbError>;

    /// Stakers delegating `asset_id` to `operator_addr`, ordered by id.
    async fn get_stakers_by_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<Vec<String>, DbError>;

    /// Insert an undelegation record. A replayed record only refreshes
    /// `actual_completed_amount` and `hold_count`.
    async fn save_undelegation_record(&self, record: &UndelegationRecord) -> Result<(), DbError>;

    /// Replace a record's hold count.
    async fn update_undelegation_hold_count(
        &self,
        record_id: &str,
        hold_count: i64,
    ) -> Result<(), DbError>;

    /// Look up an undelegation record.
    async fn get_undelegation_record(
        &self,
        record_id: &str,
    ) -> Result<Option<UndelegationRecord>, DbError>;

    /// Apply an undelegation slash.
    ///
    /// Sets the record's completed amount to `post_slash_amount` and moves
    /// `slashed` from the staker's pending undelegation into its lifetime
    /// slashed total. For the native asset the exo delegation row is debited
    /// instead of the per-asset balance.
    async fn slash_undelegation_record(
        &self,
        record_id: &str,
        post_slash_amount: Int,
        slashed: Int,
    ) -> Result<(), DbError>;

    /// Mark a record matured at `height` with its final amount.
    ///
    /// Returns `false` without changing anything if the record already
    /// matured.
    async fn mature_undelegation_record(
        &self,
        record_id: &str,
        completed_amount: Int,
        height: i64,
    ) -> Result<bool, DbError>;

    /// Add the given deltas to a native asset delegation row, creating it if needed.
    async fn accumulate_exo_asset_delegation(
        &self,
        delta: &ExoAssetDelegation,
    ) -> Result<(), DbError>;

    /// Move `amount` of a native delegation into pending undelegation.
    async fn undelegate_exo_asset(
        &self,
        staker_id: &str,
        operator_addr: &str,
        amount: Int,
    ) -> Result<(), DbError>;

    /// Add `slashed` to a staker's lifetime slashed total for an asset.
    async fn slash_staker_delegation(
        &self,
        staker_id: &str,
        asset_id: &str,
        slashed: Int,
    ) -> Result<(), DbError>;

    /// Move `slashed` of a native delegation into its slashed total.
    async fn slash_exo_asset_delegation(
        &self,
        staker_id: &str,
        operator_addr: &str,
        slashed: Int,
    ) -> Result<(), DbError>;

    /// Native asset delegation of a staker to an operator.
    async fn get_exo_asset_delegation(
        &self,
        staker_id: &str,
        operator_addr: &str,
    ) -> Result<Option<ExoAssetDelegation>, DbError>;
}

#[derive(sqlx::FromRow)]
struct DelegationStateRow {
    staker_id: String,
    asset_id: String,
    operator_addr: String,
    undelegatable_share: String,
    wait_undelegation_amount: String,
}

#[derive(sqlx::FromRow)]
struct UndelegationRow {
    record_id: String,
    staker_id: String,
    asset_id: String,
    operator_addr: String,
    tx_hash: String,
    block_number: i64,
    completed_epoch_identifier: String,
    completed_epoch_number: i64,
    undelegation_id: i64,
    amount: String,
    actual_completed_amount: String,
    hold_count: i64,
    maturity_height: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct ExoDelegationRow {
    staker_id: String,
    operator_addr: String,
    delegated: String,
    pending_undelegation: String,
    slashed: String,
}

#[async_trait]
impl DelegationStore for PgStore {
    async fn save_staker_operator_association(
        &self,
        staker_id: &str,
        operator_addr: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO staker_operator_association (staker_id, operator_addr)
              VALUES ($1, $2)
              ON CONFLICT (staker_id) DO UPDATE SET operator_addr = EXCLUDED.operator_addr",
        )
        .bind(staker_id)
        .bind(operator_addr)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn delete_staker_operator_association(&self, staker_id: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM staker_operator_association WHERE staker_id = $1")
            .bind(staker_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn get_staker_operator_association(
        &self,
        staker_id: &str,
    ) -> Result<Option<String>, DbError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT operator_addr FROM staker_operator_association WHERE staker_id = $1",
        )
        .bind(staker_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(operator,)| operator))
    }

    async fn save_delegation_state(&self, state: &DelegationState) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO delegation_states (staker_id, asset_id, operator_addr, undelegatable_share, wait_undelegation_amount)
              VALUES ($1, $2, $3, $4::NUMERIC, $5::NUMERIC)
              ON CONFLICT (staker_id, asset_id, operator_addr) DO UPDATE
              SET undelegatable_share = EXCLUDED.undelegatable_share,
                  wait_undelegation_amount = EXCLUDED.wait_undelegation_amount",
        )
        .bind(&state.staker_id)
        .bind(&state.asset_id)
        .bind(&state.operator_addr)
        .bind(state.undelegatable_share.to_string())
        .bind(state.wait_undelegation_amount.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_delegation_state(
        &self,
        staker_id: &str,
        asset_id: &str,
        operator_addr: &str,
    ) -> Result<Option<DelegationState>, DbError> {
        let row = sqlx::query_as::<_, DelegationStateRow>(
            r"SELECT staker_id, asset_id, operator_addr,
                     undelegatable_share::TEXT AS undelegatable_share,
                     wait_undelegation_amount::TEXT AS wait_undelegation_amount
              FROM delegation_states
              WHERE staker_id = $1 AND asset_id = $2 AND operator_addr = $3",
        )
        .bind(staker_id)
        .bind(asset_id)
        .bind(operator_addr)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(DelegationState {
                undelegatable_share: dec(&r.undelegatable_share)?,
                wait_undelegation_amount: int(&r.wait_undelegation_amount)?,
                staker_id: r.staker_id,
                asset_id: r.asset_id,
                operator_addr: r.operator_addr,
            })
        })
        .transpose()
    }

    async fn append_staker_to_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
        staker_id: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO operator_asset_stakers (operator_addr, asset_id, staker_id)
              VALUES ($1, $2, $3)
              ON CONFLICT DO NOTHING",
        )
        .bind(operator_addr)
        .bind(asset_id)
        .bind(staker_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn remove_staker_from_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
        staker_id: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"DELETE FROM operator_asset_stakers
              WHERE operator_addr = $1 AND asset_id = $2 AND staker_id = $3",
        )
        .bind(operator_addr)
        .bind(asset_id)
        .bind(staker_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn delete_all_stakers_from_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            "DELETE FROM operator_asset_stakers WHERE operator_addr = $1 AND asset_id = $2",
        )
        .bind(operator_addr)
        .bind(asset_id)
        .execute(self.pool())
        .await?;
        tracing::debug!(
            operator = operator_addr,
            asset_id,
            removed = result.rows_affected(),
            "Cleared operator asset stakers"
        );
        Ok(())
    }

    async fn get_stakers_by_operator_asset(
        &self,
        operator_addr: &str,
        asset_id: &str,
    ) -> Result<Vec<String>, DbError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"SELECT staker_id FROM operator_asset_stakers
              WHERE operator_addr = $1 AND asset_id = $2
              ORDER BY staker_id",
        )
        .bind(operator_addr)
        .bind(asset_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(staker,)| staker).collect())
    }

    async fn save_undelegation_record(&self, record: &UndelegationRecord) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO undelegation_records (
                  record_id, staker_id, asset_id, operator_addr, tx_hash, block_number,
                  completed_epoch_identifier, completed_epoch_number, undelegation_id,
                  amount, actual_completed_amount, hold_count, maturity_height)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::NUMERIC, $11::NUMERIC, $12, $13)
              ON CONFLICT (record_id) DO UPDATE
              SET actual_completed_amount = EXCLUDED.actual_completed_amount,
                  hold_count = EXCLUDED.hold_count",
        )
        .bind(&record.record_id)
        .bind(&record.staker_id)
        .bind(&record.asset_id)
        .bind(&record.operator_addr)
        .bind(&record.tx_hash)
        .bind(record.block_number)
        .bind(&record.completed_epoch_identifier)
        .bind(record.completed_epoch_number)
        .bind(record.undelegation_id)
        .bind(record.amount.to_string())
        .bind(record.actual_completed_amount.to_string())
        .bind(record.hold_count)
        .bind(record.maturity_height)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn update_undelegation_hold_count(
        &self,
        record_id: &str,
        hold_count: i64,
    ) -> Result<(), DbError> {
        if hold_count < 0 {
            return Err(DbError::InvalidState(format!(
                "negative hold count {hold_count} for undelegation {record_id}"
            )));
        }
        let result =
            sqlx::query("UPDATE undelegation_records SET hold_count = $2 WHERE record_id = $1")
                .bind(record_id)
                .bind(hold_count)
                .execute(self.pool())
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("undelegation record", record_id));
        }
        Ok(())
    }

    async fn get_undelegation_record(
        &self,
        record_id: &str,
    ) -> Result<Option<UndelegationRecord>, DbError> {
        let row = sqlx::query_as::<_, UndelegationRow>(
            r"SELECT record_id, staker_id, asset_id, operator_addr, tx_hash, block_number,
                     completed_epoch_identifier, completed_epoch_number, undelegation_id,
                     amount::TEXT AS amount, actual_completed_amount::TEXT AS actual_completed_amount,
                     hold_count, maturity_height
              FROM undelegation_records WHERE record_id = $1",
        )
        .bind(record_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(UndelegationRecord {
                amount: int(&r.amount)?,
                actual_completed_amount: int(&r.actual_completed_amount)?,
                record_id: r.record_id,
                staker_id: r.staker_id,
                asset_id: r.asset_id,
                operator_addr: r.operator_addr,
                tx_hash: r.tx_hash,
                block_number: r.block_number,
                completed_epoch_identifier: r.completed_epoch_identifier,
                completed_epoch_number: r.completed_epoch_number,
                undelegation_id: r.undelegation_id,
                hold_count: r.hold_count,
                maturity_height: r.maturity_height,
            })
        })
        .transpose()
    }

    async fn slash_undelegation_record(
        &self,
        record_id: &str,
        post_slash_amount: Int,
        slashed: Int,
    ) -> Result<(), DbError> {
        let mut tx = self.pool().begin().await?;

        let owner: Option<(String, String, String)> = sqlx::query_as(
            r"UPDATE undelegation_records
              SET actual_completed_amount = $2::NUMERIC
              WHERE record_id = $1
              RETURNING staker_id, asset_id, operator_addr",
        )
        .bind(record_id)
        .bind(post_slash_amount.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        let Some((staker_id, asset_id, operator_addr)) = owner else {
            return Err(DbError::not_found("undelegation record", record_id));
        };

        let result = if asset_id == EXOCORE_ASSET_ID {
            sqlx::query(
                r"UPDATE exo_asset_delegation
                  SET pending_undelegation = pending_undelegation - $3::NUMERIC,
                      slashed = slashed + $3::NUMERIC
                  WHERE staker_id = $1 AND operator_addr = $2",
            )
            .bind(&staker_id)
            .bind(&operator_addr)
            .bind(slashed.to_string())
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(
                r"UPDATE staker_assets
                  SET lifetime_slashed = lifetime_slashed + $3::NUMERIC,
                      pending_undelegation = pending_undelegation - $3::NUMERIC,
                      delegated = deposited - free
                                - (pending_undelegation - $3::NUMERIC)
                                - (lifetime_slashed + $3::NUMERIC)
                  WHERE staker_id = $1 AND asset_id = $2",
            )
            .bind(&staker_id)
            .bind(&asset_id)
            .bind(slashed.to_string())
            .execute(&mut *tx)
            .await?
        };
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "staker balance",
                format!("{staker_id}/{asset_id}/{operator_addr}"),
            ));
        }

        tx.commit().await?;
        tracing::debug!(record_id, %slashed, "Slashed undelegation record");
        Ok(())
    }

    async fn mature_undelegation_record(
        &self,
        record_id: &str,
        completed_amount: Int,
        height: i64,
    ) -> Result<bool, DbError> {
        let mut tx = self.pool().begin().await?;

        let owner: Option<(String, String, String)> = sqlx::query_as(
            r"UPDATE undelegation_records
              SET maturity_height = $3, actual_completed_amount = $2::NUMERIC
              WHERE record_id = $1 AND maturity_height IS NULL
              RETURNING staker_id, asset_id, operator_addr",
        )
        .bind(record_id)
        .bind(completed_amount.to_string())
        .bind(height)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((staker_id, asset_id, operator_addr)) = owner else {
            let exists: Option<(String,)> =
                sqlx::query_as("SELECT record_id FROM undelegation_records WHERE record_id = $1")
                    .bind(record_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(DbError::not_found("undelegation record", record_id));
            }
            return Ok(false);
        };

        if asset_id == EXOCORE_ASSET_ID {
            let result = sqlx::query(
                r"UPDATE exo_asset_delegation
                  SET pending_undelegation = pending_undelegation - $3::NUMERIC
                  WHERE staker_id = $1 AND operator_addr = $2",
            )
            .bind(&staker_id)
            .bind(&operator_addr)
            .bind(completed_amount.to_string())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found(
                    "exo asset delegation",
                    format!("{staker_id}/{operator_addr}"),
                ));
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn accumulate_exo_asset_delegation(
        &self,
        delta: &ExoAssetDelegation,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO exo_asset_delegation (staker_id, operator_addr, delegated, pending_undelegation, slashed)
              VALUES ($1, $2, $3::NUMERIC, $4::NUMERIC, $5::NUMERIC)
              ON CONFLICT (staker_id, operator_addr) DO UPDATE
              SET delegated = exo_asset_delegation.delegated + EXCLUDED.delegated,
                  pending_undelegation = exo_asset_delegation.pending_undelegation + EXCLUDED.pending_undelegation,
                  slashed = exo_asset_delegation.slashed + EXCLUDED.slashed",
        )
        .bind(&delta.staker_id)
        .bind(&delta.operator_addr)
        .bind(delta.delegated.to_string())
        .bind(delta.pending_undelegation.to_string())
        .bind(delta.slashed.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn undelegate_exo_asset(
        &self,
        staker_id: &str,
        operator_addr: &str,
        amount: Int,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE exo_asset_delegation
              SET pending_undelegation = pending_undelegation + $3::NUMERIC,
                  delegated = delegated - $3::NUMERIC
              WHERE staker_id = $1 AND operator_addr = $2",
        )
        .bind(staker_id)
        .bind(operator_addr)
        .bind(amount.to_string())
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "exo asset delegation",
                format!("{staker_id}/{operator_addr}"),
            ));
        }
        Ok(())
    }

    async fn slash_staker_delegation(
        &self,
        staker_id: &str,
        asset_id: &str,
        slashed: Int,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE staker_assets
              SET lifetime_slashed = lifetime_slashed + $3::NUMERIC,
                  delegated = deposited - free - pending_undelegation - (lifetime_slashed + $3::NUMERIC)
              WHERE staker_id = $1 AND asset_id = $2",
        )
        .bind(staker_id)
        .bind(asset_id)
        .bind(slashed.to_string())
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "staker balance",
                format!("{staker_id}/{asset_id}"),
            ));
        }
        Ok(())
    }

    async fn slash_exo_asset_delegation(
        &self,
        staker_id: &str,
        operator_addr: &str,
        slashed: Int,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE exo_asset_delegation
              SET delegated = delegated - $3::NUMERIC,
                  slashed = slashed + $3::NUMERIC
              WHERE staker_id = $1 AND operator_addr = $2",
        )
        .bind(staker_id)
        .bind(operator_addr)
        .bind(slashed.to_string())
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "exo asset delegation",
                format!("{staker_id}/{operator_addr}"),
            ));
        }
        Ok(())
    }

    async fn get_exo_asset_delegation(
        &self,
        staker_id: &str,
        operator_addr: &str,
    ) -> Result<Option<ExoAssetDelegation>, DbError> {
        let row = sqlx::query_as::<_, ExoDelegationRow>(
            r"SELECT staker_id, operator_addr, delegated::TEXT AS delegated,
                     pending_undelegation::TEXT AS pending_undelegation, slashed::TEXT AS slashed
              FROM exo_asset_delegation WHERE staker_id = $1 AND operator_addr = $2",
        )
        .bind(staker_id)
        .bind(operator_addr)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(ExoAssetDelegation {
                delegated: int(&r.delegated)?,
                pending_undelegation: int(&r.pending_undelegation)?,
                slashed: int(&r.slashed)?,
                staker_id: r.staker_id,
                operator_addr: r.operator_addr,
            })
        })
        .transpose()
    }
}
