//! `x/dogfood` persistence: params, epoch schedules, validator set and
//! double-sign evidence.

use async_trait::async_trait;
use exocore_types::{
    ConsensusAddrToPrune, DogfoodParams, DoubleSignEvidence, Int, OptOutExpiry,
    UndelegationMaturity, Validator, ValidatorVotingPower, Vote,
};

use crate::error::DbError;
use crate::pg_store::{PgStore, int};

/// Operations on `x/dogfood` records.
#[async_trait]
pub trait DogfoodStore: Send + Sync {
    /// Replace the module params.
    async fn save_dogfood_params(&self, params: &DogfoodParams, height: i64)
    -> Result<(), DbError>;

    /// Stored params.
    async fn get_dogfood_params(&self) -> Result<Option<DogfoodParams>, DbError>;

    /// Schedule an operator's opt-out for `epoch`.
    async fn save_opt_out_expiry(&self, epoch: i64, operator_addr: &str) -> Result<(), DbError>;

    /// Mark every opt-out scheduled for `epoch` complete at `height`.
    /// Returns the number of rows marked.
    async fn complete_opt_outs(&self, epoch: i64, height: i64) -> Result<u64, DbError>;

    /// Scheduled opt-out of an operator.
    async fn get_opt_out_expiry(&self, operator_addr: &str)
    -> Result<Option<OptOutExpiry>, DbError>;

    /// Schedule a consensus address for pruning at `epoch`.
    async fn save_consensus_addr_to_prune(
        &self,
        epoch: i64,
        consensus_addr: &str,
    ) -> Result<(), DbError>;

    /// Mark every pruning scheduled for `epoch` complete at `height`.
    async fn complete_consensus_addrs_pruning(&self, epoch: i64, height: i64)
    -> Result<u64, DbError>;

    /// Scheduled pruning of a consensus address.
    async fn get_consensus_addr_to_prune(
        &self,
        consensus_addr: &str,
    ) -> Result<Option<ConsensusAddrToPrune>, DbError>;

    /// Schedule an undelegation record to mature at `epoch`.
    async fn save_undelegation_maturity(&self, epoch: i64, record_key: &str)
    -> Result<(), DbError>;

    /// Mark every maturity scheduled for `epoch` complete at `height`.
    async fn mature_undelegations(&self, epoch: i64, height: i64) -> Result<u64, DbError>;

    /// Scheduled maturity of an undelegation record.
    async fn get_undelegation_maturity(
        &self,
        record_key: &str,
    ) -> Result<Option<UndelegationMaturity>, DbError>;

    /// Replace the last total voting power.
    async fn save_last_total_power(&self, total_power: Int) -> Result<(), DbError>;

    /// Last total voting power.
    async fn get_last_total_power(&self) -> Result<Option<Int>, DbError>;

    /// Insert or refresh validators. Validators are never deleted.
    async fn save_validators(&self, validators: &[Validator]) -> Result<(), DbError>;

    /// Look up a validator.
    async fn get_validator(&self, consensus_address: &str) -> Result<Option<Validator>, DbError>;

    /// Append voting powers. A power already recorded at its height is kept.
    async fn save_validator_voting_powers(
        &self,
        powers: &[ValidatorVotingPower],
    ) -> Result<(), DbError>;

    /// Voting power history of a validator, oldest first.
    async fn get_validator_voting_powers(
        &self,
        consensus_address: &str,
    ) -> Result<Vec<ValidatorVotingPower>, DbError>;

    /// Record duplicate-vote evidence. Replays are no-ops.
    async fn save_double_sign_evidences(
        &self,
        evidences: &[DoubleSignEvidence],
    ) -> Result<(), DbError>;

    /// Evidence recorded at a height.
    async fn get_double_sign_evidences(
        &self,
        height: i64,
    ) -> Result<Vec<DoubleSignEvidence>, DbError>;
}

#[derive(sqlx::FromRow)]
struct ParamsRow {
    epochs_until_unbonded: i64,
    epoch_identifier: String,
    max_validators: i64,
    historical_entries: i64,
    min_self_delegation: String,
    asset_ids: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct EvidenceRow {
    height: i64,
    a_type: i32,
    a_height: i64,
    a_round: i32,
    a_block_id: String,
    a_validator_address: String,
    a_validator_index: i32,
    a_signature: String,
    b_type: i32,
    b_height: i64,
    b_round: i32,
    b_block_id: String,
    b_validator_address: String,
    b_validator_index: i32,
    b_signature: String,
}

fn u32_column(value: i64, column: &str) -> Result<u32, DbError> {
    u32::try_from(value)
        .map_err(|e| DbError::InvalidState(format!("{column} out of range ({value}): {e}")))
}

/// Insert a vote, or find the existing one with the same signature.
async fn upsert_vote(
    conn: &mut sqlx::PgConnection,
    vote: &Vote,
) -> Result<i64, DbError> {
    let (id,): (i64,) = sqlx::query_as(
        r"INSERT INTO double_sign_votes (vote_type, height, round, block_id, validator_address, validator_index, signature)
          VALUES ($1, $2, $3, $4, $5, $6, $7)
          ON CONFLICT (signature) DO UPDATE SET signature = EXCLUDED.signature
          RETURNING id",
    )
    .bind(vote.vote_type)
    .bind(vote.height)
    .bind(vote.round)
    .bind(&vote.block_id)
    .bind(&vote.validator_address)
    .bind(vote.validator_index)
    .bind(&vote.signature)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

#[async_trait]
impl DogfoodStore for PgStore {
    async fn save_dogfood_params(
        &self,
        params: &DogfoodParams,
        height: i64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO dogfood_params (one_row_id, height, epochs_until_unbonded, epoch_identifier, max_validators, historical_entries, min_self_delegation, asset_ids)
              VALUES (TRUE, $1, $2, $3, $4, $5, $6::NUMERIC, $7)
              ON CONFLICT (one_row_id) DO UPDATE
              SET height = EXCLUDED.height,
                  epochs_until_unbonded = EXCLUDED.epochs_until_unbonded,
                  epoch_identifier = EXCLUDED.epoch_identifier,
                  max_validators = EXCLUDED.max_validators,
                  historical_entries = EXCLUDED.historical_entries,
                  min_self_delegation = EXCLUDED.min_self_delegation,
                  asset_ids = EXCLUDED.asset_ids",
        )
        .bind(height)
        .bind(i64::from(params.epochs_until_unbonded))
        .bind(&params.epoch_identifier)
        .bind(i64::from(params.max_validators))
        .bind(i64::from(params.historical_entries))
        .bind(params.min_self_delegation.to_string())
        .bind(&params.asset_ids)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_dogfood_params(&self) -> Result<Option<DogfoodParams>, DbError> {
        let row = sqlx::query_as::<_, ParamsRow>(
            r"SELECT epochs_until_unbonded, epoch_identifier, max_validators, historical_entries,
                     min_self_delegation::TEXT AS min_self_delegation, asset_ids
              FROM dogfood_params",
        )
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| {
            Ok(DogfoodParams {
                epochs_until_unbonded: u32_column(r.epochs_until_unbonded, "epochs_until_unbonded")?,
                epoch_identifier: r.epoch_identifier,
                max_validators: u32_column(r.max_validators, "max_validators")?,
                historical_entries: u32_column(r.historical_entries, "historical_entries")?,
                min_self_delegation: int(&r.min_self_delegation)?,
                asset_ids: r.asset_ids,
            })
        })
        .transpose()
    }

    async fn save_opt_out_expiry(&self, epoch: i64, operator_addr: &str) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO opt_out_expiries (operator_addr, epoch_number, completion_height)
              VALUES ($1, $2, NULL)
              ON CONFLICT (operator_addr) DO UPDATE
              SET epoch_number = EXCLUDED.epoch_number, completion_height = NULL",
        )
        .bind(operator_addr)
        .bind(epoch)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn complete_opt_outs(&self, epoch: i64, height: i64) -> Result<u64, DbError> {
        let result = sqlx::query(
            r"UPDATE opt_out_expiries SET completion_height = $2
              WHERE epoch_number = $1 AND completion_height IS NULL",
        )
        .bind(epoch)
        .bind(height)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn get_opt_out_expiry(
        &self,
        operator_addr: &str,
    ) -> Result<Option<OptOutExpiry>, DbError> {
        let row: Option<(i64, String, Option<i64>)> = sqlx::query_as(
            r"SELECT epoch_number, operator_addr, completion_height
              FROM opt_out_expiries WHERE operator_addr = $1",
        )
        .bind(operator_addr)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(epoch_number, operator_addr, completion_height)| OptOutExpiry {
            epoch_number,
            operator_addr,
            completion_height,
        }))
    }

    async fn save_consensus_addr_to_prune(
        &self,
        epoch: i64,
        consensus_addr: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO consensus_addrs_to_prune (consensus_addr, epoch_number, completion_height)
              VALUES ($1, $2, NULL)
              ON CONFLICT (consensus_addr) DO UPDATE
              SET epoch_number = EXCLUDED.epoch_number, completion_height = NULL",
        )
        .bind(consensus_addr)
        .bind(epoch)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn complete_consensus_addrs_pruning(
        &self,
        epoch: i64,
        height: i64,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r"UPDATE consensus_addrs_to_prune SET completion_height = $2
              WHERE epoch_number = $1 AND completion_height IS NULL",
        )
        .bind(epoch)
        .bind(height)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn get_consensus_addr_to_prune(
        &self,
        consensus_addr: &str,
    ) -> Result<Option<ConsensusAddrToPrune>, DbError> {
        let row: Option<(i64, String, Option<i64>)> = sqlx::query_as(
            r"SELECT epoch_number, consensus_addr, completion_height
              FROM consensus_addrs_to_prune WHERE consensus_addr = $1",
        )
        .bind(consensus_addr)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(
            |(epoch_number, consensus_addr, completion_height)| ConsensusAddrToPrune {
                epoch_number,
                consensus_addr,
                completion_height,
            },
        ))
    }

    async fn save_undelegation_maturity(
        &self,
        epoch: i64,
        record_key: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO undelegation_maturities (record_key, epoch_number, completion_height)
              VALUES ($1, $2, NULL)
              ON CONFLICT (record_key) DO UPDATE
              SET epoch_number = EXCLUDED.epoch_number, completion_height = NULL",
        )
        .bind(record_key)
        .bind(epoch)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn mature_undelegations(&self, epoch: i64, height: i64) -> Result<u64, DbError> {
        let result = sqlx::query(
            r"UPDATE undelegation_maturities SET completion_height = $2
              WHERE epoch_number = $1 AND completion_height IS NULL",
        )
        .bind(epoch)
        .bind(height)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn get_undelegation_maturity(
        &self,
        record_key: &str,
    ) -> Result<Option<UndelegationMaturity>, DbError> {
        let row: Option<(i64, String, Option<i64>)> = sqlx::query_as(
            r"SELECT epoch_number, record_key, completion_height
              FROM undelegation_maturities WHERE record_key = $1",
        )
        .bind(record_key)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(
            |(epoch_number, record_key, completion_height)| UndelegationMaturity {
                epoch_number,
                record_key,
                completion_height,
            },
        ))
    }

    async fn save_last_total_power(&self, total_power: Int) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO last_total_power (one_row_id, total_power)
              VALUES (TRUE, $1::NUMERIC)
              ON CONFLICT (one_row_id) DO UPDATE SET total_power = EXCLUDED.total_power",
        )
        .bind(total_power.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_last_total_power(&self) -> Result<Option<Int>, DbError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT total_power::TEXT FROM last_total_power")
                .fetch_optional(self.pool())
                .await?;
        row.map(|(raw,)| int(&raw)).transpose()
    }

    async fn save_validators(&self, validators: &[Validator]) -> Result<(), DbError> {
        if validators.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for validator in validators {
            sqlx::query(
                r"INSERT INTO validators (consensus_address, consensus_pubkey)
                  VALUES ($1, $2)
                  ON CONFLICT (consensus_address) DO UPDATE
                  SET consensus_pubkey = EXCLUDED.consensus_pubkey",
            )
            .bind(&validator.consensus_address)
            .bind(&validator.consensus_pubkey)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_validator(&self, consensus_address: &str) -> Result<Option<Validator>, DbError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT consensus_address, consensus_pubkey FROM validators WHERE consensus_address = $1",
        )
        .bind(consensus_address)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(consensus_address, consensus_pubkey)| Validator {
            consensus_address,
            consensus_pubkey,
        }))
    }

    async fn save_validator_voting_powers(
        &self,
        powers: &[ValidatorVotingPower],
    ) -> Result<(), DbError> {
        if powers.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for power in powers {
            sqlx::query(
                r"INSERT INTO validator_voting_powers (consensus_address, voting_power, height)
                  VALUES ($1, $2, $3)
                  ON CONFLICT (consensus_address, height) DO NOTHING",
            )
            .bind(&power.consensus_address)
            .bind(power.voting_power)
            .bind(power.height)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_validator_voting_powers(
        &self,
        consensus_address: &str,
    ) -> Result<Vec<ValidatorVotingPower>, DbError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r"SELECT consensus_address, voting_power, height
              FROM validator_voting_powers WHERE consensus_address = $1
              ORDER BY height",
        )
        .bind(consensus_address)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(consensus_address, voting_power, height)| ValidatorVotingPower {
                consensus_address,
                voting_power,
                height,
            })
            .collect())
    }

    async fn save_double_sign_evidences(
        &self,
        evidences: &[DoubleSignEvidence],
    ) -> Result<(), DbError> {
        if evidences.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool().begin().await?;
        for evidence in evidences {
            let vote_a = upsert_vote(&mut tx, &evidence.vote_a).await?;
            let vote_b = upsert_vote(&mut tx, &evidence.vote_b).await?;
            sqlx::query(
                r"INSERT INTO double_sign_evidences (height, vote_a_id, vote_b_id)
                  VALUES ($1, $2, $3)
                  ON CONFLICT (vote_a_id, vote_b_id) DO NOTHING",
            )
            .bind(evidence.height)
            .bind(vote_a)
            .bind(vote_b)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_double_sign_evidences(
        &self,
        height: i64,
    ) -> Result<Vec<DoubleSignEvidence>, DbError> {
        let rows = sqlx::query_as::<_, EvidenceRow>(
            r"SELECT e.height,
                     a.vote_type AS a_type, a.height AS a_height, a.round AS a_round,
                     a.block_id AS a_block_id, a.validator_address AS a_validator_address,
                     a.validator_index AS a_validator_index, a.signature AS a_signature,
                     b.vote_type AS b_type, b.height AS b_height, b.round AS b_round,
                     b.block_id AS b_block_id, b.validator_address AS b_validator_address,
                     b.validator_index AS b_validator_index, b.signature AS b_signature
              FROM double_sign_evidences e
              JOIN double_sign_votes a ON a.id = e.vote_a_id
              JOIN double_sign_votes b ON b.id = e.vote_b_id
              WHERE e.height = $1
              ORDER BY e.vote_a_id, e.vote_b_id",
        )
        .bind(height)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| DoubleSignEvidence {
                height: r.height,
                vote_a: Vote {
                    vote_type: r.a_type,
                    height: r.a_height,
                    round: r.a_round,
                    block_id: r.a_block_id,
                    validator_address: r.a_validator_address,
                    validator_index: r.a_validator_index,
                    signature: r.a_signature,
                },
                vote_b: Vote {
                    vote_type: r.b_type,
                    height: r.b_height,
                    round: r.b_round,
                    block_id: r.b_block_id,
                    validator_address: r.b_validator_address,
                    validator_index: r.b_validator_index,
                    signature: r.b_signature,
                },
            })
            .collect())
    }
}
