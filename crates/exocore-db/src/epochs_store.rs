//! `x/epochs` persistence.
//!
//! Definitions are written once. States only move forward: an update whose
//! `current_epoch` is not strictly greater than the stored one is dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exocore_types::EpochInfo;

use crate::error::DbError;
use crate::pg_store::PgStore;

/// Operations on `x/epochs` records.
#[async_trait]
pub trait EpochsStore: Send + Sync {
    /// Insert epoch definitions. Existing definitions are kept.
    async fn save_epoch_definitions(&self, epochs: &[EpochInfo]) -> Result<(), DbError>;

    /// Save an epoch's state if it is newer than the stored one.
    ///
    /// Returns whether the state was written.
    async fn save_epoch_state(&self, epoch: &EpochInfo) -> Result<bool, DbError>;

    /// Definition and state of an epoch.
    async fn get_epoch_state(&self, identifier: &str) -> Result<Option<EpochInfo>, DbError>;
}

#[derive(sqlx::FromRow)]
struct EpochRow {
    identifier: String,
    start_time: DateTime<Utc>,
    duration: String,
    current_epoch: i64,
    current_epoch_start_time: DateTime<Utc>,
    epoch_counting_started: bool,
    current_epoch_start_height: i64,
}

const INSERT_DEFINITION: &str = r"INSERT INTO epoch_definitions (identifier, start_time, duration)
VALUES ($1, $2, $3)
ON CONFLICT (identifier) DO NOTHING";

#[async_trait]
impl EpochsStore for PgStore {
    async fn save_epoch_definitions(&self, epochs: &[EpochInfo]) -> Result<(), DbError> {
        let mut tx = self.pool().begin().await?;
        for epoch in epochs {
            sqlx::query(INSERT_DEFINITION)
                .bind(&epoch.identifier)
                .bind(epoch.start_time)
                .bind(&epoch.duration)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_epoch_state(&self, epoch: &EpochInfo) -> Result<bool, DbError> {
        let mut tx = self.pool().begin().await?;

        // States reference their definition.
        sqlx::query(INSERT_DEFINITION)
            .bind(&epoch.identifier)
            .bind(epoch.start_time)
            .bind(&epoch.duration)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r"INSERT INTO epoch_states (identifier, current_epoch, current_epoch_start_time, epoch_counting_started, current_epoch_start_height)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (identifier) DO UPDATE
              SET current_epoch = EXCLUDED.current_epoch,
                  current_epoch_start_time = EXCLUDED.current_epoch_start_time,
                  epoch_counting_started = EXCLUDED.epoch_counting_started,
                  current_epoch_start_height = EXCLUDED.current_epoch_start_height
              WHERE EXCLUDED.current_epoch > epoch_states.current_epoch",
        )
        .bind(&epoch.identifier)
        .bind(epoch.current_epoch)
        .bind(epoch.current_epoch_start_time)
        .bind(epoch.epoch_counting_started)
        .bind(epoch.current_epoch_start_height)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_epoch_state(&self, identifier: &str) -> Result<Option<EpochInfo>, DbError> {
        let row = sqlx::query_as::<_, EpochRow>(
            r"SELECT d.identifier, d.start_time, d.duration, s.current_epoch,
                     s.current_epoch_start_time, s.epoch_counting_started, s.current_epoch_start_height
              FROM epoch_states s
              JOIN epoch_definitions d ON d.identifier = s.identifier
              WHERE s.identifier = $1",
        )
        .bind(identifier)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| EpochInfo {
            identifier: r.identifier,
            start_time: r.start_time,
            duration: r.duration,
            current_epoch: r.current_epoch,
            current_epoch_start_time: r.current_epoch_start_time,
            epoch_counting_started: r.epoch_counting_started,
            current_epoch_start_height: r.current_epoch_start_height,
        }))
    }
}
