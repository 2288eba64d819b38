//! Typed per-module views over a [`ChainSource`].
//!
//! Projectors depend on these rather than on raw queries, so each one only
//! sees the questions its module can ask.

use exocore_types::{DogfoodParams, EpochInfo, Int, SourceValidator};

use crate::error::SourceError;
use crate::query::{PageRequest, QueryRequest, QueryResponse};
use crate::source::ChainSource;

fn unexpected(expected: &str, got: &QueryResponse) -> SourceError {
    SourceError::UnexpectedResponse(format!("expected {expected}, got {}", got.kind()))
}

// =============================================================================
// assets
// =============================================================================

/// `x/assets` queries.
#[derive(Debug, Clone)]
pub struct AssetsSource {
    source: ChainSource,
}

impl AssetsSource {
    /// Wrap a chain source.
    pub const fn new(source: ChainSource) -> Self {
        Self { source }
    }

    /// Module params at `height`.
    pub async fn get_params(&self, height: i64) -> Result<serde_json::Value, SourceError> {
        match self.source.query(height, &QueryRequest::AssetsParams).await? {
            QueryResponse::RawParams(params) => Ok(params),
            other => Err(unexpected("assets params", &other)),
        }
    }
}

// =============================================================================
// delegation
// =============================================================================

/// `x/delegation` queries.
#[derive(Debug, Clone)]
pub struct DelegationSource {
    source: ChainSource,
}

impl DelegationSource {
    /// Wrap a chain source.
    pub const fn new(source: ChainSource) -> Self {
        Self { source }
    }

    /// Amount `staker_id` can still undelegate from `operator_addr` at `height`.
    pub async fn get_delegated_amount(
        &self,
        height: i64,
        staker_id: &str,
        asset_id: &str,
        operator_addr: &str,
    ) -> Result<Int, SourceError> {
        let request = QueryRequest::DelegatedAmount {
            staker_id: staker_id.to_string(),
            asset_id: asset_id.to_string(),
            operator_addr: operator_addr.to_string(),
        };
        match self.source.query(height, &request).await? {
            QueryResponse::DelegatedAmount(amount) => Ok(amount),
            other => Err(unexpected("delegated amount", &other)),
        }
    }
}

// =============================================================================
// dogfood
// =============================================================================

/// `x/dogfood` queries.
#[derive(Debug, Clone)]
pub struct DogfoodSource {
    source: ChainSource,
}

impl DogfoodSource {
    /// Wrap a chain source.
    pub const fn new(source: ChainSource) -> Self {
        Self { source }
    }

    /// Module params at `height`.
    pub async fn get_params(&self, height: i64) -> Result<DogfoodParams, SourceError> {
        match self.source.query(height, &QueryRequest::DogfoodParams).await? {
            QueryResponse::DogfoodParams(params) => Ok(params),
            other => Err(unexpected("dogfood params", &other)),
        }
    }

    /// The full validator set at `height`, walking every page.
    pub async fn get_validators(&self, height: i64) -> Result<Vec<SourceValidator>, SourceError> {
        let mut page = PageRequest::first(self.source.page_limit());
        let mut all = Vec::new();
        loop {
            let request = QueryRequest::DogfoodValidators(page.clone());
            match self.source.query(height, &request).await? {
                QueryResponse::Validators {
                    validators,
                    next_key,
                } => {
                    all.extend(validators);
                    match next_key {
                        Some(key) => page.key = Some(key),
                        None => break,
                    }
                }
                other => return Err(unexpected("validators", &other)),
            }
        }
        Ok(all)
    }

    /// Latest height known to the source.
    pub async fn latest_height(&self) -> Result<i64, SourceError> {
        self.source.latest_height().await
    }
}

// =============================================================================
// epochs
// =============================================================================

/// `x/epochs` queries.
#[derive(Debug, Clone)]
pub struct EpochsSource {
    source: ChainSource,
}

impl EpochsSource {
    /// Wrap a chain source.
    pub const fn new(source: ChainSource) -> Self {
        Self { source }
    }

    /// Every epoch info at `height`, walking every page.
    pub async fn get_epoch_infos(&self, height: i64) -> Result<Vec<EpochInfo>, SourceError> {
        let mut page = PageRequest::first(self.source.page_limit());
        let mut all = Vec::new();
        loop {
            let request = QueryRequest::EpochInfos(page.clone());
            match self.source.query(height, &request).await? {
                QueryResponse::EpochInfos { epochs, next_key } => {
                    all.extend(epochs);
                    match next_key {
                        Some(key) => page.key = Some(key),
                        None => break,
                    }
                }
                other => return Err(unexpected("epoch infos", &other)),
            }
        }
        Ok(all)
    }

    /// One epoch info at `height`.
    pub async fn get_epoch_info(
        &self,
        height: i64,
        identifier: &str,
    ) -> Result<EpochInfo, SourceError> {
        let request = QueryRequest::EpochInfo {
            identifier: identifier.to_string(),
        };
        match self.source.query(height, &request).await? {
            QueryResponse::EpochInfo(info) => Ok(info),
            other => Err(unexpected("epoch info", &other)),
        }
    }
}

// =============================================================================
// exomint
// =============================================================================

/// `x/exomint` queries.
#[derive(Debug, Clone)]
pub struct ExomintSource {
    source: ChainSource,
}

impl ExomintSource {
    /// Wrap a chain source.
    pub const fn new(source: ChainSource) -> Self {
        Self { source }
    }

    /// Module params at `height`.
    pub async fn get_params(&self, height: i64) -> Result<serde_json::Value, SourceError> {
        match self.source.query(height, &QueryRequest::ExomintParams).await? {
            QueryResponse::RawParams(params) => Ok(params),
            other => Err(unexpected("exomint params", &other)),
        }
    }
}

// =============================================================================
// bundle
// =============================================================================

/// One adapter per module, all sharing one chain source.
#[derive(Debug, Clone)]
pub struct Sources {
    /// `x/assets`.
    pub assets: AssetsSource,
    /// `x/delegation`.
    pub delegation: DelegationSource,
    /// `x/dogfood`.
    pub dogfood: DogfoodSource,
    /// `x/epochs`.
    pub epochs: EpochsSource,
    /// `x/exomint`.
    pub exomint: ExomintSource,
}

impl Sources {
    /// Build every adapter over `source`.
    pub fn new(source: &ChainSource) -> Self {
        Self {
            assets: AssetsSource::new(source.clone()),
            delegation: DelegationSource::new(source.clone()),
            dogfood: DogfoodSource::new(source.clone()),
            epochs: EpochsSource::new(source.clone()),
            exomint: ExomintSource::new(source.clone()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::local::{ChainSnapshot, LocalSource};
    use chrono::{TimeZone, Utc};

    fn epoch(identifier: &str, current: i64) -> EpochInfo {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        EpochInfo {
            identifier: identifier.to_string(),
            start_time: start,
            duration: "3600s".to_string(),
            current_epoch: current,
            current_epoch_start_time: start,
            epoch_counting_started: true,
            current_epoch_start_height: current,
        }
    }

    fn sources(snapshots: Vec<ChainSnapshot>) -> Sources {
        Sources::new(&ChainSource::Local(LocalSource::new(snapshots)))
    }

    fn empty(height: i64) -> ChainSnapshot {
        ChainSnapshot {
            height,
            assets_params: None,
            dogfood_params: None,
            exomint_params: None,
            validators: Vec::new(),
            epochs: Vec::new(),
            delegations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn validators_are_collected_across_pages() {
        let mut snapshot = empty(1);
        snapshot.validators = (0..250)
            .map(|n: i64| SourceValidator {
                public_key: format!("0x{n:064x}"),
                power: n,
            })
            .collect();
        let sources = sources(vec![snapshot]);

        let validators = sources.dogfood.get_validators(1).await.unwrap();
        assert_eq!(validators.len(), 250);
        assert_eq!(validators[249].power, 249);
    }

    #[tokio::test]
    async fn epoch_info_by_identifier() {
        let mut snapshot = empty(7);
        snapshot.epochs = vec![epoch("hour", 3), epoch("day", 1)];
        let sources = sources(vec![snapshot]);

        let day = sources.epochs.get_epoch_info(9, "day").await.unwrap();
        assert_eq!(day.current_epoch, 1);
        assert_eq!(sources.epochs.get_epoch_infos(7).await.unwrap().len(), 2);
        assert!(matches!(
            sources.epochs.get_epoch_info(9, "week").await,
            Err(SourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn exomint_params_are_returned_verbatim() {
        let mut snapshot = empty(3);
        snapshot.exomint_params = Some(serde_json::json!({ "mint_denom": "hua" }));
        let sources = sources(vec![snapshot]);

        let params = sources.exomint.get_params(3).await.unwrap();
        assert_eq!(params["mint_denom"], "hua");
    }
}
