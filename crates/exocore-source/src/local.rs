//! Snapshot-backed chain source.
//!
//! A snapshot file holds the chain state exported at a set of heights. A
//! query at height `h` is answered from the newest snapshot taken at or
//! below `h`, which is how a historical height is loaded from a local
//! store.

use std::path::Path;
use std::sync::Arc;

use exocore_types::{DogfoodParams, EpochInfo, Int, SourceValidator};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::query::{PageRequest, QueryRequest, QueryResponse};

/// One delegation entry of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDelegation {
    /// Staker id.
    pub staker_id: String,
    /// Asset id.
    pub asset_id: String,
    /// Operator address.
    pub operator_addr: String,
    /// Amount still undelegatable.
    pub amount: Int,
}

/// Chain state exported at one height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Height the state was exported at.
    pub height: i64,
    /// `x/assets` params.
    #[serde(default)]
    pub assets_params: Option<serde_json::Value>,
    /// `x/dogfood` params.
    #[serde(default)]
    pub dogfood_params: Option<DogfoodParams>,
    /// `x/exomint` params.
    #[serde(default)]
    pub exomint_params: Option<serde_json::Value>,
    /// Validator set.
    #[serde(default)]
    pub validators: Vec<SourceValidator>,
    /// Epoch infos.
    #[serde(default)]
    pub epochs: Vec<EpochInfo>,
    /// Delegations.
    #[serde(default)]
    pub delegations: Vec<SnapshotDelegation>,
}

/// Chain source answering from in-process snapshots.
#[derive(Debug, Clone)]
pub struct LocalSource {
    snapshots: Arc<Vec<ChainSnapshot>>,
}

impl LocalSource {
    /// Build a source from snapshots in any order.
    pub fn new(mut snapshots: Vec<ChainSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.height);
        Self {
            snapshots: Arc::new(snapshots),
        }
    }

    /// Load snapshots from a JSON file holding an array of snapshots.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let snapshots: Vec<ChainSnapshot> = serde_json::from_slice(&raw)?;
        tracing::info!(
            path = %path.display(),
            snapshots = snapshots.len(),
            "Loaded chain snapshots"
        );
        Ok(Self::new(snapshots))
    }

    /// Newest snapshot taken at or below `height`.
    fn snapshot_at(&self, height: i64) -> Result<&ChainSnapshot, SourceError> {
        self.snapshots
            .iter()
            .rev()
            .find(|snapshot| snapshot.height <= height)
            .ok_or(SourceError::NoSnapshot { height })
    }

    /// Height of the newest snapshot.
    pub fn latest_height(&self) -> Result<i64, SourceError> {
        self.snapshots
            .last()
            .map(|snapshot| snapshot.height)
            .ok_or_else(|| SourceError::NotFound("no snapshots loaded".to_string()))
    }

    /// Answer a query at `height`.
    pub fn query(&self, height: i64, request: &QueryRequest) -> Result<QueryResponse, SourceError> {
        let snapshot = self.snapshot_at(height)?;
        match request {
            QueryRequest::AssetsParams => snapshot
                .assets_params
                .clone()
                .map(QueryResponse::RawParams)
                .ok_or_else(|| missing("assets params", height)),
            QueryRequest::ExomintParams => snapshot
                .exomint_params
                .clone()
                .map(QueryResponse::RawParams)
                .ok_or_else(|| missing("exomint params", height)),
            QueryRequest::DogfoodParams => snapshot
                .dogfood_params
                .clone()
                .map(QueryResponse::DogfoodParams)
                .ok_or_else(|| missing("dogfood params", height)),
            QueryRequest::DelegatedAmount {
                staker_id,
                asset_id,
                operator_addr,
            } => snapshot
                .delegations
                .iter()
                .find(|d| {
                    d.staker_id == *staker_id
                        && d.asset_id == *asset_id
                        && d.operator_addr == *operator_addr
                })
                .map(|d| QueryResponse::DelegatedAmount(d.amount))
                .ok_or_else(|| {
                    SourceError::NotFound(format!(
                        "delegation {staker_id}/{asset_id}/{operator_addr} at height {height}"
                    ))
                }),
            QueryRequest::DogfoodValidators(page) => {
                let (validators, next_key) = paginate(&snapshot.validators, page)?;
                Ok(QueryResponse::Validators {
                    validators,
                    next_key,
                })
            }
            QueryRequest::EpochInfos(page) => {
                let (epochs, next_key) = paginate(&snapshot.epochs, page)?;
                Ok(QueryResponse::EpochInfos { epochs, next_key })
            }
            QueryRequest::EpochInfo { identifier } => snapshot
                .epochs
                .iter()
                .find(|epoch| epoch.identifier == *identifier)
                .cloned()
                .map(QueryResponse::EpochInfo)
                .ok_or_else(|| missing(&format!("epoch {identifier}"), height)),
        }
    }
}

fn missing(what: &str, height: i64) -> SourceError {
    SourceError::NotFound(format!("{what} at height {height}"))
}

/// Slice one page out of `items`. Keys are decimal offsets.
fn paginate<T: Clone>(
    items: &[T],
    page: &PageRequest,
) -> Result<(Vec<T>, Option<String>), SourceError> {
    let offset = match page.key.as_deref() {
        None | Some("") => 0,
        Some(key) => key
            .parse::<usize>()
            .map_err(|err| SourceError::UnexpectedResponse(format!("page key {key}: {err}")))?,
    };
    let limit = usize::try_from(page.limit.max(1)).unwrap_or(usize::MAX);
    let end = offset.saturating_add(limit).min(items.len());
    let chunk = items.get(offset..end).map(<[T]>::to_vec).unwrap_or_default();
    let next_key = (end < items.len()).then(|| end.to_string());
    Ok((chunk, next_key))
}
