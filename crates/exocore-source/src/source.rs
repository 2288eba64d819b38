//! The point-in-time query boundary.
//!
//! Uses enum dispatch instead of trait objects: both backends answer the
//! same [`QueryRequest`] with the same [`QueryResponse`], and async methods
//! are not dyn-compatible.

use crate::error::SourceError;
use crate::local::LocalSource;
use crate::query::{QueryRequest, QueryResponse};
use crate::remote::RemoteSource;

/// A chain source answering queries at a height.
#[derive(Debug, Clone)]
pub enum ChainSource {
    /// In-process snapshots.
    Local(LocalSource),
    /// A node's REST gateway.
    Remote(RemoteSource),
}

impl ChainSource {
    /// Answer `request` against the chain state at `height`.
    pub async fn query(
        &self,
        height: i64,
        request: &QueryRequest,
    ) -> Result<QueryResponse, SourceError> {
        match self {
            Self::Local(source) => source.query(height, request),
            Self::Remote(source) => source.query(height, request).await,
        }
    }

    /// Newest height the source can answer at.
    pub async fn latest_height(&self) -> Result<i64, SourceError> {
        match self {
            Self::Local(source) => source.latest_height(),
            Self::Remote(source) => source.latest_height().await,
        }
    }

    /// Page size to request when walking a paginated query.
    pub const fn page_limit(&self) -> u64 {
        match self {
            Self::Local(_) => crate::query::DEFAULT_PAGE_LIMIT,
            Self::Remote(source) => source.page_limit(),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }
}

impl From<LocalSource> for ChainSource {
    fn from(source: LocalSource) -> Self {
        Self::Local(source)
    }
}

impl From<RemoteSource> for ChainSource {
    fn from(source: RemoteSource) -> Self {
        Self::Remote(source)
    }
}
