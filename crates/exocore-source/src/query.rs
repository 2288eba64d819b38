//! Query and response shapes shared by every chain source.
//!
//! A query is always evaluated at a height. Paginated queries carry a
//! [`PageRequest`]; the response's `next_key` is `None` on the last page.

use exocore_types::{DogfoodParams, EpochInfo, Int, SourceValidator};

/// Validators and epochs are fetched this many at a time.
pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Cursor for a paginated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Opaque key returned by the previous page; `None` for the first page.
    pub key: Option<String>,
    /// Maximum number of items to return.
    pub limit: u64,
}

impl PageRequest {
    /// The first page with the given size.
    pub const fn first(limit: u64) -> Self {
        Self { key: None, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_LIMIT)
    }
}

/// A point-in-time query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    /// `x/assets` params.
    AssetsParams,
    /// Amount a staker can still undelegate from an operator.
    DelegatedAmount {
        /// Staker id.
        staker_id: String,
        /// Asset id.
        asset_id: String,
        /// Operator address.
        operator_addr: String,
    },
    /// `x/dogfood` params.
    DogfoodParams,
    /// One page of the validator set.
    DogfoodValidators(PageRequest),
    /// One page of epoch infos.
    EpochInfos(PageRequest),
    /// A single epoch info.
    EpochInfo {
        /// Epoch identifier.
        identifier: String,
    },
    /// `x/exomint` params.
    ExomintParams,
}

/// Answer to a [`QueryRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponse {
    /// Params kept verbatim (`x/assets`, `x/exomint`).
    RawParams(serde_json::Value),
    /// A delegated amount.
    DelegatedAmount(Int),
    /// `x/dogfood` params.
    DogfoodParams(DogfoodParams),
    /// One page of validators.
    Validators {
        /// Validators on this page.
        validators: Vec<SourceValidator>,
        /// Key of the next page.
        next_key: Option<String>,
    },
    /// One page of epoch infos.
    EpochInfos {
        /// Epochs on this page.
        epochs: Vec<EpochInfo>,
        /// Key of the next page.
        next_key: Option<String>,
    },
    /// A single epoch info.
    EpochInfo(EpochInfo),
}

impl QueryResponse {
    /// Short name of the variant, for error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RawParams(_) => "raw params",
            Self::DelegatedAmount(_) => "delegated amount",
            Self::DogfoodParams(_) => "dogfood params",
            Self::Validators { .. } => "validators",
            Self::EpochInfos { .. } => "epoch infos",
            Self::EpochInfo(_) => "epoch info",
        }
    }
}

/// Normalise a pagination key: an empty key means there is no next page.
pub(crate) fn next_key(raw: Option<String>) -> Option<String> {
    raw.filter(|key| !key.is_empty())
}
