//! REST gateway chain source.
//!
//! Every request pins the query to a height with the
//! `x-cosmos-block-height` header, so a remote node answers the same
//! question the local snapshot source does.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use exocore_types::{DogfoodParams, EpochInfo, Int, SourceValidator};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::SourceError;
use crate::query::{DEFAULT_PAGE_LIMIT, PageRequest, QueryRequest, QueryResponse, next_key};

/// Header selecting the height a Cosmos gateway answers at.
pub const HEIGHT_HEADER: &str = "x-cosmos-block-height";

/// Connection settings for [`RemoteSource`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Gateway base URL, e.g. `http://localhost:1317`.
    pub rest_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Page size for paginated queries.
    pub page_limit: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            rest_url: "http://localhost:1317".to_string(),
            timeout: Duration::from_secs(10),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Chain source querying a node's REST gateway.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    client: reqwest::Client,
    base_url: String,
    page_limit: u64,
}

impl RemoteSource {
    /// Build a source from its configuration.
    pub fn new(config: &RemoteConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            page_limit: config.page_limit,
        })
    }

    /// Page size used by callers that walk paginated queries.
    pub const fn page_limit(&self) -> u64 {
        self.page_limit
    }

    /// Height of the node's latest block.
    pub async fn latest_height(&self) -> Result<i64, SourceError> {
        let body: LatestBlockResponse = self
            .get("/cosmos/base/tendermint/v1beta1/blocks/latest", None, &[])
            .await?;
        body.block.header.height.trim().parse().map_err(|err| {
            SourceError::UnexpectedResponse(format!(
                "latest block height {}: {err}",
                body.block.header.height
            ))
        })
    }

    /// Answer a query at `height`.
    pub async fn query(
        &self,
        height: i64,
        request: &QueryRequest,
    ) -> Result<QueryResponse, SourceError> {
        match request {
            QueryRequest::AssetsParams => {
                let body: ParamsResponse<serde_json::Value> = self
                    .get("/exocore/assets/v1/params", Some(height), &[])
                    .await?;
                Ok(QueryResponse::RawParams(body.params))
            }
            QueryRequest::ExomintParams => {
                let body: ParamsResponse<serde_json::Value> = self
                    .get("/exocore/exomint/v1/params", Some(height), &[])
                    .await?;
                Ok(QueryResponse::RawParams(body.params))
            }
            QueryRequest::DogfoodParams => {
                let body: ParamsResponse<DogfoodParams> = self
                    .get("/exocore/dogfood/v1/params", Some(height), &[])
                    .await?;
                Ok(QueryResponse::DogfoodParams(body.params))
            }
            QueryRequest::DelegatedAmount {
                staker_id,
                asset_id,
                operator_addr,
            } => {
                let body: DelegationInfoResponse = self
                    .get(
                        "/exocore/delegation/v1/single_delegation_info",
                        Some(height),
                        &[
                            ("staker_id", staker_id.clone()),
                            ("asset_id", asset_id.clone()),
                            ("operator_addr", operator_addr.clone()),
                        ],
                    )
                    .await?;
                Ok(QueryResponse::DelegatedAmount(
                    body.max_undelegatable_amount,
                ))
            }
            QueryRequest::DogfoodValidators(page) => {
                let body: ValidatorsResponse = self
                    .get(
                        "/exocore/dogfood/v1/validators",
                        Some(height),
                        &pagination_query(page),
                    )
                    .await?;
                let validators = body
                    .validators
                    .into_iter()
                    .map(RawValidator::into_source_validator)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(QueryResponse::Validators {
                    validators,
                    next_key: next_key(body.pagination.and_then(|p| p.next_key)),
                })
            }
            QueryRequest::EpochInfos(page) => {
                let body: EpochsResponse = self
                    .get(
                        "/exocore/epochs/v1/epochs",
                        Some(height),
                        &pagination_query(page),
                    )
                    .await?;
                Ok(QueryResponse::EpochInfos {
                    epochs: body.epochs,
                    next_key: next_key(body.pagination.and_then(|p| p.next_key)),
                })
            }
            QueryRequest::EpochInfo { identifier } => {
                let body: EpochResponse = self
                    .get(
                        &format!("/exocore/epochs/v1/epoch/{identifier}"),
                        Some(height),
                        &[],
                    )
                    .await?;
                Ok(QueryResponse::EpochInfo(body.epoch))
            }
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        height: Option<i64>,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url).query(query);
        if let Some(height) = height {
            request = request.header(HEIGHT_HEADER, height.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        tracing::trace!(url = %url, height, bytes = bytes.len(), "Chain query answered");
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn pagination_query(page: &PageRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![("pagination.limit", page.limit.to_string())];
    if let Some(key) = page.key.as_deref().filter(|key| !key.is_empty()) {
        query.push(("pagination.key", key.to_string()));
    }
    query
}

// =============================================================================
// Gateway response shapes
// =============================================================================

#[derive(Deserialize)]
struct ParamsResponse<T> {
    params: T,
}

#[derive(Deserialize)]
struct DelegationInfoResponse {
    max_undelegatable_amount: Int,
}

#[derive(Deserialize)]
struct PageResponse {
    #[serde(default)]
    next_key: Option<String>,
}

#[derive(Deserialize)]
struct ValidatorsResponse {
    #[serde(default)]
    validators: Vec<RawValidator>,
    #[serde(default)]
    pagination: Option<PageResponse>,
}

#[derive(Deserialize)]
struct RawValidator {
    #[serde(deserialize_with = "exocore_types::serde_num::i64_str")]
    power: i64,
    pubkey: RawPubKey,
}

#[derive(Deserialize)]
struct RawPubKey {
    key: String,
}

impl RawValidator {
    /// Gateway keys are base64; the indexer stores `0x`-prefixed hex.
    fn into_source_validator(self) -> Result<SourceValidator, SourceError> {
        let bytes = BASE64.decode(self.pubkey.key.as_bytes()).map_err(|err| {
            SourceError::UnexpectedResponse(format!("validator pubkey {}: {err}", self.pubkey.key))
        })?;
        Ok(SourceValidator {
            public_key: format!("0x{}", hex::encode(bytes)),
            power: self.power,
        })
    }
}

#[derive(Deserialize)]
struct EpochsResponse {
    #[serde(default)]
    epochs: Vec<EpochInfo>,
    #[serde(default)]
    pagination: Option<PageResponse>,
}

#[derive(Deserialize)]
struct EpochResponse {
    epoch: EpochInfo,
}

#[derive(Deserialize)]
struct LatestBlockResponse {
    block: LatestBlock,
}

#[derive(Deserialize)]
struct LatestBlock {
    header: LatestHeader,
}

#[derive(Deserialize)]
struct LatestHeader {
    height: String,
}
