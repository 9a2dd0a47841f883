//! JSON-RPC client for Bitcoin Core style nodes. Implements [`ChainSource`] on
//! top of `getblockchaininfo`, `getblockhash`, and verbose `getblock`.

use crate::processor::source::ChainSource;
use crate::rpc::auth::basic_auth_headers;
use crate::rpc::metrics::{RpcMetrics, RpcMetricsSnapshot};
use crate::rpc::options::RpcClientOptions;
use crate::rpc::retry::{RetryContext, BLOCK_HASH_RETRY, BLOCK_RETRY, CHAIN_INFO_RETRY};
use crate::rpc::types::{BlockchainInfoResponse, VerboseBlock};
use crate::runtime::config::PollerConfig;
use crate::scan::block::{Block, ChainInfo};
use anyhow::{anyhow, Result};
use bitcoin::BlockHash;
use futures::future::BoxFuture;
use jsonrpsee::core::client::{ClientT, Error as JsonRpcError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use std::{future::Future, sync::Arc};
use tokio::time::{sleep, timeout, Instant};

/// Bitcoin Core's `RPC_INVALID_PARAMETER`, returned for heights above the tip.
const RPC_INVALID_PARAMETER: i32 = -8;
const GETBLOCK_VERBOSE_WITH_TX: u8 = 2;

#[derive(Debug)]
pub enum RpcError {
    Timeout { method: &'static str },
    HeightOutOfRange { height: u64 },
    MalformedResponse { method: &'static str, reason: String },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Timeout { method } => write!(f, "rpc method {method} timed out"),
            RpcError::HeightOutOfRange { height } => {
                write!(f, "requested height {height} is above the current tip")
            }
            RpcError::MalformedResponse { method, reason } => {
                write!(f, "rpc {method} returned a malformed response: {reason}")
            }
        }
    }
}

impl std::error::Error for RpcError {}

/// Whether the retry loop should try again after an error.
fn is_retryable(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<CallRejected>().is_some() {
        return false;
    }
    !matches!(
        err.downcast_ref::<RpcError>(),
        Some(RpcError::HeightOutOfRange { .. }) | Some(RpcError::MalformedResponse { .. })
    )
}

/// Node status as reported by `getblockchaininfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkStatus {
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    pub best_block_hash: BlockHash,
    pub verification_progress: f64,
    pub size_on_disk: u64,
}

impl From<BlockchainInfoResponse> for NetworkStatus {
    fn from(value: BlockchainInfoResponse) -> Self {
        Self {
            chain: value.chain,
            blocks: value.blocks,
            headers: value.headers,
            best_block_hash: value.best_block_hash,
            verification_progress: value.verification_progress,
            size_on_disk: value.size_on_disk,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeRpcClient {
    rpc_url: Arc<String>,
    client: HttpClient,
    options: RpcClientOptions,
    metrics: Arc<RpcMetrics>,
}

impl ChainSource for NodeRpcClient {
    fn chain_info(&self) -> BoxFuture<'_, Result<ChainInfo>> {
        Box::pin(async move {
            let info = self.blockchain_info().await?;
            Ok::<_, anyhow::Error>(info.chain_info())
        })
    }

    fn block_at(&self, height: u64) -> BoxFuture<'_, Result<Block>> {
        Box::pin(self.block_at_height(height))
    }
}

impl NodeRpcClient {
    pub fn new(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        Self::with_options(url, user, password, RpcClientOptions::default())
    }

    pub fn with_options(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        options: RpcClientOptions,
    ) -> Result<Self> {
        options.validate()?;

        let rpc_url = url.into();
        let headers = basic_auth_headers(&user.into(), &password.into())?;
        let max_response_body_size = options.max_response_body_bytes.min(u32::MAX as usize) as u32;

        let client = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(options.request_timeout)
            .max_response_size(max_response_body_size)
            .build(&rpc_url)
            .map_err(|err| anyhow!("failed to build RPC client: {err}"))?;

        Ok(Self {
            rpc_url: Arc::new(rpc_url),
            client,
            options,
            metrics: Arc::new(RpcMetrics::default()),
        })
    }

    pub fn from_config(config: &PollerConfig) -> Result<Self> {
        config.validate()?;
        Self::with_options(
            config.rpc_url().to_owned(),
            config.rpc_user().to_owned(),
            config.rpc_password().to_owned(),
            RpcClientOptions::from_config(config),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.rpc_url
    }

    pub fn metrics(&self) -> RpcMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Chain name, sync progress, and tip as reported by the node.
    pub async fn network_status(&self) -> Result<NetworkStatus> {
        Ok(self.blockchain_info().await?.into())
    }

    /// Resolves `height` to a hash and fetches the block with full transaction detail.
    pub async fn block_at_height(&self, height: u64) -> Result<Block> {
        const GETBLOCKHASH: &str = "getblockhash";
        const GETBLOCK: &str = "getblock";

        let hash: BlockHash = self
            .retry_with_backoff(RetryContext::with_height(&BLOCK_HASH_RETRY, height), || {
                self.call(GETBLOCKHASH, rpc_params![height])
            })
            .await
            .map_err(|err| out_of_range_for(err, height))?;

        let verbose: VerboseBlock = self
            .retry_with_backoff(RetryContext::with_height(&BLOCK_RETRY, height), || {
                self.call(GETBLOCK, rpc_params![hash, GETBLOCK_VERBOSE_WITH_TX])
            })
            .await?;

        if verbose.height != height {
            return Err(RpcError::MalformedResponse {
                method: GETBLOCK,
                reason: format!(
                    "block {hash} reports height {} but height {height} was requested",
                    verbose.height
                ),
            }
            .into());
        }

        tracing::trace!(height, %hash, txs = verbose.tx.len(), "fetched verbose block");
        Ok(verbose.into())
    }

    async fn blockchain_info(&self) -> Result<BlockchainInfoResponse> {
        const METHOD: &str = "getblockchaininfo";

        self.retry_with_backoff(RetryContext::new(&CHAIN_INFO_RETRY), || {
            self.call(METHOD, rpc_params![])
        })
        .await
    }

    /// Shared retry/backoff loop that wraps RPC operations with metrics and
    /// consistent logging. Only transport-level failures are retried.
    async fn retry_with_backoff<T, F, Fut>(
        &self,
        context: RetryContext<'_>,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            match operation().await {
                Ok(value) => {
                    self.metrics.record_success(start.elapsed());
                    return Ok(value);
                }
                Err(err) => {
                    let elapsed = start.elapsed();
                    let backoff = self.options.backoff_delay(attempt);
                    let will_retry = attempt < self.options.max_attempts;

                    match err.downcast_ref::<RpcError>() {
                        Some(RpcError::Timeout { method }) => {
                            self.metrics.record_timeout(elapsed);
                            if will_retry {
                                context.log_timeout(attempt, method, backoff);
                            }
                        }
                        _ if !is_retryable(&err) => {
                            self.metrics.record_failure(elapsed);
                            context.log_rejected(attempt, &err);
                            return Err(err);
                        }
                        _ => {
                            self.metrics.record_failure(elapsed);
                            if will_retry {
                                context.log_retry(attempt, backoff, &err);
                            }
                        }
                    }

                    if !will_retry {
                        context.log_exhausted(attempt, &err);
                        return Err(err);
                    }

                    sleep(backoff).await;
                }
            }
        }
    }

    async fn call<R>(&self, method: &'static str, params: ArrayParams) -> Result<R>
    where
        R: DeserializeOwned,
    {
        timeout(
            self.options.request_timeout,
            self.client.request(method, params),
        )
        .await
        .map_err(|_| RpcError::Timeout { method })?
        .map_err(|err| map_rpc_error(method, err))
    }
}

fn map_rpc_error(method: &'static str, err: JsonRpcError) -> anyhow::Error {
    match err {
        JsonRpcError::RequestTimeout => RpcError::Timeout { method }.into(),
        JsonRpcError::ParseError(inner) => RpcError::MalformedResponse {
            method,
            reason: inner.to_string(),
        }
        .into(),
        JsonRpcError::Call(object) if object.code() == RPC_INVALID_PARAMETER => {
            anyhow!(
                "rpc {method} rejected parameters (code={}, message={})",
                object.code(),
                object.message()
            )
            .context(CallRejected)
        }
        JsonRpcError::Call(object) => anyhow!(
            "rpc {method} call failed (code={}, message={})",
            object.code(),
            object.message()
        ),
        other => anyhow!("rpc {method} call failed: {other}"),
    }
}

/// Marker attached to invalid-parameter rejections so callers that know the
/// requested height can turn them into [`RpcError::HeightOutOfRange`].
#[derive(Debug, Clone, Copy)]
struct CallRejected;

impl std::fmt::Display for CallRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("node rejected call parameters")
    }
}

fn out_of_range_for(err: anyhow::Error, height: u64) -> anyhow::Error {
    if err.downcast_ref::<CallRejected>().is_some() {
        RpcError::HeightOutOfRange { height }.into()
    } else {
        err
    }
}
