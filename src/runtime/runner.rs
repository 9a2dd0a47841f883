use crate::processor::poller::ChainTipPoller;
use crate::rpc::{NodeRpcClient, RpcMetricsSnapshot};
use crate::runtime::config::PollerConfig;
use crate::runtime::sink::InscriptionSink;
use crate::runtime::telemetry::spawn_metrics_reporter;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Wires a [`NodeRpcClient`] and a [`ChainTipPoller`] together and handles OS
/// signals for graceful shutdowns.
pub struct Runner<K: InscriptionSink> {
    config: PollerConfig,
    client: Arc<NodeRpcClient>,
    poller: ChainTipPoller<Arc<NodeRpcClient>, K>,
    shutdown: CancellationToken,
}

impl<K: InscriptionSink> Runner<K> {
    /// Builds the node client and poller from `config` under a fresh root
    /// [`CancellationToken`].
    pub fn new(config: PollerConfig, sink: K) -> Result<Self> {
        let client = Arc::new(
            NodeRpcClient::from_config(&config).context("failed to build RPC client")?,
        );
        let shutdown = CancellationToken::new();
        let poller = ChainTipPoller::new(&config, client.clone(), sink)?
            .with_cancellation_token(shutdown.clone());

        Ok(Self {
            config,
            client,
            poller,
            shutdown,
        })
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn progress(&self) -> watch::Receiver<Option<u64>> {
        self.poller.progress()
    }

    pub fn last_processed_height(&self) -> Option<u64> {
        self.poller.last_processed_height()
    }

    pub fn rpc_metrics(&self) -> RpcMetricsSnapshot {
        self.client.metrics()
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is cancelled elsewhere.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        tokio::select! {
            _ = self.log_network_status() => {}
            _ = shutdown.cancelled() => {
                tracing::info!("runner shutdown token cancelled during startup");
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received during startup; shutting down runner");
                shutdown.cancel();
            }
        }

        let reporter_token = self.shutdown.child_token();
        let reporter = spawn_metrics_reporter(
            self.poller.telemetry(),
            self.poller.progress(),
            reporter_token.clone(),
            self.config.metrics_interval(),
        );

        tracing::info!(
            endpoint = self.client.endpoint(),
            "runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown"
        );

        let result = {
            let poll = self.poller.start();
            tokio::pin!(poll);

            let finished = tokio::select! {
                result = &mut poll => {
                    tracing::info!("runner shutdown token cancelled");
                    Some(result)
                }
                _ = signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received; shutting down runner");
                    None
                }
            };
            match finished {
                Some(result) => result,
                None => {
                    shutdown.cancel();
                    poll.await
                }
            }
        };

        reporter_token.cancel();
        if let Err(err) = reporter.await {
            tracing::warn!(error = %err, "metrics reporter task panicked");
        }

        let rpc = self.client.metrics();
        tracing::info!(
            requests = rpc.total_requests,
            errors = rpc.total_errors,
            timeouts = rpc.total_timeouts,
            avg_latency_ms = format!("{:.2}", rpc.average_latency_ms),
            "runner stopped"
        );

        self.reinitialize_shutdown_token();
        result.context("chain tip poller aborted")
    }

    async fn log_network_status(&self) {
        match self.client.network_status().await {
            Ok(status) => {
                tracing::info!(
                    chain = %status.chain,
                    blocks = status.blocks,
                    headers = status.headers,
                    best_block_hash = %status.best_block_hash,
                    verification_progress = status.verification_progress,
                    size_on_disk = status.size_on_disk,
                    "connected to node"
                );
                self.log_tip_block(status.blocks).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to query network status; continuing")
            }
        }
    }

    async fn log_tip_block(&self, height: u64) {
        match self.client.block_at_height(height).await {
            Ok(block) => tracing::info!(
                height,
                hash = %block.hash(),
                time = block.timestamp_seconds(),
                txs = block.transactions().len(),
                "current tip block"
            ),
            Err(err) => tracing::warn!(height, error = %err, "failed to fetch tip block"),
        }
    }

    fn reinitialize_shutdown_token(&mut self) {
        self.shutdown = CancellationToken::new();
        self.poller.replace_cancellation_token(self.shutdown.clone());
    }
}
