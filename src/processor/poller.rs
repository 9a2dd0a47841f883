//! Sequential chain-tip poll loop.
//!
//! Each tick asks the [`ChainSource`] for the current tip, then walks every
//! height between the last processed one and that tip in increasing order:
//! fetch, classify, hand the candidates to the sink, and only then advance.
//! Any failure ends the tick early and the same height is retried on the next
//! one, so delivery is at-least-once and never skips a height.

use super::backoff::sleep_or_cancel;
use super::source::ChainSource;
use crate::runtime::config::PollerConfig;
use crate::runtime::error::PollError;
use crate::runtime::progress::PollerState;
use crate::runtime::sink::InscriptionSink;
use crate::runtime::telemetry::Telemetry;
use crate::scan::classify::matched_outputs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Result of a single [`ChainTipPoller::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The poller was stopped before the tick did any work.
    Cancelled,
    /// The chain tip could not be queried.
    SourceUnavailable,
    /// First successful tip query without a resume height; nothing was delivered.
    Anchored { height: u64 },
    /// The tip is not ahead of the last processed height.
    UpToDate { tip: u64 },
    /// The tip moved ahead. `delivered` heights were accepted by the sink and
    /// `halted` is set when the tick stopped short of `tip`.
    Advanced {
        tip: u64,
        delivered: u64,
        halted: bool,
    },
}

/// Cloneable stop switch for a running poller.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    shutdown: CancellationToken,
}

impl PollerHandle {
    /// Requests the loop to exit. Calling it more than once has no further effect.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("stop requested for chain tip poller");
        }
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

pub struct ChainTipPoller<S, K> {
    source: S,
    sink: K,
    poll_interval: Duration,
    state: PollerState,
    shutdown: CancellationToken,
    telemetry: Arc<Telemetry>,
}

impl<S, K> ChainTipPoller<S, K>
where
    S: ChainSource,
    K: InscriptionSink,
{
    /// Creates a poller from a validated [`PollerConfig`].
    pub fn new(config: &PollerConfig, source: S, sink: K) -> Result<Self, PollError> {
        config
            .validate()
            .map_err(|err| PollError::configuration(err.to_string()))?;
        Self::with_schedule(
            config.poll_interval(),
            config.resume_from_height(),
            source,
            sink,
        )
    }

    /// Creates a poller from its scheduling parameters alone.
    ///
    /// `resume_from_height` is the last height already handled by the caller;
    /// the first delivery is the height after it. Without one the poller
    /// anchors at whatever tip it observes first.
    pub fn with_schedule(
        poll_interval: Duration,
        resume_from_height: Option<u64>,
        source: S,
        sink: K,
    ) -> Result<Self, PollError> {
        if poll_interval.is_zero() {
            return Err(PollError::configuration(
                "poll_interval must be greater than 0",
            ));
        }

        Ok(Self {
            source,
            sink,
            poll_interval,
            state: PollerState::new(resume_from_height),
            shutdown: CancellationToken::new(),
            telemetry: Arc::new(Telemetry::default()),
        })
    }

    /// Replaces the poller's stop token, e.g. with a child of an application-wide token.
    pub fn with_cancellation_token(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Swaps the stop token between runs. Must not be called while `start` is running.
    pub fn replace_cancellation_token(&mut self, shutdown: CancellationToken) {
        self.shutdown = shutdown;
    }

    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Read-only view of the last processed height.
    pub fn progress(&self) -> watch::Receiver<Option<u64>> {
        self.state.subscribe()
    }

    pub fn last_processed_height(&self) -> Option<u64> {
        self.state.last_processed()
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Runs ticks separated by the poll interval until stopped.
    ///
    /// Source and sink failures never end the loop. After it exits the sink's
    /// shutdown hook runs once.
    pub async fn start(&mut self) -> Result<(), PollError> {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            resume_from_height = ?self.state.last_processed(),
            "starting chain tip poller"
        );

        loop {
            if self.tick().await == TickOutcome::Cancelled {
                break;
            }
            if !sleep_or_cancel(self.poll_interval, &self.shutdown).await {
                break;
            }
        }

        if let Err(err) = self.sink.shutdown().await {
            tracing::warn!(error = %err, "sink shutdown hook failed");
        }

        tracing::info!(
            last_processed_height = ?self.state.last_processed(),
            "chain tip poller stopped"
        );
        Ok(())
    }

    /// Performs one poll iteration.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.shutdown.is_cancelled() {
            return TickOutcome::Cancelled;
        }
        self.telemetry.record_tick();

        let info = match self.source.chain_info().await {
            Ok(info) => info,
            Err(source) => {
                self.report(PollError::source_unavailable("chain_info", None, source));
                return TickOutcome::SourceUnavailable;
            }
        };

        let Some(last) = self.state.last_processed() else {
            self.state.anchor(info.height);
            tracing::info!(
                height = info.height,
                tip_hash = %info.tip_hash,
                "anchored at current chain tip; earlier blocks are not replayed"
            );
            return TickOutcome::Anchored {
                height: info.height,
            };
        };

        if info.height <= last {
            tracing::trace!(tip = info.height, last, "no new blocks");
            return TickOutcome::UpToDate { tip: info.height };
        }

        tracing::info!(
            tip = info.height,
            tip_hash = %info.tip_hash,
            pending = info.height - last,
            "new chain tip detected"
        );

        let mut delivered = 0;
        for height in last + 1..=info.height {
            if self.shutdown.is_cancelled() {
                tracing::debug!(height, "stop requested; leaving remaining heights for later");
                return TickOutcome::Advanced {
                    tip: info.height,
                    delivered,
                    halted: true,
                };
            }

            if let Err(err) = self.process_height(height).await {
                self.report(err);
                return TickOutcome::Advanced {
                    tip: info.height,
                    delivered,
                    halted: true,
                };
            }
            delivered += 1;
        }

        TickOutcome::Advanced {
            tip: info.height,
            delivered,
            halted: false,
        }
    }

    async fn process_height(&mut self, height: u64) -> Result<(), PollError> {
        let block = self
            .source
            .block_at(height)
            .await
            .map_err(|source| PollError::source_unavailable("block_at", Some(height), source))?;

        if block.height() != height {
            return Err(PollError::source_unavailable(
                "block_at",
                Some(height),
                anyhow::anyhow!("source returned block {} for height {height}", block.height()),
            ));
        }

        let matches = matched_outputs(&block);
        let matched = matches.len();

        tracing::info!(
            height,
            hash = %block.hash(),
            time = block.timestamp_seconds(),
            txs = block.transactions().len(),
            candidates = matched,
            "processing block"
        );
        for entry in &matches {
            tracing::debug!(
                height,
                txid = %entry.txid,
                vout = entry.output.index,
                kind = %entry.kind(),
                value_sat = entry.output.value.to_sat(),
                address = entry.output.address.as_deref().unwrap_or("-"),
                "inscription candidate"
            );
        }

        self.sink.deliver(height, matches).await?;
        self.state.mark_processed(height);
        self.telemetry.record_processed_block(matched);
        Ok(())
    }

    fn report(&self, err: PollError) {
        match &err {
            PollError::SinkRejected(_) => {
                self.telemetry.record_sink_failure();
                tracing::error!(
                    height = ?err.height(),
                    error = %err,
                    "sink rejected block; retrying next tick"
                );
            }
            PollError::SourceUnavailable { .. } => {
                self.telemetry.record_source_error();
                tracing::warn!(
                    height = ?err.height(),
                    error = %err,
                    "chain source unavailable; retrying next tick"
                );
            }
            PollError::Configuration(_) => {
                tracing::error!(error = %err, "unexpected configuration error during tick");
            }
        }
    }
}
