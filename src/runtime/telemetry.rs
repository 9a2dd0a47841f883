use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(30);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Rolling counters updated by the poll loop.
#[derive(Default, Debug)]
pub struct Telemetry {
    ticks: AtomicU64,
    processed_blocks: AtomicU64,
    matched_outputs: AtomicU64,
    source_errors: AtomicU64,
    sink_failures: AtomicU64,
}

impl Telemetry {
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed_block(&self, matched_outputs: usize) {
        self.processed_blocks.fetch_add(1, Ordering::Relaxed);
        self.matched_outputs
            .fetch_add(matched_outputs as u64, Ordering::Relaxed);
    }

    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            processed_blocks: self.processed_blocks.load(Ordering::Relaxed),
            matched_outputs: self.matched_outputs.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }

    pub fn processed_blocks(&self) -> u64 {
        self.processed_blocks.load(Ordering::Relaxed)
    }

    pub fn source_errors(&self) -> u64 {
        self.source_errors.load(Ordering::Relaxed)
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub ticks: u64,
    pub processed_blocks: u64,
    pub matched_outputs: u64,
    pub source_errors: u64,
    pub sink_failures: u64,
}

/// Spawns a background task that periodically logs throughput, the last processed
/// height, and error counters.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    progress: watch::Receiver<Option<u64>>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "tipwatch::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current_snapshot = telemetry.snapshot();
                    let processed_delta = current_snapshot
                        .processed_blocks
                        .saturating_sub(last_snapshot.processed_blocks);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let blocks_per_min = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        processed_delta as f64 * 60.0 / elapsed
                    };
                    let last_processed = *progress.borrow();

                    tracing::info!(
                        target: "tipwatch::metrics",
                        blocks_per_min = format!("{blocks_per_min:.2}"),
                        last_processed = ?last_processed,
                        processed = current_snapshot.processed_blocks,
                        matched_outputs = current_snapshot.matched_outputs,
                        ticks = current_snapshot.ticks,
                        source_errors = current_snapshot.source_errors,
                        sink_failures = current_snapshot.sink_failures,
                        "poller metrics snapshot"
                    );

                    last_snapshot = current_snapshot;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
