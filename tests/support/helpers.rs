use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use tipwatch::{InscriptionSink, MatchedOutput, PollerConfig, SinkError, SinkFuture};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// Config pointed at a mock node with short intervals and a single RPC attempt.
pub fn mock_config(
    url: &str,
    poll_interval: Duration,
    resume_from_height: Option<u64>,
) -> Result<PollerConfig> {
    let mut builder = PollerConfig::builder()
        .rpc_url(url)
        .rpc_user("user")
        .rpc_password("pass")
        .poll_interval(poll_interval)
        .rpc_timeout(Duration::from_secs(2))
        .rpc_max_attempts(1)
        .metrics_interval(Duration::from_millis(100));
    if let Some(height) = resume_from_height {
        builder = builder.resume_from_height(height);
    }
    builder.build()
}

#[derive(Default)]
pub struct SinkState {
    pub deliveries: Vec<(u64, Vec<MatchedOutput>)>,
    pub attempts: Vec<u64>,
    pub rejections: HashMap<u64, usize>,
    pub shutdowns: usize,
}

/// Sink that records every delivery attempt and can reject chosen heights.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    pub fn reject(&self, height: u64, times: usize) {
        self.state
            .lock()
            .expect("sink state poisoned")
            .rejections
            .insert(height, times);
    }

    pub fn heights(&self) -> Vec<u64> {
        self.state
            .lock()
            .expect("sink state poisoned")
            .deliveries
            .iter()
            .map(|(height, _)| *height)
            .collect()
    }

    pub fn attempts(&self) -> Vec<u64> {
        self.state.lock().expect("sink state poisoned").attempts.clone()
    }

    pub fn deliveries(&self) -> Vec<(u64, Vec<MatchedOutput>)> {
        self.state.lock().expect("sink state poisoned").deliveries.clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().expect("sink state poisoned").shutdowns
    }
}

impl InscriptionSink for RecordingSink {
    fn deliver<'a>(&'a mut self, height: u64, matches: Vec<MatchedOutput>) -> SinkFuture<'a> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut guard = state.lock().expect("sink state poisoned");
            guard.attempts.push(height);
            if let Some(remaining) = guard.rejections.get_mut(&height) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(SinkError::new(height, anyhow!("downstream unavailable")));
                }
            }
            guard.deliveries.push((height, matches));
            Ok(())
        })
    }

    fn shutdown<'a>(&'a mut self) -> SinkFuture<'a> {
        let state = self.state.clone();
        Box::pin(async move {
            state.lock().expect("sink state poisoned").shutdowns += 1;
            Ok(())
        })
    }
}

pub async fn wait_for_progress(
    progress: &watch::Receiver<Option<u64>>,
    target: u64,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let current = *progress.borrow();
        if current.is_some_and(|height| height >= target) {
            return Ok(());
        }
        if start.elapsed() > timeout {
            let reported = current
                .map(|height| height.to_string())
                .unwrap_or_else(|| "<none>".to_owned());
            bail!(
                "poller did not reach height {target} within {:?} (last processed: {reported})",
                timeout
            );
        }
        sleep(Duration::from_millis(20)).await;
    }
}

pub async fn wait_for_attempts(
    sink: &RecordingSink,
    target: usize,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        if sink.attempts().len() >= target {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!(
                "sink did not see {target} delivery attempts within {:?} (seen: {:?})",
                timeout,
                sink.attempts()
            );
        }
        sleep(Duration::from_millis(20)).await;
    }
}

pub fn assert_is_contiguous(heights: &[u64]) {
    for window in heights.windows(2) {
        if let [lhs, rhs] = window {
            assert_eq!(rhs, &(lhs + 1), "heights must increase monotonically");
        }
    }
}
