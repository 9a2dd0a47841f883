use std::env;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tipwatch::{FnSink, MatchedOutput, OutputKind, PollerConfig, Runner};

const DEFAULT_LOG_DIRECTIVE: &str = "info";

#[derive(Default, Debug)]
struct MonitorStats {
    blocks: u64,
    op_return: u64,
    taproot: u64,
    last_height: Option<u64>,
}

impl MonitorStats {
    fn record(&mut self, height: u64, matches: &[MatchedOutput]) {
        self.blocks += 1;
        self.last_height = Some(height);
        for entry in matches {
            match entry.kind() {
                OutputKind::OpReturn => self.op_return += 1,
                OutputKind::TaprootWitness => self.taproot += 1,
                OutputKind::Other => {}
            }
        }
    }
}

/// Watches a signet (or any Bitcoin Core) node and logs every new block's
/// inscription candidates.
///
/// Configure with `TIPWATCH_RPC_URL`, `TIPWATCH_RPC_USER`, `TIPWATCH_RPC_PASSWORD`
/// and optionally `TIPWATCH_POLL_INTERVAL_MS` / `TIPWATCH_RESUME_FROM_HEIGHT`.
#[tokio::main]
async fn main() -> Result<()> {
    init_example_tracing();

    let config = PollerConfig::from_env()?;
    let stats = Arc::new(Mutex::new(MonitorStats::default()));

    let sink_stats = stats.clone();
    let sink = FnSink::new(move |height: u64, matches: Vec<MatchedOutput>| {
        let stats = sink_stats.clone();
        async move {
            if matches.is_empty() {
                tracing::info!(height, "no inscription candidates");
            }
            for entry in &matches {
                tracing::info!(
                    height,
                    txid = %entry.txid,
                    vout = entry.output.index,
                    kind = %entry.kind(),
                    value = %entry.output.value,
                    address = entry.output.address.as_deref().unwrap_or("-"),
                    script = %entry.output.script_descriptor,
                    "candidate output"
                );
            }
            if let Ok(mut stats) = stats.lock() {
                stats.record(height, &matches);
            }
            Ok::<(), anyhow::Error>(())
        }
    });

    let mut runner = Runner::new(config, sink)?;
    let result = runner.run_until_ctrl_c().await;

    if let Ok(stats) = stats.lock() {
        tracing::info!(
            blocks = stats.blocks,
            op_return = stats.op_return,
            taproot = stats.taproot,
            last_height = ?stats.last_height,
            "monitor summary"
        );
    }

    result
}

fn init_example_tracing() {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", DEFAULT_LOG_DIRECTIVE);
    }
    tipwatch::init_tracing();
}
