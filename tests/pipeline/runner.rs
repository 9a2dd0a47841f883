use std::time::Duration;

use crate::support::{
    helpers::{init_tracing, mock_config, wait_for_progress, RecordingSink},
    mock_rpc::{MockChain, MockNode},
};
use anyhow::{Context, Result};
use tipwatch::{PollerConfig, Runner};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Instant};

const POLL: Duration = Duration::from_millis(50);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runner_exits_when_token_cancelled() -> Result<()> {
    init_tracing();
    let chain = MockChain::with_tip(100);
    let node = MockNode::start(chain.clone()).await?;
    let sink = RecordingSink::default();

    let config = mock_config(node.url(), POLL, None)?;
    let mut runner = Runner::new(config, sink.clone())?;
    let token = runner.cancellation_token();
    let progress = runner.progress();

    let run_task = tokio::spawn(async move {
        let result = runner.run_until_ctrl_c().await;
        (runner, result)
    });

    wait_for_progress(&progress, 100, Duration::from_secs(10)).await?;
    chain.set_tip(102);
    wait_for_progress(&progress, 102, Duration::from_secs(10)).await?;

    token.cancel();
    let (runner, result) = timeout(Duration::from_secs(10), run_task)
        .await
        .context("runner did not exit after cancellation")??;
    result?;

    assert_eq!(sink.heights(), vec![101, 102]);
    assert_eq!(sink.shutdowns(), 1);
    assert_eq!(runner.last_processed_height(), Some(102));
    assert!(!runner.cancellation_token().is_cancelled());
    assert!(runner.rpc_metrics().total_requests > 0);

    node.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runner_keeps_polling_an_unreachable_node() -> Result<()> {
    init_tracing();
    let config = mock_config("http://127.0.0.1:9", POLL, Some(10))?;
    let sink = RecordingSink::default();
    let mut runner = Runner::new(config, sink.clone())?;
    let token = runner.cancellation_token();

    let run_task = tokio::spawn(async move {
        let result = runner.run_until_ctrl_c().await;
        (runner, result)
    });

    sleep(POLL * 5).await;
    assert!(!run_task.is_finished(), "source failures must not end the loop");

    token.cancel();
    let (runner, result) = timeout(Duration::from_secs(10), run_task)
        .await
        .context("runner did not exit after cancellation")??;
    result?;

    assert_eq!(runner.last_processed_height(), Some(10));
    assert!(sink.attempts().is_empty());
    assert!(runner.rpc_metrics().total_errors > 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_runner_skips_a_silent_node_at_startup() -> Result<()> {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind silent listener")?;
    let url = format!("http://{}", listener.local_addr()?);
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = PollerConfig::builder()
        .rpc_url(url)
        .rpc_user("user")
        .rpc_password("pass")
        .poll_interval(POLL)
        .rpc_timeout(Duration::from_secs(2))
        .rpc_max_attempts(3)
        .build()?;
    let sink = RecordingSink::default();
    let mut runner = Runner::new(config, sink.clone())?;
    runner.cancellation_token().cancel();

    let started = Instant::now();
    timeout(Duration::from_secs(1), runner.run_until_ctrl_c())
        .await
        .context("runner blocked on startup despite cancellation")??;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(sink.shutdowns(), 1);
    assert!(sink.attempts().is_empty());

    silent.abort();
    Ok(())
}
