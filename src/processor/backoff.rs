use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Sleeps for `delay` unless `cancellation` fires first.
///
/// Returns `true` when the full delay elapsed and `false` when cancelled.
pub(crate) async fn sleep_or_cancel(delay: Duration, cancellation: &CancellationToken) -> bool {
    if cancellation.is_cancelled() {
        return false;
    }

    if delay.is_zero() {
        yield_now().await;
        return !cancellation.is_cancelled();
    }

    tokio::select! {
        _ = cancellation.cancelled() => false,
        _ = sleep(delay) => true,
    }
}
