//! Retry context and canned log messages shared by the node client's calls.

use anyhow::Error;
use std::time::Duration;

macro_rules! log_with_retry_ctx {
    ($level:ident, $ctx:expr, $($rest:tt)*) => {{
        if let Some(height) = $ctx.height {
            tracing::$level!(height, $($rest)*);
        } else {
            tracing::$level!($($rest)*);
        }
    }};
}

/// Log labels describing one RPC operation.
#[derive(Clone, Copy)]
pub(crate) struct RetryMessages {
    pub(crate) timeout: &'static str,
    pub(crate) retry: &'static str,
    pub(crate) exhausted: &'static str,
    pub(crate) rejected: &'static str,
}

/// Per-call context so retries log the operation and, when known, the height.
#[derive(Clone, Copy)]
pub(crate) struct RetryContext<'a> {
    height: Option<u64>,
    messages: &'a RetryMessages,
}

impl<'a> RetryContext<'a> {
    pub(crate) fn new(messages: &'a RetryMessages) -> Self {
        Self {
            height: None,
            messages,
        }
    }

    pub(crate) fn with_height(messages: &'a RetryMessages, height: u64) -> Self {
        Self {
            height: Some(height),
            messages,
        }
    }

    pub(crate) fn log_timeout(&self, attempt: usize, method: &str, backoff: Duration) {
        let backoff_ms = duration_to_millis(backoff);
        log_with_retry_ctx!(
            warn,
            self,
            attempt,
            method,
            backoff_ms,
            "{}",
            self.messages.timeout
        );
    }

    pub(crate) fn log_retry(&self, attempt: usize, backoff: Duration, err: &Error) {
        let backoff_ms = duration_to_millis(backoff);
        log_with_retry_ctx!(
            warn,
            self,
            attempt,
            backoff_ms,
            error = %err,
            "{}",
            self.messages.retry
        );
    }

    pub(crate) fn log_exhausted(&self, attempt: usize, err: &Error) {
        log_with_retry_ctx!(warn, self, attempt, error = %err, "{}", self.messages.exhausted);
    }

    pub(crate) fn log_rejected(&self, attempt: usize, err: &Error) {
        log_with_retry_ctx!(debug, self, attempt, error = %err, "{}", self.messages.rejected);
    }
}

fn duration_to_millis(backoff: Duration) -> u64 {
    backoff.as_millis().min(u128::from(u64::MAX)) as u64
}

pub(crate) const CHAIN_INFO_RETRY: RetryMessages = RetryMessages {
    timeout: "getblockchaininfo timed out; retrying",
    retry: "getblockchaininfo failed; retrying",
    exhausted: "getblockchaininfo exhausted retries",
    rejected: "getblockchaininfo rejected by node",
};

pub(crate) const BLOCK_HASH_RETRY: RetryMessages = RetryMessages {
    timeout: "getblockhash timed out; retrying",
    retry: "getblockhash failed; retrying",
    exhausted: "getblockhash exhausted retries",
    rejected: "getblockhash rejected by node",
};

pub(crate) const BLOCK_RETRY: RetryMessages = RetryMessages {
    timeout: "getblock timed out; retrying",
    retry: "getblock failed; retrying",
    exhausted: "getblock exhausted retries",
    rejected: "getblock rejected by node",
};
