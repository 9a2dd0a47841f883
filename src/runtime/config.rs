use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RPC_MAX_ATTEMPTS: usize = 3;
const DEFAULT_ENV_RPC_URL: &str = "http://localhost:38332";

const ENV_RPC_URL: &str = "TIPWATCH_RPC_URL";
const ENV_RPC_USER: &str = "TIPWATCH_RPC_USER";
const ENV_RPC_PASSWORD: &str = "TIPWATCH_RPC_PASSWORD";
const ENV_POLL_INTERVAL_MS: &str = "TIPWATCH_POLL_INTERVAL_MS";
const ENV_RESUME_FROM_HEIGHT: &str = "TIPWATCH_RESUME_FROM_HEIGHT";
const ENV_RPC_TIMEOUT_SECS: &str = "TIPWATCH_RPC_TIMEOUT_SECS";
const ENV_RPC_MAX_ATTEMPTS: &str = "TIPWATCH_RPC_MAX_ATTEMPTS";
const ENV_METRICS_INTERVAL_SECS: &str = "TIPWATCH_METRICS_INTERVAL_SECS";

/// Immutable configuration for a chain-tip poller.
///
/// All instances must be constructed via [`PollerConfig::builder`], [`PollerConfig::new`]
/// or [`PollerConfig::from_env`] so invariants are validated before any consumer
/// observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    rpc_url: String,
    rpc_user: String,
    rpc_password: String,
    poll_interval: Duration,
    resume_from_height: Option<u64>,
    rpc_timeout: Duration,
    rpc_max_attempts: usize,
    metrics_interval: Duration,
}

pub struct PollerConfigParams {
    pub rpc_url: String,
    pub rpc_user: String,
    pub rpc_password: String,
    pub poll_interval: Duration,
    pub resume_from_height: Option<u64>,
    pub rpc_timeout: Duration,
    pub rpc_max_attempts: usize,
    pub metrics_interval: Duration,
}

impl PollerConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> PollerConfigBuilder {
        PollerConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values, running validation.
    pub fn new(params: PollerConfigParams) -> Result<Self> {
        let PollerConfigParams {
            rpc_url,
            rpc_user,
            rpc_password,
            poll_interval,
            resume_from_height,
            rpc_timeout,
            rpc_max_attempts,
            metrics_interval,
        } = params;

        let config = Self {
            rpc_url: trimmed_string(rpc_url),
            rpc_user: trimmed_string(rpc_user),
            rpc_password: trimmed_string(rpc_password),
            poll_interval,
            resume_from_height,
            rpc_timeout,
            rpc_max_attempts,
            metrics_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration from `TIPWATCH_*` environment variables.
    ///
    /// The RPC URL falls back to a local signet node; credentials are required.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder().rpc_url(
            env::var(ENV_RPC_URL).unwrap_or_else(|_| DEFAULT_ENV_RPC_URL.to_owned()),
        );

        if let Ok(user) = env::var(ENV_RPC_USER) {
            builder = builder.rpc_user(user);
        }
        if let Ok(password) = env::var(ENV_RPC_PASSWORD) {
            builder = builder.rpc_password(password);
        }
        if let Some(millis) = parse_env::<u64>(ENV_POLL_INTERVAL_MS)? {
            builder = builder.poll_interval(Duration::from_millis(millis));
        }
        if let Some(height) = parse_env::<u64>(ENV_RESUME_FROM_HEIGHT)? {
            builder = builder.resume_from_height(height);
        }
        if let Some(secs) = parse_env::<u64>(ENV_RPC_TIMEOUT_SECS)? {
            builder = builder.rpc_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = parse_env::<usize>(ENV_RPC_MAX_ATTEMPTS)? {
            builder = builder.rpc_max_attempts(attempts);
        }
        if let Some(secs) = parse_env::<u64>(ENV_METRICS_INTERVAL_SECS)? {
            builder = builder.metrics_interval(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Full RPC URL (including scheme) of the node.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn rpc_user(&self) -> &str {
        &self.rpc_user
    }

    pub fn rpc_password(&self) -> &str {
        &self.rpc_password
    }

    /// Delay slept after every tick.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Last height the embedder already processed, if resuming.
    ///
    /// `None` anchors the poller at the live tip without replaying history.
    pub fn resume_from_height(&self) -> Option<u64> {
        self.resume_from_height
    }

    /// Per-RPC timeout applied to the JSON-RPC client.
    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    /// Attempts per RPC call before the failure is reported to the poll loop.
    pub fn rpc_max_attempts(&self) -> usize {
        self.rpc_max_attempts
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.rpc_url)?;
        ensure_not_empty(&self.rpc_user, "rpc_user")?;
        ensure_not_empty(&self.rpc_password, "rpc_password")?;

        if self.poll_interval.is_zero() {
            bail!("poll_interval must be greater than 0");
        }

        if self.rpc_timeout.is_zero() {
            bail!("rpc_timeout must be greater than 0");
        }

        if self.rpc_max_attempts == 0 {
            bail!("rpc_max_attempts must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct PollerConfigBuilder {
    rpc_url: Option<String>,
    rpc_user: Option<String>,
    rpc_password: Option<String>,
    poll_interval: Option<Duration>,
    resume_from_height: Option<u64>,
    rpc_timeout: Option<Duration>,
    rpc_max_attempts: Option<usize>,
    metrics_interval: Option<Duration>,
}

impl PollerConfigBuilder {
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn rpc_user(mut self, user: impl Into<String>) -> Self {
        self.rpc_user = Some(user.into());
        self
    }

    pub fn rpc_password(mut self, password: impl Into<String>) -> Self {
        self.rpc_password = Some(password.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn resume_from_height(mut self, height: u64) -> Self {
        self.resume_from_height = Some(height);
        self
    }

    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = Some(timeout);
        self
    }

    pub fn rpc_max_attempts(mut self, attempts: usize) -> Self {
        self.rpc_max_attempts = Some(attempts);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<PollerConfig> {
        let params = PollerConfigParams {
            rpc_url: self.rpc_url.context("rpc_url is required")?,
            rpc_user: self.rpc_user.context("rpc_user is required")?,
            rpc_password: self.rpc_password.context("rpc_password is required")?,
            poll_interval: self
                .poll_interval
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)),
            resume_from_height: self.resume_from_height,
            rpc_timeout: self
                .rpc_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS)),
            rpc_max_attempts: self.rpc_max_attempts.unwrap_or(DEFAULT_RPC_MAX_ATTEMPTS),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
        };

        PollerConfig::new(params)
    }
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("rpc_url must start with http:// or https://");
    }
    Ok(())
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("{key} has invalid value {raw:?}: {err}")),
        Err(_) => Ok(None),
    }
}
