use crate::runtime::sink::SinkError;
use anyhow::Error as AnyError;

/// Errors observed by the poll loop.
///
/// Only [`PollError::Configuration`] ever leaves [`crate::ChainTipPoller::start`];
/// the other variants are caught at the tick boundary, logged, and retried.
#[derive(Debug)]
pub enum PollError {
    SourceUnavailable {
        operation: &'static str,
        height: Option<u64>,
        source: AnyError,
    },
    SinkRejected(SinkError),
    Configuration(String),
}

impl PollError {
    pub(crate) fn source_unavailable(
        operation: &'static str,
        height: Option<u64>,
        source: AnyError,
    ) -> Self {
        PollError::SourceUnavailable {
            operation,
            height,
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        PollError::Configuration(message.into())
    }

    /// Height that failed, when the error is tied to one.
    pub fn height(&self) -> Option<u64> {
        match self {
            PollError::SourceUnavailable { height, .. } => *height,
            PollError::SinkRejected(err) => Some(err.height()),
            PollError::Configuration(_) => None,
        }
    }
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::SourceUnavailable {
                operation,
                height: Some(height),
                source,
            } => write!(f, "{operation} failed at height {height}: {source}"),
            PollError::SourceUnavailable {
                operation,
                height: None,
                source,
            } => write!(f, "{operation} failed: {source}"),
            PollError::SinkRejected(err) => write!(f, "{err}"),
            PollError::Configuration(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::SourceUnavailable { source, .. } => Some(source.as_ref()),
            PollError::SinkRejected(err) => Some(err),
            PollError::Configuration(_) => None,
        }
    }
}

impl From<SinkError> for PollError {
    fn from(value: SinkError) -> Self {
        PollError::SinkRejected(value)
    }
}
