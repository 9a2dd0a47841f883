use crate::scan::block::MatchedOutput;
use anyhow::Error as AnyError;
use core::future::Future;
use core::pin::Pin;

pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// Error surfaced by a sink. The poller retries the same height on the next tick.
#[derive(Debug)]
pub struct SinkError {
    height: u64,
    source: AnyError,
}

impl SinkError {
    pub fn new(height: u64, source: AnyError) -> Self {
        Self { height, source }
    }

    pub fn height(&self) -> u64 {
        self.height
    }
}

impl core::fmt::Display for SinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sink rejected height {}: {}", self.height, self.source)
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Trait implemented by downstream consumers of per-block inscription candidates.
pub trait InscriptionSink: Send + 'static {
    /// Called once per processed height, in strictly increasing height order.
    ///
    /// `matches` may be empty. Returning an error keeps the height pending so it
    /// is delivered again on the next tick.
    fn deliver<'a>(&'a mut self, height: u64, matches: Vec<MatchedOutput>) -> SinkFuture<'a>;

    /// Called once after the poll loop has exited.
    fn shutdown<'a>(&'a mut self) -> SinkFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

/// Adapts an async closure into an [`InscriptionSink`].
pub struct FnSink<F> {
    handler: F,
}

impl<F> FnSink<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F, Fut> InscriptionSink for FnSink<F>
where
    F: FnMut(u64, Vec<MatchedOutput>) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn deliver<'a>(&'a mut self, height: u64, matches: Vec<MatchedOutput>) -> SinkFuture<'a> {
        let pending = (self.handler)(height, matches);
        Box::pin(async move {
            pending
                .await
                .map_err(|source| SinkError::new(height, source))
        })
    }
}
