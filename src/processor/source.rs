use crate::scan::block::{Block, ChainInfo};
use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Read access to a chain: its current tip and any block at or below it.
///
/// Implemented by [`crate::rpc::NodeRpcClient`] for a live node and by
/// in-memory chains in tests.
pub trait ChainSource: Send + Sync + 'static {
    fn chain_info(&self) -> BoxFuture<'_, Result<ChainInfo>>;

    /// Fetches the block at `height`. The returned block must report `height`.
    fn block_at(&self, height: u64) -> BoxFuture<'_, Result<Block>>;
}

impl<S> ChainSource for Arc<S>
where
    S: ChainSource + ?Sized,
{
    fn chain_info(&self) -> BoxFuture<'_, Result<ChainInfo>> {
        (**self).chain_info()
    }

    fn block_at(&self, height: u64) -> BoxFuture<'_, Result<Block>> {
        (**self).block_at(height)
    }
}
