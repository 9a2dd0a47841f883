//! JSON-RPC plumbing for Bitcoin Core style nodes: authentication, client
//! options, retry logging, request metrics, and response decoding.

pub mod auth;
pub mod client;
pub mod metrics;
pub mod options;
pub mod retry;
pub mod types;

pub use client::{NetworkStatus, NodeRpcClient, RpcError};
pub use metrics::RpcMetricsSnapshot;
pub use options::RpcClientOptions;
