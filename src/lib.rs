pub mod processor;
pub mod rpc;
pub mod runtime;
pub mod scan;

pub use processor::poller::{ChainTipPoller, PollerHandle, TickOutcome};
pub use processor::source::ChainSource;
pub use rpc::{NetworkStatus, NodeRpcClient, RpcClientOptions, RpcError, RpcMetricsSnapshot};
pub use runtime::config::{PollerConfig, PollerConfigBuilder, PollerConfigParams};
pub use runtime::error::PollError;
pub use runtime::progress::PollerState;
pub use runtime::runner::Runner;
pub use runtime::sink::{FnSink, InscriptionSink, SinkError, SinkFuture};
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use scan::block::{Block, ChainInfo, MatchedOutput, Output, Transaction};
pub use scan::classify::{classify, matched_outputs, OutputKind};
